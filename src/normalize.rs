//! Arabic text normalization.
//!
//! Two distinct normalization levels live here and must not be conflated:
//!
//! - [`normalize_arabic`] — the display-safe canonical form applied to every
//!   piece of text that flows through the pipeline (ingestion, embedding,
//!   prompts). Removes diacritics and noise but preserves letter identity.
//! - [`fold_for_matching`] — a stricter, lossy folding used only when scoring
//!   predictions against gold answers. Folding hamza forms and ta marbuta
//!   makes matching forgiving but would corrupt displayed answers, so it is
//!   never applied to generation input or output.

use std::sync::LazyLock;

use regex::Regex;

/// Arabic diacritical marks (tashkeel) and Quranic annotation signs.
static TASHKEEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\u{0610}-\u{061A}\u{064B}-\u{065F}\u{06D6}-\u{06ED}]").expect("valid regex")
});

/// Tatweel (kashida) elongation runs.
static TATWEEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\u{0640}+").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Everything outside the Arabic block, digits, and basic punctuation.
static NON_ARABIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^\u{0621}-\u{064A}0-9\s.,؟!:؛\-\(\)"']"#).expect("valid regex")
});

/// Punctuation and symbols stripped by the matching fold.
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\u{0621}-\u{064A}0-9]").expect("valid regex"));

/// Replace ASCII control characters with spaces.
///
/// Rust strings are guaranteed valid UTF-8, so unpaired surrogate code points
/// cannot occur here; rejecting them is the deserializer's job.
fn strip_controls(text: &str) -> String {
    text.chars().map(|c| if c.is_ascii_control() { ' ' } else { c }).collect()
}

/// Canonicalize Arabic text for indexing, retrieval, and prompting.
///
/// Strips ASCII control characters, removes tashkeel and tatweel, collapses
/// whitespace runs to a single space, and trims. Idempotent and total: any
/// input produces some output, and the empty string maps to itself.
///
/// # Example
///
/// ```
/// use bosala_rag::normalize::normalize_arabic;
///
/// assert_eq!(normalize_arabic("القُدسُ   عاصمةُ فلسطين"), "القدس عاصمة فلسطين");
/// ```
pub fn normalize_arabic(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = strip_controls(text);
    let text = TASHKEEL.replace_all(&text, "");
    let text = TATWEEL.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Fold Arabic letter variants for lenient answer matching.
///
/// Applies [`normalize_arabic`], then folds hamza-carrying alif forms to bare
/// alif, alif maqsura to ya, and ta marbuta to ha, lowercases Latin text, and
/// strips punctuation. Scoring-only: the folded form is not valid display
/// text.
pub fn fold_for_matching(text: &str) -> String {
    let text = normalize_arabic(text).to_lowercase();
    let folded: String = text
        .chars()
        .map(|c| match c {
            'أ' | 'إ' | 'آ' => 'ا',
            'ى' => 'ي',
            'ة' => 'ه',
            other => other,
        })
        .collect();
    let folded = NON_WORD.replace_all(&folded, " ");
    WHITESPACE.replace_all(&folded, " ").trim().to_string()
}

/// Filter decoded model output down to Arabic script, digits, and basic
/// punctuation, collapsing the gaps left behind.
///
/// Used by generator post-processing to strip encoding artifacts and stray
/// Latin tokens from the decoded answer.
pub fn arabic_only(text: &str) -> String {
    let text = NON_ARABIC.replace_all(text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
