//! Answer generation: prompt assembly, post-processing, and sentinels.
//!
//! Backends implement [`AnswerGenerator`] and return a [`Generation`], the
//! answer text plus a structured outcome, so no caller ever needs to match
//! on sentinel wording to classify a result. The sentinel strings themselves
//! are stable literals because they are user-visible answer text, not a
//! classification channel.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::document::{AnswerOutcome, RetrievedContext};
use crate::normalize::{arabic_only, normalize_arabic};

/// Answer text returned when the generation call itself fails.
pub const GENERATION_FAILED_SENTINEL: &str = "عذراً، حدث خطأ أثناء توليد الإجابة.";

/// Answer text returned when no grounded answer exists in the context.
pub const NO_ANSWER_SENTINEL: &str = "لم يتم العثور على إجابة في السياق المتوفر.";

/// The phrase the instruction block tells the model to emit when the context
/// does not contain the answer.
const NO_ANSWER_MARKER: &str = "لا توجد إجابة";

/// Answer tag used in the prompt and stripped from echoed output.
const ANSWER_TAG: &str = "الإجابة:";

/// Markers of the model wandering into a new question or re-stating context.
static RUN_ON_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*(السؤال|السياق|سؤال|سياق)\b").expect("valid regex"));

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

/// A generation result: the answer text plus its outcome classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// The final answer text (possibly a sentinel).
    pub text: String,
    /// Structured outcome, the classification channel for consumers.
    pub outcome: AnswerOutcome,
}

impl Generation {
    /// A grounded answer.
    pub fn answered(text: impl Into<String>) -> Self {
        Self { text: text.into(), outcome: AnswerOutcome::Answered }
    }

    /// The model found no answer in the supplied context.
    pub fn no_answer() -> Self {
        Self { text: NO_ANSWER_SENTINEL.to_string(), outcome: AnswerOutcome::ContextMissing }
    }

    /// The generation call failed.
    pub fn failed() -> Self {
        Self {
            text: GENERATION_FAILED_SENTINEL.to_string(),
            outcome: AnswerOutcome::GenerationError,
        }
    }
}

/// A generation backend.
///
/// Implementations are infallible by contract: transport and service errors
/// are absorbed into [`Generation::failed`] so the pipeline always returns a
/// structured answer. Variant backends (different model families, different
/// prompt conventions) are selected by constructing a different implementor,
/// never by branching on a model-type string.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer to `question` grounded in `contexts`.
    async fn generate(&self, question: &str, contexts: &[RetrievedContext]) -> Generation;
}

/// Assemble the single prompt sent to the model.
///
/// Layout: an instruction block fixing the response language and restricting
/// the model to the supplied context, the deduplicated context bullets (each
/// truncated to `context_char_budget` characters), and the question with an
/// answer tag for the model to complete.
pub fn build_prompt(
    question: &str,
    contexts: &[RetrievedContext],
    context_char_budget: usize,
) -> String {
    let question = normalize_arabic(question);

    let mut prompt = String::from(
        "أجب عن السؤال التالي باللغة العربية فقط، وبالاعتماد حصراً على السياق المعطى.\n",
    );
    prompt.push_str(&format!(
        "إذا لم يحتوِ السياق على الإجابة فقل: {NO_ANSWER_MARKER}.\n\nالسياق:\n"
    ));

    let mut seen = HashSet::new();
    for context in contexts {
        let text = normalize_arabic(&context.text);
        if text.is_empty() || !seen.insert(text.clone()) {
            continue;
        }
        let clipped: String = text.chars().take(context_char_budget).collect();
        prompt.push_str("- ");
        prompt.push_str(&clipped);
        prompt.push('\n');
    }

    prompt.push_str(&format!("\nالسؤال: {question}\n{ANSWER_TAG}"));
    prompt
}

/// Extract the answer continuation from raw model output.
///
/// Strips any echoed prompt up to the last answer tag, cuts at the first
/// blank line or run-on marker (a new question/context line), filters to
/// Arabic script plus basic punctuation, and collapses whitespace.
pub fn extract_answer(raw: &str) -> String {
    let after_tag = match raw.rfind(ANSWER_TAG) {
        Some(pos) => &raw[pos + ANSWER_TAG.len()..],
        None => raw,
    };
    let cut = match BLANK_LINE.find(after_tag) {
        Some(m) => &after_tag[..m.start()],
        None => after_tag,
    };
    let cut = match RUN_ON_MARKER.find(cut) {
        Some(m) => &cut[..m.start()],
        None => cut,
    };
    arabic_only(cut)
}

/// Classify raw model output into a [`Generation`].
///
/// Empty post-processed output and the instructed no-answer marker both map
/// to [`Generation::no_answer`]; anything else is a grounded answer.
pub fn classify_output(raw: &str) -> Generation {
    let answer = extract_answer(raw);
    if answer.is_empty() || answer.contains(NO_ANSWER_MARKER) {
        return Generation::no_answer();
    }
    Generation::answered(answer)
}
