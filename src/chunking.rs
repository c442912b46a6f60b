//! Sentence splitting and sentence-group chunking.
//!
//! Documents are segmented on terminal punctuation and regrouped into
//! fixed-size sentence groups, which are the atomic retrievable unit. The
//! grouping is lossless: every input sentence lands in exactly one chunk, in
//! order, including a trailing partial group.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Chunk, Document};
use crate::normalize::normalize_arabic;

/// Arabic and Latin terminal punctuation.
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!؟]+").expect("valid regex"));

/// Split text into sentences on terminal punctuation.
///
/// Fragments that are empty after trimming are dropped. An empty input
/// yields an empty vector.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    SENTENCE_BOUNDARY
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Greedily group sentences into chunks of up to `group_size` sentences.
///
/// Each chunk is the group joined by single spaces. The final partial group
/// is kept. `group_size` is clamped to at least 1 so a misconfigured zero
/// never loops or drops input.
pub fn chunk_sentences(sentences: &[String], group_size: usize) -> Vec<String> {
    let group_size = group_size.max(1);
    sentences.chunks(group_size).map(|group| group.join(" ")).collect()
}

/// A chunker that normalizes a document and groups its sentences.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    group_size: usize,
}

impl SentenceChunker {
    /// Create a chunker producing groups of up to `group_size` sentences.
    pub fn new(group_size: usize) -> Self {
        Self { group_size: group_size.max(1) }
    }

    /// Normalize the document text and split it into ordered [`Chunk`]s.
    ///
    /// Returns an empty vector for documents with no sentence content.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let normalized = normalize_arabic(&document.text);
        let sentences = split_into_sentences(&normalized);
        chunk_sentences(&sentences, self.group_size)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk { document_id: document.id.clone(), index, text })
            .collect()
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        // Five sentences per chunk matches the corpus preparation jobs.
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_on_arabic_and_latin_punctuation() {
        let sentences = split_into_sentences("القدس عاصمة فلسطين. ما هي عاصمة مصر؟ القاهرة!");
        assert_eq!(sentences, vec!["القدس عاصمة فلسطين", "ما هي عاصمة مصر", "القاهرة"]);
    }

    #[test]
    fn empty_text_yields_no_sentences() {
        assert!(split_into_sentences("").is_empty());
        assert!(split_into_sentences("...!!؟").is_empty());
    }

    #[test]
    fn trailing_partial_group_is_kept() {
        let sentences: Vec<String> = (0..7).map(|i| format!("جملة {i}")).collect();
        let chunks = chunk_sentences(&sentences, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "جملة 6");
    }

    #[test]
    fn group_size_zero_is_clamped() {
        let sentences = vec!["أ".to_string(), "ب".to_string()];
        assert_eq!(chunk_sentences(&sentences, 0).len(), 2);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_sentences(&[], 5).is_empty());
    }

    #[test]
    fn chunker_assigns_ordinals() {
        let doc = Document::new("d1", "الأولى. الثانية. الثالثة. الرابعة. الخامسة. السادسة.");
        let chunks = SentenceChunker::new(5).chunk(&doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].document_id, "d1");
        assert_eq!(chunks[1].text, "السادسة");
    }

    proptest! {
        /// Concatenating all chunks' sentences reconstructs the input.
        #[test]
        fn chunking_loses_no_sentences(
            sentences in proptest::collection::vec("[ا-ي]{1,6}( [ا-ي]{1,6}){0,3}", 0..40),
            group_size in 1usize..10,
        ) {
            let chunks = chunk_sentences(&sentences, group_size);
            let rejoined: Vec<String> = chunks
                .iter()
                .flat_map(|c| c.split(' ').map(String::from))
                .collect();
            let expected: Vec<String> = sentences
                .iter()
                .flat_map(|s| s.split(' ').map(String::from))
                .collect();
            prop_assert_eq!(rejoined, expected);

            if !sentences.is_empty() && sentences.len() % group_size != 0 {
                let tail = chunks.last().unwrap();
                let tail_sentences = sentences.len() % group_size;
                // Tail chunk carries exactly the leftover sentences.
                let expected_tail = sentences[sentences.len() - tail_sentences..].join(" ");
                prop_assert_eq!(tail, &expected_tail);
            }
        }
    }
}
