//! Text segmentation for incremental synthesis.
//!
//! Sentences are closed on terminators; sentences longer than the chunk budget
//! are further split on phrase delimiters or on the length limit itself.
//! Lengths are counted in `char`s.

use serde::Serialize;
use tracing::debug;

/// Characters that close a sentence (Latin and CJK).
pub const SENTENCE_TERMINATORS: [char; 8] = ['。', '！', '？', '.', '!', '?', ';', '；'];
/// Characters that may close a phrase inside an over-long sentence.
pub const PHRASE_DELIMITERS: [char; 4] = ['，', ',', '、', '·'];
/// A phrase delimiter only splits once the chunk holds more than this many chars.
pub const MIN_PHRASE_LEN: usize = 20;

pub const DEFAULT_MAX_CHUNK_LEN: usize = 50;
pub const DEFAULT_MAX_PHRASE_LEN: usize = 100;

fn is_terminator(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}

fn is_phrase_delimiter(c: char) -> bool {
    PHRASE_DELIMITERS.contains(&c)
}

/// One unit of incremental synthesis, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    pub text: String,
    pub index: usize,
    pub total: usize,
}

impl TextSegment {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Ordered, finite sequence of segments for one request. Consumed once.
#[derive(Debug)]
pub struct Segments {
    inner: std::vec::IntoIter<TextSegment>,
    total: usize,
}

impl Segments {
    fn new(chunks: Vec<String>) -> Self {
        let total = chunks.len();
        let segments: Vec<TextSegment> = chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextSegment { text, index, total })
            .collect();
        Self {
            inner: segments.into_iter(),
            total,
        }
    }

    /// Number of segments the request was split into.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for Segments {
    type Item = TextSegment;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Segments {}

fn push_trimmed(out: &mut Vec<String>, buf: &mut String) {
    let chunk = buf.trim();
    if !chunk.is_empty() {
        out.push(chunk.to_string());
    }
    buf.clear();
}

/// Split on sentence terminators; trailing text without one becomes the last sentence.
pub fn split_by_sentence(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if is_terminator(c) {
            push_trimmed(&mut sentences, &mut current);
        }
    }
    push_trimmed(&mut sentences, &mut current);

    debug!(count = sentences.len(), "split text into sentences");
    sentences
}

/// Split into chunks of at most `max_len` chars, preferring terminators and,
/// once enough text has accumulated, phrase delimiters.
pub fn split_by_phrase(text: &str, max_len: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let max_len = max_len.max(1);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut len = 0usize;
    for c in text.chars() {
        current.push(c);
        len += 1;

        let close = len >= max_len
            || is_terminator(c)
            || (is_phrase_delimiter(c) && len > MIN_PHRASE_LEN);
        if close {
            push_trimmed(&mut chunks, &mut current);
            len = 0;
        }
    }
    push_trimmed(&mut chunks, &mut current);

    debug!(count = chunks.len(), max_len, "split text into phrases");
    chunks
}

/// Sentences within budget pass through unchanged; longer ones are replaced
/// by their phrase split, in place.
pub fn split_for_streaming(text: &str, max_chunk_len: usize) -> Segments {
    let mut chunks = Vec::new();
    for sentence in split_by_sentence(text) {
        if sentence.chars().count() <= max_chunk_len {
            chunks.push(sentence);
        } else {
            chunks.extend(split_by_phrase(&sentence, max_chunk_len));
        }
    }

    debug!(count = chunks.len(), max_chunk_len, "split text into streaming chunks");
    Segments::new(chunks)
}

/// Treat the whole text as a single segment (engines that segment internally).
pub fn single_segment(text: &str) -> Segments {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Segments::new(Vec::new())
    } else {
        Segments::new(vec![trimmed.to_string()])
    }
}
