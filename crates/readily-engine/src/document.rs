//! Immutable tokenized document.

use alloc::{string::String, vec::Vec};

use crate::text_policy::ends_sentence;

/// One whitespace-delimited word of a [`Document`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WordToken {
    pub text: String,
    pub ends_sentence: bool,
}

impl WordToken {
    pub fn new(text: &str) -> Self {
        Self {
            text: String::from(text),
            ends_sentence: ends_sentence(text),
        }
    }
}

/// Word stream tokenized once at session start and never mutated.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Document {
    words: Vec<WordToken>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let mut words = Vec::with_capacity(count_words(text));
        let mut cursor = 0usize;
        while let Some((word, next_cursor)) = next_word_at(text, cursor) {
            words.push(WordToken::new(word));
            cursor = next_cursor;
        }
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, index: usize) -> Option<&WordToken> {
        self.words.get(index)
    }

    pub fn words(&self) -> &[WordToken] {
        &self.words
    }

    pub fn into_words(self) -> Vec<WordToken> {
        self.words
    }
}

impl From<Vec<WordToken>> for Document {
    fn from(words: Vec<WordToken>) -> Self {
        Self { words }
    }
}

pub(crate) fn count_words(text: &str) -> usize {
    let mut count = 0usize;
    let mut cursor = 0usize;

    while let Some((_, next_cursor)) = next_word_at(text, cursor) {
        count += 1;
        cursor = next_cursor;
    }

    count
}

/// Next word starting the scan at byte `cursor`, with the byte offset just past it.
pub(crate) fn next_word_at(text: &str, cursor: usize) -> Option<(&str, usize)> {
    let rest = text.get(cursor..)?;
    let start = cursor + rest.find(|ch: char| !ch.is_whitespace())?;
    let tail = &text[start..];
    let len = tail.find(char::is_whitespace).unwrap_or(tail.len());
    Some((&text[start..start + len], start + len))
}
