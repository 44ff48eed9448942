//! Punctuation classification for word tokens.

const SENTENCE_TERMINALS: [char; 4] = ['.', '!', '?', ';'];
const CLOSERS: [char; 8] = ['"', '\'', ')', ']', '}', '»', '”', '’'];

/// Whether a token ends a sentence and should earn a punctuation pause.
///
/// Trailing quotes and brackets are skipped, so `end."` and `(done!)` count.
pub fn ends_sentence(word: &str) -> bool {
    word.chars()
        .rev()
        .find(|ch| !CLOSERS.contains(ch))
        .is_some_and(|ch| SENTENCE_TERMINALS.contains(&ch))
}
