//! Whitespace/sentence-boundary tokenizer (spec §6).
//!
//! Grounded on `examples/original_source/pysteg/googlebooks/ngrams_analysis.py`'s
//! `text2token_strings`/`token_strings2text`. Only the whitespace/sentence
//! segmentation survives here: normalization, punctuation explosion and
//! POS-tag stripping are bulk-loader concerns (spec's Non-goals) and the
//! vocabulary lookup that follows tokenization raises [`StegError::Vocabulary`]
//! for anything the index doesn't recognise.

use crate::error::{Result, StegError};
use crate::vocab::{Vocabulary, END_STR, START_STR};

/// Split `text` into token strings, framed by `_START_`/`_END_`.
///
/// A run of two or more whitespace characters marks a sentence break and
/// becomes `_END_ _START_`; a single whitespace character just separates
/// two tokens. The whole text is wrapped in a leading `_START_` and a
/// trailing `_END_`.
pub fn text2token_strings(text: &str) -> Vec<String> {
    let mut tokens = vec![START_STR.to_string()];
    let mut chars = text.chars().peekable();
    let mut current = String::new();

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            flush(&mut current, &mut tokens);
            let mut run = 1;
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
                run += 1;
            }
            if run >= 2 {
                tokens.push(END_STR.to_string());
                tokens.push(START_STR.to_string());
            }
        } else {
            current.push(c);
        }
    }
    flush(&mut current, &mut tokens);
    tokens.push(END_STR.to_string());
    tokens
}

/// The inverse of [`text2token_strings`]: `_START_`/`_END_` each render as
/// the empty string and every token (sentinel or word) is then joined with
/// a single space, so a sentinel sitting next to a word contributes the
/// run of two adjacent spaces that marks the sentence break it came from,
/// while two adjacent words stay separated by exactly one.
pub fn token_strings2text(tokens: &[String]) -> String {
    let rendered: Vec<&str> = tokens
        .iter()
        .map(|t| {
            if t == START_STR || t == END_STR {
                ""
            } else {
                t.as_str()
            }
        })
        .collect();
    let joined = rendered.join(" ");

    let mut out = String::with_capacity(joined.len());
    let mut chars = joined.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' {
            let mut run = 1;
            while chars.peek() == Some(&' ') {
                chars.next();
                run += 1;
            }
            out.push_str(if run >= 2 { "  " } else { " " });
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

/// Tokenize `text` and resolve every token string against `vocab`,
/// returning token ids. Raises [`StegError::Vocabulary`] on any token the
/// index doesn't know.
pub fn text2token_ids(text: &str, vocab: &Vocabulary) -> Result<Vec<u32>> {
    text2token_strings(text)
        .iter()
        .map(|s| vocab.s2i(s))
        .collect()
}

/// The inverse: resolve token ids back to strings via `vocab`, then render
/// to text with [`token_strings2text`].
pub fn token_ids2text(ids: &[u32], vocab: &Vocabulary) -> Result<String> {
    let strings: Vec<String> = ids
        .iter()
        .map(|&id| vocab.i2s(id).map(|s| s.to_string()))
        .collect::<Result<_>>()?;
    Ok(token_strings2text(&strings))
}

/// Resolve a single token string, surfacing [`StegError::Vocabulary`] by
/// name instead of leaving callers to match on the generic variant blind.
pub fn resolve_token(s: &str, vocab: &Vocabulary) -> Result<u32> {
    vocab
        .s2i(s)
        .map_err(|_| StegError::Vocabulary(format!("token {s:?} is not in the vocabulary")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_single_sentence_in_sentinels() {
        let tokens = text2token_strings("a b a");
        assert_eq!(tokens, vec!["_START_", "a", "b", "a", "_END_"]);
    }

    #[test]
    fn double_whitespace_marks_sentence_break() {
        let tokens = text2token_strings("a b  c d");
        assert_eq!(
            tokens,
            vec!["_START_", "a", "b", "_END_", "_START_", "c", "d", "_END_"]
        );
    }

    #[test]
    fn strings2text_is_a_well_behaved_inverse_for_single_sentences() {
        let text = "a b a";
        let tokens = text2token_strings(text);
        assert_eq!(token_strings2text(&tokens), text);
    }

    #[test]
    fn strings2text_collapses_sentence_breaks_to_two_spaces() {
        let tokens = text2token_strings("a b  c d");
        let back = token_strings2text(&tokens);
        assert_eq!(back, "a b  c d");
    }

    #[test]
    fn unknown_token_is_a_vocabulary_error() {
        let vocab_text = "1\t_START_\t_\n2\t_END_\t_\n3\ta\tA_\n";
        let vocab = Vocabulary::load(std::io::Cursor::new(vocab_text)).unwrap();
        assert!(matches!(
            text2token_ids("a z", &vocab),
            Err(StegError::Vocabulary(_))
        ));
    }

    #[test]
    fn ids_roundtrip_through_text() {
        let vocab_text = "1\t_START_\t_\n2\t_END_\t_\n3\ta\tA_\n4\tb\tB_\n";
        let vocab = Vocabulary::load(std::io::Cursor::new(vocab_text)).unwrap();
        let ids = text2token_ids("a b a", &vocab).unwrap();
        assert_eq!(ids, vec![1, 3, 4, 3, 2]);
        assert_eq!(token_ids2text(&ids, &vocab).unwrap(), "a b a");
    }
}
