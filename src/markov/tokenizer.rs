//! Tokenizer strategies for the chain
//!
//! A tokenizer only changes how sentences are split and re-joined, never the
//! sampling algorithm. The tagged variant attaches a coarse part-of-speech
//! class to each token and discards it again on join.

/// Separator between a word and its tag inside one token
///
/// ASCII unit separator, cannot appear in whitespace-split words.
const TAG_SEP: char = '\u{1f}';

/// Splits sentences into tokens and joins generated tokens back into text
pub trait Tokenizer: Send + Sync {
    /// Split one sentence into tokens
    fn split(&self, sentence: &str) -> Vec<String>;

    /// Join generated tokens back into a sentence
    fn join(&self, tokens: &[String]) -> String;
}

/// Plain whitespace tokenizer
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn split(&self, sentence: &str) -> Vec<String> {
        sentence.split_whitespace().map(ToString::to_string).collect()
    }

    fn join(&self, tokens: &[String]) -> String {
        tokens.join(" ")
    }
}

/// Whitespace tokenizer that tags each token with a word class
///
/// Tagging distinguishes homographs during training, so "run" the noun and
/// "running" the verb feed different chain states.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedTokenizer;

impl Tokenizer for TaggedTokenizer {
    fn split(&self, sentence: &str) -> Vec<String> {
        sentence
            .split_whitespace()
            .map(|word| format!("{word}{TAG_SEP}{}", word_class(word)))
            .collect()
    }

    fn join(&self, tokens: &[String]) -> String {
        tokens
            .iter()
            .map(|token| token.split(TAG_SEP).next().unwrap_or(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Coarse word-class heuristic
///
/// Good enough to separate chain states; no external model involved.
fn word_class(word: &str) -> &'static str {
    let bare: String = word
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '\'')
        .collect();
    let lower = bare.to_lowercase();

    if bare.is_empty() {
        "SYM"
    } else if bare.chars().all(char::is_numeric) {
        "NUM"
    } else if matches!(
        lower.as_str(),
        "the" | "a" | "an" | "this" | "that" | "these" | "those"
    ) {
        "DET"
    } else if matches!(
        lower.as_str(),
        "i" | "you" | "he" | "she" | "it" | "we" | "they" | "me" | "him" | "her" | "us" | "them"
    ) {
        "PRON"
    } else if matches!(
        lower.as_str(),
        "in" | "on" | "at" | "to" | "of" | "for" | "with" | "by" | "from"
    ) {
        "PREP"
    } else if lower.ends_with("ly") {
        "ADV"
    } else if lower.ends_with("ing") || lower.ends_with("ed") {
        "VERB"
    } else {
        "NOUN"
    }
}
