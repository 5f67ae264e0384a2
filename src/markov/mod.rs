//! Markov text generation
//!
//! A fixed-order chain over token windows, trained from the corpus and
//! serialized to the model cache as JSON. Generation produces bounded-length
//! sentences; callers fall back to a placeholder when the retry budget is
//! exhausted, generation never errors.

mod cache;
pub mod tokenizer;

use std::collections::HashMap;

use rand::Rng;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use serde::{Deserialize, Serialize};

pub use cache::{ModelSource, load_or_build};
pub use tokenizer::{TaggedTokenizer, Tokenizer, WordTokenizer};

/// Sentinel padding the start of every training run
const BEGIN: &str = "___BEGIN__";
/// Sentinel terminating every training run
const END: &str = "___END__";

/// Attempts before `make_short_sentence` gives up
const DEFAULT_TRIES: usize = 10;
/// Hard cap on tokens per generated sentence, guards against loops in the
/// transition table
const MAX_SENTENCE_TOKENS: usize = 100;

/// Generated sentences overlapping the source text beyond this ratio of
/// their own length are rejected as unoriginal
const MAX_OVERLAP_RATIO: f64 = 0.7;
/// Absolute cap on the overlap window, in tokens
const MAX_OVERLAP_TOTAL: usize = 15;

/// A trained fixed-order Markov chain
///
/// Two chains are interchangeable only if their order matches; the cache
/// layer invalidates a persisted chain whose order differs from the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    order: usize,
    transitions: HashMap<String, HashMap<String, u32>>,
}

impl Chain {
    /// Train a new chain from corpus text
    ///
    /// Sentences are delimited by line breaks and terminal punctuation, then
    /// split into tokens by the given tokenizer.
    pub fn build(text: &str, order: usize, tokenizer: &dyn Tokenizer) -> Self {
        let order = order.max(1);
        let mut transitions: HashMap<String, HashMap<String, u32>> = HashMap::new();

        for sentence in split_sentences(text) {
            let tokens = tokenizer.split(&sentence);
            if tokens.is_empty() {
                continue;
            }

            let mut window: Vec<String> = vec![BEGIN.to_string(); order];
            for token in tokens.into_iter().chain([END.to_string()]) {
                let state = window.join(" ");
                *transitions
                    .entry(state)
                    .or_default()
                    .entry(token.clone())
                    .or_insert(0) += 1;
                window.remove(0);
                window.push(token);
            }
        }

        tracing::debug!(order, states = transitions.len(), "chain trained");
        Self { order, transitions }
    }

    /// The number of prior tokens this chain conditions on
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Whether the chain has no transitions at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Produce one bounded-length sentence, or `None` when the retry budget
    /// is exhausted
    ///
    /// `source` is the training text, consulted only to reject sentences
    /// that reproduce it too closely. A sentence passes when it fits in
    /// `max_chars` and is sufficiently original.
    pub fn make_short_sentence(
        &self,
        source: &str,
        max_chars: usize,
        tokenizer: &dyn Tokenizer,
        rng: &mut impl Rng,
    ) -> Option<String> {
        for attempt in 0..DEFAULT_TRIES {
            let Some(tokens) = self.walk(rng) else {
                continue;
            };
            let sentence = tokenizer.join(&tokens);

            if sentence.chars().count() > max_chars {
                tracing::trace!(attempt, len = sentence.len(), "sentence over length bound");
                continue;
            }
            if !is_original(&sentence, source) {
                tracing::trace!(attempt, "sentence reproduces the source text");
                continue;
            }
            return Some(sentence);
        }

        None
    }

    /// Sample one token run from BEGIN to END
    fn walk(&self, rng: &mut impl Rng) -> Option<Vec<String>> {
        let mut window: Vec<String> = vec![BEGIN.to_string(); self.order];
        let mut tokens = Vec::new();

        while tokens.len() < MAX_SENTENCE_TOKENS {
            let next = self.sample(&window.join(" "), rng)?;
            if next == END {
                return Some(tokens);
            }
            window.remove(0);
            window.push(next.clone());
            tokens.push(next);
        }

        // Never reached END within the cap; treat as a failed attempt
        None
    }

    /// Weighted pick of the next token for a state
    fn sample(&self, state: &str, rng: &mut impl Rng) -> Option<String> {
        let followers = self.transitions.get(state)?;
        let entries: Vec<(&String, u32)> = followers.iter().map(|(t, c)| (t, *c)).collect();
        let dist = WeightedIndex::new(entries.iter().map(|(_, c)| *c)).ok()?;
        Some(entries[dist.sample(rng)].0.clone())
    }
}

/// Split corpus text into sentences at line breaks and terminal punctuation
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for line in text.lines() {
        let mut current: Vec<&str> = Vec::new();
        for word in line.split_whitespace() {
            current.push(word);
            if word.ends_with(['.', '!', '?']) {
                sentences.push(current.join(" "));
                current.clear();
            }
        }
        if !current.is_empty() {
            sentences.push(current.join(" "));
        }
    }

    sentences
}

/// Reject sentences whose token runs reproduce the source text
///
/// A window of `min(MAX_OVERLAP_TOTAL, ceil(ratio * len))` tokens plus one is
/// slid over the sentence; any window found verbatim in the source fails the
/// check.
fn is_original(sentence: &str, source: &str) -> bool {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let overlap_ratio = (MAX_OVERLAP_RATIO * words.len() as f64).round() as usize;
    let overlap_max = MAX_OVERLAP_TOTAL.min(overlap_ratio);
    let window = overlap_max + 1;
    let gram_count = words.len().saturating_sub(overlap_max).max(1);

    for start in 0..gram_count {
        let end = (start + window).min(words.len());
        let gram = words[start..end].join(" ");
        if source.contains(&gram) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn trains_states_per_order() {
        let chain = Chain::build("One two three.", 1, &WordTokenizer);
        assert_eq!(chain.order(), 1);
        // BEGIN, One, two, three. each carry one follower
        assert_eq!(chain.transitions.len(), 4);
    }

    #[test]
    fn generated_sentences_respect_the_length_bound() {
        let text = "The cat sat down.\nThe dog sat up.\nThe cat ran off.\nA dog ran down.";
        let chain = Chain::build(text, 1, &WordTokenizer);
        let mut rng = rng();

        for _ in 0..20 {
            if let Some(s) = chain.make_short_sentence(text, 30, &WordTokenizer, &mut rng) {
                assert!(s.chars().count() <= 30);
            }
        }
    }

    #[test]
    fn degenerate_corpus_exhausts_the_retry_budget() {
        // Every walk reproduces "Hi." verbatim, so the originality check
        // rejects all attempts
        let text = "Hi.\nHi.\nHi.";
        let chain = Chain::build(text, 1, &WordTokenizer);
        let mut rng = rng();

        assert_eq!(chain.make_short_sentence(text, 3, &WordTokenizer, &mut rng), None);
    }

    #[test]
    fn empty_chain_generates_nothing() {
        let chain = Chain::build("", 2, &WordTokenizer);
        assert!(chain.is_empty());
        assert_eq!(chain.make_short_sentence("", 140, &WordTokenizer, &mut rng()), None);
    }

    #[test]
    fn serializes_with_its_order() {
        let chain = Chain::build("Hello there.", 2, &WordTokenizer);
        let json = serde_json::to_string(&chain).unwrap();
        let back: Chain = serde_json::from_str(&json).unwrap();
        assert_eq!(back.order(), 2);
        assert_eq!(back.transitions, chain.transitions);
    }

    #[test]
    fn sentence_splitting_handles_both_corpus_layouts() {
        assert_eq!(split_sentences("Hi. Bye."), vec!["Hi.", "Bye."]);
        assert_eq!(split_sentences("Hi.\nBye."), vec!["Hi.", "Bye."]);
        assert_eq!(split_sentences("no terminator"), vec!["no terminator"]);
    }

    #[test]
    fn originality_check_rejects_verbatim_reproduction() {
        assert!(!is_original("Hi.", "Hi. Hi. Hi."));
        assert!(is_original("Something else entirely here.", "Hi. Hi. Hi."));
    }
}
