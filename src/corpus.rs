//! Training corpus assembly
//!
//! Normalizes extracted message text and writes the durable corpus file.
//! Two on-disk layouts exist: a JSON object keyed by formatted timestamps
//! (the durable default, colliding timestamps overwrite) and plain text with
//! one sentence per line. Both are accepted back as model-build input.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{Local, TimeZone};

use crate::archive::Message;
use crate::{Error, Result};

/// Key format for the timestamp-keyed corpus, local time
const TIMESTAMP_KEY_FORMAT: &str = "%Y%m%d_%Hh%Mm%Ss.%6f";

/// How corpus records are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusMode {
    /// One record per distinct timestamp key; later records overwrite
    Keyed,
    /// Every record kept, in extraction order
    Ordered,
}

/// The assembled training corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Corpus {
    /// Timestamp key to normalized sentence
    Keyed(BTreeMap<String, String>),
    /// Normalized sentences in extraction order
    Ordered(Vec<String>),
}

/// Normalize one raw message text into a corpus sentence
///
/// Rules, in order: trim surrounding whitespace; drop if empty; append `.`
/// unless the text already ends in `.`, `!`, or `?`; uppercase the first
/// character. Idempotent for text already in normalized form.
#[must_use]
pub fn normalize(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(trimmed.len() + 1);
    let mut chars = trimmed.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }

    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }

    Some(out)
}

impl Corpus {
    /// Assemble a corpus from extracted records
    ///
    /// Records whose text normalizes to nothing are dropped. In keyed mode a
    /// record whose microsecond timestamp cannot be represented as a local
    /// time is dropped as well.
    pub fn build(records: impl IntoIterator<Item = Message>, mode: CorpusMode) -> Self {
        match mode {
            CorpusMode::Keyed => {
                let mut map = BTreeMap::new();
                for record in records {
                    let Some(text) = normalize(&record.text) else {
                        continue;
                    };
                    let Some(key) = timestamp_key(record.timestamp_us) else {
                        tracing::debug!(
                            timestamp_us = record.timestamp_us,
                            "dropping record with unrepresentable timestamp"
                        );
                        continue;
                    };
                    map.insert(key, text);
                }
                Self::Keyed(map)
            }
            CorpusMode::Ordered => Self::Ordered(
                records
                    .into_iter()
                    .filter_map(|r| normalize(&r.text))
                    .collect(),
            ),
        }
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Keyed(map) => map.len(),
            Self::Ordered(lines) => lines.len(),
        }
    }

    /// Whether the corpus holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the corpus to durable storage
    ///
    /// Keyed corpora serialize as a JSON object, ordered corpora as
    /// newline-joined plain text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: &Path) -> Result<()> {
        let contents = match self {
            Self::Keyed(map) => serde_json::to_string(map)?,
            Self::Ordered(lines) => lines.join("\n"),
        };
        fs::write(path, contents)?;
        tracing::info!(path = %path.display(), records = self.len(), "corpus written");
        Ok(())
    }
}

/// Load corpus text for model building
///
/// Accepts either layout transparently: `.txt` files are read as-is, `.json`
/// files are parsed as a string-to-string object and their values joined.
///
/// # Errors
///
/// Returns [`Error::Config`] for unrecognized extensions, otherwise IO or
/// JSON errors from reading the file.
pub fn load_corpus_text(path: &Path) -> Result<String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => Ok(fs::read_to_string(path)?),
        Some("json") => {
            let raw = fs::read_to_string(path)?;
            let map: BTreeMap<String, String> = serde_json::from_str(&raw)?;
            Ok(map.into_values().collect::<Vec<_>>().join(" "))
        }
        _ => Err(Error::Config(format!(
            "unsupported corpus file: {}",
            path.display()
        ))),
    }
}

fn timestamp_key(timestamp_us: i64) -> Option<String> {
    Local
        .timestamp_micros(timestamp_us)
        .single()
        .map(|dt| dt.format(TIMESTAMP_KEY_FORMAT).to_string())
}
