//! Takeout archive parser
//!
//! Walks the nested conversation export and yields flat `(timestamp, text)`
//! records for one conversation. Takeout events are heterogeneous; records
//! missing a timestamp or text segment are skipped, never treated as errors.

use serde::Deserialize;

use crate::{Error, Result};

/// A parsed chat export archive
///
/// Owns the decoded conversation states for the duration of one extraction
/// pass. Extraction itself is lazy, see [`Archive::messages`].
#[derive(Debug)]
pub struct Archive {
    states: Vec<StateWrapper>,
}

/// One extracted chat message record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Epoch time in microseconds
    pub timestamp_us: i64,

    /// Raw text of one segment
    pub text: String,
}

/// A conversation id paired with the participant names found for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Opaque conversation identifier
    pub id: String,

    /// Best-effort participant display names (missing names are omitted)
    pub participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TakeoutRoot {
    #[serde(default)]
    conversation_state: Vec<StateWrapper>,
}

#[derive(Debug, Deserialize)]
struct StateWrapper {
    conversation_state: Option<ConversationState>,
}

#[derive(Debug, Deserialize)]
struct ConversationState {
    conversation_id: Option<IdRef>,
    conversation: Option<Conversation>,
    #[serde(default)]
    event: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Conversation {
    #[serde(default)]
    participant_data: Vec<Participant>,
}

#[derive(Debug, Deserialize)]
struct Participant {
    fallback_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Event {
    conversation_id: Option<IdRef>,
    timestamp: Option<Timestamp>,
    chat_message: Option<ChatMessage>,
}

/// Takeout encodes microsecond timestamps as strings; tolerate numbers too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Num(i64),
    Text(String),
}

impl Timestamp {
    fn as_micros(&self) -> Option<i64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    message_content: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    segment: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    text: Option<String>,
}

impl Archive {
    /// Parse an archive from raw JSON bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveFormat`] if the top-level shape is not a
    /// takeout conversation export. Malformed records *inside* a recognized
    /// archive never fail here; they are dropped during extraction.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let root: TakeoutRoot = serde_json::from_slice(bytes)
            .map_err(|e| Error::ArchiveFormat(e.to_string()))?;

        Ok(Self {
            states: root.conversation_state,
        })
    }

    /// Iterate over the text records of one conversation, in archive order
    ///
    /// The sequence is lazy, finite, and non-restartable. Events without a
    /// timestamp, without a chat message, or with empty segments yield
    /// nothing.
    pub fn messages<'a>(
        &'a self,
        conversation_id: &'a str,
    ) -> impl Iterator<Item = Message> + 'a {
        self.states
            .iter()
            .filter_map(|w| w.conversation_state.as_ref())
            .flat_map(move |state| {
                let state_id = state
                    .conversation_id
                    .as_ref()
                    .and_then(|r| r.id.as_deref());

                state.event.iter().flat_map(move |event| {
                    extract_records(event, state_id, conversation_id)
                })
            })
    }

    /// Enumerate distinct conversation ids with their participant names
    ///
    /// Supports conversation selection by the CLI. Missing display-name
    /// fields are omitted, never fatal.
    #[must_use]
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        let mut seen = Vec::new();
        let mut out = Vec::new();

        for state in self.states.iter().filter_map(|w| w.conversation_state.as_ref()) {
            let Some(id) = state.conversation_id.as_ref().and_then(|r| r.id.clone()) else {
                continue;
            };
            if seen.contains(&id) {
                continue;
            }

            let participants = state
                .conversation
                .as_ref()
                .map(|c| {
                    c.participant_data
                        .iter()
                        .filter_map(|p| p.fallback_name.clone())
                        .collect()
                })
                .unwrap_or_default();

            seen.push(id.clone());
            out.push(ConversationSummary { id, participants });
        }

        out
    }
}

/// Pull the text records out of one event, or nothing if the event does not
/// belong to the target conversation or lacks the required fields
fn extract_records<'a>(
    event: &'a Event,
    state_id: Option<&'a str>,
    target: &str,
) -> impl Iterator<Item = Message> + 'a {
    // Events carry their own conversation id; fall back to the state's
    let event_id = event
        .conversation_id
        .as_ref()
        .and_then(|r| r.id.as_deref())
        .or(state_id);

    let matches = event_id == Some(target);
    let timestamp_us = event.timestamp.as_ref().and_then(Timestamp::as_micros);

    let segments = if matches && timestamp_us.is_some() {
        event
            .chat_message
            .as_ref()
            .and_then(|m| m.message_content.as_ref())
            .map(|c| c.segment.as_slice())
            .unwrap_or_default()
    } else {
        &[]
    };

    segments.iter().filter_map(move |seg| {
        let text = seg.text.as_ref()?;
        if text.is_empty() {
            return None;
        }
        Some(Message {
            timestamp_us: timestamp_us?,
            text: text.clone(),
        })
    })
}
