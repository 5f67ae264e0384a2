//! wynbot - a chat bot that mimics a contact's writing style
//!
//! Two coupled subsystems make up the core:
//! - the corpus-to-model pipeline: takeout archive → normalized corpus →
//!   cached Markov chain → one generated message
//! - the authenticated session manager: OAuth2 credential lifecycle plus a
//!   connection state machine over a pluggable chat transport
//!
//! # Architecture
//!
//! ```text
//! archive bytes → records → corpus text → model → message → session → wire
//! ```
//!
//! Data flows strictly downstream; the CLI in `main.rs` only sequences the
//! steps.

pub mod archive;
pub mod auth;
pub mod config;
pub mod corpus;
pub mod error;
pub mod markov;
pub mod session;
pub mod transport;

/// Placeholder sent when the model cannot produce a sentence within its
/// retry budget; delivery never blocks on generation quality
pub const FALLBACK_MESSAGE: &str = "failed to generate message";

pub use archive::{Archive, ConversationSummary, Message};
pub use auth::{AuthPrompt, Credential, CredentialManager, StdinPrompt, TokenProvider};
pub use config::Config;
pub use corpus::{Corpus, CorpusMode, normalize};
pub use error::{Error, Result};
pub use markov::{Chain, ModelSource, TaggedTokenizer, Tokenizer, WordTokenizer, load_or_build};
pub use session::{ChatSession, SessionConfig, SessionState};
pub use transport::{
    CertInfo, ChatTransport, Contact, LoopbackTransport, RosterError, TransportEvent,
};
