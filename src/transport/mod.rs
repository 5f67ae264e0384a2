//! Chat transport capability
//!
//! The wire protocol itself is external; the session only needs connect and
//! disconnect, stanza sends, and a sequential event stream. Implementations
//! plug in through the [`ChatTransport`] trait.

mod loopback;

use async_trait::async_trait;

use crate::Result;

pub use loopback::LoopbackTransport;

/// One contact visible to an authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Chat address of the contact
    pub id: String,

    /// Display name, when the server provided one
    pub name: Option<String>,
}

/// Identity names presented by the server certificate during handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Certificate subject common name
    pub subject: String,

    /// Subject alternative names
    pub alt_names: Vec<String>,
}

/// Protocol events reported by the transport, in connection order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A fresh low-level connection exists; fired again on auto-reconnect
    Connected,

    /// Certificate did not match the connection hostname; the session
    /// decides whether the presented identity is trusted anyway
    InvalidCert(CertInfo),

    /// Handshake finished and the session is bound to an identity
    SessionStart {
        /// The address this session is bound to
        bound_id: String,
    },

    /// The connection closed
    Disconnected,
}

/// Why a roster request failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// Server took too long to answer; non-fatal for the session
    Timeout,

    /// Server returned an explicit protocol error condition
    Protocol(String),
}

/// External chat transport capability
///
/// One connection, sequential protocol events. The session layers its state
/// machine on top and owns credential injection and trust decisions.
#[async_trait]
pub trait ChatTransport: Send {
    /// Open the low-level connection
    async fn connect(&mut self, host: &str, port: u16) -> Result<()>;

    /// Bind the authentication secret used by the next handshake
    fn set_auth_token(&mut self, token: &str);

    /// Next protocol event, or `None` once the stream is exhausted
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Broadcast initial presence
    async fn send_presence(&mut self) -> Result<()>;

    /// Request the contact roster
    async fn request_roster(&mut self) -> std::result::Result<Vec<Contact>, RosterError>;

    /// Send one chat message
    async fn send_message(&mut self, to: &str, body: &str) -> Result<()>;

    /// Wait until all queued outbound stanzas are on the wire
    async fn flush(&mut self) -> Result<()>;

    /// Close the connection with a proper close handshake
    async fn disconnect(&mut self) -> Result<()>;

    /// Drop the connection without a close handshake
    ///
    /// Used on trust failures, where a protocol-level close would expose
    /// partially-authenticated state.
    async fn abort(&mut self);
}
