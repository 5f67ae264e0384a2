//! Chat session state machine
//!
//! Layers connection lifecycle on an external chat transport: credential
//! injection on every fresh connection, certificate trust decisions, roster
//! bring-up with a settling delay, delivery, and graceful teardown.
//!
//! States: `Disconnected → Connecting → Authenticated → RosterReady →
//! Sending → Disconnected`. Trust or handshake failures drop straight back
//! to `Disconnected`. A transport-level auto-reconnect re-enters at
//! `Connecting` and re-runs credential injection.

use std::time::Duration;

use crate::auth::TokenProvider;
use crate::transport::{CertInfo, ChatTransport, Contact, RosterError, TransportEvent};
use crate::{Error, Result};

/// Well-known chat endpoint host
pub const CHAT_HOST: &str = "talk.google.com";
/// Well-known chat endpoint port
pub const CHAT_PORT: u16 = 5222;

/// Contact presence propagates asynchronously with no completion signal;
/// the roster is treated as populated only after this grace period
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection
    Disconnected,
    /// Low-level connection in progress, handshake not yet complete
    Connecting,
    /// Handshake done, session bound to an identity
    Authenticated,
    /// Roster requested and settling delay elapsed
    RosterReady,
    /// Outbound delivery in progress
    Sending,
}

/// Session parameters
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Chat endpoint host
    pub host: String,

    /// Chat endpoint port
    pub port: u16,

    /// Service identity the server certificate must cover, independent of
    /// the connection hostname (custom-domain deployments present the
    /// service certificate, not the domain's)
    pub expected_identity: String,

    /// Grace period after the roster request
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: CHAT_HOST.to_string(),
            port: CHAT_PORT,
            expected_identity: CHAT_HOST.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// A chat session over a pluggable transport
pub struct ChatSession<T: ChatTransport> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
    roster: Vec<Contact>,
    own_id: Option<String>,
}

impl<T: ChatTransport> ChatSession<T> {
    /// Create a session in the `Disconnected` state
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Disconnected,
            roster: Vec::new(),
            own_id: None,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Contacts discovered during bring-up
    #[must_use]
    pub fn roster(&self) -> &[Contact] {
        &self.roster
    }

    /// The identity this session is bound to, once authenticated
    #[must_use]
    pub fn own_id(&self) -> Option<&str> {
        self.own_id.as_deref()
    }

    /// Connect and drive the session to `RosterReady`
    ///
    /// Every `Connected` event from the transport, including auto-reconnects,
    /// triggers a fresh token validity check before the handshake proceeds;
    /// a reconnect that reused a stale token would fail authentication
    /// silently.
    ///
    /// # Errors
    ///
    /// Certificate trust failures, credential exchange failures, and
    /// explicit roster protocol errors are fatal for this connection
    /// attempt. A roster timeout is logged and the session proceeds with a
    /// possibly-empty roster.
    pub async fn connect(&mut self, tokens: &mut dyn TokenProvider) -> Result<()> {
        self.state = SessionState::Connecting;
        self.transport
            .connect(&self.config.host, self.config.port)
            .await?;

        loop {
            let Some(event) = self.transport.next_event().await else {
                self.state = SessionState::Disconnected;
                return Err(Error::Session(
                    "transport event stream ended before session start".into(),
                ));
            };

            match event {
                TransportEvent::Connected => {
                    // Token refresh must complete before the handshake runs
                    let credential = tokens.access_token().await?;
                    self.transport.set_auth_token(&credential.access_token);
                    tracing::debug!("fresh credential bound for handshake");
                }
                TransportEvent::InvalidCert(info) => {
                    if identity_matches(&self.config.expected_identity, &info) {
                        tracing::debug!(
                            identity = %self.config.expected_identity,
                            "certificate covers the expected service identity"
                        );
                    } else {
                        // No close handshake: don't expose the
                        // partially-authenticated state
                        self.transport.abort().await;
                        self.state = SessionState::Disconnected;
                        return Err(Error::CertificateTrust(format!(
                            "certificate for {} does not cover {}",
                            info.subject, self.config.expected_identity
                        )));
                    }
                }
                TransportEvent::SessionStart { bound_id } => {
                    tracing::info!(%bound_id, "session established");
                    self.own_id = Some(bound_id);
                    self.state = SessionState::Authenticated;
                    self.bring_up().await?;
                    return Ok(());
                }
                TransportEvent::Disconnected => {
                    self.state = SessionState::Disconnected;
                    return Err(Error::Session(
                        "connection closed before session start".into(),
                    ));
                }
            }
        }
    }

    /// Presence broadcast, roster request, settling delay
    async fn bring_up(&mut self) -> Result<()> {
        self.transport.send_presence().await?;

        match self.transport.request_roster().await {
            Ok(contacts) => {
                tracing::debug!(contacts = contacts.len(), "roster received");
                self.roster = contacts;
            }
            Err(RosterError::Timeout) => {
                tracing::warn!("roster request timed out, proceeding with empty roster");
            }
            Err(RosterError::Protocol(condition)) => {
                self.transport.disconnect().await?;
                self.state = SessionState::Disconnected;
                return Err(Error::RosterProtocol(condition));
            }
        }

        tokio::time::sleep(self.config.settle_delay).await;
        self.state = SessionState::RosterReady;
        Ok(())
    }

    /// Send `body` to every roster contact except self
    ///
    /// Returns the number of recipients actually reached. A failure partway
    /// through a broadcast stops delivery; the count reflects what was sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the session is not ready to send.
    pub async fn send_to_all(&mut self, body: &str) -> Result<usize> {
        let recipients: Vec<String> = self
            .roster
            .iter()
            .map(|c| c.id.clone())
            .filter(|id| Some(id.as_str()) != self.own_id.as_deref())
            .collect();
        self.send_to(&recipients, body).await
    }

    /// Send `body` to an explicit set of recipients
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the session is not ready to send.
    pub async fn send_to(&mut self, recipients: &[String], body: &str) -> Result<usize> {
        if !matches!(self.state, SessionState::RosterReady | SessionState::Sending) {
            return Err(Error::Session(format!(
                "cannot send in state {:?}",
                self.state
            )));
        }
        self.state = SessionState::Sending;

        let mut reached = 0;
        for recipient in recipients {
            match self.transport.send_message(recipient, body).await {
                Ok(()) => {
                    tracing::info!(to = %recipient, "message sent");
                    reached += 1;
                }
                Err(e) => {
                    tracing::error!(to = %recipient, error = %e, "delivery failed, stopping broadcast");
                    break;
                }
            }
        }

        tracing::info!(reached, total = recipients.len(), "delivery finished");
        Ok(reached)
    }

    /// Disconnect, optionally waiting for queued stanzas to flush first
    ///
    /// # Errors
    ///
    /// Returns transport errors from the flush or the close handshake.
    pub async fn teardown(&mut self, wait: bool) -> Result<()> {
        if wait {
            self.transport.flush().await?;
        }
        self.transport.disconnect().await?;
        self.state = SessionState::Disconnected;
        tracing::info!("session closed");
        Ok(())
    }
}

/// Whether the presented certificate identity covers the expected host
///
/// Checks the subject and every alternative name, honoring single-label
/// wildcards.
#[must_use]
pub fn identity_matches(expected: &str, info: &CertInfo) -> bool {
    std::iter::once(info.subject.as_str())
        .chain(info.alt_names.iter().map(String::as_str))
        .any(|name| name_matches(expected, name))
}

fn name_matches(expected: &str, name: &str) -> bool {
    if name.eq_ignore_ascii_case(expected) {
        return true;
    }

    // "*.example.com" covers exactly one leading label
    if let Some(suffix) = name.strip_prefix("*.") {
        if let Some((first, rest)) = expected.split_once('.') {
            return !first.is_empty() && rest.eq_ignore_ascii_case(suffix);
        }
    }

    false
}
