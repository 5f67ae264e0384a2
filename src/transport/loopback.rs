//! In-process loopback transport
//!
//! Emits the normal bring-up event sequence and logs outbound messages
//! instead of putting them on a wire. Used for dry runs and as the default
//! transport until a real protocol binding is plugged in.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::Result;

use super::{ChatTransport, Contact, RosterError, TransportEvent};

/// Transport that delivers nowhere and never fails
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    bound_id: String,
    roster: Vec<Contact>,
    events: VecDeque<TransportEvent>,
    auth_token: Option<String>,
    sent: Vec<(String, String)>,
}

impl LoopbackTransport {
    /// Create a loopback transport bound to `identity` with a fixed roster
    #[must_use]
    pub fn new(identity: &str, roster: Vec<Contact>) -> Self {
        Self {
            bound_id: identity.to_string(),
            roster,
            events: VecDeque::new(),
            auth_token: None,
            sent: Vec::new(),
        }
    }

    /// Messages "sent" so far, as `(recipient, body)` pairs
    #[must_use]
    pub fn sent(&self) -> &[(String, String)] {
        &self.sent
    }
}

#[async_trait]
impl ChatTransport for LoopbackTransport {
    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        tracing::info!(host, port, "loopback transport connected (nothing reaches the wire)");
        self.events.push_back(TransportEvent::Connected);
        self.events.push_back(TransportEvent::SessionStart {
            bound_id: self.bound_id.clone(),
        });
        Ok(())
    }

    fn set_auth_token(&mut self, token: &str) {
        self.auth_token = Some(token.to_string());
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    async fn send_presence(&mut self) -> Result<()> {
        Ok(())
    }

    async fn request_roster(&mut self) -> std::result::Result<Vec<Contact>, RosterError> {
        Ok(self.roster.clone())
    }

    async fn send_message(&mut self, to: &str, body: &str) -> Result<()> {
        tracing::info!(to, body, "loopback message");
        self.sent.push((to.to_string(), body.to_string()));
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.events.push_back(TransportEvent::Disconnected);
        Ok(())
    }

    async fn abort(&mut self) {
        self.events.clear();
    }
}
