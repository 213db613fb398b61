use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use dyad_core::error::{DyadError, Result};
use dyad_core::protocol::payload::{AgentConsentRequest, ConsentDecision, McpConsentRequest};
use dyad_core::Envelope;

use crate::realtime::ActiveStreams;
use crate::services::ConsentBroker;

/// Per-connection context handed to services. Cheap to clone.
#[derive(Clone)]
pub struct PeerCtx {
    peer: Arc<str>,
    tx: mpsc::Sender<Message>,
    streams: Arc<ActiveStreams>,
    consent: Arc<ConsentBroker>,
}

impl PeerCtx {
    pub fn new(
        peer: impl Into<Arc<str>>,
        tx: mpsc::Sender<Message>,
        streams: Arc<ActiveStreams>,
        consent: Arc<ConsentBroker>,
    ) -> Self {
        Self {
            peer: peer.into(),
            tx,
            streams,
            consent,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn streams(&self) -> &ActiveStreams {
        &self.streams
    }

    pub fn consent(&self) -> &ConsentBroker {
        &self.consent
    }

    /// Queues one envelope on this connection, in order with all others.
    pub async fn send(&self, env: &Envelope) -> Result<()> {
        let text = env.encode()?;
        self.tx
            .send(Message::Text(text))
            .await
            .map_err(|_| DyadError::Internal("outbound channel closed".into()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Pushes an MCP tool consent request to this peer and waits for the answer.
    pub async fn request_mcp_consent(&self, req: McpConsentRequest) -> Result<ConsentDecision> {
        self.consent.request(self, req.request_id.clone(), Envelope::McpConsentRequest(req)).await
    }

    pub async fn request_agent_consent(&self, req: AgentConsentRequest) -> Result<ConsentDecision> {
        self.consent.request(self, req.request_id.clone(), Envelope::AgentConsentRequest(req)).await
    }
}
