use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;

use dyad_core::error::{DyadError, Result};
use dyad_core::protocol::payload::{ConsentDecision, ConsentResponse};
use dyad_core::{Envelope, MessageKind};

use crate::dispatch::EnvelopeService;
use crate::realtime::PeerCtx;

struct Pending {
    peer: Arc<str>,
    tx: oneshot::Sender<ConsentDecision>,
}

/// Outstanding consent prompts, keyed by request id.
#[derive(Default)]
pub struct ConsentBroker {
    pending: DashMap<String, Pending>,
}

impl ConsentBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `env` to the peer and waits for the matching response.
    ///
    /// A prompt abandoned by the peer (connection closed) resolves to
    /// `Decline`. A request id that is already pending is refused.
    pub async fn request(
        &self,
        ctx: &PeerCtx,
        request_id: String,
        env: Envelope,
    ) -> Result<ConsentDecision> {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(request_id.clone()) {
            Entry::Occupied(_) => {
                return Err(DyadError::BadRequest(format!(
                    "consent request {request_id} already pending"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(Pending {
                    peer: Arc::from(ctx.peer()),
                    tx,
                });
            }
        }

        if let Err(e) = ctx.send(&env).await {
            self.pending.remove(&request_id);
            return Err(e);
        }

        match rx.await {
            Ok(decision) => Ok(decision),
            Err(_) => {
                tracing::debug!(peer = %ctx.peer(), %request_id, "consent request abandoned");
                Ok(ConsentDecision::Decline)
            }
        }
    }

    /// Completes a pending request addressed to `peer`.
    ///
    /// Returns false for unknown ids and for ids owned by another peer; the
    /// latter stay pending.
    pub fn resolve(&self, peer: &str, request_id: &str, decision: ConsentDecision) -> bool {
        match self.pending.remove_if(request_id, |_, p| &*p.peer == peer) {
            Some((_, pending)) => pending.tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Drops every prompt addressed to `peer`; returns how many were dropped.
    pub fn drop_peer(&self, peer: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| &*p.peer != peer);
        before.saturating_sub(self.pending.len())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Routes consent responses from peers into the broker.
#[derive(Default)]
pub struct ConsentService;

impl ConsentService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EnvelopeService for ConsentService {
    fn kinds(&self) -> &'static [MessageKind] {
        &[MessageKind::McpConsentResponse, MessageKind::AgentConsentResponse]
    }

    async fn handle(&self, ctx: PeerCtx, env: Envelope) -> Result<()> {
        let (kind, ConsentResponse { request_id, decision }) = match env {
            Envelope::McpConsentResponse(r) => (MessageKind::McpConsentResponse, r),
            Envelope::AgentConsentResponse(r) => (MessageKind::AgentConsentResponse, r),
            other => return Err(DyadError::UnhandledMessageType(other.kind().as_str())),
        };
        if !ctx.consent().resolve(ctx.peer(), &request_id, decision) {
            tracing::debug!(peer = %ctx.peer(), %kind, %request_id, "no pending consent request");
        }
        Ok(())
    }
}
