use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use dyad_core::error::{DyadError, Result};
use dyad_core::protocol::Direction;
use dyad_core::{Envelope, MessageKind};

use crate::realtime::PeerCtx;

/// A service handling one or more client-originated message kinds.
#[async_trait]
pub trait EnvelopeService: Send + Sync {
    fn kinds(&self) -> &'static [MessageKind];
    async fn handle(&self, ctx: PeerCtx, env: Envelope) -> Result<()>;
}

/// Registry and dispatcher keyed by message kind.
#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<MessageKind, Arc<dyn EnvelopeService>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Registers `svc` for each of its kinds. Server-originated kinds are
    /// skipped: a peer sending one must get `UNHANDLED_TYPE`.
    pub fn register(&self, svc: Arc<dyn EnvelopeService>) {
        for kind in svc.kinds() {
            if kind.direction() != Direction::ClientToServer {
                tracing::warn!(%kind, "refusing to register handler for server-originated kind");
                continue;
            }
            if self.handlers.insert(*kind, Arc::clone(&svc)).is_some() {
                tracing::warn!(%kind, "handler replaced");
            }
        }
    }

    pub fn registered_kinds(&self) -> Vec<MessageKind> {
        self.handlers.iter().map(|e| *e.key()).collect()
    }

    pub async fn dispatch(&self, ctx: PeerCtx, env: Envelope) -> Result<()> {
        let kind = env.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(DyadError::UnhandledMessageType(kind.as_str()))?
            .value()
            .clone();
        handler.handle(ctx, env).await
    }
}
