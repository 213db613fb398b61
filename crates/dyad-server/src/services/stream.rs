use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;

use dyad_core::error::{DyadError, Result};
use dyad_core::protocol::payload::BeginStream;
use dyad_core::{Envelope, MessageKind};

use crate::dispatch::EnvelopeService;
use crate::realtime::{PeerCtx, StreamTicket};
use crate::services::ChatGenerator;

/// Handles `stream:begin` and `stream:cancel`.
pub struct StreamService {
    generator: Arc<dyn ChatGenerator>,
}

impl StreamService {
    pub fn new(generator: Arc<dyn ChatGenerator>) -> Self {
        Self { generator }
    }

    fn begin(&self, ctx: PeerCtx, req: BeginStream) -> Result<()> {
        let ticket = ctx
            .streams()
            .try_register(&req.session_id)
            .ok_or_else(|| DyadError::StreamActive(req.session_id.clone()))?;

        tracing::debug!(peer = %ctx.peer(), session_id = %req.session_id, "stream begin");
        tokio::spawn(run_stream(ctx, Arc::clone(&self.generator), req, ticket));
        Ok(())
    }

    fn cancel(&self, ctx: &PeerCtx, session_id: &str) {
        if !ctx.streams().cancel(session_id) {
            tracing::debug!(peer = %ctx.peer(), %session_id, "cancel for inactive session ignored");
        }
    }
}

#[async_trait]
impl EnvelopeService for StreamService {
    fn kinds(&self) -> &'static [MessageKind] {
        &[MessageKind::StreamBegin, MessageKind::StreamCancel]
    }

    async fn handle(&self, ctx: PeerCtx, env: Envelope) -> Result<()> {
        match env {
            Envelope::StreamBegin(req) => self.begin(ctx, req),
            Envelope::StreamCancel(r) => {
                self.cancel(&ctx, &r.session_id);
                Ok(())
            }
            other => Err(DyadError::UnhandledMessageType(other.kind().as_str())),
        }
    }
}

/// One streaming operation: `started`, chunks, then exactly one terminal.
async fn run_stream(
    ctx: PeerCtx,
    generator: Arc<dyn ChatGenerator>,
    req: BeginStream,
    ticket: StreamTicket,
) {
    let session_id = req.session_id.clone();

    let terminal = if ctx.send(&Envelope::started(&session_id)).await.is_err() {
        None
    } else {
        let token = ticket.token.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Some(Envelope::cancelled(&session_id)),
            res = pump(&ctx, generator, req) => Some(match res {
                Ok(()) => Envelope::end(&session_id),
                Err(e) => {
                    tracing::warn!(peer = %ctx.peer(), %session_id, error = %e, "stream failed");
                    Envelope::error(Some(&session_id), &e)
                }
            }),
        }
    };

    ctx.streams().finish(&session_id, &ticket);

    if let Some(env) = terminal {
        tracing::debug!(peer = %ctx.peer(), %session_id, kind = %env.kind(), "stream finished");
        if ctx.send(&env).await.is_err() {
            tracing::debug!(peer = %ctx.peer(), %session_id, "peer gone before terminal envelope");
        }
    }
}

async fn pump(ctx: &PeerCtx, generator: Arc<dyn ChatGenerator>, req: BeginStream) -> Result<()> {
    let session_id = req.session_id.clone();
    let mut chunks = generator.generate(ctx.clone(), req).await?;
    while let Some(chunk) = chunks.next().await {
        ctx.send(&Envelope::chunk(&session_id, chunk?)).await?;
        tokio::task::yield_now().await;
    }
    Ok(())
}
