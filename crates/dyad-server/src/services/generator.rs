use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use dyad_core::error::{DyadError, Result};
use dyad_core::protocol::payload::BeginStream;

use crate::config::StreamSection;
use crate::realtime::PeerCtx;

/// Chunk stream produced for one `stream:begin`.
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// Produces the reply for a chat turn.
///
/// `generate` may do its own request/response work with the peer (consent
/// prompts, for example) before returning the chunk stream. It runs inside the
/// stream task, so cancellation applies to it as well.
#[async_trait]
pub trait ChatGenerator: Send + Sync {
    async fn generate(&self, ctx: PeerCtx, req: BeginStream) -> Result<ChunkStream>;
}

/// Streams a fixed reply word by word.
#[derive(Debug, Clone)]
pub struct PlaceholderGenerator {
    reply: String,
    chunk_delay: Duration,
}

impl PlaceholderGenerator {
    pub fn new(reply: impl Into<String>, chunk_delay: Duration) -> Self {
        Self {
            reply: reply.into(),
            chunk_delay,
        }
    }

    pub fn from_config(cfg: &StreamSection) -> Self {
        Self::new(
            cfg.placeholder_reply.clone(),
            Duration::from_millis(cfg.chunk_delay_ms),
        )
    }

    /// Word chunks that concatenate back to the reply.
    pub fn chunks(&self) -> Vec<String> {
        self.reply.split_inclusive(' ').map(str::to_owned).collect()
    }
}

#[async_trait]
impl ChatGenerator for PlaceholderGenerator {
    async fn generate(&self, ctx: PeerCtx, req: BeginStream) -> Result<ChunkStream> {
        tracing::debug!(
            peer = %ctx.peer(),
            session_id = %req.session_id,
            chat_id = ?req.chat_id,
            "placeholder reply"
        );
        let delay = self.chunk_delay;
        let chunks = stream::iter(self.chunks()).then(move |chunk| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, DyadError>(chunk)
        });
        Ok(chunks.boxed())
    }
}
