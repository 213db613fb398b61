//! Transport layer (WebSocket).
//!
//! Exposes the `/ws` upgrade handler and the codec that decodes each frame
//! once before it reaches the dispatcher.

pub mod codec;
pub mod ws;
