//! Per-connection runtime state shared with services.
//!
//! - `ActiveStreams`: session id -> cancellation token for in-flight streams.
//! - `PeerCtx`: the outbound queue of one connection plus its streams.

pub mod peer;
pub mod streams;

pub use peer::PeerCtx;
pub use streams::{ActiveStreams, StreamTicket};
