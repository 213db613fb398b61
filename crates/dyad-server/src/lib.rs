//! dyad server library entry.
//!
//! Wires the WebSocket transport, the kind-keyed dispatcher, the stream and
//! consent services, and the `/api` HTTP facade over the settings store. It is
//! consumed by the binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod api;
pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod realtime;
pub mod router;
pub mod services;
pub mod transport;
