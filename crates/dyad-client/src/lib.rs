//! dyad client: the stream channel transport used by front ends.
//!
//! - `StreamTransport`: one supervised connection, fixed-delay reconnect,
//!   send guard, typed publish/subscribe helpers.
//! - `ListenerRegistry` / `Subscription`: kind-keyed observers.
//! - `ApiClient`: the `/api` HTTP routes (settings, apps, chats, health).
//!
//! Panics, `unwrap`, and `expect` are compile-denied here.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod api;
pub mod config;
pub mod registry;
pub mod state;
pub mod transport;

pub use api::{ApiClient, Health};
pub use config::ClientConfig;
pub use registry::{ListenerRegistry, Subscription};
pub use state::ConnectionState;
pub use transport::StreamTransport;
