//! dyad core: wire vocabulary, error types, and the settings store.
//!
//! This crate defines the envelope contract shared by the stream router and the
//! client transport, plus the file-backed user settings record. It carries no
//! async runtime or transport dependencies so both sides can reuse it.
//!
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `DyadError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod settings;

/// Shared result type.
pub use error::{ClientCode, DyadError, Result};
pub use protocol::{Envelope, MessageKind};
pub use settings::{SettingsStore, UserSettings};
