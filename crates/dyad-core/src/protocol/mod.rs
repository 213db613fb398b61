//! Stream channel protocol.
//!
//! - `kind`: the closed `type` vocabulary and its direction.
//! - `payload`: one payload struct per kind.
//! - `envelope`: the tagged envelope and its two-phase decoder.
//!
//! Decoding never panics: malformed input is reported as `DyadError`.

pub mod envelope;
pub mod kind;
pub mod payload;

pub use envelope::Envelope;
pub use kind::{Direction, MessageKind};
