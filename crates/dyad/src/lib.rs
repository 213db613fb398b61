//! Top-level facade crate for dyad.
//!
//! Re-exports the core protocol and settings types, the server library and the
//! client transport so users can depend on a single crate.

pub mod core {
    pub use dyad_core::*;
}

pub mod server {
    pub use dyad_server::*;
}

pub mod client {
    pub use dyad_client::*;
}
