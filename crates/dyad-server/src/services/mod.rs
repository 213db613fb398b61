//! Built-in stream channel services.

pub mod consent;
pub mod generator;
pub mod stream;

pub use consent::{ConsentBroker, ConsentService};
pub use generator::{ChatGenerator, ChunkStream, PlaceholderGenerator};
pub use stream::StreamService;
