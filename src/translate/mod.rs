//! Request normalisation and response assembly.
//!
//! Everything here is pure (no I/O): caller input becomes an
//! [`types::UpstreamPayload`], and streamed upstream bytes become one answer.

pub mod assembler;
pub mod request;
pub mod types;

pub use assembler::SseAssembler;
pub use request::{translate, ChatInput, RelayMode};
