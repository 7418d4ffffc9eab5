//! GPU context abstraction
//!
//! The interface the graph nodes consume from the host's GPU context:
//! texture and framebuffer lifecycles, framebuffer binding, uniform upload
//! and draw submission. Backend internals are out of scope; only the
//! recording dummy implementation ships with the crate.

pub mod context;
pub mod dummy;
pub mod types;

pub use context::*;
pub use types::*;
