//! Request extractors for the handler contexts.

pub mod context;

pub use context::{create_read_context, create_write_context};
