//! Storage backends and body/response schemas.

mod driver;
mod memory;
mod validation;

pub use driver::{DriverMethod, DriverResult, RestDriver};
pub use memory::MemoryDriver;
pub use validation::{validate_listing, FieldRule, FieldType, ObjectSchema, Schema};
