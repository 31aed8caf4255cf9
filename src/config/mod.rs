//! Configuration: API mount points, cookie secret and discovery conventions, loaded from env or JSON.

pub mod types;
pub mod loader;
pub mod validator;

pub use types::*;
pub use validator::*;
