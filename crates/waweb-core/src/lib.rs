pub mod config;
pub mod error;
pub mod types;

pub use error::{Result, WawebError};
pub use types::{Role, UserId};
