pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::ClientConfig;
pub use error::{NotypeError, Result};
pub use types::*;
