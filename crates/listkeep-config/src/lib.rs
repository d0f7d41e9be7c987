//! Configuration, filesystem paths and logging setup shared by listkeep crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_KEY, DEFAULT_AUTH_URL, DEFAULT_DATABASE_URL, DEFAULT_LOG_LEVEL,
    DEFAULT_TOKEN_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
