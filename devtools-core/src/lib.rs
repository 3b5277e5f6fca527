//! Shared foundation for the plugin DevTools crates: the error taxonomy,
//! builder configuration, console output macros and tracing setup.

pub mod config;
pub mod error;
pub mod output_macros;
pub mod tracing_init;

pub use config::{BuilderConfig, RepositoryConfig};
pub use error::{DevToolsError, Result};
