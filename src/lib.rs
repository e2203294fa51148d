//! Makeflow - a YAML task runner
//!
//! Makeflow reads named tasks with prerequisites, shell actions and variables
//! from a `makeflow.yml` file, resolves the tasks a target needs into a
//! deterministic order, and runs them one action at a time.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use error::{MakeflowError, Result};

/// Current version of Makeflow
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
