//! Task execution engine
//!
//! This module holds the pieces between a parsed task file and the shell:
//! variable resolution, the task registry, planning, and execution.

pub mod command;
pub mod context;
pub mod executor;
pub mod interpolate;
pub mod plan;
pub mod registry;
pub mod stale;
pub mod task;
pub mod vars;

// Re-export main types
pub use command::{exit_code, Shell};
pub use context::*;
pub use executor::Executor;
pub use plan::{DependencyResolver, ExecutionPlan};
pub use registry::TaskRegistry;
pub use task::*;
pub use vars::*;
