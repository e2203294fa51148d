//! Error types for Makeflow

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status used for problems detected before any action runs
pub const RESOLUTION_EXIT_CODE: i32 = 2;

/// Exit status used when an action's interpreter cannot be started
pub const SPAWN_EXIT_CODE: i32 = 127;

/// Result type alias for Makeflow operations
pub type Result<T> = std::result::Result<T, MakeflowError>;

/// Main error type for Makeflow
#[derive(Error, Debug)]
pub enum MakeflowError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task registry and dependency resolution errors
    #[error("{0}")]
    Task(#[from] TaskError),

    /// Variable resolution errors
    #[error("{0}")]
    Variable(#[from] VariableError),

    /// Task execution errors
    #[error("{0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MakeflowError {
    /// Process exit status that reports this error to the caller.
    ///
    /// Failed actions hand their own status back unmodified; anything caught
    /// while loading or planning maps to [`RESOLUTION_EXIT_CODE`].
    pub fn exit_code(&self) -> i32 {
        match self {
            MakeflowError::Config(_) | MakeflowError::Task(_) | MakeflowError::Yaml(_) => {
                RESOLUTION_EXIT_CODE
            }
            MakeflowError::Variable(VariableError::ComputedVariableFailed { status, .. }) => {
                status.filter(|code| *code != 0).unwrap_or(1)
            }
            MakeflowError::Variable(_) => RESOLUTION_EXIT_CODE,
            MakeflowError::Execution(ExecutionError::ActionFailed { exit_status, .. }) => {
                *exit_status
            }
            MakeflowError::Execution(ExecutionError::Spawn { .. }) => SPAWN_EXIT_CODE,
            MakeflowError::Io(_) => 1,
        }
    }
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find task file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid variable declaration '{decl}': {reason}")]
    InvalidVariable { decl: String, reason: String },

    #[error("Task '{0}' declares sources but is phony; give it an output")]
    SourcesWithoutOutput(String),

    #[error("Task '{0}' is phony and cannot declare an output")]
    PhonyWithOutput(String),

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },
}

/// Task registry and dependency resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task '{name}' is not defined{}", required_by_suffix(.required_by))]
    UnknownTask {
        name: String,
        required_by: Option<String>,
    },

    #[error("Task '{0}' is defined more than once")]
    DuplicateTask(String),

    #[error("Circular dependency detected: {}", arrow_path(.cycle))]
    CyclicDependency { cycle: Vec<String> },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    match required_by {
        Some(parent) => format!(" (required by '{}')", parent),
        None => String::new(),
    }
}

/// Variable resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    #[error("Variable '{name}' is not defined")]
    UndefinedVariable { name: String },

    #[error("Circular variable reference: {}", arrow_path(.cycle))]
    CyclicVariable { cycle: Vec<String> },

    #[error("Invalid placeholder in '{template}'")]
    InvalidPlaceholder { template: String },

    #[error("Computed variable '{name}' failed: `{command}` exited with {}", status_text(.status))]
    ComputedVariableFailed {
        name: String,
        command: String,
        status: Option<i32>,
    },
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(
        "Task '{task}' failed at action {} (task {position} of {plan_len}): `{command}` exited with status {exit_status}",
        one_based(.action_index)
    )]
    ActionFailed {
        task: String,
        action_index: usize,
        command: String,
        exit_status: i32,
        position: usize,
        plan_len: usize,
    },

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

fn arrow_path(names: &[String]) -> String {
    names.join(" -> ")
}

fn one_based(index: &usize) -> usize {
    index + 1
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for registry and planning operations
pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// Specialized result type for variable operations
pub type VariableResult<T> = std::result::Result<T, VariableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = TaskError::CyclicDependency {
            cycle: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");
    }

    #[test]
    fn test_unknown_task_display() {
        let err = TaskError::UnknownTask {
            name: "deploy".to_string(),
            required_by: Some("release".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Task 'deploy' is not defined (required by 'release')"
        );
    }

    #[test]
    fn test_exit_codes() {
        let failed: MakeflowError = ExecutionError::ActionFailed {
            task: "x".to_string(),
            action_index: 0,
            command: "exit 3".to_string(),
            exit_status: 3,
            position: 1,
            plan_len: 1,
        }
        .into();
        assert_eq!(failed.exit_code(), 3);

        let unknown: MakeflowError = TaskError::UnknownTask {
            name: "x".to_string(),
            required_by: None,
        }
        .into();
        assert_eq!(unknown.exit_code(), RESOLUTION_EXIT_CODE);

        let computed: MakeflowError = VariableError::ComputedVariableFailed {
            name: "SHA".to_string(),
            command: "git rev-parse HEAD".to_string(),
            status: Some(128),
        }
        .into();
        assert_eq!(computed.exit_code(), 128);

        let signalled: MakeflowError = VariableError::ComputedVariableFailed {
            name: "SHA".to_string(),
            command: "sleep 100".to_string(),
            status: None,
        }
        .into();
        assert_eq!(signalled.exit_code(), 1);
    }

    #[test]
    fn test_action_failed_display_is_one_based() {
        let err = ExecutionError::ActionFailed {
            task: "push".to_string(),
            action_index: 1,
            command: "docker push img".to_string(),
            exit_status: 1,
            position: 3,
            plan_len: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("action 2"));
        assert!(msg.contains("task 3 of 4"));
        assert!(msg.contains("docker push img"));
    }
}
