//! Task file validation
//!
//! Structural checks on a parsed configuration. References between tasks are
//! deliberately not checked here: a prerequisite may be declared later in the
//! file, and unknown names are reported when a plan is built.

use crate::config::types::{Action, AssignmentKind, Config, Task};
use crate::error::{ConfigError, ConfigResult};
use crate::runner::interpolate::references;

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    if let Some(interpreter) = &config.interpreter {
        if interpreter.is_empty() || interpreter[0].trim().is_empty() {
            return Err(ConfigError::Invalid(
                "interpreter must name a program".to_string(),
            ));
        }
    }

    if let Some(default) = &config.default {
        validate_task_name(default)?;
    }

    validate_variables(config)?;

    for (name, task) in &config.tasks {
        validate_task(name, task)?;
    }

    Ok(())
}

/// Validate a single task
pub fn validate_task(name: &str, task: &Task) -> ConfigResult<()> {
    validate_task_name(name)?;

    for dep in &task.deps {
        if dep.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Task '{}' lists an empty prerequisite name",
                name
            )));
        }
    }

    // Output and sources only make sense for file targets
    if task.is_phony() {
        if task.output.is_some() {
            return Err(ConfigError::PhonyWithOutput(name.to_string()));
        }
        if !task.sources.is_empty() {
            return Err(ConfigError::SourcesWithoutOutput(name.to_string()));
        }
    }

    for action in &task.run {
        let exec = match action {
            Action::Simple(cmd) => cmd,
            Action::Complex(detail) => &detail.exec,
        };
        if exec.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Task '{}' has an empty action",
                name
            )));
        }
    }

    Ok(())
}

/// Task names become command-line words, so `=` and whitespace are reserved
fn validate_task_name(name: &str) -> ConfigResult<()> {
    if name.is_empty() || name.contains('=') || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!(
            "Invalid task name '{}': names must be non-empty without '=' or whitespace",
            name
        )));
    }
    Ok(())
}

/// Each declaration must be well formed and must not mention itself
fn validate_variables(config: &Config) -> ConfigResult<()> {
    for assignment in config.assignments()? {
        let template = match &assignment.kind {
            AssignmentKind::Value(value) => value,
            AssignmentKind::Command(command) => command,
        };
        let names = references(template).map_err(|e| ConfigError::InvalidVariable {
            decl: assignment.name.clone(),
            reason: e.to_string(),
        })?;
        if names.iter().any(|n| n == &assignment.name) {
            return Err(ConfigError::InvalidVariable {
                decl: assignment.name.clone(),
                reason: "a variable cannot reference itself".to_string(),
            });
        }
    }
    Ok(())
}
