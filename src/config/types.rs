//! Core configuration types
//!
//! This module defines the data structures that represent a makeflow.yml task file.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Application name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Application usage description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Global interpreter to use for actions (e.g., ["sh", "-c"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// Task run when no target is named on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Environment files loaded beneath the process environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dotenv: Vec<String>,

    /// Other task files merged into this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Variable declarations, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<VarDecl>,

    /// Tasks defined in the configuration, in declaration order
    #[serde(default, deserialize_with = "deserialize_tasks")]
    pub tasks: Vec<(String, Task)>,
}

impl Config {
    /// Look up a task definition by name
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|(task_name, _)| task_name == name)
            .map(|(_, task)| task)
    }

    /// Normalize every variable declaration, in order
    pub fn assignments(&self) -> ConfigResult<Vec<Assignment>> {
        self.vars.iter().map(VarDecl::to_assignment).collect()
    }
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    /// Usage description for help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Longer description for help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this task is private (hidden from listings)
    #[serde(default)]
    pub private: bool,

    /// Whether this task should run quietly
    #[serde(default)]
    pub quiet: bool,

    /// Tasks that must run before this one
    #[serde(default, alias = "prerequisites", skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,

    /// Whether this task always runs when reached (defaults to no output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phony: Option<bool>,

    /// Artifact this task produces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Source globs compared against the output when checking staleness
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// Actions to execute
    #[serde(default, deserialize_with = "deserialize_actions")]
    pub run: Vec<Action>,
}

impl Task {
    /// Whether the task always runs when reached
    pub fn is_phony(&self) -> bool {
        self.phony.unwrap_or(self.output.is_none())
    }
}

/// An action - a shell command template
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Action {
    /// Simple string command
    Simple(String),

    /// Complex command with additional options
    Complex(ActionDetail),
}

/// Detailed action specification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionDetail {
    /// The command to execute
    pub exec: String,

    /// What to print when running (defaults to exec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print: Option<String>,

    /// Whether to suppress the echo line
    #[serde(default)]
    pub quiet: bool,

    /// Working directory for the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// A variable declaration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum VarDecl {
    /// make-style `NAME=value`, `NAME?=value` or `NAME!=command`
    Assignment(String),

    /// Declaration with explicit fields
    Detailed(VarDetail),
}

/// Detailed variable declaration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VarDetail {
    /// Variable name
    pub name: String,

    /// Default value (may reference other variables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Command whose trimmed output becomes the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Let the environment take precedence over this declaration
    #[serde(default)]
    pub conditional: bool,

    /// Pass the resolved value to every action's environment
    #[serde(default)]
    pub export: bool,
}

/// How a declared value is produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentKind {
    /// Textual default, expanded when resolved
    Value(String),
    /// Captured output of a command, evaluated once per run
    Command(String),
}

/// A normalized variable declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub kind: AssignmentKind,
    pub conditional: bool,
    pub export: bool,
}

impl VarDecl {
    /// Normalize either declaration form
    pub fn to_assignment(&self) -> ConfigResult<Assignment> {
        match self {
            VarDecl::Assignment(line) => parse_assignment(line),
            VarDecl::Detailed(detail) => {
                let kind = match (&detail.value, &detail.command) {
                    (Some(value), None) => AssignmentKind::Value(value.clone()),
                    (None, Some(command)) => AssignmentKind::Command(command.clone()),
                    _ => {
                        return Err(ConfigError::InvalidVariable {
                            decl: detail.name.clone(),
                            reason: "exactly one of 'value' or 'command' is required".to_string(),
                        })
                    }
                };
                check_variable_name(&detail.name, &detail.name)?;
                Ok(Assignment {
                    name: detail.name.clone(),
                    kind,
                    conditional: detail.conditional,
                    export: detail.export,
                })
            }
        }
    }
}

/// Parse a make-style assignment line
pub fn parse_assignment(line: &str) -> ConfigResult<Assignment> {
    let eq = line.find('=').ok_or_else(|| ConfigError::InvalidVariable {
        decl: line.to_string(),
        reason: "expected NAME=value, NAME?=value or NAME!=command".to_string(),
    })?;

    let (head, value) = (&line[..eq], line[eq + 1..].trim());
    let (name, conditional, computed) = if let Some(name) = head.strip_suffix('?') {
        (name, true, false)
    } else if let Some(name) = head.strip_suffix('!') {
        (name, false, true)
    } else {
        (head, false, false)
    };
    let name = name.trim();
    check_variable_name(name, line)?;

    let kind = if computed {
        AssignmentKind::Command(value.to_string())
    } else {
        AssignmentKind::Value(value.to_string())
    };

    Ok(Assignment {
        name: name.to_string(),
        kind,
        conditional,
        export: false,
    })
}

/// Variable names follow shell identifier rules
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn check_variable_name(name: &str, decl: &str) -> ConfigResult<()> {
    if is_valid_variable_name(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidVariable {
            decl: decl.to_string(),
            reason: format!("'{}' is not a valid variable name", name),
        })
    }
}

/// Custom deserializer that keeps tasks in declaration order
fn deserialize_tasks<'de, D>(deserializer: D) -> Result<Vec<(String, Task)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Mapping(mapping) => {
            let mut tasks = Vec::with_capacity(mapping.len());
            for (key, body) in mapping {
                let name = match key {
                    Value::String(s) => s,
                    other => {
                        return Err(D::Error::custom(format!(
                            "task names must be strings, found {:?}",
                            other
                        )))
                    }
                };
                // `name:` with no body is a task with nothing to do
                let task = match body {
                    Value::Null => Task::default(),
                    body => Task::deserialize(body).map_err(D::Error::custom)?,
                };
                tasks.push((name, task));
            }
            Ok(tasks)
        }
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("tasks must be a mapping of name to task")),
    }
}

/// Custom deserializer for actions that handles both single values and arrays
fn deserialize_actions<'de, D>(deserializer: D) -> Result<Vec<Action>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single string or complex action
        Value::String(s) => Ok(vec![Action::Simple(s)]),
        Value::Mapping(_) => {
            let action = Action::deserialize(value).map_err(D::Error::custom)?;
            Ok(vec![action])
        }
        // Array of actions
        Value::Sequence(seq) => {
            let mut actions = Vec::new();
            for item in seq {
                let action = Action::deserialize(item).map_err(D::Error::custom)?;
                actions.push(action);
            }
            Ok(actions)
        }
        // Null or not present
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("run must be a string, object, or array")),
    }
}
