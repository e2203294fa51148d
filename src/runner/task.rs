//! Runtime task representation
//!
//! This module contains the immutable task definitions the registry hands to
//! the resolver and executor.

use crate::config;

/// Runtime task representation
///
/// This differs from config::Task by having its defaults applied: prerequisites
/// are de-duplicated and phony-ness is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Task name
    pub name: String,

    /// Usage description
    pub usage: Option<String>,

    /// Longer description
    pub description: Option<String>,

    /// Whether this task is hidden from listings
    pub private: bool,

    /// Whether to suppress the echo of every action
    pub quiet: bool,

    /// Declared prerequisites, in declaration order, without duplicates
    pub prerequisites: Vec<String>,

    /// Actions to execute, in order
    pub actions: Vec<Action>,

    /// Always runs when reached; has no artifact
    pub phony: bool,

    /// Artifact path for file targets (the task name when not given)
    pub output: Option<String>,

    /// Source globs compared against the artifact
    pub sources: Vec<String>,
}

impl Task {
    /// A phony task with no prerequisites or actions
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            usage: None,
            description: None,
            private: false,
            quiet: false,
            prerequisites: Vec::new(),
            actions: Vec::new(),
            phony: true,
            output: None,
            sources: Vec::new(),
        }
    }

    /// Create a task from configuration
    pub fn from_config(name: String, config: config::Task) -> Self {
        let phony = config.is_phony();
        Task {
            name,
            usage: config.usage,
            description: config.description,
            private: config.private,
            quiet: config.quiet,
            prerequisites: dedup(config.deps),
            actions: config.run.into_iter().map(Action::from_config).collect(),
            phony,
            output: if phony { None } else { config.output },
            sources: config.sources,
        }
    }

    /// Set the prerequisites, collapsing duplicates
    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = dedup(prerequisites.into_iter().map(Into::into).collect());
        self
    }

    /// Append a simple action
    pub fn with_action(mut self, command: impl Into<String>) -> Self {
        self.actions.push(Action::Simple(command.into()));
        self
    }

    /// Turn this into a file target producing `output`
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.phony = false;
        self.output = Some(output.into());
        self
    }

    /// Turn this into a file target named after the task itself
    pub fn file_target(mut self) -> Self {
        self.phony = false;
        self
    }

    /// Set the source globs
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Artifact template for file targets; `None` for phony tasks
    pub fn output_template(&self) -> Option<&str> {
        if self.phony {
            None
        } else {
            Some(self.output.as_deref().unwrap_or(&self.name))
        }
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

/// Runtime representation of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Simple command template
    Simple(String),

    /// Command template with options
    Complex {
        exec: String,
        print: String,
        quiet: bool,
        dir: Option<String>,
    },
}

impl Action {
    /// Create from config
    pub fn from_config(config: config::Action) -> Self {
        match config {
            config::Action::Simple(cmd) => Action::Simple(cmd),
            config::Action::Complex(detail) => Action::Complex {
                print: detail.print.clone().unwrap_or_else(|| detail.exec.clone()),
                exec: detail.exec,
                quiet: detail.quiet,
                dir: detail.dir,
            },
        }
    }

    /// Get the command template to execute
    pub fn exec(&self) -> &str {
        match self {
            Action::Simple(cmd) => cmd,
            Action::Complex { exec, .. } => exec,
        }
    }

    /// Get what to print
    pub fn print(&self) -> &str {
        match self {
            Action::Simple(cmd) => cmd,
            Action::Complex { print, .. } => print,
        }
    }

    /// Check if this action is quiet
    pub fn is_quiet(&self) -> bool {
        match self {
            Action::Simple(_) => false,
            Action::Complex { quiet, .. } => *quiet,
        }
    }

    /// Get the working directory
    pub fn dir(&self) -> Option<&str> {
        match self {
            Action::Simple(_) => None,
            Action::Complex { dir, .. } => dir.as_deref(),
        }
    }
}
