//! Run context
//!
//! The context holds everything scoped to one execution of a plan: the
//! variable snapshot, what ran, and how it ended.

use crate::runner::vars::VariableStore;
use colored::Colorize;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

/// Lifecycle of a task within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Skipped,
    Running,
    Succeeded,
    Failed,
}

/// One action handed to the shell (or printed, in a dry run)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    /// Task the action belongs to
    pub task: String,
    /// Zero-based index within the task
    pub index: usize,
    /// Command after substitution
    pub command: String,
    /// Exit status; `None` when the action was not executed (dry run)
    pub exit_status: Option<i32>,
}

/// State for a single run of an execution plan
#[derive(Debug)]
pub struct RunContext {
    /// Variables for this run; computed values are cached here
    pub variables: VariableStore,

    /// 0 on success, otherwise the failure's exit status
    pub exit_status: i32,

    /// Actions in the order they were executed
    pub log: Vec<ActionRecord>,

    /// Per-task state, in plan order
    pub states: Vec<(String, TaskState)>,

    /// Verbosity level
    pub verbosity: Verbosity,

    /// Print actions instead of running them
    pub dry_run: bool,
}

impl RunContext {
    /// Create a context around a variable snapshot
    pub fn new(variables: VariableStore) -> Self {
        RunContext {
            variables,
            exit_status: 0,
            log: Vec::new(),
            states: Vec::new(),
            verbosity: Verbosity::Normal,
            dry_run: false,
        }
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Print actions without running them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Record the state of a task
    pub fn set_state(&mut self, task: &str, state: TaskState) {
        match self.states.iter_mut().find(|(name, _)| name == task) {
            Some(entry) => entry.1 = state,
            None => self.states.push((task.to_string(), state)),
        }
    }

    /// Current state of a task, if it is part of this run
    pub fn state(&self, task: &str) -> Option<TaskState> {
        self.states
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, state)| *state)
    }

    /// Commands executed for `task`, in order
    pub fn commands_for(&self, task: &str) -> Vec<&str> {
        self.log
            .iter()
            .filter(|record| record.task == task)
            .map(|record| record.command.as_str())
            .collect()
    }

    /// Print an action before it runs
    pub fn print_command(&self, command: &str) {
        if self.verbosity >= Verbosity::Normal {
            let prefix = if self.dry_run { "[DRY]" } else { "[RUN]" };
            eprintln!("{} {}", prefix.cyan().bold(), command);
        }
    }

    /// Print info message
    pub fn print_info(&self, message: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[INFO]".green(), message);
        }
    }

    /// Print debug message (only in verbose mode)
    pub fn print_debug(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {}", "[DEBUG]".dimmed(), message);
        }
    }

    /// Print task start message
    pub fn print_task_start(&self, task_name: &str) {
        self.print_info(&format!("Running task: {}", task_name));
    }

    /// Print task complete message
    pub fn print_task_complete(&self, task_name: &str) {
        self.print_debug(&format!("Task completed: {}", task_name));
    }

    /// Print task skip message
    pub fn print_task_skip(&self, task_name: &str, reason: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} '{}' {}", "[SKIP]".yellow(), task_name, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_new() {
        let ctx = RunContext::new(VariableStore::new());
        assert_eq!(ctx.verbosity, Verbosity::Normal);
        assert_eq!(ctx.exit_status, 0);
        assert!(ctx.log.is_empty());
        assert!(!ctx.dry_run);
    }

    #[test]
    fn test_task_states() {
        let mut ctx = RunContext::new(VariableStore::new());
        assert_eq!(ctx.state("build"), None);

        ctx.set_state("build", TaskState::Pending);
        ctx.set_state("push", TaskState::Pending);
        ctx.set_state("build", TaskState::Running);
        ctx.set_state("build", TaskState::Succeeded);

        assert_eq!(ctx.state("build"), Some(TaskState::Succeeded));
        assert_eq!(ctx.state("push"), Some(TaskState::Pending));
        assert_eq!(ctx.states.len(), 2);
        assert_eq!(ctx.states[0].0, "build");
    }

    #[test]
    fn test_commands_for() {
        let mut ctx = RunContext::new(VariableStore::new());
        for (task, command) in [("a", "echo 1"), ("b", "echo 2"), ("a", "echo 3")] {
            ctx.log.push(ActionRecord {
                task: task.to_string(),
                index: 0,
                command: command.to_string(),
                exit_status: Some(0),
            });
        }
        assert_eq!(ctx.commands_for("a"), vec!["echo 1", "echo 3"]);
    }

    #[test]
    fn test_verbosity_levels() {
        assert!(Verbosity::Verbose > Verbosity::Normal);
        assert!(Verbosity::Normal > Verbosity::Quiet);
        assert!(Verbosity::Quiet > Verbosity::Silent);
    }

    #[test]
    fn test_builders() {
        let ctx = RunContext::new(VariableStore::new())
            .with_verbosity(Verbosity::Verbose)
            .with_dry_run(true);
        assert_eq!(ctx.verbosity, Verbosity::Verbose);
        assert!(ctx.dry_run);
    }
}
