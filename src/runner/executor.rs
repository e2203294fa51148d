//! Plan execution
//!
//! Runs a plan one task and one action at a time. Every template in the plan
//! is expanded before the first action starts, so a missing or cyclic variable
//! aborts the run with nothing executed. After that, the first failing action
//! stops the run; nothing is retried or rolled back.

use crate::error::{ExecutionError, MakeflowError, Result};
use crate::runner::command::{exit_code, Shell};
use crate::runner::context::{ActionRecord, RunContext, TaskState, Verbosity};
use crate::runner::plan::ExecutionPlan;
use crate::runner::registry::TaskRegistry;
use crate::runner::stale::{self, Upstream};
use crate::runner::task::Task;
use crate::runner::vars::VariableStore;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// An action with its templates expanded
#[derive(Debug, Clone)]
struct PreparedAction {
    command: String,
    print: String,
    quiet: bool,
    dir: Option<PathBuf>,
}

/// A task with its templates expanded
struct PreparedTask<'t> {
    task: &'t Task,
    output: Option<PathBuf>,
    sources: Vec<String>,
    actions: Vec<PreparedAction>,
}

/// Runs execution plans against a registry and a set of variables
pub struct Executor<'a> {
    registry: &'a TaskRegistry,
    variables: &'a VariableStore,
    shell: Shell,
    verbosity: Verbosity,
    dry_run: bool,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a TaskRegistry, variables: &'a VariableStore) -> Self {
        Executor {
            registry,
            variables,
            shell: Shell::new(),
            verbosity: Verbosity::Normal,
            dry_run: false,
        }
    }

    /// Shell used for actions and computed variables
    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Print actions instead of running them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// A fresh context for one run: the variable snapshot plus `overrides`
    pub fn context(&self, overrides: &HashMap<String, String>) -> RunContext {
        let mut variables = self.variables.fresh().with_shell(self.shell.clone());
        variables.set_overrides(overrides);
        RunContext::new(variables)
            .with_verbosity(self.verbosity)
            .with_dry_run(self.dry_run)
    }

    /// Run `plan` with `overrides` and return the finished context
    pub fn run(
        &self,
        plan: &ExecutionPlan,
        overrides: &HashMap<String, String>,
    ) -> Result<RunContext> {
        let mut ctx = self.context(overrides);
        self.execute(plan, &mut ctx)?;
        Ok(ctx)
    }

    /// Run `plan` in an existing context.
    ///
    /// `ctx.exit_status` is set either way: 0 on success, otherwise the
    /// status [`MakeflowError::exit_code`] reports for the failure.
    pub fn execute(&self, plan: &ExecutionPlan, ctx: &mut RunContext) -> Result<()> {
        let result = self.execute_plan(plan, ctx);
        ctx.exit_status = match &result {
            Ok(()) => 0,
            Err(e) => e.exit_code(),
        };
        result
    }

    fn execute_plan(&self, plan: &ExecutionPlan, ctx: &mut RunContext) -> Result<()> {
        let prepared = self.prepare(plan, &mut ctx.variables)?;
        let envs = ctx.variables.exported_env()?;

        let upstream: HashMap<&str, Upstream> = prepared
            .iter()
            .map(|p| {
                let item = match &p.output {
                    Some(path) => Upstream::Artifact(path.clone()),
                    None => Upstream::Phony,
                };
                (p.task.name.as_str(), item)
            })
            .collect();

        for item in &prepared {
            ctx.set_state(&item.task.name, TaskState::Pending);
        }

        for (position, item) in prepared.iter().enumerate() {
            let task = item.task;

            if let Some(output) = &item.output {
                let inputs: Vec<Upstream> = task
                    .prerequisites
                    .iter()
                    .filter_map(|name| upstream.get(name.as_str()).cloned())
                    .collect();
                match stale::check(output, &inputs, &item.sources, &self.shell.working_dir) {
                    None => {
                        ctx.set_state(&task.name, TaskState::Skipped);
                        ctx.print_task_skip(&task.name, "is up to date");
                        continue;
                    }
                    Some(reason) => {
                        debug!(task = %task.name, %reason, "file target is stale");
                        ctx.print_debug(&format!("'{}' must run: {}", task.name, reason));
                    }
                }
            }

            ctx.set_state(&task.name, TaskState::Running);
            ctx.print_task_start(&task.name);

            for (index, action) in item.actions.iter().enumerate() {
                if !task.quiet && !action.quiet {
                    ctx.print_command(&action.print);
                }

                if ctx.dry_run {
                    ctx.log.push(ActionRecord {
                        task: task.name.clone(),
                        index,
                        command: action.command.clone(),
                        exit_status: None,
                    });
                    continue;
                }

                let status = match self.shell.run(&action.command, action.dir.as_deref(), &envs) {
                    Ok(status) => status,
                    Err(source) => {
                        ctx.set_state(&task.name, TaskState::Failed);
                        warn!(task = %task.name, error = %source, "action could not start");
                        return Err(ExecutionError::Spawn {
                            command: action.command.clone(),
                            source,
                        }
                        .into());
                    }
                };

                let code = exit_code(&status);
                ctx.log.push(ActionRecord {
                    task: task.name.clone(),
                    index,
                    command: action.command.clone(),
                    exit_status: Some(code),
                });

                if !status.success() {
                    ctx.set_state(&task.name, TaskState::Failed);
                    return Err(ExecutionError::ActionFailed {
                        task: task.name.clone(),
                        action_index: index,
                        command: action.command.clone(),
                        exit_status: code,
                        position: position + 1,
                        plan_len: prepared.len(),
                    }
                    .into());
                }
            }

            ctx.set_state(&task.name, TaskState::Succeeded);
            ctx.print_task_complete(&task.name);
        }

        Ok(())
    }

    /// Look up every task and expand every template in the plan
    fn prepare(
        &self,
        plan: &ExecutionPlan,
        variables: &mut VariableStore,
    ) -> std::result::Result<Vec<PreparedTask<'a>>, MakeflowError> {
        let mut prepared = Vec::with_capacity(plan.len());

        for name in plan.iter() {
            let task = self.registry.get(name)?;

            let output = match task.output_template() {
                Some(template) => Some(self.shell.resolve_path(&variables.expand(template)?)),
                None => None,
            };
            let sources = task
                .sources
                .iter()
                .map(|s| variables.expand(s))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut actions = Vec::with_capacity(task.actions.len());
            for action in &task.actions {
                let command = variables.expand(action.exec())?;
                let print = if action.print() == action.exec() {
                    command.clone()
                } else {
                    variables.expand(action.print())?
                };
                let dir = match action.dir() {
                    Some(dir) => Some(self.shell.resolve_path(&variables.expand(dir)?)),
                    None => None,
                };
                actions.push(PreparedAction {
                    command,
                    print,
                    quiet: action.is_quiet(),
                    dir,
                });
            }

            prepared.push(PreparedTask {
                task,
                output,
                sources,
                actions,
            });
        }

        Ok(prepared)
    }
}
