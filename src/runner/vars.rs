//! Variable store
//!
//! Holds declared variables and the values that can shadow them. Lookup order
//! for a name is:
//!
//! 1. a command-line override,
//! 2. the environment, when the declaration is conditional (`NAME?=value`),
//! 3. the declaration itself: a default expanded on demand, or a command
//!    evaluated once and cached,
//! 4. the environment, for names that were never declared.
//!
//! Anything else is [`VariableError::UndefinedVariable`].

use crate::config::{Assignment, AssignmentKind};
use crate::error::{VariableError, VariableResult};
use crate::runner::command::Shell;
use crate::runner::interpolate::{expand, references};
use std::collections::{BTreeMap, HashMap};
use std::env;
use tracing::{debug, trace};

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarOrigin {
    Default,
    Environment,
    Override,
    Computed,
}

impl VarOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarOrigin::Default => "default",
            VarOrigin::Environment => "environment",
            VarOrigin::Override => "override",
            VarOrigin::Computed => "computed",
        }
    }
}

/// A resolved variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: String,
    pub origin: VarOrigin,
}

impl Variable {
    fn new(name: &str, value: String, origin: VarOrigin) -> Self {
        Variable {
            name: name.to_string(),
            value,
            origin,
        }
    }
}

#[derive(Debug, Clone)]
struct Declaration {
    kind: AssignmentKind,
    conditional: bool,
    export: bool,
}

/// Declared variables plus the overrides and environment that shadow them
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    declarations: HashMap<String, Declaration>,
    order: Vec<String>,
    overrides: HashMap<String, String>,
    environment: HashMap<String, String>,
    computed: HashMap<String, String>,
    shell: Shell,
}

impl VariableStore {
    /// Create an empty store with no environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `shell` for computed variables
    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    /// Replace the environment layer
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Snapshot the process environment into the environment layer
    pub fn with_process_env(self) -> Self {
        self.with_environment(env::vars().collect())
    }

    /// Add values beneath the current environment layer (e.g., dotenv files)
    pub fn add_environment_defaults(&mut self, values: HashMap<String, String>) {
        for (key, value) in values {
            self.environment.entry(key).or_insert(value);
        }
    }

    /// Declare `name` with an unconditional default.
    ///
    /// Re-declaring a name replaces its definition. The default may only
    /// reference names that are already declared, overridden, or in the
    /// environment. It is expanded when the variable is read, so it sees
    /// overrides set later.
    pub fn define(&mut self, name: &str, default_expr: &str) -> VariableResult<()> {
        self.insert(name, AssignmentKind::Value(default_expr.to_string()), false)
    }

    /// Declare `name` unless it already is; the environment wins over this default
    pub fn define_conditional(&mut self, name: &str, default_expr: &str) -> VariableResult<()> {
        if self.declarations.contains_key(name) {
            return Ok(());
        }
        self.insert(name, AssignmentKind::Value(default_expr.to_string()), true)
    }

    /// Declare `name` as the trimmed output of `command`, evaluated once per run
    pub fn define_computed(&mut self, name: &str, command: &str) -> VariableResult<()> {
        self.insert(name, AssignmentKind::Command(command.to_string()), false)
    }

    /// Apply a declaration from a task file
    pub fn declare(&mut self, assignment: &Assignment) -> VariableResult<()> {
        if assignment.conditional && self.declarations.contains_key(&assignment.name) {
            return Ok(());
        }
        self.insert(
            &assignment.name,
            assignment.kind.clone(),
            assignment.conditional,
        )?;
        if let Some(decl) = self.declarations.get_mut(&assignment.name) {
            decl.export = assignment.export;
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, kind: AssignmentKind, conditional: bool) -> VariableResult<()> {
        let template = match &kind {
            AssignmentKind::Value(value) => value,
            AssignmentKind::Command(command) => command,
        };
        for reference in references(template)? {
            if reference == name {
                return Err(VariableError::CyclicVariable {
                    cycle: vec![name.to_string(), name.to_string()],
                });
            }
            // Only names already known when the declaration is made
            if !self.is_known(&reference) {
                return Err(VariableError::UndefinedVariable { name: reference });
            }
        }

        if !self.declarations.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.computed.remove(name);
        self.declarations.insert(
            name.to_string(),
            Declaration {
                kind,
                conditional,
                export: false,
            },
        );
        Ok(())
    }

    /// Record an externally supplied value; it wins over any declaration
    pub fn set_override(&mut self, name: &str, value: &str) {
        self.overrides.insert(name.to_string(), value.to_string());
    }

    /// Record several overrides at once
    pub fn set_overrides<'a, I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (name, value) in overrides {
            self.set_override(name, value);
        }
    }

    /// Declared names in declaration order
    pub fn declared_names(&self) -> &[String] {
        &self.order
    }

    /// Whether `name` is declared, overridden, or set in the environment layer
    pub fn is_known(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
            || self.overrides.contains_key(name)
            || self.environment.contains_key(name)
    }

    /// Whether `name` has a declaration
    pub fn is_declared(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    /// Copy of this store with no computed values cached
    pub fn fresh(&self) -> Self {
        let mut store = self.clone();
        store.computed.clear();
        store
    }

    /// Resolve `name` to its final string
    pub fn resolve(&mut self, name: &str) -> VariableResult<String> {
        self.resolve_variable(name).map(|v| v.value)
    }

    /// Resolve `name`, reporting where the value came from
    pub fn resolve_variable(&mut self, name: &str) -> VariableResult<Variable> {
        let mut stack = Vec::new();
        self.resolve_inner(name, &mut stack)
    }

    /// Evaluate `command_expr` once and cache its trimmed output as `name`
    pub fn resolve_computed(&mut self, name: &str, command_expr: &str) -> VariableResult<String> {
        let mut stack = vec![name.to_string()];
        self.computed_value(name, command_expr, &mut stack)
    }

    /// Substitute every `$(NAME)` in `template`
    pub fn expand(&mut self, template: &str) -> VariableResult<String> {
        let mut stack = Vec::new();
        expand(template, |name| {
            self.resolve_inner(name, &mut stack).map(|v| v.value)
        })
    }

    /// Environment handed to actions: overrides plus exported declarations
    pub fn exported_env(&mut self) -> VariableResult<Vec<(String, String)>> {
        let mut env = BTreeMap::new();
        let exported: Vec<String> = self
            .order
            .iter()
            .filter(|name| self.declarations.get(*name).map_or(false, |d| d.export))
            .cloned()
            .collect();

        for name in exported {
            let value = self.resolve(&name)?;
            env.insert(name, value);
        }
        for (name, value) in &self.overrides {
            env.insert(name.clone(), value.clone());
        }

        Ok(env.into_iter().collect())
    }

    fn resolve_inner(&mut self, name: &str, stack: &mut Vec<String>) -> VariableResult<Variable> {
        if let Some(value) = self.overrides.get(name) {
            return Ok(Variable::new(name, value.clone(), VarOrigin::Override));
        }

        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(VariableError::CyclicVariable { cycle });
        }

        let Some(decl) = self.declarations.get(name).cloned() else {
            return match self.environment.get(name) {
                Some(value) => Ok(Variable::new(name, value.clone(), VarOrigin::Environment)),
                None => Err(VariableError::UndefinedVariable {
                    name: name.to_string(),
                }),
            };
        };

        if decl.conditional {
            if let Some(value) = self.environment.get(name) {
                return Ok(Variable::new(name, value.clone(), VarOrigin::Environment));
            }
        }

        stack.push(name.to_string());
        let result = match &decl.kind {
            AssignmentKind::Value(expr) => {
                expand(expr, |reference| {
                    self.resolve_inner(reference, stack).map(|v| v.value)
                })
                .map(|value| Variable::new(name, value, VarOrigin::Default))
            }
            AssignmentKind::Command(command) => self
                .computed_value(name, command, stack)
                .map(|value| Variable::new(name, value, VarOrigin::Computed)),
        };
        stack.pop();

        trace!(variable = name, ok = result.is_ok(), "resolved variable");
        result
    }

    fn computed_value(
        &mut self,
        name: &str,
        command_expr: &str,
        stack: &mut Vec<String>,
    ) -> VariableResult<String> {
        if let Some(value) = self.computed.get(name) {
            return Ok(value.clone());
        }

        let script = expand(command_expr, |reference| {
            self.resolve_inner(reference, stack).map(|v| v.value)
        })?;
        let envs: Vec<(String, String)> = self
            .overrides
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        debug!(variable = name, command = %script, "evaluating computed variable");
        let output = self.shell.capture(&script, &envs).map_err(|e| {
            debug!(variable = name, error = %e, "computed variable could not start");
            VariableError::ComputedVariableFailed {
                name: name.to_string(),
                command: script.clone(),
                status: Some(crate::error::SPAWN_EXIT_CODE),
            }
        })?;

        if !output.status.success() {
            return Err(VariableError::ComputedVariableFailed {
                name: name.to_string(),
                command: script,
                status: output.status.code(),
            });
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        self.computed.insert(name.to_string(), value.clone());
        Ok(value)
    }
}
