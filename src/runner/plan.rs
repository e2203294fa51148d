//! Dependency resolution
//!
//! Turns a requested task into an ordered, duplicate-free list of every task
//! it transitively needs. The walk is a depth-first search over declared
//! prerequisites in declaration order; a task is appended once all of its
//! prerequisites are done, which gives a topological order that is the same
//! on every run.

use crate::error::{TaskError, TaskResult};
use crate::runner::registry::TaskRegistry;
use std::collections::HashMap;
use tracing::debug;

/// Tasks to run for one invocation, prerequisites first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionPlan {
    tasks: Vec<String>,
}

impl ExecutionPlan {
    /// Task names in execution order
    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t == name)
    }

    /// Zero-based position of `name` in the plan
    pub fn position(&self, name: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Computes execution plans against a registry
pub struct DependencyResolver<'a> {
    registry: &'a TaskRegistry,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a TaskRegistry) -> Self {
        DependencyResolver { registry }
    }

    /// Plan `root` and everything it depends on
    pub fn plan(&self, root: &str) -> TaskResult<ExecutionPlan> {
        self.plan_all(&[root])
    }

    /// Plan several roots into one plan; shared prerequisites appear once
    pub fn plan_all<S: AsRef<str>>(&self, roots: &[S]) -> TaskResult<ExecutionPlan> {
        let mut states = HashMap::new();
        let mut path = Vec::new();
        let mut plan = ExecutionPlan::default();

        for root in roots {
            let task = self.registry.get(root.as_ref())?;
            self.visit(&task.name, &mut states, &mut path, &mut plan)?;
        }

        debug!(roots = roots.len(), tasks = ?plan.tasks, "built execution plan");
        Ok(plan)
    }

    fn visit(
        &self,
        name: &'a str,
        states: &mut HashMap<&'a str, VisitState>,
        path: &mut Vec<&'a str>,
        plan: &mut ExecutionPlan,
    ) -> TaskResult<()> {
        match states.get(name) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::InProgress) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(TaskError::CyclicDependency { cycle });
            }
            None => {}
        }

        let task = self.registry.get(name).map_err(|_| TaskError::UnknownTask {
            name: name.to_string(),
            required_by: path.last().map(|p| p.to_string()),
        })?;

        states.insert(name, VisitState::InProgress);
        path.push(name);

        for prerequisite in &task.prerequisites {
            self.visit(prerequisite, states, path, plan)?;
        }

        path.pop();
        states.insert(name, VisitState::Done);
        plan.tasks.push(name.to_string());
        Ok(())
    }
}
