//! Task registry
//!
//! Tasks are registered once, when the task file is loaded, and are read-only
//! afterwards. Prerequisite names are not checked on registration so a task may
//! name one declared further down the file.

use crate::config::Config;
use crate::error::{TaskError, TaskResult};
use crate::runner::task::Task;
use std::collections::HashMap;

/// Named tasks in registration order
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every task in a configuration
    pub fn from_config(config: &Config) -> TaskResult<Self> {
        let mut registry = TaskRegistry::new();
        for (name, task) in &config.tasks {
            registry.register(Task::from_config(name.clone(), task.clone()))?;
        }
        Ok(registry)
    }

    /// Add a task; fails if the name is taken
    pub fn register(&mut self, task: Task) -> TaskResult<()> {
        if self.index.contains_key(&task.name) {
            return Err(TaskError::DuplicateTask(task.name));
        }
        self.index.insert(task.name.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Look up a task by name
    pub fn get(&self, name: &str) -> TaskResult<&Task> {
        self.index
            .get(name)
            .map(|&i| &self.tasks[i])
            .ok_or_else(|| TaskError::UnknownTask {
                name: name.to_string(),
                required_by: None,
            })
    }

    /// Declared (not transitive) prerequisites of `name`
    pub fn list_prerequisites(&self, name: &str) -> TaskResult<&[String]> {
        self.get(name).map(|task| task.prerequisites.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// The first registered task, used when no target is named
    pub fn first(&self) -> Option<&Task> {
        self.tasks.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_register_and_get() {
        let mut registry = TaskRegistry::new();
        registry
            .register(Task::new("build").with_prerequisites(["clean"]))
            .unwrap();

        assert_eq!(registry.get("build").unwrap().name, "build");
        assert_eq!(registry.list_prerequisites("build").unwrap(), &["clean".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_task() {
        let mut registry = TaskRegistry::new();
        registry.register(Task::new("build")).unwrap();
        let result = registry.register(Task::new("build").with_action("echo again"));
        assert_eq!(result, Err(TaskError::DuplicateTask("build".to_string())));
        assert!(registry.get("build").unwrap().actions.is_empty());
    }

    #[test]
    fn test_unknown_task() {
        let registry = TaskRegistry::new();
        assert_eq!(
            registry.get("deploy"),
            Err(TaskError::UnknownTask {
                name: "deploy".to_string(),
                required_by: None
            })
        );
        assert!(registry.list_prerequisites("deploy").is_err());
    }

    #[test]
    fn test_forward_references_register() {
        let yaml = r#"
tasks:
  deploy:
    deps: [push, missing]
  push:
    run: echo push
"#;
        let config = parse_config(yaml, None).unwrap();
        let registry = TaskRegistry::from_config(&config).unwrap();
        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["deploy", "push"]);
        assert_eq!(registry.first().unwrap().name, "deploy");
    }
}
