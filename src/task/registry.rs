//! Task registry: the fixed name → definition lookup used by the dispatcher.
//!
//! Starts from the built-in catalog and can be extended once at startup from
//! a YAML file. Lookups hand out `Arc`s so in-flight dispatches never borrow
//! the registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::catalog;
use super::definition::{DefinitionError, TaskDefinition, TaskSpec};
use crate::error::TaskError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task {0} is already registered")]
    Duplicate(String),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("failed to read task catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse task catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Summary of a registered task, as listed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// Name → definition lookup, fixed once the process has started.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<TaskDefinition>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in task catalog.
    pub fn with_builtin_tasks() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for spec in catalog::builtin_specs() {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Compile and add a task. Names must be unique.
    pub fn register(&mut self, spec: TaskSpec) -> Result<(), RegistryError> {
        if self.tasks.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        let definition = TaskDefinition::compile(spec)?;
        self.tasks
            .insert(definition.name().to_string(), Arc::new(definition));
        Ok(())
    }

    /// Compile and add a task, replacing any task of the same name.
    ///
    /// Returns true if an existing task was replaced.
    pub fn upsert(&mut self, spec: TaskSpec) -> Result<bool, RegistryError> {
        let definition = TaskDefinition::compile(spec)?;
        let replaced = self
            .tasks
            .insert(definition.name().to_string(), Arc::new(definition))
            .is_some();
        Ok(replaced)
    }

    /// Load a YAML list of task specs. Entries replace tasks with the same name.
    ///
    /// Names repeated within the file are rejected. Nothing is registered
    /// unless every entry compiles.
    pub fn load_catalog_file(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let path_text = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path_text.clone(),
            source,
        })?;
        let specs: Vec<TaskSpec> =
            serde_yaml::from_str(&contents).map_err(|source| RegistryError::Parse {
                path: path_text.clone(),
                source,
            })?;

        let mut staged: HashMap<String, Arc<TaskDefinition>> = HashMap::new();
        for spec in specs {
            if staged.contains_key(&spec.name) {
                return Err(RegistryError::Duplicate(spec.name));
            }
            let definition = TaskDefinition::compile(spec)?;
            staged.insert(definition.name().to_string(), Arc::new(definition));
        }

        let count = staged.len();
        for (name, definition) in staged {
            if self.tasks.insert(name.clone(), definition).is_some() {
                tracing::info!("Task catalog {} replaced built-in task {}", path_text, name);
            }
        }
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Result<Arc<TaskDefinition>, TaskError> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::UnknownTask {
                name: name.to_string(),
            })
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Every task with its schemas, sorted by name.
    pub fn list(&self) -> Vec<TaskInfo> {
        let mut list: Vec<_> = self
            .tasks
            .values()
            .map(|task| TaskInfo {
                name: task.name().to_string(),
                description: task.description().to_string(),
                input_schema: task.input_schema().to_json_schema(),
                output_schema: task.output_schema().to_json_schema(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
