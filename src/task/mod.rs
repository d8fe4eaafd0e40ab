//! Task module - task definitions, the built-in catalog, and the registry.
//!
//! Tasks are data: one generic pipeline runs every task, parameterized by its
//! [`TaskDefinition`]. Definitions are compiled once at startup and shared
//! read-only through `Arc`.

pub mod catalog;
mod definition;
mod registry;

pub use definition::{
    DefinitionError, MissingOutput, OutputOverride, ShortCircuit, ShortCircuitCondition,
    TaskDefinition, TaskSpec,
};
pub use registry::{RegistryError, TaskInfo, TaskRegistry};
