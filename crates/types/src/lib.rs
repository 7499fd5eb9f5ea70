//! Shared type definitions for the Opal agent runtime.
//!
//! This crate holds the serde-facing schema shared between the memory store,
//! the workflow engine, and any embedding host: memory item records, workflow
//! definitions and their step kinds, and execution lifecycle states. Keeping
//! these models in a leaf crate lets the engine and future surfaces (servers,
//! shells) agree on one wire shape without depending on each other.

pub mod memory;
pub mod workflow;

pub use memory::{LocatedMemory, MemoryItem, MemoryMap, MemoryType, RecentMemory, FrequentMemory};
pub use workflow::{ExecutionStatus, StepKind, WorkflowDefinition, WorkflowStep};
