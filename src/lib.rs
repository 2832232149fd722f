//! Kanna core library.
//!
//! This library implements the `gen` pipeline: loading `Kannafile` build
//! descriptions, resolving labels into a typed target graph, and emitting
//! deterministic Ninja files plus optional IDE artifacts.

pub mod ast;
pub mod builder;
pub mod cli;
pub mod console;
pub mod emit;
pub mod files;
pub mod ide;
pub mod label;
pub mod pool;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod settings;
pub mod setup;
pub mod target;
pub mod validate;
