//! Sandboxed execution of untrusted source snippets.
//!
//! Components, leaves first:
//!
//! - [`workspace`]: per-request scratch directory holding one source file.
//! - [`runner`]: language descriptors and the read-only registry.
//! - [`supervisor`]: spawns the interpreter, feeds stdin, captures output and
//!   enforces the wall-clock deadline on the whole process group.
//! - [`outcome`]: folds a raw process result into an [`outcome::ExecutionOutcome`].
//! - [`engine`]: composes the above for one request.

pub mod config;
pub mod engine;
pub mod outcome;
pub mod runner;
pub mod supervisor;
pub mod workspace;
