//! Sandboxed execution engine for untrusted, user-submitted source snippets.
//!
//! The [`sandbox`] module owns the whole request lifecycle: a private
//! scratch workspace, runner lookup, a supervised child process bounded by
//! a wall-clock deadline, and a uniform [`sandbox::outcome::ExecutionOutcome`].
//! Nothing here touches HTTP or global state; callers construct an
//! [`sandbox::engine::ExecutionEngine`] once and share it.

pub mod error;
pub mod sandbox;
