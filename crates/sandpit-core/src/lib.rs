//! # sandpit-core
//!
//! Execution core for untrusted code snippets.
//!
//! A submission flows through these stages:
//! - `screen` - textual denylist check of import statements
//! - `gate` - bounded admission in front of the sandbox
//! - `sandbox` - scratch file + child process under a wall-clock timeout
//! - `normalize` - reduce a diagnostic trace to one error line
//! - `result` - map the outcome to what the caller sees
//!
//! [`Executor`] wires them together into the single `execute` operation.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod isolation;
pub mod normalize;
pub mod outcome;
pub mod protocol;
pub mod result;
pub mod sandbox;
pub mod scratch;
pub mod screen;

pub use config::SandboxConfig;
pub use error::SandpitError;
pub use executor::Executor;
pub use outcome::ExecutionOutcome;
pub use result::ExecutionResult;
pub use screen::{Screener, ScreeningVerdict};

/// Crate-level result type
pub type Result<T> = std::result::Result<T, SandpitError>;
