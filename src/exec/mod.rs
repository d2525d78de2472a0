// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running resolved script commands
//! using `tokio::process::Command` and turning everything the child does into
//! a stream of [`OutputEvent`]s.
//!
//! - [`command`] holds the resolved program invocation.
//! - [`event`] defines the events and terminal outcomes.
//! - [`process_runner`] spawns one process, pumps its pipes, and enforces the
//!   timeout (SIGTERM, then SIGKILL).
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `RealProcessBackend`, which tests can replace with a fake.

pub mod backend;
pub mod command;
pub mod event;
pub mod process_runner;

pub use backend::{ProcessBackend, RealProcessBackend};
pub use command::ScriptCommand;
pub use event::{OutputEvent, StreamSource, Termination};
pub use process_runner::spawn_runner;
