// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The coordinator talks to a `ProcessBackend` instead of spawning processes
//! itself. This makes it easy to swap in a scripted fake in tests while
//! keeping the production runner in [`process_runner`](super::process_runner).

use tokio::sync::mpsc;

use crate::config::ExecLimits;
use crate::exec::command::ScriptCommand;
use crate::exec::event::OutputEvent;
use crate::exec::process_runner::spawn_runner;

/// Trait abstracting how a resolved command is executed.
///
/// Implementations must deliver exactly one `OutputEvent::Terminal` as the
/// last event on the returned channel and must not return before the work is
/// running in the background.
pub trait ProcessBackend: Send + Sync {
    fn launch(&self, command: ScriptCommand, limits: ExecLimits) -> mpsc::Receiver<OutputEvent>;
}

/// Real backend used in production: one OS process per launch.
#[derive(Debug, Clone, Default)]
pub struct RealProcessBackend;

impl RealProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessBackend for RealProcessBackend {
    fn launch(&self, command: ScriptCommand, limits: ExecLimits) -> mpsc::Receiver<OutputEvent> {
        spawn_runner(command, limits)
    }
}
