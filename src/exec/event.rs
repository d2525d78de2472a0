// src/exec/event.rs

//! Events produced by one execution, from spawn to termination.

use std::fmt;

/// Which pipe a chunk of output was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => f.write_str("stdout"),
            StreamSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// How an execution ended. Exactly one of these is produced per admitted
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The process ran and was reaped.
    ///
    /// `exit_code` is `None` when the process was killed by a signal, in
    /// which case `signal` carries its name (e.g. `"SIGTERM"`). `timed_out`
    /// is set when the kill was requested by the timeout.
    Exited {
        exit_code: Option<i32>,
        signal: Option<String>,
        timed_out: bool,
    },
    /// No process ran to completion: spawning failed, or the script could
    /// not be written beforehand.
    Failed { reason: String },
}

impl Termination {
    pub fn exited(exit_code: i32) -> Self {
        Termination::Exited {
            exit_code: Some(exit_code),
            signal: None,
            timed_out: false,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Termination::Failed {
            reason: reason.into(),
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, Termination::Exited { timed_out: true, .. })
    }
}

/// One unit of output flowing from the process runner (or the coordinator)
/// to an output sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Raw bytes read from one of the child's pipes.
    Chunk { source: StreamSource, data: Vec<u8> },
    /// The request is queued behind another execution of the same script.
    Waiting { message: String },
    /// The child process was spawned.
    Started { pid: Option<u32> },
    /// The execution is over; nothing follows this event.
    Terminal(Termination),
}

impl OutputEvent {
    pub const WAITING_MESSAGE: &'static str = "Waiting for another script request...";

    pub fn waiting() -> Self {
        OutputEvent::Waiting {
            message: Self::WAITING_MESSAGE.to_string(),
        }
    }

    pub fn stdout(data: impl Into<Vec<u8>>) -> Self {
        OutputEvent::Chunk {
            source: StreamSource::Stdout,
            data: data.into(),
        }
    }

    pub fn stderr(data: impl Into<Vec<u8>>) -> Self {
        OutputEvent::Chunk {
            source: StreamSource::Stderr,
            data: data.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OutputEvent::Terminal(_))
    }
}
