// src/coordinator/phase.rs

use std::fmt;

use tracing::debug;

use crate::types::ScriptIdentity;

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Resolving,
    Admitting,
    Running,
    Finalizing,
    Done,
}

impl ExecutionPhase {
    /// Whether `self -> next` is a legal step. Phases are never revisited.
    pub fn can_advance_to(self, next: ExecutionPhase) -> bool {
        use ExecutionPhase::*;
        matches!(
            (self, next),
            (Resolving, Admitting)
                | (Resolving, Done)
                | (Admitting, Running)
                | (Admitting, Finalizing)
                | (Running, Finalizing)
                | (Finalizing, Done)
        )
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionPhase::Resolving => "resolving",
            ExecutionPhase::Admitting => "admitting",
            ExecutionPhase::Running => "running",
            ExecutionPhase::Finalizing => "finalizing",
            ExecutionPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Tracks the phase of one request and logs each transition.
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    identity: ScriptIdentity,
    phase: ExecutionPhase,
}

impl PhaseTracker {
    pub(crate) fn new(identity: ScriptIdentity) -> Self {
        Self {
            identity,
            phase: ExecutionPhase::Resolving,
        }
    }

    pub(crate) fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    /// Move to `next`. An illegal step is a bug in the coordinator.
    pub(crate) fn advance(&mut self, next: ExecutionPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal phase transition {} -> {}",
            self.phase,
            next
        );
        debug!(identity = %self.identity, from = %self.phase, to = %next, "execution phase");
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionPhase::*;
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let path = [Resolving, Admitting, Running, Finalizing, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn short_circuits_are_allowed() {
        assert!(Resolving.can_advance_to(Done));
        assert!(Admitting.can_advance_to(Finalizing));
    }

    #[test]
    fn phases_are_never_revisited() {
        let all = [Resolving, Admitting, Running, Finalizing, Done];
        for from in all {
            assert!(!from.can_advance_to(from));
            assert!(!from.can_advance_to(Resolving));
        }
        assert!(!Done.can_advance_to(Finalizing));
        assert!(!Running.can_advance_to(Admitting));
        assert!(!Running.can_advance_to(Done));
    }

    #[test]
    fn tracker_follows_transitions() {
        let mut tracker = PhaseTracker::new(ScriptIdentity::new("echo"));
        assert_eq!(tracker.phase(), Resolving);
        tracker.advance(Admitting);
        tracker.advance(Finalizing);
        tracker.advance(Done);
        assert_eq!(tracker.phase(), Done);
    }
}
