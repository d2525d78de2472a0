// src/registry/ticket.rs

use std::fmt;

use tokio::sync::oneshot;

use crate::errors::{KyonrunError, Result};
use crate::types::ScriptIdentity;

use super::table::ExecutionRegistry;

/// Proof that the holder owns the running slot for one identity.
///
/// Each ticket carries the lease number it was granted under. Releasing it
/// (explicitly or by dropping it) only frees the slot if that lease is still
/// current, so a stale ticket can never release someone else's execution.
pub struct AdmissionTicket {
    registry: ExecutionRegistry,
    identity: ScriptIdentity,
    lease: u64,
    armed: bool,
}

impl AdmissionTicket {
    pub(crate) fn new(registry: ExecutionRegistry, identity: ScriptIdentity, lease: u64) -> Self {
        Self {
            registry,
            identity,
            lease,
            armed: true,
        }
    }

    pub fn identity(&self) -> &ScriptIdentity {
        &self.identity
    }

    /// Record the spawned process in the slot.
    pub fn attach_pid(&self, pid: Option<u32>) {
        self.registry.attach_pid(&self.identity, self.lease, pid);
    }

    /// Give the slot up, waking the next waiter if there is one.
    pub fn release(mut self) {
        self.release_once();
    }

    /// Forget this ticket without touching the registry. Used when a
    /// hand-off fails and the registry already holds its own lock.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    fn release_once(&mut self) {
        if self.armed {
            self.armed = false;
            self.registry.release_lease(&self.identity, self.lease);
        }
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for AdmissionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionTicket")
            .field("identity", &self.identity)
            .field("lease", &self.lease)
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

/// A caller queued behind the current holder of a slot.
#[derive(Debug)]
pub struct Waiter {
    identity: ScriptIdentity,
    position: usize,
    rx: oneshot::Receiver<AdmissionTicket>,
}

impl Waiter {
    pub(crate) fn new(
        identity: ScriptIdentity,
        position: usize,
        rx: oneshot::Receiver<AdmissionTicket>,
    ) -> Self {
        Self {
            identity,
            position,
            rx,
        }
    }

    /// 1-based queue position at the time of enqueueing.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Wait until the slot is handed to this caller.
    ///
    /// Cancel-safe: dropping the returned future keeps the waiter queued, so
    /// it can be polled again from a `select!` loop.
    pub async fn admitted(&mut self) -> Result<AdmissionTicket> {
        (&mut self.rx)
            .await
            .map_err(|_| KyonrunError::AdmissionClosed(self.identity.to_string()))
    }
}

/// Result of asking the registry for a slot.
#[derive(Debug)]
pub enum Admission {
    /// The slot was free and now belongs to the caller.
    Granted(AdmissionTicket),
    /// The slot is busy; the caller is queued in FIFO order.
    Queued(Waiter),
}
