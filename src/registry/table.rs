// src/registry/table.rs

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::debug;

use crate::types::ScriptIdentity;

use super::ticket::{Admission, AdmissionTicket, Waiter};

/// Per-identity slot state.
#[derive(Debug, Default)]
struct ExecutionSlot {
    running: bool,
    pid: Option<u32>,
    /// Bumped on every grant; tickets carry the value they were granted.
    lease: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    slots: HashMap<ScriptIdentity, ExecutionSlot>,
    waiters: HashMap<ScriptIdentity, VecDeque<oneshot::Sender<AdmissionTicket>>>,
}

/// Point-in-time view of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSnapshot {
    pub identity: ScriptIdentity,
    pub running: bool,
    pub pid: Option<u32>,
    pub waiting: usize,
}

/// Table of script identities that currently have a live execution.
///
/// Cloning is cheap and every clone shares the same table. All state lives
/// behind one mutex; `admit` is an atomic check-and-mark and `release` hands
/// the slot directly to the oldest live waiter, so the slot is never free
/// in between and waiters are admitted in FIFO order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `identity`, or join its wait queue.
    pub fn admit(&self, identity: &ScriptIdentity) -> Admission {
        let mut state = self.lock();

        let slot = state.slots.entry(identity.clone()).or_default();
        if !slot.running {
            slot.running = true;
            slot.pid = None;
            slot.lease += 1;
            debug!(%identity, lease = slot.lease, "slot admitted immediately");
            return Admission::Granted(AdmissionTicket::new(
                self.clone(),
                identity.clone(),
                slot.lease,
            ));
        }

        let (tx, rx) = oneshot::channel();
        let queue = state.waiters.entry(identity.clone()).or_default();
        queue.push_back(tx);
        let position = queue.len();
        debug!(%identity, position, "slot busy; caller queued");

        Admission::Queued(Waiter::new(identity.clone(), position, rx))
    }

    /// Free the slot for `identity`, handing it to the next waiter if any.
    ///
    /// A no-op for identities that are not running, including ones that
    /// were never admitted.
    pub fn release(&self, identity: &ScriptIdentity) {
        let mut state = self.lock();
        let lease = match state.slots.get(identity) {
            Some(slot) if slot.running => slot.lease,
            _ => {
                debug!(%identity, "release of idle slot ignored");
                return;
            }
        };
        self.release_locked(&mut state, identity, lease);
    }

    pub(crate) fn release_lease(&self, identity: &ScriptIdentity, lease: u64) {
        let mut state = self.lock();
        self.release_locked(&mut state, identity, lease);
    }

    pub(crate) fn attach_pid(&self, identity: &ScriptIdentity, lease: u64, pid: Option<u32>) {
        let mut state = self.lock();
        if let Some(slot) = state.slots.get_mut(identity) {
            if slot.running && slot.lease == lease {
                slot.pid = pid;
            }
        }
    }

    /// Whether an execution currently holds the slot for `identity`.
    pub fn is_running(&self, identity: &ScriptIdentity) -> bool {
        self.lock()
            .slots
            .get(identity)
            .is_some_and(|slot| slot.running)
    }

    /// All known slots, sorted by identity.
    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        let state = self.lock();
        let mut slots: Vec<SlotSnapshot> = state
            .slots
            .iter()
            .map(|(identity, slot)| SlotSnapshot {
                identity: identity.clone(),
                running: slot.running,
                pid: slot.pid,
                waiting: state
                    .waiters
                    .get(identity)
                    .map(|q| q.iter().filter(|tx| !tx.is_closed()).count())
                    .unwrap_or(0),
            })
            .collect();
        slots.sort_by(|a, b| a.identity.cmp(&b.identity));
        slots
    }

    fn release_locked(&self, state: &mut RegistryState, identity: &ScriptIdentity, lease: u64) {
        let RegistryState { slots, waiters } = state;

        let Some(slot) = slots.get_mut(identity) else {
            return;
        };
        if !slot.running || slot.lease != lease {
            debug!(%identity, lease, current = slot.lease, "stale release ignored");
            return;
        }
        slot.pid = None;

        if let Some(queue) = waiters.get_mut(identity) {
            while let Some(tx) = queue.pop_front() {
                slot.lease += 1;
                let ticket = AdmissionTicket::new(self.clone(), identity.clone(), slot.lease);
                match tx.send(ticket) {
                    Ok(()) => {
                        debug!(%identity, lease = slot.lease, "slot handed to next waiter");
                        return;
                    }
                    Err(mut ticket) => {
                        // Waiter gave up; the registry still holds the lock.
                        ticket.disarm();
                    }
                }
            }
            waiters.remove(identity);
        }

        slot.running = false;
        debug!(%identity, "slot released");
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
