// src/registry/mod.rs

//! Single-flight admission per script identity.
//!
//! - [`table`] owns the shared slot table and the FIFO wait queues.
//! - [`ticket`] holds the lease handed to whoever owns a slot, and the
//!   waiter handle given to callers that have to queue.

pub mod table;
pub mod ticket;

pub use table::{ExecutionRegistry, SlotSnapshot};
pub use ticket::{Admission, AdmissionTicket, Waiter};
