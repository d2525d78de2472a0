//! API response types.

use serde::Serialize;

use crate::registry::SlotSnapshot;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Registry snapshot.
#[derive(Debug, Serialize)]
pub struct SlotListResponse {
    pub slots: Vec<SlotSnapshot>,
    pub running: usize,
}

impl From<Vec<SlotSnapshot>> for SlotListResponse {
    fn from(slots: Vec<SlotSnapshot>) -> Self {
        let running = slots.iter().filter(|s| s.running).count();
        Self { slots, running }
    }
}

/// Registered scripts.
#[derive(Debug, Serialize)]
pub struct ScriptListResponse {
    pub scripts: Vec<String>,
    pub count: usize,
    pub adhoc: bool,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub scripts: usize,
    pub message: String,
}
