// src/coordinator/mod.rs

//! Per-request orchestration.
//!
//! The coordinator ties the other layers together for one request:
//! resolve the identity, take the registry slot (queueing with `Waiting`
//! heartbeats if needed), write any inline source, launch the process and
//! relay its events to the caller's sink, then release the slot before the
//! terminal event is delivered.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::catalog::{ResolvedScript, ScriptResolver};
use crate::config::{ConfigFile, ExecLimits};
use crate::errors::{KyonrunError, Result};
use crate::exec::{OutputEvent, ProcessBackend, Termination};
use crate::fs::FileSystem;
use crate::registry::{Admission, AdmissionTicket, ExecutionRegistry};
use crate::sink::OutputSink;
use crate::types::{OutputMode, ScriptIdentity};

pub mod phase;

pub use phase::ExecutionPhase;
use phase::PhaseTracker;

/// Reason used when a backend hangs up without reporting an outcome.
pub const MISSING_TERMINAL: &str = "process runner ended without a terminal event";

/// One caller's request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub identity: ScriptIdentity,
    pub source: Option<String>,
    pub mode: OutputMode,
}

impl ExecutionRequest {
    pub fn registered(id: impl Into<ScriptIdentity>) -> Self {
        Self {
            identity: id.into(),
            source: None,
            mode: OutputMode::Streamed,
        }
    }

    pub fn adhoc(source: impl Into<String>) -> Self {
        Self {
            identity: ScriptIdentity::adhoc(),
            source: Some(source.into()),
            mode: OutputMode::Buffered,
        }
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Timing knobs for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub limits: ExecLimits,
    /// Interval between repeated `Waiting` events while queued.
    pub wait_heartbeat: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            limits: ExecLimits::default(),
            wait_heartbeat: Duration::from_secs(5),
        }
    }
}

impl From<&ConfigFile> for CoordinatorOptions {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            limits: cfg.limits,
            wait_heartbeat: cfg.wait_heartbeat,
        }
    }
}

/// Runs requests against the shared registry. Cheap to clone.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    registry: ExecutionRegistry,
    backend: Arc<dyn ProcessBackend>,
    resolver: Arc<dyn ScriptResolver>,
    writer: Arc<dyn FileSystem>,
    options: CoordinatorOptions,
}

impl std::fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ExecutionCoordinator {
    pub fn new(
        registry: ExecutionRegistry,
        backend: Arc<dyn ProcessBackend>,
        resolver: Arc<dyn ScriptResolver>,
        writer: Arc<dyn FileSystem>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            registry,
            backend,
            resolver,
            writer,
            options,
        }
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.registry
    }

    pub fn options(&self) -> CoordinatorOptions {
        self.options
    }

    /// Resolve the request without touching the registry.
    ///
    /// Fails with `ScriptNotFound` for unknown identities and with
    /// `SourceNotAccepted` when source is sent to a registered script.
    pub fn prepare(&self, request: ExecutionRequest) -> Result<PreparedExecution> {
        let mut tracker = PhaseTracker::new(request.identity.clone());

        let Some(resolved) = self.resolver.resolve(&request.identity) else {
            tracker.advance(ExecutionPhase::Done);
            return Err(KyonrunError::ScriptNotFound(request.identity.to_string()));
        };

        if request.source.is_some() && !resolved.accepts_source {
            tracker.advance(ExecutionPhase::Done);
            return Err(KyonrunError::SourceNotAccepted(request.identity.to_string()));
        }

        Ok(PreparedExecution {
            coordinator: self.clone(),
            request,
            resolved,
            tracker,
        })
    }

    /// `prepare` followed by `run`.
    pub async fn execute<S>(&self, request: ExecutionRequest, sink: &mut S) -> Result<()>
    where
        S: OutputSink + ?Sized,
    {
        self.prepare(request)?.run(sink).await
    }
}

/// A resolved request that has not yet been admitted.
#[derive(Debug)]
pub struct PreparedExecution {
    coordinator: ExecutionCoordinator,
    request: ExecutionRequest,
    resolved: ResolvedScript,
    tracker: PhaseTracker,
}

impl PreparedExecution {
    pub fn identity(&self) -> &ScriptIdentity {
        &self.request.identity
    }

    pub fn mode(&self) -> OutputMode {
        self.request.mode
    }

    pub fn resolved(&self) -> &ResolvedScript {
        &self.resolved
    }

    /// Admit, run, and deliver every event to `sink`.
    ///
    /// Returns an error only when admission itself breaks down; every
    /// admitted execution ends with exactly one terminal event on `sink`.
    pub async fn run<S>(mut self, sink: &mut S) -> Result<()>
    where
        S: OutputSink + ?Sized,
    {
        self.tracker.advance(ExecutionPhase::Admitting);
        let ticket = self.admit(sink).await?;

        if let Some(source) = self.request.source.take() {
            let path = &self.resolved.script_path;
            if let Err(e) = self.coordinator.writer.write(path, source.as_bytes()) {
                warn!(identity = %self.request.identity, path = ?path, error = %e, "failed to write script source");
                let termination = Termination::failed(format!("writing script {path:?}: {e:#}"));
                self.finish(ticket, termination, sink).await;
                return Ok(());
            }
        }

        self.tracker.advance(ExecutionPhase::Running);
        info!(identity = %self.request.identity, command = %self.resolved.command, "starting execution");

        let mut events = self
            .coordinator
            .backend
            .launch(self.resolved.command.clone(), self.coordinator.options.limits);

        let mut terminal = None;
        while let Some(event) = events.recv().await {
            match event {
                OutputEvent::Terminal(termination) => {
                    terminal = Some(termination);
                    break;
                }
                OutputEvent::Started { pid } => {
                    ticket.attach_pid(pid);
                    sink.deliver(OutputEvent::Started { pid }).await;
                }
                other => sink.deliver(other).await,
            }
        }

        let termination = terminal.unwrap_or_else(|| {
            warn!(identity = %self.request.identity, "{MISSING_TERMINAL}");
            Termination::failed(MISSING_TERMINAL)
        });
        self.finish(ticket, termination, sink).await;
        Ok(())
    }

    async fn admit<S>(&self, sink: &mut S) -> Result<AdmissionTicket>
    where
        S: OutputSink + ?Sized,
    {
        let registry = &self.coordinator.registry;
        let mut waiter = match registry.admit(&self.request.identity) {
            Admission::Granted(ticket) => return Ok(ticket),
            Admission::Queued(waiter) => waiter,
        };

        debug!(identity = %self.request.identity, position = waiter.position(), "queued behind running execution");
        sink.deliver(OutputEvent::waiting()).await;

        let every = self.coordinator.options.wait_heartbeat;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + every, every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                admitted = waiter.admitted() => return admitted,
                _ = heartbeat.tick() => sink.deliver(OutputEvent::waiting()).await,
            }
        }
    }

    async fn finish<S>(&mut self, ticket: AdmissionTicket, termination: Termination, sink: &mut S)
    where
        S: OutputSink + ?Sized,
    {
        self.tracker.advance(ExecutionPhase::Finalizing);
        if termination.timed_out() {
            warn!(identity = %self.request.identity, outcome = ?termination, "execution timed out");
        } else {
            info!(identity = %self.request.identity, outcome = ?termination, "execution finished");
        }

        ticket.release();
        sink.deliver(OutputEvent::Terminal(termination)).await;

        self.tracker.advance(ExecutionPhase::Done);
    }
}
