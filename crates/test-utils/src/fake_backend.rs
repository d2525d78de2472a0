use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use kyonrun::catalog::{ResolvedScript, ScriptResolver};
use kyonrun::config::ExecLimits;
use kyonrun::exec::{OutputEvent, ProcessBackend, ScriptCommand, Termination};
use kyonrun::types::ScriptIdentity;

/// One step of a scripted fake process.
#[derive(Debug, Clone)]
pub enum Step {
    Stdout(&'static str),
    Stderr(&'static str),
    Sleep(Duration),
    Exit(i32),
    /// Report a timer-driven termination.
    TimedOut,
    Fail(&'static str),
    /// Close the channel without a terminal event.
    HangUp,
}

#[derive(Debug, Default)]
struct Tracking {
    active: HashMap<String, usize>,
    max_active: HashMap<String, usize>,
    launched: Vec<String>,
    /// (program, "start"|"end") in the order they happened.
    timeline: Vec<(String, &'static str)>,
}

/// A `ProcessBackend` that plays back scripted steps instead of spawning.
///
/// Scripts are keyed by `command.program`. Per-program concurrency is
/// tracked so tests can assert that executions never overlap.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    scripts: Arc<Mutex<HashMap<String, Vec<Step>>>>,
    tracking: Arc<Mutex<Tracking>>,
    next_pid: Arc<AtomicU32>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, program: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(program.to_string(), steps);
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.tracking.lock().unwrap().launched.clone()
    }

    pub fn max_concurrency(&self, program: &str) -> usize {
        self.tracking
            .lock()
            .unwrap()
            .max_active
            .get(program)
            .copied()
            .unwrap_or(0)
    }

    pub fn timeline(&self) -> Vec<(String, &'static str)> {
        self.tracking.lock().unwrap().timeline.clone()
    }

    fn enter(&self, program: &str) {
        let mut t = self.tracking.lock().unwrap();
        t.launched.push(program.to_string());
        t.timeline.push((program.to_string(), "start"));
        let now = {
            let active = t.active.entry(program.to_string()).or_default();
            *active += 1;
            *active
        };
        let max = t.max_active.entry(program.to_string()).or_default();
        *max = (*max).max(now);
    }

    fn leave(&self, program: &str) {
        let mut t = self.tracking.lock().unwrap();
        if let Some(active) = t.active.get_mut(program) {
            *active -= 1;
        }
        t.timeline.push((program.to_string(), "end"));
    }
}

impl ProcessBackend for FakeBackend {
    fn launch(&self, command: ScriptCommand, _limits: ExecLimits) -> mpsc::Receiver<OutputEvent> {
        let (tx, rx) = mpsc::channel(64);
        let program = command.program.clone();
        let steps = self
            .scripts
            .lock()
            .unwrap()
            .get(&program)
            .cloned()
            .unwrap_or_else(|| vec![Step::Exit(0)]);
        let pid = 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
        let backend = self.clone();

        tokio::spawn(async move {
            backend.enter(&program);
            let _ = tx.send(OutputEvent::Started { pid: Some(pid) }).await;

            let mut terminal = None;
            for step in steps {
                match step {
                    Step::Stdout(s) => {
                        let _ = tx.send(OutputEvent::stdout(s)).await;
                    }
                    Step::Stderr(s) => {
                        let _ = tx.send(OutputEvent::stderr(s)).await;
                    }
                    Step::Sleep(d) => tokio::time::sleep(d).await,
                    Step::Exit(code) => {
                        terminal = Some(Termination::exited(code));
                        break;
                    }
                    Step::TimedOut => {
                        terminal = Some(Termination::Exited {
                            exit_code: None,
                            signal: Some("SIGTERM".to_string()),
                            timed_out: true,
                        });
                        break;
                    }
                    Step::Fail(reason) => {
                        terminal = Some(Termination::failed(reason));
                        break;
                    }
                    Step::HangUp => break,
                }
            }

            backend.leave(&program);
            if let Some(termination) = terminal {
                let _ = tx.send(OutputEvent::Terminal(termination)).await;
            }
        });

        rx
    }
}

/// Resolver over a fixed map, for tests that bypass the script table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    scripts: HashMap<ScriptIdentity, ResolvedScript>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`, launched as a command whose program is `id` itself.
    pub fn with_script(mut self, id: &str) -> Self {
        self.scripts.insert(
            ScriptIdentity::new(id),
            ResolvedScript {
                command: ScriptCommand::new(id),
                script_path: PathBuf::from(format!("/scripts/{id}")),
                accepts_source: false,
            },
        );
        self
    }

    /// Enable the ad-hoc slot, launched as program `"@adhoc"`.
    pub fn with_adhoc(mut self, script_path: impl Into<PathBuf>) -> Self {
        self.scripts.insert(
            ScriptIdentity::adhoc(),
            ResolvedScript {
                command: ScriptCommand::new(ScriptIdentity::ADHOC),
                script_path: script_path.into(),
                accepts_source: true,
            },
        );
        self
    }
}

impl ScriptResolver for StaticResolver {
    fn resolve(&self, identity: &ScriptIdentity) -> Option<ResolvedScript> {
        self.scripts.get(identity).cloned()
    }
}
