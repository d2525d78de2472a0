// src/sink/buffered.rs

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use tracing::debug;

use crate::exec::{OutputEvent, Termination};

use super::{render_into, OutputSink};

/// Final result handed to a buffered caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    pub timed_out: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Collects everything and produces one [`ExecutionResult`] at the end.
#[derive(Debug, Default)]
pub struct BufferedSink {
    output: Vec<u8>,
    termination: Option<Termination>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.termination.is_some()
    }

    /// Build the result. A sink that never saw a terminal event reports
    /// that as an error rather than pretending the script succeeded.
    pub fn into_result(self) -> ExecutionResult {
        let output = String::from_utf8_lossy(&self.output)
            .trim_end_matches(['\n', '\r'])
            .to_string();

        match self.termination {
            Some(Termination::Exited {
                exit_code,
                signal,
                timed_out,
            }) => ExecutionResult {
                exit_code,
                signal,
                timed_out,
                output,
                error: None,
            },
            Some(Termination::Failed { reason }) => ExecutionResult {
                exit_code: None,
                signal: None,
                timed_out: false,
                output,
                error: Some(reason),
            },
            None => ExecutionResult {
                exit_code: None,
                signal: None,
                timed_out: false,
                output,
                error: Some("execution ended without a terminal event".to_string()),
            },
        }
    }
}

impl OutputSink for BufferedSink {
    fn deliver(&mut self, event: OutputEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.termination.is_some() {
                debug!(?event, "event after terminal ignored by buffered sink");
                return;
            }
            render_into(&event, &mut self.output);
            if let OutputEvent::Terminal(termination) = event {
                self.termination = Some(termination);
            }
        })
    }
}
