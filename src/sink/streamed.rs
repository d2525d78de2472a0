// src/sink/streamed.rs

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::exec::OutputEvent;

use super::{render_into, OutputSink};

/// How long one delivery may wait on a full channel by default.
pub const DEFAULT_STALL_LIMIT: Duration = Duration::from_secs(5);

/// Forwards rendered output to a channel as soon as it arrives.
///
/// Dropping the sender on the terminal event is what ends the HTTP body; no
/// exit metadata is sent. If the reader goes away the execution carries on
/// and its output is discarded. A reader that stays connected but stops
/// reading is treated the same way once a delivery has waited longer than
/// the stall limit, so the execution behind it can always finish.
#[derive(Debug)]
pub struct StreamedSink {
    tx: Option<mpsc::Sender<Vec<u8>>>,
    stall_limit: Duration,
}

impl StreamedSink {
    pub fn new(tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            tx: Some(tx),
            stall_limit: DEFAULT_STALL_LIMIT,
        }
    }

    pub fn with_stall_limit(mut self, stall_limit: Duration) -> Self {
        self.stall_limit = stall_limit;
        self
    }

    /// Build a sink together with the receiver the transport reads from.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

impl OutputSink for StreamedSink {
    fn deliver(&mut self, event: OutputEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut close = event.is_terminal();

            if let Some(tx) = self.tx.as_ref() {
                let mut bytes = Vec::new();
                render_into(&event, &mut bytes);
                if !bytes.is_empty() {
                    match tokio::time::timeout(self.stall_limit, tx.send(bytes)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => {
                            debug!("stream reader went away; discarding remaining output");
                            close = true;
                        }
                        Err(_) => {
                            warn!(stall_limit = ?self.stall_limit, "stream reader stalled; closing stream");
                            close = true;
                        }
                    }
                }
            }

            if close {
                self.tx = None;
            }
        })
    }
}
