use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use kyonrun::exec::{OutputEvent, Termination};
use kyonrun::sink::{render_into, OutputSink};

/// A sink that records every event. Clones share the same log, so a test
/// can watch a sink that was moved into a spawned task.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<OutputEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn waiting_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, OutputEvent::Waiting { .. }))
            .count()
    }

    pub fn terminals(&self) -> Vec<Termination> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::Terminal(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// The rendered text of everything recorded so far.
    pub fn text(&self) -> String {
        let mut out = Vec::new();
        for event in self.events() {
            render_into(&event, &mut out);
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

impl OutputSink for RecordingSink {
    fn deliver(&mut self, event: OutputEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.events.lock().unwrap().push(event);
        })
    }
}
