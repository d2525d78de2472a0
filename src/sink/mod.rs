// src/sink/mod.rs

//! Delivery of execution output to a caller.
//!
//! Both sinks render events through [`render_into`], so a streamed caller
//! receives exactly the bytes a buffered caller would get in `output`
//! (modulo trailing newlines, which the buffered result trims).

use std::future::Future;
use std::pin::Pin;

use crate::exec::{OutputEvent, Termination};

pub mod buffered;
pub mod streamed;

pub use buffered::{BufferedSink, ExecutionResult};
pub use streamed::{StreamedSink, DEFAULT_STALL_LIMIT};

/// Notice appended to the output when the timeout fired.
pub const TIMEOUT_NOTICE: &str = "[kyonrun] TIMEOUT";

/// Destination for the events of one execution.
///
/// The coordinator delivers events in order and always finishes with one
/// `OutputEvent::Terminal`; a sink treats that event as end-of-output.
pub trait OutputSink: Send {
    fn deliver(&mut self, event: OutputEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Append the caller-visible text of `event` to `out`.
pub fn render_into(event: &OutputEvent, out: &mut Vec<u8>) {
    match event {
        OutputEvent::Chunk { data, .. } => out.extend_from_slice(data),
        OutputEvent::Waiting { message } => {
            out.extend_from_slice(message.as_bytes());
            out.push(b'\n');
        }
        OutputEvent::Started { .. } => {}
        OutputEvent::Terminal(termination) => match termination {
            Termination::Exited { timed_out: true, .. } => {
                out.extend_from_slice(TIMEOUT_NOTICE.as_bytes());
                out.push(b'\n');
            }
            Termination::Exited { .. } => {}
            Termination::Failed { reason } => {
                out.extend_from_slice(format!("[kyonrun] error: {reason}\n").as_bytes());
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(event: OutputEvent) -> String {
        let mut out = Vec::new();
        render_into(&event, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn renders_each_event_kind() {
        assert_eq!(rendered(OutputEvent::stdout("abc")), "abc");
        assert_eq!(
            rendered(OutputEvent::waiting()),
            "Waiting for another script request...\n"
        );
        assert_eq!(rendered(OutputEvent::Started { pid: Some(1) }), "");
        assert_eq!(
            rendered(OutputEvent::Terminal(Termination::exited(1))),
            ""
        );
        assert_eq!(
            rendered(OutputEvent::Terminal(Termination::Exited {
                exit_code: None,
                signal: Some("SIGTERM".into()),
                timed_out: true,
            })),
            "[kyonrun] TIMEOUT\n"
        );
        assert_eq!(
            rendered(OutputEvent::Terminal(Termination::failed("no such file"))),
            "[kyonrun] error: no such file\n"
        );
    }
}
