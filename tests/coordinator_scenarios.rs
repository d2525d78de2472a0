// tests/coordinator_scenarios.rs
#![cfg(unix)]

mod common;

use std::error::Error;
use std::time::{Duration, Instant};

use kyonrun::coordinator::ExecutionRequest;
use kyonrun::errors::KyonrunError;
use kyonrun::exec::OutputEvent;
use kyonrun::sink::{BufferedSink, ExecutionResult, StreamedSink};
use kyonrun::types::{OutputMode, ScriptIdentity};
use kyonrun_test_utils::recording::RecordingSink;

use crate::common::{init_tracing, real_coordinator, sh_config, with_timeout, write_script};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn echo_returns_clean_buffered_result() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = tempfile::tempdir()?;
        write_script(dir.path(), "echo.sh", "echo hello\n");
        let cfg = sh_config(dir.path()).with_script("echo", "echo.sh").build();
        let (coordinator, _) = real_coordinator(&cfg);

        let mut sink = BufferedSink::new();
        coordinator
            .execute(ExecutionRequest::registered("echo"), &mut sink)
            .await?;

        assert_eq!(
            sink.into_result(),
            ExecutionResult {
                exit_code: Some(0),
                signal: None,
                timed_out: false,
                output: "hello".to_string(),
                error: None,
            }
        );
        assert!(!coordinator.registry().is_running(&ScriptIdentity::new("echo")));
        Ok::<(), Box<dyn Error>>(())
    })
    .await
}

#[tokio::test]
async fn slow_script_times_out_and_frees_slot() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = tempfile::tempdir()?;
        write_script(dir.path(), "slow.sh", "echo before\nsleep 30\n");
        let cfg = sh_config(dir.path())
            .with_script("slow", "slow.sh")
            .with_timeout("300ms")
            .with_kill_grace("500ms")
            .build();
        let (coordinator, _) = real_coordinator(&cfg);

        let started = Instant::now();
        let mut sink = BufferedSink::new();
        coordinator
            .execute(ExecutionRequest::registered("slow"), &mut sink)
            .await?;
        let elapsed = started.elapsed();

        let result = sink.into_result();
        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.signal.as_deref(), Some("SIGTERM"));
        assert!(result.output.starts_with("before"), "output: {:?}", result.output);
        assert!(result.output.ends_with("[kyonrun] TIMEOUT"));
        assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
        assert!(!coordinator.registry().is_running(&ScriptIdentity::new("slow")));
        Ok::<(), Box<dyn Error>>(())
    })
    .await
}

#[tokio::test]
async fn concurrent_requests_for_one_script_run_in_sequence() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("runs.log");
        write_script(
            dir.path(),
            "echo.sh",
            &format!(
                "echo start >> {log}\nsleep 0.4\necho end >> {log}\necho hello\n",
                log = log.display()
            ),
        );
        let cfg = sh_config(dir.path()).with_script("echo", "echo.sh").build();
        let (coordinator, _) = real_coordinator(&cfg);
        let id = ScriptIdentity::new("echo");

        let first_sink = RecordingSink::new();
        let first = {
            let coordinator = coordinator.clone();
            let mut sink = first_sink.clone();
            tokio::spawn(async move {
                coordinator
                    .execute(ExecutionRequest::registered("echo"), &mut sink)
                    .await
            })
        };
        while !coordinator.registry().is_running(&id) {
            tokio::task::yield_now().await;
        }

        let second_sink = RecordingSink::new();
        let second = {
            let coordinator = coordinator.clone();
            let mut sink = second_sink.clone();
            tokio::spawn(async move {
                coordinator
                    .execute(ExecutionRequest::registered("echo"), &mut sink)
                    .await
            })
        };

        first.await??;
        second.await??;

        assert_eq!(std::fs::read_to_string(&log)?, "start\nend\nstart\nend\n");

        let events = second_sink.events();
        let first_waiting = events
            .iter()
            .position(|e| matches!(e, OutputEvent::Waiting { .. }))
            .expect("second request should have waited");
        let first_chunk = events
            .iter()
            .position(|e| matches!(e, OutputEvent::Chunk { .. }))
            .expect("second request should have produced output");
        assert!(first_waiting < first_chunk);

        assert_eq!(first_sink.waiting_count(), 0);
        assert_eq!(first_sink.terminals().len(), 1);
        assert_eq!(second_sink.terminals().len(), 1);
        assert!(second_sink.text().ends_with("hello\n"));
        Ok::<(), Box<dyn Error>>(())
    })
    .await
}

#[tokio::test]
async fn unknown_script_is_rejected_without_touching_registry() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = sh_config(dir.path()).build();
    let (coordinator, _) = real_coordinator(&cfg);

    let mut sink = RecordingSink::new();
    let err = coordinator
        .execute(ExecutionRequest::registered("missing"), &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, KyonrunError::ScriptNotFound(ref id) if id == "missing"));
    assert!(sink.events().is_empty());
    assert!(coordinator.registry().snapshot().is_empty());
    Ok(())
}

#[tokio::test]
async fn adhoc_source_is_written_then_run() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = tempfile::tempdir()?;
        let cfg = sh_config(dir.path()).build();
        let (coordinator, _) = real_coordinator(&cfg);

        let mut sink = BufferedSink::new();
        coordinator
            .execute(
                ExecutionRequest::adhoc("echo out; echo err 1>&2; exit 3"),
                &mut sink,
            )
            .await?;

        let result = sink.into_result();
        assert_eq!(result.exit_code, Some(3));
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("adhoc/tmp.sh"))?,
            "echo out; echo err 1>&2; exit 3"
        );
        Ok::<(), Box<dyn Error>>(())
    })
    .await
}

#[tokio::test]
async fn registered_scripts_refuse_inline_source() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "echo.sh", "echo hello\n");
    let cfg = sh_config(dir.path()).with_script("echo", "echo.sh").build();
    let (coordinator, _) = real_coordinator(&cfg);

    let request = ExecutionRequest {
        identity: ScriptIdentity::new("echo"),
        source: Some("echo replaced".to_string()),
        mode: OutputMode::Buffered,
    };
    let err = coordinator.prepare(request).unwrap_err();
    assert!(matches!(err, KyonrunError::SourceNotAccepted(_)));
    assert_eq!(std::fs::read_to_string(dir.path().join("echo.sh"))?, "echo hello\n");
    Ok(())
}

#[tokio::test]
async fn streamed_mode_delivers_output_then_closes() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = tempfile::tempdir()?;
        write_script(dir.path(), "count.sh", "echo one\nsleep 0.1\necho two\n");
        let cfg = sh_config(dir.path()).with_script("count", "count.sh").build();
        let (coordinator, _) = real_coordinator(&cfg);

        let (mut sink, mut rx) = StreamedSink::channel(16);
        let prepared = coordinator.prepare(ExecutionRequest::registered("count"))?;
        let run = tokio::spawn(async move { prepared.run(&mut sink).await });

        let mut body = Vec::new();
        while let Some(chunk) = rx.recv().await {
            body.extend_from_slice(&chunk);
        }
        run.await??;

        assert_eq!(String::from_utf8(body)?, "one\ntwo\n");
        Ok::<(), Box<dyn Error>>(())
    })
    .await
}

#[tokio::test]
async fn unread_stream_cannot_hold_slot_past_timeout() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = tempfile::tempdir()?;
        write_script(dir.path(), "chatty.sh", "while true; do echo spam; done\n");
        let cfg = sh_config(dir.path())
            .with_script("chatty", "chatty.sh")
            .with_timeout("300ms")
            .with_kill_grace("300ms")
            .build();
        let (coordinator, _) = real_coordinator(&cfg);
        let id = ScriptIdentity::new("chatty");

        // The reader stays connected but never reads.
        let (sink, _rx) = StreamedSink::channel(4);
        let mut sink = sink.with_stall_limit(Duration::from_millis(300));
        let prepared = coordinator.prepare(ExecutionRequest::registered("chatty"))?;
        let run = tokio::spawn(async move { prepared.run(&mut sink).await.map(|()| sink) });

        let sink = run.await??;
        assert!(sink.is_closed());
        assert!(!coordinator.registry().is_running(&id));

        let mut next = BufferedSink::new();
        coordinator
            .execute(ExecutionRequest::registered("chatty"), &mut next)
            .await?;
        assert!(next.into_result().timed_out);
        Ok::<(), Box<dyn Error>>(())
    })
    .await
}

#[tokio::test]
async fn missing_interpreter_reports_failure_and_releases() -> TestResult {
    init_tracing();
    with_timeout(async {
        let dir = tempfile::tempdir()?;
        write_script(dir.path(), "x.sh", "echo x\n");
        let cfg = sh_config(dir.path())
            .with_scripts_interpreter("kyonrun-no-such-interpreter")
            .with_script("x", "x.sh")
            .build();
        let (coordinator, _) = real_coordinator(&cfg);

        let mut sink = BufferedSink::new();
        coordinator
            .execute(ExecutionRequest::registered("x"), &mut sink)
            .await?;

        let result = sink.into_result();
        assert!(result.error.is_some());
        assert_eq!(result.exit_code, None);
        assert!(!coordinator.registry().is_running(&ScriptIdentity::new("x")));
        Ok::<(), Box<dyn Error>>(())
    })
    .await
}
