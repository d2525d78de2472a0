// tests/config_errors.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use kyonrun::config::load_and_validate;
use kyonrun::errors::KyonrunError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_loads_and_rebases_paths() {
    let file = config_file(
        r#"
[server]
host = "0.0.0.0"
port = 8080
static_dir = "dist"

[exec]
timeout = "2m"
kill_grace = "250ms"
wait_heartbeat = "1s"

[adhoc]
interpreter = "node"
script_path = "scripts/tmp.js"

[scripts]
interpreter = "bash"
dir = "scripts"

[scripts.entries]
hello = "hello.sh"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let root = file.path().parent().unwrap();

    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.static_dir.as_deref(), Some(root.join("dist").as_path()));
    assert_eq!(cfg.limits.timeout, Duration::from_secs(120));
    assert_eq!(cfg.limits.kill_grace, Duration::from_millis(250));
    assert_eq!(cfg.wait_heartbeat, Duration::from_secs(1));
    assert_eq!(
        cfg.adhoc.unwrap().script_path,
        root.join("scripts/tmp.js")
    );
    assert_eq!(cfg.scripts.dir, root.join("scripts"));
    assert_eq!(cfg.scripts.entries["hello"], "hello.sh");
}

#[test]
fn empty_file_gives_defaults_with_adhoc_disabled() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 4502);
    assert_eq!(cfg.limits.timeout, Duration::from_secs(20));
    assert!(cfg.adhoc.is_none());
    assert!(cfg.scripts.entries.is_empty());
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = config_file("[server\nport = 1");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(KyonrunError::TomlError(_))
    ));
}

#[test]
fn bad_duration_names_the_field() {
    let file = config_file("[exec]\ntimeout = \"soon\"\n");
    match load_and_validate(file.path()) {
        Err(KyonrunError::ConfigError(msg)) => assert!(msg.contains("exec.timeout"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn escaping_script_path_is_rejected() {
    let file = config_file("[scripts.entries]\nevil = \"../outside.sh\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(KyonrunError::ConfigError(_))
    ));
}

#[test]
fn reserved_characters_in_script_id_are_rejected() {
    let file = config_file("[scripts.entries]\n\"@adhoc\" = \"x.sh\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(KyonrunError::ConfigError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Kyonrun.toml"),
        Err(KyonrunError::IoError(_))
    ));
}
