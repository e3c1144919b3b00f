//! Unit-тесты для запуска внешних команд.

use std::thread;
use std::time::{Duration, Instant};

use super::super::executor::{CommandExecutor, DEFAULT_TIMEOUT, Shell};
use super::super::types::CommandError;

#[test]
fn default_timeout_is_sixty_seconds() {
    assert_eq!(CommandExecutor::new().timeout(), DEFAULT_TIMEOUT);
    assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(60));
}

#[test]
fn host_shell_matches_platform() {
    let shell = Shell::host();
    if cfg!(windows) {
        assert_eq!(shell.program, "cmd.exe");
        assert_eq!(shell.flag, "/C");
    } else {
        assert_eq!(shell, Shell::POSIX);
    }
}

#[test]
fn echo_succeeds_with_trimmed_stdout() {
    let result = CommandExecutor::new()
        .execute("echo Hello World", None, None)
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.stdout, "Hello World");
    assert_eq!(result.stderr, "");
    assert_eq!(result.message, None);
}

#[test]
fn empty_command_is_rejected_before_launch() {
    let err = CommandExecutor::new().execute("   ", None, None).unwrap_err();
    match err {
        CommandError::EmptyCommand(_) => {}
        other => panic!("expected empty command error, got: {other}"),
    }
}

#[test]
fn invalid_workdir_is_a_launch_error() {
    let err = CommandExecutor::new()
        .execute("echo hi", Some("/definitely/not/a/dir-xyz-12345"), None)
        .unwrap_err();
    match err {
        CommandError::Launch { workdir, .. } => {
            assert_eq!(workdir.as_deref(), Some("/definitely/not/a/dir-xyz-12345"));
        }
        other => panic!("expected launch error, got: {other}"),
    }
}

#[cfg(not(windows))]
#[test]
fn non_zero_exit_is_reported_in_result() {
    let result = CommandExecutor::new()
        .execute("ls /nonexistent/directory", None, None)
        .unwrap();
    assert!(result.is_error);
    assert!(result.message.as_deref().unwrap().contains("exit code"));
    assert!(!result.stderr.is_empty());
}

#[cfg(not(windows))]
#[test]
fn exit_code_is_in_message() {
    let result = CommandExecutor::new()
        .execute("echo out; echo err >&2; exit 7", None, None)
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.message.as_deref(),
        Some("Command failed with exit code: 7")
    );
    assert_eq!(result.stdout, "out");
    assert_eq!(result.stderr, "err");
}

#[cfg(not(windows))]
#[test]
fn missing_program_reports_command_not_found() {
    let result = CommandExecutor::new()
        .execute("thiscommanddoesnotexist", None, None)
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.message.as_deref(),
        Some("Command failed with exit code: 127")
    );
    assert!(result.stderr.contains("not found"));
}

#[cfg(not(windows))]
#[test]
fn signal_death_maps_to_128_plus_signal() {
    let result = CommandExecutor::new()
        .execute("kill -KILL $$", None, None)
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.message.as_deref(),
        Some("Command failed with exit code: 137")
    );
}

#[cfg(not(windows))]
#[test]
fn workdir_sets_current_directory() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().canonicalize().unwrap();
    let workdir = dir.path().to_string_lossy().to_string();

    let result = CommandExecutor::new()
        .execute("pwd -P", Some(&workdir), None)
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.stdout, expected.to_string_lossy());
}

#[cfg(not(windows))]
#[test]
fn empty_workdir_inherits_current_directory() {
    let expected = std::env::current_dir().unwrap().canonicalize().unwrap();
    let result = CommandExecutor::new()
        .execute("pwd -P", Some(""), None)
        .unwrap();
    assert_eq!(result.stdout, expected.to_string_lossy());
}

#[cfg(not(windows))]
#[test]
fn stdin_is_piped_to_command() {
    let result = CommandExecutor::new()
        .execute("cat", None, Some("This is test input"))
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.stdout, "This is test input");
}

#[cfg(not(windows))]
#[test]
fn missing_stdin_is_closed_so_cat_terminates() {
    let executor = CommandExecutor::with_timeout(Duration::from_secs(10));
    let started = Instant::now();
    let result = executor.execute("cat", None, None).unwrap();
    assert!(!result.is_error);
    assert_eq!(result.stdout, "");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(not(windows))]
#[test]
fn empty_stdin_is_distinct_from_missing_stdin() {
    let executor = CommandExecutor::new();
    let script = "if read -r line; then echo got:$line; else echo eof:$line; fi";

    let empty = executor.execute(script, None, Some("")).unwrap();
    assert_eq!(empty.stdout, "eof:");

    let text = executor.execute(script, None, Some("abc\n")).unwrap();
    assert_eq!(text.stdout, "got:abc");
}

#[cfg(not(windows))]
#[test]
fn stdin_ignored_by_command_does_not_hang() {
    let executor = CommandExecutor::with_timeout(Duration::from_secs(10));
    let big = "x".repeat(1024 * 1024);
    let result = executor.execute("echo done", None, Some(&big)).unwrap();
    assert!(!result.is_error);
    assert_eq!(result.stdout, "done");
}

#[cfg(not(windows))]
#[test]
fn large_output_on_both_streams_does_not_deadlock() {
    let executor = CommandExecutor::with_timeout(Duration::from_secs(20));
    let script = "i=0; while [ $i -lt 5000 ]; do \
                  echo out-line-$i-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx; \
                  echo err-line-$i-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx >&2; \
                  i=$((i+1)); done";
    let result = executor.execute(script, None, None).unwrap();
    assert!(!result.is_error);
    assert_eq!(result.stdout.lines().count(), 5000);
    assert_eq!(result.stderr.lines().count(), 5000);
    assert!(result.stdout.ends_with("out-line-4999-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"));
}

#[cfg(not(windows))]
#[test]
fn timeout_kills_process_and_keeps_partial_output() {
    let executor = CommandExecutor::with_timeout(Duration::from_secs(1));
    let started = Instant::now();
    let err = executor
        .execute("echo started; sleep 30", None, None)
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        CommandError::Timeout {
            timeout, stdout, ..
        } => {
            assert_eq!(timeout, Duration::from_secs(1));
            assert_eq!(stdout, "started");
        }
        other => panic!("expected timeout, got: {other}"),
    }
}

#[cfg(not(windows))]
#[test]
fn timeout_kills_background_children_too() {
    // Потомок держит stdout открытым: без убийства группы чтение ждало бы его.
    let executor = CommandExecutor::with_timeout(Duration::from_secs(1));
    let started = Instant::now();
    let err = executor
        .execute("sleep 30 & sleep 30; wait", None, None)
        .unwrap_err();
    assert!(matches!(err, CommandError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[cfg(not(windows))]
#[test]
fn background_child_holding_pipes_does_not_discard_output() {
    // Фоновый sleep наследует stdout/stderr и держит их открытыми после выхода шелла.
    let executor = CommandExecutor::with_timeout(Duration::from_secs(10));
    let started = Instant::now();
    let result = executor
        .execute("echo hello; echo oops >&2; sleep 4 &", None, None)
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!result.is_error);
    assert_eq!(result.stdout, "hello");
    assert_eq!(result.stderr, "oops");
}

#[cfg(not(windows))]
#[test]
fn shell_handles_quoting_and_pipelines() {
    let result = CommandExecutor::new()
        .execute("printf 'a b\\nc\\n' | wc -l | tr -d ' '", None, None)
        .unwrap();
    assert_eq!(result.stdout, "2");
}

#[cfg(not(windows))]
#[test]
fn multi_line_output_is_preserved() {
    let result = CommandExecutor::new()
        .execute("printf 'line1\\nline2\\nline3\\n'", None, None)
        .unwrap();
    assert_eq!(result.stdout, "line1\nline2\nline3");
}

#[cfg(not(windows))]
#[test]
fn concurrent_executions_do_not_interfere() {
    let executor = CommandExecutor::new();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let executor = executor.clone();
            thread::spawn(move || {
                let command = format!("sleep 0.2; echo job-{i}; echo err-{i} >&2");
                (i, executor.execute(&command, None, None).unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.join().unwrap();
        assert_eq!(result.stdout, format!("job-{i}"));
        assert_eq!(result.stderr, format!("err-{i}"));
    }
}

#[cfg(windows)]
#[test]
fn echo_runs_through_cmd_on_windows() {
    let result = CommandExecutor::new()
        .execute("echo hi", None, None)
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.stdout.to_lowercase(), "hi");
}

#[cfg(windows)]
#[test]
fn exit_code_is_reported_on_windows() {
    let result = CommandExecutor::new()
        .execute("exit /b 3", None, None)
        .unwrap();
    assert!(result.is_error);
    assert_eq!(
        result.message.as_deref(),
        Some("Command failed with exit code: 3")
    );
}
