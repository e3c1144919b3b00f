//! Запуск команд через системный шелл.

use std::io::{self, Write};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use os_pipe::PipeWriter;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::drain::StreamDrain;
use super::fish;
use super::types::{CommandError, CommandResult, ExecutionResult};

/// Таймаут исполнения по умолчанию.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Сколько ждать дочитывания потоков после завершения процесса.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Шелл и флаг "выполнить строку".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shell {
    pub(crate) program: &'static str,
    pub(crate) flag: &'static str,
}

impl Shell {
    /// POSIX-шелл, через который запускается обертка для fish.
    pub(crate) const POSIX: Shell = Shell {
        program: "/bin/sh",
        flag: "-c",
    };

    /// Командный интерпретатор текущей ОС.
    pub(crate) fn host() -> Self {
        if cfg!(windows) {
            Shell {
                program: "cmd.exe",
                flag: "/C",
            }
        } else {
            Self::POSIX
        }
    }
}

/// Что именно запустить: шелл, скрипт и данные для stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation<'a> {
    pub(crate) shell: Shell,
    pub(crate) script: String,
    pub(crate) stdin: Option<&'a str>,
}

impl<'a> Invocation<'a> {
    /// Выбирает способ запуска. Для fish со stdin данные уходят в командную
    /// строку обертки, а stdin процесса закрывается сразу.
    pub(crate) fn plan(command: &str, stdin: Option<&'a str>) -> Self {
        match stdin {
            Some(input) if fish::needs_wrapper(command, stdin) => Invocation {
                shell: Shell::POSIX,
                script: fish::wrap_command(command, input),
                stdin: None,
            },
            _ => Invocation {
                shell: Shell::host(),
                script: command.to_string(),
                stdin,
            },
        }
    }
}

/// Чем закончилось ожидание процесса.
#[derive(Debug)]
enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
}

/// Исполнитель команд с ограничением по времени.
///
/// Не хранит состояния между вызовами, поэтому один экземпляр можно
/// использовать из нескольких потоков одновременно.
#[derive(Debug, Clone)]
pub(crate) struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    /// Создает исполнитель с таймаутом по умолчанию (60 секунд).
    pub(crate) fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub(crate) fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Выполняет `command` и возвращает захваченный вывод и статус.
    ///
    /// Ненулевой код возврата — обычный результат с `is_error = true`.
    /// Ошибкой вызова считаются только пустая команда, сбой запуска и таймаут.
    pub(crate) fn execute(
        &self,
        command: &str,
        workdir: Option<&str>,
        stdin: Option<&str>,
    ) -> CommandResult<ExecutionResult> {
        if command.trim().is_empty() {
            return Err(CommandError::EmptyCommand(command.to_string()));
        }
        debug!(
            command,
            workdir,
            stdin = if stdin.is_some() { "provided" } else { "none" },
            "executing command"
        );

        self.run(&Invocation::plan(command, stdin), workdir)
    }

    /// Запускает готовый план и собирает результат.
    pub(crate) fn run(
        &self,
        invocation: &Invocation<'_>,
        workdir: Option<&str>,
    ) -> CommandResult<ExecutionResult> {
        let shell = invocation.shell;
        let workdir = workdir.filter(|dir| !dir.is_empty());
        let (stdin_reader, stdin_writer) =
            os_pipe::pipe().map_err(|e| launch_error(shell, workdir, e))?;
        let (stdout_reader, stdout_writer) =
            os_pipe::pipe().map_err(|e| launch_error(shell, workdir, e))?;
        let (stderr_reader, stderr_writer) =
            os_pipe::pipe().map_err(|e| launch_error(shell, workdir, e))?;

        let mut cmd = Command::new(shell.program);
        cmd.arg(shell.flag);
        push_script(&mut cmd, &invocation.script);
        cmd.stdin(stdin_reader);
        cmd.stdout(stdout_writer);
        cmd.stderr(stderr_writer);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        isolate_process_group(&mut cmd);

        let spawned = cmd.spawn();
        // Command держит копии дочерних концов пайпов: без drop нет EOF.
        drop(cmd);
        let mut child = spawned.map_err(|e| launch_error(shell, workdir, e))?;
        debug!(pid = child.id(), "command running");

        let stdout = StreamDrain::spawn("stdout", stdout_reader);
        let stderr = StreamDrain::spawn("stderr", stderr_reader);
        feed_stdin(stdin_writer, invocation.stdin);

        let outcome = self.wait(&mut child);

        let deadline = Instant::now() + DRAIN_GRACE;
        let out = stdout.collect(deadline);
        let err = stderr.collect(deadline);

        match outcome? {
            WaitOutcome::Exited(status) => {
                let code = exit_code(status);
                debug!(code, "command exited");
                Ok(ExecutionResult::from_exit(code, &out, &err))
            }
            WaitOutcome::TimedOut => Err(CommandError::Timeout {
                timeout: self.timeout,
                stdout: out.trim().to_string(),
                stderr: err.trim().to_string(),
            }),
        }
    }

    /// Ждет завершения; по таймауту убивает дерево процессов.
    fn wait(&self, child: &mut Child) -> CommandResult<WaitOutcome> {
        match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => Ok(WaitOutcome::Exited(status)),
            Ok(None) => {
                warn!(
                    pid = child.id(),
                    timeout_secs = self.timeout.as_secs(),
                    "command timed out, killing process tree"
                );
                kill_tree(child);
                Ok(WaitOutcome::TimedOut)
            }
            Err(e) => {
                kill_tree(child);
                Err(CommandError::Wait(e))
            }
        }
    }
}

fn launch_error(shell: Shell, workdir: Option<&str>, source: io::Error) -> CommandError {
    CommandError::Launch {
        shell: shell.program.to_string(),
        workdir: workdir.map(str::to_string),
        source,
    }
}

#[cfg(windows)]
fn push_script(cmd: &mut Command, script: &str) {
    // cmd.exe разбирает строку сам; обычное экранирование аргументов его ломает.
    use std::os::windows::process::CommandExt;
    cmd.raw_arg(script);
}

#[cfg(not(windows))]
fn push_script(cmd: &mut Command, script: &str) {
    cmd.arg(script);
}

/// Пишет stdin в отдельном потоке и закрывает его.
///
/// При `None` пишущий конец закрывается сразу, чтобы `cat` и подобные
/// команды получили EOF, а не ждали ввода вечно.
fn feed_stdin(mut writer: PipeWriter, stdin: Option<&str>) {
    let Some(input) = stdin else {
        drop(writer);
        return;
    };
    let bytes = input.as_bytes().to_vec();
    thread::spawn(move || {
        let written = writer.write_all(&bytes).and_then(|()| writer.flush());
        if let Err(e) = written {
            debug!(error = %e, "failed to write stdin (process may have already exited)");
        }
    });
}

/// Код возврата; смерть от сигнала `n` на Unix дает `128 + n`.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Убивает процесс вместе с потомками и дожидается его.
///
/// Уже завершившийся процесс ошибкой не считается.
fn kill_tree(child: &mut Child) {
    kill_process_group(child.id());
    if let Err(e) = child.kill() {
        if e.kind() != io::ErrorKind::InvalidInput {
            warn!(error = %e, "failed to kill command");
        }
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "failed to reap timed-out command");
    }
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg только отправляет сигнал; группа создана при запуске
    // и процесс еще не собран, так что pgid не переиспользован.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, error = %err, "failed to kill process group");
        }
    }
}

#[cfg(windows)]
fn kill_process_group(pid: u32) {
    use std::process::Stdio;
    // taskkill /T снимает и потомков.
    let status = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        debug!(pid, error = %e, "taskkill failed");
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_process_group(_pid: u32) {}
