//! Общие типы для исполнения команд.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Результат исполнения команды.
///
/// `message` заполнен тогда и только тогда, когда `is_error == true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutionResult {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) is_error: bool,
    pub(crate) message: Option<String>,
}

impl ExecutionResult {
    /// Собирает результат по коду возврата и накопленному выводу.
    pub(crate) fn from_exit(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        let is_error = exit_code != 0;
        Self {
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            is_error,
            message: is_error.then(|| format!("Command failed with exit code: {exit_code}")),
        }
    }

    /// Результат для процесса, убитого по таймауту.
    pub(crate) fn timed_out(timeout: Duration, stdout: &str, stderr: &str) -> Self {
        Self {
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            is_error: true,
            message: Some(timeout_message(&timeout)),
        }
    }
}

/// Ошибки исполнения, прерывающие вызов целиком.
///
/// Ненулевой код возврата сюда не относится: это обычный [`ExecutionResult`].
#[derive(Debug, Error)]
pub(crate) enum CommandError {
    /// Пустая строка команды.
    #[error("Command is required, current value: {0:?}")]
    EmptyCommand(String),
    /// Не удалось запустить шелл (нет шелла, неверная рабочая директория).
    #[error("failed to launch {shell}{}: {source}", workdir_suffix(.workdir))]
    Launch {
        shell: String,
        workdir: Option<String>,
        #[source]
        source: io::Error,
    },
    /// Процесс не завершился за отведенное время и был убит.
    #[error("{}", timeout_message(.timeout))]
    Timeout {
        timeout: Duration,
        stdout: String,
        stderr: String,
    },
    /// Ошибка ожидания процесса.
    #[error("failed to wait for command: {0}")]
    Wait(#[source] io::Error),
}

impl CommandError {
    /// Превращает таймаут в результат с захваченным до убийства выводом.
    ///
    /// Остальные ошибки возвращаются как есть.
    pub(crate) fn into_timeout_result(self) -> CommandResult<ExecutionResult> {
        match self {
            CommandError::Timeout {
                timeout,
                stdout,
                stderr,
            } => Ok(ExecutionResult::timed_out(timeout, &stdout, &stderr)),
            other => Err(other),
        }
    }
}

fn workdir_suffix(workdir: &Option<String>) -> String {
    match workdir {
        Some(dir) => format!(" in {dir}"),
        None => String::new(),
    }
}

fn timeout_message(timeout: &Duration) -> String {
    format!("Command timed out after {} seconds", timeout.as_secs())
}

/// Удобный alias для результатов исполнителя.
pub(crate) type CommandResult<T> = Result<T, CommandError>;
