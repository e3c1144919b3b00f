//! Исполнение команд через шелл и цикл обработки вызовов инструмента.

mod drain;
mod executor;
mod fish;
mod tool;
mod types;

#[cfg(test)]
mod tests;

use std::io::{BufRead, Write};

use tracing::{debug, info, warn};

pub(crate) use executor::CommandExecutor;
pub(crate) use tool::tool_descriptor;
pub(crate) use types::{CommandError, ExecutionResult};

use tool::{ToolCall, ToolResponse, call_tool};

/// Обслуживает вызовы инструмента: одна JSON-строка запроса — одна строка ответа.
///
/// Пустые строки пропускаются, битый запрос получает ответ-ошибку и цикл
/// продолжается. Возвращает код выхода: 0 по EOF, 1 при ошибке ввода/вывода.
pub(crate) fn run_server<R: std::io::Read, W: std::io::Write>(
    executor: &CommandExecutor,
    input: R,
    mut output: W,
) -> i32 {
    info!(timeout_secs = executor.timeout().as_secs(), "serving run_command");
    let reader = std::io::BufReader::new(input);
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "failed to read request");
                return 1;
            }
        };

        let Some(response) = handle_line(executor, &line) else {
            continue;
        };
        if let Err(e) = write_response(&mut output, &response) {
            warn!(error = %e, "failed to write response");
            return 1;
        }
    }

    info!("input closed, shutting down");
    0
}

/// Обрабатывает одну строку запроса: trim → parse → call.
///
/// Для пустой строки ответа нет.
fn handle_line(executor: &CommandExecutor, line: &str) -> Option<ToolResponse> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    debug!(request = trimmed, "tool request");

    let response = match serde_json::from_str::<ToolCall>(trimmed) {
        Ok(call) => call_tool(executor, call),
        Err(e) => ToolResponse::error(format!("Invalid request: {e}")),
    };
    Some(response)
}

fn write_response<W: Write>(output: &mut W, response: &ToolResponse) -> std::io::Result<()> {
    serde_json::to_writer(&mut *output, response)?;
    output.write_all(b"\n")?;
    output.flush()
}
