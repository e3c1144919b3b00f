//! Инструмент `run_command`: описание, аргументы и отрисовка результата.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::executor::CommandExecutor;
use super::types::{CommandError, ExecutionResult};

/// Служебный запрос: описание инструментов вместо вызова.
pub(crate) const DESCRIBE_REQUEST: &str = "describe";

/// Инструменты, которые умеет вызывать сервер.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tool {
    RunCommand,
}

impl Tool {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "run_command" => Some(Tool::RunCommand),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Tool::RunCommand => "run_command",
        }
    }
}

/// Аргументы `run_command` в том виде, в каком они приходят по проводу.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RunCommandArgs {
    #[serde(default)]
    pub(crate) command: Option<String>,
    #[serde(default)]
    pub(crate) workdir: Option<String>,
    #[serde(default)]
    pub(crate) stdin: Option<String>,
}

/// Один вызов инструмента.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ToolCall {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) arguments: Option<Value>,
}

/// Текстовый сегмент ответа.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct TextContent {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) text: String,
}

impl TextContent {
    fn new(text: impl Into<String>) -> Self {
        Self {
            kind: "text",
            text: text.into(),
        }
    }
}

/// Ответ на вызов инструмента.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ToolResponse {
    pub(crate) content: Vec<TextContent>,
    #[serde(rename = "isError")]
    pub(crate) is_error: bool,
}

impl ToolResponse {
    /// Ответ-ошибка из одного сообщения.
    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent::new(message)],
            is_error: true,
        }
    }

    /// Успешный ответ из одного текста.
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent::new(text)],
            is_error: false,
        }
    }

    /// Сегменты по порядку: сообщение, непустой stdout, непустой stderr.
    pub(crate) fn from_result(result: &ExecutionResult) -> Self {
        let mut content = Vec::new();
        if let Some(message) = &result.message {
            content.push(TextContent::new(message.as_str()));
        }
        if !result.stdout.is_empty() {
            content.push(TextContent::new(result.stdout.as_str()));
        }
        if !result.stderr.is_empty() {
            content.push(TextContent::new(result.stderr.as_str()));
        }
        Self {
            content,
            is_error: result.is_error,
        }
    }
}

/// Описание инструмента для клиента.
pub(crate) fn tool_descriptor() -> Value {
    let os = std::env::consts::OS;
    json!({
        "name": Tool::RunCommand.name(),
        "description": format!("Run a command on this {os} machine"),
        "inputSchema": {
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command with args"
                },
                "workdir": {
                    "type": "string",
                    "description": "Optional, current working directory"
                },
                "stdin": {
                    "type": "string",
                    "description": "Optional, text to pipe into the command's STDIN. \
                        For example, pass a python script to python3. \
                        Or, pass text for a new file to the cat command to create it!"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        }
    })
}

/// Выполняет вызов инструмента. Любая ошибка превращается в ответ с `isError`.
///
/// Запрос `describe` возвращает JSON-список описаний инструментов.
pub(crate) fn call_tool(executor: &CommandExecutor, call: ToolCall) -> ToolResponse {
    if call.name == DESCRIBE_REQUEST {
        return ToolResponse::text(Value::Array(vec![tool_descriptor()]).to_string());
    }
    match Tool::from_name(&call.name) {
        Some(Tool::RunCommand) => {
            let arguments = call.arguments.unwrap_or(Value::Null);
            let args = if arguments.is_null() {
                RunCommandArgs::default()
            } else {
                match serde_json::from_value::<RunCommandArgs>(arguments) {
                    Ok(args) => args,
                    Err(e) => return ToolResponse::error(format!("Invalid arguments: {e}")),
                }
            };
            run_command(executor, &args)
        }
        None => ToolResponse::error(format!("Unknown tool: {}", call.name)),
    }
}

/// Обработчик `run_command`.
pub(crate) fn run_command(executor: &CommandExecutor, args: &RunCommandArgs) -> ToolResponse {
    let command = match args.command.as_deref() {
        Some(command) if !command.trim().is_empty() => command,
        other => {
            return ToolResponse::error(format!(
                "Command is required, current value: {}",
                other.unwrap_or("null")
            ));
        }
    };

    match executor
        .execute(command, args.workdir.as_deref(), args.stdin.as_deref())
        .or_else(CommandError::into_timeout_result)
    {
        Ok(result) => ToolResponse::from_result(&result),
        Err(e) => {
            warn!(command, error = %e, "run_command failed");
            ToolResponse::error(e.to_string())
        }
    }
}
