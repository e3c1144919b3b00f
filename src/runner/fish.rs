//! Обход для fish: данные stdin передаются через командную строку.
//!
//! fish ненадежно читает скрипт из пайпа, поэтому stdin кодируется в base64
//! и раскодируется уже внутри обертки.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const FISH: &str = "fish";

/// Нужна ли обертка: stdin передан и первое слово команды — `fish`.
pub(crate) fn needs_wrapper(command: &str, stdin: Option<&str>) -> bool {
    stdin.is_some() && command.split_whitespace().next() == Some(FISH)
}

/// Строит команду, которую запустит POSIX-шелл вместо прямой записи в stdin.
pub(crate) fn wrap_command(command: &str, stdin: &str) -> String {
    let payload = STANDARD.encode(stdin.as_bytes());
    format!("{command} -c \"echo {payload} | base64 -d | {FISH}\"")
}
