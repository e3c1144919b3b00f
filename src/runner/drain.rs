//! Чтение stdout/stderr дочернего процесса в отдельных потоках.
//!
//! Поток чтения пересылает строки по каналу по мере чтения, буфер целиком
//! принадлежит принимающей стороне, поэтому общего изменяемого состояния нет.

use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

/// Запущенное чтение одного потока вывода.
pub(crate) struct StreamDrain {
    name: &'static str,
    rx: Receiver<String>,
}

impl StreamDrain {
    /// Запускает поток, читающий `reader` построчно до EOF.
    pub(crate) fn spawn<R>(name: &'static str, reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || forward_lines(name, reader, &tx));
        Self { name, rx }
    }

    /// Собирает строки до EOF, но не дольше `deadline`.
    ///
    /// По истечении срока возвращает все, что успело прийти: теряются только
    /// строки, записанные позже. Поток чтения остановится на следующей строке.
    pub(crate) fn collect(self, deadline: Instant) -> String {
        let mut out = String::new();
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(wait) {
                Ok(line) => out.push_str(&line),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        stream = self.name,
                        bytes = out.len(),
                        "drain did not finish within grace period, keeping partial output"
                    );
                    break;
                }
            }
        }
        out
    }
}

/// Читает поток построчно и отправляет каждую строку с `\n` в `tx`.
///
/// Невалидный UTF-8 заменяется. Ошибка чтения или ушедший получатель
/// останавливают только этот поток.
pub(crate) fn forward_lines<R: Read>(name: &str, reader: R, tx: &Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut bytes = 0;
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(n) => {
                bytes += n;
                let mut text = String::from_utf8_lossy(strip_line_ending(&line)).into_owned();
                text.push('\n');
                if tx.send(text).is_err() {
                    debug!(stream = name, "collector gone, stop reading");
                    return;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(stream = name, error = %e, "error reading child output");
                break;
            }
        }
    }
    debug!(stream = name, bytes, "stream drained");
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
