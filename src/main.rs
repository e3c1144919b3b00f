//! `cmd-runner`: запуск shell-команд как инструмента.

mod runner;

use std::num::NonZeroU64;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use runner::{CommandError, CommandExecutor, ExecutionResult};

/// Run shell commands and capture their output.
#[derive(Parser, Debug)]
#[command(name = "cmd-runner", version, long_about = None)]
struct Args {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Execution timeout in seconds
    #[arg(long, global = true, default_value = "60")]
    timeout_secs: NonZeroU64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single command and print its output
    Run {
        /// Command line passed to the system shell
        command: String,

        /// Working directory for the command
        #[arg(long)]
        workdir: Option<String>,

        /// Text written to the command's stdin
        #[arg(long)]
        stdin: Option<String>,
    },
    /// Serve run_command calls as JSON lines on stdin/stdout
    Serve,
    /// Print the run_command tool descriptor
    Describe,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let executor = CommandExecutor::with_timeout(Duration::from_secs(args.timeout_secs.get()));
    match args.command {
        Commands::Run {
            command,
            workdir,
            stdin,
        } => {
            let outcome = executor
                .execute(&command, workdir.as_deref(), stdin.as_deref())
                .or_else(CommandError::into_timeout_result);
            match outcome {
                Ok(result) => {
                    print_result(&result);
                    if result.is_error {
                        ExitCode::FAILURE
                    } else {
                        ExitCode::SUCCESS
                    }
                }
                Err(e) => {
                    eprintln!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Serve => {
            let stdin = std::io::stdin().lock();
            let stdout = std::io::stdout().lock();
            match runner::run_server(&executor, stdin, stdout) {
                0 => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            }
        }
        Commands::Describe => match serde_json::to_string_pretty(&runner::tool_descriptor()) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("failed to render descriptor: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

/// Логи идут в stderr: stdout занят ответами `serve`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Печатает результат: stdout команды в stdout, сообщение и stderr в stderr.
fn print_result(result: &ExecutionResult) {
    if let Some(message) = &result.message {
        eprintln!("{message}");
    }
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
}
