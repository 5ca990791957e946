//! sandpit CLI - Command line interface for the sandbox

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sandpit_core::client::Client;
use sandpit_core::config::default_socket_path;
use sandpit_core::{ExecutionResult, Executor, SandboxConfig, Screener};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sandpit")]
#[command(author, version, about = "Sandbox for untrusted code snippets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute code via the daemon
    Exec {
        /// Code to execute (or - for stdin)
        code: String,

        /// Socket path (defaults to SANDPIT_SOCKET env var or /run/sandpit/sandpit.sock)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Run code directly (without daemon)
    Run {
        /// Code to execute (or - for stdin)
        code: String,

        /// Timeout in seconds
        #[arg(short, long, default_value = "10")]
        timeout: u64,

        /// Interpreter to run the code with
        #[arg(short, long, default_value = "/usr/bin/python3")]
        interpreter: PathBuf,

        /// Directory for scratch files
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        /// Address space limit in MB
        #[arg(short, long, default_value = "256")]
        memory: u64,
    },

    /// Screen code for disallowed imports without running it
    Check {
        /// Code to check (or - for stdin)
        code: String,
    },

    /// Get daemon status
    Status {
        /// Socket path (defaults to SANDPIT_SOCKET env var or /run/sandpit/sandpit.sock)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Ping the daemon
    Ping {
        /// Socket path (defaults to SANDPIT_SOCKET env var or /run/sandpit/sandpit.sock)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sandpit_core=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Exec { code, socket } => {
            let socket = socket.unwrap_or_else(default_socket_path);
            let mut client = connect(&socket).await?;
            let result = client.execute(read_code(code)?).await?;
            print_result(&result)
        }

        Commands::Run {
            code,
            timeout,
            interpreter,
            scratch_dir,
            memory,
        } => {
            let mut builder = SandboxConfig::builder()
                .interpreter(interpreter)
                .timeout_secs(timeout)
                .memory_limit_mb(memory);
            if let Some(dir) = scratch_dir {
                builder = builder.scratch_dir(dir);
            }

            let config = builder.build();
            tracing::debug!(interpreter = ?config.interpreter, timeout = ?config.timeout, "running without daemon");
            let executor = Executor::new(config)?;
            let result = executor.execute(&read_code(code)?).await;
            print_result(&result)
        }

        Commands::Check { code } => {
            let verdict = Screener::default().screen(&read_code(code)?);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(if verdict.is_safe() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Status { socket } => {
            let socket = socket.unwrap_or_else(default_socket_path);
            let status = connect(&socket).await?.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Ping { socket } => {
            let socket = socket.unwrap_or_else(default_socket_path);
            connect(&socket).await?.ping().await?;
            println!("pong");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn connect(socket: &Path) -> Result<Client> {
    Client::connect(socket)
        .await
        .with_context(|| format!("failed to connect to daemon at {}", socket.display()))
}

fn read_code(code: String) -> Result<String> {
    if code != "-" {
        return Ok(code);
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read code from stdin")?;
    Ok(buf)
}

fn print_result(result: &ExecutionResult) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
