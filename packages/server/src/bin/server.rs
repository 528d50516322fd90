//! Lobby chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lobbychat-server
//! cargo run --bin lobbychat-server -- --host 0.0.0.0 --port 3030
//! cargo run --bin lobbychat-server -- --log-file ./logs/server.log --stdout-log false
//! ```

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use lobbychat_server::{ChatConfig, Server, ServerConfig, ServerError};
use lobbychat_shared::logger::{LogOutput, setup_logger};

#[derive(Parser, Debug)]
#[command(name = "lobbychat-server")]
#[command(about = "TCP group chat server with named lobbies", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "3030")]
    port: u16,

    /// How long a request waits for the chat to answer (milliseconds)
    #[arg(long, default_value = "2000")]
    status_timeout_ms: u64,

    /// Capacity of each chat intake queue
    #[arg(long, default_value = "64")]
    queue_capacity: usize,

    /// Append logs to this file (e.g. ./logs/server.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Also write logs to stdout
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    stdout_log: bool,
}

impl Args {
    fn log_output(&self) -> LogOutput {
        LogOutput {
            file: self.log_file.clone(),
            stdout: self.stdout_log,
        }
    }

    fn into_config(self) -> ServerConfig {
        ServerConfig::new(self.host, self.port).with_chat(ChatConfig {
            status_timeout: Duration::from_millis(self.status_timeout_ms),
            queue_capacity: self.queue_capacity,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = match setup_logger(env!("CARGO_BIN_NAME"), "info", &args.log_output()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to create a logger: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match serve(args.into_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    Server::bind(&config).await?.run().await
}
