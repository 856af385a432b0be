//! Reference host for the bridge.
//!
//! `run` drives one session the way a proxy host would: it starts the
//! session from a raw request head, streams the body when asked, answers
//! filter commands with sample target data and prints every command.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use proxy_bridge::config::{self, BridgeConfig};
use proxy_bridge::observability::{init_logging, init_metrics};
use proxy_bridge::{Bridge, Command, SessionId};

const DEFAULT_REQUEST: &str = "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
const SAMPLE_TARGET_HEADERS: &str = "Content-Type: text/plain\r\nX-Orig: 1\r\n";
const SAMPLE_TARGET_BODY: &str = "response from target";

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Reference host for the proxy bridge", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one request through a session and print the commands
    Run {
        /// File holding the request line and headers
        #[arg(short, long)]
        request: Option<PathBuf>,

        /// File holding the request body
        #[arg(short, long)]
        body: Option<PathBuf>,

        /// Body chunk size in bytes
        #[arg(long, default_value_t = 4096)]
        chunk_size: usize,

        /// Install the built-in test handler
        #[arg(short, long)]
        test_handler: bool,
    },
    /// Validate a configuration file
    CheckConfig {
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { path } => {
            let config = config::load_config(&path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            eprintln!("{}: ok", path.display());
            Ok(())
        }
        Commands::Run {
            request,
            body,
            chunk_size,
            test_handler,
        } => {
            let mut config = match &cli.config {
                Some(path) => config::load_config(path)?,
                None => BridgeConfig::default(),
            };
            config.handler.install_test_handler |= test_handler;
            init_logging(&config.observability);

            if config.observability.metrics_enabled {
                init_metrics(config.observability.metrics_address.parse()?)?;
            }

            let raw_head = match request {
                Some(path) => fs::read_to_string(path)?,
                None => DEFAULT_REQUEST.to_string(),
            };
            let body = match body {
                Some(path) => fs::read(path)?,
                None => Vec::new(),
            };

            let bridge = Bridge::new(config)?;
            let result = run_session(&bridge, &raw_head, &body, chunk_size.max(1));
            bridge.shutdown();
            result
        }
    }
}

fn run_session(
    bridge: &Bridge,
    raw_head: &str,
    body: &[u8],
    chunk_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = bridge.create_session()?;
    tracing::info!(session_id = %id, handler = %bridge.handler_name(), "Running request");

    if let Err(e) = bridge.start_session(id, raw_head) {
        bridge.free_session(id)?;
        return Err(e.into());
    }

    while let Some(command) = bridge.poll_session(id, true)? {
        println!("{}", command.summary());
        match &command {
            Command::ReadBody => send_body(bridge, id, body, chunk_size)?,
            Command::FilterHeaders => {
                let out = bridge.transform_headers(id, SAMPLE_TARGET_HEADERS)?;
                println!(
                    "{}",
                    serde_json::json!({ "transform_headers": out.unwrap_or_else(|| SAMPLE_TARGET_HEADERS.to_string()) })
                );
            }
            Command::FilterBody => {
                let out = bridge.transform_body(id, true, SAMPLE_TARGET_BODY.as_bytes())?;
                let out = out
                    .map(|b| String::from_utf8_lossy(&b).into_owned())
                    .unwrap_or_else(|| SAMPLE_TARGET_BODY.to_string());
                println!("{}", serde_json::json!({ "transform_body": out }));
            }
            Command::Done => break,
            _ => {}
        }
    }

    bridge.free_session(id)?;
    Ok(())
}

fn send_body(
    bridge: &Bridge,
    id: SessionId,
    body: &[u8],
    chunk_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if body.is_empty() {
        bridge.send_body_chunk(id, true, &[])?;
        return Ok(());
    }
    let count = body.len().div_ceil(chunk_size);
    for (i, chunk) in body.chunks(chunk_size).enumerate() {
        bridge.send_body_chunk(id, i + 1 == count, chunk)?;
    }
    tracing::debug!(session_id = %id, bytes = body.len(), chunks = count, "Request body sent");
    Ok(())
}
