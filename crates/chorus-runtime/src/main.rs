//! Chorus terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a provider on the default local ports
//! chorus --identity alice
//!
//! # Custom provider addresses
//! CHORUS_PUBLISH_ADDR=10.0.0.5:5555 CHORUS_SUBSCRIBE_ADDR=10.0.0.5:5556 chorus -i alice
//! ```

use std::time::Duration;

use chorus_runtime::{
    ChatHandle, ChatRuntime, RuntimeConfig, RuntimeError,
    config::{DEFAULT_PUBLISH_ADDR, DEFAULT_SUBSCRIBE_ADDR},
    console::{self, ConsoleCommand},
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Chorus chat client
#[derive(Parser, Debug)]
#[command(name = "chorus")]
#[command(about = "Terminal client for the Chorus group chat protocol")]
#[command(version)]
struct Args {
    /// Local identity
    #[arg(short, long, env = "CHORUS_IDENTITY")]
    identity: String,

    /// Provider address commands and messages are published to
    #[arg(long, env = "CHORUS_PUBLISH_ADDR", default_value = DEFAULT_PUBLISH_ADDR)]
    publish_addr: String,

    /// Provider address events and messages are received from
    #[arg(long, env = "CHORUS_SUBSCRIBE_ADDR", default_value = DEFAULT_SUBSCRIBE_ADDR)]
    subscribe_addr: String,

    /// Envelopes buffered for the provider before new ones are rejected
    #[arg(long, env = "CHORUS_OUTBOUND_CAPACITY", default_value = "256")]
    outbound_capacity: usize,

    /// Inbound envelopes buffered for the driver
    #[arg(long, env = "CHORUS_INBOUND_CAPACITY", default_value = "1024")]
    inbound_capacity: usize,

    /// Seconds to wait for each channel to connect
    #[arg(long, env = "CHORUS_CONNECT_TIMEOUT", default_value = "5")]
    connect_timeout: u64,

    /// Do not request the group list at startup
    #[arg(long)]
    no_refresh: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CHORUS_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr so they never interleave with chat output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = RuntimeConfig {
        identity: args.identity,
        publish_addr: args.publish_addr,
        subscribe_addr: args.subscribe_addr,
        outbound_capacity: args.outbound_capacity,
        inbound_capacity: args.inbound_capacity,
        connect_timeout: Duration::from_secs(args.connect_timeout),
        refresh_on_start: !args.no_refresh,
    };

    let (runtime, mut notifications) = ChatRuntime::connect(&config).await?;
    let handle = runtime.handle();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print(&mut stdout, &format!("connected as {}, /help for commands", config.identity)).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            },
            notification = notifications.recv() => {
                let Some(notification) = notification else { break };
                if let Some(text) = console::render_notification(&notification) {
                    print(&mut stdout, &text).await?;
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_line(&handle, &mut stdout, &line).await? {
                    break;
                }
            },
        }
    }

    let report = runtime.shutdown().await?;
    while let Ok(notification) = notifications.try_recv() {
        if let Some(text) = console::render_notification(&notification) {
            print(&mut stdout, &text).await?;
        }
    }
    tracing::info!(sent = report.writer.sent, failed = report.writer.failed, "bye");

    Ok(())
}

/// Execute one console line. Returns false when the user asked to quit.
async fn run_line(
    handle: &ChatHandle,
    stdout: &mut Stdout,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let command = match console::parse_line(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(true),
        Err(e) => {
            print(stdout, &format!("!! {e}")).await?;
            return Ok(true);
        },
    };

    match command {
        ConsoleCommand::Intent(intent) => match handle.intent(intent).await {
            Ok(()) => {},
            Err(RuntimeError::Stopped) => return Ok(false),
            Err(e) => print(stdout, &format!("!! {e}")).await?,
        },
        ConsoleCommand::ShowGroups => {
            let view = handle.groups().await?;
            print(stdout, &console::render_view(&view)).await?;
        },
        ConsoleCommand::Help => print(stdout, console::HELP).await?,
        ConsoleCommand::Quit => return Ok(false),
    }

    Ok(true)
}

async fn print(stdout: &mut Stdout, text: &str) -> std::io::Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
