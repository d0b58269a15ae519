use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use livesync::{Config, ConnectionStatus, LiveState};

#[derive(Parser)]
#[command(name = "livesync")]
#[command(
    about = "Watch and drive a synchronized channel state from the terminal",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a topic and stream state changes to stdout
    Watch {
        /// WebSocket endpoint, e.g. ws://localhost:4000/socket/websocket
        url: String,

        /// Channel topic to join
        topic: String,

        /// Join parameters as key=value pairs (values parsed as JSON when
        /// possible)
        #[arg(short, long, value_name = "KEY=VALUE")]
        param: Vec<String>,

        /// Event names to receive and print alongside state changes
        #[arg(short, long, value_name = "NAME")]
        receive: Vec<String>,

        /// Read `<event> <json>` lines from stdin and push them as events
        #[arg(short, long)]
        interactive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Watch {
            url,
            topic,
            param,
            receive,
            interactive,
        } => watch(url, topic, param, receive, interactive).await,
    }
}

async fn watch(
    url: String,
    topic: String,
    params: Vec<String>,
    receive: Vec<String>,
    interactive: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Config::builder().url(&url).topic(&topic);
    for pair in &params {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("bad --param {pair:?}, expected key=value"))?;
        let value = serde_json::from_str(raw).unwrap_or(Value::String(raw.to_string()));
        builder = builder.param(key, value);
    }
    let config = builder.build()?;

    let live = LiveState::new(config);
    let mut changes = live.subscribe_changes();
    let mut errors = live.subscribe_errors();
    let mut status = live.status_stream();

    let mut event_streams = Vec::new();
    for name in receive {
        event_streams.push((name.clone(), live.receive_event(&name)));
    }

    println!(
        "{} Joining {} on {}",
        "→".bright_blue(),
        topic.bright_yellow(),
        url.bright_white()
    );
    live.connect();

    if interactive {
        tokio::spawn(live_pusher(live.clone()));
    }

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => {
                    println!(
                        "{} v{} {}",
                        "✓".green(),
                        change.version.to_string().bright_white(),
                        serde_json::to_string_pretty(&change.state)?
                    );
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    eprintln!("{} lagged, missed {missed} change(s)", "⚠".yellow());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            error = errors.recv() => {
                if let Ok(error) = error {
                    eprintln!("{} [{}] {}", "✗".red(), error.kind().bright_red(), error.message());
                }
            },
            result = status.changed() => {
                if result.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                println!("{} {:?}", "↔".bright_blue(), current);
                if current == ConnectionStatus::Errored {
                    break;
                }
            },
            Some((name, payload)) = next_event(&mut event_streams) => {
                println!(
                    "{} {} {}",
                    "⚡".yellow(),
                    name.bright_yellow(),
                    serde_json::to_string(&payload)?
                );
            },
        }
    }

    Ok(())
}

/// Next inbound application event from any configured stream.
async fn next_event(
    streams: &mut [(String, tokio::sync::mpsc::UnboundedReceiver<Value>)],
) -> Option<(String, Value)> {
    if streams.is_empty() {
        return std::future::pending().await;
    }
    let polls = streams
        .iter_mut()
        .map(|(name, stream)| {
            let name = name.clone();
            Box::pin(async move { stream.recv().await.map(|payload| (name, payload)) })
        })
        .collect::<Vec<_>>();
    let (result, _, _) = futures::future::select_all(polls).await;
    result
}

/// Forward `<event> <json>` lines from stdin as pushed events.
async fn live_pusher(live: LiveState) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let (name, raw) = line.split_once(' ').unwrap_or((line.as_str(), "null"));
        match serde_json::from_str::<Value>(raw) {
            Ok(payload) => live.push_event(name, payload),
            Err(err) => eprintln!("{} bad payload for {name}: {err}", "✗".red()),
        }
    }
}
