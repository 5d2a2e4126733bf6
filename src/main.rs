use anyhow::Result;
use crabrelay::config::{self, AppConfig};
use crabrelay::irc::commands::{parse_command, ParsedCommand, HELP};
use crabrelay::irc::{Event, IrcClient};
use crabrelay::logging::ChatLogger;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Everything the main loop reacts to.
#[derive(Debug)]
enum RelayEvent {
    /// A line typed on stdin
    Input(String),
    InputClosed,
    /// An event read from the IRC server
    Irc(Event),
    IrcError(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = config::load_config(config_path.as_deref())?;

    if let Err(e) = run_relay(cfg).await {
        tracing::error!(error = %e, "relay stopped");
        std::process::exit(1);
    }
    Ok(())
}

async fn run_relay(cfg: AppConfig) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RelayEvent>();
    let client = Arc::new(IrcClient::new(cfg.server.clone(), &cfg.connection));
    let mut chat_logger = ChatLogger::new(&cfg.logging);

    client.connect().await?;
    tracing::info!(
        host = %cfg.server.host,
        port = cfg.server.port,
        nick = %cfg.server.nickname,
        "connected, type /help for commands"
    );

    // Spawn stdin reader task
    let input_tx = event_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if input_tx.send(RelayEvent::Input(line)).is_err() {
                return;
            }
        }
        let _ = input_tx.send(RelayEvent::InputClosed);
    });

    // Spawn IRC poller task
    let poll_tx = event_tx.clone();
    let poller = {
        let client = client.clone();
        let poll_interval = cfg.connection.poll_interval();
        let reconnect_delay = cfg.connection.reconnect_delay();
        tokio::spawn(async move {
            loop {
                match client.poll().await {
                    // Drain whatever is buffered before sleeping again.
                    Ok(Some(event)) => {
                        if poll_tx.send(RelayEvent::Irc(event)).is_err() {
                            break;
                        }
                        continue;
                    }
                    Ok(None) => tokio::time::sleep(poll_interval).await,
                    Err(e) => {
                        if poll_tx.send(RelayEvent::IrcError(e.to_string())).is_err() {
                            break;
                        }
                        tokio::time::sleep(reconnect_delay).await;
                    }
                }
            }
        })
    };
    drop(event_tx);

    while let Some(event) = event_rx.recv().await {
        match event {
            RelayEvent::Irc(event) => {
                if !event.is("PING") {
                    println!("{}", event);
                }
                chat_logger.log_event(&event);
            }
            RelayEvent::IrcError(error) => {
                tracing::warn!(%error, "IRC connection lost, reconnecting");
            }
            RelayEvent::Input(line) => {
                let Some(command) = parse_command(&line) else {
                    if line.trim().starts_with('/') {
                        println!("Unknown command. Type /help for a list.");
                    }
                    continue;
                };
                if command == ParsedCommand::Help {
                    println!("{}", HELP);
                    continue;
                }
                match client.execute(command).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => tracing::warn!(error = %e, "command failed"),
                }
            }
            RelayEvent::InputClosed => {
                client.quit(None).await;
                break;
            }
        }
    }

    poller.abort();
    Ok(())
}
