//! Terminal client for the delivery channel.
//!
//! Connects to the WebSocket listener, prints every shortened URL it
//! receives and acknowledges it so the server stops retrying.
//!
//! # Usage
//!
//! ```bash
//! # Bind to a recipient and acknowledge deliveries
//! cargo run --bin viewer -- --recipient demo
//!
//! # Watch retries arrive by never acknowledging
//! cargo run --bin viewer -- --recipient demo --no-ack
//!
//! # Keep an idle connection alive with application heartbeats
//! cargo run --bin viewer -- --heartbeat-secs 20
//! ```

use ws_shortener::delivery::protocol::{
    ClientFrame, ServerFrame, decode_server_frame, encode_client_frame,
};

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Watches short links delivered over WebSocket.
#[derive(Parser)]
#[command(name = "viewer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// WebSocket endpoint
    #[arg(short, long, default_value = "ws://localhost:3001/ws")]
    url: String,

    /// Recipient to bind this connection to
    #[arg(short, long)]
    recipient: Option<String>,

    /// Do not acknowledge deliveries
    #[arg(long)]
    no_ack: bool,

    /// Send a HEARTBEAT frame every N seconds
    #[arg(long)]
    heartbeat_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let endpoint = match &cli.recipient {
        Some(recipient) => format!("{}?recipient={}", cli.url, recipient),
        None => cli.url.clone(),
    };

    let (ws_stream, _) = connect_async(endpoint.as_str())
        .await
        .with_context(|| format!("Failed to connect to {endpoint}"))?;
    println!("{} {}", "Connected to".green(), endpoint.bright_white());
    if cli.no_ack {
        println!("{}", "Acknowledgments disabled, expect resends".yellow());
    }
    println!();

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if write.send(message).await.is_err() {
                break;
            }
        }
    });

    if let Some(secs) = cli.heartbeat_secs.filter(|s| *s > 0) {
        let heartbeat_tx = out_tx.clone();
        let frame = encode_client_frame(&ClientFrame::Heartbeat)?;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if heartbeat_tx.send(Message::Text(frame.clone().into())).is_err() {
                    break;
                }
            }
        });
    }

    let mut received = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    received += 1;
                    handle_text(text.as_str(), cli.no_ack, &out_tx)?;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    println!("{} {}", "Server closed the connection".red(), reason);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    println!("{} {}", "Connection error:".red(), e);
                    break;
                }
                None => break,
            }
        }
    }

    drop(out_tx);
    writer.abort();

    println!();
    println!("{} {}", "Deliveries received:".bright_blue(), received);
    Ok(())
}

fn handle_text(text: &str, no_ack: bool, out_tx: &mpsc::UnboundedSender<Message>) -> Result<()> {
    let ServerFrame::UrlShortened { message_id, data } = match decode_server_frame(text) {
        Ok(frame) => frame,
        Err(_) => {
            println!("{} {}", "?".dimmed(), text.dimmed());
            return Ok(());
        }
    };

    println!(
        "{} {}  {}",
        "→".bright_green(),
        data.shortened_url.bright_white().bold(),
        message_id.to_string().dimmed()
    );

    if !no_ack {
        let ack = encode_client_frame(&ClientFrame::Acknowledgment { message_id })?;
        out_tx
            .send(Message::Text(ack.into()))
            .context("Connection writer stopped")?;
    }

    Ok(())
}
