//! A2A Protocol CLI binary.
//!
//! Agent-to-agent session protocol tooling.
//!
//! # Commands
//!
//! - `validate` - Validate a message envelope against the protocol schema
//! - `simulate` - Drive two in-process sessions through a full lifecycle

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use a2a::bus::{BusEvent, EventBus};
use a2a::protocol::{
    A2AMessage, CapabilitySet, ControlAction, MessageHandler, MessageType, NegotiationRequest,
    Session,
};
use a2a::transport::{LoopbackTransport, Transport};
use a2a::VERSION;
use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "a2a")]
#[command(version = VERSION)]
#[command(about = "A2A Protocol - agent-to-agent session engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a message envelope from JSON
    Validate {
        /// JSON input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Re-print the validated envelope as pretty JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Simulate two agents through a full session lifecycle
    Simulate {
        /// Local agent id
        #[arg(long, default_value = "company-agent")]
        local: String,

        /// Remote agent id
        #[arg(long, default_value = "customer-agent")]
        remote: String,

        /// Number of text messages to exchange
        #[arg(short, long, default_value = "3")]
        messages: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Validate {
            input,
            file,
            pretty,
        } => cmd_validate(input, file, pretty),
        Commands::Simulate {
            local,
            remote,
            messages,
        } => cmd_simulate(&local, &remote, messages).await,
    }
}

fn init_logging(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}

fn cmd_validate(input: Option<String>, file: Option<PathBuf>, pretty: bool) -> anyhow::Result<()> {
    let raw = read_input(input, file)?;
    let value: Value = serde_json::from_str(&raw).context("input is not valid JSON")?;

    match A2AMessage::from_value(value) {
        Ok(message) => {
            println!(
                "valid {} message {} ({} -> {}, conversation {})",
                message.message_type(),
                message.id,
                message.from_agent,
                message.to_agent,
                message.conversation_id,
            );
            if pretty {
                println!("{}", serde_json::to_string_pretty(&message)?);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("invalid message: {e}");
            std::process::exit(1);
        }
    }
}

/// Logs every text message delivered to a session.
struct LoggingHandler {
    agent: String,
}

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, message: &A2AMessage) -> a2a::Result<()> {
        tracing::info!(
            agent = %self.agent,
            from = %message.from_agent,
            "handled {} message {}",
            message.message_type(),
            message.id
        );
        Ok(())
    }
}

async fn cmd_simulate(local: &str, remote: &str, messages: usize) -> anyhow::Result<()> {
    let bus_local = Arc::new(EventBus::new());
    let bus_remote = Arc::new(EventBus::new());

    let session_local = Session::attach(Session::new(
        local,
        CapabilitySet::default(),
        Arc::clone(&bus_local),
    ))
    .await;
    let session_remote = Session::attach(Session::new(
        remote,
        CapabilitySet::default(),
        Arc::clone(&bus_remote),
    ))
    .await;

    session_remote.lock().await.register_message_handler(
        MessageType::Text,
        Arc::new(LoggingHandler {
            agent: remote.to_string(),
        }),
    );

    let transport =
        LoopbackTransport::pair(Arc::clone(&bus_local), Arc::clone(&bus_remote)).await;
    tokio::spawn(async move { transport.run().await });

    // Discovery and transport events drive the local side to `negotiating`.
    bus_local
        .publish(BusEvent::AgentDiscovered {
            agent_id: remote.to_string(),
        })
        .await;
    bus_local
        .publish(BusEvent::ConnectionResult {
            agent_id: remote.to_string(),
            success: true,
        })
        .await;

    // A control/connect over the wire brings the remote side along.
    {
        let mut session = session_local.lock().await;
        let conversation = session.create_conversation(remote)?;
        let connect = A2AMessage::control(local, remote, &conversation, ControlAction::Connect, None);
        session.send_message(connect).await;
    }
    settle().await;

    // Negotiate both directions.
    let response = session_local
        .lock()
        .await
        .negotiate(&NegotiationRequest::new(
            remote,
            CapabilitySet::default().capabilities,
        ))
        .await;
    anyhow::ensure!(response.accepted, "local negotiation rejected");

    let response = session_remote
        .lock()
        .await
        .negotiate(&NegotiationRequest::new(
            local,
            CapabilitySet::default().capabilities,
        ))
        .await;
    anyhow::ensure!(response.accepted, "remote negotiation rejected");

    // Exchange application messages.
    {
        let mut session = session_local.lock().await;
        let conversation = session.create_conversation(remote)?;
        for n in 0..messages {
            let text = format!("feedback update {n}");
            session
                .send_message(A2AMessage::text(local, remote, &conversation, &text))
                .await;
        }
    }
    settle().await;

    session_local
        .lock()
        .await
        .disconnect(Some("simulation complete"))
        .await;
    settle().await;

    for session in [&session_local, &session_remote] {
        let session = session.lock().await;
        let stats = session.stats();
        tracing::info!(
            agent = %session.agent_id(),
            state = %stats.state,
            sent = stats.messages_sent,
            received = stats.messages_received,
            conversations = stats.conversations,
            "session finished"
        );
    }

    Ok(())
}

/// Let the loopback pumps drain.
async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()));
    }

    match input.as_deref() {
        Some("-") | None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
        Some(text) => Ok(text.to_string()),
    }
}
