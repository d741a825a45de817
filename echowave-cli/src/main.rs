mod silence;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use echowave_core::{IceServerConfig, RoomCode, Summary};
use echowave_session::{
    CannedSummarizer, ChannelFactory, ControllerDeps, ConversationController, ConversationEvent,
    ConversationState, MembershipProtocol, SessionConfig, SessionOrchestrator, SignalChannel,
    WebRtcConnector, WsSignalChannel,
};
use silence::SilenceCapture;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "echowave", about = "Voice calls between peers, with a summary at the end")]
struct Cli {
    /// WebSocket URL of the rendezvous server.
    #[arg(long, env = "ECHOWAVE_SIGNALING_URL", default_value = "ws://127.0.0.1:3000/ws")]
    server: String,

    #[arg(long, value_enum, default_value_t = Membership::Events)]
    membership: Membership,

    #[arg(long, env = "TURN_URL")]
    turn_url: Option<String>,

    #[arg(long, env = "TURN_USERNAME")]
    turn_username: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL")]
    turn_credential: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Membership {
    Snapshot,
    Events,
}

impl From<Membership> for MembershipProtocol {
    fn from(membership: Membership) -> Self {
        match membership {
            Membership::Snapshot => MembershipProtocol::Snapshot,
            Membership::Events => MembershipProtocol::Events,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room by code, or get paired with a stranger when no code is given.
    Join { code: Option<String> },
    /// Ask the server for a new room code.
    Create,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig {
            signaling_url: self.server.clone(),
            membership: self.membership.into(),
            ..Default::default()
        };

        if let Some(url) = &self.turn_url {
            config.ice_servers.push(IceServerConfig {
                urls: vec![url.clone()],
                username: self.turn_username.clone(),
                credential: self.turn_credential.clone(),
            });
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.session_config();

    match cli.command {
        Commands::Create => create_room(config).await,
        Commands::Join { code } => join(config, code.map(RoomCode::from)).await,
    }
}

async fn create_room(config: SessionConfig) -> Result<()> {
    let channel = Box::new(WsSignalChannel::new(config.signaling_url.clone()));
    let connector = Arc::new(WebRtcConnector::new(config.transport()));
    let (mut orchestrator, _events) =
        SessionOrchestrator::new(channel, connector, config.membership);

    let code = orchestrator
        .create_room()
        .await
        .context("Failed to create a room")?;

    println!("{} {}", "Room created:".green().bold(), code.to_string().bold());
    println!("   Join with: echowave join {}", code);
    Ok(())
}

async fn join(config: SessionConfig, room: Option<RoomCode>) -> Result<()> {
    let url = config.signaling_url.clone();
    let channels: ChannelFactory =
        Arc::new(move || -> Box<dyn SignalChannel> { Box::new(WsSignalChannel::new(url.clone())) });
    let deps = ControllerDeps {
        channels,
        connector: Arc::new(WebRtcConnector::new(config.transport())),
        capture: Arc::new(SilenceCapture::default()),
        summarizer: Arc::new(CannedSummarizer),
    };

    let random = room.is_none();
    let (mut controller, mut events) = ConversationController::open(config, deps, room).await;
    if random {
        controller.start().await?;
    }
    render_events(&mut events);

    if controller.state() == ConversationState::Idle {
        anyhow::bail!(
            "{}",
            controller.last_error().unwrap_or("could not start the call")
        );
    }

    println!(
        "{}",
        "Type to add to the transcript. An empty line ends the call.".dimmed()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        // Only the waits race; a dispatch always runs to completion.
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(text) if !text.trim().is_empty() => controller.append_transcript(&text),
                _ => end_call(&mut controller).await?,
            },
            input = controller.next_input() => controller.dispatch(input).await,
            _ = tokio::signal::ctrl_c() => end_call(&mut controller).await?,
        }

        render_events(&mut events);

        match controller.state() {
            ConversationState::Finished => break,
            ConversationState::Idle => {
                if let Some(error) = controller.last_error() {
                    anyhow::bail!("{}", error);
                }
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

async fn end_call(controller: &mut ConversationController) -> Result<()> {
    match controller.state() {
        ConversationState::Talking => {
            controller.stop_talking().await?;
        }
        ConversationState::Connecting => controller.cancel().await?,
        _ => {}
    }
    Ok(())
}

fn render_events(events: &mut tokio::sync::mpsc::UnboundedReceiver<ConversationEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ConversationEvent::StateChanged(state) => {
                let label = format!("{state:?}");
                println!("{} {}", "●".cyan(), label.cyan().bold());
            }
            ConversationEvent::PeerAudioReady { peer_id, .. } => {
                println!("   {} {}", "Hearing".green(), peer_id);
            }
            ConversationEvent::PeerCountChanged(count) => {
                println!("   {} in call", count + 1);
            }
            ConversationEvent::Error(message) => {
                eprintln!("{} {}", "Error:".red().bold(), message);
            }
            ConversationEvent::SummaryReady(summary) => print_summary(&summary),
        }
    }
}

fn print_summary(summary: &Summary) {
    println!();
    println!("{}", summary.title.green().bold());
    for point in &summary.key_points {
        println!("  • {}", point);
    }
    if !summary.action_items.is_empty() {
        println!("{}", "Action items".yellow().bold());
        for item in &summary.action_items {
            println!("  - {}", item);
        }
    }
}
