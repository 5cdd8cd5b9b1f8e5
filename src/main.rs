//! Four-in-a-Row Demo
//!
//! Runs two clients against an in-process store and plays a scripted game
//! through their command channels.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use four_row::{
    core::hash::{document_digest, short_digest},
    store::document::GameDocument,
    ClientConfig, ClientError, ClientEvent, Command, GameClient, MemoryStore, Symbol, VERSION,
};

/// How long the demo waits for any single event.
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Four-in-a-Row client v{}", VERSION);

    let config = ClientConfig::from_env();
    info!(
        "Game document '{}', chat '{}', {:?} writes",
        config.game_path, config.chat_path, config.write_mode
    );

    demo_match(config).await
}

struct Seat {
    name: &'static str,
    commands: mpsc::Sender<Command>,
    events: broadcast::Receiver<ClientEvent>,
    task: JoinHandle<Result<(), ClientError>>,
}

impl Seat {
    fn spawn(name: &'static str, store: &MemoryStore, config: ClientConfig) -> Self {
        let client = GameClient::new(Arc::new(store.connect()), config);
        let events = client.subscribe_events();
        let (commands, rx) = mpsc::channel(16);
        let task = tokio::spawn(client.run(rx));
        Self { name, commands, events, task }
    }

    /// Wait for an event matching `pred`, logging system and chat lines on the way.
    async fn wait_for<F>(&mut self, mut pred: F) -> anyhow::Result<ClientEvent>
    where
        F: FnMut(&ClientEvent) -> bool,
    {
        let name = self.name;
        let events = &mut self.events;
        let wait = async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        match &event {
                            ClientEvent::System(message) => info!("[{}] {}", name, message),
                            ClientEvent::Chat { sender, text } => info!("[{}] {}: {}", name, sender, text),
                            _ => {}
                        }
                        if pred(&event) {
                            return Ok(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        info!("[{}] skipped {} events", name, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => bail!("{} stopped", name),
                }
            }
        };
        tokio::time::timeout(EVENT_TIMEOUT, wait)
            .await
            .with_context(|| format!("{} timed out", name))?
    }

    /// Wait until this seat may move on a board holding `marks` marks.
    async fn wait_turn(&mut self, marks: usize) -> anyhow::Result<()> {
        self.wait_for(|e| match e {
            ClientEvent::BoardUpdated { board, interaction_enabled: true, .. } => {
                board.count(Symbol::X) + board.count(Symbol::O) == marks
            }
            _ => false,
        })
        .await?;
        Ok(())
    }

    async fn send(&self, command: Command) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .with_context(|| format!("{} is no longer running", self.name))
    }

    async fn leave(self) -> anyhow::Result<()> {
        self.send(Command::Disconnect).await?;
        self.task.await??;
        Ok(())
    }
}

/// Play X down the top row while O answers on the row below.
async fn demo_match(config: ClientConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let store = MemoryStore::new();

    let mut x = Seat::spawn("X", &store, config.clone());
    x.wait_for(|e| matches!(e, ClientEvent::RoleAssigned(_))).await?;
    let mut o = Seat::spawn("O", &store, config.clone());

    for col in 0..3 {
        x.wait_turn(2 * col).await?;
        x.send(Command::Move { row: 0, col }).await?;
        o.wait_turn(2 * col + 1).await?;
        o.send(Command::Move { row: 1, col }).await?;
    }
    x.wait_turn(6).await?;
    x.send(Command::Move { row: 0, col: 3 }).await?;

    let ended = |e: &ClientEvent| {
        matches!(e, ClientEvent::PhaseChanged { to, .. } if to.is_ended())
    };
    x.wait_for(ended).await?;
    o.wait_for(ended).await?;

    o.send(Command::Chat("gg".into())).await?;
    x.wait_for(|e| matches!(e, ClientEvent::Chat { .. })).await?;

    x.leave().await?;
    o.leave().await?;

    let snapshot = store
        .peek(&config.game_path)
        .await
        .context("game document missing after the match")?;
    let doc = GameDocument::from_fields(&snapshot.fields)?;
    info!("Final board (revision {}):\n{}", snapshot.revision, doc.board);
    info!(
        "Digest: {}",
        short_digest(&document_digest(snapshot.revision, &snapshot.fields))
    );

    let stats = store.total_stats().await;
    info!(
        "Store traffic: {} reads, {} writes, {} deferred",
        stats.reads, stats.writes, stats.deferred
    );

    info!("=== Demo Complete ===");
    Ok(())
}
