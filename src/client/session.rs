//! Game Client Session
//!
//! One reactive loop per participant. Snapshots of the shared document,
//! chat items and local commands are processed one at a time; every effect
//! is a store write or a [`ClientEvent`] on the broadcast channel.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::client::chat::{ChatChannel, ChatMessage};
use crate::core::board::Board;
use crate::core::hash::{document_digest, short_digest};
use crate::game::controller::{EndKind, MoveRejection, Phase, SnapshotEffect, TurnController};
use crate::game::events::{notices, outcome_announcement, outcome_summary, status_line, ClientEvent};
use crate::game::presence::PresenceManager;
use crate::game::role::{Role, RoleAssigner};
use crate::store::adapter::{decode_snapshot, GameStateStore, MoveError, WriteMode};
use crate::store::document::DocumentError;
use crate::store::kv::{ChildItem, KeyValueStore, Snapshot, StoreError, Subscription};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the game document.
    pub game_path: String,
    /// Path of the chat collection.
    pub chat_path: String,
    /// Commit mode for moves and role claims.
    pub write_mode: WriteMode,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            game_path: "game".to_string(),
            chat_path: "chat".to_string(),
            write_mode: WriteMode::Guarded,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `GAME_PATH`, `CHAT_PATH`, `GUARDED_WRITES`
    /// and `EVENT_CAPACITY` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("GAME_PATH") {
            config.game_path = path;
        }
        if let Ok(path) = std::env::var("CHAT_PATH") {
            config.chat_path = path;
        }
        if let Ok(value) = std::env::var("GUARDED_WRITES") {
            config.write_mode = parse_write_mode(&value);
        }
        if let Some(capacity) = std::env::var("EVENT_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&c| c > 0)
        {
            config.event_capacity = capacity;
        }
        config
    }
}

/// `GUARDED_WRITES` value to a mode. Anything but an explicit "off" is guarded.
pub fn parse_write_mode(value: &str) -> WriteMode {
    match value.trim().to_ascii_lowercase().as_str() {
        "0" | "false" | "no" | "off" => WriteMode::Optimistic,
        _ => WriteMode::Guarded,
    }
}

/// Local input to a running client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Click on a cell.
    Move {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
    },
    /// Reinitialize the document.
    NewGame,
    /// Send a chat line.
    Chat(String),
    /// Leave the loop.
    Disconnect,
}

/// Client errors. Each one has already been reported as a system message
/// by the time it is returned.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A write was refused or failed.
    #[error("Store write failed during {op}: {source}")]
    StoreWrite {
        /// Operation that issued the write.
        op: &'static str,
        /// Store failure.
        #[source]
        source: StoreError,
    },

    /// A read or subscription failed.
    #[error("Store read failed during {op}: {source}")]
    StoreRead {
        /// Operation that issued the read.
        op: &'static str,
        /// Store failure.
        #[source]
        source: StoreError,
    },

    /// The document could not be decoded.
    #[error("Inconsistent game state: {0}")]
    InconsistentState(#[from] DocumentError),

    /// No document exists.
    #[error("Game state not available")]
    MissingState,

    /// A fresh read showed the move was no longer legal.
    #[error("Move is stale: {0}")]
    StaleMove(&'static str),

    /// Local gate refused the move.
    #[error("Move rejected: {0}")]
    MoveRejected(#[from] MoveRejection),
}

/// One participant's game client.
pub struct GameClient {
    config: ClientConfig,
    game: GameStateStore,
    chat: ChatChannel,
    roles: RoleAssigner,
    presence: PresenceManager,
    controller: TurnController,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl GameClient {
    /// Create a client over one store connection.
    pub fn new(store: Arc<dyn KeyValueStore>, config: ClientConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let game = GameStateStore::new(store.clone(), config.game_path.clone(), config.write_mode);
        let chat = ChatChannel::new(store, config.chat_path.clone());

        Self {
            config,
            game,
            chat,
            roles: RoleAssigner::new(),
            presence: PresenceManager::new(),
            controller: TurnController::new(),
            event_tx,
        }
    }

    /// Subscribe to client events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Chat collection handle.
    pub fn chat(&self) -> &ChatChannel {
        &self.chat
    }

    /// Claimed role, if any.
    pub fn role(&self) -> Option<Role> {
        self.roles.role()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    /// Last board seen.
    pub fn board(&self) -> &Board {
        self.controller.board()
    }

    /// True while a move may be submitted.
    pub fn interaction_enabled(&self) -> bool {
        self.controller.interaction_enabled()
    }

    /// Status banner for the current phase.
    pub fn status(&self) -> String {
        status_line(self.controller.phase(), self.roles.role())
    }

    /// Startup: create the document if absent, then subscribe to it.
    #[instrument(skip(self), fields(path = %self.config.game_path))]
    pub async fn start(&mut self) -> Result<Subscription, ClientError> {
        let exists = self.game.exists().await.map_err(|source| {
            error!("Existence check failed: {}", source);
            self.system(notices::STARTUP_FAILED);
            ClientError::StoreRead { op: "existence check", source }
        })?;

        if !exists {
            info!("No game document found, initializing");
            self.new_game().await?;
        }

        self.game.subscribe().await.map_err(|source| {
            error!("Subscribe failed: {}", source);
            self.system(notices::SUBSCRIBE_FAILED);
            ClientError::StoreRead { op: "subscribe", source }
        })
    }

    /// Reinitialize the document. Any participant may do this.
    pub async fn new_game(&self) -> Result<(), ClientError> {
        match self.game.initialize().await {
            Ok(_) => Ok(()),
            Err(source) => {
                error!("Initialize failed: {}", source);
                self.system(notices::NEW_GAME_FAILED);
                Err(ClientError::StoreWrite { op: "initialize", source })
            }
        }
    }

    /// Process one document notification.
    ///
    /// Returns the controller effect, or `None` if the snapshot could not be
    /// applied (absent or undecodable document).
    pub async fn handle_snapshot(&mut self, update: Option<Snapshot>) -> Option<SnapshotEffect> {
        let Some(snapshot) = update else {
            self.system(notices::WAITING_FOR_INIT);
            return None;
        };

        let (revision, doc) = match decode_snapshot(&snapshot) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Ignoring snapshot at revision {}: {}", snapshot.revision, e);
                self.system(notices::INCONSISTENT_STATE);
                return None;
            }
        };
        debug!(
            "Snapshot {} at revision {}",
            short_digest(&document_digest(revision, &snapshot.fields)),
            revision
        );

        let mut just_claimed = false;
        if self.roles.role().is_none() {
            match self.roles.assign(&self.game, revision, &doc.presence).await {
                Ok(Some(role)) => {
                    just_claimed = true;
                    self.emit(ClientEvent::RoleAssigned(role));
                    self.system(role.greeting());
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Role claim failed: {}", e);
                    self.system(notices::PRESENCE_FAILED);
                }
            }
        }

        if let Some(role) = self.roles.role() {
            if let Err(e) = self.presence.register(&self.game, role).await {
                error!("Disconnect rollback registration failed: {}", e);
                self.system(notices::PRESENCE_FAILED);
            }
            if !just_claimed {
                if let Err(e) = self.presence.reassert(&self.game, role, revision, &doc).await {
                    warn!("Presence reassertion failed: {}", e);
                    self.system(notices::PRESENCE_FAILED);
                }
            }
        }

        let effect = self.controller.on_snapshot(&doc, self.roles.role());
        if effect.changed() {
            self.emit(ClientEvent::PhaseChanged {
                from: effect.previous,
                to: effect.current,
            });
        }

        match effect.ended {
            Some(EndKind::Detected(outcome)) => {
                info!("Game over at revision {}: {:?}", revision, outcome);
                match self.game.end_game().await {
                    Ok(_) => self.system(outcome_announcement(outcome)),
                    Err(e) => {
                        error!("Failed to mark game finished: {}", e);
                        self.system(notices::END_FAILED);
                    }
                }
            }
            Some(EndKind::Observed(outcome)) => self.system(outcome_summary(outcome)),
            None => {}
        }
        if effect.restarted {
            info!("New game observed at revision {}", revision);
        }

        self.emit(ClientEvent::BoardUpdated {
            board: self.controller.board().clone(),
            status: self.status(),
            interaction_enabled: self.controller.interaction_enabled(),
        });
        Some(effect)
    }

    /// Try to place the local symbol at `(row, col)`.
    ///
    /// Refused locally without any store call unless it is this session's
    /// turn and the cell looks empty.
    pub async fn submit_move(&mut self, row: usize, col: usize) -> Result<(), ClientError> {
        let role = self.roles.role();
        self.controller.check_move(role, row, col).map_err(|rejection| {
            debug!("Move ({}, {}) rejected locally: {}", row, col, rejection);
            ClientError::MoveRejected(rejection)
        })?;
        let Some(symbol) = role.and_then(Role::symbol) else {
            return Err(ClientError::MoveRejected(MoveRejection::NotAPlayer));
        };

        match self.game.apply_move(row, col, symbol).await {
            Ok(_) => {
                self.controller.lock_input();
                Ok(())
            }
            Err(MoveError::Read(source)) => {
                self.system(notices::MOVE_READ_FAILED);
                Err(ClientError::StoreRead { op: "move", source })
            }
            Err(MoveError::Write(source)) => {
                self.system(notices::MOVE_FAILED);
                Err(ClientError::StoreWrite { op: "move", source })
            }
            Err(MoveError::Missing) => {
                self.system(notices::MOVE_STATE_UNAVAILABLE);
                Err(ClientError::MissingState)
            }
            Err(MoveError::Inconsistent(e)) => {
                self.system(notices::MOVE_STATE_UNAVAILABLE);
                Err(ClientError::InconsistentState(e))
            }
            Err(MoveError::Stale(reason)) => {
                self.system(notices::MOVE_FAILED);
                Err(ClientError::StaleMove(reason))
            }
        }
    }

    /// Send a chat line under this session's display name.
    pub async fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        let name = self.roles.role().map(Role::display_name).unwrap_or("");
        match self.chat.send(name, text).await {
            Ok(_) => Ok(()),
            Err(source) => {
                error!("Chat send failed: {}", source);
                self.system(notices::CHAT_FAILED);
                Err(ClientError::StoreWrite { op: "chat", source })
            }
        }
    }

    /// Turn a chat item into an event.
    pub fn handle_chat_item(&self, item: &ChildItem) {
        match ChatMessage::from_item(item) {
            Ok(message) => self.emit(ClientEvent::Chat {
                sender: message.sender,
                text: message.text,
            }),
            Err(e) => warn!("Skipping malformed chat item {}: {}", item.key, e),
        }
    }

    /// Run until a [`Command::Disconnect`], the command channel closes, or
    /// the document subscription ends. On exit the connection is dropped so
    /// the store releases this session's seat.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Result<(), ClientError> {
        let mut snapshots = self.start().await?;
        let mut chat_items = self.chat.subscribe().await.map_err(|source| {
            error!("Chat subscribe failed: {}", source);
            self.system(notices::SUBSCRIBE_FAILED);
            ClientError::StoreRead { op: "chat subscribe", source }
        })?;
        let mut chat_open = true;

        loop {
            tokio::select! {
                update = snapshots.next() => {
                    match update {
                        Some(update) => {
                            self.handle_snapshot(update).await;
                        }
                        None => {
                            warn!("Game subscription ended");
                            break;
                        }
                    }
                }
                item = chat_items.next(), if chat_open => {
                    match item {
                        Some(item) => self.handle_chat_item(&item),
                        None => {
                            debug!("Chat subscription ended");
                            chat_open = false;
                        }
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(Command::Move { row, col }) => {
                            if let Err(e) = self.submit_move(row, col).await {
                                debug!("Move not made: {}", e);
                            }
                        }
                        Some(Command::NewGame) => {
                            let _ = self.new_game().await;
                        }
                        Some(Command::Chat(text)) => {
                            let _ = self.send_chat(&text).await;
                        }
                        Some(Command::Disconnect) | None => {
                            info!("Client leaving");
                            break;
                        }
                    }
                }
            }
        }

        snapshots.cancel();
        if let Err(e) = self.game.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        Ok(())
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn system(&self, message: &str) {
        self.emit(ClientEvent::System(message.to_string()));
    }
}
