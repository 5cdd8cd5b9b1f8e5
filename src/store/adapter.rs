//! Game State Store Adapter
//!
//! Issues the game's reads and writes against the shared document.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::board::{Board, Symbol};
use crate::store::document::{
    cell_key, DocumentError, GameDocument, FIELD_CURRENT_PLAYER, FIELD_GAME_ACTIVE,
};
use crate::store::kv::{Fields, KeyValueStore, Revision, Snapshot, StoreError, Subscription};

/// How read-modify-write sequences are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Read, then plain partial update. Concurrent writers may interleave;
    /// the last write wins.
    Optimistic,
    /// Read, then partial update conditional on the revision that was read.
    #[default]
    Guarded,
}

/// Why a move could not be committed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MoveError {
    /// Pre-move read failed.
    #[error("Failed to read game state: {0}")]
    Read(#[source] StoreError),

    /// Move write failed (including a lost revision race).
    #[error("Failed to write move: {0}")]
    Write(#[source] StoreError),

    /// No document exists.
    #[error("Game state not available")]
    Missing,

    /// Document exists but cannot be decoded.
    #[error("Inconsistent game state: {0}")]
    Inconsistent(#[from] DocumentError),

    /// Fresh read shows the move is no longer legal (guarded mode only).
    #[error("Move is stale: {0}")]
    Stale(&'static str),
}

/// Adapter between the game and one document in the store.
#[derive(Clone)]
pub struct GameStateStore {
    store: Arc<dyn KeyValueStore>,
    path: String,
    mode: WriteMode,
}

impl GameStateStore {
    /// Create an adapter for the document at `path`.
    pub fn new(store: Arc<dyn KeyValueStore>, path: impl Into<String>, mode: WriteMode) -> Self {
        Self {
            store,
            path: path.into(),
            mode,
        }
    }

    /// Document path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Commit mode.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Underlying store handle.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// True if the document exists.
    pub async fn exists(&self) -> Result<bool, StoreError> {
        Ok(self.store.get(&self.path).await?.is_some())
    }

    /// Replace the document with a fresh game.
    #[instrument(skip(self), fields(path = %self.path))]
    pub async fn initialize(&self) -> Result<Revision, StoreError> {
        let revision = self.store.set(&self.path, GameDocument::fresh().to_fields()).await?;
        info!("Game document initialized at revision {}", revision);
        Ok(revision)
    }

    /// Place `symbol` at `(row, col)` and pass the turn.
    ///
    /// Reads the document first to learn whose turn it is, then writes the
    /// cell and the flipped turn as one partial update.
    #[instrument(skip(self), fields(path = %self.path, mode = ?self.mode))]
    pub async fn apply_move(&self, row: usize, col: usize, symbol: Symbol) -> Result<Revision, MoveError> {
        let snapshot = self
            .store
            .get(&self.path)
            .await
            .map_err(MoveError::Read)?
            .ok_or(MoveError::Missing)?;
        let doc = GameDocument::from_fields(&snapshot.fields)?;

        let mut updates = Fields::new();
        updates.insert(cell_key(row, col), Value::from(symbol.as_str()));
        updates.insert(
            FIELD_CURRENT_PLAYER.into(),
            Value::from(doc.current_player.other().as_str()),
        );

        let revision = match self.mode {
            WriteMode::Optimistic => self.store.update(&self.path, updates).await,
            WriteMode::Guarded => {
                check_still_legal(&doc, row, col, symbol)?;
                self.store.update_if(&self.path, snapshot.revision, updates).await
            }
        }
        .map_err(|e| {
            warn!("Move ({}, {}) for {} not committed: {}", row, col, symbol, e);
            MoveError::Write(e)
        })?;

        debug!("Move ({}, {}) for {} committed at revision {}", row, col, symbol, revision);
        Ok(revision)
    }

    /// Mark the game as finished. Idempotent.
    pub async fn end_game(&self) -> Result<Revision, StoreError> {
        let mut updates = Fields::new();
        updates.insert(FIELD_GAME_ACTIVE.into(), Value::Bool(false));
        self.store.update(&self.path, updates).await
    }

    /// Set one boolean field, optionally guarded on a revision.
    pub async fn write_flag(
        &self,
        field: &'static str,
        value: bool,
        guard: Option<Revision>,
    ) -> Result<Revision, StoreError> {
        let mut updates = Fields::new();
        updates.insert(field.into(), Value::Bool(value));
        match guard {
            Some(expected) => self.store.update_if(&self.path, expected, updates).await,
            None => self.store.update(&self.path, updates).await,
        }
    }

    /// Register a deferred write clearing `field` if this connection drops.
    pub async fn register_disconnect_clear(&self, field: &'static str) -> Result<(), StoreError> {
        let mut updates = Fields::new();
        updates.insert(field.into(), Value::Bool(false));
        self.store.on_disconnect_update(&self.path, updates).await
    }

    /// Leave the store; registered rollbacks run.
    pub async fn disconnect(&self) -> Result<(), StoreError> {
        self.store.disconnect().await
    }

    /// Subscribe to the document.
    pub async fn subscribe(&self) -> Result<Subscription, StoreError> {
        self.store.subscribe(&self.path).await
    }
}

/// Decode a snapshot, passing the revision through.
pub fn decode_snapshot(snapshot: &Snapshot) -> Result<(Revision, GameDocument), DocumentError> {
    Ok((snapshot.revision, GameDocument::from_fields(&snapshot.fields)?))
}

fn check_still_legal(doc: &GameDocument, row: usize, col: usize, symbol: Symbol) -> Result<(), MoveError> {
    if !doc.game_active {
        return Err(MoveError::Stale("game is over"));
    }
    if doc.current_player != symbol {
        return Err(MoveError::Stale("not your turn"));
    }
    if !Board::in_bounds(row, col) || doc.board.get(row, col).map_or(true, |c| !c.is_empty()) {
        return Err(MoveError::Stale("cell is taken"));
    }
    Ok(())
}
