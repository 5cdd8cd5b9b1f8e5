//! Key-Value Store Port
//!
//! The capabilities this client needs from the hosted store: point reads,
//! full and partial writes, revision-guarded partial writes, push
//! subscriptions, append-only collections and deferred writes that run
//! when the connection drops.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Flat document body: field name to JSON value, iterated in key order.
pub type Fields = serde_json::Map<String, Value>;

/// Monotonic per-document revision. Zero means "never written".
pub type Revision = u64;

/// A document as seen at one revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Revision that produced this value.
    pub revision: Revision,
    /// Document body.
    pub fields: Fields,
}

/// One item appended to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildItem {
    /// Store-generated key, ordered by insertion.
    pub key: String,
    /// Item body.
    pub value: Value,
}

/// Store errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached or refused the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Guarded write lost a race.
    #[error("Revision conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Revision the caller read.
        expected: Revision,
        /// Revision the store holds.
        actual: Revision,
    },

    /// Value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection already closed.
    #[error("Connection closed")]
    Closed,
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// Continuous document subscription.
///
/// The first item is the value at subscribe time (`None` if the document
/// does not exist), then one item per change. Dropping cancels it.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Option<Snapshot>>,
}

impl Subscription {
    /// Wrap a receiver fed by a store implementation.
    pub fn new(rx: mpsc::UnboundedReceiver<Option<Snapshot>>) -> Self {
        Self { rx }
    }

    /// Next notification. The outer `None` means the subscription ended.
    pub async fn next(&mut self) -> Option<Option<Snapshot>> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Subscription::next`].
    pub fn try_next(&mut self) -> Option<Option<Snapshot>> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving notifications.
    pub fn cancel(mut self) {
        self.rx.close();
    }
}

/// "On each new item" subscription to a collection.
///
/// Items already present are delivered first, in key order.
pub struct ChildSubscription {
    rx: mpsc::UnboundedReceiver<ChildItem>,
}

impl ChildSubscription {
    /// Wrap a receiver fed by a store implementation.
    pub fn new(rx: mpsc::UnboundedReceiver<ChildItem>) -> Self {
        Self { rx }
    }

    /// Next appended item, or `None` once the subscription ended.
    pub async fn next(&mut self) -> Option<ChildItem> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`ChildSubscription::next`].
    pub fn try_next(&mut self) -> Option<ChildItem> {
        self.rx.try_recv().ok()
    }
}

// =============================================================================
// PORT
// =============================================================================

/// Port to the shared store, seen through one client connection.
///
/// Only single-document operations are offered. `update_if` is the one
/// primitive with a concurrency guard.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Point read.
    async fn get(&self, path: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Replace the whole document.
    async fn set(&self, path: &str, fields: Fields) -> Result<Revision, StoreError>;

    /// Merge the named fields into the document, creating it if absent.
    async fn update(&self, path: &str, fields: Fields) -> Result<Revision, StoreError>;

    /// Like [`KeyValueStore::update`] but only if the document is still at
    /// `expected`; otherwise fails with [`StoreError::Conflict`].
    async fn update_if(
        &self,
        path: &str,
        expected: Revision,
        fields: Fields,
    ) -> Result<Revision, StoreError>;

    /// Subscribe to a document.
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Append to a collection, returning the generated key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Subscribe to items appended to a collection.
    async fn subscribe_children(&self, path: &str) -> Result<ChildSubscription, StoreError>;

    /// Register a partial update that the store applies if this connection
    /// drops without closing cleanly.
    async fn on_disconnect_update(&self, path: &str, fields: Fields) -> Result<(), StoreError>;

    /// Drop this connection, as when the user navigates away. The store
    /// applies every deferred write registered through it; later calls fail
    /// with [`StoreError::Closed`].
    async fn disconnect(&self) -> Result<(), StoreError>;
}
