//! In-Memory Store
//!
//! Reference implementation of [`KeyValueStore`]. One [`MemoryStore`] is the
//! shared backend; every client talks to it through its own
//! [`MemoryConnection`], which owns that client's deferred disconnect writes.
//!
//! Also records per-connection operation counts and supports one-shot
//! fault injection so error paths can be exercised.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::kv::{
    ChildItem, ChildSubscription, Fields, KeyValueStore, Revision, Snapshot, StoreError,
    Subscription,
};

/// Unique connection identifier.
pub type ConnectionId = [u8; 16];

/// Store operations, for fault injection and accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// `get`
    Get,
    /// `set`
    Set,
    /// `update`
    Update,
    /// `update_if`
    UpdateIf,
    /// `subscribe`
    Subscribe,
    /// `push`
    Push,
    /// `subscribe_children`
    SubscribeChildren,
    /// `on_disconnect_update`
    OnDisconnect,
}

impl Operation {
    /// True for operations that mutate stored data.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Operation::Set | Operation::Update | Operation::UpdateIf | Operation::Push
        )
    }
}

/// Operation counters for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Point reads issued.
    pub reads: u32,
    /// Data writes issued (set, update, update_if, push), failed ones included.
    pub writes: u32,
    /// Deferred writes registered.
    pub deferred: u32,
}

struct StoredDocument {
    revision: Revision,
    fields: Fields,
}

#[derive(Default)]
struct Collection {
    next_seq: u64,
    items: BTreeMap<String, Value>,
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<String, StoredDocument>,
    collections: BTreeMap<String, Collection>,
    doc_watchers: BTreeMap<String, Vec<mpsc::UnboundedSender<Option<Snapshot>>>>,
    child_watchers: BTreeMap<String, Vec<mpsc::UnboundedSender<ChildItem>>>,
    deferred: BTreeMap<ConnectionId, Vec<(String, Fields)>>,
    stats: BTreeMap<ConnectionId, StoreStats>,
    faults: BTreeMap<Operation, u32>,
    last_revision: Revision,
}

impl Inner {
    fn snapshot(&self, path: &str) -> Option<Snapshot> {
        self.documents.get(path).map(|doc| Snapshot {
            revision: doc.revision,
            fields: doc.fields.clone(),
        })
    }

    fn current_revision(&self, path: &str) -> Revision {
        self.documents.get(path).map(|doc| doc.revision).unwrap_or(0)
    }

    /// Account for an operation and consume a pending fault, if any.
    fn begin(&mut self, conn: &ConnectionId, op: Operation) -> Result<(), StoreError> {
        let stats = self.stats.entry(*conn).or_default();
        match op {
            Operation::Get => stats.reads += 1,
            Operation::OnDisconnect => stats.deferred += 1,
            op if op.is_write() => stats.writes += 1,
            _ => {}
        }

        if let Some(remaining) = self.faults.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!("injected {:?} failure", op)));
            }
        }
        Ok(())
    }

    fn next_revision(&mut self) -> Revision {
        self.last_revision += 1;
        self.last_revision
    }

    fn replace(&mut self, path: &str, fields: Fields) -> Revision {
        let revision = self.next_revision();
        self.documents.insert(path.to_string(), StoredDocument { revision, fields });
        self.notify(path);
        revision
    }

    fn merge(&mut self, path: &str, fields: Fields) -> Revision {
        let revision = self.next_revision();
        let doc = self
            .documents
            .entry(path.to_string())
            .or_insert_with(|| StoredDocument { revision, fields: Fields::new() });
        doc.revision = revision;
        doc.fields.extend(fields);
        self.notify(path);
        revision
    }

    fn notify(&mut self, path: &str) {
        let snapshot = self.snapshot(path);
        if let Some(watchers) = self.doc_watchers.get_mut(path) {
            watchers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn append(&mut self, path: &str, value: Value) -> String {
        let collection = self.collections.entry(path.to_string()).or_default();
        let key = format!("{:016x}", collection.next_seq);
        collection.next_seq += 1;
        collection.items.insert(key.clone(), value.clone());

        let item = ChildItem { key: key.clone(), value };
        if let Some(watchers) = self.child_watchers.get_mut(path) {
            watchers.retain(|tx| tx.send(item.clone()).is_ok());
        }
        key
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// Shared in-memory backend. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new client connection.
    pub fn connect(&self) -> MemoryConnection {
        let id = uuid::Uuid::new_v4().into_bytes();
        debug!("Connection {} opened", hex::encode(&id[..4]));
        MemoryConnection {
            id,
            inner: self.inner.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make the next `count` calls of `op` fail with [`StoreError::Unavailable`].
    pub async fn fail_next(&self, op: Operation, count: u32) {
        let mut inner = self.inner.lock().await;
        *inner.faults.entry(op).or_default() += count;
    }

    /// Current value of a document, without touching any counters.
    pub async fn peek(&self, path: &str) -> Option<Snapshot> {
        self.inner.lock().await.snapshot(path)
    }

    /// Items of a collection in key order, without touching any counters.
    pub async fn peek_children(&self, path: &str) -> Vec<ChildItem> {
        let inner = self.inner.lock().await;
        inner
            .collections
            .get(path)
            .map(|c| {
                c.items
                    .iter()
                    .map(|(key, value)| ChildItem { key: key.clone(), value: value.clone() })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Counters summed over all connections.
    pub async fn total_stats(&self) -> StoreStats {
        let inner = self.inner.lock().await;
        inner.stats.values().fold(StoreStats::default(), |acc, s| StoreStats {
            reads: acc.reads + s.reads,
            writes: acc.writes + s.writes,
            deferred: acc.deferred + s.deferred,
        })
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// One client's view of a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryConnection {
    id: ConnectionId,
    inner: Arc<Mutex<Inner>>,
    closed: Arc<AtomicBool>,
}

impl MemoryConnection {
    /// Connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// True once the connection was closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Counters for this connection.
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.lock().await;
        inner.stats.get(&self.id).copied().unwrap_or_default()
    }

    /// Simulate the connection dropping: the store runs every deferred
    /// write this connection registered.
    pub async fn drop_connection(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.inner.lock().await;
        let pending = inner.deferred.remove(&self.id).unwrap_or_default();
        info!(
            "Connection {} dropped, applying {} deferred writes",
            hex::encode(&self.id[..4]),
            pending.len()
        );
        for (path, fields) in pending {
            inner.merge(&path, fields);
        }
    }

    /// Close cleanly: deferred writes are discarded.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.inner.lock().await;
        inner.deferred.remove(&self.id);
        debug!("Connection {} closed", hex::encode(&self.id[..4]));
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryConnection {
    async fn get(&self, path: &str) -> Result<Option<Snapshot>, StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().await;
        inner.begin(&self.id, Operation::Get)?;
        Ok(inner.snapshot(path))
    }

    async fn set(&self, path: &str, fields: Fields) -> Result<Revision, StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().await;
        inner.begin(&self.id, Operation::Set)?;
        Ok(inner.replace(path, fields))
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<Revision, StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().await;
        inner.begin(&self.id, Operation::Update)?;
        Ok(inner.merge(path, fields))
    }

    async fn update_if(
        &self,
        path: &str,
        expected: Revision,
        fields: Fields,
    ) -> Result<Revision, StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().await;
        inner.begin(&self.id, Operation::UpdateIf)?;
        let actual = inner.current_revision(path);
        if actual != expected {
            return Err(StoreError::Conflict { expected, actual });
        }
        Ok(inner.merge(path, fields))
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().await;
        inner.begin(&self.id, Operation::Subscribe)?;
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, so the initial send cannot fail.
        let _ = tx.send(inner.snapshot(path));
        inner.doc_watchers.entry(path.to_string()).or_default().push(tx);
        Ok(Subscription::new(rx))
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().await;
        inner.begin(&self.id, Operation::Push)?;
        Ok(inner.append(path, value))
    }

    async fn subscribe_children(&self, path: &str) -> Result<ChildSubscription, StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().await;
        inner.begin(&self.id, Operation::SubscribeChildren)?;
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(collection) = inner.collections.get(path) {
            for (key, value) in &collection.items {
                let _ = tx.send(ChildItem { key: key.clone(), value: value.clone() });
            }
        }
        inner.child_watchers.entry(path.to_string()).or_default().push(tx);
        Ok(ChildSubscription::new(rx))
    }

    async fn on_disconnect_update(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().await;
        inner.begin(&self.id, Operation::OnDisconnect)?;
        inner
            .deferred
            .entry(self.id)
            .or_default()
            .push((path.to_string(), fields));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.drop_connection().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let store = MemoryStore::new();
        let conn = store.connect();
        assert_eq!(conn.get("game").await.unwrap(), None);
        assert_eq!(conn.stats().await.reads, 1);
    }

    #[tokio::test]
    async fn test_set_replaces_and_update_merges() {
        let store = MemoryStore::new();
        let conn = store.connect();

        conn.set("game", fields(&[("a", json!(1)), ("b", json!(2))])).await.unwrap();
        conn.update("game", fields(&[("b", json!(3))])).await.unwrap();
        let snap = conn.get("game").await.unwrap().unwrap();
        assert_eq!(snap.fields["a"], json!(1));
        assert_eq!(snap.fields["b"], json!(3));

        conn.set("game", fields(&[("c", json!(4))])).await.unwrap();
        let snap = conn.get("game").await.unwrap().unwrap();
        assert!(!snap.fields.contains_key("a"));
        assert_eq!(snap.fields["c"], json!(4));
    }

    #[tokio::test]
    async fn test_revisions_increase() {
        let store = MemoryStore::new();
        let conn = store.connect();
        let r1 = conn.set("game", Fields::new()).await.unwrap();
        let r2 = conn.update("game", fields(&[("a", json!(1))])).await.unwrap();
        let r3 = conn.set("game", Fields::new()).await.unwrap();
        assert!(r1 < r2 && r2 < r3);
    }

    #[tokio::test]
    async fn test_update_if_conflict() {
        let store = MemoryStore::new();
        let a = store.connect();
        let b = store.connect();

        let rev = a.set("game", fields(&[("turn", json!("X"))])).await.unwrap();
        b.update("game", fields(&[("turn", json!("O"))])).await.unwrap();

        let result = a.update_if("game", rev, fields(&[("turn", json!("O"))])).await;
        assert!(matches!(result, Err(StoreError::Conflict { expected, .. }) if expected == rev));
    }

    #[tokio::test]
    async fn test_update_if_on_missing_document_expects_zero() {
        let store = MemoryStore::new();
        let conn = store.connect();
        conn.update_if("game", 0, fields(&[("a", json!(1))])).await.unwrap();
        assert!(conn.update_if("game", 0, Fields::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_fires_immediately_then_on_change() {
        let store = MemoryStore::new();
        let conn = store.connect();

        let mut sub = conn.subscribe("game").await.unwrap();
        assert_eq!(sub.next().await, Some(None));

        conn.set("game", fields(&[("a", json!(1))])).await.unwrap();
        let snap = sub.next().await.unwrap().unwrap();
        assert_eq!(snap.fields["a"], json!(1));
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn test_children_replay_then_stream() {
        let store = MemoryStore::new();
        let conn = store.connect();
        conn.push("chat", json!({"n": 1})).await.unwrap();

        let mut sub = conn.subscribe_children("chat").await.unwrap();
        conn.push("chat", json!({"n": 2})).await.unwrap();

        assert_eq!(sub.next().await.unwrap().value, json!({"n": 1}));
        assert_eq!(sub.next().await.unwrap().value, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_deferred_write_runs_on_drop_only() {
        let store = MemoryStore::new();
        let a = store.connect();
        let b = store.connect();

        a.set("game", fields(&[("present", json!(true))])).await.unwrap();
        a.on_disconnect_update("game", fields(&[("present", json!(false))])).await.unwrap();
        b.on_disconnect_update("game", fields(&[("other", json!(false))])).await.unwrap();

        b.close().await;
        let snap = store.peek("game").await.unwrap();
        assert!(!snap.fields.contains_key("other"));

        a.drop_connection().await;
        let snap = store.peek("game").await.unwrap();
        assert_eq!(snap.fields["present"], json!(false));
        assert!(matches!(a.get("game").await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_port_disconnect_applies_deferred_writes() {
        let store = MemoryStore::new();
        let conn = store.connect();
        let port: Arc<dyn KeyValueStore> = Arc::new(conn.clone());

        port.set("game", fields(&[("seat", json!(true))])).await.unwrap();
        port.on_disconnect_update("game", fields(&[("seat", json!(false))])).await.unwrap();
        port.disconnect().await.unwrap();

        assert!(conn.is_closed());
        assert_eq!(store.peek("game").await.unwrap().fields["seat"], json!(false));
        assert!(matches!(port.disconnect().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_fault_injection_is_one_shot() {
        let store = MemoryStore::new();
        let conn = store.connect();
        store.fail_next(Operation::Update, 1).await;

        assert!(matches!(
            conn.update("game", Fields::new()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(conn.update("game", Fields::new()).await.is_ok());
        assert_eq!(conn.stats().await.writes, 2);
    }
}
