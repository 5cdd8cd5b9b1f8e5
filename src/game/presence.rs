//! Presence and Disconnect Cleanup
//!
//! One deferred "clear my flag" write per session, plus reassertion of the
//! flag when a replaced document no longer shows it.

use tracing::{debug, info};

use crate::game::role::Role;
use crate::store::adapter::GameStateStore;
use crate::store::document::GameDocument;
use crate::store::kv::{Revision, StoreError};

/// Tracks this session's presence registration.
#[derive(Debug, Default)]
pub struct PresenceManager {
    registered: Option<&'static str>,
    reasserted_at: Revision,
}

impl PresenceManager {
    /// Nothing registered yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Field whose rollback is registered, if any.
    pub fn registered_field(&self) -> Option<&'static str> {
        self.registered
    }

    /// Register the disconnect rollback for `role`'s flag.
    ///
    /// No-op for spectators and after a successful registration. Returns
    /// true only when a registration was made by this call.
    pub async fn register(&mut self, game: &GameStateStore, role: Role) -> Result<bool, StoreError> {
        if self.registered.is_some() {
            return Ok(false);
        }
        let Some(field) = role.presence_field() else {
            return Ok(false);
        };

        game.register_disconnect_clear(field).await?;
        info!("Registered disconnect rollback for {}", field);
        self.registered = Some(field);
        Ok(true)
    }

    /// Write the role's flag back to true if an active document lost it.
    ///
    /// Snapshots older than the last reassertion are ignored. Returns true
    /// if a write was issued.
    pub async fn reassert(
        &mut self,
        game: &GameStateStore,
        role: Role,
        revision: Revision,
        doc: &GameDocument,
    ) -> Result<bool, StoreError> {
        let Some(field) = role.presence_field() else {
            return Ok(false);
        };
        if !doc.game_active || role.is_present_in(&doc.presence) || revision < self.reasserted_at {
            return Ok(false);
        }

        debug!("Reasserting presence flag {} after revision {}", field, revision);
        self.reasserted_at = game.write_flag(field, true, None).await?;
        Ok(true)
    }
}
