//! Role Assignment
//!
//! Decides which seat this session takes from the presence flags of the
//! first snapshot it sees, and claims it in the store.
//!
//! | X connected | O connected | O joined | Role |
//! |---|---|---|---|
//! | true | false | any | X, reserves the second seat |
//! | true | true | false | O |
//! | otherwise | | | Spectator |
//!
//! The document carries a fifth field, `playerOJoined`, next to the two
//! connection flags: O claims and rolls back that field, so the reserved
//! second seat and the taken second seat stay distinguishable.

use tracing::{debug, info};

use crate::core::board::Symbol;
use crate::store::adapter::{GameStateStore, WriteMode};
use crate::store::document::{Presence, FIELD_O_CONNECTED, FIELD_O_JOINED};
use crate::store::kv::{Revision, StoreError};

/// Seat held by a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Plays the given symbol.
    Player(Symbol),
    /// Watches only.
    Spectator,
}

impl Role {
    /// Symbol played, if any.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            Role::Player(symbol) => Some(symbol),
            Role::Spectator => None,
        }
    }

    /// Name shown for this seat (also used as chat sender).
    pub fn display_name(self) -> &'static str {
        match self {
            Role::Player(Symbol::X) => "Player 1",
            Role::Player(Symbol::O) => "Player 2",
            Role::Spectator => "Spectator",
        }
    }

    /// Name shown for the other seat.
    pub fn opponent_display_name(self) -> &'static str {
        match self {
            Role::Player(symbol) => Role::Player(symbol.other()).display_name(),
            Role::Spectator => "Spectator",
        }
    }

    /// Presence flag this seat owns: written on claim, cleared on disconnect.
    pub fn presence_field(self) -> Option<&'static str> {
        match self {
            Role::Player(Symbol::X) => Some(FIELD_O_CONNECTED),
            Role::Player(Symbol::O) => Some(FIELD_O_JOINED),
            Role::Spectator => None,
        }
    }

    /// Current value of the owned presence flag in `presence`.
    pub fn is_present_in(self, presence: &Presence) -> bool {
        match self {
            Role::Player(Symbol::X) => presence.o_connected,
            Role::Player(Symbol::O) => presence.o_joined,
            Role::Spectator => true,
        }
    }

    /// Banner shown when the seat is taken.
    pub fn greeting(self) -> &'static str {
        match self {
            Role::Player(Symbol::X) => "You are Player 1 ('X'). Waiting for Player 2...",
            Role::Player(Symbol::O) => "You are Player 2 ('O'). Game started! Player 1's turn.",
            Role::Spectator => "Spectating or waiting for players...",
        }
    }
}

/// Seat the presence flags offer to a newcomer.
pub fn decide_role(presence: &Presence) -> Role {
    match (presence.x_connected, presence.o_connected, presence.o_joined) {
        (true, false, _) => Role::Player(Symbol::X),
        (true, true, false) => Role::Player(Symbol::O),
        _ => Role::Spectator,
    }
}

/// Holds the session's role once claimed. Never reassigns.
#[derive(Debug, Default)]
pub struct RoleAssigner {
    role: Option<Role>,
}

impl RoleAssigner {
    /// No role yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claimed role, if any.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Run the assignment table against a snapshot.
    ///
    /// Returns `Ok(Some(role))` only on the call that claims the role;
    /// later calls return `Ok(None)` without touching the store. In guarded
    /// mode a lost claim race also returns `Ok(None)` and leaves the role
    /// unset, so the next snapshot tries again.
    pub async fn assign(
        &mut self,
        game: &GameStateStore,
        revision: Revision,
        presence: &Presence,
    ) -> Result<Option<Role>, StoreError> {
        if self.role.is_some() {
            return Ok(None);
        }

        let role = decide_role(presence);
        if let Some(field) = role.presence_field() {
            let guard = match game.mode() {
                WriteMode::Guarded => Some(revision),
                WriteMode::Optimistic => None,
            };
            match game.write_flag(field, true, guard).await {
                Ok(_) => {}
                Err(StoreError::Conflict { expected, actual }) => {
                    debug!(
                        "Claim of {:?} lost race (revision {} -> {}), retrying on next snapshot",
                        role, expected, actual
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }

        info!("Assigned role {:?}", role);
        self.role = Some(role);
        Ok(Some(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::GameDocument;
    use crate::store::memory::{MemoryStore, Operation};
    use std::sync::Arc;

    fn presence(x: bool, o: bool, j: bool) -> Presence {
        Presence { x_connected: x, o_connected: o, o_joined: j }
    }

    async fn current(store: &MemoryStore) -> (Revision, Presence) {
        let snap = store.peek("game").await.unwrap();
        let doc = GameDocument::from_fields(&snap.fields).unwrap();
        (snap.revision, doc.presence)
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(decide_role(&presence(true, false, false)), Role::Player(Symbol::X));
        assert_eq!(decide_role(&presence(true, false, true)), Role::Player(Symbol::X));
        assert_eq!(decide_role(&presence(true, true, false)), Role::Player(Symbol::O));
        assert_eq!(decide_role(&presence(true, true, true)), Role::Spectator);
        assert_eq!(decide_role(&presence(false, false, false)), Role::Spectator);
        assert_eq!(decide_role(&presence(false, true, false)), Role::Spectator);
    }

    #[test]
    fn test_display_names() {
        let x = Role::Player(Symbol::X);
        assert_eq!(x.display_name(), "Player 1");
        assert_eq!(x.opponent_display_name(), "Player 2");
        assert_eq!(Role::Spectator.display_name(), "Spectator");
    }

    #[tokio::test]
    async fn test_first_session_reserves_second_seat() {
        let store = MemoryStore::new();
        let game = GameStateStore::new(Arc::new(store.connect()), "game", WriteMode::Guarded);
        game.initialize().await.unwrap();
        let (rev, p) = current(&store).await;

        let mut assigner = RoleAssigner::new();
        let role = assigner.assign(&game, rev, &p).await.unwrap();

        assert_eq!(role, Some(Role::Player(Symbol::X)));
        assert!(current(&store).await.1.o_connected);
    }

    #[tokio::test]
    async fn test_assignment_is_idempotent() {
        let store = MemoryStore::new();
        let conn = store.connect();
        let game = GameStateStore::new(Arc::new(conn.clone()), "game", WriteMode::Guarded);
        game.initialize().await.unwrap();

        let mut assigner = RoleAssigner::new();
        let (rev, p) = current(&store).await;
        assigner.assign(&game, rev, &p).await.unwrap();
        let writes = conn.stats().await.writes;

        for _ in 0..3 {
            let (rev, p) = current(&store).await;
            assert_eq!(assigner.assign(&game, rev, &p).await.unwrap(), None);
        }
        assert_eq!(assigner.role(), Some(Role::Player(Symbol::X)));
        assert_eq!(conn.stats().await.writes, writes);
    }

    #[tokio::test]
    async fn test_racing_claims_yield_one_x() {
        let store = MemoryStore::new();
        let a = GameStateStore::new(Arc::new(store.connect()), "game", WriteMode::Guarded);
        let b = GameStateStore::new(Arc::new(store.connect()), "game", WriteMode::Guarded);
        a.initialize().await.unwrap();

        // Both sessions saw the same snapshot before either wrote.
        let (rev, p) = current(&store).await;
        let mut first = RoleAssigner::new();
        let mut second = RoleAssigner::new();
        assert_eq!(first.assign(&a, rev, &p).await.unwrap(), Some(Role::Player(Symbol::X)));
        assert_eq!(second.assign(&b, rev, &p).await.unwrap(), None);
        assert_eq!(second.role(), None);

        // Retry on the next snapshot lands on the other seat.
        let (rev, p) = current(&store).await;
        assert_eq!(second.assign(&b, rev, &p).await.unwrap(), Some(Role::Player(Symbol::O)));
    }

    #[tokio::test]
    async fn test_optimistic_claims_both_take_x() {
        let store = MemoryStore::new();
        let a = GameStateStore::new(Arc::new(store.connect()), "game", WriteMode::Optimistic);
        let b = GameStateStore::new(Arc::new(store.connect()), "game", WriteMode::Optimistic);
        a.initialize().await.unwrap();

        let (rev, p) = current(&store).await;
        let mut first = RoleAssigner::new();
        let mut second = RoleAssigner::new();
        first.assign(&a, rev, &p).await.unwrap();
        second.assign(&b, rev, &p).await.unwrap();
        assert_eq!(first.role(), second.role());
    }

    #[tokio::test]
    async fn test_claim_write_failure_leaves_role_unset() {
        let store = MemoryStore::new();
        let game = GameStateStore::new(Arc::new(store.connect()), "game", WriteMode::Guarded);
        game.initialize().await.unwrap();
        store.fail_next(Operation::UpdateIf, 1).await;

        let (rev, p) = current(&store).await;
        let mut assigner = RoleAssigner::new();
        assert!(assigner.assign(&game, rev, &p).await.is_err());
        assert_eq!(assigner.role(), None);
    }

    #[tokio::test]
    async fn test_spectator_writes_nothing() {
        let store = MemoryStore::new();
        let conn = store.connect();
        let game = GameStateStore::new(Arc::new(conn.clone()), "game", WriteMode::Guarded);

        let mut assigner = RoleAssigner::new();
        let role = assigner.assign(&game, 0, &presence(true, true, true)).await.unwrap();
        assert_eq!(role, Some(Role::Spectator));
        assert_eq!(conn.stats().await.writes, 0);
    }
}
