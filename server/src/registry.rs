use chrono::{DateTime, Utc};
use sketchrelay_shared::{ConnectionId, DisplayName, RoomId};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Result of registering a connection in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub is_creator: bool,
}

/// Per-room session state: the designated creator, the live member
/// connections and the participant roster.
pub struct RoomSession {
    /// Set by the first join and never reassigned, even after the creator
    /// departs. A later joiner must not be promoted in its place.
    creator_id: Option<ConnectionId>,
    members: BTreeSet<ConnectionId>,
    /// Names of non-creator participants. Keyed by name, not connection:
    /// two connections sharing a name collapse into one entry.
    roster: BTreeSet<DisplayName>,
    last_activity: DateTime<Utc>,
}

impl RoomSession {
    fn new() -> Self {
        Self {
            creator_id: None,
            members: BTreeSet::new(),
            roster: BTreeSet::new(),
            last_activity: Utc::now(),
        }
    }

    fn creator_present(&self) -> bool {
        self.creator_id
            .as_ref()
            .is_some_and(|creator| self.members.contains(creator))
    }
}

/// In-memory session bookkeeping for all rooms.
///
/// One instance is constructed at process start and owned by `AppState`;
/// all mutation goes through these operations.
pub struct Registry {
    rooms: HashMap<RoomId, RoomSession>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Register a connection in a room, creating the room on first use.
    ///
    /// The first connection to ever join a room is designated its creator.
    /// Re-joining is idempotent; joining never fails.
    pub fn join(
        &mut self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        display_name: &DisplayName,
    ) -> JoinOutcome {
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(RoomSession::new);
        room.last_activity = Utc::now();
        room.members.insert(connection_id.clone());

        let is_creator = match &room.creator_id {
            None => {
                room.creator_id = Some(connection_id.clone());
                info!(room_id = %room_id, connection_id = %connection_id, "Designated room creator.");
                true
            }
            Some(creator) if creator == connection_id => true,
            Some(_) => {
                room.roster.insert(display_name.clone());
                false
            }
        };

        JoinOutcome { is_creator }
    }

    /// Drop a connection from room bookkeeping. Idempotent; leaving a room
    /// that was never joined is a no-op. The creator designation stays in
    /// place so a later joiner is not promoted.
    pub fn leave(
        &mut self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        display_name: &DisplayName,
    ) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        room.members.remove(connection_id);
        room.roster.remove(display_name);
        room.last_activity = Utc::now();
    }

    /// Number of member connections, excluding the creator while it is
    /// still present. Zero for unknown rooms.
    pub fn occupancy_count(&self, room_id: &RoomId) -> usize {
        let Some(room) = self.rooms.get(room_id) else {
            return 0;
        };
        if room.creator_present() {
            room.members.len() - 1
        } else {
            room.members.len()
        }
    }

    /// The room's designated creator, if it is still connected to the room.
    pub fn creator_of(&self, room_id: &RoomId) -> Option<ConnectionId> {
        self.rooms
            .get(room_id)
            .filter(|room| room.creator_present())
            .and_then(|room| room.creator_id.clone())
    }

    /// Whether the room still has a live creator. Rooms whose creator has
    /// departed stay creator-less.
    pub fn has_creator(&self, room_id: &RoomId) -> bool {
        self.creator_of(room_id).is_some()
    }

    /// Sorted snapshot of the participant roster.
    pub fn roster_of(&self, room_id: &RoomId) -> Vec<DisplayName> {
        self.rooms
            .get(room_id)
            .map(|room| room.roster.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All member connections of a room, the creator included.
    pub fn members_of(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Bump the room's activity timestamp.
    pub fn touch(&mut self, room_id: &RoomId) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.last_activity = Utc::now();
        }
    }

    /// Remove the room if no member connections remain. Returns whether the
    /// room was removed.
    pub fn prune_if_empty(&mut self, room_id: &RoomId) -> bool {
        match self.rooms.get(room_id) {
            Some(room) if room.members.is_empty() => {
                self.rooms.remove(room_id);
                true
            }
            _ => false,
        }
    }

    /// Remove memberless rooms whose last activity is older than `ttl`.
    /// Returns the number of rooms removed.
    pub fn sweep_stale(&mut self, now: DateTime<Utc>, ttl: chrono::Duration) -> usize {
        let initial_count = self.rooms.len();

        self.rooms.retain(|room_id, room| {
            let age = now.signed_duration_since(room.last_activity);
            if room.members.is_empty() && age > ttl {
                info!(
                    "Removing stale room {} (inactive for {}s)",
                    room_id,
                    age.num_seconds()
                );
                false
            } else {
                true
            }
        });

        initial_count - self.rooms.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> RoomId {
        id.parse().unwrap()
    }

    fn conn(id: &str) -> ConnectionId {
        id.parse().unwrap()
    }

    fn name(n: &str) -> DisplayName {
        n.parse().unwrap()
    }

    #[test]
    fn first_joiner_becomes_creator() {
        let mut registry = Registry::new();
        let outcome = registry.join(&room("r1"), &conn("a"), &name("alice"));
        assert!(outcome.is_creator);
        assert_eq!(registry.creator_of(&room("r1")), Some(conn("a")));
    }

    #[test]
    fn later_joiners_never_overwrite_creator() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        let outcome_b = registry.join(&room("r1"), &conn("b"), &name("bob"));
        let outcome_c = registry.join(&room("r1"), &conn("c"), &name("carol"));
        assert!(!outcome_b.is_creator);
        assert!(!outcome_c.is_creator);
        assert_eq!(registry.creator_of(&room("r1")), Some(conn("a")));
    }

    #[test]
    fn creator_rejoin_is_idempotent() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        let outcome = registry.join(&room("r1"), &conn("a"), &name("alice"));
        assert!(outcome.is_creator);
        assert_eq!(registry.occupancy_count(&room("r1")), 0);
        assert!(registry.roster_of(&room("r1")).is_empty());
    }

    #[test]
    fn occupancy_excludes_creator() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        assert_eq!(registry.occupancy_count(&room("r1")), 0);

        registry.join(&room("r1"), &conn("b"), &name("bob"));
        registry.join(&room("r1"), &conn("c"), &name("carol"));
        assert_eq!(registry.occupancy_count(&room("r1")), 2);
    }

    #[test]
    fn occupancy_of_unknown_room_is_zero() {
        let registry = Registry::new();
        assert_eq!(registry.occupancy_count(&room("nope")), 0);
    }

    #[test]
    fn occupancy_counts_everyone_once_creator_departs() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        registry.join(&room("r1"), &conn("b"), &name("bob"));
        registry.join(&room("r1"), &conn("c"), &name("carol"));

        registry.leave(&room("r1"), &conn("a"), &name("alice"));
        assert_eq!(registry.occupancy_count(&room("r1")), 2);
    }

    #[test]
    fn leave_is_idempotent() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        registry.join(&room("r1"), &conn("b"), &name("bob"));

        registry.leave(&room("r1"), &conn("b"), &name("bob"));
        registry.leave(&room("r1"), &conn("b"), &name("bob"));
        registry.leave(&room("r2"), &conn("x"), &name("nobody"));
        assert_eq!(registry.occupancy_count(&room("r1")), 0);
    }

    #[test]
    fn roster_is_a_set_keyed_by_name() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        registry.join(&room("r1"), &conn("b"), &name("bob"));
        registry.join(&room("r1"), &conn("b2"), &name("bob"));
        assert_eq!(registry.roster_of(&room("r1")), vec![name("bob")]);

        registry.leave(&room("r1"), &conn("b2"), &name("bob"));
        assert!(registry.roster_of(&room("r1")).is_empty());
    }

    #[test]
    fn join_then_leave_restores_roster() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        registry.join(&room("r1"), &conn("b"), &name("bob"));
        let before = registry.roster_of(&room("r1"));

        registry.join(&room("r1"), &conn("c"), &name("carol"));
        registry.leave(&room("r1"), &conn("c"), &name("carol"));
        assert_eq!(registry.roster_of(&room("r1")), before);
    }

    #[test]
    fn creator_name_is_not_in_roster() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        registry.join(&room("r1"), &conn("b"), &name("bob"));
        assert_eq!(registry.roster_of(&room("r1")), vec![name("bob")]);
    }

    #[test]
    fn departed_creator_leaves_room_orphaned() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        registry.join(&room("r1"), &conn("b"), &name("bob"));

        registry.leave(&room("r1"), &conn("a"), &name("alice"));
        assert_eq!(registry.creator_of(&room("r1")), None);
        assert!(!registry.has_creator(&room("r1")));

        // The next joiner is not promoted.
        let outcome = registry.join(&room("r1"), &conn("c"), &name("carol"));
        assert!(!outcome.is_creator);
        assert!(!registry.has_creator(&room("r1")));
    }

    #[test]
    fn members_include_creator() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        registry.join(&room("r1"), &conn("b"), &name("bob"));
        let members = registry.members_of(&room("r1"));
        assert!(members.contains(&conn("a")));
        assert!(members.contains(&conn("b")));
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn prune_removes_only_empty_rooms() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        assert!(!registry.prune_if_empty(&room("r1")));

        registry.leave(&room("r1"), &conn("a"), &name("alice"));
        assert!(registry.prune_if_empty(&room("r1")));
        assert!(!registry.contains_room(&room("r1")));
        assert!(!registry.prune_if_empty(&room("r1")));
    }

    #[test]
    fn sweep_removes_stale_memberless_rooms() {
        let mut registry = Registry::new();
        registry.join(&room("idle"), &conn("a"), &name("alice"));
        registry.leave(&room("idle"), &conn("a"), &name("alice"));
        registry.join(&room("busy"), &conn("b"), &name("bob"));

        let later = Utc::now() + chrono::Duration::seconds(3600);
        let removed = registry.sweep_stale(later, chrono::Duration::seconds(600));
        assert_eq!(removed, 1);
        assert!(!registry.contains_room(&room("idle")));
        assert!(registry.contains_room(&room("busy")));
    }

    #[test]
    fn sweep_keeps_recent_empty_rooms() {
        let mut registry = Registry::new();
        registry.join(&room("r1"), &conn("a"), &name("alice"));
        registry.leave(&room("r1"), &conn("a"), &name("alice"));

        let removed = registry.sweep_stale(Utc::now(), chrono::Duration::seconds(600));
        assert_eq!(removed, 0);
        assert!(registry.contains_room(&room("r1")));
    }
}
