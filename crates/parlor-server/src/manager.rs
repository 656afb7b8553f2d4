use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use parlor_common::player::Identity;
use parlor_common::room::LobbyEntry;

use crate::code;
use crate::room::Room;

pub const PASSWORD_MAX_LEN: usize = 12;

/// Directory of all live rooms, reachable by id and by public code. Both
/// indices live behind one lock on the process-root server state; no
/// component mutates them except through these methods.
pub struct GameManager {
    rooms: HashMap<Uuid, Room>,
    codes: HashMap<String, Uuid>,
}

impl GameManager {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            codes: HashMap::new(),
        }
    }

    /// Create a room with the caller as host and first occupant. The
    /// capacity is clamped by the room itself; the password is truncated
    /// and an empty one treated as absent.
    pub fn create_room(
        &mut self,
        host: &Identity,
        max_players: u8,
        password: Option<String>,
    ) -> Uuid {
        let password = password
            .filter(|p| !p.is_empty())
            .map(|p| p.chars().take(PASSWORD_MAX_LEN).collect());

        let mut rng = StdRng::from_entropy();
        let code = loop {
            let candidate = code::generate(&mut rng);
            if !self.codes.contains_key(&candidate) {
                break candidate;
            }
        };

        let mut room = Room::new(host.id, code.clone(), max_players, password);
        room.add_player(host);
        let room_id = room.id;
        tracing::info!(%room_id, %code, host = %host.nickname, "room created");

        self.codes.insert(code, room_id);
        self.rooms.insert(room_id, room);
        room_id
    }

    /// Case-insensitive code lookup.
    pub fn room_by_code(&self, code: &str) -> Option<Uuid> {
        self.codes.get(&code.to_ascii_uppercase()).copied()
    }

    pub fn get_room(&self, room_id: &Uuid) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_room_mut(&mut self, room_id: &Uuid) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Delete a room, freeing its code for reuse and aborting any
    /// pending round timer so it cannot fire on a destroyed room.
    pub fn remove_room(&mut self, room_id: &Uuid) {
        if let Some(room) = self.rooms.remove(room_id) {
            self.codes.remove(&room.code);
            if let Some(timer) = room.round_timer {
                timer.abort();
            }
            tracing::info!(%room_id, code = %room.code, "room removed");
        }
    }

    /// Public metadata for every live room. Counts and access flags
    /// only; passwords and player details never appear here.
    pub fn lobby_listing(&self) -> Vec<LobbyEntry> {
        self.rooms.values().map(|r| r.listing_entry()).collect()
    }

    /// Find which room a player currently belongs to.
    pub fn find_player_room(&self, player_id: Uuid) -> Option<Uuid> {
        self.rooms
            .iter()
            .find(|(_, room)| room.players.contains_key(&player_id))
            .map(|(id, _)| *id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for GameManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn identity(nickname: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            nickname: nickname.into(),
            avatar_id: "default".into(),
            is_admin: false,
        }
    }

    #[test]
    fn test_create_registers_both_indices() {
        let mut mgr = GameManager::new();
        let host = identity("Alice");
        let room_id = mgr.create_room(&host, 4, None);

        let code = mgr.get_room(&room_id).unwrap().code.clone();
        assert_eq!(mgr.room_by_code(&code), Some(room_id));
        assert_eq!(mgr.get_room(&room_id).unwrap().host_id, host.id);
        assert_eq!(mgr.get_room(&room_id).unwrap().players.len(), 1);
    }

    #[test]
    fn test_code_lookup_is_case_insensitive() {
        let mut mgr = GameManager::new();
        let room_id = mgr.create_room(&identity("Alice"), 4, None);
        let code = mgr.get_room(&room_id).unwrap().code.to_lowercase();
        assert_eq!(mgr.room_by_code(&code), Some(room_id));
    }

    #[test]
    fn test_unknown_code_resolves_to_none() {
        let mgr = GameManager::new();
        assert_eq!(mgr.room_by_code("ZZZZ"), None);
    }

    #[test]
    fn test_many_rooms_get_distinct_codes() {
        let mut mgr = GameManager::new();
        let mut codes = HashSet::new();
        for i in 0..10_000 {
            let room_id = mgr.create_room(&identity(&format!("p{}", i)), 4, None);
            codes.insert(mgr.get_room(&room_id).unwrap().code.clone());
        }
        assert_eq!(codes.len(), 10_000);
        assert_eq!(mgr.room_count(), 10_000);
    }

    #[test]
    fn test_removed_room_frees_its_code() {
        let mut mgr = GameManager::new();
        let room_id = mgr.create_room(&identity("Alice"), 4, None);
        let code = mgr.get_room(&room_id).unwrap().code.clone();

        mgr.remove_room(&room_id);
        assert_eq!(mgr.room_by_code(&code), None);
        assert!(mgr.get_room(&room_id).is_none());
    }

    #[test]
    fn test_password_is_truncated() {
        let mut mgr = GameManager::new();
        let room_id = mgr.create_room(
            &identity("Alice"),
            4,
            Some("abcdefghijklmnopqrstuvwxyz".into()),
        );
        let room = mgr.get_room(&room_id).unwrap();
        assert!(room.can_join(Some("abcdefghijkl")).is_ok());
        assert!(matches!(
            room.can_join(Some("abcdefghijklmnopqrstuvwxyz")),
            Err(_)
        ));
    }

    #[test]
    fn test_empty_password_means_public() {
        let mut mgr = GameManager::new();
        let room_id = mgr.create_room(&identity("Alice"), 4, Some("".into()));
        assert!(!mgr.get_room(&room_id).unwrap().is_private());
    }

    #[test]
    fn test_lobby_listing_accuracy() {
        let mut mgr = GameManager::new();
        let alice = identity("Alice");
        let bob = identity("Bob");
        let public_id = mgr.create_room(&alice, 4, None);
        let private_id = mgr.create_room(&bob, 2, Some("pw".into()));

        let carol = identity("Carol");
        mgr.get_room_mut(&public_id).unwrap().add_player(&carol);

        let listing = mgr.lobby_listing();
        assert_eq!(listing.len(), 2);

        let public = listing.iter().find(|e| e.id == public_id).unwrap();
        assert_eq!(public.player_count, 2);
        assert_eq!(public.max_players, 4);
        assert!(!public.is_private);
        assert_eq!(public.host_id, alice.id);

        let private = listing.iter().find(|e| e.id == private_id).unwrap();
        assert_eq!(private.player_count, 1);
        assert_eq!(private.max_players, 2);
        assert!(private.is_private);

        let json = serde_json::to_string(&listing).unwrap();
        assert!(!json.contains("pw\""));
        assert!(!json.contains("Carol"));
    }

    #[test]
    fn test_find_player_room() {
        let mut mgr = GameManager::new();
        let alice = identity("Alice");
        let room_id = mgr.create_room(&alice, 4, None);
        assert_eq!(mgr.find_player_room(alice.id), Some(room_id));
        assert_eq!(mgr.find_player_room(Uuid::new_v4()), None);
    }
}
