use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated identity attached to a connection by the gateway before
/// any room logic runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub nickname: String,
    pub avatar_id: String,
    pub is_admin: bool,
}

/// Per-room player record, keyed by identity id in the room's player map.
///
/// `score`, `streak`, `has_answered` and `last_answer` are round
/// bookkeeping for the gameplay layer; the room core only zeroes them on
/// membership creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub nickname: String,
    pub avatar_id: String,
    pub score: u32,
    pub streak: u32,
    pub has_answered: bool,
    pub last_answer: Option<String>,
    pub is_connected: bool,
    /// Seat index assigned on join, stable for the membership's duration.
    pub slot: u8,
}

impl Player {
    pub fn new(identity: &Identity, slot: u8) -> Self {
        Self {
            id: identity.id,
            nickname: identity.nickname.clone(),
            avatar_id: identity.avatar_id.clone(),
            score: 0,
            streak: 0,
            has_answered: false,
            last_answer: None,
            is_connected: true,
            slot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(nickname: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            nickname: nickname.into(),
            avatar_id: "default".into(),
            is_admin: false,
        }
    }

    #[test]
    fn test_new_player_starts_zeroed() {
        let id = identity("Alice");
        let p = Player::new(&id, 3);
        assert_eq!(p.id, id.id);
        assert_eq!(p.slot, 3);
        assert_eq!(p.score, 0);
        assert_eq!(p.streak, 0);
        assert!(!p.has_answered);
        assert!(p.last_answer.is_none());
        assert!(p.is_connected);
    }
}
