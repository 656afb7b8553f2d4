use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::player::Player;

/// Room lifecycle. Transitions are monotonic within a game:
/// Lobby -> PreRound -> Playing -> PostRound -> GameOver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Lobby,
    PreRound,
    Playing,
    PostRound,
    GameOver,
}

/// Full serialized room state, sent to every subscribed connection after
/// each mutation. The password never appears here, only `is_private`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: Uuid,
    pub code: String,
    pub host_id: Uuid,
    pub state: RoomState,
    pub players: HashMap<Uuid, Player>,
    pub current_round_index: u8,
    pub total_rounds: u8,
    /// Server epoch milliseconds, stamped when the round begins.
    pub round_start_time: Option<i64>,
    /// Seconds.
    pub round_duration: u16,
    pub max_players: u8,
    pub is_private: bool,
}

/// Public directory entry for one live room. Counts and access flags
/// only; no player details, no password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyEntry {
    pub id: Uuid,
    pub code: String,
    pub host_id: Uuid,
    pub player_count: u8,
    pub max_players: u8,
    pub is_private: bool,
}

/// Stable denial codes for join/start/kick operations. The presentation
/// layer maps these to localized text; the Display impls are for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DenyReason {
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("password required")]
    PasswordRequired,
    #[error("invalid password")]
    InvalidPassword,
    #[error("only the host may do that")]
    NotHost,
    #[error("the host cannot be kicked")]
    CannotKickHost,
    #[error("game already in progress")]
    GameInProgress,
    #[error("no such player in this room")]
    NotFound,
}
