use std::collections::HashMap;

use chrono::Utc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use parlor_common::player::{Identity, Player};
use parlor_common::room::{DenyReason, LobbyEntry, RoomSnapshot, RoomState};

use crate::slots::SlotAllocator;

pub const MIN_PLAYERS: u8 = 2;
pub const MAX_PLAYERS: u8 = 6;
pub const DEFAULT_TOTAL_ROUNDS: u8 = 5;
pub const DEFAULT_ROUND_DURATION_SECS: u16 = 30;
/// Delay between the host starting the game and the first round going live.
pub const PRE_ROUND_DELAY_MS: u64 = 3000;

/// One game session: roster, access control, round bookkeeping and the
/// lifecycle state machine. Broadcasting the snapshot after a mutation is
/// the handler's job; the room has no connection-level authority.
pub struct Room {
    pub id: Uuid,
    pub code: String,
    pub host_id: Uuid,
    pub state: RoomState,
    pub players: HashMap<Uuid, Player>,
    pub max_players: u8,
    password: Option<String>,
    slots: SlotAllocator,

    pub current_round_index: u8,
    pub total_rounds: u8,
    pub round_start_time: Option<i64>,
    pub round_duration: u16,

    /// Pending PreRound -> Playing timer; aborted if the room is deleted
    /// before it fires.
    pub round_timer: Option<JoinHandle<()>>,
}

impl Room {
    pub fn new(host_id: Uuid, code: String, max_players: u8, password: Option<String>) -> Self {
        let max_players = max_players.clamp(MIN_PLAYERS, MAX_PLAYERS);
        Self {
            id: Uuid::new_v4(),
            code,
            host_id,
            state: RoomState::Lobby,
            players: HashMap::new(),
            max_players,
            password,
            slots: SlotAllocator::new(max_players),
            current_round_index: 0,
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            round_start_time: None,
            round_duration: DEFAULT_ROUND_DURATION_SECS,
            round_timer: None,
        }
    }

    /// Advisory admission check. The handler re-runs this in the same
    /// lock scope as `add_player`, so no yield point separates check
    /// from act.
    pub fn can_join(&self, password: Option<&str>) -> Result<(), DenyReason> {
        if self.players.len() as u8 >= self.max_players {
            return Err(DenyReason::RoomFull);
        }
        if let Some(expected) = &self.password {
            match password {
                None => return Err(DenyReason::PasswordRequired),
                Some(p) if p != expected => return Err(DenyReason::InvalidPassword),
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Add or re-admit a player. An existing record is a reconnect: the
    /// slot is kept and only liveness and display data are refreshed.
    pub fn add_player(&mut self, identity: &Identity) {
        if let Some(player) = self.players.get_mut(&identity.id) {
            player.is_connected = true;
            player.nickname = identity.nickname.clone();
            player.avatar_id = identity.avatar_id.clone();
        } else {
            let slot = self.slots.acquire();
            self.players.insert(identity.id, Player::new(identity, slot));
        }
    }

    /// Full removal: the record is deleted and the slot returned to the
    /// pool. A later rejoin creates a fresh player with a zeroed score.
    pub fn remove_player(&mut self, player_id: &Uuid) -> bool {
        match self.players.remove(player_id) {
            Some(player) => {
                self.slots.release(player.slot);
                true
            }
            None => false,
        }
    }

    /// Host-only, lobby-only. Removal itself goes through
    /// `remove_player`; force-disconnecting the target is the caller's
    /// responsibility.
    pub fn check_kick(&self, requester_id: Uuid, target_id: Uuid) -> Result<(), DenyReason> {
        if self.state != RoomState::Lobby {
            return Err(DenyReason::GameInProgress);
        }
        if requester_id != self.host_id {
            return Err(DenyReason::NotHost);
        }
        if target_id == self.host_id {
            return Err(DenyReason::CannotKickHost);
        }
        if !self.players.contains_key(&target_id) {
            return Err(DenyReason::NotFound);
        }
        Ok(())
    }

    /// Lobby -> PreRound. Returns true only on the transition; repeated
    /// calls are no-ops.
    pub fn start_game(&mut self) -> bool {
        if self.state != RoomState::Lobby {
            return false;
        }
        self.state = RoomState::PreRound;
        true
    }

    /// PreRound -> Playing, stamping the round start on the server clock.
    pub fn begin_round(&mut self) {
        self.state = RoomState::Playing;
        self.round_start_time = Some(Utc::now().timestamp_millis());
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_private(&self) -> bool {
        self.password.is_some()
    }

    pub fn member_ids(&self) -> Vec<Uuid> {
        self.players.keys().copied().collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            code: self.code.clone(),
            host_id: self.host_id,
            state: self.state,
            players: self.players.clone(),
            current_round_index: self.current_round_index,
            total_rounds: self.total_rounds,
            round_start_time: self.round_start_time,
            round_duration: self.round_duration,
            max_players: self.max_players,
            is_private: self.is_private(),
        }
    }

    pub fn listing_entry(&self) -> LobbyEntry {
        LobbyEntry {
            id: self.id,
            code: self.code.clone(),
            host_id: self.host_id,
            player_count: self.players.len() as u8,
            max_players: self.max_players,
            is_private: self.is_private(),
        }
    }
}
