//! In-memory session registry for users, rooms, and games
//!
//! This module owns the three id-keyed collections behind the lobby plus the
//! shared id counter. Ids are issued from a single process-wide sequence, so
//! a user id, a room id, and a game id never collide, and no id is reused
//! for the lifetime of the process.
//!
//! The registry itself is a plain single-threaded structure; the network
//! layer wraps it in `Arc<RwLock<Registry>>` so that every compound
//! operation (allocate-then-insert, list snapshots, membership edits,
//! deletions with cleanup) runs under one lock covering all three maps and
//! the counter.

use log::info;
use shared::SessionInfo;
use std::collections::HashMap;

/// First id handed out by a fresh registry; the range below is reserved.
pub const ID_SEED: u32 = 0x1000;

/// A logged-in user session.
///
/// Users are created on login and retained even after their connection
/// drops; disconnection is observed by the network layer but does not remove
/// the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Display name taken from the login packet's name field.
    pub name: String,
    /// Originating network address, as text.
    pub ip_address: String,
    pub session_info: SessionInfo,
}

/// A named grouping that users can join and that can host games.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// Raw address bytes supplied by the creator in the create packet.
    pub creator_ip: Vec<u8>,
    pub name: String,
    pub session_info: SessionInfo,
    /// Member user ids, in join order.
    pub user_ids: Vec<u32>,
    /// Ids of games hosted inside this room.
    pub game_ids: Vec<u32>,
}

/// A hosted game session, referenced from its room's game list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    /// Raw address bytes of the hosting client.
    pub host_ip: Vec<u8>,
    pub name: String,
    pub session_info: SessionInfo,
}

/// The three session collections plus the shared id counter.
#[derive(Debug, Default)]
pub struct Registry {
    users: HashMap<u32, UserInfo>,
    rooms: HashMap<u32, RoomInfo>,
    games: HashMap<u32, GameInfo>,
    next_id: u32,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            users: HashMap::new(),
            rooms: HashMap::new(),
            games: HashMap::new(),
            next_id: ID_SEED,
        }
    }

    /// Hands out the next id. Private: allocation is only ever paired with
    /// the insert that uses the id, inside one of the `add_*` methods.
    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Registers a user and returns their new session id.
    pub fn add_user(&mut self, user: UserInfo) -> u32 {
        let id = self.allocate();
        info!("User {} ({}) logged in from {}", id, user.name, user.ip_address);
        self.users.insert(id, user);
        id
    }

    /// Creates a room and returns its new id.
    pub fn add_room(&mut self, room: RoomInfo) -> u32 {
        let id = self.allocate();
        info!("Room {} ({}) created", id, room.name);
        self.rooms.insert(id, room);
        id
    }

    /// Creates a game and returns its new id.
    pub fn add_game(&mut self, game: GameInfo) -> u32 {
        let id = self.allocate();
        info!("Game {} ({}) created", id, game.name);
        self.games.insert(id, game);
        id
    }

    pub fn user(&self, id: u32) -> Option<&UserInfo> {
        self.users.get(&id)
    }

    pub fn room(&self, id: u32) -> Option<&RoomInfo> {
        self.rooms.get(&id)
    }

    pub fn game(&self, id: u32) -> Option<&GameInfo> {
        self.games.get(&id)
    }

    /// Owned snapshot of all rooms, ordered by id so repeated listings with
    /// no intervening mutation produce identical sequences.
    pub fn rooms_snapshot(&self) -> Vec<(u32, RoomInfo)> {
        let mut rooms: Vec<(u32, RoomInfo)> = self
            .rooms
            .iter()
            .map(|(id, room)| (*id, room.clone()))
            .collect();
        rooms.sort_by_key(|(id, _)| *id);
        rooms
    }

    /// Appends `user_id` to the room's member list. Joining twice is
    /// idempotent: a user appears at most once per room. Returns false when
    /// the room does not exist.
    pub fn join_room(&mut self, room_id: u32, user_id: u32) -> bool {
        match self.rooms.get_mut(&room_id) {
            Some(room) => {
                if !room.user_ids.contains(&user_id) {
                    room.user_ids.push(user_id);
                }
                true
            }
            None => false,
        }
    }

    /// Removes the first occurrence of `user_id` from the room's member
    /// list. Leaving a room the user is not in, or a room that does not
    /// exist, is a no-op.
    pub fn leave_room(&mut self, room_id: u32, user_id: u32) {
        if let Some(room) = self.rooms.get_mut(&room_id) {
            if let Some(index) = room.user_ids.iter().position(|&id| id == user_id) {
                room.user_ids.remove(index);
            }
        }
    }

    /// Attaches an existing game to a room's game list. Returns false when
    /// the room does not exist.
    pub fn attach_game(&mut self, room_id: u32, game_id: u32) -> bool {
        match self.rooms.get_mut(&room_id) {
            Some(room) => {
                if !room.game_ids.contains(&game_id) {
                    room.game_ids.push(game_id);
                }
                true
            }
            None => false,
        }
    }

    /// Closes the room or game with the given id, with referential cleanup:
    /// closing a room also removes the games it hosts, and closing a game
    /// strips its id from every room's game list. Unknown ids are a no-op.
    pub fn close(&mut self, id: u32) {
        if let Some(room) = self.rooms.remove(&id) {
            info!("Room {} ({}) closed", id, room.name);
            for game_id in room.game_ids {
                self.games.remove(&game_id);
            }
            return;
        }
        if let Some(game) = self.games.remove(&id) {
            info!("Game {} ({}) closed", id, game.name);
            for room in self.rooms.values_mut() {
                room.game_ids.retain(|&game_id| game_id != id);
            }
        }
    }

    /// The room's members resolved to user entries, in join order. Member
    /// ids with no matching user (never possible through the dispatcher, but
    /// tolerated) are skipped. None when the room does not exist.
    pub fn room_users(&self, room_id: u32) -> Option<Vec<(u32, UserInfo)>> {
        self.rooms.get(&room_id).map(|room| {
            room.user_ids
                .iter()
                .filter_map(|id| self.users.get(id).map(|user| (*id, user.clone())))
                .collect()
        })
    }

    /// The room's hosted games resolved to game entries. Stale game ids are
    /// skipped. None when the room does not exist.
    pub fn room_games(&self, room_id: u32) -> Option<Vec<(u32, GameInfo)>> {
        self.rooms.get(&room_id).map(|room| {
            room.game_ids
                .iter()
                .filter_map(|id| self.games.get(id).map(|game| (*id, game.clone())))
                .collect()
        })
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }
}
