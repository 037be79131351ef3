//! Command dispatch: maps a decoded packet's action code to registry work
//!
//! Each inbound packet resolves to exactly one command function of the shape
//! `(packet, peer address, registry) -> replies`. The functions are pure
//! with respect to everything except the registry they are handed, which
//! keeps every command unit-testable against a plain `Registry`. The network
//! layer calls [`dispatch`] while holding the registry write lock.
//!
//! Unknown action codes are silently ignored: no reply, no error packet.
//! That is deliberate protocol behavior, not an oversight.

use crate::registry::{GameInfo, Registry, RoomInfo, UserInfo};
use log::{debug, info};
use shared::{
    Packet, CLOSE_OK, CLOSE_ROOM_OR_GAME, CREATE_GAME, CREATE_ROOM, ERROR_NONE, ERROR_NOT_FOUND,
    GAME_CREATED, JOIN_OK, JOIN_ROOM_OR_GAME, LEAVE_OK, LEAVE_ROOM_OR_GAME, LIST_END, LIST_GAMES,
    LIST_ROOMS, LIST_USERS, LOGIN_OK, LOGIN_QUERY, ROOM_CREATED,
};
use std::net::SocketAddr;

/// Routes one decoded packet to its command and returns the replies to send
/// back on the originating connection, in order.
pub fn dispatch(packet: &Packet, peer_addr: SocketAddr, registry: &mut Registry) -> Vec<Packet> {
    match packet.code {
        LOGIN_QUERY => login(packet, peer_addr, registry),
        LIST_ROOMS => list_rooms(registry),
        CREATE_ROOM => create_room(packet, registry),
        JOIN_ROOM_OR_GAME => join(packet, registry),
        LIST_GAMES => list_games(packet, registry),
        LIST_USERS => list_users(packet, registry),
        LEAVE_ROOM_OR_GAME => leave(packet, registry),
        CLOSE_ROOM_OR_GAME => close(packet, registry),
        CREATE_GAME => create_game(packet, registry),
        code => {
            debug!("Ignoring unknown action code {} from {}", code, peer_addr);
            Vec::new()
        }
    }
}

/// Registers a new user session and replies with the allocated id.
fn login(packet: &Packet, peer_addr: SocketAddr, registry: &mut Registry) -> Vec<Packet> {
    let id = registry.add_user(UserInfo {
        name: packet.name_str(),
        ip_address: peer_addr.to_string(),
        session_info: packet.session_info.clone(),
    });
    vec![Packet::id_reply(LOGIN_OK, id)]
}

/// One listing packet per room, then the terminator. Always exactly one
/// terminator, even for an empty lobby.
fn list_rooms(registry: &mut Registry) -> Vec<Packet> {
    let mut replies: Vec<Packet> = registry
        .rooms_snapshot()
        .into_iter()
        .map(|(id, room)| Packet::listing(id, room.creator_ip, &room.name, room.session_info))
        .collect();
    replies.push(Packet::ack(LIST_END, ERROR_NONE));
    replies
}

fn create_room(packet: &Packet, registry: &mut Registry) -> Vec<Packet> {
    let id = registry.add_room(RoomInfo {
        creator_ip: packet.data.clone(),
        name: packet.name_str(),
        session_info: packet.session_info.clone(),
        user_ids: Vec::new(),
        game_ids: Vec::new(),
    });
    vec![Packet::id_reply(ROOM_CREATED, id)]
}

/// Adds user `value10` to room `value2`. An unknown room is reported through
/// the reply's error field rather than dropped on the floor.
fn join(packet: &Packet, registry: &mut Registry) -> Vec<Packet> {
    let error = if registry.join_room(packet.value2, packet.value10) {
        info!("User {} joined room {}", packet.value10, packet.value2);
        ERROR_NONE
    } else {
        ERROR_NOT_FOUND
    };
    vec![Packet::ack(JOIN_OK, error)]
}

/// Lists the games hosted by room `value2`. An unknown room yields just the
/// terminator, flagged not-found.
fn list_games(packet: &Packet, registry: &mut Registry) -> Vec<Packet> {
    match registry.room_games(packet.value2) {
        Some(games) => {
            let mut replies: Vec<Packet> = games
                .into_iter()
                .map(|(id, game)| Packet::listing(id, game.host_ip, &game.name, game.session_info))
                .collect();
            replies.push(Packet::ack(LIST_END, ERROR_NONE));
            replies
        }
        None => vec![Packet::ack(LIST_END, ERROR_NOT_FOUND)],
    }
}

/// Lists the members of room `value2`. The data payload is the user's
/// address text followed by a NUL terminator.
fn list_users(packet: &Packet, registry: &mut Registry) -> Vec<Packet> {
    match registry.room_users(packet.value2) {
        Some(users) => {
            let mut replies: Vec<Packet> = users
                .into_iter()
                .map(|(id, user)| {
                    let mut address = user.ip_address.into_bytes();
                    address.push(0);
                    Packet::listing(id, address, &user.name, user.session_info)
                })
                .collect();
            replies.push(Packet::ack(LIST_END, ERROR_NONE));
            replies
        }
        None => vec![Packet::ack(LIST_END, ERROR_NOT_FOUND)],
    }
}

/// Removes user `value10` from room `value2`. Leaving a room the user is
/// not in (or a room that does not exist) is a no-op, not an error.
fn leave(packet: &Packet, registry: &mut Registry) -> Vec<Packet> {
    registry.leave_room(packet.value2, packet.value10);
    vec![Packet::ack(LEAVE_OK, ERROR_NONE)]
}

/// Closes room or game `value10`, cleaning up references to it.
fn close(packet: &Packet, registry: &mut Registry) -> Vec<Packet> {
    registry.close(packet.value10);
    vec![Packet::ack(CLOSE_OK, ERROR_NONE)]
}

/// Registers a new game and, when the packet names an existing room in
/// `value2`, attaches the game to that room's game list.
fn create_game(packet: &Packet, registry: &mut Registry) -> Vec<Packet> {
    let id = registry.add_game(GameInfo {
        host_ip: packet.data.clone(),
        name: packet.name_str(),
        session_info: packet.session_info.clone(),
    });
    if registry.attach_game(packet.value2, id) {
        info!("Game {} attached to room {}", id, packet.value2);
    }
    vec![Packet::id_reply(GAME_CREATED, id)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ID_SEED;
    use shared::{SessionInfo, FLAG_ERROR, FLAG_VALUE1, LISTING};

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn login_packet(name: &str) -> Packet {
        let mut packet = Packet::request(LOGIN_QUERY);
        packet.set_name(name);
        packet.flags[shared::FLAG_SESSION_INFO] = true;
        packet.session_info = SessionInfo::default();
        packet
    }

    fn create_room_packet(name: &str, creator_ip: &[u8]) -> Packet {
        let mut packet = Packet::request(CREATE_ROOM);
        packet.set_name(name);
        packet.set_data(creator_ip.to_vec());
        packet
    }

    fn create_game_packet(name: &str, room_id: u32) -> Packet {
        let mut packet = Packet::request(CREATE_GAME);
        packet.set_name(name);
        packet.set_data(vec![10, 0, 0, 5]);
        packet.flags[shared::FLAG_VALUE2] = true;
        packet.value2 = room_id;
        packet
    }

    fn join_packet(room_id: u32, user_id: u32) -> Packet {
        let mut packet = Packet::request(JOIN_ROOM_OR_GAME);
        packet.flags[shared::FLAG_VALUE2] = true;
        packet.flags[shared::FLAG_VALUE10] = true;
        packet.value2 = room_id;
        packet.value10 = user_id;
        packet
    }

    #[test]
    fn test_login_allocates_first_id() {
        let mut registry = Registry::new();
        let replies = dispatch(&login_packet("alice"), peer(), &mut registry);

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code, LOGIN_OK);
        assert!(replies[0].flags[FLAG_VALUE1]);
        assert_eq!(replies[0].value1, ID_SEED);

        let user = registry.user(ID_SEED).unwrap();
        assert_eq!(user.name, "alice");
        assert_eq!(user.ip_address, peer().to_string());
    }

    #[test]
    fn test_login_create_list_scenario() {
        let mut registry = Registry::new();

        let login = dispatch(&login_packet("alice"), peer(), &mut registry);
        assert_eq!(login[0].value1, 0x1000);

        let created = dispatch(
            &create_room_packet("lobby", &[127, 0, 0, 1]),
            peer(),
            &mut registry,
        );
        assert_eq!(created[0].code, ROOM_CREATED);
        assert_eq!(created[0].value1, 0x1001);

        let listed = dispatch(&Packet::request(LIST_ROOMS), peer(), &mut registry);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].code, LISTING);
        assert_eq!(listed[0].value1, 0x1001);
        assert_eq!(listed[0].name_str(), "lobby");
        assert_eq!(listed[0].data, vec![127, 0, 0, 1]);
        assert_eq!(listed[1].code, LIST_END);
        assert_eq!(listed[1].error, ERROR_NONE);
    }

    #[test]
    fn test_list_rooms_empty_emits_only_terminator() {
        let mut registry = Registry::new();
        let replies = dispatch(&Packet::request(LIST_ROOMS), peer(), &mut registry);

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code, LIST_END);
        assert!(replies[0].flags[FLAG_ERROR]);
    }

    #[test]
    fn test_list_rooms_is_idempotent() {
        let mut registry = Registry::new();
        dispatch(&create_room_packet("alpha", &[1, 1, 1, 1]), peer(), &mut registry);
        dispatch(&create_room_packet("beta", &[2, 2, 2, 2]), peer(), &mut registry);

        let first = dispatch(&Packet::request(LIST_ROOMS), peer(), &mut registry);
        let second = dispatch(&Packet::request(LIST_ROOMS), peer(), &mut registry);
        assert_eq!(first, second);
    }

    #[test]
    fn test_join_then_leave_membership() {
        let mut registry = Registry::new();
        let user_id = dispatch(&login_packet("alice"), peer(), &mut registry)[0].value1;
        let room_id =
            dispatch(&create_room_packet("lobby", &[127, 0, 0, 1]), peer(), &mut registry)[0]
                .value1;

        let joined = dispatch(&join_packet(room_id, user_id), peer(), &mut registry);
        assert_eq!(joined[0].code, JOIN_OK);
        assert_eq!(joined[0].error, ERROR_NONE);
        assert_eq!(registry.room(room_id).unwrap().user_ids, vec![user_id]);

        let mut leave_packet = join_packet(room_id, user_id);
        leave_packet.code = LEAVE_ROOM_OR_GAME;
        let left = dispatch(&leave_packet, peer(), &mut registry);
        assert_eq!(left[0].code, LEAVE_OK);
        assert_eq!(left[0].error, ERROR_NONE);
        assert!(registry.room(room_id).unwrap().user_ids.is_empty());
    }

    #[test]
    fn test_join_unknown_room_reports_not_found() {
        let mut registry = Registry::new();
        let replies = dispatch(&join_packet(0xBEEF, 0x1000), peer(), &mut registry);

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code, JOIN_OK);
        assert_eq!(replies[0].error, ERROR_NOT_FOUND);
    }

    #[test]
    fn test_list_users_payload_has_nul_terminated_address() {
        let mut registry = Registry::new();
        let user_id = dispatch(&login_packet("alice"), peer(), &mut registry)[0].value1;
        let room_id =
            dispatch(&create_room_packet("lobby", &[127, 0, 0, 1]), peer(), &mut registry)[0]
                .value1;
        dispatch(&join_packet(room_id, user_id), peer(), &mut registry);

        let mut request = Packet::request(LIST_USERS);
        request.flags[shared::FLAG_VALUE2] = true;
        request.value2 = room_id;
        let replies = dispatch(&request, peer(), &mut registry);

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].value1, user_id);
        assert_eq!(replies[0].name_str(), "alice");
        let mut expected = peer().to_string().into_bytes();
        expected.push(0);
        assert_eq!(replies[0].data, expected);
        assert_eq!(replies[1].code, LIST_END);
    }

    #[test]
    fn test_list_users_unknown_room_terminator_only() {
        let mut registry = Registry::new();
        let mut request = Packet::request(LIST_USERS);
        request.flags[shared::FLAG_VALUE2] = true;
        request.value2 = 0xBEEF;

        let replies = dispatch(&request, peer(), &mut registry);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code, LIST_END);
        assert_eq!(replies[0].error, ERROR_NOT_FOUND);
    }

    #[test]
    fn test_create_game_attaches_to_room() {
        let mut registry = Registry::new();
        let room_id =
            dispatch(&create_room_packet("lobby", &[127, 0, 0, 1]), peer(), &mut registry)[0]
                .value1;

        let created = dispatch(&create_game_packet("match", room_id), peer(), &mut registry);
        assert_eq!(created[0].code, GAME_CREATED);
        let game_id = created[0].value1;
        assert_eq!(registry.room(room_id).unwrap().game_ids, vec![game_id]);

        let mut request = Packet::request(LIST_GAMES);
        request.flags[shared::FLAG_VALUE2] = true;
        request.value2 = room_id;
        let listed = dispatch(&request, peer(), &mut registry);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].value1, game_id);
        assert_eq!(listed[0].name_str(), "match");
        assert_eq!(listed[1].code, LIST_END);
    }

    #[test]
    fn test_close_room_then_list_games_not_found() {
        let mut registry = Registry::new();
        let room_id =
            dispatch(&create_room_packet("lobby", &[127, 0, 0, 1]), peer(), &mut registry)[0]
                .value1;
        let game_id = dispatch(&create_game_packet("match", room_id), peer(), &mut registry)[0]
            .value1;

        let mut close_packet = Packet::request(CLOSE_ROOM_OR_GAME);
        close_packet.flags[shared::FLAG_VALUE10] = true;
        close_packet.value10 = room_id;
        let closed = dispatch(&close_packet, peer(), &mut registry);
        assert_eq!(closed[0].code, CLOSE_OK);

        assert!(registry.room(room_id).is_none());
        assert!(registry.game(game_id).is_none());

        let mut request = Packet::request(LIST_GAMES);
        request.flags[shared::FLAG_VALUE2] = true;
        request.value2 = room_id;
        let listed = dispatch(&request, peer(), &mut registry);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].error, ERROR_NOT_FOUND);
    }

    #[test]
    fn test_unknown_action_code_is_ignored() {
        let mut registry = Registry::new();
        let replies = dispatch(&Packet::request(31337), peer(), &mut registry);
        assert!(replies.is_empty());
        assert_eq!(registry.user_count(), 0);
    }
}
