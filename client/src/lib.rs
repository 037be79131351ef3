//! Lobby client library
//!
//! A small protocol client for the lobby server: it owns the TCP connection,
//! frames requests through the shared codec, and turns reply packets back
//! into results. Replies that arrive coalesced in one TCP segment are split
//! frame by frame; a frame split across reads is completed by reading more.

use log::debug;
use shared::{
    decode_frame, encode, DecodeError, Packet, SessionInfo, CLOSE_OK, CLOSE_ROOM_OR_GAME,
    CREATE_GAME, CREATE_ROOM, FLAG_VALUE10, FLAG_VALUE2, GAME_CREATED, JOIN_OK, JOIN_ROOM_OR_GAME,
    LEAVE_OK, LEAVE_ROOM_OR_GAME, LIST_END, LIST_GAMES, LIST_ROOMS, LIST_USERS, LOGIN_OK,
    LOGIN_QUERY, READ_BUFFER_SIZE, ROOM_CREATED,
};
use std::collections::VecDeque;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connection to a lobby server with reply buffering.
pub struct LobbyClient {
    stream: TcpStream,
    /// Replies decoded but not yet handed to the caller.
    pending: VecDeque<Packet>,
    /// Bytes of a reply frame still waiting for its tail.
    residual: Vec<u8>,
}

impl LobbyClient {
    /// Connects to the server at `addr` (for example `127.0.0.1:17001`).
    pub async fn connect(addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(addr).await?;
        debug!("Connected to lobby server at {}", addr);
        Ok(LobbyClient {
            stream,
            pending: VecDeque::new(),
            residual: Vec::new(),
        })
    }

    /// The local address bytes of this connection, used as the client's
    /// identity payload in create requests.
    pub fn local_ip_bytes(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let addr = self.stream.local_addr()?;
        Ok(match addr.ip() {
            std::net::IpAddr::V4(ip) => ip.octets().to_vec(),
            std::net::IpAddr::V6(ip) => ip.octets().to_vec(),
        })
    }

    /// Logs in with the given display name; returns the assigned session id.
    pub async fn login(
        &mut self,
        name: &str,
        session_info: SessionInfo,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        let mut request = Packet::request(LOGIN_QUERY);
        request.set_name(name);
        request.flags[shared::FLAG_SESSION_INFO] = true;
        request.session_info = session_info;
        self.send(&request).await?;

        let reply = self.expect_reply(LOGIN_OK).await?;
        Ok(reply.value1)
    }

    /// Creates a room and returns its id.
    pub async fn create_room(
        &mut self,
        name: &str,
        creator_ip: Vec<u8>,
        session_info: SessionInfo,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        let mut request = Packet::request(CREATE_ROOM);
        request.set_name(name);
        request.set_data(creator_ip);
        request.flags[shared::FLAG_SESSION_INFO] = true;
        request.session_info = session_info;
        self.send(&request).await?;

        let reply = self.expect_reply(ROOM_CREATED).await?;
        Ok(reply.value1)
    }

    /// Creates a game hosted in `room_id` and returns the game's id.
    pub async fn create_game(
        &mut self,
        name: &str,
        host_ip: Vec<u8>,
        room_id: u32,
        session_info: SessionInfo,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        let mut request = Packet::request(CREATE_GAME);
        request.set_name(name);
        request.set_data(host_ip);
        request.flags[FLAG_VALUE2] = true;
        request.value2 = room_id;
        request.flags[shared::FLAG_SESSION_INFO] = true;
        request.session_info = session_info;
        self.send(&request).await?;

        let reply = self.expect_reply(GAME_CREATED).await?;
        Ok(reply.value1)
    }

    /// Joins `user_id` into `room_id`; returns the server's error code.
    pub async fn join_room(
        &mut self,
        room_id: u32,
        user_id: u32,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        self.send(&member_request(JOIN_ROOM_OR_GAME, room_id, user_id))
            .await?;
        let reply = self.expect_reply(JOIN_OK).await?;
        Ok(reply.error)
    }

    /// Removes `user_id` from `room_id`; returns the server's error code.
    pub async fn leave_room(
        &mut self,
        room_id: u32,
        user_id: u32,
    ) -> Result<u32, Box<dyn std::error::Error>> {
        self.send(&member_request(LEAVE_ROOM_OR_GAME, room_id, user_id))
            .await?;
        let reply = self.expect_reply(LEAVE_OK).await?;
        Ok(reply.error)
    }

    /// Closes the room or game with the given id.
    pub async fn close(&mut self, id: u32) -> Result<u32, Box<dyn std::error::Error>> {
        let mut request = Packet::request(CLOSE_ROOM_OR_GAME);
        request.flags[FLAG_VALUE10] = true;
        request.value10 = id;
        self.send(&request).await?;
        let reply = self.expect_reply(CLOSE_OK).await?;
        Ok(reply.error)
    }

    /// Lists all rooms. Returns the listing packets and the terminator's
    /// error code.
    pub async fn list_rooms(&mut self) -> Result<(Vec<Packet>, u32), Box<dyn std::error::Error>> {
        self.send(&Packet::request(LIST_ROOMS)).await?;
        self.collect_listing().await
    }

    /// Lists the members of `room_id`.
    pub async fn list_users(
        &mut self,
        room_id: u32,
    ) -> Result<(Vec<Packet>, u32), Box<dyn std::error::Error>> {
        self.send(&room_request(LIST_USERS, room_id)).await?;
        self.collect_listing().await
    }

    /// Lists the games hosted by `room_id`.
    pub async fn list_games(
        &mut self,
        room_id: u32,
    ) -> Result<(Vec<Packet>, u32), Box<dyn std::error::Error>> {
        self.send(&room_request(LIST_GAMES, room_id)).await?;
        self.collect_listing().await
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        debug!("Sending action code {}", packet.code);
        self.stream.write_all(&encode(packet)).await?;
        Ok(())
    }

    /// Receives the next reply packet, reading from the socket as needed.
    pub async fn recv_packet(&mut self) -> Result<Packet, Box<dyn std::error::Error>> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Ok(packet);
            }

            let mut buffer = [0u8; READ_BUFFER_SIZE];
            let read = self.stream.read(&mut buffer).await?;
            if read == 0 {
                return Err("server closed the connection".into());
            }
            self.residual.extend_from_slice(&buffer[..read]);

            // Split off every complete frame; an incomplete tail stays in
            // the residual buffer until the next read delivers the rest.
            loop {
                match decode_frame(&self.residual) {
                    Ok((packet, consumed)) => {
                        debug!("Received action code {}", packet.code);
                        self.pending.push_back(packet);
                        self.residual.drain(..consumed);
                        if self.residual.is_empty() {
                            break;
                        }
                    }
                    Err(DecodeError::Truncated { .. }) => break,
                }
            }
        }
    }

    async fn expect_reply(&mut self, code: u32) -> Result<Packet, Box<dyn std::error::Error>> {
        let reply = self.recv_packet().await?;
        if reply.code != code {
            return Err(format!("expected reply code {}, got {}", code, reply.code).into());
        }
        Ok(reply)
    }

    async fn collect_listing(&mut self) -> Result<(Vec<Packet>, u32), Box<dyn std::error::Error>> {
        let mut items = Vec::new();
        loop {
            let packet = self.recv_packet().await?;
            if packet.code == LIST_END {
                return Ok((items, packet.error));
            }
            items.push(packet);
        }
    }
}

fn room_request(code: u32, room_id: u32) -> Packet {
    let mut request = Packet::request(code);
    request.flags[FLAG_VALUE2] = true;
    request.value2 = room_id;
    request
}

fn member_request(code: u32, room_id: u32, user_id: u32) -> Packet {
    let mut request = room_request(code, room_id);
    request.flags[FLAG_VALUE10] = true;
    request.value10 = user_id;
    request
}
