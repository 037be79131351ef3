//! Wire protocol shared between the lobby server and its clients
//!
//! Every message on the wire is a single packet: a 32-bit action code, a
//! 32-bit flag mask, and then only the fields whose bits are set in the mask,
//! packed back to back in ascending bit order. All multi-byte integers are
//! little-endian on the wire.
//!
//! | Bit | Field          | Size                 |
//! |-----|----------------|----------------------|
//! | 0-4 | value0..value4 | 4 bytes each         |
//! | 5   | data_len       | 4 bytes              |
//! | 6   | data           | `data_len` bytes     |
//! | 7   | error          | 4 bytes              |
//! | 8   | name           | 20 bytes, NUL padded |
//! | 9   | session_info   | 50 bytes             |
//! | 10  | value10        | 4 bytes, see below   |
//!
//! `value10` does not travel at its own slot: its four bytes sit immediately
//! before the first present field among bits 5-9, or after the bit 0-4 values
//! when none of those fields is present. Encode and decode apply the same
//! rule, so every packet round-trips.

use thiserror::Error;

/// Number of significant bits in the flag mask.
pub const FLAG_COUNT: usize = 11;

/// Fixed size of the wire name field in bytes.
pub const NAME_LEN: usize = 20;

/// Fixed size of an encoded [`SessionInfo`] in bytes.
pub const SESSION_INFO_LEN: usize = 50;

/// Size of the padding/reserved tail inside a [`SessionInfo`].
pub const SESSION_PADDING_LEN: usize = 35;

/// Fixed size of a single transport read; one read carries one packet.
pub const READ_BUFFER_SIZE: usize = 1024;

// Flag bit positions, usable as indices into `Packet::flags`.
pub const FLAG_VALUE0: usize = 0;
pub const FLAG_VALUE1: usize = 1;
pub const FLAG_VALUE2: usize = 2;
pub const FLAG_VALUE3: usize = 3;
pub const FLAG_VALUE4: usize = 4;
pub const FLAG_DATA_LEN: usize = 5;
pub const FLAG_DATA: usize = 6;
pub const FLAG_ERROR: usize = 7;
pub const FLAG_NAME: usize = 8;
pub const FLAG_SESSION_INFO: usize = 9;
pub const FLAG_VALUE10: usize = 10;

// Request action codes.
pub const LIST_ROOMS: u32 = 200;
pub const LIST_USERS: u32 = 400;
pub const LIST_GAMES: u32 = 500;
pub const LOGIN_QUERY: u32 = 600;
pub const CREATE_ROOM: u32 = 700;
pub const JOIN_ROOM_OR_GAME: u32 = 800;
pub const LEAVE_ROOM_OR_GAME: u32 = 900;
pub const CLOSE_ROOM_OR_GAME: u32 = 1100;
pub const CREATE_GAME: u32 = 1200;

// Reply action codes.
pub const LISTING: u32 = 350;
pub const LIST_END: u32 = 351;
pub const LOGIN_OK: u32 = 601;
pub const ROOM_CREATED: u32 = 701;
pub const JOIN_OK: u32 = 801;
pub const LEAVE_OK: u32 = 901;
pub const CLOSE_OK: u32 = 1101;
pub const GAME_CREATED: u32 = 1201;

// Protocol-level error codes carried in the `error` field.
pub const ERROR_NONE: u32 = 0;
pub const ERROR_NOT_FOUND: u32 = 1;

/// Decoding failure. The decoder never panics on short input; any mask or
/// declared length that demands bytes past the end of the buffer surfaces
/// here instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("packet truncated: {needed} byte(s) required at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Fixed 50-byte metadata block attached to users, rooms, and games.
///
/// The padding region is opaque to the server and round-trips verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub magic1: u32,
    pub magic2: u32,
    pub flag: u8,
    pub game_ver: u8,
    pub game_release: u8,
    pub session_type: u8,
    pub access: u8,
    pub magic3: u8,
    pub magic4: u8,
    pub padding: [u8; SESSION_PADDING_LEN],
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            magic1: 0,
            magic2: 0,
            flag: 0,
            game_ver: 0,
            game_release: 0,
            session_type: 0,
            access: 0,
            magic3: 0,
            magic4: 0,
            padding: [0; SESSION_PADDING_LEN],
        }
    }
}

impl SessionInfo {
    fn read(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let magic1 = reader.read_u32()?;
        let magic2 = reader.read_u32()?;
        let header = reader.read_bytes(7)?;
        let mut info = SessionInfo {
            magic1,
            magic2,
            flag: header[0],
            game_ver: header[1],
            game_release: header[2],
            session_type: header[3],
            access: header[4],
            magic3: header[5],
            magic4: header[6],
            padding: [0; SESSION_PADDING_LEN],
        };
        info.padding
            .copy_from_slice(reader.read_bytes(SESSION_PADDING_LEN)?);
        Ok(info)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic1.to_le_bytes());
        out.extend_from_slice(&self.magic2.to_le_bytes());
        out.push(self.flag);
        out.push(self.game_ver);
        out.push(self.game_release);
        out.push(self.session_type);
        out.push(self.access);
        out.push(self.magic3);
        out.push(self.magic4);
        out.extend_from_slice(&self.padding);
    }
}

/// A single decoded (or to-be-encoded) protocol message.
///
/// Fields whose flag bit is clear keep their zero/default value and do not
/// appear on the wire. Packets are built fresh per decode or per outbound
/// send and never mutated after encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub code: u32,
    pub flags: [bool; FLAG_COUNT],
    pub value0: u32,
    pub value1: u32,
    pub value2: u32,
    pub value3: u32,
    pub value4: u32,
    pub data_len: u32,
    pub data: Vec<u8>,
    pub error: u32,
    pub name: [u8; NAME_LEN],
    pub session_info: SessionInfo,
    pub value10: u32,
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            code: 0,
            flags: [false; FLAG_COUNT],
            value0: 0,
            value1: 0,
            value2: 0,
            value3: 0,
            value4: 0,
            data_len: 0,
            data: Vec::new(),
            error: 0,
            name: [0; NAME_LEN],
            session_info: SessionInfo::default(),
            value10: 0,
        }
    }
}

impl Packet {
    /// Creates an empty packet carrying only an action code.
    pub fn request(code: u32) -> Self {
        Packet {
            code,
            ..Packet::default()
        }
    }

    /// Reply carrying a freshly allocated id in `value1`.
    pub fn id_reply(code: u32, id: u32) -> Self {
        let mut packet = Packet::request(code);
        packet.flags[FLAG_VALUE1] = true;
        packet.value1 = id;
        packet
    }

    /// Acknowledgement reply carrying only an error code.
    pub fn ack(code: u32, error: u32) -> Self {
        let mut packet = Packet::request(code);
        packet.flags[FLAG_ERROR] = true;
        packet.error = error;
        packet
    }

    /// One entry of a listing reply (code 350): id, address payload, name,
    /// and session metadata.
    pub fn listing(id: u32, data: Vec<u8>, name: &str, session_info: SessionInfo) -> Self {
        let mut packet = Packet::request(LISTING);
        for bit in [
            FLAG_VALUE1,
            FLAG_DATA_LEN,
            FLAG_DATA,
            FLAG_ERROR,
            FLAG_NAME,
            FLAG_SESSION_INFO,
        ] {
            packet.flags[bit] = true;
        }
        packet.value1 = id;
        packet.data_len = data.len() as u32;
        packet.data = data;
        packet.error = ERROR_NONE;
        packet.name = pack_name(name);
        packet.session_info = session_info;
        packet
    }

    /// Stores `name` into the fixed 20-byte name field and sets its flag.
    pub fn set_name(&mut self, name: &str) {
        self.flags[FLAG_NAME] = true;
        self.name = pack_name(name);
    }

    /// Stores a payload into `data`/`data_len` and sets both flags.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.flags[FLAG_DATA_LEN] = true;
        self.flags[FLAG_DATA] = true;
        self.data_len = data.len() as u32;
        self.data = data;
    }

    /// The name field as UTF-8 text with trailing NUL padding trimmed.
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// Packs a string into the fixed 20-byte wire name field, truncating long
/// names and NUL-padding short ones.
pub fn pack_name(name: &str) -> [u8; NAME_LEN] {
    let mut field = [0u8; NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// Bounds-checked little-endian byte reader over a packet buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        match self.pos.checked_add(len) {
            Some(end) if end <= self.buf.len() => {
                let bytes = &self.buf[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            _ => Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len,
                available: self.buf.len().saturating_sub(self.pos),
            }),
        }
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Returns where `value10` travels for a given flag set: just before the
/// first present field among bits 5-9, or at the tail when none is present.
fn value10_slot(flags: &[bool; FLAG_COUNT]) -> Option<usize> {
    (FLAG_DATA_LEN..=FLAG_SESSION_INFO).find(|&bit| flags[bit])
}

/// Decodes one packet from the front of `buf`, returning it together with
/// the number of bytes consumed. Trailing bytes are left untouched, so a
/// buffer holding several back-to-back packets can be walked frame by frame.
pub fn decode_frame(buf: &[u8]) -> Result<(Packet, usize), DecodeError> {
    let mut reader = Reader::new(buf);
    let mut packet = Packet::default();
    packet.code = reader.read_u32()?;
    let mask = reader.read_u32()?;
    for (bit, flag) in packet.flags.iter_mut().enumerate() {
        *flag = mask & (1 << bit) != 0;
    }

    let value10_at = value10_slot(&packet.flags);
    for bit in 0..FLAG_VALUE10 {
        if packet.flags[FLAG_VALUE10] && value10_at == Some(bit) {
            packet.value10 = reader.read_u32()?;
        }
        if !packet.flags[bit] {
            continue;
        }
        match bit {
            FLAG_VALUE0 => packet.value0 = reader.read_u32()?,
            FLAG_VALUE1 => packet.value1 = reader.read_u32()?,
            FLAG_VALUE2 => packet.value2 = reader.read_u32()?,
            FLAG_VALUE3 => packet.value3 = reader.read_u32()?,
            FLAG_VALUE4 => packet.value4 = reader.read_u32()?,
            FLAG_DATA_LEN => packet.data_len = reader.read_u32()?,
            FLAG_DATA => packet.data = reader.read_bytes(packet.data_len as usize)?.to_vec(),
            FLAG_ERROR => packet.error = reader.read_u32()?,
            FLAG_NAME => packet.name.copy_from_slice(reader.read_bytes(NAME_LEN)?),
            FLAG_SESSION_INFO => packet.session_info = SessionInfo::read(&mut reader)?,
            _ => unreachable!(),
        }
    }
    if packet.flags[FLAG_VALUE10] && value10_at.is_none() {
        packet.value10 = reader.read_u32()?;
    }

    Ok((packet, reader.pos))
}

/// Decodes a single packet, ignoring any trailing bytes in the buffer.
pub fn decode(buf: &[u8]) -> Result<Packet, DecodeError> {
    decode_frame(buf).map(|(packet, _)| packet)
}

/// Encodes a packet into its wire representation.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + packet.data.len() + NAME_LEN + SESSION_INFO_LEN);
    out.extend_from_slice(&packet.code.to_le_bytes());
    let mut mask = 0u32;
    for (bit, flag) in packet.flags.iter().enumerate() {
        if *flag {
            mask |= 1 << bit;
        }
    }
    out.extend_from_slice(&mask.to_le_bytes());

    let value10_at = value10_slot(&packet.flags);
    for bit in 0..FLAG_VALUE10 {
        if packet.flags[FLAG_VALUE10] && value10_at == Some(bit) {
            out.extend_from_slice(&packet.value10.to_le_bytes());
        }
        if !packet.flags[bit] {
            continue;
        }
        match bit {
            FLAG_VALUE0 => out.extend_from_slice(&packet.value0.to_le_bytes()),
            FLAG_VALUE1 => out.extend_from_slice(&packet.value1.to_le_bytes()),
            FLAG_VALUE2 => out.extend_from_slice(&packet.value2.to_le_bytes()),
            FLAG_VALUE3 => out.extend_from_slice(&packet.value3.to_le_bytes()),
            FLAG_VALUE4 => out.extend_from_slice(&packet.value4.to_le_bytes()),
            FLAG_DATA_LEN => out.extend_from_slice(&packet.data_len.to_le_bytes()),
            FLAG_DATA => out.extend_from_slice(&packet.data),
            FLAG_ERROR => out.extend_from_slice(&packet.error.to_le_bytes()),
            FLAG_NAME => out.extend_from_slice(&packet.name),
            FLAG_SESSION_INFO => packet.session_info.write(&mut out),
            _ => unreachable!(),
        }
    }
    if packet.flags[FLAG_VALUE10] && value10_at.is_none() {
        out.extend_from_slice(&packet.value10.to_le_bytes());
    }

    out
}
