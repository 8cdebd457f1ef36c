use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::Utc;
use uuid::Uuid;

use super::record::SharedTrack;
use crate::error::{CiderError, Result};

/// Plugin-message channel the packet travels on.
pub const CHANNEL: &str = "cider:track_share";

/// Longest string accepted on the wire, in bytes.
pub const MAX_STRING_LEN: usize = 32_767;

/// Track announcement exchanged between peers.
///
/// Layout: 16-byte UUID, then peer name, track, artist and album as
/// VarInt-length-prefixed UTF-8, then the send time as a big-endian `i64` of
/// Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPacket {
    pub peer_id: Uuid,
    pub peer_name: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub timestamp_ms: i64,
}

impl TrackPacket {
    pub fn new(
        peer_id: Uuid,
        peer_name: impl Into<String>,
        track_name: impl Into<String>,
        artist_name: impl Into<String>,
        album_name: impl Into<String>,
    ) -> Self {
        Self {
            peer_id,
            peer_name: peer_name.into(),
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            album_name: album_name.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(
            16 + 8
                + 4 * 5
                + self.peer_name.len()
                + self.track_name.len()
                + self.artist_name.len()
                + self.album_name.len(),
        );
        buf.put_slice(self.peer_id.as_bytes());
        for field in [
            &self.peer_name,
            &self.track_name,
            &self.artist_name,
            &self.album_name,
        ] {
            write_string(&mut buf, field)?;
        }
        buf.put_i64(self.timestamp_ms);
        Ok(buf.freeze())
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.remaining() < 16 {
            return Err(CiderError::packet("truncated peer id"));
        }
        let mut raw_id = [0u8; 16];
        buf.copy_to_slice(&mut raw_id);

        let peer_name = read_string(&mut buf)?;
        let track_name = read_string(&mut buf)?;
        let artist_name = read_string(&mut buf)?;
        let album_name = read_string(&mut buf)?;

        if buf.remaining() < 8 {
            return Err(CiderError::packet("truncated timestamp"));
        }
        let timestamp_ms = buf.get_i64();
        if buf.has_remaining() {
            return Err(CiderError::packet(format!(
                "{} trailing bytes",
                buf.remaining()
            )));
        }

        Ok(Self {
            peer_id: Uuid::from_bytes(raw_id),
            peer_name,
            track_name,
            artist_name,
            album_name,
            timestamp_ms,
        })
    }

    /// Directory record for this announcement, aged from the moment of receipt.
    pub fn into_shared_track(self) -> SharedTrack {
        SharedTrack::new(
            self.peer_id,
            self.peer_name,
            self.track_name,
            self.artist_name,
            self.album_name,
        )
    }
}

fn write_var_int(buf: &mut BytesMut, value: u32) {
    let mut value = value;
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn read_var_int(buf: &mut &[u8]) -> Result<u32> {
    let mut value = 0u32;
    for shift in (0..35).step_by(7) {
        if !buf.has_remaining() {
            return Err(CiderError::packet("truncated length prefix"));
        }
        let byte = buf.get_u8();
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(CiderError::packet("length prefix longer than 5 bytes"))
}

fn write_string(buf: &mut BytesMut, value: &str) -> Result<()> {
    if value.len() > MAX_STRING_LEN {
        return Err(CiderError::packet(format!(
            "string of {} bytes exceeds {}",
            value.len(),
            MAX_STRING_LEN
        )));
    }
    write_var_int(buf, value.len() as u32);
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn read_string(buf: &mut &[u8]) -> Result<String> {
    let len = read_var_int(buf)? as usize;
    if len > MAX_STRING_LEN {
        return Err(CiderError::packet(format!("string length {len} too large")));
    }
    if buf.remaining() < len {
        return Err(CiderError::packet("truncated string"));
    }
    let slice: &[u8] = *buf;
    let (raw, rest) = slice.split_at(len);
    let value = std::str::from_utf8(raw)
        .map_err(|e| CiderError::packet(format!("invalid UTF-8: {e}")))?
        .to_string();
    *buf = rest;
    Ok(value)
}
