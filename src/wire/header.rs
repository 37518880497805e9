//! The message envelope.
//!
//! Every frame starts with a fixed 20-byte header: flag bits describing the
//! endpoint references, the total frame size, the destination and reply
//! endpoints, and the message identifier. Replies reuse the request header
//! with the endpoints swapped and the identifier shifted by the reply
//! offset.
use super::WireError;
use super::schema::REPLY_OFFSET;

pub const HEADER_LEN: usize = 20;

pub(crate) const HDR_BITS: usize = 0;
pub(crate) const HDR_SIZE: usize = 4;
pub(crate) const HDR_REMOTE: usize = 8;
pub(crate) const HDR_LOCAL: usize = 12;
pub(crate) const HDR_ID: usize = 16;

/// Endpoint reference dispositions carried in the header flag bits.
pub const REF_COPY_SEND: u32 = 19;
pub const REF_MAKE_SEND_ONCE: u32 = 21;

/// Compose the flag word from remote and local dispositions.
pub fn compose_bits(remote: u32, local: u32) -> u32 {
    (remote & 0xff) | ((local & 0xff) << 8)
}

pub fn remote_bits(bits: u32) -> u32 {
    bits & 0xff
}

pub fn local_bits(bits: u32) -> u32 {
    (bits >> 8) & 0xff
}

/// A transport endpoint name. `NULL` addresses nobody.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint(pub u32);

impl Endpoint {
    pub const NULL: Endpoint = Endpoint(0);
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub bits: u32,
    pub size: u32,
    pub remote: Endpoint,
    pub local: Endpoint,
    pub id: i32,
}

impl MessageHeader {
    /// Header for a request addressed to `remote`, with replies expected on
    /// `reply`. The size is patched in when the frame is finished.
    pub fn request(remote: Endpoint, reply: Endpoint, id: i32) -> MessageHeader {
        MessageHeader {
            bits: compose_bits(REF_COPY_SEND, REF_MAKE_SEND_ONCE),
            size: 0,
            remote,
            local: reply,
            id,
        }
    }

    /// Derive the reply header: endpoints swapped, identifier shifted by the
    /// fixed reply offset, remote disposition taken from the request's reply
    /// disposition.
    pub fn reply_to(&self) -> MessageHeader {
        MessageHeader {
            bits: compose_bits(local_bits(self.bits), 0),
            size: 0,
            remote: self.local,
            local: Endpoint::NULL,
            id: self.id.wrapping_add(REPLY_OFFSET),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.remote.0.to_le_bytes());
        out.extend_from_slice(&self.local.0.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
    }

    pub fn decode(raw: &[u8]) -> Result<MessageHeader, WireError> {
        if raw.len() < HEADER_LEN {
            return Err(WireError::Truncated {
                need: HEADER_LEN,
                have: raw.len(),
            });
        }

        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);

        Ok(MessageHeader {
            bits: word(HDR_BITS),
            size: word(HDR_SIZE),
            remote: Endpoint(word(HDR_REMOTE)),
            local: Endpoint(word(HDR_LOCAL)),
            id: word(HDR_ID) as i32,
        })
    }
}
