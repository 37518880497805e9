//! Type descriptors: the compact tag written before every marshaled value.
//!
//! A descriptor names the value's type code, its element width in bits, a
//! flag word, and an element count. Scalars always carry count 1; byte
//! arrays carry the running element count that the validator bounds-checks
//! against the field's declared maximum.
use super::WireError;

pub const DESCRIPTOR_LEN: usize = 8;

pub(crate) const DESC_CODE: usize = 0;
pub(crate) const DESC_BITS: usize = 1;
pub(crate) const DESC_FLAGS: usize = 2;
pub(crate) const DESC_COUNT: usize = 4;

/// Payload bytes are embedded in the message itself.
const FLAG_INLINE: u16 = 0b01;
/// Ownership of the payload moves to the receiver. Never accepted here.
const FLAG_TRANSFER: u16 = 0b10;
const FLAG_RESERVED: u16 = !(FLAG_INLINE | FLAG_TRANSFER);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeCode {
    Byte = 1,
    Integer32 = 2,
    Integer64 = 3,
    PortRef = 4,
}

impl TypeCode {
    /// Element width implied by the code. Descriptor width must agree.
    pub fn bits(self) -> u8 {
        match self {
            TypeCode::Byte => 8,
            TypeCode::Integer32 => 32,
            TypeCode::Integer64 => 64,
            TypeCode::PortRef => 32,
        }
    }

    pub fn from_code(code: u8) -> Option<TypeCode> {
        match code {
            1 => Some(TypeCode::Byte),
            2 => Some(TypeCode::Integer32),
            3 => Some(TypeCode::Integer64),
            4 => Some(TypeCode::PortRef),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub code: TypeCode,
    pub bits: u8,
    pub inline: bool,
    pub transfer: bool,
    pub count: u32,
}

impl TypeDescriptor {
    /// Descriptor for a single inline value of `code`.
    pub fn scalar(code: TypeCode) -> TypeDescriptor {
        TypeDescriptor {
            code,
            bits: code.bits(),
            inline: true,
            transfer: false,
            count: 1,
        }
    }

    /// Descriptor for an inline array of `count` elements of `code`.
    pub fn array(code: TypeCode, count: u32) -> TypeDescriptor {
        TypeDescriptor {
            code,
            bits: code.bits(),
            inline: true,
            transfer: false,
            count,
        }
    }

    /// Whether the declared element width matches the type code.
    pub fn consistent(&self) -> bool {
        self.bits == self.code.bits()
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let mut flags = 0u16;
        if self.inline {
            flags |= FLAG_INLINE;
        }
        if self.transfer {
            flags |= FLAG_TRANSFER;
        }
        out.push(self.code as u8);
        out.push(self.bits);
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
    }

    pub fn decode(raw: &[u8]) -> Result<TypeDescriptor, WireError> {
        if raw.len() < DESCRIPTOR_LEN {
            return Err(WireError::Truncated {
                need: DESCRIPTOR_LEN,
                have: raw.len(),
            });
        }

        let code = TypeCode::from_code(raw[DESC_CODE]).ok_or(WireError::UnknownCode(raw[DESC_CODE]))?;
        let flags = u16::from_le_bytes([raw[DESC_FLAGS], raw[DESC_FLAGS + 1]]);
        if flags & FLAG_RESERVED != 0 {
            return Err(WireError::ReservedBits(flags));
        }

        Ok(TypeDescriptor {
            code,
            bits: raw[DESC_BITS],
            inline: flags & FLAG_INLINE != 0,
            transfer: flags & FLAG_TRANSFER != 0,
            count: u32::from_le_bytes([
                raw[DESC_COUNT],
                raw[DESC_COUNT + 1],
                raw[DESC_COUNT + 2],
                raw[DESC_COUNT + 3],
            ]),
        })
    }
}
