//! Byte-level message layer.
//!
//! This module defines the fixed wire format every Ferry message uses: a
//! 20-byte envelope header followed by an ordered sequence of
//! (type descriptor, value) pairs. The layout of each routine's request and
//! reply is pinned down by a static schema table, and every inbound field is
//! validated against that table before its payload is trusted.
//!
//! # Overview
//!
//! The wire layer is deliberately dumb: it knows how to place bytes and how
//! to refuse bytes, nothing else. Routing, handler invocation, and transport
//! concerns live in [`protocol`](crate::protocol).
//!
//! Messages are little-endian throughout. Scalars occupy 4 or 8 bytes after
//! their descriptor; byte arrays carry their element count in the descriptor
//! and are zero-padded to a 4-byte boundary.
//!
//! # Key Components
//!
//! - [`descriptor::TypeDescriptor`]: the compact tag written before every value.
//! - [`header::MessageHeader`]: the message envelope (identifier, size, endpoints).
//! - [`schema::ROUTINES`]: the per-routine field layout table.
//! - [`buffer::MessageWriter`] / [`buffer::MessageReader`]: the codec cursors.
//!
//! # Validation Contract
//!
//! Validation is all-or-nothing. A malformed message is untrusted input: the
//! first field that fails its descriptor check aborts the whole decode with a
//! [`WireError`], and no partially-decoded value is ever handed to a caller.
//!
//! # See Also
//!
//! - [`protocol`](crate::protocol): request/reply types and dispatch built on
//!   this layer.
pub mod buffer;
pub mod descriptor;
pub mod header;
pub mod schema;

use thiserror::Error;

use self::descriptor::TypeCode;

/// Wire-level return code carried as the first field of every reply.
///
/// The numeric values are fixed by the protocol; peers match on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    /// The request identifier did not map to any routine.
    BadId = -303,
    /// The request failed schema validation.
    BadArguments = -304,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Status> {
        match code {
            0 => Some(Status::Ok),
            -303 => Some(Status::BadId),
            -304 => Some(Status::BadArguments),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("message truncated: need {need} more bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("declared size {declared} does not match frame length {actual}")]
    SizeMismatch { declared: u32, actual: usize },

    #[error("{routine} message of {size} bytes does not match its schema (expected {expected})")]
    ShapeSize {
        routine: &'static str,
        size: usize,
        expected: usize,
    },

    #[error("{extra} trailing bytes after the last field")]
    TrailingBytes { extra: usize },

    #[error("unknown type code {0}")]
    UnknownCode(u8),

    #[error("reserved descriptor flag bits 0x{0:04x} set")]
    ReservedBits(u16),

    #[error("field '{field}': expected {expected:?}, found {found:?}")]
    CodeMismatch {
        field: &'static str,
        expected: TypeCode,
        found: TypeCode,
    },

    #[error("field '{field}': element width {found} does not match {expected}")]
    WidthMismatch {
        field: &'static str,
        expected: u8,
        found: u8,
    },

    #[error("field '{field}': expected count {expected}, found {found}")]
    CountMismatch {
        field: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("field '{field}': count {count} exceeds maximum {max}")]
    CountExceeded {
        field: &'static str,
        count: usize,
        max: u32,
    },

    #[error("field '{field}': out-of-line data is not supported")]
    OutOfLine { field: &'static str },

    #[error("field '{field}': ownership transfer is not supported")]
    TransferRefused { field: &'static str },

    #[error("unknown reply status {0}")]
    UnknownStatus(i32),

    #[error("unexpected message identifier {0}")]
    UnexpectedId(i32),
}
