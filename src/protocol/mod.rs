//! Client-server file access protocol.
//!
//! This module defines the request/reply protocol spoken between Ferry
//! clients and file servers: typed request and reply messages, the transport
//! abstraction that carries them, the client stubs, and the server-side
//! dispatcher that routes inbound frames to an application handler.
//!
//! # Overview
//!
//! Seven routines make up the service: `open`, `read`, `write`, `size`,
//! `close`, and the asynchronous pair `read_async`/`poll_async`. Each call
//! is one synchronous transaction — the client encodes a request frame,
//! blocks on send-then-receive, and decodes the reply. `close` is the one
//! exception: it is fire-and-forget and never produces a reply frame.
//!
//! On the server side every inbound frame is validated against the routine's
//! schema before the handler runs; malformed frames are answered with a
//! status-only rejection and never reach application code.
//!
//! # Failure Axes
//!
//! Three kinds of failure are kept apart and never collapsed:
//!
//! - transport failure: the exchange itself did not complete
//!   ([`TransportError`]);
//! - protocol failure: the frame was malformed or unroutable, reported as a
//!   wire-level [`Status`](crate::wire::Status) rejection;
//! - application failure: the handler ran and reported an [`ErrorCode`] in
//!   the reply body.
//!
//! # Asynchronous Reads
//!
//! `read_async` registers a read and returns an opaque [`OperationId`]
//! immediately; `poll_async` observes the operation's `Pending → Complete`
//! state without ever blocking. The state itself is owned by the handler —
//! this layer only carries the identifier and the observed state across the
//! wire.
//!
//! # See Also
//!
//! - [`wire`](crate::wire): descriptor and envelope layout underneath this
//!   module.
//! - [`store`](crate::store): the reference in-memory handler.
mod client;
mod dispatch;
mod request;
mod response;
mod server;
mod thread;
mod transport;

use std::fmt;

pub use client::{CallError, FileClient};
pub use dispatch::{Dispatcher, FileService};
pub use request::Request;
pub use response::{Reply, ReplyFrame};
pub use server::FileServer;
pub use transport::{MAX_FRAME_LEN, StreamTransport, Transport, TransportError, read_frame};

use crate::wire::header::Endpoint;

/// Well-known endpoint name the file server answers on.
pub const SERVER_ENDPOINT: Endpoint = Endpoint(200);

/// Opaque name for an open file on the server. Created by `open`, consumed
/// by the other routines; this layer never interprets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileHandle(pub u64);

impl FileHandle {
    pub const NULL: FileHandle = FileHandle(0);
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque name for a pending or completed asynchronous read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub u64);

impl OperationId {
    pub const NULL: OperationId = OperationId(0);
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application-level status carried as an explicit reply field. Distinct
/// from transport and protocol status by design.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode(i32);

impl ErrorCode {
    pub const OK: ErrorCode = ErrorCode(0);
    pub const NOT_FOUND: ErrorCode = ErrorCode(-2);
    pub const BAD_HANDLE: ErrorCode = ErrorCode(-9);
    pub const ACCESS: ErrorCode = ErrorCode(-13);
    pub const IS_DIRECTORY: ErrorCode = ErrorCode(-21);
    pub const INVALID: ErrorCode = ErrorCode(-22);

    pub fn from_raw(code: i32) -> ErrorCode {
        ErrorCode(code)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorCode::OK => write!(f, "ok"),
            ErrorCode::NOT_FOUND => write!(f, "not found"),
            ErrorCode::BAD_HANDLE => write!(f, "bad handle"),
            ErrorCode::ACCESS => write!(f, "access denied"),
            ErrorCode::IS_DIRECTORY => write!(f, "is a directory"),
            ErrorCode::INVALID => write!(f, "invalid argument"),
            ErrorCode(code) => write!(f, "error {code}"),
        }
    }
}

/// Observed state of an asynchronous read.
///
/// A failed read still resolves to `Complete`, with empty data and the
/// failure in `error`, so polling loops always terminate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsyncPoll {
    Pending,
    Complete { data: Vec<u8>, error: ErrorCode },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_survive_the_wire_representation() {
        for code in [
            ErrorCode::OK,
            ErrorCode::NOT_FOUND,
            ErrorCode::BAD_HANDLE,
            ErrorCode::ACCESS,
            ErrorCode::IS_DIRECTORY,
            ErrorCode::INVALID,
        ] {
            assert_eq!(ErrorCode::from_raw(code.raw()), code);
        }
        assert!(ErrorCode::OK.is_ok());
        assert!(!ErrorCode::NOT_FOUND.is_ok());
    }

    #[test]
    fn error_codes_render_for_humans() {
        assert_eq!(ErrorCode::NOT_FOUND.to_string(), "not found");
        assert_eq!(ErrorCode::from_raw(-99).to_string(), "error -99");
    }
}
