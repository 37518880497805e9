use thiserror::Error;

use crate::wire::header::Endpoint;
use crate::wire::schema::REPLY_OFFSET;
use crate::wire::{Status, WireError};

use super::request::Request;
use super::response::{Reply, ReplyFrame};
use super::transport::{Transport, TransportError};
use super::{AsyncPoll, ErrorCode, FileHandle, OperationId};

/// Why a call failed. The three axes — transport, protocol, application —
/// are kept apart; a caller can always tell whether the exchange broke,
/// the peer refused the frame, or the file operation itself failed.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed reply: {0}")]
    Malformed(#[from] WireError),
    #[error("request rejected by peer: {0:?}")]
    Rejected(Status),
    #[error("file error: {0}")]
    File(ErrorCode),
}

/// Typed client stubs for the seven file routines.
///
/// Every reply-bearing call is one blocking transaction on the transport;
/// no overlapping in-flight requests share a channel. `close` only posts.
pub struct FileClient<T: Transport> {
    transport: T,
    server: Endpoint,
    reply: Endpoint,
}

impl<T: Transport> FileClient<T> {
    pub fn new(transport: T, server: Endpoint, reply: Endpoint) -> Self {
        Self {
            transport,
            server,
            reply,
        }
    }

    fn call(&mut self, request: Request) -> Result<Reply, CallError> {
        let id = request.id();
        let frame = request.encode(self.server, self.reply)?;
        let reply = self.transport.transact(&frame)?;
        match Reply::decode(&reply, id)? {
            ReplyFrame::Rejected(status) => Err(CallError::Rejected(status)),
            ReplyFrame::Returned(reply) => Ok(reply),
        }
    }

    fn check(error: ErrorCode) -> Result<(), CallError> {
        if error.is_ok() {
            Ok(())
        } else {
            Err(CallError::File(error))
        }
    }

    fn wrong_body(reply: &Reply) -> CallError {
        CallError::Malformed(WireError::UnexpectedId(reply.request_id() + REPLY_OFFSET))
    }

    pub fn open(&mut self, path: &[u8], flags: u32) -> Result<FileHandle, CallError> {
        match self.call(Request::Open {
            path: path.to_vec(),
            flags,
        })? {
            Reply::Open { handle, error } => {
                Self::check(error)?;
                Ok(handle)
            }
            other => Err(Self::wrong_body(&other)),
        }
    }

    pub fn read(
        &mut self,
        handle: FileHandle,
        offset: u64,
        max_bytes: u32,
    ) -> Result<Vec<u8>, CallError> {
        match self.call(Request::Read {
            handle,
            offset,
            max_bytes,
        })? {
            Reply::Read { data, error, .. } => {
                Self::check(error)?;
                Ok(data)
            }
            other => Err(Self::wrong_body(&other)),
        }
    }

    pub fn write(
        &mut self,
        handle: FileHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<u32, CallError> {
        match self.call(Request::Write {
            handle,
            offset,
            data: data.to_vec(),
        })? {
            Reply::Write { count, error } => {
                Self::check(error)?;
                Ok(count)
            }
            other => Err(Self::wrong_body(&other)),
        }
    }

    pub fn size(&mut self, handle: FileHandle) -> Result<u64, CallError> {
        match self.call(Request::Size { handle })? {
            Reply::Size { size, error } => {
                Self::check(error)?;
                Ok(size)
            }
            other => Err(Self::wrong_body(&other)),
        }
    }

    /// Fire-and-forget: posts the request and returns once it is sent.
    /// No reply frame exists to wait for.
    pub fn close(&mut self, handle: FileHandle) -> Result<(), CallError> {
        let frame = Request::Close { handle }.encode(self.server, self.reply)?;
        self.transport.post(&frame)?;
        Ok(())
    }

    pub fn read_async(
        &mut self,
        handle: FileHandle,
        offset: u64,
        max_bytes: u32,
    ) -> Result<OperationId, CallError> {
        match self.call(Request::ReadAsync {
            handle,
            offset,
            max_bytes,
        })? {
            Reply::ReadAsync { operation, error } => {
                Self::check(error)?;
                Ok(operation)
            }
            other => Err(Self::wrong_body(&other)),
        }
    }

    /// Non-blocking completion query. A completed-with-failure read is
    /// reported through the `error` field of [`AsyncPoll::Complete`], not as
    /// a call failure — polling loops always see a terminal state.
    pub fn poll_async(&mut self, operation: OperationId) -> Result<AsyncPoll, CallError> {
        match self.call(Request::PollAsync { operation })? {
            Reply::PollAsync {
                complete,
                data,
                error,
                ..
            } => {
                if complete {
                    Ok(AsyncPoll::Complete { data, error })
                } else {
                    Ok(AsyncPoll::Pending)
                }
            }
            other => Err(Self::wrong_body(&other)),
        }
    }
}
