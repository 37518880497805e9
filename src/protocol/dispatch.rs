use std::sync::Arc;

use log::{debug, warn};

use crate::wire::header::MessageHeader;
use crate::wire::{Status, schema};

use super::request::Request;
use super::response::{Reply, encode_rejection};
use super::{AsyncPoll, ErrorCode, FileHandle, OperationId};

/// The application-handler seam.
///
/// Implementations own the file storage, the handle namespace, and the
/// async-operation namespace, and synchronize them internally — the
/// dispatcher may be invoked from several connections at once.
///
/// `read_async` must return as soon as the operation is registered;
/// `poll_async` must never block and must have no side effects while the
/// operation is pending.
pub trait FileService {
    fn open(&self, path: &[u8], flags: u32) -> Result<FileHandle, ErrorCode>;
    fn read(&self, handle: FileHandle, offset: u64, max_bytes: u32) -> Result<Vec<u8>, ErrorCode>;
    fn write(&self, handle: FileHandle, offset: u64, data: &[u8]) -> Result<u32, ErrorCode>;
    fn size(&self, handle: FileHandle) -> Result<u64, ErrorCode>;
    fn close(&self, handle: FileHandle);
    fn read_async(
        &self,
        handle: FileHandle,
        offset: u64,
        max_bytes: u32,
    ) -> Result<OperationId, ErrorCode>;
    fn poll_async(&self, operation: OperationId) -> AsyncPoll;
}

impl<S: FileService + ?Sized> FileService for Arc<S> {
    fn open(&self, path: &[u8], flags: u32) -> Result<FileHandle, ErrorCode> {
        (**self).open(path, flags)
    }

    fn read(&self, handle: FileHandle, offset: u64, max_bytes: u32) -> Result<Vec<u8>, ErrorCode> {
        (**self).read(handle, offset, max_bytes)
    }

    fn write(&self, handle: FileHandle, offset: u64, data: &[u8]) -> Result<u32, ErrorCode> {
        (**self).write(handle, offset, data)
    }

    fn size(&self, handle: FileHandle) -> Result<u64, ErrorCode> {
        (**self).size(handle)
    }

    fn close(&self, handle: FileHandle) {
        (**self).close(handle)
    }

    fn read_async(
        &self,
        handle: FileHandle,
        offset: u64,
        max_bytes: u32,
    ) -> Result<OperationId, ErrorCode> {
        (**self).read_async(handle, offset, max_bytes)
    }

    fn poll_async(&self, operation: OperationId) -> AsyncPoll {
        (**self).poll_async(operation)
    }
}

/// Routes inbound frames to the service and encodes replies.
///
/// The routing table is fixed at build time (see
/// [`schema::ROUTINES`](crate::wire::schema::ROUTINES)); the dispatcher
/// itself holds no mutable state and can be shared across threads.
///
/// Unroutable identifiers are answered with a status-only `BadId` reply and
/// never reach the service; frames that fail validation get `BadArguments`.
/// A handler-reported failure still produces a normal reply, with the code
/// in the error field — the request is never silently dropped.
pub struct Dispatcher<S> {
    service: S,
}

impl<S: FileService> Dispatcher<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Handle one inbound frame. `None` means no reply is to be sent: the
    /// frame was unaddressable, or the routine is fire-and-forget.
    pub fn dispatch(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let header = match MessageHeader::decode(frame) {
            Ok(header) => header,
            Err(e) => {
                warn!("unaddressable frame: {e}");
                return None;
            }
        };

        let Some(spec) = schema::routine(header.id) else {
            warn!("unknown message identifier {}", header.id);
            return Some(encode_rejection(header.reply_to(), Status::BadId));
        };

        let reply_header = header.reply_to();
        let request = match Request::decode(frame) {
            Ok((_, request)) => request,
            Err(e) => {
                warn!("rejecting {} request: {e}", spec.name);
                if spec.is_oneway() {
                    // Nobody is waiting; there is no reply channel to
                    // address a rejection to.
                    return None;
                }
                return Some(encode_rejection(reply_header, Status::BadArguments));
            }
        };

        debug!("dispatching {} request from endpoint {}", spec.name, header.local);
        let reply = match request {
            Request::Open { path, flags } => match self.service.open(&path, flags) {
                Ok(handle) => Reply::Open {
                    handle,
                    error: ErrorCode::OK,
                },
                Err(error) => Reply::Open {
                    handle: FileHandle::NULL,
                    error,
                },
            },
            Request::Read {
                handle,
                offset,
                max_bytes,
            } => match self.service.read(handle, offset, max_bytes) {
                Ok(data) => {
                    let count = data.len() as u32;
                    Reply::Read {
                        data,
                        count,
                        error: ErrorCode::OK,
                    }
                }
                Err(error) => Reply::Read {
                    data: Vec::new(),
                    count: 0,
                    error,
                },
            },
            Request::Write {
                handle,
                offset,
                data,
            } => match self.service.write(handle, offset, &data) {
                Ok(count) => Reply::Write {
                    count,
                    error: ErrorCode::OK,
                },
                Err(error) => Reply::Write { count: 0, error },
            },
            Request::Size { handle } => match self.service.size(handle) {
                Ok(size) => Reply::Size {
                    size,
                    error: ErrorCode::OK,
                },
                Err(error) => Reply::Size { size: 0, error },
            },
            Request::Close { handle } => {
                self.service.close(handle);
                return None;
            }
            Request::ReadAsync {
                handle,
                offset,
                max_bytes,
            } => match self.service.read_async(handle, offset, max_bytes) {
                Ok(operation) => Reply::ReadAsync {
                    operation,
                    error: ErrorCode::OK,
                },
                Err(error) => Reply::ReadAsync {
                    operation: OperationId::NULL,
                    error,
                },
            },
            Request::PollAsync { operation } => match self.service.poll_async(operation) {
                AsyncPoll::Pending => Reply::PollAsync {
                    complete: false,
                    data: Vec::new(),
                    count: 0,
                    error: ErrorCode::OK,
                },
                AsyncPoll::Complete { data, error } => {
                    let count = data.len() as u32;
                    Reply::PollAsync {
                        complete: true,
                        data,
                        count,
                        error,
                    }
                }
            },
        };

        match reply.encode(reply_header) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("failed to encode {} reply: {e}", spec.name);
                Some(encode_rejection(reply_header, Status::BadArguments))
            }
        }
    }
}
