use std::io::{self, Read, Write};

use log::trace;
use thiserror::Error;

use crate::wire::header::{HDR_SIZE, HEADER_LEN};

/// Upper bound on any frame this transport will read. Comfortably above the
/// largest legal message, a poll_async reply carrying the 1 MiB data
/// maximum.
pub const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),
    #[error("declared frame size {size} outside [{min}, {max}]")]
    FrameSize { size: usize, min: usize, max: usize },
}

/// One logical channel to a peer.
///
/// The transport value is passed explicitly through every call; there is no
/// process-wide default reply channel. Delivery guarantees, timeouts, and
/// reconnection are the implementation's business — this layer assumes at
/// most one reply per request and nothing more.
pub trait Transport {
    /// One blocking send-then-receive transaction.
    fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// One-way send, for fire-and-forget routines.
    fn post(&mut self, request: &[u8]) -> Result<(), TransportError>;
}

/// Transport over any bidirectional byte stream (TCP, pipes, an in-memory
/// cursor in tests). Frames are delimited by the declared size in the
/// envelope header.
pub struct StreamTransport<T: Read + Write> {
    stream: T,
}

impl<T: Read + Write> StreamTransport<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }
}

impl<T: Read + Write> Transport for StreamTransport<T> {
    fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.post(request)?;
        read_frame(&mut self.stream)
    }

    fn post(&mut self, request: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(request)?;
        self.stream.flush()?;
        Ok(())
    }
}

/// Read one size-delimited frame from a stream.
///
/// The declared size is bounds-checked before the body is read, so a
/// corrupt or hostile peer cannot make us allocate past [`MAX_FRAME_LEN`].
pub fn read_frame<R: Read>(stream: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut head = [0u8; HEADER_LEN];
    stream.read_exact(&mut head)?;

    let size = u32::from_le_bytes([
        head[HDR_SIZE],
        head[HDR_SIZE + 1],
        head[HDR_SIZE + 2],
        head[HDR_SIZE + 3],
    ]) as usize;
    if !(HEADER_LEN..=MAX_FRAME_LEN).contains(&size) {
        return Err(TransportError::FrameSize {
            size,
            min: HEADER_LEN,
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = vec![0u8; size];
    frame[..HEADER_LEN].copy_from_slice(&head);
    stream.read_exact(&mut frame[HEADER_LEN..])?;
    trace!("read {size}-byte frame");
    Ok(frame)
}
