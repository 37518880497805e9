use crate::wire::WireError;
use crate::wire::buffer::{MessageReader, MessageWriter};
use crate::wire::header::{Endpoint, HEADER_LEN, MessageHeader};
use crate::wire::schema::{self, REQUEST_BASE, RoutineSpec, body_is_fixed, body_min_len};

use super::{FileHandle, OperationId};

/// One variant per routine, keyed by the message identifier. Path and data
/// are owned, length-checked buffers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Open {
        path: Vec<u8>,
        flags: u32,
    },
    Read {
        handle: FileHandle,
        offset: u64,
        max_bytes: u32,
    },
    Write {
        handle: FileHandle,
        offset: u64,
        data: Vec<u8>,
    },
    Size {
        handle: FileHandle,
    },
    Close {
        handle: FileHandle,
    },
    ReadAsync {
        handle: FileHandle,
        offset: u64,
        max_bytes: u32,
    },
    PollAsync {
        operation: OperationId,
    },
}

impl Request {
    fn offset(&self) -> usize {
        match self {
            Request::Open { .. } => 0,
            Request::Read { .. } => 1,
            Request::Write { .. } => 2,
            Request::Size { .. } => 3,
            Request::Close { .. } => 4,
            Request::ReadAsync { .. } => 5,
            Request::PollAsync { .. } => 6,
        }
    }

    pub fn id(&self) -> i32 {
        REQUEST_BASE + self.offset() as i32
    }

    pub fn routine(&self) -> &'static RoutineSpec {
        &schema::ROUTINES[self.offset()]
    }

    /// Encode a complete request frame addressed to `server`, with the
    /// reply expected on `reply`.
    pub fn encode(&self, server: Endpoint, reply: Endpoint) -> Result<Vec<u8>, WireError> {
        let mut writer = MessageWriter::new(MessageHeader::request(server, reply, self.id()));
        let fields = self.routine().request;

        match self {
            Request::Open { path, flags } => {
                writer.put_bytes(&fields[0], path)?;
                writer.put_u32(&fields[1], *flags);
            }
            Request::Read {
                handle,
                offset,
                max_bytes,
            }
            | Request::ReadAsync {
                handle,
                offset,
                max_bytes,
            } => {
                writer.put_u64(&fields[0], handle.0);
                writer.put_u64(&fields[1], *offset);
                writer.put_u32(&fields[2], *max_bytes);
            }
            Request::Write {
                handle,
                offset,
                data,
            } => {
                writer.put_u64(&fields[0], handle.0);
                writer.put_u64(&fields[1], *offset);
                writer.put_bytes(&fields[2], data)?;
            }
            Request::Size { handle } | Request::Close { handle } => {
                writer.put_u64(&fields[0], handle.0);
            }
            Request::PollAsync { operation } => {
                writer.put_u64(&fields[0], operation.0);
            }
        }

        Ok(writer.finish())
    }

    /// Validate and decode an inbound request frame.
    ///
    /// The declared size is held against the routine's schema before any
    /// field is interpreted; the field walk then re-checks every descriptor
    /// in order.
    pub fn decode(frame: &[u8]) -> Result<(MessageHeader, Request), WireError> {
        let (header, mut reader) = MessageReader::new(frame)?;
        let spec = schema::routine(header.id).ok_or(WireError::UnexpectedId(header.id))?;

        let expected = HEADER_LEN + body_min_len(spec.request);
        if body_is_fixed(spec.request) {
            if frame.len() != expected {
                return Err(WireError::ShapeSize {
                    routine: spec.name,
                    size: frame.len(),
                    expected,
                });
            }
        } else if frame.len() < expected {
            return Err(WireError::ShapeSize {
                routine: spec.name,
                size: frame.len(),
                expected,
            });
        }

        let fields = spec.request;
        let request = match header.id - REQUEST_BASE {
            0 => Request::Open {
                path: reader.read_bytes(&fields[0])?,
                flags: reader.read_u32(&fields[1])?,
            },
            1 => Request::Read {
                handle: FileHandle(reader.read_u64(&fields[0])?),
                offset: reader.read_u64(&fields[1])?,
                max_bytes: reader.read_u32(&fields[2])?,
            },
            2 => Request::Write {
                handle: FileHandle(reader.read_u64(&fields[0])?),
                offset: reader.read_u64(&fields[1])?,
                data: reader.read_bytes(&fields[2])?,
            },
            3 => Request::Size {
                handle: FileHandle(reader.read_u64(&fields[0])?),
            },
            4 => Request::Close {
                handle: FileHandle(reader.read_u64(&fields[0])?),
            },
            5 => Request::ReadAsync {
                handle: FileHandle(reader.read_u64(&fields[0])?),
                offset: reader.read_u64(&fields[1])?,
                max_bytes: reader.read_u32(&fields[2])?,
            },
            6 => Request::PollAsync {
                operation: OperationId(reader.read_u64(&fields[0])?),
            },
            _ => return Err(WireError::UnexpectedId(header.id)),
        };

        reader.finish()?;
        Ok((header, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::header::HDR_SIZE;
    use crate::wire::schema::{DATA_MAX, PATH_MAX};

    fn round_trip(request: Request) -> MessageHeader {
        let frame = request.encode(Endpoint(200), Endpoint(7)).unwrap();
        let (header, decoded) = Request::decode(&frame).unwrap();
        assert_eq!(decoded, request);
        header
    }

    #[test]
    fn every_routine_round_trips() {
        let handle = FileHandle(42);
        let header = round_trip(Request::Open {
            path: b"/hello.txt".to_vec(),
            flags: 0o102,
        });
        assert_eq!(header.id, 5000);
        assert_eq!(header.remote, Endpoint(200));
        assert_eq!(header.local, Endpoint(7));

        round_trip(Request::Read {
            handle,
            offset: 1024,
            max_bytes: 4096,
        });
        round_trip(Request::Write {
            handle,
            offset: 0,
            data: b"payload".to_vec(),
        });
        round_trip(Request::Size { handle });
        round_trip(Request::Close { handle });
        round_trip(Request::ReadAsync {
            handle,
            offset: u64::MAX,
            max_bytes: u32::MAX,
        });
        round_trip(Request::PollAsync {
            operation: OperationId(9),
        });
    }

    #[test]
    fn identifiers_follow_the_routine_order() {
        assert_eq!(
            Request::Open {
                path: vec![],
                flags: 0
            }
            .id(),
            5000
        );
        assert_eq!(Request::Close { handle: FileHandle(1) }.id(), 5004);
        assert_eq!(
            Request::PollAsync {
                operation: OperationId(1)
            }
            .id(),
            5006
        );
    }

    #[test]
    fn path_bounds_are_exact() {
        let at_max = Request::Open {
            path: vec![b'a'; PATH_MAX as usize],
            flags: 0,
        };
        round_trip(at_max);

        let over = Request::Open {
            path: vec![b'a'; PATH_MAX as usize + 1],
            flags: 0,
        };
        assert!(matches!(
            over.encode(Endpoint(1), Endpoint(2)),
            Err(WireError::CountExceeded {
                field: "path",
                max: PATH_MAX,
                ..
            })
        ));
    }

    #[test]
    fn data_bounds_are_exact() {
        let at_max = Request::Write {
            handle: FileHandle(1),
            offset: 0,
            data: vec![0u8; DATA_MAX as usize],
        };
        round_trip(at_max);

        let over = Request::Write {
            handle: FileHandle(1),
            offset: 0,
            data: vec![0u8; DATA_MAX as usize + 1],
        };
        assert!(matches!(
            over.encode(Endpoint(1), Endpoint(2)),
            Err(WireError::CountExceeded {
                field: "data",
                max: DATA_MAX,
                ..
            })
        ));
    }

    #[test]
    fn unknown_identifier_rejected() {
        let mut frame = Request::Size {
            handle: FileHandle(1),
        }
        .encode(Endpoint(1), Endpoint(2))
        .unwrap();
        frame[16] = 0x0F;
        frame[17] = 0x27; // id 9999
        assert!(matches!(
            Request::decode(&frame),
            Err(WireError::UnexpectedId(9999))
        ));
    }

    #[test]
    fn wrong_size_rejected_before_fields() {
        // A size request padded with extra bytes: the declared size is
        // consistent with the frame but not with the routine's shape.
        let mut frame = Request::Size {
            handle: FileHandle(1),
        }
        .encode(Endpoint(1), Endpoint(2))
        .unwrap();
        frame.extend_from_slice(&[0u8; 4]);
        let declared = (frame.len() as u32).to_le_bytes();
        frame[HDR_SIZE..HDR_SIZE + 4].copy_from_slice(&declared);

        assert!(matches!(
            Request::decode(&frame),
            Err(WireError::ShapeSize {
                routine: "size",
                ..
            })
        ));
    }

    #[test]
    fn oversized_path_count_rejected_on_decode() {
        let mut frame = Request::Open {
            path: vec![b'a'; PATH_MAX as usize],
            flags: 0,
        }
        .encode(Endpoint(1), Endpoint(2))
        .unwrap();
        // Bump the path descriptor's count past the maximum: 4097.
        let count_at = HEADER_LEN + 4;
        frame[count_at..count_at + 4].copy_from_slice(&4097u32.to_le_bytes());

        assert!(matches!(
            Request::decode(&frame),
            Err(WireError::CountExceeded {
                field: "path",
                count: 4097,
                max: PATH_MAX,
            })
        ));
    }
}
