use crate::wire::descriptor::{DESCRIPTOR_LEN, TypeCode};
use crate::wire::buffer::{MessageReader, MessageWriter};
use crate::wire::header::{HEADER_LEN, MessageHeader};
use crate::wire::schema::{
    self, Arity, FieldSpec, REPLY_OFFSET, REQUEST_BASE, RoutineSpec, body_is_fixed, body_min_len,
};
use crate::wire::{Status, WireError};

use super::{ErrorCode, FileHandle, OperationId};

/// Every reply body is preceded by a wire status field.
const STATUS_FIELD: FieldSpec = FieldSpec {
    name: "status",
    code: TypeCode::Integer32,
    arity: Arity::Scalar,
};

const STATUS_FIELD_LEN: usize = DESCRIPTOR_LEN + 4;

/// Typed reply bodies, one variant per reply-bearing routine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Open {
        handle: FileHandle,
        error: ErrorCode,
    },
    Read {
        data: Vec<u8>,
        count: u32,
        error: ErrorCode,
    },
    Write {
        count: u32,
        error: ErrorCode,
    },
    Size {
        size: u64,
        error: ErrorCode,
    },
    ReadAsync {
        operation: OperationId,
        error: ErrorCode,
    },
    PollAsync {
        complete: bool,
        data: Vec<u8>,
        count: u32,
        error: ErrorCode,
    },
}

/// A decoded reply frame: either a wire-level rejection or a returned body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyFrame {
    Rejected(Status),
    Returned(Reply),
}

impl Reply {
    fn offset(&self) -> usize {
        match self {
            Reply::Open { .. } => 0,
            Reply::Read { .. } => 1,
            Reply::Write { .. } => 2,
            Reply::Size { .. } => 3,
            Reply::ReadAsync { .. } => 5,
            Reply::PollAsync { .. } => 6,
        }
    }

    pub(crate) fn request_id(&self) -> i32 {
        REQUEST_BASE + self.offset() as i32
    }

    fn routine(&self) -> &'static RoutineSpec {
        &schema::ROUTINES[self.offset()]
    }

    /// Encode this body behind `header` with status `Ok`.
    pub fn encode(&self, header: MessageHeader) -> Result<Vec<u8>, WireError> {
        let mut writer = MessageWriter::new(header);
        writer.put_i32(&STATUS_FIELD, Status::Ok.code());

        let fields = self
            .routine()
            .reply
            .ok_or(WireError::UnexpectedId(self.request_id()))?;

        match self {
            Reply::Open { handle, error } => {
                writer.put_u64(&fields[0], handle.0);
                writer.put_i32(&fields[1], error.raw());
            }
            Reply::Read { data, count, error } => {
                writer.put_bytes(&fields[0], data)?;
                writer.put_u32(&fields[1], *count);
                writer.put_i32(&fields[2], error.raw());
            }
            Reply::Write { count, error } => {
                writer.put_u32(&fields[0], *count);
                writer.put_i32(&fields[1], error.raw());
            }
            Reply::Size { size, error } => {
                writer.put_u64(&fields[0], *size);
                writer.put_i32(&fields[1], error.raw());
            }
            Reply::ReadAsync { operation, error } => {
                writer.put_u64(&fields[0], operation.0);
                writer.put_i32(&fields[1], error.raw());
            }
            Reply::PollAsync {
                complete,
                data,
                count,
                error,
            } => {
                writer.put_u32(&fields[0], u32::from(*complete));
                writer.put_bytes(&fields[1], data)?;
                writer.put_u32(&fields[2], *count);
                writer.put_i32(&fields[3], error.raw());
            }
        }

        Ok(writer.finish())
    }

    /// Validate and decode a reply to `request_id`.
    ///
    /// The identifier must honour the fixed `request id + 100` convention.
    /// A non-`Ok` status ends the frame after the status field.
    pub fn decode(frame: &[u8], request_id: i32) -> Result<ReplyFrame, WireError> {
        let (header, mut reader) = MessageReader::new(frame)?;
        if header.id != request_id + REPLY_OFFSET {
            return Err(WireError::UnexpectedId(header.id));
        }

        let raw_status = reader.read_i32(&STATUS_FIELD)?;
        let status = Status::from_code(raw_status).ok_or(WireError::UnknownStatus(raw_status))?;
        if status != Status::Ok {
            // Rejections are status-only frames; they need no routine schema
            // and may answer identifiers no routine claims.
            reader.finish()?;
            return Ok(ReplyFrame::Rejected(status));
        }

        let spec = schema::routine(request_id).ok_or(WireError::UnexpectedId(request_id))?;
        let fields = spec.reply.ok_or(WireError::UnexpectedId(request_id))?;

        let expected = HEADER_LEN + STATUS_FIELD_LEN + body_min_len(fields);
        if body_is_fixed(fields) {
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

        let reply = match request_id - REQUEST_BASE {
            0 => Reply::Open {
                handle: FileHandle(reader.read_u64(&fields[0])?),
                error: ErrorCode::from_raw(reader.read_i32(&fields[1])?),
            },
            1 => Reply::Read {
                data: reader.read_bytes(&fields[0])?,
                count: reader.read_u32(&fields[1])?,
                error: ErrorCode::from_raw(reader.read_i32(&fields[2])?),
            },
            2 => Reply::Write {
                count: reader.read_u32(&fields[0])?,
                error: ErrorCode::from_raw(reader.read_i32(&fields[1])?),
            },
            3 => Reply::Size {
                size: reader.read_u64(&fields[0])?,
                error: ErrorCode::from_raw(reader.read_i32(&fields[1])?),
            },
            5 => Reply::ReadAsync {
                operation: OperationId(reader.read_u64(&fields[0])?),
                error: ErrorCode::from_raw(reader.read_i32(&fields[1])?),
            },
            6 => Reply::PollAsync {
                complete: reader.read_u32(&fields[0])? != 0,
                data: reader.read_bytes(&fields[1])?,
                count: reader.read_u32(&fields[2])?,
                error: ErrorCode::from_raw(reader.read_i32(&fields[3])?),
            },
            _ => return Err(WireError::UnexpectedId(request_id)),
        };

        reader.finish()?;
        Ok(ReplyFrame::Returned(reply))
    }
}

/// A status-only reply: how protocol failures are answered.
pub fn encode_rejection(header: MessageHeader, status: Status) -> Vec<u8> {
    let mut writer = MessageWriter::new(header);
    writer.put_i32(&STATUS_FIELD, status.code());
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::header::Endpoint;

    fn reply_header(request_id: i32) -> MessageHeader {
        MessageHeader::request(Endpoint(200), Endpoint(7), request_id).reply_to()
    }

    fn round_trip(reply: Reply) {
        let request_id = reply.request_id();
        let frame = reply.encode(reply_header(request_id)).unwrap();
        let decoded = Reply::decode(&frame, request_id).unwrap();
        assert_eq!(decoded, ReplyFrame::Returned(reply));
    }

    #[test]
    fn every_reply_round_trips() {
        round_trip(Reply::Open {
            handle: FileHandle(42),
            error: ErrorCode::OK,
        });
        round_trip(Reply::Read {
            data: b"contents".to_vec(),
            count: 8,
            error: ErrorCode::OK,
        });
        round_trip(Reply::Write {
            count: 512,
            error: ErrorCode::OK,
        });
        round_trip(Reply::Size {
            size: u64::MAX,
            error: ErrorCode::OK,
        });
        round_trip(Reply::ReadAsync {
            operation: OperationId(3),
            error: ErrorCode::OK,
        });
        round_trip(Reply::PollAsync {
            complete: true,
            data: b"async".to_vec(),
            count: 5,
            error: ErrorCode::OK,
        });
    }

    #[test]
    fn application_errors_ride_in_the_body() {
        round_trip(Reply::Open {
            handle: FileHandle::NULL,
            error: ErrorCode::NOT_FOUND,
        });
        round_trip(Reply::PollAsync {
            complete: true,
            data: Vec::new(),
            count: 0,
            error: ErrorCode::BAD_HANDLE,
        });
    }

    #[test]
    fn rejection_frames_carry_only_status() {
        let frame = encode_rejection(reply_header(5001), Status::BadArguments);
        assert_eq!(frame.len(), HEADER_LEN + STATUS_FIELD_LEN);
        assert_eq!(
            Reply::decode(&frame, 5001).unwrap(),
            ReplyFrame::Rejected(Status::BadArguments)
        );
    }

    #[test]
    fn reply_identifier_convention_enforced() {
        let frame = Reply::Size {
            size: 9,
            error: ErrorCode::OK,
        }
        .encode(reply_header(5003))
        .unwrap();

        // Decoding against the wrong request id fails before any field.
        assert!(matches!(
            Reply::decode(&frame, 5001),
            Err(WireError::UnexpectedId(5103))
        ));
    }

    #[test]
    fn unknown_status_rejected() {
        let mut writer = MessageWriter::new(reply_header(5003));
        writer.put_i32(&STATUS_FIELD, -999);
        let frame = writer.finish();

        assert!(matches!(
            Reply::decode(&frame, 5003),
            Err(WireError::UnknownStatus(-999))
        ));
    }
}
