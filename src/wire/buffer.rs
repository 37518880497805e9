//! Codec cursors over message frames.
//!
//! [`MessageWriter`] appends (descriptor, value) pairs behind an envelope
//! header and patches the total size in on finish. [`MessageReader`] is its
//! inverse: a bounds-checked cursor that validates every descriptor against
//! the expected [`FieldSpec`] before touching the payload behind it.
//!
//! Validation here is all-or-nothing. The first field that fails its check
//! poisons the whole frame; callers get a [`WireError`] and no values.
use log::trace;

use super::WireError;
use super::descriptor::{DESCRIPTOR_LEN, TypeDescriptor};
use super::header::{HDR_SIZE, HEADER_LEN, MessageHeader};
use super::schema::{Arity, FieldSpec};

/// Values are aligned to 4-byte boundaries; byte arrays are zero-padded.
fn align4(len: usize) -> usize {
    (len + 3) & !3
}

pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new(header: MessageHeader) -> MessageWriter {
        let mut buf = Vec::with_capacity(HEADER_LEN + 64);
        header.encode_into(&mut buf);
        MessageWriter { buf }
    }

    fn put_descriptor(&mut self, descriptor: TypeDescriptor) {
        descriptor.encode_into(&mut self.buf);
    }

    pub fn put_u32(&mut self, field: &FieldSpec, value: u32) {
        self.put_descriptor(TypeDescriptor::scalar(field.code));
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, field: &FieldSpec, value: i32) {
        self.put_u32(field, value as u32);
    }

    pub fn put_u64(&mut self, field: &FieldSpec, value: u64) {
        self.put_descriptor(TypeDescriptor::scalar(field.code));
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a variable-length byte array. Exceeding the field's declared
    /// maximum is a hard error, not a truncation.
    pub fn put_bytes(&mut self, field: &FieldSpec, data: &[u8]) -> Result<(), WireError> {
        let max = match field.arity {
            Arity::Variable { max } => max,
            Arity::Scalar => 1,
        };
        if data.len() as u64 > max as u64 {
            return Err(WireError::CountExceeded {
                field: field.name,
                count: data.len(),
                max,
            });
        }

        self.put_descriptor(TypeDescriptor::array(field.code, data.len() as u32));
        self.buf.extend_from_slice(data);
        for _ in data.len()..align4(data.len()) {
            self.buf.push(0);
        }
        Ok(())
    }

    /// Patch the total size into the header and hand back the frame.
    pub fn finish(mut self) -> Vec<u8> {
        let size = (self.buf.len() as u32).to_le_bytes();
        self.buf[HDR_SIZE..HDR_SIZE + 4].copy_from_slice(&size);
        self.buf
    }
}

pub struct MessageReader<'a> {
    frame: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    /// Parse the envelope and position the cursor on the first field. The
    /// declared size must equal the frame length exactly.
    pub fn new(frame: &'a [u8]) -> Result<(MessageHeader, MessageReader<'a>), WireError> {
        let header = MessageHeader::decode(frame)?;
        if header.size as usize != frame.len() {
            return Err(WireError::SizeMismatch {
                declared: header.size,
                actual: frame.len(),
            });
        }

        Ok((
            header,
            MessageReader {
                frame,
                pos: HEADER_LEN,
            },
        ))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let have = self.frame.len() - self.pos;
        if have < len {
            return Err(WireError::Truncated { need: len, have });
        }
        let raw = &self.frame[self.pos..self.pos + len];
        self.pos += len;
        Ok(raw)
    }

    /// Decode the next descriptor and hold it against the expected field:
    /// type code, element width, count, inline locality, no ownership
    /// transfer — in that order, first violation wins.
    fn read_descriptor(&mut self, field: &FieldSpec) -> Result<TypeDescriptor, WireError> {
        let descriptor = TypeDescriptor::decode(self.take(DESCRIPTOR_LEN)?)?;

        if descriptor.code != field.code {
            return Err(WireError::CodeMismatch {
                field: field.name,
                expected: field.code,
                found: descriptor.code,
            });
        }
        if descriptor.bits != field.code.bits() {
            return Err(WireError::WidthMismatch {
                field: field.name,
                expected: field.code.bits(),
                found: descriptor.bits,
            });
        }
        if !descriptor.inline {
            return Err(WireError::OutOfLine { field: field.name });
        }
        if descriptor.transfer {
            return Err(WireError::TransferRefused { field: field.name });
        }
        match field.arity {
            Arity::Scalar => {
                if descriptor.count != 1 {
                    return Err(WireError::CountMismatch {
                        field: field.name,
                        expected: 1,
                        found: descriptor.count,
                    });
                }
            }
            Arity::Variable { max } => {
                if descriptor.count > max {
                    return Err(WireError::CountExceeded {
                        field: field.name,
                        count: descriptor.count as usize,
                        max,
                    });
                }
            }
        }

        trace!("field '{}': {} elements", field.name, descriptor.count);
        Ok(descriptor)
    }

    pub fn read_u32(&mut self, field: &FieldSpec) -> Result<u32, WireError> {
        self.read_descriptor(field)?;
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn read_i32(&mut self, field: &FieldSpec) -> Result<i32, WireError> {
        Ok(self.read_u32(field)? as i32)
    }

    pub fn read_u64(&mut self, field: &FieldSpec) -> Result<u64, WireError> {
        self.read_descriptor(field)?;
        let raw = self.take(8)?;
        Ok(u64::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ]))
    }

    pub fn read_bytes(&mut self, field: &FieldSpec) -> Result<Vec<u8>, WireError> {
        let descriptor = self.read_descriptor(field)?;
        let len = descriptor.count as usize;
        let raw = self.take(align4(len))?;
        Ok(raw[..len].to_vec())
    }

    /// The schema walk must land exactly on the end of the frame.
    pub fn finish(self) -> Result<(), WireError> {
        let extra = self.frame.len() - self.pos;
        if extra != 0 {
            return Err(WireError::TrailingBytes { extra });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::descriptor::{DESC_COUNT, DESC_FLAGS, TypeCode};
    use crate::wire::header::Endpoint;
    use crate::wire::schema::{Arity, FieldSpec};

    const HANDLE: FieldSpec = FieldSpec {
        name: "handle",
        code: TypeCode::Integer64,
        arity: Arity::Scalar,
    };
    const FLAGS: FieldSpec = FieldSpec {
        name: "flags",
        code: TypeCode::Integer32,
        arity: Arity::Scalar,
    };
    const DATA: FieldSpec = FieldSpec {
        name: "data",
        code: TypeCode::Byte,
        arity: Arity::Variable { max: 16 },
    };

    fn frame(build: impl FnOnce(&mut MessageWriter)) -> Vec<u8> {
        let mut writer = MessageWriter::new(MessageHeader::request(Endpoint(1), Endpoint(2), 5000));
        build(&mut writer);
        writer.finish()
    }

    #[test]
    fn mixed_fields_round_trip() {
        let frame = frame(|w| {
            w.put_u64(&HANDLE, 42);
            w.put_bytes(&DATA, b"hello").unwrap();
            w.put_u32(&FLAGS, 7);
        });

        let (header, mut reader) = MessageReader::new(&frame).unwrap();
        assert_eq!(header.size as usize, frame.len());
        assert_eq!(reader.read_u64(&HANDLE).unwrap(), 42);
        assert_eq!(reader.read_bytes(&DATA).unwrap(), b"hello");
        assert_eq!(reader.read_u32(&FLAGS).unwrap(), 7);
        reader.finish().unwrap();
    }

    #[test]
    fn arrays_pad_to_four_bytes() {
        let frame = frame(|w| w.put_bytes(&DATA, b"abcde").unwrap());
        // header + descriptor + 5 bytes padded to 8.
        assert_eq!(frame.len(), HEADER_LEN + DESCRIPTOR_LEN + 8);
    }

    #[test]
    fn empty_array_is_legal() {
        let frame = frame(|w| w.put_bytes(&DATA, b"").unwrap());
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        assert_eq!(reader.read_bytes(&DATA).unwrap(), Vec::<u8>::new());
        reader.finish().unwrap();
    }

    #[test]
    fn encode_rejects_oversized_arrays() {
        let mut writer = MessageWriter::new(MessageHeader::request(Endpoint(1), Endpoint(2), 5000));
        let err = writer.put_bytes(&DATA, &[0u8; 17]).unwrap_err();
        assert!(matches!(
            err,
            WireError::CountExceeded {
                field: "data",
                count: 17,
                max: 16
            }
        ));
    }

    #[test]
    fn declared_size_must_match_frame_length() {
        let mut frame = frame(|w| w.put_u32(&FLAGS, 1));
        frame[HDR_SIZE] ^= 0x01;
        assert!(matches!(
            MessageReader::new(&frame),
            Err(WireError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn wrong_code_rejected() {
        let frame = frame(|w| w.put_u32(&FLAGS, 1));
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        assert!(matches!(
            reader.read_u64(&HANDLE),
            Err(WireError::CodeMismatch { field: "handle", .. })
        ));
    }

    #[test]
    fn wrong_width_rejected() {
        let mut frame = frame(|w| w.put_u32(&FLAGS, 1));
        frame[HEADER_LEN + 1] = 64;
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        assert!(matches!(
            reader.read_u32(&FLAGS),
            Err(WireError::WidthMismatch { field: "flags", .. })
        ));
    }

    #[test]
    fn wrong_scalar_count_rejected() {
        let mut frame = frame(|w| w.put_u32(&FLAGS, 1));
        frame[HEADER_LEN + DESC_COUNT] = 2;
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        assert!(matches!(
            reader.read_u32(&FLAGS),
            Err(WireError::CountMismatch {
                field: "flags",
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn out_of_line_rejected() {
        let mut frame = frame(|w| w.put_bytes(&DATA, b"ok").unwrap());
        // Clear the inline bit; the frame is otherwise well-formed.
        frame[HEADER_LEN + DESC_FLAGS] &= !0b01;
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        assert!(matches!(
            reader.read_bytes(&DATA),
            Err(WireError::OutOfLine { field: "data" })
        ));
    }

    #[test]
    fn ownership_transfer_rejected() {
        let mut frame = frame(|w| w.put_bytes(&DATA, b"ok").unwrap());
        frame[HEADER_LEN + DESC_FLAGS] |= 0b10;
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        assert!(matches!(
            reader.read_bytes(&DATA),
            Err(WireError::TransferRefused { field: "data" })
        ));
    }

    #[test]
    fn count_over_maximum_rejected() {
        let mut frame = frame(|w| w.put_bytes(&DATA, &[0u8; 16]).unwrap());
        frame[HEADER_LEN + DESC_COUNT] = 17;
        // Keep the declared size consistent so only the count check fires.
        let fixed = (frame.len() as u32).to_le_bytes();
        frame[HDR_SIZE..HDR_SIZE + 4].copy_from_slice(&fixed);
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        assert!(matches!(
            reader.read_bytes(&DATA),
            Err(WireError::CountExceeded {
                field: "data",
                count: 17,
                max: 16
            })
        ));
    }

    #[test]
    fn count_at_maximum_accepted() {
        let frame = frame(|w| w.put_bytes(&DATA, &[7u8; 16]).unwrap());
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        assert_eq!(reader.read_bytes(&DATA).unwrap(), vec![7u8; 16]);
    }

    #[test]
    fn truncated_payload_rejected() {
        let full = frame(|w| w.put_u64(&HANDLE, 1));
        let mut short = full[..full.len() - 4].to_vec();
        let fixed = (short.len() as u32).to_le_bytes();
        short[HDR_SIZE..HDR_SIZE + 4].copy_from_slice(&fixed);
        let (_, mut reader) = MessageReader::new(&short).unwrap();
        assert!(matches!(
            reader.read_u64(&HANDLE),
            Err(WireError::Truncated { need: 8, have: 4 })
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let frame = frame(|w| {
            w.put_u32(&FLAGS, 1);
            w.put_u32(&FLAGS, 2);
        });
        let (_, mut reader) = MessageReader::new(&frame).unwrap();
        reader.read_u32(&FLAGS).unwrap();
        assert!(matches!(
            reader.finish(),
            Err(WireError::TrailingBytes { extra: 12 })
        ));
    }
}
