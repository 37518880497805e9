//! The per-routine message layout table.
//!
//! Seven routines make up the file service. Each one's request and reply
//! field order is fixed here, once, at build time; the dispatcher and both
//! codec directions drive everything off this table. A routine with no
//! reply schema is fire-and-forget: no reply frame is ever produced for it.
use super::descriptor::{DESCRIPTOR_LEN, TypeCode};

pub const REQUEST_BASE: i32 = 5000;
pub const ROUTINE_COUNT: usize = 7;
pub const REPLY_OFFSET: i32 = 100;

/// Maximum element count for the open path field.
pub const PATH_MAX: u32 = 4096;
/// Maximum element count for data payloads (write request, read/poll replies).
pub const DATA_MAX: u32 = 1_048_576;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one element.
    Scalar,
    /// A running count in `[0, max]`.
    Variable { max: u32 },
}

#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub code: TypeCode,
    pub arity: Arity,
}

#[derive(Debug)]
pub struct RoutineSpec {
    pub name: &'static str,
    pub request: &'static [FieldSpec],
    pub reply: Option<&'static [FieldSpec]>,
}

impl RoutineSpec {
    pub fn is_oneway(&self) -> bool {
        self.reply.is_none()
    }
}

const fn scalar(name: &'static str, code: TypeCode) -> FieldSpec {
    FieldSpec {
        name,
        code,
        arity: Arity::Scalar,
    }
}

const fn variable(name: &'static str, code: TypeCode, max: u32) -> FieldSpec {
    FieldSpec {
        name,
        code,
        arity: Arity::Variable { max },
    }
}

pub static ROUTINES: [RoutineSpec; ROUTINE_COUNT] = [
    RoutineSpec {
        name: "open",
        request: &[
            variable("path", TypeCode::Byte, PATH_MAX),
            scalar("flags", TypeCode::Integer32),
        ],
        reply: Some(&[
            scalar("handle", TypeCode::Integer64),
            scalar("error", TypeCode::Integer32),
        ]),
    },
    RoutineSpec {
        name: "read",
        request: &[
            scalar("handle", TypeCode::Integer64),
            scalar("offset", TypeCode::Integer64),
            scalar("max_bytes", TypeCode::Integer32),
        ],
        reply: Some(&[
            variable("data", TypeCode::Byte, DATA_MAX),
            scalar("count", TypeCode::Integer32),
            scalar("error", TypeCode::Integer32),
        ]),
    },
    RoutineSpec {
        name: "write",
        request: &[
            scalar("handle", TypeCode::Integer64),
            scalar("offset", TypeCode::Integer64),
            variable("data", TypeCode::Byte, DATA_MAX),
        ],
        reply: Some(&[
            scalar("count", TypeCode::Integer32),
            scalar("error", TypeCode::Integer32),
        ]),
    },
    RoutineSpec {
        name: "size",
        request: &[scalar("handle", TypeCode::Integer64)],
        reply: Some(&[
            scalar("size", TypeCode::Integer64),
            scalar("error", TypeCode::Integer32),
        ]),
    },
    RoutineSpec {
        name: "close",
        request: &[scalar("handle", TypeCode::Integer64)],
        reply: None,
    },
    RoutineSpec {
        name: "read_async",
        request: &[
            scalar("handle", TypeCode::Integer64),
            scalar("offset", TypeCode::Integer64),
            scalar("max_bytes", TypeCode::Integer32),
        ],
        reply: Some(&[
            scalar("operation_id", TypeCode::Integer64),
            scalar("error", TypeCode::Integer32),
        ]),
    },
    RoutineSpec {
        name: "poll_async",
        request: &[scalar("operation_id", TypeCode::Integer64)],
        reply: Some(&[
            scalar("complete", TypeCode::Integer32),
            variable("data", TypeCode::Byte, DATA_MAX),
            scalar("count", TypeCode::Integer32),
            scalar("error", TypeCode::Integer32),
        ]),
    },
];

/// Look up the routine a request identifier maps to, if any.
pub fn routine(id: i32) -> Option<&'static RoutineSpec> {
    let offset = id.checked_sub(REQUEST_BASE)?;
    if (0..ROUTINE_COUNT as i32).contains(&offset) {
        Some(&ROUTINES[offset as usize])
    } else {
        None
    }
}

/// Encoded body length with every variable field empty. For a body with no
/// variable fields this is the exact length.
pub fn body_min_len(fields: &[FieldSpec]) -> usize {
    fields
        .iter()
        .map(|field| {
            DESCRIPTOR_LEN
                + match field.arity {
                    Arity::Scalar => field.code.bits() as usize / 8,
                    Arity::Variable { .. } => 0,
                }
        })
        .sum()
}

pub fn body_is_fixed(fields: &[FieldSpec]) -> bool {
    fields.iter().all(|field| matches!(field.arity, Arity::Scalar))
}
