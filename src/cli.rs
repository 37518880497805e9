//! CLI utilities for Ferry.
//!
//! The utilities present in this module can be used to create a CLI tool
//! for driving a file server interactively.
use std::io::{BufRead, Write};

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Exit command `.exit`
    Exit,
    /// `open <path> [create] [ro|wo|rw]`
    Open { path: String, flags: u32 },
    /// `read <handle> <offset> <max_bytes>`
    Read {
        handle: u64,
        offset: u64,
        max_bytes: u32,
    },
    /// `write <handle> <offset> <text>`
    Write {
        handle: u64,
        offset: u64,
        data: String,
    },
    /// `size <handle>`
    Size { handle: u64 },
    /// `close <handle>`
    Close { handle: u64 },
    /// `aread <handle> <offset> <max_bytes>`
    ReadAsync {
        handle: u64,
        offset: u64,
        max_bytes: u32,
    },
    /// `poll <operation>`
    Poll { operation: u64 },
}

fn number<T: std::str::FromStr>(what: &str, token: Option<&str>) -> Result<T, String> {
    token
        .ok_or(format!("missing {what}"))?
        .parse()
        .map_err(|_| format!("invalid {what}"))
}

impl TryFrom<&str> for Command {
    type Error = String;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            Some(".exit") => Ok(Command::Exit),
            Some("open") => {
                let path = tokens.next().ok_or("missing path".to_string())?.to_string();
                let mut flags = 0;
                for token in tokens {
                    flags |= match token {
                        "create" => 0o100,
                        "ro" => 0,
                        "wo" => 1,
                        "rw" => 2,
                        other => return Err(format!("unknown open flag '{other}'")),
                    };
                }
                Ok(Command::Open { path, flags })
            }
            Some("read") => Ok(Command::Read {
                handle: number("handle", tokens.next())?,
                offset: number("offset", tokens.next())?,
                max_bytes: number("max_bytes", tokens.next())?,
            }),
            Some("write") => {
                let handle = number("handle", tokens.next())?;
                let offset = number("offset", tokens.next())?;
                let data = tokens.collect::<Vec<_>>().join(" ");
                if data.is_empty() {
                    return Err("missing data".to_string());
                }
                Ok(Command::Write {
                    handle,
                    offset,
                    data,
                })
            }
            Some("size") => Ok(Command::Size {
                handle: number("handle", tokens.next())?,
            }),
            Some("close") => Ok(Command::Close {
                handle: number("handle", tokens.next())?,
            }),
            Some("aread") => Ok(Command::ReadAsync {
                handle: number("handle", tokens.next())?,
                offset: number("offset", tokens.next())?,
                max_bytes: number("max_bytes", tokens.next())?,
            }),
            Some("poll") => Ok(Command::Poll {
                operation: number("operation", tokens.next())?,
            }),
            Some(other) => Err(format!("unrecognized command '{other}'")),
            None => Err("empty command".to_string()),
        }
    }
}

/// Prompt the user for a valid Ferry command.
///
/// # Panics
/// If the prompt cannot be written or a line cannot be read.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, String>
where
    R: BufRead,
    W: Write,
{
    let mut line = String::default();
    write!(&mut writer, "> ").expect("failed to write to writer.");
    writer.flush().expect("failed to flush writer.");

    reader
        .read_line(&mut line)
        .expect("failed to read from reader.");

    line.trim_end().try_into()
}
