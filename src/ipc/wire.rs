//! # Wire Messages
//!
//! Fixed-layout request and answer messages, exchanged as whole datagrams.
//! Like the file formats, the wire formats are zerocopy structs with
//! little-endian scalars, so encoding is `as_bytes` and decoding is a
//! length check.
//!
//! ## Formats
//!
//! ```text
//! Request                              Answer
//! Offset  Size  Field                  Offset  Size  Field
//! 0       4     op (raw u32)           0       4     status (i32)
//! 4       4     slot index             4       28    record payload
//! 8       4     reply id                             (meaningful only on
//! 12      28    record payload                        successful read)
//!               (meaningful only
//!                for write)
//! ```
//!
//! The op travels raw: a server decodes it with [`Op::from_raw`] and
//! answers [`Status::UnknownOp`] for values it does not know, so a newer
//! client degrades gracefully against an older server instead of crashing
//! it.

use std::fmt;

use eyre::{eyre, Result};
use zerocopy::little_endian::{I32, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::records::Record;

/// Size in bytes of an encoded [`Request`].
pub const REQUEST_SIZE: usize = std::mem::size_of::<Request>();

/// Size in bytes of an encoded [`Answer`].
pub const ANSWER_SIZE: usize = std::mem::size_of::<Answer>();

/// Protocol operations. The wire carries the raw code; unknown codes are
/// preserved for the unknown-operation answer path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

impl Op {
    pub fn raw(self) -> u32 {
        match self {
            Op::Read => 0,
            Op::Write => 1,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Op::Read),
            1 => Some(Op::Write),
            _ => None,
        }
    }
}

/// Protocol status codes. Zero is success; every failure class has its own
/// documented negative value so callers can tell them apart across the
/// whole stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    /// Operation completed.
    Ok = 0,
    /// Disk I/O against the slot file failed.
    Io = -1,
    /// Channel send/receive failed at the transport level.
    Transport = -2,
    /// The request carried an operation code this server does not know.
    UnknownOp = -3,
    /// No server is reachable on the rendezvous channel.
    NotRunning = -4,
    /// Another server instance already owns the rendezvous channel.
    AlreadyRunning = -5,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Status::Ok),
            -1 => Some(Status::Io),
            -2 => Some(Status::Transport),
            -3 => Some(Status::UnknownOp),
            -4 => Some(Status::NotRunning),
            -5 => Some(Status::AlreadyRunning),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Ok => "ok",
            Status::Io => "disk I/O failure",
            Status::Transport => "transport failure",
            Status::UnknownOp => "unknown operation",
            Status::NotRunning => "server not running",
            Status::AlreadyRunning => "server already running",
        };
        write!(f, "{text} (status {})", self.code())
    }
}

impl std::error::Error for Status {}

/// A client request: operation, target slot, reply id and (for writes) the
/// record payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Request {
    op: U32,
    index: U32,
    reply_to: U32,
    record: Record,
}

impl Request {
    pub fn new(op: u32, index: u32, reply_to: u32, record: Record) -> Self {
        Self {
            op: U32::new(op),
            index: U32::new(index),
            reply_to: U32::new(reply_to),
            record,
        }
    }

    pub fn op_raw(&self) -> u32 {
        self.op.get()
    }

    pub fn index(&self) -> u32 {
        self.index.get()
    }

    pub fn reply_to(&self) -> u32 {
        self.reply_to.get()
    }

    pub fn record(&self) -> Record {
        self.record
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(bytes)
            .map_err(|_| eyre!("malformed request datagram ({} bytes)", bytes.len()))
    }
}

/// A server answer: status plus the record payload on a successful read.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Answer {
    status: I32,
    record: Record,
}

impl Answer {
    /// A success answer carrying `record` (the read path).
    pub fn with_record(record: Record) -> Self {
        Self {
            status: I32::new(Status::Ok.code()),
            record,
        }
    }

    /// An answer carrying only a status (writes and failures).
    pub fn status_only(status: Status) -> Self {
        Self {
            status: I32::new(status.code()),
            record: Record::zeroed(),
        }
    }

    pub fn status_code(&self) -> i32 {
        self.status.get()
    }

    pub fn record(&self) -> Record {
        self.record
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(bytes)
            .map_err(|_| eyre!("malformed answer datagram ({} bytes)", bytes.len()))
    }
}
