//! # Client Stub
//!
//! The client side of the protocol: open the channel once, then issue
//! synchronous read/write calls that block for their addressed answer.
//!
//! ## Availability
//!
//! Reachability is checked once at open: connecting to a rendezvous name
//! that does not exist yields [`Status::NotRunning`], distinct from any
//! in-flight failure. After the server shuts down and removes the
//! rendezvous, the next send fails fast the same way instead of hanging.
//!
//! ## Addressing Caveat
//!
//! The default reply id is the process id, exactly like the original
//! protocol. All threads of one process therefore share one reply address,
//! and the stub is not safe for multi-threaded use with the default id.
//! Callers that need concurrency within a process must give each logical
//! caller its own id via [`StoreClient::open_with_reply_id`]; the default
//! is deliberately left as-is.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use eyre::{Report, Result, WrapErr};
use tracing::{debug, trace};
use zerocopy::IntoBytes;

use crate::ipc::channel;
use crate::ipc::wire::{Answer, Op, Request, Status, ANSWER_SIZE};
use crate::records::Record;

/// One client's handle on the channel: its own reply socket, connected to
/// the server's rendezvous socket.
#[derive(Debug)]
pub struct StoreClient {
    socket: UnixDatagram,
    reply_path: PathBuf,
    reply_id: u32,
}

impl StoreClient {
    /// Opens the channel to the current user's server with the default
    /// (process-id) reply id.
    pub fn open() -> Result<Self> {
        Self::open_at(channel::server_socket_path(), channel::default_reply_id())
    }

    /// Opens the channel with an explicit reply id, for callers that need
    /// more than one logical client per process.
    pub fn open_with_reply_id(reply_id: u32) -> Result<Self> {
        Self::open_at(channel::server_socket_path(), reply_id)
    }

    /// Fully explicit open: server socket path plus reply id.
    pub fn open_at(server_path: impl AsRef<Path>, reply_id: u32) -> Result<Self> {
        let server_path = server_path.as_ref();
        let reply_path = channel::reply_socket_path(reply_id);

        // A leftover reply socket can only belong to a dead incarnation of
        // this same id; clear it so bind succeeds.
        if reply_path.exists() {
            let _ = fs::remove_file(&reply_path);
        }

        let socket = UnixDatagram::bind(&reply_path).wrap_err_with(|| {
            format!("failed to bind reply socket {}", reply_path.display())
        })?;

        if let Err(e) = socket.connect(server_path) {
            let _ = fs::remove_file(&reply_path);
            let report = if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused)
            {
                Report::new(Status::NotRunning)
            } else {
                Report::new(e)
            };
            return Err(report.wrap_err(format!(
                "cannot reach store server at {}",
                server_path.display()
            )));
        }

        debug!(reply_id, server = %server_path.display(), "client channel open");

        Ok(Self {
            socket,
            reply_path,
            reply_id,
        })
    }

    pub fn reply_id(&self) -> u32 {
        self.reply_id
    }

    /// Reads the record at file slot `index` through the server's cache.
    pub fn read(&self, index: u32) -> Result<Record> {
        let request = Request::new(Op::Read.raw(), index, self.reply_id, Record::zeroed());
        let answer = self.transact(&request)?;
        self.check_status(answer.status_code())?;
        Ok(answer.record())
    }

    /// Writes `record` at file slot `index` into the server's cache. The
    /// server acknowledges without waiting for disk.
    pub fn write(&self, index: u32, record: &Record) -> Result<()> {
        let request = Request::new(Op::Write.raw(), index, self.reply_id, *record);
        let answer = self.transact(&request)?;
        self.check_status(answer.status_code())
    }

    /// Closes the client's side of the channel; the server is unaffected.
    pub fn close(self) -> Result<()> {
        Ok(())
    }

    /// Sends one request and blocks for the answer addressed to this
    /// client. Transport failures are distinct from application statuses.
    fn transact(&self, request: &Request) -> Result<Answer> {
        trace!(
            op = request.op_raw(),
            index = request.index(),
            "sending request"
        );

        if let Err(e) = self.socket.send(request.as_bytes()) {
            let report = if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused)
            {
                Report::new(Status::NotRunning).wrap_err("server went away")
            } else {
                Report::new(Status::Transport).wrap_err(e)
            };
            return Err(report);
        }

        let mut buf = [0u8; ANSWER_SIZE];
        let n = loop {
            match self.socket.recv(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(Report::new(Status::Transport)
                        .wrap_err(e)
                        .wrap_err("failed to receive answer"));
                }
            }
        };

        let answer = Answer::decode(&buf[..n])?;
        trace!(status = answer.status_code(), "answer received");
        Ok(answer)
    }

    /// Passes a non-zero server status through unchanged, as a typed error
    /// when the code is known.
    fn check_status(&self, code: i32) -> Result<()> {
        if code == Status::Ok.code() {
            return Ok(());
        }
        match Status::from_code(code) {
            Some(status) => Err(Report::new(status)),
            None => Err(eyre::eyre!("server returned unrecognized status {code}")),
        }
    }
}

impl Drop for StoreClient {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.reply_path);
    }
}
