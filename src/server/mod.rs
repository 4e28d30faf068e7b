//! # Server Loop
//!
//! The single broker process: owns the rendezvous socket and the bucket
//! cache, and serves one request at a time to completion (receive → cache
//! operation → addressed answer) before accepting the next. Concurrency is
//! pushed entirely to this single-consumer design, which is why the cache
//! below needs no locking.
//!
//! ## Startup and Shutdown
//!
//! The rendezvous socket is created exclusively: if the name is already
//! bound, another server instance owns it and startup aborts with
//! [`Status::AlreadyRunning`]. Shutdown removes the socket first, so stale
//! clients fail fast with not-running instead of hanging, then flushes and
//! closes the cache.
//!
//! ## Loop Behavior
//!
//! - An interrupted wait is a retryable condition, not an error; the loop
//!   re-enters its receive.
//! - A malformed datagram is logged and skipped (it carries no usable
//!   reply address to answer to).
//! - An unknown operation code is answered with a distinct status and the
//!   loop keeps serving; a newer client must not crash an older server.
//! - A send failure to a vanished client is logged and survived.
//! - A non-retriable receive failure abandons the loop and transitions to
//!   shutdown rather than keep talking on a broken channel.
//!
//! Administrative control (shutdown, log-level rotation, forced flush,
//! stats dump) arrives through edge-triggered flags polled once per
//! iteration; installing the signal handlers that set them is the binary's
//! job, not the core's.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eyre::{Report, Result, WrapErr};
use tracing::{debug, error, info, warn};

use crate::config::CACHE_ENTRIES;
use crate::ipc::channel;
use crate::ipc::wire::{Answer, Op, Request, Status, REQUEST_SIZE};
use crate::storage::{BucketCache, CacheStats};

/// Server construction parameters. The socket path defaults to the
/// uid-derived rendezvous name; tests override it.
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub cache_entries: usize,
    pub socket_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            cache_entries: CACHE_ENTRIES,
            socket_path: None,
        }
    }
}

/// The broker: rendezvous socket plus the cache it mediates.
#[derive(Debug)]
pub struct StoreServer {
    socket: UnixDatagram,
    socket_path: PathBuf,
    cache: BucketCache,
    shutdown: Arc<AtomicBool>,
    rotate_log: Arc<AtomicBool>,
    flush_now: Arc<AtomicBool>,
    dump_stats: Arc<AtomicBool>,
}

impl StoreServer {
    /// Creates the rendezvous socket exclusively and opens the cache. A
    /// name that is already bound means another instance is running; the
    /// error carries [`Status::AlreadyRunning`] and no second instance is
    /// created.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let socket_path = config
            .socket_path
            .unwrap_or_else(channel::server_socket_path);

        let socket = match UnixDatagram::bind(&socket_path) {
            Ok(socket) => socket,
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                return Err(Report::new(Status::AlreadyRunning).wrap_err(format!(
                    "rendezvous socket {} is already bound",
                    socket_path.display()
                )));
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| {
                    format!("failed to bind rendezvous socket {}", socket_path.display())
                });
            }
        };

        // The socket file outlives this process on every exit path, so a
        // failure past this point must unlink it or the next startup would
        // misreport already-running with no server alive.
        let cache = match BucketCache::open(&config.db_path, config.cache_entries) {
            Ok(cache) => cache,
            Err(e) => {
                let _ = fs::remove_file(&socket_path);
                return Err(e.wrap_err("failed to open store cache"));
            }
        };

        info!(socket = %socket_path.display(), db = %config.db_path.display(), "server bound");

        Ok(Self {
            socket,
            socket_path,
            cache,
            shutdown: Arc::new(AtomicBool::new(false)),
            rotate_log: Arc::new(AtomicBool::new(false)),
            flush_now: Arc::new(AtomicBool::new(false)),
            dump_stats: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Edge-triggered shutdown flag, polled once per loop iteration. Safe
    /// to set from a signal handler.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Edge-triggered log-rotation flag, polled once per loop iteration.
    pub fn rotate_log_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.rotate_log)
    }

    /// Edge-triggered flag requesting a full flush of the cache.
    pub fn flush_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flush_now)
    }

    /// Edge-triggered flag requesting a stats line in the log.
    pub fn stats_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.dump_stats)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Runs the dispatch loop until shutdown is requested or the channel
    /// breaks, then flushes and closes. The loop itself has no terminal
    /// state; only the polled flag or a non-retriable receive failure ends
    /// it.
    pub fn run(mut self) -> Result<()> {
        let mut fatal: Option<Report> = None;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested");
                break;
            }
            if self.rotate_log.swap(false, Ordering::Relaxed) {
                crate::logging::rotate_level();
            }
            if self.flush_now.swap(false, Ordering::Relaxed) {
                if let Err(e) = self.cache.flush_all() {
                    error!(error = %e, "requested flush failed");
                }
            }
            if self.dump_stats.swap(false, Ordering::Relaxed) {
                let stats = self.cache.stats();
                info!(
                    hits = stats.hits,
                    misses = stats.misses,
                    disk_reads = stats.disk_reads,
                    disk_writes = stats.disk_writes,
                    evictions = stats.evictions,
                    resident = self.cache.resident_entries(),
                    "cache stats"
                );
            }

            match self.recv_request() {
                Ok(Some(request)) => {
                    let answer = self.dispatch(&request);
                    self.send_answer(request.reply_to(), &answer);
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "receive failed, abandoning dispatch loop");
                    fatal = Some(e);
                    break;
                }
            }
        }

        let closed = self.close();
        finish_result(fatal, closed)
    }

    /// Blocks for the next request. `Ok(None)` means the wait was
    /// interrupted or the datagram was unusable: retry, not failure.
    fn recv_request(&mut self) -> Result<Option<Request>> {
        let mut buf = [0u8; REQUEST_SIZE];
        match self.socket.recv(&mut buf) {
            Ok(n) => match Request::decode(&buf[..n]) {
                Ok(request) => {
                    debug!(
                        op = request.op_raw(),
                        index = request.index(),
                        reply_to = request.reply_to(),
                        "request received"
                    );
                    Ok(Some(request))
                }
                Err(e) => {
                    warn!(error = %e, "ignoring unusable datagram");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                debug!("receive interrupted, retrying");
                Ok(None)
            }
            Err(e) => Err(e).wrap_err("failed to receive from rendezvous socket"),
        }
    }

    fn dispatch(&mut self, request: &Request) -> Answer {
        match Op::from_raw(request.op_raw()) {
            Some(Op::Read) => match self.cache.read(request.index()) {
                Ok(record) => Answer::with_record(record),
                Err(e) => {
                    warn!(index = request.index(), error = %e, "read failed");
                    Answer::status_only(Status::Io)
                }
            },
            Some(Op::Write) => match self.cache.write(request.index(), &request.record()) {
                Ok(()) => Answer::status_only(Status::Ok),
                Err(e) => {
                    warn!(index = request.index(), error = %e, "write failed");
                    Answer::status_only(Status::Io)
                }
            },
            None => {
                warn!(op = request.op_raw(), "unknown operation requested");
                Answer::status_only(Status::UnknownOp)
            }
        }
    }

    /// Addresses the answer to the requesting client's reply socket. A
    /// failed send means the client vanished; the loop goes on serving.
    fn send_answer(&self, reply_to: u32, answer: &Answer) {
        use zerocopy::IntoBytes;

        let reply_path = channel::reply_socket_path(reply_to);
        if let Err(e) = self.socket.send_to(answer.as_bytes(), &reply_path) {
            warn!(reply_to, error = %e, "failed to send answer, dropping it");
        } else {
            debug!(reply_to, status = answer.status_code(), "answer sent");
        }
    }

    /// Removes the rendezvous socket (so stale clients fail fast), then
    /// flushes and closes the cache.
    fn close(self) -> Result<()> {
        if let Err(e) = fs::remove_file(&self.socket_path) {
            warn!(error = %e, "failed to remove rendezvous socket");
        }
        self.cache.close().wrap_err("failed to close store cache")?;
        info!("server shut down");
        Ok(())
    }
}

/// The loop's own failure is the one worth reporting; a close failure on
/// top of it is logged and dropped so the root cause is not replaced.
fn finish_result(fatal: Option<Report>, closed: Result<()>) -> Result<()> {
    match fatal {
        Some(e) => {
            if let Err(close_err) = closed {
                error!(error = %close_err, "close also failed during fault shutdown");
            }
            Err(e)
        }
        None => closed,
    }
}
