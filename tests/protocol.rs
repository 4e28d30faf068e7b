//! # Protocol Tests
//!
//! End-to-end tests over real sockets, with the server loop running in a
//! background thread and clients opened with explicit reply ids (threads
//! in one process share a pid, so the pid default cannot be used here,
//! which is exactly the documented addressing caveat).
//!
//! Covered:
//!
//! 1. Read/write roundtrip through the server's cache
//! 2. Address isolation: concurrent clients never steal each other's answers
//! 3. Unknown operation codes are answered distinctly and non-fatally
//! 4. Already-running detection at bind, not-running detection at open
//! 5. Data written through the protocol survives a server restart
//! 6. Shutdown removes the rendezvous so stale clients fail fast
//! 7. A failed startup unbinds the rendezvous instead of leaking it
//! 8. The flush flag writes dirty entries to disk mid-service

use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tempfile::{tempdir, TempDir};
use zerocopy::IntoBytes;

use slotstore::ipc::{channel, wire};
use slotstore::{BucketCache, Record, ServerConfig, Status, StoreClient, StoreServer};

struct TestServer {
    socket_path: PathBuf,
    db_path: PathBuf,
    shutdown: Arc<AtomicBool>,
    flush: Arc<AtomicBool>,
    handle: JoinHandle<eyre::Result<()>>,
}

impl TestServer {
    fn start(dir: &TempDir, name: &str, cache_entries: usize) -> Self {
        let socket_path = dir.path().join(format!("{name}.sock"));
        let db_path = dir.path().join(format!("{name}.dat"));
        let mut config = ServerConfig::new(db_path.clone());
        config.cache_entries = cache_entries;
        config.socket_path = Some(socket_path.clone());

        let server = StoreServer::bind(config).unwrap();
        let shutdown = server.shutdown_flag();
        let flush = server.flush_flag();
        let handle = std::thread::spawn(move || server.run());

        Self {
            socket_path,
            db_path,
            shutdown,
            flush,
            handle,
        }
    }

    fn client(&self, reply_id: u32) -> StoreClient {
        StoreClient::open_at(&self.socket_path, reply_id).unwrap()
    }

    fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // An empty datagram wakes the blocked receive; the loop discards
        // it and re-checks the shutdown flag.
        let wake = UnixDatagram::unbound().unwrap();
        let _ = wake.send_to(&[], &self.socket_path);
        self.handle.join().unwrap().unwrap();
    }
}

fn record(id: u32, age: i32, name: &str) -> Record {
    Record::new(id, age, 0, name)
}

#[test]
fn read_write_roundtrip_through_server() {
    let dir = tempdir().unwrap();
    let server = TestServer::start(&dir, "roundtrip", 8);
    let client = server.client(71001);

    let original = record(3, 29, "Alice");
    client.write(3, &original).unwrap();
    assert_eq!(client.read(3).unwrap(), original);

    // A slot nobody wrote reads back zeroed with status 0.
    assert_eq!(client.read(40).unwrap(), Record::zeroed());

    drop(client);
    server.stop();
}

#[test]
fn concurrent_clients_never_steal_each_others_answers() {
    let dir = tempdir().unwrap();
    let server = TestServer::start(&dir, "isolation", 16);

    let socket_path = server.socket_path.clone();
    let workers: Vec<_> = [(71011u32, 100u32), (71012, 200)]
        .into_iter()
        .map(|(reply_id, base)| {
            let socket_path = socket_path.clone();
            std::thread::spawn(move || {
                let client = StoreClient::open_at(&socket_path, reply_id).unwrap();
                for round in 0..50 {
                    let index = base + (round % 10);
                    let own = record(index, reply_id as i32, "mine");
                    client.write(index, &own).unwrap();
                    let got = client.read(index).unwrap();
                    assert_eq!(
                        got.age(),
                        reply_id as i32,
                        "client {reply_id} received someone else's answer"
                    );
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    server.stop();
}

#[test]
fn unknown_operation_is_answered_distinctly_and_server_survives() {
    let dir = tempdir().unwrap();
    let server = TestServer::start(&dir, "unknownop", 8);

    // Speak the wire format directly with an op code this server has
    // never heard of.
    let reply_id = 71021;
    let reply_path = channel::reply_socket_path(reply_id);
    let _ = std::fs::remove_file(&reply_path);
    let raw = UnixDatagram::bind(&reply_path).unwrap();

    let request = wire::Request::new(99, 5, reply_id, Record::zeroed());
    raw.send_to(request.as_bytes(), &server.socket_path).unwrap();

    let mut buf = [0u8; wire::ANSWER_SIZE];
    let n = raw.recv(&mut buf).unwrap();
    let answer = wire::Answer::decode(&buf[..n]).unwrap();
    assert_eq!(answer.status_code(), Status::UnknownOp.code());

    drop(raw);
    let _ = std::fs::remove_file(&reply_path);

    // The server keeps serving afterwards.
    let client = server.client(71022);
    client.write(2, &record(2, 2, "alive")).unwrap();
    assert_eq!(client.read(2).unwrap().name(), "alive");

    drop(client);
    server.stop();
}

#[test]
fn second_server_on_same_channel_is_rejected() {
    let dir = tempdir().unwrap();
    let server = TestServer::start(&dir, "exclusive", 8);

    let mut config = ServerConfig::new(dir.path().join("other.dat"));
    config.socket_path = Some(server.socket_path.clone());
    let err = StoreServer::bind(config).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Status>(),
        Some(&Status::AlreadyRunning)
    );

    server.stop();
}

#[test]
fn failed_startup_releases_the_rendezvous() {
    let dir = tempdir().unwrap();
    let socket_path = dir.path().join("halfopen.sock");

    // A db path naming a directory cannot be opened as the data file, so
    // this bind fails after the rendezvous socket is already created.
    let mut config = ServerConfig::new(dir.path().to_path_buf());
    config.socket_path = Some(socket_path.clone());
    let err = StoreServer::bind(config).unwrap_err();
    assert_ne!(
        err.downcast_ref::<Status>(),
        Some(&Status::AlreadyRunning),
        "an open failure must not masquerade as another running instance"
    );

    // The failed startup must unbind the rendezvous so a corrected server
    // can start on the same name.
    assert!(!socket_path.exists());
    let mut config = ServerConfig::new(dir.path().join("halfopen.dat"));
    config.cache_entries = 8;
    config.socket_path = Some(socket_path.clone());
    let server = StoreServer::bind(config).unwrap();
    let shutdown = server.shutdown_flag();
    let handle = std::thread::spawn(move || server.run());

    shutdown.store(true, Ordering::Relaxed);
    let wake = UnixDatagram::unbound().unwrap();
    let _ = wake.send_to(&[], &socket_path);
    handle.join().unwrap().unwrap();
}

#[test]
fn flush_flag_pushes_dirty_entries_to_disk_while_serving() {
    let dir = tempdir().unwrap();
    let server = TestServer::start(&dir, "timedflush", 8);
    let client = server.client(71061);

    let original = record(9, 19, "timed");
    client.write(9, &original).unwrap();

    // Raise the flag the way the daemon's alarm handler does; it is
    // polled at the top of each loop iteration, so after two further
    // requests the flush has definitely run.
    server.flush.store(true, Ordering::Relaxed);
    let _ = client.read(9).unwrap();
    assert_eq!(client.read(9).unwrap(), original);

    // An independent open of the same data file sees the record even
    // though the server never shut down.
    let mut direct = BucketCache::open(&server.db_path, 4).unwrap();
    assert_eq!(direct.read(9).unwrap(), original);
    direct.close().unwrap();

    drop(client);
    server.stop();
}

#[test]
fn client_open_without_server_reports_not_running() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nobody-home.sock");

    let err = StoreClient::open_at(&missing, 71031).unwrap_err();
    assert_eq!(err.downcast_ref::<Status>(), Some(&Status::NotRunning));
}

#[test]
fn written_records_survive_server_restart() {
    let dir = tempdir().unwrap();
    let original = record(7, 77, "lasting");

    let server = TestServer::start(&dir, "restart", 8);
    let client = server.client(71041);
    client.write(7, &original).unwrap();
    drop(client);
    // Shutdown flushes every dirty entry before the file is closed.
    server.stop();

    let server = TestServer::start(&dir, "restart", 8);
    let client = server.client(71042);
    assert_eq!(client.read(7).unwrap(), original);

    drop(client);
    server.stop();
}

#[test]
fn shutdown_removes_rendezvous_so_clients_fail_fast() {
    let dir = tempdir().unwrap();
    let server = TestServer::start(&dir, "teardown", 8);
    let socket_path = server.socket_path.clone();
    server.stop();

    assert!(!Path::new(&socket_path).exists());
    let err = StoreClient::open_at(&socket_path, 71051).unwrap_err();
    assert_eq!(err.downcast_ref::<Status>(), Some(&Status::NotRunning));
}
