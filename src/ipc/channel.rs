//! # Channel Addressing
//!
//! Socket naming for the rendezvous channel. The server's well-known
//! address is derived from the owning user's uid, so distinct users never
//! collide and one user's processes always meet on the same name. Each
//! client derives its reply address from the uid plus a reply id.
//!
//! The default reply id is the process id. That keeps the original
//! protocol's property, and its caveat: two threads in one process share
//! one reply address, so the stub is not safe for multi-threaded clients
//! unless each logical caller allocates its own id (see
//! [`StoreClient::open_with_reply_id`](crate::client::StoreClient::open_with_reply_id)).

use std::path::PathBuf;

use crate::config::SOCKET_PREFIX;

fn uid() -> u32 {
    // Safety: getuid has no failure modes and touches no memory.
    unsafe { libc::getuid() }
}

fn runtime_dir() -> PathBuf {
    std::env::temp_dir()
}

/// The well-known server socket path for the current user.
pub fn server_socket_path() -> PathBuf {
    runtime_dir().join(format!("{SOCKET_PREFIX}-{}.sock", uid()))
}

/// The reply socket path for `reply_id` under the current user.
pub fn reply_socket_path(reply_id: u32) -> PathBuf {
    runtime_dir().join(format!("{SOCKET_PREFIX}-{}-r{reply_id}.sock", uid()))
}

/// Default reply id: the process id, matching the original protocol's
/// process-identity addressing.
pub fn default_reply_id() -> u32 {
    std::process::id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_paths_are_distinct_per_id() {
        assert_ne!(reply_socket_path(1), reply_socket_path(2));
        assert_ne!(reply_socket_path(1), server_socket_path());
    }
}
