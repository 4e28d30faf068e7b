//! # IPC Module
//!
//! The addressed request/reply protocol that lets independent client
//! processes share one server's cache.
//!
//! ## Model
//!
//! One rendezvous point per user: a well-known datagram socket whose name
//! is derived from the owning uid, so distinct users never collide and one
//! user's clients and server always meet without prior coordination. All
//! requests flow to the server's socket; each answer is addressed to the
//! reply id the client put in its request, and only that client's reply
//! socket receives it, even when many clients are in flight concurrently.
//!
//! Exactly one answer is produced per request. Neither side has a timeout:
//! a client whose server dies mid-transaction blocks until the removed
//! rendezvous makes its next send fail fast.
//!
//! ## Module Organization
//!
//! - `wire`: fixed-layout request/answer messages, operations, status codes
//! - `channel`: socket naming and reply-address derivation

pub mod channel;
pub mod wire;

pub use wire::{Answer, Op, Request, Status, ANSWER_SIZE, REQUEST_SIZE};
