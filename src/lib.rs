//! # slotstore - Single-Table Record Store
//!
//! A minimal record store: one fixed-layout table kept in a flat slot
//! file, accessed through a bounded write-back bucket cache, and shared
//! between independent client processes through a synchronous
//! request/reply protocol brokered by a single server process.
//!
//! ## Quick Start
//!
//! ```ignore
//! use slotstore::{Record, StoreClient};
//!
//! let client = StoreClient::open()?;          // fails fast if no server
//! client.write(3, &Record::new(3, 41, 0, "Alice"))?;
//! let record = client.read(3)?;
//! assert_eq!(record.name(), "Alice");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! client process A   client process B   client process C
//!       │                  │                  │
//!       └───────── addressed datagrams ───────┘
//!                          │
//!               ┌──────────▼──────────┐
//!               │     Server Loop     │  one request at a time
//!               ├─────────────────────┤
//!               │    Bucket Cache     │  bounded, write-back
//!               ├─────────────────────┤
//!               │      Slot File      │  flat array of buckets
//!               └─────────────────────┘
//! ```
//!
//! Requests flow to the server's well-known uid-derived socket; each
//! answer is addressed back to exactly the client that asked, so
//! concurrent clients never steal each other's replies. The server is
//! single-threaded and serves requests strictly sequentially, which is
//! what makes the cache safe without locks.
//!
//! ## Semantics In One Paragraph
//!
//! Reads are read-through: a miss loads the slot from disk (an unwritten
//! slot reads back zeroed). Writes are write-back and write-allocate: they
//! land in the cache, mark it dirty and return; disk is touched on
//! `flush`/`flush_all`, on forced eviction (victim flushed before reuse),
//! and on close. Slot id 0 is the empty sentinel, so slot 0 of the file is
//! unusable. There are no transactions and no durability promises beyond
//! the explicit flush points.
//!
//! ## Module Overview
//!
//! - [`records`]: the fixed-layout row type
//! - [`storage`]: slot file and bucket cache
//! - [`ipc`]: wire messages, status codes, channel addressing
//! - [`server`]: the broker loop
//! - [`client`]: the synchronous client stub
//! - [`logging`]: tracing setup and the debug-level-rotate hook
//! - [`config`]: centralized constants

pub mod client;
pub mod config;
pub mod ipc;
pub mod logging;
pub mod records;
pub mod server;
pub mod storage;

pub use client::StoreClient;
pub use ipc::{Op, Status};
pub use records::Record;
pub use server::{ServerConfig, StoreServer};
pub use storage::{BucketCache, CacheStats};
