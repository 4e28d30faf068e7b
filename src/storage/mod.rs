//! # Storage Module
//!
//! The storage layer for slotstore: a flat file addressed as an array of
//! fixed-size buckets, fronted by a bounded write-back cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │   BucketCache (cache.rs)     │  bounded table, dirty tracking,
//! │                              │  read-through / write-back, eviction
//! ├──────────────────────────────┤
//! │   SlotFile (slot_file.rs)    │  whole-bucket positional I/O,
//! │                              │  durable writes
//! ├──────────────────────────────┤
//! │   flat file of buckets       │  offset(i) = i × BUCKET_SIZE
//! └──────────────────────────────┘
//! ```
//!
//! The file is the durable ground truth; the cache is a bounded,
//! lossy-in-time view over it. All access goes through `BucketCache`; the
//! server owns exactly one instance and is the only actor touching it, so
//! the cache needs no internal locking.
//!
//! ## Module Organization
//!
//! - `bucket`: the fixed-size unit stored both in RAM and on disk
//! - `slot_file`: positional whole-bucket I/O against the data file
//! - `cache`: the bucket table with slot selection and forced eviction

mod bucket;
mod cache;
mod slot_file;

pub use bucket::{Bucket, BUCKET_SIZE};
pub use cache::{BucketCache, CacheStats, VictimPicker};
pub use slot_file::SlotFile;
