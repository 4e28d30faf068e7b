//! # Record Definition
//!
//! The store manages exactly one table, and this is its row type. A record
//! has a caller-assigned id, two scalar attributes and a fixed-width name,
//! giving it a fixed layout known at compile time.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size  Description
//! 0       4     Record id (u32, matches the file slot it is stored at)
//! 4       4     Age (i32)
//! 8       4     Gender (i32)
//! 12      16    Name, NUL-padded UTF-8 bytes
//! ```
//!
//! ## Zerocopy Safety
//!
//! The struct derives the zerocopy traits so the same bytes serve as the
//! in-memory value, the on-disk image and the wire payload:
//! - `FromBytes`: safe to read from arbitrary bytes
//! - `IntoBytes`: safe to write as bytes
//! - `Unaligned`: works at any offset inside a bucket or message
//!
//! All multi-byte fields use little-endian encoding; the `U32`/`I32` types
//! handle conversion automatically.

use zerocopy::little_endian::{I32, U32};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::NAME_LENGTH;

/// Size in bytes of one serialized record.
pub const RECORD_SIZE: usize = std::mem::size_of::<Record>();

const _: () = assert!(RECORD_SIZE == 12 + NAME_LENGTH);

/// One row of the single table.
///
/// The id is caller-assigned and is expected to match the file slot the
/// record is stored at; id 0 is reserved as the empty-bucket sentinel and
/// is never a valid record id.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Record {
    id: U32,
    age: I32,
    gender: I32,
    name: [u8; NAME_LENGTH],
}

impl Record {
    pub fn new(id: u32, age: i32, gender: i32, name: &str) -> Self {
        let mut record = Self::zeroed();
        record.id = U32::new(id);
        record.age = I32::new(age);
        record.gender = I32::new(gender);
        record.set_name(name);
        record
    }

    /// The all-zeroes record, which is also what a never-written file slot
    /// reads back as.
    pub fn zeroed() -> Self {
        Self::new_zeroed()
    }

    pub fn id(&self) -> u32 {
        self.id.get()
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = U32::new(id);
    }

    pub fn age(&self) -> i32 {
        self.age.get()
    }

    pub fn set_age(&mut self, age: i32) {
        self.age = I32::new(age);
    }

    pub fn gender(&self) -> i32 {
        self.gender.get()
    }

    pub fn set_gender(&mut self, gender: i32) {
        self.gender = I32::new(gender);
    }

    /// Name bytes up to the first NUL, lossily decoded.
    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LENGTH);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Stores a name, truncating to the fixed field width and NUL-padding
    /// the remainder.
    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_LENGTH);
        self.name = [0u8; NAME_LENGTH];
        self.name[..len].copy_from_slice(&bytes[..len]);
    }
}
