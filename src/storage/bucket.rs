//! # Bucket Definition
//!
//! A bucket is one record's bytes plus the file slot id it currently
//! represents. Buckets are used both in RAM (as cache entries) and on disk
//! (the data file is a flat array of them), so the struct is a zerocopy
//! fixed layout like [`Record`] itself.
//!
//! An id of 0 means the bucket is logically empty. No real record may use
//! id 0, which makes slot 0 of the data file unusable, a known quirk of
//! the format, not a feature.

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::EMPTY_ID;
use crate::records::{Record, RECORD_SIZE};

/// Size in bytes of one bucket, in RAM and on disk.
pub const BUCKET_SIZE: usize = std::mem::size_of::<Bucket>();

const _: () = assert!(BUCKET_SIZE == RECORD_SIZE + 4);

/// One cache entry / one file slot: a record image plus the slot id it
/// holds (0 = empty).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Bucket {
    record: [u8; RECORD_SIZE],
    id: U32,
}

impl Bucket {
    /// An empty bucket (id 0, zeroed payload).
    pub fn empty() -> Self {
        Self::new_zeroed()
    }

    /// A bucket holding `record` for file slot `id`.
    pub fn filled(id: u32, record: &Record) -> Self {
        let mut bucket = Self::empty();
        bucket.set_id(id);
        bucket.set_record(record);
        bucket
    }

    pub fn id(&self) -> u32 {
        self.id.get()
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = U32::new(id);
    }

    pub fn is_empty(&self) -> bool {
        self.id() == EMPTY_ID
    }

    /// Copies the payload out as a record.
    pub fn record(&self) -> Record {
        zerocopy::transmute!(self.record)
    }

    /// Copies `record` into the payload.
    pub fn set_record(&mut self, record: &Record) {
        self.record = zerocopy::transmute!(*record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_layout_is_fixed() {
        assert_eq!(BUCKET_SIZE, 32);
    }

    #[test]
    fn empty_bucket_has_id_zero() {
        assert!(Bucket::empty().is_empty());
    }

    #[test]
    fn payload_roundtrips_through_bucket() {
        let record = Record::new(3, 44, 0, "Bob");
        let bucket = Bucket::filled(3, &record);
        assert_eq!(bucket.id(), 3);
        assert_eq!(bucket.record(), record);
    }
}
