//! # Slot File
//!
//! Positional whole-bucket I/O against the data file. The file is a flat
//! array of [`Bucket`]s: the byte offset of slot `i` is `i × BUCKET_SIZE`.
//!
//! ## Durability
//!
//! Every slot write is followed by a data sync, so a successful
//! `write_slot` means the bucket is on stable storage. This is the one
//! durability point the store guarantees; everything above it is
//! write-back.
//!
//! ## Transfer Semantics
//!
//! Transfers are whole buckets. Interrupted or short system-level
//! transfers are retried until the full bucket has moved or a non-retriable
//! error occurs, so callers never observe a partial record. A read past the
//! current end of file yields a zeroed bucket, which is how a never-written
//! slot reads back as the default record.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use eyre::{bail, Result, WrapErr};
use zerocopy::IntoBytes;

use super::bucket::{Bucket, BUCKET_SIZE};

/// Owns the open data file and performs slot-granular transfers.
#[derive(Debug)]
pub struct SlotFile {
    file: File,
    path: PathBuf,
}

impl SlotFile {
    /// Opens the data file for read/write, creating it with owner-only
    /// permissions if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o700)
            .open(&path)
            .wrap_err_with(|| format!("failed to open slot file {}", path.display()))?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset(index: u32) -> u64 {
        index as u64 * BUCKET_SIZE as u64
    }

    /// Reads the bucket at `index`. Slots beyond the end of the file (or a
    /// tail the file has never covered) read back zeroed.
    pub fn read_slot(&self, index: u32) -> Result<Bucket> {
        let mut bucket = Bucket::empty();
        let buf = bucket.as_mut_bytes();
        let mut done = 0;

        while done < BUCKET_SIZE {
            match self.file.read_at(&mut buf[done..], Self::offset(index) + done as u64) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(e).wrap_err_with(|| {
                        format!("failed to read slot {} from {}", index, self.path.display())
                    });
                }
            }
        }

        // Remaining bytes stay zero when the file ends mid-slot.
        Ok(bucket)
    }

    /// Writes the bucket at `index` and syncs it to stable storage.
    pub fn write_slot(&self, index: u32, bucket: &Bucket) -> Result<()> {
        let buf = bucket.as_bytes();
        let mut done = 0;

        while done < BUCKET_SIZE {
            match self.file.write_at(&buf[done..], Self::offset(index) + done as u64) {
                Ok(0) => bail!(
                    "short write of slot {} to {}",
                    index,
                    self.path.display()
                ),
                Ok(n) => done += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(e).wrap_err_with(|| {
                        format!("failed to write slot {} to {}", index, self.path.display())
                    });
                }
            }
        }

        self.file
            .sync_data()
            .wrap_err_with(|| format!("failed to sync {}", self.path.display()))
    }

    /// Final sync before the file is released.
    pub fn close(self) -> Result<()> {
        self.file
            .sync_all()
            .wrap_err_with(|| format!("failed to sync {} on close", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unwritten_slot_reads_back_zeroed() {
        let dir = tempdir().unwrap();
        let file = SlotFile::open(dir.path().join("t.dat")).unwrap();
        let bucket = file.read_slot(12).unwrap();
        assert!(bucket.is_empty());
    }

    #[test]
    fn slot_write_is_readable_at_same_index() {
        let dir = tempdir().unwrap();
        let file = SlotFile::open(dir.path().join("t.dat")).unwrap();
        let record = crate::records::Record::new(5, 20, 1, "Eve");
        file.write_slot(5, &Bucket::filled(5, &record)).unwrap();

        let bucket = file.read_slot(5).unwrap();
        assert_eq!(bucket.id(), 5);
        assert_eq!(bucket.record(), record);

        // Neighbouring slots are untouched.
        assert!(file.read_slot(4).unwrap().is_empty());
        assert!(file.read_slot(6).unwrap().is_empty());
    }
}
