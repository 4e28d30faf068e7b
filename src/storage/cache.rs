//! # Bucket Cache
//!
//! A bounded write-back cache between record users and the slot file. The
//! cache is a fixed table of [`Bucket`]s with a parallel table of dirty
//! flags; a hashed id→slot index makes the exact-match lookup O(1) while
//! the selection scans stay linear over the small fixed table.
//!
//! ## Slot Selection
//!
//! When a target id is not already resident, a table slot is chosen in
//! strict priority order:
//!
//! 1. first free entry (id 0)
//! 2. first clean entry
//! 3. a dirty entry picked at random, flushed before reuse
//!
//! Random victim selection is deliberately simple: the table is small and a
//! scan-resistant policy buys nothing for this workload. The picker is
//! injectable so tests can force a deterministic victim.
//!
//! ## Write-Back, Write-Allocate
//!
//! `write` stores into the cache and marks the entry dirty; it never
//! touches the disk and never reads the old slot content first. Dirty
//! entries reach the file on `flush`/`flush_all`, on forced eviction, or on
//! `close` (which implies a full flush).
//!
//! ## Failure Semantics
//!
//! Disk errors abort the operation without leaving the table in an
//! inconsistent observable state: a forced eviction flushes the victim
//! before its id is reassigned, and a cold read loads into a scratch bucket
//! before the entry is installed. Bookkeeping is only committed once the
//! corresponding I/O step has fully succeeded.

use hashbrown::HashMap;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use rand::Rng;
use tracing::{debug, trace};

use super::bucket::Bucket;
use super::slot_file::SlotFile;
use crate::config::EMPTY_ID;
use crate::records::Record;

/// Chooses the eviction victim among `n` table slots when every entry is
/// dirty. Must return a value in `0..n`.
pub type VictimPicker = Box<dyn FnMut(usize) -> usize + Send>;

/// Operation counters, observable through [`BucketCache::stats`]. Tests use
/// `disk_reads`/`disk_writes` to assert that resident hits perform no I/O;
/// the stats-dump glue prints the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
    pub evictions: u64,
}

/// The bucket table plus its dirty flags, id index and backing file.
///
/// Owned by a single actor (the server loop); concurrency is handled at the
/// protocol layer, so the cache itself needs no locking.
pub struct BucketCache {
    file: SlotFile,
    entries: Vec<Bucket>,
    dirty: Vec<bool>,
    index: HashMap<u32, usize>,
    stats: CacheStats,
    pick_victim: VictimPicker,
}

impl std::fmt::Debug for BucketCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketCache")
            .field("file", &self.file)
            .field("entries", &self.entries)
            .field("dirty", &self.dirty)
            .field("index", &self.index)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl BucketCache {
    /// Opens the cache over `path` with `capacity` bucket entries, creating
    /// the file if absent. Uses the default random victim picker.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        Self::open_with_picker(
            path,
            capacity,
            Box::new(|n| rand::thread_rng().gen_range(0..n)),
        )
    }

    /// Same as [`open`](Self::open) but with an injected victim picker, so
    /// forced eviction can be made deterministic.
    pub fn open_with_picker(
        path: impl AsRef<Path>,
        capacity: usize,
        pick_victim: VictimPicker,
    ) -> Result<Self> {
        ensure!(capacity > 0, "cache capacity must be at least one bucket");

        let file = SlotFile::open(path).wrap_err("failed to open cache backing file")?;
        debug!(path = %file.path().display(), capacity, "bucket cache opened");

        Ok(Self {
            file,
            entries: vec![Bucket::empty(); capacity],
            dirty: vec![false; capacity],
            index: HashMap::with_capacity(capacity),
            stats: CacheStats::default(),
            pick_victim,
        })
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of entries currently holding a record.
    pub fn resident_entries(&self) -> usize {
        self.index.len()
    }

    pub fn is_resident(&self, index: u32) -> bool {
        self.index.contains_key(&index)
    }

    /// Whether the entry holding `index` is dirty. False when not resident.
    pub fn is_dirty(&self, index: u32) -> bool {
        self.index
            .get(&index)
            .map(|&slot| self.dirty[slot])
            .unwrap_or(false)
    }

    /// Returns the record at file slot `index`, loading it from disk into
    /// the cache first if it is not already resident. A slot never written
    /// reads back as the zeroed record.
    pub fn read(&mut self, index: u32) -> Result<Record> {
        ensure!(index != EMPTY_ID, "slot 0 is reserved as the empty sentinel");

        if let Some(&slot) = self.index.get(&index) {
            self.stats.hits += 1;
            trace!(index, slot, "cache hit");
            return Ok(self.entries[slot].record());
        }

        self.stats.misses += 1;
        let slot = self.acquire_slot()?;

        // Load into a scratch bucket first; the entry is only installed
        // once the read has fully succeeded.
        let loaded = self.file.read_slot(index)?;
        self.stats.disk_reads += 1;

        let mut bucket = loaded;
        bucket.set_id(index);
        self.install(slot, bucket, false);
        trace!(index, slot, "cache fill from disk");

        Ok(self.entries[slot].record())
    }

    /// Stores `record` for file slot `index` in the cache and marks the
    /// entry dirty. Returns without touching the disk (unless a forced
    /// eviction is needed to find a slot) and without reading the old slot
    /// content first. The record's own id field is taken as the caller
    /// provided it; it is not checked against `index`.
    pub fn write(&mut self, index: u32, record: &Record) -> Result<()> {
        ensure!(index != EMPTY_ID, "slot 0 is reserved as the empty sentinel");

        if let Some(&slot) = self.index.get(&index) {
            self.stats.hits += 1;
            self.entries[slot].set_record(record);
            self.dirty[slot] = true;
            trace!(index, slot, "cache overwrite");
            return Ok(());
        }

        self.stats.misses += 1;
        let slot = self.acquire_slot()?;
        self.install(slot, Bucket::filled(index, record), true);
        trace!(index, slot, "cache write-allocate");

        Ok(())
    }

    /// Synchronizes the entry holding `index` to disk if it is dirty; a
    /// no-op for clean or non-resident indices.
    pub fn flush(&mut self, index: u32) -> Result<()> {
        if let Some(&slot) = self.index.get(&index) {
            if self.dirty[slot] {
                self.flush_slot(slot)?;
                debug!(index, "entry flushed");
            }
        }
        Ok(())
    }

    /// Synchronizes every dirty entry to disk. The first disk error aborts
    /// the sweep.
    pub fn flush_all(&mut self) -> Result<()> {
        for slot in 0..self.entries.len() {
            if self.dirty[slot] {
                self.flush_slot(slot)?;
            }
        }
        debug!("all dirty entries flushed");
        Ok(())
    }

    /// Flushes everything and releases the file.
    pub fn close(mut self) -> Result<()> {
        self.flush_all()?;
        self.file.close()?;
        debug!("bucket cache closed");
        Ok(())
    }

    /// Writes the bucket in `slot` to its file position and clears the
    /// dirty flag. The flag is only cleared after the write succeeded.
    fn flush_slot(&mut self, slot: usize) -> Result<()> {
        let id = self.entries[slot].id();
        self.file.write_slot(id, &self.entries[slot])?;
        self.stats.disk_writes += 1;
        self.dirty[slot] = false;
        Ok(())
    }

    /// Selects a table slot for a new id: first free entry, else first
    /// clean entry, else a random dirty victim flushed before reuse.
    fn acquire_slot(&mut self) -> Result<usize> {
        if let Some(slot) = self.entries.iter().position(Bucket::is_empty) {
            return Ok(slot);
        }

        if let Some(slot) = self.dirty.iter().position(|&d| !d) {
            return Ok(slot);
        }

        let slot = (self.pick_victim)(self.entries.len());
        let evicted = self.entries[slot].id();
        self.flush_slot(slot)
            .wrap_err_with(|| format!("failed to flush eviction victim holding slot {evicted}"))?;
        self.stats.evictions += 1;
        debug!(evicted, slot, "forced eviction");

        Ok(slot)
    }

    /// Commits `bucket` into table `slot`, retiring whatever id the slot
    /// held before. Callers have already completed any I/O the replacement
    /// required.
    fn install(&mut self, slot: usize, bucket: Bucket, dirty: bool) {
        let old = self.entries[slot].id();
        if old != EMPTY_ID {
            self.index.remove(&old);
        }
        self.index.insert(bucket.id(), slot);
        self.entries[slot] = bucket;
        self.dirty[slot] = dirty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_cache(dir: &tempfile::TempDir, capacity: usize) -> BucketCache {
        BucketCache::open(dir.path().join("cache.dat"), capacity).unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(BucketCache::open(dir.path().join("c.dat"), 0).is_err());
    }

    #[test]
    fn slot_zero_is_rejected() {
        let dir = tempdir().unwrap();
        let mut cache = open_cache(&dir, 4);
        assert!(cache.read(0).is_err());
        assert!(cache.write(0, &Record::zeroed()).is_err());
    }

    #[test]
    fn write_then_read_hits_the_cache() {
        let dir = tempdir().unwrap();
        let mut cache = open_cache(&dir, 4);
        let record = Record::new(2, 9, 0, "Mallory");

        cache.write(2, &record).unwrap();
        assert_eq!(cache.read(2).unwrap(), record);
        assert_eq!(cache.stats().disk_reads, 0);
        assert_eq!(cache.stats().disk_writes, 0);
    }

    #[test]
    fn eviction_picker_is_honored() {
        let dir = tempdir().unwrap();
        let mut cache = BucketCache::open_with_picker(
            dir.path().join("cache.dat"),
            2,
            Box::new(|_| 1),
        )
        .unwrap();

        cache.write(1, &Record::new(1, 1, 0, "one")).unwrap();
        cache.write(2, &Record::new(2, 2, 0, "two")).unwrap();
        cache.write(3, &Record::new(3, 3, 0, "three")).unwrap();

        // Slot 1 held id 2; it was flushed and reused for id 3.
        assert!(!cache.is_resident(2));
        assert!(cache.is_resident(1));
        assert!(cache.is_resident(3));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().disk_writes, 1);
    }
}
