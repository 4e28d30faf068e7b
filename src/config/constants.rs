//! # Configuration Constants
//!
//! All tunable values for the store in one place.
//!
//! ```text
//! CACHE_ENTRIES (64)
//!       └─> size of the bucket table and the parallel dirty-flag table;
//!           the cache never grows past this.
//!
//! NAME_LENGTH (16)
//!       └─> fixed byte width of the record name field; part of the on-disk
//!           and wire layout, so changing it changes both formats.
//!
//! EMPTY_ID (0)
//!       └─> sentinel meaning "this bucket holds nothing". Because the
//!           bucket id doubles as the file index, slot 0 of the data file
//!           can never hold a caller-visible record.
//! ```

/// Default number of buckets in the in-memory cache table.
pub const CACHE_ENTRIES: usize = 64;

/// Fixed width of the record name field, in bytes.
pub const NAME_LENGTH: usize = 16;

/// Bucket id sentinel for an empty cache entry. Also the reason slot 0 of
/// the data file is unusable.
pub const EMPTY_ID: u32 = 0;

/// Default file name for the slot array.
pub const DB_FILE_NAME: &str = "slotstore.dat";

/// Prefix for the rendezvous socket names derived from the owning uid.
pub const SOCKET_PREFIX: &str = "slotstore";

const _: () = assert!(CACHE_ENTRIES > 0);
const _: () = assert!(NAME_LENGTH > 0);
