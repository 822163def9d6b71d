/// Platform-wide upload ceiling (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Largest import accepted before the file is rejected outright.
pub const DEFAULT_MAX_IMPORT_ROWS: usize = 10_000;

pub const DEFAULT_PREVIEW_SAMPLE_LIMIT: usize = 20;

pub const DEFAULT_PREVIEW_ERROR_LIMIT: usize = 10;

pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

/// Status snapshots are broadcast every N processed records.
pub const PROGRESS_PUBLISH_EVERY: u32 = 10;

/// Finished operations kept for status queries before the oldest are evicted.
pub const MAX_RETAINED_FINISHED: usize = 100;

/// Capacity of the status broadcast channel.
pub const STATUS_CHANNEL_CAPACITY: usize = 256;
