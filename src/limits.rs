/// Rows per store page (inclusive offsets, so `to - from + 1`).
pub const MAX_PAGE_ROWS: usize = 1000;

/// Longest stay the index will expand night by night.
pub const MAX_STAY_NIGHTS: i64 = 366;

/// Widest `[d1, d2]` window accepted by range queries.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Pages fetched per table before a load is abandoned.
pub const MAX_PAGES_PER_LOAD: usize = 500;

/// Largest money amount a row may carry in any column.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Largest WAL frame payload replay will read.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;
