use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ulid::Ulid;

use crate::limits::MAX_PAGE_ROWS;
use crate::normalise::parse_date;
use crate::record::{Record, Table};

#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    AlreadyExists(String),
    PageTooLarge(usize),
    /// A record of one table addressed through the other.
    TableMismatch { expected: Table, found: Table },
    Unavailable(String),
    Io(std::io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "no such booking: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "booking already exists: {id}"),
            StoreError::PageTooLarge(n) => {
                write!(f, "page of {n} rows exceeds the {MAX_PAGE_ROWS}-row limit")
            }
            StoreError::TableMismatch { expected, found } => {
                write!(f, "{found:?} record cannot replace a {expected:?} row")
            }
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Io(e) => write!(f, "store I/O: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Inclusive row range `from..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub from: usize,
    pub to: usize,
}

impl PageRange {
    pub fn first() -> Self {
        Self {
            from: 0,
            to: MAX_PAGE_ROWS - 1,
        }
    }

    pub fn len(&self) -> usize {
        (self.to + 1).saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next(&self) -> Self {
        let len = self.len();
        Self {
            from: self.to + 1,
            to: self.to + len,
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.to < self.from || self.len() > MAX_PAGE_ROWS {
            return Err(StoreError::PageTooLarge(self.len()));
        }
        Ok(())
    }
}

/// Row predicates the engine pushes down to the store. Unset fields match
/// everything. Rows whose dates do not parse match the date predicates so
/// the normaliser still sees (and counts) them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub statuses: Option<Vec<String>>,
    pub check_in_on_or_before: Option<NaiveDate>,
    pub check_out_on_or_after: Option<NaiveDate>,
    pub booked_on: Option<NaiveDate>,
}

impl Filter {
    /// Rows whose stay may touch `[first, last]`.
    pub fn overlapping(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            check_in_on_or_before: Some(last),
            check_out_on_or_after: Some(first),
            ..Self::default()
        }
    }

    pub fn booked_on(date: NaiveDate) -> Self {
        Self {
            booked_on: Some(date),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[&str]) -> Self {
        self.statuses = Some(statuses.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        let status_ok = self
            .statuses
            .as_ref()
            .is_none_or(|wanted| record.status().is_some_and(|s| wanted.iter().any(|w| w == s)));
        let check_in_ok = self
            .check_in_on_or_before
            .is_none_or(|limit| parse_date(record.check_in()).is_none_or(|d| d <= limit));
        let check_out_ok = self
            .check_out_on_or_after
            .is_none_or(|limit| parse_date(record.check_out()).is_none_or(|d| d >= limit));
        let booked_ok = self
            .booked_on
            .is_none_or(|day| parse_date(record.booking_date()) == Some(day));
        status_ok && check_in_ok && check_out_ok && booked_ok
    }
}

/// The persistence façade. Reads are the only suspension points in a query.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Rows of `table` matching `filter`, in insertion order, restricted to `page`.
    async fn list(&self, table: Table, filter: &Filter, page: PageRange) -> Result<Vec<Record>, StoreError>;

    /// Insert a new row and return its id. An empty id is assigned a ULID.
    async fn insert(&self, record: Record) -> Result<String, StoreError>;

    /// Replace a row wholesale, returning the previous version.
    async fn update_by_id(&self, table: Table, id: &str, record: Record) -> Result<Record, StoreError>;

    /// Remove a row, returning it.
    async fn delete_by_id(&self, table: Table, id: &str) -> Result<Record, StoreError>;
}

// ── In-memory store ──────────────────────────────────────────────

/// `DashMap`-backed store. Paging follows insertion order; an update keeps
/// the row's position.
pub struct MemoryStore {
    rows: DashMap<(Table, String), (u64, Record)>,
    seq: AtomicU64,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            seq: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Simulate an outage: every call fails with `Unavailable` until restored.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store marked offline".into()))
        }
    }

    /// Every row in insertion order (used for compaction).
    pub fn snapshot(&self) -> Vec<Record> {
        let mut rows: Vec<(u64, Record)> = self.rows.iter().map(|e| e.value().clone()).collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, r)| r).collect()
    }

    pub fn contains(&self, table: Table, id: &str) -> bool {
        self.rows.contains_key(&(table, id.to_string()))
    }

    /// Insert a new row, assigning a ULID when the id is empty. Returns the
    /// stored row.
    pub(crate) fn insert_new(&self, mut record: Record) -> Result<Record, StoreError> {
        self.check_available()?;
        if record.booking_id().trim().is_empty() {
            record.set_booking_id(Ulid::new().to_string());
        }
        match self.rows.entry((record.table(), record.booking_id().to_string())) {
            Entry::Occupied(e) => Err(StoreError::AlreadyExists(e.key().1.clone())),
            Entry::Vacant(e) => {
                let seq = self.seq.fetch_add(1, Ordering::SeqCst);
                e.insert((seq, record.clone()));
                Ok(record)
            }
        }
    }

    /// Swap in a new version of an existing row, keeping its position.
    pub(crate) fn replace(&self, table: Table, id: &str, mut record: Record) -> Result<Record, StoreError> {
        self.check_available()?;
        if record.table() != table {
            return Err(StoreError::TableMismatch {
                expected: table,
                found: record.table(),
            });
        }
        record.set_booking_id(id.to_string());
        match self.rows.get_mut(&(table, id.to_string())) {
            Some(mut row) => Ok(std::mem::replace(&mut row.1, record)),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    pub(crate) fn remove(&self, table: Table, id: &str) -> Result<(u64, Record), StoreError> {
        self.check_available()?;
        self.rows
            .remove(&(table, id.to_string()))
            .map(|(_, row)| row)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Put a removed row back at its old position.
    pub(crate) fn restore(&self, seq: u64, record: Record) {
        self.rows.insert((record.table(), record.booking_id().to_string()), (seq, record));
    }

    /// Insert or replace without availability checks (log replay).
    pub(crate) fn apply_upsert(&self, record: Record) {
        let key = (record.table(), record.booking_id().to_string());
        let seq = match self.rows.get(&key) {
            Some(existing) => existing.0,
            None => self.seq.fetch_add(1, Ordering::SeqCst),
        };
        self.rows.insert(key, (seq, record));
    }

    pub(crate) fn apply_delete(&self, table: Table, id: &str) {
        self.rows.remove(&(table, id.to_string()));
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn list(&self, table: Table, filter: &Filter, page: PageRange) -> Result<Vec<Record>, StoreError> {
        self.check_available()?;
        page.validate()?;
        let mut hits: Vec<(u64, Record)> = self
            .rows
            .iter()
            .filter(|e| e.key().0 == table && filter.matches(&e.value().1))
            .map(|e| e.value().clone())
            .collect();
        hits.sort_by_key(|(seq, _)| *seq);
        Ok(hits
            .into_iter()
            .skip(page.from)
            .take(page.len())
            .map(|(_, r)| r)
            .collect())
    }

    async fn insert(&self, record: Record) -> Result<String, StoreError> {
        self.insert_new(record).map(|r| r.booking_id().to_string())
    }

    async fn update_by_id(&self, table: Table, id: &str, record: Record) -> Result<Record, StoreError> {
        self.replace(table, id, record)
    }

    async fn delete_by_id(&self, table: Table, id: &str) -> Result<Record, StoreError> {
        self.remove(table, id).map(|(_, r)| r)
    }
}
