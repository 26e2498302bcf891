mod accounting;
mod cache;
mod error;
mod index;
mod mutations;
mod queries;
mod resolver;

pub use error::EngineError;
pub use mutations::ImportSummary;

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalogue::{Property, PropertyCatalogue};
use crate::limits::MAX_PAGES_PER_LOAD;
use crate::model::*;
use crate::normalise::normalise_all;
use crate::record::{Record, Table};
use crate::store::{BookingStore, Filter, PageRange};

use cache::WindowCache;
use index::OccupancyIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Withholding applied to each day's receivable.
    pub tds_rate: Decimal,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tds_rate: Decimal::new(3, 3),
        }
    }
}

/// One loaded month: every property's window plus the rows the load dropped.
/// Hand it back through [`Engine::restore`] to keep serving reads while the
/// store is down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSnapshot {
    pub month: Month,
    pub windows: BTreeMap<String, Vec<Booking>>,
    pub dropped: DropCounts,
}

/// Bookings gathered for a query: shared month windows, possibly
/// overlapping when a stay straddles months. The index dedupes by key.
pub(super) struct Window {
    parts: Vec<Arc<Vec<Booking>>>,
    dropped: DropCounts,
}

impl Window {
    fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.parts.iter().flat_map(|part| part.iter())
    }

    fn index<'a>(&'a self, catalogue: &'a PropertyCatalogue) -> OccupancyIndex<'a> {
        OccupancyIndex::build(catalogue, self.bookings())
    }

    /// Drop counts with the index's unresolved placements filled in.
    fn report<T>(&self, index: &OccupancyIndex<'_>, data: T) -> Report<T> {
        let mut dropped = self.dropped;
        dropped.unresolved = index.unresolved_count() as u64;
        Report { data, dropped }
    }
}

/// The query façade over a booking store.
///
/// Reads go through per-month windows cached by `(property, month)`.
/// Mutations go through the store and invalidate the windows they touch.
/// Everything after a store read is synchronous.
pub struct Engine {
    catalogue: Arc<PropertyCatalogue>,
    store: Arc<dyn BookingStore>,
    cache: WindowCache,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(catalogue: Arc<PropertyCatalogue>, store: Arc<dyn BookingStore>, settings: EngineSettings) -> Self {
        Self {
            catalogue,
            store,
            cache: WindowCache::new(),
            settings,
        }
    }

    pub fn catalogue(&self) -> &PropertyCatalogue {
        &self.catalogue
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Months currently held in the window cache.
    pub fn cached_months(&self) -> Vec<Month> {
        self.cache.loaded_months()
    }

    pub(super) fn month(year: i32, month: u32) -> Result<Month, EngineError> {
        Month::new(year, month).ok_or_else(|| EngineError::InvalidQuery(format!("no such month: {year}-{month:02}")))
    }

    /// Every row of `table` matching `filter`, page by page.
    pub(super) async fn fetch_all(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, EngineError> {
        let mut rows = Vec::new();
        let mut page = PageRange::first();
        for _ in 0..MAX_PAGES_PER_LOAD {
            let batch = self.store.list(table, filter, page).await?;
            metrics::counter!(
                crate::observability::STORE_PAGES_TOTAL,
                "table" => crate::observability::table_label(table)
            )
            .increment(1);
            let full = batch.len() == page.len();
            rows.extend(batch);
            if !full {
                return Ok(rows);
            }
            page = page.next();
        }
        Err(EngineError::LimitExceeded("too many store pages"))
    }

    /// Both tables, normalised.
    pub(super) async fn fetch_bookings(&self, filter: &Filter) -> Result<(Vec<Booking>, DropCounts), EngineError> {
        let mut records = self.fetch_all(Table::Direct, filter).await?;
        records.extend(self.fetch_all(Table::Online, filter).await?);
        Ok(normalise_all(&records, &self.catalogue))
    }

    async fn load_month(&self, month: Month) -> Result<(Vec<Arc<Vec<Booking>>>, DropCounts), EngineError> {
        let names: Vec<&str> = self.catalogue.all().map(Property::name).collect();
        if let Some(hit) = self.cache.month(month, &names) {
            return Ok(hit);
        }

        let generation = self.cache.generation();
        let first = month.first_day();
        let last = month.last_day();
        let (bookings, dropped) = self.fetch_bookings(&Filter::overlapping(first, last)).await?;

        let mut windows: BTreeMap<String, Vec<Booking>> =
            names.iter().map(|name| (name.to_string(), Vec::new())).collect();
        let mut kept = 0usize;
        for booking in bookings {
            if booking.check_in() > last || booking.stay.last_night() < first {
                continue;
            }
            if let Some(window) = windows.get_mut(&booking.property) {
                window.push(booking);
                kept += 1;
            }
        }
        info!(%month, bookings = kept, rejected = dropped.rejected(), "loaded month window");

        Ok((self.cache.fill_if_current(month, windows, dropped, generation), dropped))
    }

    /// Load (or reuse) every month in `months`.
    pub(super) async fn window(&self, months: impl IntoIterator<Item = Month>) -> Result<Window, EngineError> {
        let mut parts = Vec::new();
        let mut dropped = DropCounts::default();
        for month in months {
            let (month_parts, month_dropped) = self.load_month(month).await?;
            parts.extend(month_parts);
            dropped.merge(&month_dropped);
        }
        Ok(Window { parts, dropped })
    }

    /// The loaded state of one month, for the caller to keep.
    pub async fn month_snapshot(&self, year: i32, month: u32) -> Result<MonthSnapshot, EngineError> {
        let month = Self::month(year, month)?;
        let (parts, dropped) = self.load_month(month).await?;
        let windows = self
            .catalogue
            .all()
            .zip(parts)
            .map(|(property, part)| (property.name().to_string(), part.as_ref().clone()))
            .collect();
        Ok(MonthSnapshot {
            month,
            windows,
            dropped,
        })
    }

    /// Seed the cache with a snapshot. Properties missing from it get an
    /// empty window; properties the catalogue does not know are ignored.
    pub fn restore(&self, snapshot: MonthSnapshot) {
        let MonthSnapshot {
            month,
            mut windows,
            dropped,
        } = snapshot;
        let ordered: Vec<(String, Vec<Booking>)> = self
            .catalogue
            .all()
            .map(|p| (p.name().to_string(), windows.remove(p.name()).unwrap_or_default()))
            .collect();
        self.cache.fill(month, ordered, dropped);
        info!(%month, "restored month window from snapshot");
    }

    pub(super) fn invalidate(&self, property: &str, months: &[Month]) {
        self.cache.invalidate(property, months);
    }

    pub(super) fn invalidate_all(&self) {
        self.cache.clear();
    }
}
