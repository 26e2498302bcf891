use tracing::{debug, info, warn};

use crate::model::Month;
use crate::normalise::normalise;
use crate::record::{Record, Table};
use crate::store::StoreError;

use super::{Engine, EngineError};

impl Engine {
    /// Drop the windows a row's booking touches. A row that does not
    /// normalise could sit in any loaded month's drop counts, so everything
    /// goes.
    fn invalidate_record(&self, record: &Record) {
        match normalise(record, &self.catalogue) {
            Ok(booking) => self.invalidate(&booking.property, &Month::touching(&booking.stay)),
            Err(rejected) => {
                debug!(booking_id = %rejected.booking_id, "malformed row changed, clearing window cache");
                self.invalidate_all();
            }
        }
    }

    /// A write that fails in the store may already have been visible to a
    /// concurrent load before it was rolled back, so every window goes.
    fn write_failed(&self, e: StoreError) -> EngineError {
        if matches!(e, StoreError::Io(_) | StoreError::Unavailable(_)) {
            warn!("store write failed, clearing window cache: {e}");
            self.invalidate_all();
        }
        e.into()
    }

    /// Store a new booking row and return its id. Overlaps with existing
    /// bookings are accepted and surface as overbookings on the next read.
    pub async fn insert_booking(&self, record: Record) -> Result<String, EngineError> {
        let mut record = record;
        let id = self
            .store
            .insert(record.clone())
            .await
            .map_err(|e| self.write_failed(e))?;
        record.set_booking_id(id.clone());
        self.invalidate_record(&record);
        info!(booking_id = %id, table = ?record.table(), "inserted booking");
        Ok(id)
    }

    /// Replace a booking row wholesale, returning the previous version.
    pub async fn update_booking(&self, table: Table, id: &str, record: Record) -> Result<Record, EngineError> {
        let mut record = record;
        record.set_booking_id(id.to_string());
        let previous = self
            .store
            .update_by_id(table, id, record.clone())
            .await
            .map_err(|e| self.write_failed(e))?;
        self.invalidate_record(&previous);
        self.invalidate_record(&record);
        info!(booking_id = %id, ?table, "updated booking");
        Ok(previous)
    }

    pub async fn delete_booking(&self, table: Table, id: &str) -> Result<Record, EngineError> {
        let removed = self
            .store
            .delete_by_id(table, id)
            .await
            .map_err(|e| self.write_failed(e))?;
        self.invalidate_record(&removed);
        info!(booking_id = %id, ?table, "deleted booking");
        Ok(removed)
    }

    /// Load a batch of rows. Rows whose id already exists are skipped and
    /// counted; any other store failure stops the import.
    pub async fn import(&self, records: Vec<Record>) -> Result<ImportSummary, EngineError> {
        let mut summary = ImportSummary::default();
        for record in records {
            match self.store.insert(record).await {
                Ok(_) => summary.inserted += 1,
                Err(StoreError::AlreadyExists(id)) => {
                    debug!(booking_id = %id, "import skipped existing booking");
                    summary.skipped += 1;
                }
                Err(e) => {
                    self.invalidate_all();
                    return Err(e.into());
                }
            }
        }
        self.invalidate_all();
        info!(inserted = summary.inserted, skipped = summary.skipped, "imported booking rows");
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}
