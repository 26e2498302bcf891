use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{info, warn};

use crate::record::{Record, Table};
use crate::store::{BookingStore, Filter, MemoryStore, PageRange, StoreError};
use crate::wal::{Wal, WalEvent};

// ── Writer task ──────────────────────────────────────────────

type Ack = oneshot::Sender<io::Result<()>>;

enum WriterCommand {
    Log { event: WalEvent, ack: Ack },
    Rewrite { events: Vec<WalEvent>, ack: Ack },
    Appended { reply: oneshot::Sender<u64> },
}

/// Owns the log. Every `Log` already queued when one arrives joins its
/// batch, and the whole batch shares one fsync.
async fn writer_task(mut wal: Wal, mut rx: mpsc::Receiver<WriterCommand>) {
    let mut next = rx.recv().await;
    while let Some(cmd) = next.take() {
        match cmd {
            WriterCommand::Log { event, ack } => {
                let mut batch = vec![(event, ack)];
                while let Ok(queued) = rx.try_recv() {
                    match queued {
                        WriterCommand::Log { event, ack } => batch.push((event, ack)),
                        other => {
                            next = Some(other);
                            break;
                        }
                    }
                }
                commit(&mut wal, batch);
            }
            WriterCommand::Rewrite { events, ack } => {
                let _ = ack.send(wal.rewrite(&events));
            }
            WriterCommand::Appended { reply } => {
                let _ = reply.send(wal.appended());
            }
        }
        if next.is_none() {
            next = rx.recv().await;
        }
    }
}

fn commit(wal: &mut Wal, batch: Vec<(WalEvent, Ack)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();
    let pushed = batch.iter().try_for_each(|(event, _)| wal.push(event));
    // Sync even after a failed push so a half-written batch is not carried
    // into the next one.
    let synced = wal.sync();
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

    let outcome = pushed.and(synced);
    for (_, ack) in batch {
        let _ = ack.send(match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        });
    }
}

// ── WAL-backed store ─────────────────────────────────────────────

/// A [`MemoryStore`] made durable by a group-committed WAL.
///
/// Each mutation is applied in memory first and then logged; if the log write
/// fails the memory change is rolled back and the caller sees `Io`.
/// Compaction takes the gate exclusively so no mutation can fall between the
/// snapshot and the file swap.
pub struct WalStore {
    memory: MemoryStore,
    writer: mpsc::Sender<WriterCommand>,
    gate: RwLock<()>,
}

impl WalStore {
    /// Open (or create) the log at `path` and replay it. Must be called from
    /// inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let memory = MemoryStore::new();
        let events = Wal::replay(path)?;
        let replayed = events.len();
        for event in events {
            match event {
                WalEvent::Upserted(record) => memory.apply_upsert(record),
                WalEvent::Deleted { table, booking_id } => memory.apply_delete(table, &booking_id),
            }
        }
        info!(path = %path.display(), events = replayed, rows = memory.len(), "replayed booking WAL");

        let (writer, rx) = mpsc::channel(4096);
        tokio::spawn(writer_task(Wal::open(path)?, rx));
        Ok(Self {
            memory,
            writer,
            gate: RwLock::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Send a command carrying an ack and wait for the writer's answer.
    async fn request(&self, make: impl FnOnce(Ack) -> WriterCommand) -> Result<(), StoreError> {
        let (ack, done) = oneshot::channel();
        self.writer
            .send(make(ack))
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        done.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(StoreError::Io)
    }

    async fn log(&self, event: WalEvent) -> Result<(), StoreError> {
        self.request(|ack| WriterCommand::Log { event, ack }).await
    }

    /// Rewrite the log as one upsert per live row.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _exclusive = self.gate.write().await;
        let events: Vec<WalEvent> = self.memory.snapshot().into_iter().map(WalEvent::Upserted).collect();
        let rows = events.len();
        self.request(|ack| WriterCommand::Rewrite { events, ack }).await?;
        info!(rows, "compacted booking WAL");
        Ok(())
    }

    /// Log appends since open or the last compaction; 0 if the writer is gone.
    pub async fn appends_since_compact(&self) -> u64 {
        let (reply, answer) = oneshot::channel();
        if self.writer.send(WriterCommand::Appended { reply }).await.is_err() {
            return 0;
        }
        answer.await.unwrap_or(0)
    }
}

#[async_trait]
impl BookingStore for WalStore {
    async fn list(&self, table: Table, filter: &Filter, page: PageRange) -> Result<Vec<Record>, StoreError> {
        self.memory.list(table, filter, page).await
    }

    async fn insert(&self, record: Record) -> Result<String, StoreError> {
        let _shared = self.gate.read().await;
        let stored = self.memory.insert_new(record)?;
        let id = stored.booking_id().to_string();
        let table = stored.table();
        if let Err(e) = self.log(WalEvent::Upserted(stored)).await {
            warn!(booking_id = %id, "WAL append failed, rolling back insert: {e}");
            self.memory.apply_delete(table, &id);
            return Err(e);
        }
        Ok(id)
    }

    async fn update_by_id(&self, table: Table, id: &str, record: Record) -> Result<Record, StoreError> {
        let _shared = self.gate.read().await;
        let mut record = record;
        record.set_booking_id(id.to_string());
        let previous = self.memory.replace(table, id, record.clone())?;
        if let Err(e) = self.log(WalEvent::Upserted(record)).await {
            warn!(booking_id = %id, "WAL append failed, rolling back update: {e}");
            self.memory.apply_upsert(previous);
            return Err(e);
        }
        Ok(previous)
    }

    async fn delete_by_id(&self, table: Table, id: &str) -> Result<Record, StoreError> {
        let _shared = self.gate.read().await;
        let (seq, removed) = self.memory.remove(table, id)?;
        let event = WalEvent::Deleted {
            table,
            booking_id: id.to_string(),
        };
        if let Err(e) = self.log(event).await {
            warn!(booking_id = %id, "WAL append failed, rolling back delete: {e}");
            self.memory.restore(seq, removed);
            return Err(e);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DirectRecord;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_wal_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn direct(id: &str, room: &str) -> Record {
        Record::Direct(DirectRecord {
            booking_id: id.into(),
            room_no: Some(room.into()),
            check_in: Some("2025-03-10".into()),
            check_out: Some("2025-03-12".into()),
            ..Default::default()
        })
    }

    async fn rooms(store: &WalStore) -> Vec<(String, Option<String>)> {
        store
            .list(Table::Direct, &Filter::default(), PageRange::first())
            .await
            .unwrap()
            .into_iter()
            .map(|r| match r {
                Record::Direct(d) => (d.booking_id, d.room_no),
                Record::Online(o) => (o.booking_id, o.room_no),
            })
            .collect()
    }

    #[tokio::test]
    async fn mutations_survive_restart() {
        let path = test_wal_path("restart.wal");
        {
            let store = WalStore::open(&path).unwrap();
            store.insert(direct("A", "101")).await.unwrap();
            store.insert(direct("B", "102")).await.unwrap();
            store.insert(direct("C", "103")).await.unwrap();
            store.update_by_id(Table::Direct, "A", direct("A", "104")).await.unwrap();
            store.delete_by_id(Table::Direct, "B").await.unwrap();
            assert_eq!(store.appends_since_compact().await, 5);
        }
        let store = WalStore::open(&path).unwrap();
        assert_eq!(
            rooms(&store).await,
            vec![("A".into(), Some("104".into())), ("C".into(), Some("103".into()))]
        );
    }

    #[tokio::test]
    async fn compact_preserves_rows_and_order() {
        let path = test_wal_path("compact.wal");
        let store = WalStore::open(&path).unwrap();
        for (id, room) in [("A", "101"), ("B", "102"), ("C", "103")] {
            store.insert(direct(id, room)).await.unwrap();
        }
        for room in ["201", "202", "203"] {
            store.update_by_id(Table::Direct, "B", direct("B", room)).await.unwrap();
        }
        let before = rooms(&store).await;
        let size_before = std::fs::metadata(&path).unwrap().len();

        store.compact().await.unwrap();
        assert_eq!(store.appends_since_compact().await, 0);
        let size_after = std::fs::metadata(&path).unwrap().len();
        assert!(size_after < size_before, "compacted WAL ({size_after}) should be smaller than {size_before}");

        store.insert(direct("D", "301")).await.unwrap();
        drop(store);

        let reopened = WalStore::open(&path).unwrap();
        let mut expected = before;
        expected.push(("D".into(), Some("301".into())));
        assert_eq!(rooms(&reopened).await, expected);
    }

    #[tokio::test]
    async fn concurrent_inserts_group_commit() {
        let path = test_wal_path("concurrent.wal");
        let store = std::sync::Arc::new(WalStore::open(&path).unwrap());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(direct(&format!("B{i:02}"), "101")).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.len(), 50);
        drop(store);
        assert_eq!(Wal::replay(&path).unwrap().len(), 50);
    }
}
