use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::wal_store::WalStore;

/// Background task that compacts the booking WAL once it has grown by
/// `threshold` appends since the last compaction.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let appended = store.appends_since_compact().await;
        if appended < threshold {
            debug!(appended, threshold, "compactor skip");
            continue;
        }
        match store.compact().await {
            Ok(()) => info!(appended, rows = store.len(), "compacted WAL"),
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DirectRecord, Record, Table};
    use crate::store::BookingStore;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compactor_resets_append_counter() {
        let path = test_wal_path("compactor.wal");
        let store = Arc::new(WalStore::open(&path).unwrap());
        let row = |room: &str| {
            Record::Direct(DirectRecord {
                booking_id: "B1".into(),
                room_no: Some(room.into()),
                ..Default::default()
            })
        };
        store.insert(row("101")).await.unwrap();
        for room in ["102", "103", "104"] {
            store.update_by_id(Table::Direct, "B1", row(room)).await.unwrap();
        }
        assert_eq!(store.appends_since_compact().await, 4);

        let task = tokio::spawn(run_compactor(store.clone(), 3, Duration::from_millis(10)));
        for _ in 0..100 {
            if store.appends_since_compact().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(store.len(), 1);
    }
}
