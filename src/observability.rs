use std::net::SocketAddr;

// ── Load metrics ────────────────────────────────────────────────

/// Counter: booking rows normalised successfully.
pub const BOOKINGS_LOADED_TOTAL: &str = "innkeep_bookings_loaded_total";

/// Counter: booking rows dropped by the normaliser. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "innkeep_bookings_rejected_total";

/// Counter: store pages fetched. Labels: table.
pub const STORE_PAGES_TOTAL: &str = "innkeep_store_pages_total";

// ── Index metrics ───────────────────────────────────────────────

/// Counter: extra occupants placed into an already-taken cell.
pub const OVERBOOKINGS_TOTAL: &str = "innkeep_overbookings_total";

/// Histogram: occupancy index build time in seconds.
pub const INDEX_BUILD_DURATION_SECONDS: &str = "innkeep_index_build_duration_seconds";

/// Counter: month windows served from cache.
pub const CACHE_HITS_TOTAL: &str = "innkeep_cache_hits_total";

/// Counter: month windows loaded from the store.
pub const CACHE_MISSES_TOTAL: &str = "innkeep_cache_misses_total";

// ── Persistence metrics ─────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus metrics exporter: {e}"))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a store table.
pub fn table_label(table: crate::record::Table) -> &'static str {
    match table {
        crate::record::Table::Direct => "direct",
        crate::record::Table::Online => "online",
    }
}
