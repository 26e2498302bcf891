pub mod canon;
pub mod catalogue;
pub mod compactor;
pub mod engine;
pub mod limits;
pub mod model;
pub mod normalise;
pub mod observability;
pub mod record;
pub mod store;
pub mod wal;
pub mod wal_store;
