//! In-memory history log backing the record-management endpoints.

pub mod records;

pub use records::{HistoryStore, NewRecord, StoreError, CSV_EXPORT_HEADER};
