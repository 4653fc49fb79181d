//! Record store abstraction and persistence implementation.
//!
//! # Responsibility
//! - Define the whole-table storage contract used by loading and saving.
//! - Isolate SQLite details from picker orchestration.
//!
//! # Invariants
//! - Missing tables are reported as `StoreError::NotFound`, never as empty
//!   tables.

pub mod record_store;
