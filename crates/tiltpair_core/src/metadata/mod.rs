//! Structured record tables ("metadata").
//!
//! # Responsibility
//! - Model ordered records with typed, label-keyed fields.
//! - Address tables inside files with `block@path` locations.
//!
//! # Invariants
//! - Tables are plain values; persistence lives in `repo::record_store`.

mod label;
mod location;
mod table;

pub use label::Label;
pub use location::MdLocation;
pub use table::{MdValue, MetaData, MetadataError, MetadataResult, ObjectId};
