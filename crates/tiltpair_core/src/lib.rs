//! Tilt-pair correspondence and persistence core.
//!
//! Holds untilted/tilted micrograph pairs, their particle picks and the
//! estimated tilt geometry, and round-trips them through SQLite record files.

pub mod align;
pub mod config;
pub mod db;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod repo;
pub mod service;

pub use align::{
    AffineTiltAligner, AngleEstimate, DegenerateGeometry, PointPair, TiltAligner, TiltAngles,
};
pub use config::{ConfigError, PickerConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use metadata::{Label, MdLocation, MdValue, MetaData, MetadataError, ObjectId};
pub use model::family::{Color, Family, FamilyError};
pub use model::micrograph::{MicrographId, ParticleError, TiltedMicrograph, UntiltedMicrograph};
pub use model::particle::{TiltedParticle, UntiltedParticle};
pub use repo::record_store::{RecordStore, SqliteRecordStore, StoreError, StoreResult};
pub use service::committer::CommitSummary;
pub use service::error::{ConfigurationCause, PairLoadError, PickerError, PickerResult};
pub use service::picker::{StateChange, TiltPairPicker};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
