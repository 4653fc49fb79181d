//! Tilt-pair use-case services.
//!
//! # Responsibility
//! - Load pairs and picks from record storage (`loader`).
//! - Commit in-memory picks and angles back to storage (`committer`).
//! - Expose the picker facade that owns all pair state (`picker`).

use crate::metadata::MdLocation;
use crate::model::family::Family;
use std::path::Path;

pub mod committer;
pub mod error;
pub mod loader;
pub mod picker;

/// `<family>@<output_dir>/<file_name>`: one block per family, so several
/// families can share an output directory.
pub fn sidecar_location(output_dir: &Path, family: &Family, file_name: &str) -> MdLocation {
    MdLocation::new(family.name(), output_dir.join(file_name))
}
