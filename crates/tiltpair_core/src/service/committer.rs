//! Persistence committer.
//!
//! # Responsibility
//! - Turn in-memory pairs into sidecar record tables and selfile angles.
//! - Remove sidecars of pairs that no longer have data.
//!
//! # Invariants
//! - Everything is computed before the first write; a consistency failure
//!   leaves storage untouched.
//! - Sidecars are written first, the selfile exactly once at the end.
//! - Angle fields are written only for pairs with computed angles.
//! - The commit is not atomic across files: an I/O failure stops it and
//!   earlier sidecar writes stay in place.

use crate::align::TiltAngles;
use crate::metadata::{Label, MdLocation, MetaData, ObjectId};
use crate::model::family::Family;
use crate::model::micrograph::{MicrographId, UntiltedMicrograph};
use crate::repo::record_store::{RecordStore, StoreError};
use crate::service::error::{PickerError, PickerResult};
use crate::service::sidecar_location;
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

/// Counts of what one commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    /// Pairs whose sidecars were written.
    pub written: usize,
    /// Empty pairs whose stale sidecar was removed.
    pub cleaned: usize,
    /// Pairs left untouched (empty without sidecar, or unreadable at load).
    pub skipped: usize,
    /// Pairs whose angle fields were updated in the selfile.
    pub angles_written: usize,
}

#[derive(Debug)]
enum PairPlan {
    Skip,
    Clean(MdLocation),
    Write {
        untilted: (MdLocation, MetaData),
        tilted: (MdLocation, MetaData),
    },
}

pub struct PersistenceCommitter<'a, S: RecordStore> {
    store: &'a S,
    output_dir: &'a Path,
    family: &'a Family,
}

impl<'a, S: RecordStore> PersistenceCommitter<'a, S> {
    pub fn new(store: &'a S, output_dir: &'a Path, family: &'a Family) -> Self {
        Self {
            store,
            output_dir,
            family,
        }
    }

    /// Writes every pair and the updated selfile.
    ///
    /// Pairs listed in `unreadable` failed to load; they are skipped while
    /// they have no data so their sidecars are not deleted.
    ///
    /// # Errors
    /// - `InconsistentStore` when a pair has no selfile record (nothing is
    ///   written in that case).
    /// - `Persistence` wrapping the first I/O failure.
    pub fn commit(
        &self,
        selfile: &MdLocation,
        micrographs: &[UntiltedMicrograph],
        unreadable: &HashSet<MicrographId>,
    ) -> PickerResult<CommitSummary> {
        let started_at = Instant::now();
        info!(
            "event=picker_save module=service status=start selfile={selfile} pairs={}",
            micrographs.len()
        );

        let result = self.commit_inner(selfile, micrographs, unreadable);
        match &result {
            Ok(summary) => info!(
                "event=picker_save module=service status=ok selfile={selfile} written={} cleaned={} skipped={} angles={} duration_ms={}",
                summary.written,
                summary.cleaned,
                summary.skipped,
                summary.angles_written,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=picker_save module=service status=error selfile={selfile} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn commit_inner(
        &self,
        selfile: &MdLocation,
        micrographs: &[UntiltedMicrograph],
        unreadable: &HashSet<MicrographId>,
    ) -> PickerResult<CommitSummary> {
        let mut table = self.store.read(selfile).map_err(|source| PickerError::Persistence {
            location: selfile.clone(),
            source,
        })?;
        let lookup = micrograph_lookup(&table);

        let mut summary = CommitSummary::default();
        let mut plans = Vec::with_capacity(micrographs.len());
        for micrograph in micrographs {
            let id = lookup.get(micrograph.file()).copied().ok_or_else(|| {
                PickerError::InconsistentStore {
                    micrograph: micrograph.file().to_string(),
                    selfile: selfile.clone(),
                }
            })?;

            let angles = micrograph.angles().angles();
            if let Some(angles) = angles.filter(|_| micrograph.has_data()) {
                set_angles(&mut table, id, angles).map_err(|source| PickerError::Persistence {
                    location: selfile.clone(),
                    source,
                })?;
                summary.angles_written += 1;
            }
            plans.push(self.plan(micrograph, unreadable)?);
        }

        if plans.iter().any(|plan| matches!(plan, PairPlan::Write { .. })) {
            std::fs::create_dir_all(self.output_dir).map_err(|source| {
                let location = MdLocation::file(self.output_dir);
                PickerError::Persistence {
                    location: location.clone(),
                    source: StoreError::Io { location, source },
                }
            })?;
        }

        for (micrograph, plan) in micrographs.iter().zip(plans) {
            match plan {
                PairPlan::Skip => summary.skipped += 1,
                PairPlan::Clean(location) => {
                    if self.store.remove(&location).map_err(|source| {
                        PickerError::Persistence {
                            location: location.clone(),
                            source,
                        }
                    })? {
                        summary.cleaned += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
                PairPlan::Write { untilted, tilted } => {
                    for (location, md) in [&untilted, &tilted] {
                        self.store
                            .write(md, location)
                            .map_err(|source| PickerError::Persistence {
                                location: location.clone(),
                                source,
                            })?;
                    }
                    debug!(
                        "event=pair_save module=service status=ok micrograph={} untilted={} tilted={}",
                        micrograph.file(),
                        untilted.1.len(),
                        tilted.1.len()
                    );
                    summary.written += 1;
                }
            }
        }

        self.store
            .write(&table, selfile)
            .map_err(|source| PickerError::Persistence {
                location: selfile.clone(),
                source,
            })?;
        Ok(summary)
    }

    fn plan(
        &self,
        micrograph: &UntiltedMicrograph,
        unreadable: &HashSet<MicrographId>,
    ) -> PickerResult<PairPlan> {
        let untilted_location =
            sidecar_location(self.output_dir, self.family, &micrograph.output_name());

        if !micrograph.has_data() {
            if unreadable.contains(&micrograph.id()) {
                return Ok(PairPlan::Skip);
            }
            return Ok(PairPlan::Clean(untilted_location));
        }

        let tilted_location =
            sidecar_location(self.output_dir, self.family, &micrograph.tilted().output_name());
        let mut untilted_md = MetaData::new();
        let mut tilted_md = MetaData::new();
        for (index, particle) in micrograph.particles().iter().enumerate() {
            append_coordinates(&mut untilted_md, particle.x, particle.y, &untilted_location)?;
            if let Some(tilted) = micrograph.tilted_match(index) {
                append_coordinates(&mut tilted_md, tilted.x, tilted.y, &tilted_location)?;
            }
        }

        Ok(PairPlan::Write {
            untilted: (untilted_location, untilted_md),
            tilted: (tilted_location, tilted_md),
        })
    }
}

/// Untilted image path → selfile record. Records without a path are ignored.
fn micrograph_lookup(table: &MetaData) -> HashMap<String, ObjectId> {
    table
        .find_objects()
        .into_iter()
        .filter_map(|id| {
            let file = table.get_string(&Label::Micrograph, id).ok()?;
            Some((file.to_string(), id))
        })
        .collect()
}

fn set_angles(table: &mut MetaData, id: ObjectId, angles: TiltAngles) -> Result<(), StoreError> {
    table.set_value(Label::AngleY, angles.angle_y, id)?;
    table.set_value(Label::AngleY2, angles.angle_y2, id)?;
    table.set_value(Label::AngleTilt, angles.angle_tilt, id)?;
    Ok(())
}

fn append_coordinates(
    md: &mut MetaData,
    x: i32,
    y: i32,
    location: &MdLocation,
) -> PickerResult<()> {
    let id = md.add_object();
    md.set_value(Label::XInt, x, id)
        .and_then(|()| md.set_value(Label::YInt, y, id))
        .map_err(|err| PickerError::Persistence {
            location: location.clone(),
            source: err.into(),
        })
}
