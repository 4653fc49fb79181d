//! Tilt pair picker facade.
//!
//! # Responsibility
//! - Own every micrograph pair of one picking session.
//! - Route queries and mutations, keeping angles current after each change.
//! - Orchestrate loading on construction and committing on save.
//!
//! # Invariants
//! - The micrograph list is built once and keeps its order for the whole
//!   session; pairs are reset, never removed.
//! - Any particle change on a pair re-runs the aligner for that pair.
//! - `is_changed` is per picker; a successful `save` clears it.

use crate::align::{AffineTiltAligner, AngleEstimate, TiltAligner};
use crate::config::PickerConfig;
use crate::metadata::MdLocation;
use crate::model::family::{Color, Family};
use crate::model::micrograph::{MicrographId, ParticleError, UntiltedMicrograph};
use crate::model::particle::UntiltedParticle;
use crate::repo::record_store::{RecordStore, SqliteRecordStore};
use crate::service::committer::{CommitSummary, PersistenceCommitter};
use crate::service::error::{PairLoadError, PickerError, PickerResult};
use crate::service::loader::CorrespondenceLoader;
use log::{debug, info};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Outcome of a mutating picker call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Changed,
    Unchanged,
}

impl StateChange {
    pub fn is_changed(self) -> bool {
        self == Self::Changed
    }

    fn from_flag(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }
}

/// Session state of a tilt-pair picking run.
pub struct TiltPairPicker<S = SqliteRecordStore, A = AffineTiltAligner>
where
    S: RecordStore,
    A: TiltAligner,
{
    selfile: MdLocation,
    output_dir: PathBuf,
    family: Family,
    micrographs: Vec<UntiltedMicrograph>,
    load_failures: Vec<PairLoadError>,
    store: S,
    aligner: A,
    changed: bool,
}

impl TiltPairPicker {
    /// Opens a picker on SQLite record files with the affine aligner.
    pub fn from_config(config: &PickerConfig) -> PickerResult<Self> {
        Self::open(
            MdLocation::parse(&config.selfile),
            config.output_dir.clone(),
            config.family.clone(),
            SqliteRecordStore::new(),
            AffineTiltAligner::new(),
        )
    }
}

impl<S: RecordStore, A: TiltAligner> TiltPairPicker<S, A> {
    /// Loads all pairs from `selfile` and their picks from `output_dir`.
    ///
    /// # Errors
    /// - `InvalidFamily` for a blank family name or zero size.
    /// - `Configuration` when the selfile cannot provide at least one pair.
    /// - `OutOfRange` when a tilted sidecar outnumbers its untilted sidecar.
    pub fn open(
        selfile: MdLocation,
        output_dir: impl Into<PathBuf>,
        family: Family,
        store: S,
        aligner: A,
    ) -> PickerResult<Self> {
        family.validate()?;
        let output_dir = output_dir.into();
        let loaded = CorrespondenceLoader::new(&store, &aligner, &output_dir, &family)
            .load(&selfile)?;

        Ok(Self {
            selfile,
            output_dir,
            family,
            micrographs: loaded.micrographs,
            load_failures: loaded.failures,
            store,
            aligner,
            changed: false,
        })
    }

    pub fn selfile(&self) -> &MdLocation {
        &self.selfile
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn family(&self) -> &Family {
        &self.family
    }

    pub fn size(&self) -> u32 {
        self.family.size()
    }

    pub fn color(&self) -> Color {
        self.family.color()
    }

    pub fn set_size(&mut self, size: u32) -> StateChange {
        self.family.set_size(size);
        self.mark_changed(true)
    }

    pub fn set_color(&mut self, color: Color) -> StateChange {
        self.family.set_color(color);
        self.mark_changed(true)
    }

    pub fn micrographs(&self) -> &[UntiltedMicrograph] {
        &self.micrographs
    }

    pub fn micrograph(&self, pair: usize) -> Option<&UntiltedMicrograph> {
        self.micrographs.get(pair)
    }

    pub fn micrograph_by_file(&self, file: &str) -> Option<&UntiltedMicrograph> {
        self.micrographs
            .iter()
            .find(|micrograph| micrograph.file() == file)
    }

    /// Pairs whose sidecars could not be read when the picker was opened.
    pub fn load_failures(&self) -> &[PairLoadError] {
        &self.load_failures
    }

    /// Position of the first pair without picks, in list order.
    pub fn next_free_micrograph(&self) -> Option<usize> {
        self.micrographs
            .iter()
            .position(|micrograph| !micrograph.has_data())
    }

    /// Clears a pair's picks and angles; the pair stays in the list.
    pub fn reset_micrograph(&mut self, pair: usize) -> PickerResult<StateChange> {
        pair_mut(&mut self.micrographs, pair)?.reset();
        Ok(self.mark_changed(true))
    }

    pub fn untilted_particle_count(&self) -> usize {
        self.micrographs
            .iter()
            .map(|micrograph| micrograph.particles().len())
            .sum()
    }

    pub fn tilted_particle_count(&self) -> usize {
        self.micrographs
            .iter()
            .map(|micrograph| micrograph.tilted().particles().len())
            .sum()
    }

    /// Manually picked particles; every untilted pick is manual here.
    pub fn manual_particle_count(&self) -> usize {
        self.untilted_particle_count()
    }

    /// Adds an untilted pick and returns its index within the pair.
    pub fn add_untilted_particle(&mut self, pair: usize, x: i32, y: i32) -> PickerResult<usize> {
        let micrograph = pair_mut(&mut self.micrographs, pair)?;
        let index = micrograph.add_particle(x, y);
        realign(micrograph, &self.aligner);
        self.changed = true;
        Ok(index)
    }

    /// Adds the tilted pick for the first unmatched untilted pick.
    pub fn add_tilted_particle(&mut self, pair: usize, x: i32, y: i32) -> PickerResult<usize> {
        let micrograph = pair_mut(&mut self.micrographs, pair)?;
        let index = micrograph
            .add_tilted_particle(x, y)
            .map_err(|source| particle_error(micrograph, source))?;
        realign(micrograph, &self.aligner);
        self.changed = true;
        Ok(index)
    }

    /// Removes an untilted pick together with its tilted match.
    pub fn remove_untilted_particle(
        &mut self,
        pair: usize,
        index: usize,
    ) -> PickerResult<UntiltedParticle> {
        let micrograph = pair_mut(&mut self.micrographs, pair)?;
        let removed = micrograph
            .remove_particle(index)
            .map_err(|source| particle_error(micrograph, source))?;
        realign(micrograph, &self.aligner);
        self.changed = true;
        Ok(removed)
    }

    /// Removes the most recent tilted match of a pair.
    pub fn remove_tilted_particle(&mut self, pair: usize) -> PickerResult<StateChange> {
        let micrograph = pair_mut(&mut self.micrographs, pair)?;
        let removed = micrograph.pop_tilted_particle().is_some();
        if removed {
            realign(micrograph, &self.aligner);
        }
        Ok(self.mark_changed(removed))
    }

    pub fn set_untilted_position(
        &mut self,
        pair: usize,
        index: usize,
        x: i32,
        y: i32,
    ) -> PickerResult<StateChange> {
        let micrograph = pair_mut(&mut self.micrographs, pair)?;
        let moved = micrograph
            .set_particle_position(index, x, y)
            .map_err(|source| particle_error(micrograph, source))?;
        if moved {
            realign(micrograph, &self.aligner);
        }
        Ok(self.mark_changed(moved))
    }

    /// Moves the tilted match of untilted pick `index`.
    pub fn set_tilted_position(
        &mut self,
        pair: usize,
        index: usize,
        x: i32,
        y: i32,
    ) -> PickerResult<StateChange> {
        let micrograph = pair_mut(&mut self.micrographs, pair)?;
        let moved = micrograph
            .set_tilted_position(index, x, y)
            .map_err(|source| particle_error(micrograph, source))?;
        if moved {
            realign(micrograph, &self.aligner);
        }
        Ok(self.mark_changed(moved))
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Commits all pairs and angles; clears the changed state on success.
    pub fn save(&mut self) -> PickerResult<CommitSummary> {
        let unreadable: HashSet<MicrographId> = self
            .load_failures
            .iter()
            .map(|failure| failure.micrograph)
            .collect();
        let summary = PersistenceCommitter::new(&self.store, &self.output_dir, &self.family)
            .commit(&self.selfile, &self.micrographs, &unreadable)?;

        self.changed = false;
        info!(
            "event=picker_state module=service status=ok selfile={} changed=false",
            self.selfile
        );
        Ok(summary)
    }

    fn mark_changed(&mut self, changed: bool) -> StateChange {
        self.changed |= changed;
        StateChange::from_flag(changed)
    }
}

fn pair_mut(
    micrographs: &mut [UntiltedMicrograph],
    pair: usize,
) -> PickerResult<&mut UntiltedMicrograph> {
    micrographs
        .get_mut(pair)
        .ok_or(PickerError::UnknownMicrograph(pair))
}

fn realign(micrograph: &mut UntiltedMicrograph, aligner: &impl TiltAligner) {
    let angles = match micrograph.align(aligner) {
        AngleEstimate::Computed(_) => "computed",
        AngleEstimate::Degenerate(_) => "degenerate",
        AngleEstimate::Pending => "pending",
    };
    debug!(
        "event=align module=service status=ok micrograph={} matched={} angles={angles}",
        micrograph.file(),
        micrograph.tilted().particles().len()
    );
}

fn particle_error(micrograph: &UntiltedMicrograph, source: ParticleError) -> PickerError {
    PickerError::Particle {
        micrograph: micrograph.file().to_string(),
        source,
    }
}
