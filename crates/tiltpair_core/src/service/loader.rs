//! Correspondence loader.
//!
//! # Responsibility
//! - Build micrograph pairs from the top-level selfile.
//! - Restore each pair's particle picks from its sidecar files and estimate
//!   its angles.
//!
//! # Invariants
//! - Pairs keep selfile enumeration order.
//! - The n-th tilted record matches the n-th untilted record; surplus tilted
//!   records are an error, never truncated.
//! - A missing sidecar means "not processed yet", not a failure.

use crate::align::{AngleEstimate, TiltAligner};
use crate::metadata::{Label, MdLocation, MetaData};
use crate::model::family::Family;
use crate::model::micrograph::{MicrographId, ParticleError, UntiltedMicrograph};
use crate::repo::record_store::{RecordStore, StoreError};
use crate::service::error::{
    ConfigurationCause, PairLoadCause, PairLoadError, PickerError, PickerResult,
};
use crate::service::sidecar_location;
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

/// Result of restoring one pair.
#[derive(Debug)]
pub enum PairLoad {
    /// No untilted sidecar for this family.
    Unprocessed,
    Loaded { untilted: usize, tilted: usize },
    /// Sidecar unreadable; the pair was left without data.
    Failed(PairLoadError),
}

/// Pairs rebuilt from storage, plus the recoverable per-pair failures.
#[derive(Debug)]
pub struct LoadedPairs {
    pub micrographs: Vec<UntiltedMicrograph>,
    pub failures: Vec<PairLoadError>,
}

pub struct CorrespondenceLoader<'a, S: RecordStore, A: TiltAligner> {
    store: &'a S,
    aligner: &'a A,
    output_dir: &'a Path,
    family: &'a Family,
}

impl<'a, S: RecordStore, A: TiltAligner> CorrespondenceLoader<'a, S, A> {
    pub fn new(store: &'a S, aligner: &'a A, output_dir: &'a Path, family: &'a Family) -> Self {
        Self {
            store,
            aligner,
            output_dir,
            family,
        }
    }

    /// Loads every pair listed in `selfile` together with its picks.
    ///
    /// # Errors
    /// - `Configuration` when the selfile is unreadable, lacks a required
    ///   field, repeats a micrograph, maps two images onto one sidecar or
    ///   lists nothing.
    /// - `OutOfRange` when any pair has surplus tilted records.
    pub fn load(&self, selfile: &MdLocation) -> PickerResult<LoadedPairs> {
        let started_at = Instant::now();
        info!("event=picker_load module=service status=start selfile={selfile}");

        let mut micrographs = self.load_pairs(selfile).inspect_err(|err| {
            error!("event=picker_load module=service status=error selfile={selfile} error={err}");
        })?;

        let mut failures = Vec::new();
        for micrograph in &mut micrographs {
            if let PairLoad::Failed(failure) = self.load_micrograph_data(micrograph)? {
                failures.push(failure);
            }
        }

        info!(
            "event=picker_load module=service status=ok selfile={selfile} pairs={} failed={} duration_ms={}",
            micrographs.len(),
            failures.len(),
            started_at.elapsed().as_millis()
        );
        Ok(LoadedPairs {
            micrographs,
            failures,
        })
    }

    /// Builds linked, empty pairs in selfile enumeration order.
    pub fn load_pairs(&self, selfile: &MdLocation) -> PickerResult<Vec<UntiltedMicrograph>> {
        let configuration = |cause| PickerError::Configuration {
            selfile: selfile.clone(),
            cause,
        };

        let md = self
            .store
            .read(selfile)
            .map_err(|err| configuration(ConfigurationCause::Store(err)))?;

        let mut seen = HashSet::new();
        let mut sidecars: HashMap<String, String> = HashMap::new();
        let mut micrographs = Vec::with_capacity(md.len());
        for id in md.find_objects() {
            let image = md
                .get_string(&Label::Micrograph, id)
                .map_err(|err| configuration(ConfigurationCause::Field(err)))?;
            let tilted_image = md
                .get_string(&Label::MicrographTilted, id)
                .map_err(|err| configuration(ConfigurationCause::Field(err)))?;
            if !seen.insert(image.to_string()) {
                return Err(configuration(ConfigurationCause::DuplicateMicrograph(
                    image.to_string(),
                )));
            }

            let position = MicrographId(micrographs.len());
            let micrograph = UntiltedMicrograph::new(position, image, tilted_image);
            for (file, sidecar) in [
                (micrograph.file(), micrograph.output_name()),
                (micrograph.tilted().file(), micrograph.tilted().output_name()),
            ] {
                if let Some(owner) = sidecars.get(&sidecar) {
                    return Err(configuration(ConfigurationCause::SidecarClash {
                        sidecar,
                        first: owner.clone(),
                        second: file.to_string(),
                    }));
                }
                sidecars.insert(sidecar, file.to_string());
            }
            micrographs.push(micrograph);
        }

        if micrographs.is_empty() {
            return Err(configuration(ConfigurationCause::NoMicrographs));
        }
        Ok(micrographs)
    }

    /// Restores the picks of one pair and re-estimates its angles.
    ///
    /// Sidecar read failures are returned as `PairLoad::Failed`; only
    /// surplus tilted records abort.
    pub fn load_micrograph_data(
        &self,
        micrograph: &mut UntiltedMicrograph,
    ) -> PickerResult<PairLoad> {
        micrograph.reset();
        let untilted_location =
            sidecar_location(self.output_dir, self.family, &micrograph.output_name());
        let tilted_location =
            sidecar_location(self.output_dir, self.family, &micrograph.tilted().output_name());

        let untilted_md = match self.read_sidecar(&untilted_location) {
            Ok(Some(md)) => md,
            Ok(None) => {
                debug!(
                    "event=pair_load module=service status=skip micrograph={} reason=no_sidecar",
                    micrograph.file()
                );
                return Ok(PairLoad::Unprocessed);
            }
            Err(cause) => return Ok(self.fail(micrograph, untilted_location, cause)),
        };
        if let Err(cause) = append_untilted(micrograph, &untilted_md) {
            return Ok(self.fail(micrograph, untilted_location, cause));
        }

        match self.read_sidecar(&tilted_location) {
            Ok(Some(tilted_md)) => {
                if let Err(cause) = append_tilted(micrograph, &tilted_md)? {
                    return Ok(self.fail(micrograph, tilted_location, cause));
                }
            }
            Ok(None) => {}
            Err(cause) => return Ok(self.fail(micrograph, tilted_location, cause)),
        }

        let untilted = micrograph.particles().len();
        let tilted = micrograph.tilted().particles().len();
        let angles = match micrograph.align(self.aligner) {
            AngleEstimate::Computed(_) => "computed".to_string(),
            AngleEstimate::Degenerate(reason) => format!("degenerate reason=\"{reason}\""),
            AngleEstimate::Pending => "pending".to_string(),
        };
        info!(
            "event=pair_load module=service status=ok micrograph={} untilted={untilted} tilted={tilted} angles={angles}",
            micrograph.file()
        );
        Ok(PairLoad::Loaded { untilted, tilted })
    }

    fn read_sidecar(&self, location: &MdLocation) -> Result<Option<MetaData>, PairLoadCause> {
        match self.store.read(location) {
            Ok(md) => Ok(Some(md)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn fail(
        &self,
        micrograph: &mut UntiltedMicrograph,
        location: MdLocation,
        cause: PairLoadCause,
    ) -> PairLoad {
        micrograph.reset();
        let failure = PairLoadError {
            micrograph: micrograph.id(),
            location,
            cause,
        };
        warn!(
            "event=pair_load module=service status=error micrograph={} error={failure}",
            micrograph.file()
        );
        PairLoad::Failed(failure)
    }
}

fn append_untilted(
    micrograph: &mut UntiltedMicrograph,
    md: &MetaData,
) -> Result<(), PairLoadCause> {
    for id in md.find_objects() {
        let x = md.get_coordinate(&Label::XInt, id)?;
        let y = md.get_coordinate(&Label::YInt, id)?;
        micrograph.add_particle(x, y);
    }
    Ok(())
}

/// Outer error aborts the load; inner error is a recoverable bad record.
fn append_tilted(
    micrograph: &mut UntiltedMicrograph,
    md: &MetaData,
) -> PickerResult<Result<(), PairLoadCause>> {
    let untilted = micrograph.particles().len();
    if md.len() > untilted {
        return Err(PickerError::OutOfRange {
            micrograph: micrograph.file().to_string(),
            untilted,
            tilted: md.len(),
        });
    }

    for id in md.find_objects() {
        let (x, y) = match (
            md.get_coordinate(&Label::XInt, id),
            md.get_coordinate(&Label::YInt, id),
        ) {
            (Ok(x), Ok(y)) => (x, y),
            (Err(err), _) | (_, Err(err)) => return Ok(Err(err.into())),
        };
        micrograph
            .add_tilted_particle(x, y)
            .map_err(|err| match err {
                ParticleError::NoUnmatchedParticle { untilted } => PickerError::OutOfRange {
                    micrograph: micrograph.file().to_string(),
                    untilted,
                    tilted: md.len(),
                },
                other => PickerError::Particle {
                    micrograph: micrograph.file().to_string(),
                    source: other,
                },
            })?;
    }
    Ok(Ok(()))
}
