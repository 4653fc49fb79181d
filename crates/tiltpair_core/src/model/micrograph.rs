//! Untilted/tilted micrograph pair.
//!
//! # Responsibility
//! - Own both particle lists of one tilt pair and keep them in lock-step.
//! - Own the tilt angles estimated from the matched particles.
//!
//! # Invariants
//! - Every untilted micrograph owns exactly one tilted micrograph, and the
//!   tilted side points back through a non-owning [`MicrographId`].
//! - Tilted particle `k` matches untilted particle `k`; matched particles
//!   form a prefix of the untilted list, so `tilted.len() <= untilted.len()`.
//! - A pair has data iff its untilted particle list is non-empty; angles
//!   are `Pending` whenever it has none.

use crate::align::{AngleEstimate, PointPair, TiltAligner};
use crate::model::particle::{TiltedParticle, UntiltedParticle};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Extension of per-micrograph coordinate files.
pub const OUTPUT_EXTENSION: &str = "pos";

/// Position of an untilted micrograph in the picker's ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MicrographId(pub usize);

/// Rejected particle mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticleError {
    IndexOutOfRange { index: usize, len: usize },
    /// Every untilted particle already has a tilted match.
    NoUnmatchedParticle { untilted: usize },
}

impl Display for ParticleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "particle index {index} out of range for {len} particles")
            }
            Self::NoUnmatchedParticle { untilted } => write!(
                f,
                "all {untilted} untilted particles already have a tilted match"
            ),
        }
    }
}

impl Error for ParticleError {}

/// Returns `<stem>.pos` for an image path.
pub fn output_file_name(image: &str) -> String {
    let stem = Path::new(image)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(image);
    format!("{stem}.{OUTPUT_EXTENSION}")
}

/// Tilted side of a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TiltedMicrograph {
    file: String,
    particles: Vec<TiltedParticle>,
    untilted: MicrographId,
}

impl TiltedMicrograph {
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn particles(&self) -> &[TiltedParticle] {
        &self.particles
    }

    pub fn untilted_micrograph(&self) -> MicrographId {
        self.untilted
    }

    pub fn output_name(&self) -> String {
        output_file_name(&self.file)
    }
}

/// Untilted side of a pair; owner of the whole pair state.
#[derive(Debug, Clone, PartialEq)]
pub struct UntiltedMicrograph {
    id: MicrographId,
    file: String,
    particles: Vec<UntiltedParticle>,
    tilted: TiltedMicrograph,
    angles: AngleEstimate,
}

impl UntiltedMicrograph {
    pub fn new(id: MicrographId, file: impl Into<String>, tilted_file: impl Into<String>) -> Self {
        Self {
            id,
            file: file.into(),
            particles: Vec::new(),
            tilted: TiltedMicrograph {
                file: tilted_file.into(),
                particles: Vec::new(),
                untilted: id,
            },
            angles: AngleEstimate::Pending,
        }
    }

    pub fn id(&self) -> MicrographId {
        self.id
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn output_name(&self) -> String {
        output_file_name(&self.file)
    }

    pub fn particles(&self) -> &[UntiltedParticle] {
        &self.particles
    }

    pub fn tilted(&self) -> &TiltedMicrograph {
        &self.tilted
    }

    pub fn angles(&self) -> &AngleEstimate {
        &self.angles
    }

    pub fn has_data(&self) -> bool {
        !self.particles.is_empty()
    }

    /// Tilted particle matched to untilted particle `index`, if any.
    pub fn tilted_match(&self, index: usize) -> Option<&TiltedParticle> {
        self.particles
            .get(index)
            .and_then(UntiltedParticle::tilted_index)
            .and_then(|tilted| self.tilted.particles.get(tilted))
    }

    /// Appends an untilted pick and returns its index.
    pub fn add_particle(&mut self, x: i32, y: i32) -> usize {
        self.particles.push(UntiltedParticle::new(x, y));
        self.particles.len() - 1
    }

    /// Appends a tilted pick matched to the first unmatched untilted pick.
    pub fn add_tilted_particle(&mut self, x: i32, y: i32) -> Result<usize, ParticleError> {
        let index = self.tilted.particles.len();
        let Some(untilted) = self.particles.get_mut(index) else {
            return Err(ParticleError::NoUnmatchedParticle {
                untilted: self.particles.len(),
            });
        };
        untilted.set_tilted_index(Some(index));
        self.tilted.particles.push(TiltedParticle::new(x, y, index));
        Ok(index)
    }

    /// Removes an untilted pick together with its tilted match.
    pub fn remove_particle(&mut self, index: usize) -> Result<UntiltedParticle, ParticleError> {
        if index >= self.particles.len() {
            return Err(ParticleError::IndexOutOfRange {
                index,
                len: self.particles.len(),
            });
        }

        let removed = self.particles.remove(index);
        if let Some(tilted_index) = removed.tilted_index() {
            self.tilted.particles.remove(tilted_index);
            for particle in &mut self.particles {
                if let Some(other) = particle.tilted_index().filter(|other| *other > tilted_index) {
                    particle.set_tilted_index(Some(other - 1));
                }
            }
        }
        for tilted in &mut self.tilted.particles {
            if tilted.untilted_index() > index {
                tilted.set_untilted_index(tilted.untilted_index() - 1);
            }
        }
        if self.particles.is_empty() {
            self.angles = AngleEstimate::Pending;
        }

        Ok(removed)
    }

    /// Drops the most recent tilted match; the untilted pick stays.
    pub fn pop_tilted_particle(&mut self) -> Option<TiltedParticle> {
        let removed = self.tilted.particles.pop()?;
        if let Some(untilted) = self.particles.get_mut(removed.untilted_index()) {
            untilted.set_tilted_index(None);
        }
        Some(removed)
    }

    /// Moves an untilted pick. Returns whether the coordinates changed.
    pub fn set_particle_position(
        &mut self,
        index: usize,
        x: i32,
        y: i32,
    ) -> Result<bool, ParticleError> {
        let len = self.particles.len();
        let particle = self
            .particles
            .get_mut(index)
            .ok_or(ParticleError::IndexOutOfRange { index, len })?;
        let changed = (particle.x, particle.y) != (x, y);
        particle.x = x;
        particle.y = y;
        Ok(changed)
    }

    /// Moves the tilted pick matched to untilted pick `index`.
    pub fn set_tilted_position(
        &mut self,
        index: usize,
        x: i32,
        y: i32,
    ) -> Result<bool, ParticleError> {
        let len = self.tilted.particles.len();
        let tilted_index = self
            .particles
            .get(index)
            .and_then(UntiltedParticle::tilted_index)
            .ok_or(ParticleError::IndexOutOfRange { index, len })?;
        let particle = &mut self.tilted.particles[tilted_index];
        let changed = (particle.x, particle.y) != (x, y);
        particle.x = x;
        particle.y = y;
        Ok(changed)
    }

    /// Matched coordinate pairs in untilted order.
    pub fn point_pairs(&self) -> Vec<PointPair> {
        self.particles
            .iter()
            .filter_map(|particle| {
                let tilted = self.tilted.particles.get(particle.tilted_index()?)?;
                Some(PointPair::new(
                    (particle.x, particle.y),
                    (tilted.x, tilted.y),
                ))
            })
            .collect()
    }

    /// Re-estimates angles from the current matches.
    pub fn align(&mut self, aligner: &impl TiltAligner) -> &AngleEstimate {
        self.angles = if self.has_data() {
            AngleEstimate::from_result(aligner.compute(&self.point_pairs()))
        } else {
            AngleEstimate::Pending
        };
        &self.angles
    }

    /// Clears both particle lists and the angles; the pair itself stays.
    pub fn reset(&mut self) {
        self.particles.clear();
        self.tilted.particles.clear();
        self.angles = AngleEstimate::Pending;
    }
}

#[cfg(test)]
mod tests {
    use super::{output_file_name, MicrographId, ParticleError, UntiltedMicrograph};
    use crate::align::{AngleEstimate, DegenerateGeometry, PointPair, TiltAligner, TiltAngles};

    struct CountingAligner;

    impl TiltAligner for CountingAligner {
        fn compute(&self, pairs: &[PointPair]) -> Result<TiltAngles, DegenerateGeometry> {
            if pairs.is_empty() {
                return Err(DegenerateGeometry::TooFewPairs { needed: 1, got: 0 });
            }
            Ok(TiltAngles {
                angle_y: pairs.len() as f64,
                angle_y2: 0.0,
                angle_tilt: 0.0,
            })
        }
    }

    fn pair_with_particles(count: i32, matched: i32) -> UntiltedMicrograph {
        let mut micrograph = UntiltedMicrograph::new(MicrographId(0), "mic1.img", "mic1t.img");
        for i in 0..count {
            micrograph.add_particle(i * 10, i * 10 + 1);
        }
        for i in 0..matched {
            micrograph.add_tilted_particle(i * 10 + 2, i * 10 + 3).unwrap();
        }
        micrograph
    }

    #[test]
    fn output_name_replaces_extension() {
        assert_eq!(output_file_name("data/mic1.img"), "mic1.pos");
        assert_eq!(output_file_name("mic1t"), "mic1t.pos");
    }

    #[test]
    fn new_pair_links_both_sides() {
        let micrograph = UntiltedMicrograph::new(MicrographId(3), "a.mrc", "b.mrc");
        assert_eq!(micrograph.tilted().untilted_micrograph(), MicrographId(3));
        assert_eq!(micrograph.tilted().file(), "b.mrc");
        assert!(!micrograph.has_data());
        assert_eq!(micrograph.angles(), &AngleEstimate::Pending);
    }

    #[test]
    fn tilted_particles_match_in_untilted_order() {
        let micrograph = pair_with_particles(3, 2);
        assert_eq!(micrograph.particles()[0].tilted_index(), Some(0));
        assert_eq!(micrograph.particles()[1].tilted_index(), Some(1));
        assert_eq!(micrograph.particles()[2].tilted_index(), None);
        assert_eq!(micrograph.tilted_match(1).unwrap().x, 12);
        assert!(micrograph.tilted_match(2).is_none());
    }

    #[test]
    fn tilted_overflow_is_rejected() {
        let mut micrograph = pair_with_particles(1, 1);
        let err = micrograph.add_tilted_particle(0, 0).unwrap_err();
        assert_eq!(err, ParticleError::NoUnmatchedParticle { untilted: 1 });
        assert_eq!(micrograph.tilted().particles().len(), 1);
    }

    #[test]
    fn remove_particle_drops_match_and_reindexes() {
        let mut micrograph = pair_with_particles(3, 3);
        let removed = micrograph.remove_particle(1).unwrap();
        assert_eq!((removed.x, removed.y), (10, 11));

        assert_eq!(micrograph.particles().len(), 2);
        assert_eq!(micrograph.tilted().particles().len(), 2);
        assert_eq!(micrograph.particles()[1].tilted_index(), Some(1));
        assert_eq!(micrograph.tilted().particles()[1].untilted_index(), 1);
        assert_eq!(micrograph.tilted_match(1).unwrap().x, 22);
    }

    #[test]
    fn pop_tilted_particle_unmatches_last_pair() {
        let mut micrograph = pair_with_particles(2, 2);
        let popped = micrograph.pop_tilted_particle().unwrap();
        assert_eq!(popped.untilted_index(), 1);
        assert!(!micrograph.particles()[1].is_matched());
        assert_eq!(micrograph.add_tilted_particle(5, 5).unwrap(), 1);
    }

    #[test]
    fn set_positions_report_changes() {
        let mut micrograph = pair_with_particles(1, 1);
        assert!(!micrograph.set_particle_position(0, 0, 1).unwrap());
        assert!(micrograph.set_particle_position(0, 4, 4).unwrap());
        assert!(micrograph.set_tilted_position(0, 7, 7).unwrap());
        assert_eq!(micrograph.tilted_match(0).unwrap().x, 7);
        assert!(micrograph.set_tilted_position(3, 1, 1).is_err());
    }

    #[test]
    fn align_uses_matched_pairs_and_reset_clears_everything() {
        let mut micrograph = pair_with_particles(3, 2);
        let angles = micrograph.align(&CountingAligner).angles().unwrap();
        assert_eq!(angles.angle_y, 2.0);

        micrograph.reset();
        assert!(!micrograph.has_data());
        assert!(micrograph.tilted().particles().is_empty());
        assert_eq!(micrograph.angles(), &AngleEstimate::Pending);
        assert_eq!(micrograph.align(&CountingAligner), &AngleEstimate::Pending);
    }
}
