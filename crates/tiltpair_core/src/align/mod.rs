//! Tilt-geometry estimation from matched particle coordinates.
//!
//! # Responsibility
//! - Define the aligner contract consumed by loading and mutation paths.
//! - Report degenerate input as a value, not a panic.
//!
//! # Invariants
//! - A successful estimate always carries all three angles, in degrees.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod affine;

pub use affine::{AffineTiltAligner, MIN_ALIGNMENT_PAIRS};

/// One matched coordinate pair: untilted pick and its tilted counterpart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPair {
    pub untilted: [f64; 2],
    pub tilted: [f64; 2],
}

impl PointPair {
    pub fn new(untilted: (i32, i32), tilted: (i32, i32)) -> Self {
        Self {
            untilted: [f64::from(untilted.0), f64::from(untilted.1)],
            tilted: [f64::from(tilted.0), f64::from(tilted.1)],
        }
    }
}

/// Tilt geometry of one micrograph pair, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltAngles {
    /// Tilt axis angle from the image y axis, untilted frame.
    pub angle_y: f64,
    /// Tilt axis angle from the image y axis, tilted frame.
    pub angle_y2: f64,
    /// Tilt angle around the axis.
    pub angle_tilt: f64,
}

/// Reasons an aligner cannot produce angles.
#[derive(Debug, Clone, PartialEq)]
pub enum DegenerateGeometry {
    TooFewPairs { needed: usize, got: usize },
    Collinear,
    Singular,
}

impl Display for DegenerateGeometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPairs { needed, got } => {
                write!(f, "too few matched pairs: need {needed}, got {got}")
            }
            Self::Collinear => write!(f, "untilted particles are collinear"),
            Self::Singular => write!(f, "tilted particles collapse to a degenerate transform"),
        }
    }
}

impl Error for DegenerateGeometry {}

/// Estimates tilt angles from matched pairs.
pub trait TiltAligner {
    fn compute(&self, pairs: &[PointPair]) -> Result<TiltAngles, DegenerateGeometry>;
}

impl<A: TiltAligner + ?Sized> TiltAligner for &A {
    fn compute(&self, pairs: &[PointPair]) -> Result<TiltAngles, DegenerateGeometry> {
        (**self).compute(pairs)
    }
}

/// Angle state of a micrograph pair.
///
/// `Pending` means no estimate has been attempted for the current data (the
/// pair is empty or was reset).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AngleEstimate {
    #[default]
    Pending,
    Computed(TiltAngles),
    Degenerate(DegenerateGeometry),
}

impl AngleEstimate {
    pub fn from_result(result: Result<TiltAngles, DegenerateGeometry>) -> Self {
        match result {
            Ok(angles) => Self::Computed(angles),
            Err(reason) => Self::Degenerate(reason),
        }
    }

    pub fn angles(&self) -> Option<TiltAngles> {
        match self {
            Self::Computed(angles) => Some(*angles),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}
