//! Least-squares affine tilt aligner.
//!
//! Fits `tilted = L * untilted + t` over all matched pairs and decomposes the
//! 2×2 linear part `L` by SVD. Tilting a plane shortens distances
//! perpendicular to the tilt axis by `cos(tilt)` and keeps the axis length,
//! so the axis is the direction of the largest singular value and
//! `tilt = acos(s_min / s_max)`. Dividing by `s_max` absorbs any global
//! magnification difference between the two images.

use super::{DegenerateGeometry, PointPair, TiltAligner, TiltAngles};
use nalgebra::{Matrix2, Vector2};

/// An affine fit has six unknowns; three non-collinear pairs determine it.
pub const MIN_ALIGNMENT_PAIRS: usize = 3;

const COLLINEAR_EPS: f64 = 1e-9;
const SINGULAR_EPS: f64 = 1e-12;

/// Default aligner used by the picker.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffineTiltAligner;

impl AffineTiltAligner {
    pub fn new() -> Self {
        Self
    }

    /// Least-squares linear part of the untilted → tilted affine map.
    pub fn fit_linear(pairs: &[PointPair]) -> Result<Matrix2<f64>, DegenerateGeometry> {
        if pairs.len() < MIN_ALIGNMENT_PAIRS {
            return Err(DegenerateGeometry::TooFewPairs {
                needed: MIN_ALIGNMENT_PAIRS,
                got: pairs.len(),
            });
        }

        let n = pairs.len() as f64;
        let cu = pairs
            .iter()
            .fold(Vector2::<f64>::zeros(), |acc, p| acc + Vector2::from(p.untilted))
            / n;
        let ct = pairs
            .iter()
            .fold(Vector2::<f64>::zeros(), |acc, p| acc + Vector2::from(p.tilted))
            / n;

        let mut suu = Matrix2::<f64>::zeros();
        let mut stu = Matrix2::<f64>::zeros();
        for pair in pairs {
            let u = Vector2::from(pair.untilted) - cu;
            let t = Vector2::from(pair.tilted) - ct;
            suu += u * u.transpose();
            stu += t * u.transpose();
        }

        // Scale-free rank test: det is the product, trace the sum, of the
        // two scatter eigenvalues.
        let trace = suu.trace();
        if trace <= 0.0 || suu.determinant() <= COLLINEAR_EPS * trace * trace {
            return Err(DegenerateGeometry::Collinear);
        }
        let suu_inv = suu.try_inverse().ok_or(DegenerateGeometry::Collinear)?;

        Ok(stu * suu_inv)
    }
}

impl TiltAligner for AffineTiltAligner {
    fn compute(&self, pairs: &[PointPair]) -> Result<TiltAngles, DegenerateGeometry> {
        let linear = Self::fit_linear(pairs)?;
        if !(linear.norm() > SINGULAR_EPS) {
            return Err(DegenerateGeometry::Singular);
        }
        let svd = linear.svd(true, true);
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(DegenerateGeometry::Singular);
        };

        let values = svd.singular_values;
        let (major, minor) = if values[0] >= values[1] { (0, 1) } else { (1, 0) };
        let s_max = values[major];
        if !(s_max > SINGULAR_EPS) {
            return Err(DegenerateGeometry::Singular);
        }

        let ratio = (values[minor] / s_max).clamp(0.0, 1.0);
        let untilted_axis = v_t.row(major);
        let tilted_axis = u.column(major);

        Ok(TiltAngles {
            angle_y: axis_angle_from_y(untilted_axis[0], untilted_axis[1]),
            angle_y2: axis_angle_from_y(tilted_axis[0], tilted_axis[1]),
            angle_tilt: ratio.acos().to_degrees(),
        })
    }
}

/// Angle of an undirected axis measured from +y towards +x, in (-90, 90].
fn axis_angle_from_y(dx: f64, dy: f64) -> f64 {
    let mut angle = dx.atan2(dy).to_degrees();
    while angle > 90.0 {
        angle -= 180.0;
    }
    while angle <= -90.0 {
        angle += 180.0;
    }
    angle
}
