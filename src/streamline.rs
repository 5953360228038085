//! This module defines the `Streamline` type, an ordered sequence of 3D
//! points in physical space, along with the per-streamline geometry used
//! by the metrics engine.
//!
//! Streamlines are immutable. Operations which change the point set, such
//! as [`resampled`](struct.Streamline.html#method.resampled) or
//! [`reversed`](struct.Streamline.html#method.reversed), return a new
//! streamline and leave the original untouched.

use crate::affine::{apply_affine, inverse, Affine4};
use crate::error::{Result, TractError};
use crate::volume::trilinear;
use nalgebra::{Point3, Vector3};
use ndarray::Array3;

/// Default tolerance of the line compression, in mm.
pub const COMPRESS_TOLERANCE: f64 = 0.01;
/// Default maximal segment length after line compression, in mm.
pub const COMPRESS_MAX_SEGMENT: f64 = 10.;

/// One reconstructed fiber pathway.
#[derive(Debug, Clone, PartialEq)]
pub struct Streamline {
    points: Vec<Point3<f64>>,
}

impl Streamline {
    /// Create a streamline out of its points.
    ///
    /// # Errors
    ///
    /// - `TractError::MalformedInput` if no points are given.
    pub fn new(points: Vec<Point3<f64>>) -> Result<Self> {
        if points.is_empty() {
            return Err(TractError::MalformedInput(
                "streamline without points".to_string(),
            ));
        }
        Ok(Streamline { points })
    }

    /// Create a streamline out of raw coordinate triplets.
    pub fn from_coords(coords: &[[f64; 3]]) -> Result<Self> {
        Self::new(coords.iter().map(|c| Point3::from(*c)).collect())
    }

    /// Obtain the points of this streamline.
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Move the points out of the streamline.
    pub fn into_points(self) -> Vec<Point3<f64>> {
        self.points
    }

    /// The number of points in this streamline.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: streamlines hold at least one point.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First point (seed) of the streamline.
    pub fn first(&self) -> &Point3<f64> {
        &self.points[0]
    }

    /// Last point (termination) of the streamline.
    pub fn last(&self) -> &Point3<f64> {
        &self.points[self.points.len() - 1]
    }

    /// The pair (first point, last point).
    pub fn extremities(&self) -> (Point3<f64>, Point3<f64>) {
        (*self.first(), *self.last())
    }

    /// The same streamline traversed in the opposite direction.
    pub fn reversed(&self) -> Streamline {
        Streamline {
            points: self.points.iter().rev().cloned().collect(),
        }
    }

    fn segments(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        self.points.windows(2).map(|w| w[1] - w[0])
    }

    /// Arc length: sum of the Euclidean distances between consecutive points.
    pub fn length(&self) -> f64 {
        self.segments().map(|s| s.norm()).sum()
    }

    /// Euclidean distance between the first and the last point.
    pub fn chord_length(&self) -> f64 {
        (self.last() - self.first()).norm()
    }

    /// Arc length from the first point up to each point.
    /// The first value is always zero and the last is the full length.
    pub fn cumulative_lengths(&self) -> Vec<f64> {
        let mut acc = 0.;
        let mut out = Vec::with_capacity(self.points.len());
        out.push(0.);
        for s in self.segments() {
            acc += s.norm();
            out.push(acc);
        }
        out
    }

    /// The point lying at arc length `s` from the first point, linearly
    /// interpolated between the two bracketing points. `s` is clamped to the
    /// streamline's extent.
    pub fn point_at_length(&self, s: f64) -> Point3<f64> {
        let cum = self.cumulative_lengths();
        point_at(&self.points, &cum, s)
    }

    /// The point at exactly half of the arc length.
    pub fn midpoint(&self) -> Point3<f64> {
        let cum = self.cumulative_lengths();
        let half = cum[cum.len() - 1] / 2.;
        point_at(&self.points, &cum, half)
    }

    /// Total unsigned turning in degrees: the sum of the angles between
    /// each pair of consecutive segment directions. Zero-length segments
    /// carry no direction and are skipped.
    pub fn turning_angle(&self) -> f64 {
        let directions: Vec<Vector3<f64>> = self
            .segments()
            .filter(|s| s.norm() > std::f64::EPSILON)
            .map(|s| s.normalize())
            .collect();
        directions
            .windows(2)
            .map(|w| w[0].dot(&w[1]).max(-1.).min(1.).acos())
            .sum::<f64>()
            .to_degrees()
    }

    /// Redistribute `n` points (at least 2) evenly along the arc length.
    /// The first and last points are preserved exactly.
    pub fn resampled(&self, n: usize) -> Streamline {
        let n = n.max(2);
        let cum = self.cumulative_lengths();
        let total = cum[cum.len() - 1];
        let step = total / (n - 1) as f64;
        let mut points: Vec<Point3<f64>> = (0..n)
            .map(|k| point_at(&self.points, &cum, step * k as f64))
            .collect();
        points[0] = *self.first();
        points[n - 1] = *self.last();
        Streamline { points }
    }

    /// Remove points which can be dropped without the polyline moving by
    /// more than `tolerance`, while keeping segments no longer than
    /// `max_segment` (unless the original segment already was).
    /// Endpoints are always kept.
    pub fn compressed(&self, tolerance: f64, max_segment: f64) -> Streamline {
        let n = self.points.len();
        if n <= 2 {
            return self.clone();
        }
        let mut kept = vec![self.points[0]];
        let mut anchor = 0;
        for candidate in 2..n {
            let a = self.points[anchor];
            let b = self.points[candidate];
            let too_long = (b - a).norm() > max_segment;
            let deviates = ((anchor + 1)..candidate)
                .any(|k| distance_to_segment(&self.points[k], &a, &b) > tolerance);
            if too_long || deviates {
                anchor = candidate - 1;
                kept.push(self.points[anchor]);
            }
        }
        kept.push(self.points[n - 1]);
        Streamline { points: kept }
    }

    /// Sample a scalar volume at each point of the streamline. Points are
    /// mapped into voxel space through the inverse of `affine` and sampled
    /// with trilinear interpolation. The output has one value per point.
    pub fn map_to_volume(&self, volume: &Array3<f32>, affine: &Affine4) -> Result<Vec<f64>> {
        let inv = inverse(affine)?;
        Ok(sample_points(&self.points, volume, &inv))
    }
}

/// Sample a volume at the given physical points, using an already
/// inverted (physical-to-voxel) affine.
pub(crate) fn sample_points(
    points: &[Point3<f64>],
    volume: &Array3<f32>,
    inverse: &Affine4,
) -> Vec<f64> {
    points
        .iter()
        .map(|p| trilinear(volume, &apply_affine(inverse, p)))
        .collect()
}

fn point_at(points: &[Point3<f64>], cum: &[f64], s: f64) -> Point3<f64> {
    let total = cum[cum.len() - 1];
    if points.len() == 1 || s <= 0. {
        return points[0];
    }
    if s >= total {
        return points[points.len() - 1];
    }
    // first index whose cumulative length reaches `s`
    let i = cum.iter().position(|&c| c >= s).unwrap_or(cum.len() - 1);
    let (l0, l1) = (cum[i - 1], cum[i]);
    if l1 - l0 <= std::f64::EPSILON {
        return points[i];
    }
    let t = (s - l0) / (l1 - l0);
    points[i - 1] + (points[i] - points[i - 1]) * t
}

fn distance_to_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= std::f64::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).max(0.).min(1.);
    (p - (a + ab * t)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn line(coords: &[[f64; 3]]) -> Streamline {
        Streamline::from_coords(coords).unwrap()
    }

    #[test]
    fn lengths() {
        let s = line(&[[0., 0., 0.], [3., 0., 0.], [3., 4., 0.]]);
        assert_abs_diff_eq!(s.length(), 7.0);
        assert_abs_diff_eq!(s.chord_length(), 5.0);
        assert_eq!(s.cumulative_lengths(), vec![0., 3., 7.]);
    }

    #[test]
    fn empty_streamline_is_rejected() {
        assert!(Streamline::new(vec![]).is_err());
    }

    #[test]
    fn midpoint_interpolates() {
        let s = line(&[[0., 0., 0.], [3., 0., 0.], [3., 4., 0.]]);
        assert_abs_diff_eq!(s.midpoint(), Point3::new(3., 0.5, 0.), epsilon = 1e-12);

        let s = line(&[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.]]);
        assert_abs_diff_eq!(s.midpoint(), Point3::new(1., 0., 0.), epsilon = 1e-12);

        let s = line(&[[1., 2., 3.]]);
        assert_eq!(s.midpoint(), Point3::new(1., 2., 3.));
    }

    #[test]
    fn turning_angle_in_degrees() {
        let straight = line(&[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.]]);
        assert_abs_diff_eq!(straight.turning_angle(), 0., epsilon = 1e-9);

        let corner = line(&[[0., 0., 0.], [3., 0., 0.], [3., 4., 0.]]);
        assert_abs_diff_eq!(corner.turning_angle(), 90., epsilon = 1e-9);

        let u_turn = line(&[[0., 0., 0.], [1., 0., 0.], [1., 1., 0.], [0., 1., 0.]]);
        assert_abs_diff_eq!(u_turn.turning_angle(), 180., epsilon = 1e-9);

        let with_duplicate = line(&[[0., 0., 0.], [1., 0., 0.], [1., 0., 0.], [1., 1., 0.]]);
        assert_abs_diff_eq!(with_duplicate.turning_angle(), 90., epsilon = 1e-9);
    }

    #[test]
    fn resample_keeps_endpoints() {
        let s = line(&[[0., 0., 0.], [1., 0., 0.], [1.5, 0., 0.], [4., 0., 0.]]);
        let r = s.resampled(5);
        assert_eq!(r.len(), 5);
        assert_eq!(r.first(), s.first());
        assert_eq!(r.last(), s.last());
        for (k, p) in r.points().iter().enumerate() {
            assert_abs_diff_eq!(p.x, k as f64, epsilon = 1e-12);
        }
        assert_eq!(s.resampled(0).len(), 2);
    }

    #[test]
    fn resample_degenerate_streamline() {
        let s = line(&[[1., 1., 1.]]);
        let r = s.resampled(4);
        assert_eq!(r.len(), 4);
        assert!(r.points().iter().all(|p| *p == Point3::new(1., 1., 1.)));
    }

    #[test]
    fn compress_drops_collinear_points() {
        let s = line(&[[0., 0., 0.], [1., 0., 0.], [2., 0., 0.], [3., 0., 0.], [3., 1., 0.]]);
        let c = s.compressed(COMPRESS_TOLERANCE, COMPRESS_MAX_SEGMENT);
        assert_eq!(
            c.points(),
            &[Point3::new(0., 0., 0.), Point3::new(3., 0., 0.), Point3::new(3., 1., 0.)]
        );
    }

    #[test]
    fn compress_limits_segment_length() {
        let coords: Vec<[f64; 3]> = (0..=30).map(|x| [x as f64, 0., 0.]).collect();
        let c = line(&coords).compressed(COMPRESS_TOLERANCE, COMPRESS_MAX_SEGMENT);
        assert_eq!(c.first(), &Point3::new(0., 0., 0.));
        assert_eq!(c.last(), &Point3::new(30., 0., 0.));
        assert!(c.len() < 31);
        for w in c.points().windows(2) {
            assert!((w[1] - w[0]).norm() <= COMPRESS_MAX_SEGMENT + 1e-9);
        }
    }

    #[test]
    #[rustfmt::skip]
    fn map_through_affine() {
        let volume = Array3::from_shape_fn((4, 3, 2), |(i, j, k)| (i + 10 * j + 100 * k) as f32);
        // half-millimeter voxels, voxel (0, 0, 0) at (1, 1, 1) mm
        let affine = Affine4::new(
            0.5, 0.0, 0.0, 1.0,
            0.0, 0.5, 0.0, 1.0,
            0.0, 0.0, 0.5, 1.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let s = line(&[[1., 1., 1.], [2., 1.5, 1.], [1.25, 1., 1.5], [9., 9., 9.]]);
        let values = s.map_to_volume(&volume, &affine).unwrap();
        assert_eq!(values.len(), 4);
        assert_abs_diff_eq!(values[0], 0., epsilon = 1e-9);
        assert_abs_diff_eq!(values[1], 12., epsilon = 1e-9);
        assert_abs_diff_eq!(values[2], 100.5, epsilon = 1e-9);
        assert_abs_diff_eq!(values[3], 0.);
        assert!(s.map_to_volume(&volume, &Affine4::zeros()).is_err());
    }

    #[test]
    fn reversing() {
        let s = line(&[[0., 0., 0.], [1., 0., 0.], [1., 2., 0.]]);
        let r = s.reversed();
        assert_eq!(r.first(), s.last());
        assert_eq!(r.reversed(), s);
    }
}
