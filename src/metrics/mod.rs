//! The metrics engine: geometric and diffusion statistics of a bundle.
//!
//! A [`Metrics`] value owns the streamline collection it measures. Each
//! call appends its results to the running [`Report`], both as text and as
//! named values. The affine of the volume in use is passed explicitly to
//! every call that needs one.
//!
//! [`Metrics`]: struct.Metrics.html
//! [`Report`]: report/struct.Report.html

pub mod report;
pub mod stats;

pub use self::report::{MetricValue, Report};
pub use self::stats::Summary;

use crate::affine::{inverse, ras_to_ijk, Affine4};
use crate::error::{Result, TractError};
use crate::streamline::{sample_points, Streamline};
use crate::tracts::Tracts;
use crate::volume::min_max_normalized;
use log::{debug, warn};
use nalgebra::Point3;
use ndarray::Array3;
use std::ops::Index;

/// Name of the scalar map which is sampled without normalization.
pub const REFERENCE_MAP: &str = "FA";

/// Number of bins of a behavior profile.
pub const PROFILE_BINS: usize = 10;

/// Mean scalar value as a function of the position along the bundle, in
/// tenths of the streamline length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorProfile(pub [f64; PROFILE_BINS]);

impl BehaviorProfile {
    /// The values of the profile, from the start to the end of the bundle.
    pub fn values(&self) -> &[f64] {
        &self.0
    }
}

impl Index<usize> for BehaviorProfile {
    type Output = f64;

    fn index(&self, bin: usize) -> &f64 {
        &self.0[bin]
    }
}

/// Metrics engine over one streamline collection.
#[derive(Debug, Clone)]
pub struct Metrics {
    tracts: Tracts,
    report: Report,
}

impl Metrics {
    /// Bind a new engine to the given collection.
    pub fn new(tracts: Tracts) -> Self {
        Metrics {
            tracts,
            report: Report::default(),
        }
    }

    /// The measured collection.
    pub fn tracts(&self) -> &Tracts {
        &self.tracts
    }

    /// Release the measured collection.
    pub fn into_tracts(self) -> Tracts {
        self.tracts
    }

    /// The metrics computed so far.
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Compute the shape statistics of the bundle: number of fibers, points
    /// per fiber, lengths, chord lengths, turning angles and mean midpoint,
    /// seed and termination positions.
    ///
    /// Positions are reported in millimeters and, when `affine` is given,
    /// also in the voxel coordinates of that affine. The collection is
    /// oriented before the seed and termination positions are taken, with
    /// `affine` or the identity, unless it was already oriented.
    ///
    /// # Errors
    ///
    /// - `TractError::InvalidArgument` if the affine is not invertible.
    pub fn geometric(&mut self, affine: Option<&Affine4>) -> Result<()> {
        let n_fibers = self.tracts.len() as u64;
        self.report.paragraph();
        self.report.write(&format!("Number of fibers: {}", n_fibers));
        self.report.insert("Number of fibers", MetricValue::Count(n_fibers));

        let n_points = self.tracts.n_points();
        let summary = summarize(&n_points)?;
        let max = n_points.iter().cloned().max().unwrap_or(0) as u64;
        let min = n_points.iter().cloned().min().unwrap_or(0) as u64;
        let median = summary.median.trunc() as u64;
        let label = "number of points per fiber";
        self.report.paragraph();
        self.report.write(&format!("Mean {}: {}", label, summary.mean));
        self.report.line();
        self.report.write(&format!("Std {}: {}", label, summary.std));
        self.report.line();
        self.report.write(&format!("Median {}: {}", label, median));
        self.report.line();
        self.report
            .write(&format!("Max {}: {}, Min {}: {}", label, max, label, min));
        self.report.insert(format!("Mean {}", label), MetricValue::Scalar(summary.mean));
        self.report.insert(format!("Std {}", label), MetricValue::Scalar(summary.std));
        self.report.insert(format!("Median {}", label), MetricValue::Count(median));
        self.report.insert(format!("Max {}", label), MetricValue::Count(max));
        self.report.insert(format!("Min {}", label), MetricValue::Count(min));

        let lengths = summarize(&self.tracts.lengths())?;
        self.summary_block("Length", &lengths, " mm");
        let chords = summarize(&self.tracts.chord_lengths())?;
        self.summary_block("Shortest Length", &chords, " mm");

        let midpoint = mean_position(self.tracts.midpoints().iter())?;
        self.position("Mean Midpoint Position", midpoint, affine)?;

        let angles = summarize(&self.tracts.turning_angles())?;
        self.summary_block("Turning Angle", &angles, " °");

        let identity = Affine4::identity();
        if self.tracts.ensure_oriented(affine.unwrap_or(&identity))? {
            debug!("Oriented the bundle before computing its extremities");
        }
        let extremities = self.tracts.extremities();
        let seed = mean_position(extremities.iter().map(|(first, _)| first))?;
        let termination = mean_position(extremities.iter().map(|(_, last)| last))?;
        self.position("Seed Points Mean Position", seed, affine)?;
        self.position("Termination Points Mean Position", termination, affine)?;
        Ok(())
    }

    /// Sample a scalar map along the bundle and report the statistics of
    /// the sampled values under `"<stat> <name> Value"`.
    ///
    /// Maps other than the reference [`REFERENCE_MAP`] are first rescaled
    /// to the `[0, 1]` range over the whole volume. Mean, standard
    /// deviation and median are computed over the mean value of each
    /// streamline, while the extremes are taken over all sampled points.
    ///
    /// The collection is oriented with `affine` before the first sampling,
    /// and the returned behavior profile holds the mean value of each tenth
    /// of the streamline length, averaged over the bundle. Each tenth
    /// averages the points lying strictly inside of it; a tenth without any
    /// point is sampled once at its centre.
    ///
    /// [`REFERENCE_MAP`]: constant.REFERENCE_MAP.html
    ///
    /// # Errors
    ///
    /// - `TractError::InvalidArgument` if the affine is not invertible.
    pub fn diffusion(
        &mut self,
        map: &Array3<f32>,
        name: &str,
        affine: &Affine4,
    ) -> Result<BehaviorProfile> {
        let normalized;
        let map = if name == REFERENCE_MAP {
            map
        } else {
            match min_max_normalized(map) {
                Some(rescaled) => {
                    normalized = rescaled;
                    &normalized
                }
                None => {
                    warn!("{} map has no value range, sampling it unnormalized", name);
                    map
                }
            }
        };

        if self.tracts.ensure_oriented(affine)? {
            debug!("Oriented the bundle before sampling {}", name);
        }
        let inv = inverse(affine)?;

        let sampled = self.tracts.map_to_volume(map, affine)?;
        let means: Vec<f64> = sampled
            .iter()
            .map(|values| values.iter().sum::<f64>() / values.len() as f64)
            .collect();
        let per_fiber = summarize(&means)?;
        let all: Vec<f64> = sampled.into_iter().flatten().collect();
        let per_point = summarize(&all)?;
        let summary = Summary {
            max: per_point.max,
            min: per_point.min,
            ..per_fiber
        };
        self.summary_block(&format!("{} Value", name), &summary, "");

        let mut profile = [0.; PROFILE_BINS];
        for s in self.tracts.streamlines() {
            for (acc, value) in profile.iter_mut().zip(streamline_profile(s, map, &inv).iter()) {
                *acc += value;
            }
        }
        let n = self.tracts.len() as f64;
        for value in profile.iter_mut() {
            *value /= n;
        }
        Ok(BehaviorProfile(profile))
    }

    /// Report mean, std and median on one line each, then max and min.
    fn summary_block(&mut self, label: &str, summary: &Summary, unit: &str) {
        self.report.paragraph();
        self.report
            .write(&format!("Mean {}: {}{}", label, summary.mean, unit));
        self.report.line();
        self.report.write(&format!("Std {}: {}{}", label, summary.std, unit));
        self.report.line();
        self.report
            .write(&format!("Median {}: {}{}", label, summary.median, unit));
        self.report.line();
        self.report.write(&format!(
            "Max {}: {}{}, Min {}: {}{}",
            label, summary.max, unit, label, summary.min, unit
        ));
        for &(stat, value) in &[
            ("Mean", summary.mean),
            ("Std", summary.std),
            ("Median", summary.median),
            ("Max", summary.max),
            ("Min", summary.min),
        ] {
            self.report
                .insert(format!("{} {}", stat, label), MetricValue::Scalar(value));
        }
    }

    /// Report a position in millimeters, and in voxels if an affine is given.
    fn position(&mut self, label: &str, mm: Point3<f64>, affine: Option<&Affine4>) -> Result<()> {
        self.report.paragraph();
        match affine {
            Some(affine) => {
                let vox = MetricValue::from(ras_to_ijk(&mm, affine)?);
                let mm = MetricValue::from(mm);
                self.report
                    .write(&format!("{}: {} mm / {} vox", label, mm, vox));
                self.report.insert(format!("{} (mm)", label), mm);
                self.report.insert(format!("{} (vox)", label), vox);
            }
            None => {
                let mm = MetricValue::from(mm);
                self.report.write(&format!("{}: {} mm", label, mm));
                self.report.insert(format!("{} (mm)", label), mm);
            }
        }
        Ok(())
    }
}

fn summarize<T: num_traits::ToPrimitive>(values: &[T]) -> Result<Summary> {
    Summary::of(values).ok_or(TractError::EmptyInput)
}

fn mean_position<'a, I>(points: I) -> Result<Point3<f64>>
where
    I: IntoIterator<Item = &'a Point3<f64>>,
{
    stats::mean_point(points).ok_or(TractError::EmptyInput)
}

/// Behavior profile of a single streamline over an already normalized map,
/// given the physical-to-voxel affine.
fn streamline_profile(s: &Streamline, map: &Array3<f32>, inv: &Affine4) -> [f64; PROFILE_BINS] {
    let cum = s.cumulative_lengths();
    let step = cum[cum.len() - 1] / PROFILE_BINS as f64;
    let mut profile = [0.; PROFILE_BINS];
    for (bin, value) in profile.iter_mut().enumerate() {
        let (lo, hi) = (step * bin as f64, step * (bin + 1) as f64);
        let mut inside: Vec<Point3<f64>> = s
            .points()
            .iter()
            .zip(&cum)
            .filter(|&(_, &c)| lo < c && c < hi)
            .map(|(p, _)| *p)
            .collect();
        if inside.is_empty() {
            inside.push(s.point_at_length((lo + hi) / 2.));
        }
        let values = sample_points(&inside, map, inv);
        *value = values.iter().sum::<f64>() / values.len() as f64;
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;
    use ndarray::Array;

    fn line(coords: &[[f64; 3]]) -> Streamline {
        Streamline::from_coords(coords).unwrap()
    }

    fn straight(y: f64, n: usize) -> Streamline {
        let coords: Vec<[f64; 3]> = (0..n).map(|i| [1. + i as f64, y, 2.]).collect();
        line(&coords)
    }

    #[test]
    fn uniform_field_gives_flat_profile() {
        let map = Array::from_elem((15, 5, 5), 0.7f32);
        let tracts = Tracts::new(vec![straight(1., 11)], None).unwrap();
        let mut metrics = Metrics::new(tracts);
        let profile = metrics.diffusion(&map, "FA", &Affine4::identity()).unwrap();
        for &v in profile.values() {
            assert_abs_diff_eq!(v, 0.7, epsilon = 1e-6);
        }
    }

    #[test]
    fn edge_points_belong_to_no_bin() {
        // value = x index, 11 points at x = 1..=11, one unit apart
        let map = Array::from_shape_fn((15, 5, 5), |(x, _, _)| x as f32);
        let s = straight(1., 11);
        let profile = streamline_profile(&s, &map, &Affine4::identity());
        // no point lies strictly inside a bin, so each bin is sampled at its centre
        for (bin, &v) in profile.iter().enumerate() {
            assert_abs_diff_eq!(v, 1.5 + bin as f64, epsilon = 1e-9);
        }

        // 21 points: exactly one point strictly inside each bin
        let s = line(&(0..21).map(|i| [1. + i as f64 * 0.5, 1., 2.]).collect::<Vec<_>>());
        let profile = streamline_profile(&s, &map, &Affine4::identity());
        for (bin, &v) in profile.iter().enumerate() {
            assert_abs_diff_eq!(v, 1.5 + bin as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn spike_on_bin_edge_is_not_sampled() {
        // value = x, except for a spike at x = 4, the edge between bins 1 and 2
        let map = Array::from_shape_fn((25, 5, 5), |(x, _, _)| match x {
            4 => 100.,
            x => x as f32,
        });
        // 21 points one voxel apart: edges at even x, one point inside each bin
        let s = line(&(0..21).map(|x| [x as f64, 1., 2.]).collect::<Vec<_>>());
        let profile = streamline_profile(&s, &map, &Affine4::identity());
        for (bin, &v) in profile.iter().enumerate() {
            assert_abs_diff_eq!(v, 2. * bin as f64 + 1., epsilon = 1e-9);
        }
    }

    #[test]
    fn non_reference_maps_are_normalized() {
        let map = Array::from_shape_fn((8, 3, 3), |(x, _, _)| 10. + 2. * x as f32);
        let tracts = Tracts::new(vec![line(&[[0., 1., 1.], [7., 1., 1.]])], None).unwrap();
        let mut metrics = Metrics::new(tracts);
        let _ = metrics.diffusion(&map, "MD", &Affine4::identity()).unwrap();
        let report = metrics.report();
        assert_abs_diff_eq!(report.get("Min MD Value").unwrap().as_f64().unwrap(), 0.);
        assert_abs_diff_eq!(report.get("Max MD Value").unwrap().as_f64().unwrap(), 1.);
        assert_abs_diff_eq!(report.get("Mean MD Value").unwrap().as_f64().unwrap(), 0.5);
    }

    #[test]
    fn max_min_over_points_mean_over_fibers() {
        let map = Array::from_shape_fn((4, 4, 4), |(x, _, _)| x as f32);
        let tracts = Tracts::new(
            vec![
                line(&[[0., 0., 3.], [1., 0., 3.], [2., 0., 3.]]),
                line(&[[3., 1., 3.], [3., 1., 2.]]),
            ],
            None,
        )
        .unwrap();
        let mut metrics = Metrics::new(tracts);
        let _ = metrics.diffusion(&map, "FA", &Affine4::identity()).unwrap();
        let report = metrics.report();
        // per-fiber means are 1 and 3
        assert_abs_diff_eq!(report.get("Mean FA Value").unwrap().as_f64().unwrap(), 2.);
        assert_abs_diff_eq!(report.get("Std FA Value").unwrap().as_f64().unwrap(), 1.);
        assert_abs_diff_eq!(report.get("Max FA Value").unwrap().as_f64().unwrap(), 3.);
        assert_abs_diff_eq!(report.get("Min FA Value").unwrap().as_f64().unwrap(), 0.);
    }

    #[test]
    fn geometric_keys() {
        let tracts = Tracts::new(
            vec![
                line(&[[0., 0., 0.], [3., 0., 0.], [3., 4., 0.]]),
                line(&[[0., 1., 0.], [3., 1., 0.], [3., 5., 0.]]),
            ],
            None,
        )
        .unwrap();
        let mut metrics = Metrics::new(tracts);
        metrics.geometric(None).unwrap();
        let report = metrics.report();
        assert_eq!(report.get("Number of fibers"), Some(&MetricValue::Count(2)));
        assert_eq!(
            report.get("Median number of points per fiber"),
            Some(&MetricValue::Count(3))
        );
        assert_abs_diff_eq!(report.get("Mean Length").unwrap().as_f64().unwrap(), 7.);
        assert_abs_diff_eq!(report.get("Mean Shortest Length").unwrap().as_f64().unwrap(), 5.);
        let max_angle = report.get("Max Turning Angle").unwrap().as_f64().unwrap();
        assert_abs_diff_eq!(max_angle, 90., epsilon = 1e-9);
        assert!(report.get("Mean Midpoint Position (vox)").is_none());
        assert!(report.get("Seed Points Mean Position (mm)").is_some());
        assert!(report.text().starts_with("\n\nNumber of fibers: 2"));
        assert!(metrics.tracts().is_oriented());
    }

    #[test]
    fn termination_holds_termination_mean() {
        let tracts = Tracts::new(
            vec![line(&[[0., 0., 4.], [0., 0., 0.]]), line(&[[2., 0., 4.], [2., 0., 0.]])],
            None,
        )
        .unwrap();
        let mut metrics = Metrics::new(tracts);
        let affine = Affine4::new_nonuniform_scaling(&Vector3::new(2., 2., 2.));
        metrics.geometric(Some(&affine)).unwrap();
        let report = metrics.report();
        assert_eq!(
            report.get("Seed Points Mean Position (mm)"),
            Some(&MetricValue::Point([1., 0., 4.]))
        );
        assert_eq!(
            report.get("Termination Points Mean Position (mm)"),
            Some(&MetricValue::Point([1., 0., 0.]))
        );
        assert_eq!(
            report.get("Termination Points Mean Position (vox)"),
            Some(&MetricValue::Point([0.5, 0., 0.]))
        );
    }
}
