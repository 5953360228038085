//! Module holding the streamline collection of a tractogram.

use crate::affine::{apply_affine, inverse, Affine4};
use crate::error::{Result, TractError};
use crate::format::{Header, PointData, Tractogram};
use crate::streamline::{sample_points, Streamline, COMPRESS_MAX_SEGMENT, COMPRESS_TOLERANCE};
use log::debug;
use nalgebra::Point3;
use ndarray::{s, Array3};
use num_traits::ToPrimitive;

/// Upper bound on the number of points of a resampled streamline.
pub const MAX_RESAMPLED_POINTS: usize = 1 << 24;

/// An ordered, non-empty collection of streamlines, with the optional
/// header and per-point data of the file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracts {
    streamlines: Vec<Streamline>,
    header: Option<Header>,
    point_data: PointData,
    oriented: bool,
}

impl Tracts {
    /// Create a collection out of a list of streamlines.
    ///
    /// # Errors
    ///
    /// - `TractError::EmptyInput` if the list is empty.
    pub fn new(streamlines: Vec<Streamline>, header: Option<Header>) -> Result<Self> {
        if streamlines.is_empty() {
            return Err(TractError::EmptyInput);
        }
        Ok(Tracts {
            streamlines,
            header,
            point_data: PointData::new(),
            oriented: false,
        })
    }

    /// Create a collection out of a decoded tractogram, keeping its
    /// per-point data.
    pub fn from_tractogram(tractogram: Tractogram) -> Result<Self> {
        let Tractogram {
            streamlines,
            header,
            point_data,
        } = tractogram;
        let mut tracts = Tracts::new(streamlines, header)?;
        tracts.point_data = point_data;
        Ok(tracts)
    }

    /// The streamlines, in file order.
    pub fn streamlines(&self) -> &[Streamline] {
        &self.streamlines
    }

    /// The format-specific header, if the format has one.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Per-point data, one array per streamline for each named attribute.
    pub fn point_data(&self) -> &PointData {
        &self.point_data
    }

    /// Whether the collection went through orientation normalization.
    pub fn is_oriented(&self) -> bool {
        self.oriented
    }

    /// The number of streamlines.
    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    /// Always false: the collection is never empty.
    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    fn replace(&mut self, streamlines: Vec<Streamline>, what: &str) {
        if !self.point_data.is_empty() {
            debug!("Dropping per-point data after {}", what);
            self.point_data = PointData::new();
        }
        self.streamlines = streamlines;
    }

    /// Reduce (or increase) the point density of every streamline to
    /// `percent` % of its point count, with at least two points each.
    /// Points are redistributed evenly along the arc length.
    ///
    /// # Errors
    ///
    /// - `TractError::InvalidArgument` if `percent` is negative or not
    ///   finite, or if a streamline would exceed `MAX_RESAMPLED_POINTS`.
    pub fn resample(&mut self, percent: f64) -> Result<()> {
        if !percent.is_finite() || percent < 0. {
            return Err(TractError::InvalidArgument(format!(
                "resampling percentage {}",
                percent
            )));
        }
        let streamlines = self
            .streamlines
            .iter()
            .map(|s| {
                let n = (s.len() as f64 * percent / 100.).floor();
                n.to_usize()
                    .filter(|&n| n <= MAX_RESAMPLED_POINTS)
                    .map(|n| s.resampled(n.max(2)))
                    .ok_or_else(|| {
                        TractError::InvalidArgument(format!(
                            "resampling to {}% yields {} points per streamline",
                            percent, n
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        self.replace(streamlines, "resampling");
        Ok(())
    }

    /// Remove near-collinear points from every streamline.
    pub fn compress(&mut self) {
        let streamlines = self
            .streamlines
            .iter()
            .map(|s| s.compressed(COMPRESS_TOLERANCE, COMPRESS_MAX_SEGMENT))
            .collect();
        self.replace(streamlines, "compression");
    }

    /// Flip streamlines so that the whole bundle runs in the same
    /// direction. The axial direction of the bundle centroid, in the voxel
    /// space of `affine`, decides which end is the start: the centroid
    /// runs from the higher to the lower axial slice.
    ///
    /// Returns the number of streamlines which were reversed.
    ///
    /// # Errors
    ///
    /// - `TractError::InvalidArgument` if the affine is not invertible.
    pub fn orient(&mut self, affine: &Affine4) -> Result<usize> {
        let inv = inverse(affine)?;

        let template = &self.streamlines[0];
        let (t0, t1) = template.extremities();
        let consensus: Vec<Streamline> = self
            .streamlines
            .iter()
            .map(|s| {
                if needs_flip(s, &t0, &t1) {
                    s.reversed()
                } else {
                    s.clone()
                }
            })
            .collect();

        let mut central = centroid(&consensus, template.len())?;
        let first = apply_affine(&inv, central.first());
        let last = apply_affine(&inv, central.last());
        if first.z < last.z {
            central = central.reversed();
        }
        let (c0, c1) = central.extremities();

        let mut flips = 0;
        let mut streamlines = Vec::with_capacity(self.streamlines.len());
        for (i, s) in self.streamlines.iter().enumerate() {
            if needs_flip(s, &c0, &c1) {
                flips += 1;
                streamlines.push(s.reversed());
                for arrays in self.point_data.values_mut() {
                    if let Some(a) = arrays.get_mut(i) {
                        *a = a.slice(s![..;-1, ..]).to_owned();
                    }
                }
            } else {
                streamlines.push(s.clone());
            }
        }
        debug!("Orientation flipped {} of {} streamlines", flips, streamlines.len());
        self.streamlines = streamlines;
        self.oriented = true;
        Ok(flips)
    }

    /// Orient the collection with the given affine, unless it was already
    /// oriented. Returns whether an orientation pass took place.
    pub fn ensure_oriented(&mut self, affine: &Affine4) -> Result<bool> {
        if self.oriented {
            return Ok(false);
        }
        let _ = self.orient(affine)?;
        Ok(true)
    }

    /// Number of points of each streamline.
    pub fn n_points(&self) -> Vec<usize> {
        self.streamlines.iter().map(Streamline::len).collect()
    }

    /// Arc length of each streamline.
    pub fn lengths(&self) -> Vec<f64> {
        self.streamlines.iter().map(Streamline::length).collect()
    }

    /// Distance between the endpoints of each streamline.
    pub fn chord_lengths(&self) -> Vec<f64> {
        self.streamlines.iter().map(Streamline::chord_length).collect()
    }

    /// Midpoint of each streamline.
    pub fn midpoints(&self) -> Vec<Point3<f64>> {
        self.streamlines.iter().map(Streamline::midpoint).collect()
    }

    /// Total turning angle of each streamline, in degrees.
    pub fn turning_angles(&self) -> Vec<f64> {
        self.streamlines.iter().map(Streamline::turning_angle).collect()
    }

    /// First and last point of each streamline.
    pub fn extremities(&self) -> Vec<(Point3<f64>, Point3<f64>)> {
        self.streamlines.iter().map(Streamline::extremities).collect()
    }

    /// Sample a volume along every streamline, one value per point.
    pub fn map_to_volume(&self, volume: &Array3<f32>, affine: &Affine4) -> Result<Vec<Vec<f64>>> {
        let inv = inverse(affine)?;
        Ok(self
            .streamlines
            .iter()
            .map(|s| sample_points(s.points(), volume, &inv))
            .collect())
    }
}

/// Whether `s` matches the endpoints `(start, end)` better when reversed.
fn needs_flip(s: &Streamline, start: &Point3<f64>, end: &Point3<f64>) -> bool {
    let (a, b) = s.extremities();
    let direct = (a - start).norm() + (b - end).norm();
    let flipped = (b - start).norm() + (a - end).norm();
    flipped < direct
}

/// Average streamline of a bundle: every streamline is resampled to
/// `n_points` (at least 2) and corresponding points are averaged.
pub fn centroid(streamlines: &[Streamline], n_points: usize) -> Result<Streamline> {
    if streamlines.is_empty() {
        return Err(TractError::EmptyInput);
    }
    let n_points = n_points.max(2);
    let mut sum = vec![Point3::<f64>::origin().coords; n_points];
    for s in streamlines {
        for (acc, p) in sum.iter_mut().zip(s.resampled(n_points).points()) {
            *acc += p.coords;
        }
    }
    let count = streamlines.len() as f64;
    let points = sum.into_iter().map(|c| Point3::from(c / count)).collect();
    Streamline::new(points)
}
