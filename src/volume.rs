//! Scalar volumes (FA, MD, b-zero maps) and their sampling.
//!
//! Volumes are decoded with the [`nifti`] crate and kept in memory as a
//! 3D `ndarray` alongside the voxel-to-physical affine of the image.
//!
//! [`nifti`]: https://docs.rs/nifti

use crate::affine::{from_f32, Affine4};
use crate::error::{Result, TractError};
use log::debug;
use nalgebra::{Matrix4, Point3};
use ndarray::{Array3, Axis, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::path::Path;

/// A 3D scalar image with its voxel-to-RAS affine.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarVolume {
    data: Array3<f32>,
    affine: Affine4,
}

impl ScalarVolume {
    /// Create a volume from its voxel data and voxel-to-RAS affine.
    pub fn new(data: Array3<f32>, affine: Affine4) -> Self {
        ScalarVolume { data, affine }
    }

    /// Read a volume from a NIfTI-1 file (".nii" or ".nii.gz").
    ///
    /// Volumes with more than three dimensions are reduced to their first
    /// 3D frame.
    ///
    /// # Errors
    ///
    /// - `TractError::Nifti` if the file cannot be decoded.
    /// - `TractError::MalformedInput` if the image has less than three
    ///   dimensions.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let affine: Matrix4<f32> = obj.header().affine();
        let mut data = obj.into_volume().into_ndarray::<f32>()?;
        while data.ndim() > 3 {
            let last = data.ndim() - 1;
            data = data.index_axis_move(Axis(last), 0);
        }
        let data = data.into_dimensionality::<Ix3>().map_err(|e| {
            TractError::MalformedInput(format!(
                "{}: expected a 3D volume ({})",
                path.as_ref().display(),
                e
            ))
        })?;
        debug!(
            "Loaded volume {} of shape {:?}",
            path.as_ref().display(),
            data.shape()
        );
        Ok(ScalarVolume {
            data,
            affine: from_f32(&affine),
        })
    }

    /// The voxel data.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// The voxel-to-RAS affine.
    pub fn affine(&self) -> &Affine4 {
        &self.affine
    }

    /// Split the volume into its data and affine.
    pub fn into_parts(self) -> (Array3<f32>, Affine4) {
        (self.data, self.affine)
    }
}

/// Rescale the whole volume linearly so that its minimum maps to 0 and its
/// maximum maps to 1. Non-finite voxels are ignored when looking for the
/// extremes. Returns `None` when the volume has no finite range, in which
/// case it cannot be normalized.
pub fn min_max_normalized(data: &Array3<f32>) -> Option<Array3<f32>> {
    let (min, max) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((std::f32::INFINITY, std::f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !(max > min) {
        return None;
    }
    let (min, range) = (f64::from(min), f64::from(max) - f64::from(min));
    Some(data.mapv(|v| ((f64::from(v) - min) / range) as f32))
}

/// Trilinear interpolation of `data` at the continuous voxel coordinates
/// `ijk`, with voxel centres at integer coordinates. Points outside of the
/// volume sample as zero.
pub fn trilinear(data: &Array3<f32>, ijk: &Point3<f64>) -> f64 {
    const TOL: f64 = 1e-9;
    let (nx, ny, nz) = data.dim();
    let dims = [nx, ny, nz];
    let mut lo = [0usize; 3];
    let mut hi = [0usize; 3];
    let mut frac = [0f64; 3];
    for axis in 0..3 {
        let n = dims[axis];
        let c = ijk[axis];
        if n == 0 || !c.is_finite() || c < -TOL || c > (n - 1) as f64 + TOL {
            return 0.;
        }
        let c = c.max(0.).min((n - 1) as f64);
        let f = c.floor();
        lo[axis] = f as usize;
        hi[axis] = (lo[axis] + 1).min(n - 1);
        frac[axis] = c - f;
    }

    let mut value = 0.;
    for &(ix, wx) in &[(lo[0], 1. - frac[0]), (hi[0], frac[0])] {
        for &(iy, wy) in &[(lo[1], 1. - frac[1]), (hi[1], frac[1])] {
            for &(iz, wz) in &[(lo[2], 1. - frac[2]), (hi[2], frac[2])] {
                let w = wx * wy * wz;
                if w != 0. {
                    value += w * f64::from(data[[ix, iy, iz]]);
                }
            }
        }
    }
    value
}
