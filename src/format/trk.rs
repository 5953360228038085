//! Reader for the TrackVis format (".trk").
//!
//! A TrackVis file holds a fixed 1000 byte header followed by the
//! streamlines, each written as a point count, the point coordinates
//! (interleaved with `n_scalars` values per point) and `n_properties`
//! values for the whole streamline. Coordinates are stored in "voxmm"
//! space (voxel corner at the origin, scaled by the voxel size) and are
//! converted to RAS mm while reading.

use super::{Header, PointData, Tractogram};
use crate::affine::{
    apply_affine, axcodes_orientation, axis_orientation, get_affine_and_translation, Affine4,
};
use crate::error::{Result, TractError};
use crate::streamline::Streamline;
use crate::util::read_file_bytes;
use byteordered::{ByteOrdered, Endianness};
use log::{debug, warn};
use nalgebra::Point3;
use ndarray::Array2;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::Path;

/// Size of a TrackVis header, in bytes.
pub const HEADER_SIZE: usize = 1000;
/// Magic code at the start of every TrackVis file.
pub const MAGIC_CODE: &[u8; 5] = b"TRACK";
/// Voxel order assumed when the header leaves it blank.
pub const DEFAULT_VOXEL_ORDER: &str = "LPS";

/// The TrackVis header fields used by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct TrkHeader {
    /// Image dimensions
    pub dim: [i16; 3],
    /// Voxel size, in mm
    pub voxel_size: [f32; 3],
    /// Image origin (unused by TrackVis)
    pub origin: [f32; 3],
    /// Number of values attached to each point
    pub n_scalars: i16,
    /// Names of the per-point values
    pub scalar_names: Vec<String>,
    /// Number of values attached to each streamline
    pub n_properties: i16,
    /// Names of the per-streamline values
    pub property_names: Vec<String>,
    /// Voxel to RAS affine, row major. Invalid when `[3][3]` is zero.
    pub vox_to_ras: [[f32; 4]; 4],
    /// Orientation of the voxel axes, e.g. `"LAS"`
    pub voxel_order: String,
    /// Number of streamlines, zero when unknown
    pub n_count: i32,
    /// Format version
    pub version: i32,
    /// Byte order of the file
    pub endianness: Endianness,
}

impl Default for TrkHeader {
    fn default() -> TrkHeader {
        TrkHeader {
            dim: [0; 3],
            voxel_size: [1.; 3],
            origin: [0.; 3],
            n_scalars: 0,
            scalar_names: Vec::new(),
            n_properties: 0,
            property_names: Vec::new(),
            vox_to_ras: [
                [1., 0., 0., 0.],
                [0., 1., 0., 0.],
                [0., 0., 1., 0.],
                [0., 0., 0., 1.],
            ],
            voxel_order: "RAS".to_string(),
            n_count: 0,
            version: 2,
            endianness: Endianness::Little,
        }
    }
}

fn read_name<S: Read>(mut source: S) -> Result<String> {
    let mut raw = [0u8; 20];
    source.read_exact(&mut raw)?;
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..len]).trim().to_string())
}

impl TrkHeader {
    /// Read a TrackVis header from the first bytes of a file.
    ///
    /// # Errors
    ///
    /// - `TractError::MalformedInput` if the magic code or the header size
    ///   field are invalid.
    pub fn from_bytes(bytes: &[u8]) -> Result<TrkHeader> {
        if bytes.len() < HEADER_SIZE || &bytes[..5] != MAGIC_CODE {
            return Err(TractError::MalformedInput(
                "not a TrackVis file".to_string(),
            ));
        }
        let size_field = [bytes[996], bytes[997], bytes[998], bytes[999]];
        let endianness = if i32::from_le_bytes(size_field) == HEADER_SIZE as i32 {
            Endianness::Little
        } else if i32::from_be_bytes(size_field) == HEADER_SIZE as i32 {
            Endianness::Big
        } else {
            return Err(TractError::MalformedInput(
                "invalid TrackVis header size".to_string(),
            ));
        };

        let mut h = TrkHeader {
            endianness,
            ..TrkHeader::default()
        };
        let mut input = ByteOrdered::runtime(&bytes[6..HEADER_SIZE], endianness);
        for v in &mut h.dim {
            *v = input.read_i16()?;
        }
        for v in &mut h.voxel_size {
            *v = input.read_f32()?;
        }
        for v in &mut h.origin {
            *v = input.read_f32()?;
        }
        h.n_scalars = input.read_i16()?;
        let scalar_names = (0..10)
            .map(|_| read_name(&mut input))
            .collect::<Result<Vec<_>>>()?;
        h.n_properties = input.read_i16()?;
        let property_names = (0..10)
            .map(|_| read_name(&mut input))
            .collect::<Result<Vec<_>>>()?;
        for row in &mut h.vox_to_ras {
            for v in row.iter_mut() {
                *v = input.read_f32()?;
            }
        }
        let mut skip = [0u8; 444];
        input.read_exact(&mut skip)?;
        let mut order = [0u8; 4];
        input.read_exact(&mut order)?;
        let len = order.iter().position(|&b| b == 0).unwrap_or(order.len());
        h.voxel_order = String::from_utf8_lossy(&order[..len]).to_string();
        // pad2, image_orientation_patient, pad1, invert/swap flags
        let mut skip = [0u8; 4 + 24 + 2 + 6];
        input.read_exact(&mut skip)?;
        h.n_count = input.read_i32()?;
        h.version = input.read_i32()?;

        if h.n_scalars < 0 || h.n_properties < 0 {
            return Err(TractError::MalformedInput(
                "negative number of scalars or properties".to_string(),
            ));
        }
        h.scalar_names = named(&scalar_names, h.n_scalars as usize, "scalar");
        h.property_names = named(&property_names, h.n_properties as usize, "property");
        Ok(h)
    }

    /// The header fields as a text map.
    pub fn to_header_map(&self) -> Header {
        let mut map = Header::new();
        let _ = map.insert("dimensions".into(), format!("{:?}", self.dim));
        let _ = map.insert("voxel_sizes".into(), format!("{:?}", self.voxel_size));
        let _ = map.insert("voxel_order".into(), self.voxel_order.clone());
        let _ = map.insert("vox_to_ras".into(), format!("{:?}", self.vox_to_ras));
        let _ = map.insert("nb_streamlines".into(), self.n_count.to_string());
        let _ = map.insert("nb_scalars_per_point".into(), self.n_scalars.to_string());
        let _ = map.insert("nb_properties_per_streamline".into(), self.n_properties.to_string());
        let _ = map.insert("version".into(), self.version.to_string());
        map
    }

    /// The affine mapping stored "voxmm" coordinates to RAS mm.
    pub fn voxmm_to_rasmm(&self) -> Affine4 {
        let vs = self.voxel_size;
        let mut scale = Affine4::identity();
        for axis in 0..3 {
            let s = if vs[axis] != 0. { vs[axis] as f64 } else { 1. };
            scale[(axis, axis)] = 1. / s;
            // voxel corner to voxel centre
            scale[(axis, 3)] = -0.5;
        }

        let vox_to_ras = if self.vox_to_ras[3][3] != 0. {
            let mut m = Affine4::zeros();
            for r in 0..4 {
                for c in 0..4 {
                    m[(r, c)] = self.vox_to_ras[r][c] as f64;
                }
            }
            m
        } else {
            warn!("TrackVis vox_to_ras is not set, assuming the identity");
            Affine4::identity()
        };

        // older files leave the voxel order blank
        let order = match self.voxel_order.trim() {
            "" => DEFAULT_VOXEL_ORDER,
            order => order,
        };
        let reorient = match axcodes_orientation(order) {
            Some(declared) => {
                let (linear, _) = get_affine_and_translation(&vox_to_ras);
                reorientation(&declared, &axis_orientation(&linear), self.dim)
            }
            None => {
                warn!("Ignoring unknown voxel order {:?}", order);
                Affine4::identity()
            }
        };

        vox_to_ras * reorient * scale
    }
}

/// Affine taking voxel indices laid out as `declared` to the voxel axes of
/// `actual`, permuting and flipping axes as needed. `dim` holds the sizes
/// of the declared axes.
fn reorientation(
    declared: &[(usize, bool); 3],
    actual: &[(usize, bool); 3],
    dim: [i16; 3],
) -> Affine4 {
    let mut m = Affine4::zeros();
    m[(3, 3)] = 1.;
    for (from, &(world, positive)) in declared.iter().enumerate() {
        let to = match actual.iter().position(|&(w, _)| w == world) {
            Some(to) => to,
            None => return Affine4::identity(),
        };
        if to != from {
            debug!("Voxel axis {} is stored as axis {}", to, from);
        }
        if positive == actual[to].1 {
            m[(to, from)] = 1.;
        } else {
            m[(to, from)] = -1.;
            m[(to, 3)] = f64::from(dim[from]) - 1.;
        }
    }
    m
}

fn named(raw: &[String], n: usize, prefix: &str) -> Vec<String> {
    (0..n)
        .map(|i| match raw.get(i) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}_{}", prefix, i),
        })
        .collect()
}

/// Read a TrackVis file. If the file name ends with ".gz", the file is
/// decoded as a Gzip stream first.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Tractogram> {
    from_bytes(&read_file_bytes(path)?)
}

/// Read a TrackVis file from the given byte stream, consuming it to the end.
pub fn from_reader<R: Read>(mut source: R) -> Result<Tractogram> {
    let mut bytes = Vec::new();
    let _ = source.read_to_end(&mut bytes)?;
    from_bytes(&bytes)
}

/// Decode the full contents of a TrackVis file. Points are returned in RAS
/// mm, and per-point scalars become point data named after the header.
pub fn from_bytes(bytes: &[u8]) -> Result<Tractogram> {
    let header = TrkHeader::from_bytes(bytes)?;
    let affine = header.voxmm_to_rasmm();
    let n_scalars = header.n_scalars as usize;
    let n_properties = header.n_properties as usize;

    let body = &bytes[HEADER_SIZE..];
    let mut input = ByteOrdered::runtime(body, header.endianness);
    let mut remaining = body.len();
    let mut streamlines = Vec::new();
    let mut scalars: Vec<Array2<f64>> = Vec::new();

    let truncated = |e: std::io::Error| {
        if e.kind() == IoErrorKind::UnexpectedEof {
            TractError::MalformedInput("truncated TrackVis streamline".to_string())
        } else {
            TractError::Io(e)
        }
    };

    while remaining >= 4 {
        let n = input.read_i32().map_err(truncated)?;
        if n < 0 {
            return Err(TractError::MalformedInput(format!(
                "negative point count {}",
                n
            )));
        }
        let n = n as usize;
        remaining -= 4;
        let needed = 4 * (n * (3 + n_scalars) + n_properties);
        if needed > remaining {
            return Err(TractError::MalformedInput(
                "truncated TrackVis streamline".to_string(),
            ));
        }

        let mut points = Vec::with_capacity(n);
        let mut values = Array2::zeros((n, n_scalars));
        for i in 0..n {
            let mut xyz = [0f64; 3];
            for v in xyz.iter_mut() {
                *v = f64::from(input.read_f32().map_err(truncated)?);
            }
            points.push(apply_affine(&affine, &Point3::from(xyz)));
            for j in 0..n_scalars {
                values[[i, j]] = f64::from(input.read_f32().map_err(truncated)?);
            }
        }
        for _ in 0..n_properties {
            let _ = input.read_f32().map_err(truncated)?;
        }
        remaining -= needed;

        if n > 0 {
            streamlines.push(Streamline::new(points)?);
            scalars.push(values);
        }
    }

    if header.n_count > 0 && header.n_count as usize != streamlines.len() {
        warn!(
            "Header declares {} streamlines, but {} were read",
            header.n_count,
            streamlines.len()
        );
    }

    let mut point_data = PointData::new();
    for (j, name) in header.scalar_names.iter().enumerate() {
        let arrays = scalars
            .iter()
            .map(|a| a.column(j).to_owned().insert_axis(ndarray::Axis(1)))
            .collect();
        let _ = point_data.insert(name.clone(), arrays);
    }

    Ok(Tractogram {
        streamlines,
        header: Some(header.to_header_map()),
        point_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_affine_centres_voxels() {
        let header = TrkHeader {
            voxel_size: [2., 2., 2.],
            ..TrkHeader::default()
        };
        let affine = header.voxmm_to_rasmm();
        let p = apply_affine(&affine, &Point3::new(1., 1., 1.));
        // voxmm (1, 1, 1) is the centre of voxel (0, 0, 0)
        assert_abs_diff_eq!(p, Point3::new(0., 0., 0.), epsilon = 1e-12);
    }

    #[test]
    fn voxel_order_flip() {
        let header = TrkHeader {
            dim: [10, 10, 10],
            voxel_order: "LAS".to_string(),
            ..TrkHeader::default()
        };
        let affine = header.voxmm_to_rasmm();
        let p = apply_affine(&affine, &Point3::new(0.5, 0.5, 0.5));
        assert_abs_diff_eq!(p, Point3::new(9., 0., 0.), epsilon = 1e-12);
    }

    #[test]
    fn permuted_voxel_order() {
        // stored axes are (A, S, R) while the affine is RAS
        let header = TrkHeader {
            dim: [4, 6, 8],
            voxel_order: "ASR".to_string(),
            ..TrkHeader::default()
        };
        let affine = header.voxmm_to_rasmm();
        let p = apply_affine(&affine, &Point3::new(1.5, 2.5, 3.5));
        assert_abs_diff_eq!(p, Point3::new(3., 1., 2.), epsilon = 1e-12);
    }

    #[test]
    fn blank_voxel_order_is_lps() {
        let header = TrkHeader {
            dim: [10, 10, 10],
            voxel_order: String::new(),
            ..TrkHeader::default()
        };
        let affine = header.voxmm_to_rasmm();
        let p = apply_affine(&affine, &Point3::new(1.5, 1.5, 1.5));
        assert_abs_diff_eq!(p, Point3::new(8., 8., 1.), epsilon = 1e-12);
    }

    #[test]
    fn rejects_garbage() {
        assert!(TrkHeader::from_bytes(b"TRACK").is_err());
        assert!(TrkHeader::from_bytes(&[0u8; 1000]).is_err());
    }
}
