//! Readers for VTK polydata, in the legacy (".vtk") and XML (".vtp",
//! ".xml") flavors.
//!
//! Both readers decode the file into a [`PolyData`], the raw point table
//! and cell array of the file. VTK encodes all lines in one flat integer
//! array, made of `[n, i_0, …, i_(n-1)]` for each line in turn, where the
//! indices point into a point table shared by all lines. The lines are
//! unpacked into streamlines by [`PolyData::into_tractogram`], which slices
//! any per-point attribute array with the same indices.
//!
//! [`PolyData`]: struct.PolyData.html
//! [`PolyData::into_tractogram`]: struct.PolyData.html#method.into_tractogram

pub mod legacy;
pub mod xml;

use super::{PointData, Tractogram};
use crate::error::{Result, TractError};
use crate::streamline::Streamline;
use log::{debug, warn};
use nalgebra::Point3;
use ndarray::{Array2, Axis};

/// The raw contents of a polydata file. Fields are optional because they
/// are filled in as the file is read; all three of `points`, `lines` and
/// `n_lines` are required to build a tractogram.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolyData {
    /// The shared point table
    pub points: Option<Vec<[f64; 3]>>,
    /// Flat cell array of the lines
    pub lines: Option<Vec<i64>>,
    /// Number of lines declared by the file
    pub n_lines: Option<usize>,
    /// Named per-point arrays, one row per point of the table
    pub point_arrays: Vec<(String, Array2<f64>)>,
}

impl PolyData {
    /// Unpack the lines into streamlines and per-point data.
    ///
    /// # Errors
    ///
    /// - `TractError::MalformedInput` if the points, the lines or the number
    ///   of lines are missing, or if the cell array is inconsistent with the
    ///   point table.
    pub fn into_tractogram(self) -> Result<Tractogram> {
        let missing = |what: &str| TractError::MalformedInput(format!("polydata without {}", what));
        let points = self.points.ok_or_else(|| missing("points"))?;
        let lines = self.lines.ok_or_else(|| missing("lines"))?;
        let n_lines = self.n_lines.ok_or_else(|| missing("number of lines"))?;

        let (streamlines, indices) = unpack_lines(&lines, n_lines, &points)?;

        let mut point_data = PointData::new();
        for (name, array) in self.point_arrays {
            if array.nrows() != points.len() {
                warn!(
                    "Skipping point array {:?}: {} tuples for {} points",
                    name,
                    array.nrows(),
                    points.len()
                );
                continue;
            }
            let per_line = indices
                .iter()
                .map(|idx| array.select(Axis(0), idx))
                .collect();
            let _ = point_data.insert(name, per_line);
        }

        Ok(Tractogram {
            streamlines,
            header: None,
            point_data,
        })
    }
}

/// Unpack a flat VTK cell array into streamlines.
///
/// The cursor starts at the first element and, for each of the `n_lines`
/// lines, reads a point count `n`, gathers the `n` following indices from
/// the point table and advances by `n + 1`. Lines without points are
/// skipped. Returns the streamlines and the point indices of each.
///
/// # Example
///
/// ```
/// use tractometry::format::vtk::unpack_lines;
/// # use tractometry::Result;
///
/// # fn run() -> Result<()> {
/// let points = [[0., 0., 0.], [1., 0., 0.], [2., 0., 0.], [3., 0., 0.], [4., 0., 0.]];
/// let (streamlines, _) = unpack_lines(&[2, 0, 1, 3, 2, 3, 4], 2, &points)?;
/// assert_eq!(streamlines.len(), 2);
/// assert_eq!(streamlines[1].len(), 3);
/// # Ok(())
/// # }
/// # run().unwrap();
/// ```
pub fn unpack_lines(
    lines: &[i64],
    n_lines: usize,
    points: &[[f64; 3]],
) -> Result<(Vec<Streamline>, Vec<Vec<usize>>)> {
    let capacity = n_lines.min(lines.len());
    let mut streamlines = Vec::with_capacity(capacity);
    let mut indices = Vec::with_capacity(capacity);
    let mut cursor = 0;
    for line in 0..n_lines {
        let count = *lines.get(cursor).ok_or_else(|| {
            TractError::MalformedInput(format!("cell array ends before line {}", line))
        })?;
        if count < 0 {
            return Err(TractError::MalformedInput(format!(
                "negative point count for line {}",
                line
            )));
        }
        let count = count as usize;
        let ids = lines.get(cursor + 1..(cursor + 1).saturating_add(count)).ok_or_else(|| {
            TractError::MalformedInput(format!("cell array ends within line {}", line))
        })?;
        let ids = ids
            .iter()
            .map(|&i| {
                if i >= 0 && (i as usize) < points.len() {
                    Ok(i as usize)
                } else {
                    Err(TractError::MalformedInput(format!(
                        "point index {} out of range",
                        i
                    )))
                }
            })
            .collect::<Result<Vec<usize>>>()?;
        cursor += count + 1;

        if ids.is_empty() {
            debug!("Skipping line {} without points", line);
            continue;
        }
        let line_points = ids.iter().map(|&i| Point3::from(points[i])).collect();
        streamlines.push(Streamline::new(line_points)?);
        indices.push(ids);
    }
    Ok((streamlines, indices))
}

/// Build a flat cell array out of an offsets array and a connectivity
/// array. With `leading_zero`, `offsets` holds `n + 1` values starting at
/// zero (legacy 5.x files); otherwise it holds the `n` end offsets (XML
/// files).
pub(crate) fn cells_from_offsets(
    offsets: &[i64],
    connectivity: &[i64],
    leading_zero: bool,
) -> Result<Vec<i64>> {
    let ends = if leading_zero && !offsets.is_empty() {
        &offsets[1..]
    } else {
        offsets
    };
    let mut start = if leading_zero {
        offsets.first().cloned().unwrap_or(0)
    } else {
        0
    };
    let mut cells = Vec::with_capacity(connectivity.len() + ends.len());
    for &end in ends {
        if start < 0 || end < start || end as usize > connectivity.len() {
            return Err(TractError::MalformedInput(format!(
                "invalid line offset {}",
                end
            )));
        }
        cells.push(end - start);
        cells.extend_from_slice(&connectivity[start as usize..end as usize]);
        start = end;
    }
    Ok(cells)
}

/// Group a flat list of values into point triplets.
pub(crate) fn to_triplets(values: &[f64], n_points: usize) -> Result<Vec<[f64; 3]>> {
    if values.len() / 3 < n_points {
        return Err(TractError::MalformedInput(format!(
            "{} coordinates for {} points",
            values.len(),
            n_points
        )));
    }
    Ok(values
        .chunks_exact(3)
        .take(n_points)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

/// Shape a flat list of values into an `n_tuples × n_components` array.
pub(crate) fn to_array(values: Vec<f64>, n_components: usize) -> Result<Array2<f64>> {
    let n_components = n_components.max(1);
    let n_tuples = values.len() / n_components;
    Array2::from_shape_vec((n_tuples, n_components), values)
        .map_err(|e| TractError::MalformedInput(format!("point array shape: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> Vec<[f64; 3]> {
        (0..5).map(|x| [x as f64, 0., 0.]).collect()
    }

    #[test]
    fn unpack_two_lines() {
        let (streamlines, indices) = unpack_lines(&[2, 0, 1, 3, 2, 3, 4], 2, &table()).unwrap();
        assert_eq!(streamlines.len(), 2);
        assert_eq!(
            streamlines[0],
            Streamline::from_coords(&[[0., 0., 0.], [1., 0., 0.]]).unwrap()
        );
        assert_eq!(
            streamlines[1],
            Streamline::from_coords(&[[2., 0., 0.], [3., 0., 0.], [4., 0., 0.]]).unwrap()
        );
        assert_eq!(indices, vec![vec![0, 1], vec![2, 3, 4]]);
    }

    #[test]
    fn unpack_rejects_bad_cells() {
        assert!(unpack_lines(&[2, 0, 1, 3, 2, 3], 2, &table()).is_err());
        assert!(unpack_lines(&[2, 0, 9], 1, &table()).is_err());
        assert!(unpack_lines(&[2, 0, 1], 2, &table()).is_err());
    }

    #[test]
    fn point_arrays_follow_lines() {
        let polydata = PolyData {
            points: Some(table()),
            lines: Some(vec![2, 4, 3, 3, 0, 1, 2]),
            n_lines: Some(2),
            point_arrays: vec![(
                "fa".to_string(),
                to_array(vec![0.0, 0.1, 0.2, 0.3, 0.4], 1).unwrap(),
            )],
        };
        let tractogram = polydata.into_tractogram().unwrap();
        assert_eq!(tractogram.header, None);
        let fa = &tractogram.point_data["fa"];
        assert_eq!(fa[0].column(0).to_vec(), vec![0.4, 0.3]);
        assert_eq!(fa[1].column(0).to_vec(), vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn missing_keys() {
        let polydata = PolyData {
            points: Some(table()),
            ..PolyData::default()
        };
        match polydata.into_tractogram() {
            Err(TractError::MalformedInput(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn offsets_to_cells() {
        assert_eq!(
            cells_from_offsets(&[0, 2, 5], &[0, 1, 2, 3, 4], true).unwrap(),
            vec![2, 0, 1, 3, 2, 3, 4]
        );
        assert_eq!(
            cells_from_offsets(&[2, 5], &[0, 1, 2, 3, 4], false).unwrap(),
            vec![2, 0, 1, 3, 2, 3, 4]
        );
        assert!(cells_from_offsets(&[2, 7], &[0, 1, 2, 3, 4], false).is_err());
    }
}
