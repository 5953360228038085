//! Affine transforms between voxel index space and physical (RAS mm) space.
use crate::error::{Result, TractError};
use nalgebra::{Matrix3, Matrix4, Point3, Scalar, Vector3};

/// Linear part of an affine transform.
pub type Affine3 = Matrix3<f64>;
/// Homogeneous voxel-to-physical transform.
pub type Affine4 = Matrix4<f64>;

/// Separate a 4x4 affine into its 3x3 affine and translation components.
pub fn get_affine_and_translation<T: Scalar>(affine: &Matrix4<T>) -> (Matrix3<T>, Vector3<T>) {
    let translation = Vector3::<T>::new(
        affine[(0, 3)].clone(),
        affine[(1, 3)].clone(),
        affine[(2, 3)].clone(),
    );
    let affine = affine.fixed_view::<3, 3>(0, 0).into_owned();
    (affine, translation)
}

/// Apply a homogeneous affine to a single point, ignoring the projective row.
pub fn apply_affine(affine: &Affine4, point: &Point3<f64>) -> Point3<f64> {
    let (linear, translation) = get_affine_and_translation(affine);
    Point3::from(linear * point.coords + translation)
}

/// Invert an affine transform.
///
/// # Errors
///
/// - `TractError::InvalidArgument` if the affine is singular.
pub fn inverse(affine: &Affine4) -> Result<Affine4> {
    affine
        .try_inverse()
        .ok_or_else(|| TractError::InvalidArgument(format!("singular affine {}", affine)))
}

/// Map a physical point into voxel index coordinates, given the
/// voxel-to-physical `affine`.
pub fn ras_to_ijk(point: &Point3<f64>, affine: &Affine4) -> Result<Point3<f64>> {
    Ok(apply_affine(&inverse(affine)?, point))
}

/// Convert a single precision affine, as found in image headers, to the
/// double precision used for all computations.
pub fn from_f32(affine: &Matrix4<f32>) -> Affine4 {
    affine.cast::<f64>()
}

/// Obtain the orientation of each voxel axis of the given 3x3 affine.
///
/// For each voxel axis, the result holds the physical axis it is mostly
/// aligned with (0 = x, 1 = y, 2 = z) and whether it points towards the
/// positive (RAS) direction of that axis.
pub fn axis_orientation(affine: &Affine3) -> [(usize, bool); 3] {
    let mut out = [(0, true); 3];
    let mut taken = [false; 3];
    for (column, slot) in out.iter_mut().enumerate() {
        let col = affine.column(column);
        let mut best = None;
        for row in 0..3 {
            if taken[row] {
                continue;
            }
            let v = col[row];
            match best {
                Some((_, b)) if f64::abs(b) >= f64::abs(v) => {}
                _ => best = Some((row, v)),
            }
        }
        if let Some((row, v)) = best {
            taken[row] = true;
            *slot = (row, v >= 0.0);
        }
    }
    out
}

/// Obtain the orientation of each voxel axis from axis codes such as `"LAS"`.
/// Returns `None` for codes which do not name three distinct axes.
pub fn axcodes_orientation(codes: &str) -> Option<[(usize, bool); 3]> {
    let mut out = [(0, true); 3];
    let mut seen = [false; 3];
    let mut chars = codes.trim().chars();
    for slot in out.iter_mut() {
        let (axis, positive) = match chars.next()?.to_ascii_uppercase() {
            'R' => (0, true),
            'L' => (0, false),
            'A' => (1, true),
            'P' => (1, false),
            'S' => (2, true),
            'I' => (2, false),
            _ => return None,
        };
        if seen[axis] {
            return None;
        }
        seen[axis] = true;
        *slot = (axis, positive);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    #[rustfmt::skip]
    fn ras_ijk_roundtrip() {
        let affine = Affine4::new(
            2.0, 0.0, 0.0, -90.0,
            0.0, 2.0, 0.0, -126.0,
            0.0, 0.0, 2.0, -72.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let ijk = ras_to_ijk(&Point3::new(0.0, 0.0, 0.0), &affine).unwrap();
        assert_abs_diff_eq!(ijk, Point3::new(45.0, 63.0, 36.0), epsilon = 1e-9);
        let ras = apply_affine(&affine, &ijk);
        assert_abs_diff_eq!(ras, Point3::origin(), epsilon = 1e-9);
    }

    #[test]
    fn singular_affine() {
        assert!(inverse(&Affine4::zeros()).is_err());
    }

    #[test]
    #[rustfmt::skip]
    fn orientation_of_las_affine() {
        let affine = Affine3::new(
            -1.0, 0.0, 0.0,
             0.0, 1.0, 0.0,
             0.0, 0.0, 1.0,
        );
        assert_eq!(axis_orientation(&affine), [(0, false), (1, true), (2, true)]);
        assert_eq!(axcodes_orientation("LAS"), Some([(0, false), (1, true), (2, true)]));
        assert_eq!(axcodes_orientation("RRS"), None);
        assert_eq!(axcodes_orientation(""), None);
    }
}
