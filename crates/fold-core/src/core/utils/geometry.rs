use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Some(Point3::from(sum / points.len() as f64))
}

pub fn radius_of_gyration(points: &[Point3<f64>]) -> f64 {
    match centroid(points) {
        Some(center) => {
            let sum: f64 = points.iter().map(|p| (p - center).norm_squared()).sum();
            (sum / points.len() as f64).sqrt()
        }
        None => 0.0,
    }
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// Optimal rotation taking the centered `mobile` points onto the centered `reference`
/// points (Kabsch), corrected so it never reflects.
pub fn kabsch_rotation(
    reference: &[Point3<f64>],
    mobile: &[Point3<f64>],
) -> Option<Rotation3<f64>> {
    if reference.len() != mobile.len() || reference.len() < 3 {
        return None;
    }
    let ref_center = centroid(reference)?;
    let mob_center = centroid(mobile)?;

    let mut h = Matrix3::zeros();
    for (p, q) in mobile.iter().zip(reference) {
        h += (p - mob_center) * (q - ref_center).transpose();
    }

    let svd = h.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let v = v_t.transpose();
    let d = (v * u.transpose()).determinant().signum();
    let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d));
    Some(Rotation3::from_matrix_unchecked(v * correction * u.transpose()))
}

/// RMSD after optimal rigid-body superposition of `mobile` onto `reference`.
///
/// Falls back to the plain RMSD for fewer than three points.
pub fn superposed_rmsd(reference: &[Point3<f64>], mobile: &[Point3<f64>]) -> Option<f64> {
    if reference.len() != mobile.len() || reference.is_empty() {
        return None;
    }
    let Some(rotation) = kabsch_rotation(reference, mobile) else {
        return calculate_rmsd(reference, mobile);
    };
    let ref_center = centroid(reference)?;
    let mob_center = centroid(mobile)?;
    let moved: Vec<Point3<f64>> = mobile
        .iter()
        .map(|p| ref_center + rotation * (p - mob_center))
        .collect();
    calculate_rmsd(reference, &moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> Vec<Point3<f64>> {
        vec![
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(-1.0, -1.0, 1.0),
            Point3::new(-1.0, 1.0, -1.0),
            Point3::new(1.0, -1.0, -1.0),
            Point3::new(2.0, 0.5, 0.0),
        ]
    }

    #[test]
    fn centroid_of_empty_set_is_none() {
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn radius_of_gyration_of_symmetric_points() {
        let points = [Point3::new(1.0, 0.0, 0.0), Point3::new(-1.0, 0.0, 0.0)];
        assert!((radius_of_gyration(&points) - 1.0).abs() < 1e-12);
        assert_eq!(radius_of_gyration(&[]), 0.0);
    }

    #[test]
    fn calculate_rmsd_requires_matching_lengths() {
        let a = [Point3::origin()];
        assert!(calculate_rmsd(&a, &[]).is_none());
        assert_eq!(calculate_rmsd(&a, &a), Some(0.0));
    }

    #[test]
    fn superposed_rmsd_is_zero_for_rigidly_moved_copy() {
        let reference = tetrahedron();
        let rotation = rotation_from_axis_angle(&Vector3::new(0.3, -1.0, 0.5), 73.0);
        let shift = Vector3::new(4.0, -2.0, 9.0);
        let mobile: Vec<_> = reference.iter().map(|p| rotation * p + shift).collect();
        assert!(calculate_rmsd(&reference, &mobile).unwrap() > 1.0);
        assert!(superposed_rmsd(&reference, &mobile).unwrap() < 1e-6);
    }

    #[test]
    fn superposed_rmsd_does_not_use_reflections() {
        let reference = tetrahedron();
        let mirrored: Vec<_> = reference
            .iter()
            .map(|p| Point3::new(-p.x, p.y, p.z))
            .collect();
        assert!(superposed_rmsd(&reference, &mirrored).unwrap() > 0.1);
    }

    #[test]
    fn kabsch_rotation_is_proper() {
        let reference = tetrahedron();
        let mobile: Vec<_> = reference
            .iter()
            .map(|p| Point3::new(p.y, -p.x, p.z + 0.1 * p.x))
            .collect();
        let rotation = kabsch_rotation(&reference, &mobile).unwrap();
        assert!((rotation.matrix().determinant() - 1.0).abs() < 1e-9);
    }
}
