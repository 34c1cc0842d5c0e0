use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

/// Virtual-bond geometry between two consecutive residues.
///
/// `angle` is the bond angle in degrees at the downstream residue (180° is a straight
/// chain), `torsion` the rotation about the incoming bond in degrees and `length` the
/// distance between the two backbone reference atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondGeometry {
    pub angle: f64,
    pub torsion: f64,
    pub length: f64,
}

/// Builds the frame-to-frame transform of a virtual bond.
///
/// The child origin sits `length` along the parent's x axis; the child orientation is
/// the parent's bent by `180 - angle` about z, then twisted by `torsion` about x.
pub fn ideal_bond(angle: f64, torsion: f64, length: f64) -> Isometry3<f64> {
    let twist = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), torsion.to_radians());
    let bend = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), (180.0 - angle).to_radians());
    Isometry3::from_parts(Translation3::new(length, 0.0, 0.0), twist * bend)
}

/// Inverse of [`ideal_bond`] for the direction of the child's x axis.
pub fn bond_geometry(bond: &Isometry3<f64>) -> BondGeometry {
    let direction = bond.rotation * Vector3::x();
    let bend = direction.x.clamp(-1.0, 1.0).acos().to_degrees();
    let torsion = if direction.y.abs() < 1e-12 && direction.z.abs() < 1e-12 {
        0.0
    } else {
        direction.z.atan2(direction.y).to_degrees()
    };
    BondGeometry {
        angle: 180.0 - bend,
        torsion,
        length: bond.translation.vector.norm(),
    }
}

/// Rotates the child side of a bond by `delta` degrees about the bond axis.
pub fn twist_bond(bond: &Isometry3<f64>, delta: f64) -> Isometry3<f64> {
    let twist = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), delta.to_radians());
    Isometry3::from_parts(bond.translation, twist * bond.rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    const EPS: f64 = 1e-9;

    #[test]
    fn ideal_bond_places_child_origin_along_x() {
        let bond = ideal_bond(120.0, 60.0, 5.9);
        let origin = bond * Point3::origin();
        assert!((origin - Point3::new(5.9, 0.0, 0.0)).norm() < EPS);
    }

    #[test]
    fn straight_bond_keeps_orientation() {
        let bond = ideal_bond(180.0, 0.0, 3.8);
        assert!(bond.rotation.angle() < EPS);
    }

    #[test]
    fn bond_geometry_recovers_angle_and_torsion() {
        for &(angle, torsion) in &[(150.0, 180.0), (100.0, -60.0), (120.0, 45.0)] {
            let geometry = bond_geometry(&ideal_bond(angle, torsion, 5.9));
            assert!((geometry.angle - angle).abs() < 1e-6);
            let dt = (geometry.torsion - torsion).rem_euclid(360.0);
            assert!(dt < 1e-6 || (360.0 - dt) < 1e-6);
            assert!((geometry.length - 5.9).abs() < EPS);
        }
    }

    #[test]
    fn twist_bond_changes_only_torsion() {
        let bond = ideal_bond(140.0, 30.0, 5.9);
        let twisted = bond_geometry(&twist_bond(&bond, 25.0));
        assert!((twisted.angle - 140.0).abs() < 1e-6);
        assert!((twisted.torsion - 55.0).abs() < 1e-6);
    }
}
