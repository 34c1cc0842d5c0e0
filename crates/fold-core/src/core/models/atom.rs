use nalgebra::Point3;

/// A named atom stored in its residue's local coordinate frame.
///
/// Cartesian positions are never stored on the atom itself; they are obtained by
/// applying the owning residue's frame (see [`Pose::xyz`](super::pose::Pose::xyz)).
/// This keeps every conformational change a pure update of residue frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub name: String,
    pub local: Point3<f64>,
}

impl Atom {
    pub fn new(name: &str, local: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            local,
        }
    }
}
