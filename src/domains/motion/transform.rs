use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use std::fmt;

use super::pose::Pose;

/// Fixed point the controlled body rotates about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentreOfRotation(Point3<f64>);

impl CentreOfRotation {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Point3::new(x, y, z))
    }

    pub fn origin() -> Self {
        Self(Point3::origin())
    }

    pub fn point(&self) -> &Point3<f64> {
        &self.0
    }
}

impl From<[f64; 3]> for CentreOfRotation {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Rotation for intrinsic X-Y-Z Euler angles in radians: `Rx(x) * Ry(y) * Rz(z)`.
pub fn rotation_from_euler_xyz(angles: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angles.x)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angles.y)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angles.z)
}

/// Rigid-body motion applied to the controlled body for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    isometry: Isometry3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self { isometry: Isometry3::identity() }
    }

    /// Composes `Translate(c) * Rotate(r) * Translate(-c - d)`, so a point `p`
    /// maps to `c + R(p - c - d)`.
    ///
    /// The rotation is anchored at `centre`, not at the coordinate origin, and
    /// the displacement is removed before rotating. Swapping the order changes
    /// the motion whenever the centre is not the origin.
    pub fn compose(pose: &Pose, centre: &CentreOfRotation) -> Self {
        let c = centre.point().coords;
        let to_anchor = Isometry3::from_parts(
            Translation3::from(-c - pose.translation),
            UnitQuaternion::identity(),
        );
        let rotate = Isometry3::from_parts(
            Translation3::identity(),
            rotation_from_euler_xyz(&pose.rotation),
        );
        let back = Isometry3::from_parts(Translation3::from(c), UnitQuaternion::identity());

        Self { isometry: back * rotate * to_anchor }
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.isometry.transform_point(point)
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.isometry.rotation
    }

    pub fn isometry(&self) -> &Isometry3<f64> {
        &self.isometry
    }

    /// `[tx, ty, tz, qw, qi, qj, qk]`
    pub fn to_components(&self) -> [f64; 7] {
        let t = self.translation();
        let q = self.rotation();
        [t.x, t.y, t.z, q.w, q.i, q.j, q.k]
    }

    /// Bit patterns of [`Self::to_components`], for exact cross-worker comparison.
    pub fn to_bits(&self) -> [u64; 7] {
        self.to_components().map(f64::to_bits)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for RigidTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [tx, ty, tz, qw, qi, qj, qk] = self.to_components();
        write!(f, "t=({}, {}, {}) q=({}, {}, {}, {})", tx, ty, tz, qw, qi, qj, qk)
    }
}
