use nalgebra::Vector3;
use std::fmt;

/// The six pose components in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseField {
    TranslationX,
    TranslationY,
    TranslationZ,
    RotationX,
    RotationY,
    RotationZ,
}

impl PoseField {
    pub const ALL: [PoseField; 6] = [
        PoseField::TranslationX,
        PoseField::TranslationY,
        PoseField::TranslationZ,
        PoseField::RotationX,
        PoseField::RotationY,
        PoseField::RotationZ,
    ];

    /// Maps a zero-based token position to its field; positions past the sixth have none.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for PoseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoseField::TranslationX => "translation.x",
            PoseField::TranslationY => "translation.y",
            PoseField::TranslationZ => "translation.z",
            PoseField::RotationX => "rotation.x",
            PoseField::RotationY => "rotation.y",
            PoseField::RotationZ => "rotation.z",
        };
        f.write_str(name)
    }
}

/// Displacement plus intrinsic X-Y-Z Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vector3<f64>,
    pub rotation: Vector3<f64>,
}

impl Pose {
    pub fn new(translation: Vector3<f64>, rotation: Vector3<f64>) -> Self {
        Self { translation, rotation }
    }

    pub fn zero() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: Vector3::zeros(),
        }
    }

    pub fn get(&self, field: PoseField) -> f64 {
        match field {
            PoseField::TranslationX => self.translation.x,
            PoseField::TranslationY => self.translation.y,
            PoseField::TranslationZ => self.translation.z,
            PoseField::RotationX => self.rotation.x,
            PoseField::RotationY => self.rotation.y,
            PoseField::RotationZ => self.rotation.z,
        }
    }

    pub fn set(&mut self, field: PoseField, value: f64) {
        match field {
            PoseField::TranslationX => self.translation.x = value,
            PoseField::TranslationY => self.translation.y = value,
            PoseField::TranslationZ => self.translation.z = value,
            PoseField::RotationX => self.rotation.x = value,
            PoseField::RotationY => self.rotation.y = value,
            PoseField::RotationZ => self.rotation.z = value,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "displacement ({}, {}, {}) rotation ({}, {}, {})",
            self.translation.x,
            self.translation.y,
            self.translation.z,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z
        )
    }
}
