//! Reference geometry for the die housings
//!
//! Each housing has a table of calibrated reference vectors, one per face,
//! measured with that face resting downward. Die types that share a housing
//! translate the physical face index into their own numbering through a
//! relabel table.
//!
//! All values here are calibration constants for the physical dice. They are
//! not derivable and must not be "corrected": some relabel tables map two
//! physical faces to the same logical value on purpose.

use serde::{Deserialize, Serialize};

/// A 3-axis orientation reading as reported by the die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: i8,
    pub y: i8,
    pub z: i8,
}

impl Vector3 {
    pub const fn new(x: i8, y: i8, z: i8) -> Self {
        Self { x, y, z }
    }

    /// Build a vector from three raw bytes, each reinterpreted as signed
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            x: bytes[0] as i8,
            y: bytes[1] as i8,
            z: bytes[2] as i8,
        }
    }

    /// Raw wire representation
    pub fn to_bytes(self) -> [u8; 3] {
        [self.x as u8, self.y as u8, self.z as u8]
    }

    /// Squared Euclidean distance to another vector
    pub fn distance_squared(self, other: Vector3) -> u32 {
        let dx = i32::from(self.x) - i32::from(other.x);
        let dy = i32::from(self.y) - i32::from(other.y);
        let dz = i32::from(self.z) - i32::from(other.z);
        (dx * dx + dy * dy + dz * dz) as u32
    }
}

impl From<(i8, i8, i8)> for Vector3 {
    fn from((x, y, z): (i8, i8, i8)) -> Self {
        Self::new(x, y, z)
    }
}

impl std::fmt::Display for Vector3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

const fn v(x: i8, y: i8, z: i8) -> Vector3 {
    Vector3::new(x, y, z)
}

/// Reference vectors for the 6-sided housing, faces 1..=6
pub static D6_VECTORS: [Vector3; 6] = [
    v(-64, 0, 0),
    v(0, 0, 64),
    v(0, 64, 0),
    v(0, -64, 0),
    v(0, 0, -64),
    v(64, 0, 0),
];

/// Reference vectors for the 20-sided housing, faces 1..=20
pub static D20_VECTORS: [Vector3; 20] = [
    v(-64, 0, -22),
    v(42, -42, 40),
    v(0, 22, -64),
    v(0, 22, 64),
    v(-42, -42, 42),
    v(22, 64, 0),
    v(-42, -42, -42),
    v(64, 0, -22),
    v(-22, 64, 0),
    v(42, -42, -42),
    v(-42, 42, 42),
    v(22, -64, 0),
    v(-64, 0, 22),
    v(42, 42, 42),
    v(-22, -64, 0),
    v(42, 42, -42),
    v(0, -22, -64),
    v(0, -22, 64),
    v(-42, 42, -42),
    v(64, 0, 22),
];

/// Reference vectors for the 24-sided housing, faces 1..=24
pub static D24_VECTORS: [Vector3; 24] = [
    v(20, -60, -20),
    v(20, 0, 60),
    v(-40, -40, 40),
    v(-60, 0, 20),
    v(40, 20, 40),
    v(-20, -60, -20),
    v(20, 60, 20),
    v(-40, 20, -40),
    v(-40, 40, 40),
    v(-20, 0, 60),
    v(-20, -60, 20),
    v(60, 0, 20),
    v(-60, 0, -20),
    v(20, 60, -20),
    v(20, 0, -60),
    v(40, -20, -40),
    v(-20, 60, -20),
    v(-40, -40, -40),
    v(40, -20, 40),
    v(20, -60, 20),
    v(60, 0, -20),
    v(40, 20, -40),
    v(-20, 0, -60),
    v(-20, 60, 20),
];

// Relabel tables are indexed by physical face - 1.

/// 20-sided housing to D10 digits
pub static D10_RELABEL: [u8; 20] = [8, 2, 6, 1, 4, 3, 9, 0, 7, 5, 5, 7, 0, 9, 3, 4, 1, 6, 2, 8];

/// 20-sided housing to D10X (tens) values
pub static D10X_RELABEL: [u8; 20] = [
    80, 20, 60, 10, 40, 30, 90, 0, 70, 50, 50, 70, 0, 90, 30, 40, 10, 60, 20, 80,
];

/// 24-sided housing to D4 values
pub static D4_RELABEL: [u8; 24] = [
    3, 1, 4, 1, 4, 4, 1, 4, 2, 3, 1, 1, 1, 4, 2, 3, 3, 2, 2, 2, 4, 1, 3, 2,
];

/// 24-sided housing to D8 values
pub static D8_RELABEL: [u8; 24] = [
    3, 3, 6, 1, 2, 8, 1, 1, 4, 7, 5, 5, 4, 4, 2, 5, 7, 7, 8, 2, 8, 3, 6, 6,
];

/// 24-sided housing to D12 values
pub static D12_RELABEL: [u8; 24] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
];
