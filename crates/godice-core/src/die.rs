//! Die shells, housings, and device-reported enumerations

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::geometry::{
    Vector3, D10X_RELABEL, D10_RELABEL, D12_RELABEL, D20_VECTORS, D24_VECTORS, D4_RELABEL,
    D6_VECTORS, D8_RELABEL,
};

/// Physical body of the die, which determines the reference vector table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HousingKind {
    SixFace,
    TwentyFace,
    TwentyFourFace,
}

impl HousingKind {
    /// Reference vectors for this housing, in face order starting at face 1
    pub fn reference_table(self) -> &'static [Vector3] {
        match self {
            HousingKind::SixFace => &D6_VECTORS,
            HousingKind::TwentyFace => &D20_VECTORS,
            HousingKind::TwentyFourFace => &D24_VECTORS,
        }
    }

    /// Number of physical faces
    pub fn face_count(self) -> usize {
        self.reference_table().len()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown die type: {0}")]
pub struct ParseDieTypeError(pub String);

/// Logical die type (shell) currently fitted on the die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DieType {
    D6,
    D20,
    D10,
    D10X,
    D4,
    D8,
    D12,
}

impl Default for DieType {
    fn default() -> Self {
        Self::D6
    }
}

impl DieType {
    pub const ALL: [DieType; 7] = [
        DieType::D6,
        DieType::D20,
        DieType::D10,
        DieType::D10X,
        DieType::D4,
        DieType::D8,
        DieType::D12,
    ];

    pub fn housing(self) -> HousingKind {
        match self {
            DieType::D6 => HousingKind::SixFace,
            DieType::D20 | DieType::D10 | DieType::D10X => HousingKind::TwentyFace,
            DieType::D4 | DieType::D8 | DieType::D12 => HousingKind::TwentyFourFace,
        }
    }

    /// Relabel table from physical face index to logical value, if the
    /// die type does not number its faces the same way as its housing
    pub fn relabel_table(self) -> Option<&'static [u8]> {
        match self {
            DieType::D6 | DieType::D20 => None,
            DieType::D10 => Some(&D10_RELABEL),
            DieType::D10X => Some(&D10X_RELABEL),
            DieType::D4 => Some(&D4_RELABEL),
            DieType::D8 => Some(&D8_RELABEL),
            DieType::D12 => Some(&D12_RELABEL),
        }
    }

    /// Numeric identifier used by the vendor tooling
    pub fn code(self) -> u8 {
        match self {
            DieType::D6 => 0,
            DieType::D20 => 1,
            DieType::D10 => 2,
            DieType::D10X => 3,
            DieType::D4 => 4,
            DieType::D8 => 5,
            DieType::D12 => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DieType::D6 => "d6",
            DieType::D20 => "d20",
            DieType::D10 => "d10",
            DieType::D10X => "d10x",
            DieType::D4 => "d4",
            DieType::D8 => "d8",
            DieType::D12 => "d12",
        }
    }
}

impl std::fmt::Display for DieType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DieType {
    type Err = ParseDieTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        DieType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| ParseDieTypeError(s.to_string()))
    }
}

/// Color of the die body (dots)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
}

impl Color {
    /// Map the device color code, returning None for unknown codes
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Color::Black),
            1 => Some(Color::Red),
            2 => Some(Color::Green),
            3 => Some(Color::Blue),
            4 => Some(Color::Yellow),
            5 => Some(Color::Orange),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Movement state of the die when an orientation was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityKind {
    Rolling,
    Stable,
    TiltStable,
    FakeStable,
    MoveStable,
}

impl StabilityKind {
    /// Descriptor code used by the vendor tooling
    pub fn code(self) -> u8 {
        match self {
            StabilityKind::Rolling => 1,
            StabilityKind::Stable => 2,
            StabilityKind::TiltStable => 3,
            StabilityKind::FakeStable => 4,
            StabilityKind::MoveStable => 5,
        }
    }
}
