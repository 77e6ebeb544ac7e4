//! Nearest-reference classification of orientation vectors
//!
//! Classification is best-effort: there is no distance threshold, so any
//! vector resolves to some face, however implausible the reading.

use crate::die::{DieType, HousingKind};
use crate::geometry::Vector3;

/// Return the 1-based face index whose reference vector is nearest to `vector`.
///
/// Ties go to the face that comes first in the table.
pub fn classify(housing: HousingKind, vector: Vector3) -> u8 {
    let mut best_index = 0;
    let mut best_distance = u32::MAX;

    for (index, reference) in housing.reference_table().iter().enumerate() {
        let distance = vector.distance_squared(*reference);
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        }
    }

    (best_index + 1) as u8
}

/// Resolve the face value shown by a die of the given type
pub fn resolve(die_type: DieType, vector: Vector3) -> u8 {
    let face = classify(die_type.housing(), vector);
    match die_type.relabel_table() {
        Some(table) => table[usize::from(face) - 1],
        None => face,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{D10_RELABEL, D20_VECTORS, D24_VECTORS, D6_VECTORS};

    const HOUSINGS: [HousingKind; 3] = [
        HousingKind::SixFace,
        HousingKind::TwentyFace,
        HousingKind::TwentyFourFace,
    ];

    #[test]
    fn test_reference_vectors_classify_to_own_face() {
        for housing in HOUSINGS {
            for (index, reference) in housing.reference_table().iter().enumerate() {
                assert_eq!(
                    classify(housing, *reference) as usize,
                    index + 1,
                    "{:?} face {}",
                    housing,
                    index + 1
                );
            }
        }
    }

    #[test]
    fn test_noisy_reading_snaps_to_nearest() {
        assert_eq!(classify(HousingKind::SixFace, Vector3::new(-58, 5, -3)), 1);
        assert_eq!(classify(HousingKind::SixFace, Vector3::new(2, 3, 61)), 2);
    }

    #[test]
    fn test_tie_goes_to_first_face() {
        // Origin is equidistant from every six-face reference vector
        assert_eq!(classify(HousingKind::SixFace, Vector3::new(0, 0, 0)), 1);
        // Midpoint of faces 2 and 3 on the six-face table
        assert_eq!(classify(HousingKind::SixFace, Vector3::new(0, 32, 32)), 2);
    }

    #[test]
    fn test_out_of_range_still_classifies() {
        let face = classify(HousingKind::TwentyFace, Vector3::new(127, 127, 127));
        assert_eq!(face, 14);
        let face = classify(HousingKind::TwentyFourFace, Vector3::new(-128, -128, -128));
        assert_eq!(face, 18);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let vec = Vector3::new(11, -37, 50);
        assert_eq!(
            classify(HousingKind::TwentyFourFace, vec),
            classify(HousingKind::TwentyFourFace, vec)
        );
    }

    #[test]
    fn test_resolve_d10_relabels_twenty_face() {
        assert_eq!(resolve(DieType::D10, D20_VECTORS[10]), D10_RELABEL[10]);
        assert_eq!(resolve(DieType::D10, D20_VECTORS[10]), 5);
        assert_eq!(resolve(DieType::D10, D20_VECTORS[7]), 0);
    }

    #[test]
    fn test_resolve_identity_types() {
        assert_eq!(resolve(DieType::D20, Vector3::new(-64, 0, 22)), 13);
        assert_eq!(resolve(DieType::D6, D6_VECTORS[5]), 6);
    }

    #[test]
    fn test_resolve_twenty_four_face_types() {
        // Face 6 of the 24-sided housing
        let vec = D24_VECTORS[5];
        assert_eq!(resolve(DieType::D4, vec), 4);
        assert_eq!(resolve(DieType::D8, vec), 8);
        assert_eq!(resolve(DieType::D12, vec), 6);
        // Face 13 wraps around on the D12 shell
        assert_eq!(resolve(DieType::D12, D24_VECTORS[12]), 1);
    }

    #[test]
    fn test_resolve_d10x_collision() {
        assert_eq!(resolve(DieType::D10X, D20_VECTORS[9]), 50);
        assert_eq!(resolve(DieType::D10X, D20_VECTORS[10]), 50);
        assert_eq!(resolve(DieType::D10X, D20_VECTORS[19]), 80);
    }
}
