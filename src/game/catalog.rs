//! Piece Catalog
//!
//! The fixed set of stackable piece kinds. Both peers index the same table,
//! so a snapshot only needs to carry the kind index.

use crate::core::rng::DeterministicRng;

/// Physical description of one piece kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceKind {
    /// Display name.
    pub name: &'static str,
    /// Half width of the collision box (pixels).
    pub half_width: f32,
    /// Half height of the collision box (pixels).
    pub half_height: f32,
    /// Body mass.
    pub mass: f32,
    /// Surface friction.
    pub friction: f32,
    /// Restitution.
    pub bounce: f32,
}

/// All piece kinds, indexed by `type_index`.
pub const PIECE_KINDS: [PieceKind; 5] = [
    PieceKind { name: "block", half_width: 40.0, half_height: 40.0, mass: 10.0, friction: 0.8, bounce: 0.0 },
    PieceKind { name: "slab", half_width: 90.0, half_height: 20.0, mass: 12.0, friction: 0.9, bounce: 0.0 },
    PieceKind { name: "pillar", half_width: 22.0, half_height: 70.0, mass: 8.0, friction: 0.7, bounce: 0.05 },
    PieceKind { name: "crate", half_width: 55.0, half_height: 45.0, mass: 14.0, friction: 0.85, bounce: 0.0 },
    PieceKind { name: "beam", half_width: 120.0, half_height: 14.0, mass: 9.0, friction: 0.6, bounce: 0.1 },
];

/// Look up a kind by index.
pub fn kind(type_index: u8) -> Option<&'static PieceKind> {
    PIECE_KINDS.get(type_index as usize)
}

/// Draw a random kind index.
pub fn random_kind(rng: &mut DeterministicRng) -> u8 {
    // PIECE_KINDS is non-empty, so choose_index always yields Some
    rng.choose_index(PIECE_KINDS.len()).unwrap_or(0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(kind(0).map(|k| k.name), Some("block"));
        assert!(kind(PIECE_KINDS.len() as u8).is_none());
    }

    #[test]
    fn test_random_kind_in_range() {
        let mut rng = DeterministicRng::new(9);
        for _ in 0..200 {
            assert!(kind(random_kind(&mut rng)).is_some());
        }
    }
}
