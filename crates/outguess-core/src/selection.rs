//! Which coefficients may carry payload bits, and in which order.

use crate::error::Result;
use crate::jpeg::CoefficientImage;
use crate::lattice::Lattice;
use crate::options::{check_resistance, Password};
use crate::permutation::{keyed_rng, shuffle, Domain};

/// Grid scale in percent of the standard tables and the largest lattice
/// magnitude, per level.
///
/// `(ceiling + 1/2) * scale` never grows with the level. A lattice value
/// within the ceiling at one level is then within the ceiling of every
/// lower level too, whatever the image's own tables are.
const LEVELS: [(u16, u16); 10] = [
    (6, 512),
    (8, 256),
    (10, 192),
    (12, 128),
    (15, 96),
    (80, 14),
    (120, 9),
    (170, 6),
    (240, 4),
    (320, 2),
];

/// Eligibility rules for one compression resistance level.
///
/// A coefficient at zigzag index `k` with lattice value `v` is eligible
/// when `1 <= k <= cutoff` and `floor <= |v| <= ceiling`. Grid, ceiling
/// and cutoff all tighten as the level grows, so eligible sets are nested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResistancePolicy {
    level: u8,
    grid_scale: u16,
    ceiling: u16,
    cutoff: usize,
}

impl ResistancePolicy {
    pub fn for_level(level: u8) -> Result<Self> {
        check_resistance(level)?;
        let (grid_scale, ceiling) = LEVELS[level as usize - 1];
        Ok(Self {
            level,
            grid_scale,
            ceiling,
            cutoff: 63 - 4 * (level as usize - 1),
        })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Resistance grid in percent of the standard quantization tables.
    pub fn grid_scale(&self) -> u16 {
        self.grid_scale
    }

    /// Smallest lattice magnitude that may carry a bit.
    pub fn floor(&self) -> u16 {
        1
    }

    /// Largest lattice magnitude that may carry a bit.
    pub fn ceiling(&self) -> u16 {
        self.ceiling
    }

    /// Highest zigzag index that may carry a bit.
    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    #[inline]
    pub fn contains_magnitude(&self, magnitude: u16) -> bool {
        (self.floor()..=self.ceiling).contains(&magnitude)
    }

    #[inline]
    pub fn is_eligible(&self, index: usize, value: i16) -> bool {
        (1..=self.cutoff).contains(&index) && self.contains_magnitude(value.unsigned_abs())
    }
}

/// Address of one coefficient inside a [`CoefficientImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoefficientPosition {
    /// Index into [`CoefficientImage::components`], not the JPEG component id.
    pub component: u8,
    pub block: u32,
    /// Zigzag index within the block.
    pub index: u8,
}

impl CoefficientPosition {
    #[inline]
    fn offset(&self) -> usize {
        self.block as usize * 64 + self.index as usize
    }

    #[inline]
    pub fn get(&self, image: &CoefficientImage) -> i16 {
        image.components()[self.component as usize].data[self.offset()]
    }

    #[inline]
    pub fn set(&self, image: &mut CoefficientImage, value: i16) {
        let offset = self.offset();
        image.components_mut()[self.component as usize].data[offset] = value;
    }
}

/// Every eligible coefficient, in canonical order:
/// component, block in raster order, zigzag index.
pub fn eligible_positions(image: &CoefficientImage, lattice: &Lattice) -> Vec<CoefficientPosition> {
    let policy = lattice.policy();
    let mut positions = Vec::new();
    for (component_index, component) in image.components().iter().enumerate() {
        for (block_index, block) in component.data.chunks_exact(64).enumerate() {
            for (index, &coeff) in block.iter().enumerate().take(policy.cutoff() + 1) {
                if policy.is_eligible(index, lattice.quantize(component_index, index, coeff)) {
                    positions.push(CoefficientPosition {
                        component: component_index as u8,
                        block: block_index as u32,
                        index: index as u8,
                    });
                }
            }
        }
    }
    positions
}

/// Number of eligible coefficients, without collecting them.
pub fn eligible_count(image: &CoefficientImage, lattice: &Lattice) -> usize {
    let policy = lattice.policy();
    image
        .components()
        .iter()
        .enumerate()
        .flat_map(|(component_index, component)| {
            component
                .data
                .chunks_exact(64)
                .map(move |block| (component_index, block))
        })
        .map(|(component_index, block)| {
            block
                .iter()
                .enumerate()
                .take(policy.cutoff() + 1)
                .filter(|&(index, &coeff)| {
                    policy.is_eligible(index, lattice.quantize(component_index, index, coeff))
                })
                .count()
        })
        .sum()
}

/// Eligible coefficients in keyed order.
///
/// The order is a forward Fisher-Yates shuffle of the canonical order, so
/// any prefix is the selection for a payload of that many bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSequence {
    lattice: Lattice,
    positions: Vec<CoefficientPosition>,
}

impl SelectionSequence {
    pub fn policy(&self) -> &ResistancePolicy {
        self.lattice.policy()
    }

    /// The lattice the positions were judged on.
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[CoefficientPosition] {
        &self.positions
    }

    /// The first `count` positions carry data; the rest are spare.
    pub fn split_at(&self, count: usize) -> (&[CoefficientPosition], &[CoefficientPosition]) {
        self.positions.split_at(count.min(self.positions.len()))
    }

    /// Drop every position past `count`.
    pub fn truncate(&mut self, count: usize) {
        self.positions.truncate(count);
    }
}

/// Keyed selection sequence for `image` under `password` and `resistance`.
pub fn select(
    image: &CoefficientImage,
    password: &Password,
    resistance: u8,
) -> Result<SelectionSequence> {
    let lattice = Lattice::new(image, ResistancePolicy::for_level(resistance)?)?;
    let mut positions = eligible_positions(image, &lattice);
    shuffle(&mut positions, &mut keyed_rng(password.key(), Domain::Selection));

    log::trace!(
        "selected {} eligible coefficients at resistance {}",
        positions.len(),
        lattice.policy().level()
    );
    Ok(SelectionSequence { lattice, positions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::cover_image;
    use std::collections::HashSet;

    fn lattice(image: &CoefficientImage, level: u8) -> Lattice {
        Lattice::new(image, ResistancePolicy::for_level(level).unwrap()).unwrap()
    }

    #[test]
    fn test_policy_bounds() {
        let low = ResistancePolicy::for_level(1).unwrap();
        assert_eq!((low.floor(), low.ceiling(), low.cutoff()), (1, 512, 63));

        let mid = ResistancePolicy::for_level(5).unwrap();
        assert_eq!((mid.floor(), mid.ceiling(), mid.cutoff()), (1, 96, 47));

        let high = ResistancePolicy::for_level(10).unwrap();
        assert_eq!((high.floor(), high.ceiling(), high.cutoff()), (1, 2, 27));
        assert_eq!(high.grid_scale(), 320);
    }

    #[test]
    fn test_policy_rejects_out_of_range() {
        assert!(ResistancePolicy::for_level(0).is_err());
        assert!(ResistancePolicy::for_level(11).is_err());
    }

    #[test]
    fn test_policy_tightens_monotonically() {
        for level in 1..10 {
            let a = ResistancePolicy::for_level(level).unwrap();
            let b = ResistancePolicy::for_level(level + 1).unwrap();
            assert!(a.grid_scale() <= b.grid_scale());
            assert!(a.ceiling() > b.ceiling());
            assert!(a.cutoff() > b.cutoff());
            // largest eligible dequantized magnitude never grows
            assert!(
                (2 * b.ceiling() as u32 + 1) * b.grid_scale() as u32
                    <= (2 * a.ceiling() as u32 + 1) * a.grid_scale() as u32,
                "level {level}"
            );
            assert!(b.ceiling() > b.floor());
        }
    }

    #[test]
    fn test_dc_and_zero_are_never_eligible() {
        let policy = ResistancePolicy::for_level(1).unwrap();
        assert!(!policy.is_eligible(0, 5));
        assert!(!policy.is_eligible(3, 0));
        assert!(policy.is_eligible(3, -1));
        assert!(!policy.is_eligible(3, 513));
    }

    #[test]
    fn test_select_is_deterministic() {
        let image = cover_image(128, 96, 85);
        let password = Password::from("determinism");
        let a = select(&image, &password, 5).unwrap();
        let b = select(&image, &password, 5).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_select_is_a_permutation_of_eligible() {
        let image = cover_image(64, 64, 85);
        let lattice = lattice(&image, 3);
        let canonical = eligible_positions(&image, &lattice);
        assert_eq!(canonical.len(), eligible_count(&image, &lattice));

        let selection = select(&image, &Password::default(), 3).unwrap();
        let mut sorted = selection.positions().to_vec();
        sorted.sort_by_key(|p| (p.component, p.block, p.index));
        assert_eq!(sorted, canonical);
    }

    #[test]
    fn test_passwords_give_different_orders() {
        let image = cover_image(64, 64, 85);
        let a = select(&image, &Password::from("one"), 5).unwrap();
        let b = select(&image, &Password::from("two"), 5).unwrap();
        assert_ne!(a.positions(), b.positions());
    }

    #[test]
    fn test_eligible_sets_are_nested() {
        for quality in [60, 90, 100] {
            let image = cover_image(128, 128, quality);
            let sets: Vec<HashSet<CoefficientPosition>> = (1..=10)
                .map(|level| {
                    eligible_positions(&image, &lattice(&image, level))
                        .into_iter()
                        .collect()
                })
                .collect();
            for pair in sets.windows(2) {
                assert!(
                    pair[1].iter().all(|position| pair[0].contains(position)),
                    "quality {quality}"
                );
            }
        }
    }

    #[test]
    fn test_truncate_keeps_the_prefix() {
        let image = cover_image(64, 64, 85);
        let full = select(&image, &Password::default(), 2).unwrap();
        let mut short = full.clone();
        short.truncate(10);
        assert_eq!(short.positions(), &full.positions()[..10]);
        assert_eq!(short.lattice(), full.lattice());
    }
}
