//! Resistance grid.
//!
//! Coefficients are read as values on a lattice. In band `k` of a component
//! the lattice step is the larger of the image's own quantizer and the
//! component's standard table scaled by the level's grid percentage.
//!
//! A coefficient sitting on a lattice point keeps its lattice value through
//! any requantization from `q_old` to `q_new` with `q_old + q_new < step`:
//! the stored value is at most `q_old / 2` off the lattice point, and
//! requantization adds at most `q_new / 2`. Low levels use grids finer
//! than usual covers, where the step is the quantizer itself and lattice
//! values are the stored coefficients.

use crate::error::{OutguessError, Result};
use crate::jpeg::{base_quant_values, CoefficientImage};
use crate::selection::{CoefficientPosition, ResistancePolicy};

/// Baseline AC range.
const MAX_COEFFICIENT: i64 = 1023;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComponentSteps {
    /// Quantizer of the image, zigzag order.
    quant: [u16; 64],
    /// Lattice step in hundredths of a dequantized unit.
    step: [u32; 64],
}

impl ComponentSteps {
    #[inline]
    fn quantize(&self, index: usize, coeff: i16) -> i16 {
        let scaled = coeff as i64 * self.quant[index] as i64 * 100;
        let step = self.step[index] as i64;
        let magnitude = (scaled.abs() + step / 2) / step;
        (magnitude * scaled.signum()) as i16
    }

    #[inline]
    fn dequantize(&self, index: usize, value: i16) -> i16 {
        let scaled = value as i64 * self.step[index] as i64;
        let divisor = self.quant[index] as i64 * 100;
        let magnitude = ((scaled.abs() + divisor / 2) / divisor).min(MAX_COEFFICIENT);
        (magnitude * scaled.signum()) as i16
    }
}

/// Lattice of one image under one resistance level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lattice {
    policy: ResistancePolicy,
    components: Vec<ComponentSteps>,
}

impl Lattice {
    pub fn new(image: &CoefficientImage, policy: ResistancePolicy) -> Result<Self> {
        let scale = policy.grid_scale() as u32;
        let components = image
            .components()
            .iter()
            .map(|component| {
                let id = component.quant_table_id;
                let table = image.quant_table(id).ok_or_else(|| {
                    OutguessError::format(format!("missing quantization table {id}"))
                })?;
                let base = base_quant_values(id);

                let mut step = [0u32; 64];
                for (k, slot) in step.iter_mut().enumerate() {
                    *slot = (table.values[k] as u32 * 100).max(base[k] as u32 * scale);
                }
                Ok(ComponentSteps {
                    quant: table.values,
                    step,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { policy, components })
    }

    pub fn policy(&self) -> &ResistancePolicy {
        &self.policy
    }

    /// Lattice value of stored coefficient `coeff`, halves away from zero.
    #[inline]
    pub fn quantize(&self, component: usize, index: usize, coeff: i16) -> i16 {
        self.components[component].quantize(index, coeff)
    }

    /// Stored coefficient closest to lattice value `value`.
    #[inline]
    pub fn dequantize(&self, component: usize, index: usize, value: i16) -> i16 {
        self.components[component].dequantize(index, value)
    }

    #[inline]
    pub fn value(&self, image: &CoefficientImage, position: &CoefficientPosition) -> i16 {
        self.quantize(
            position.component as usize,
            position.index as usize,
            position.get(image),
        )
    }

    #[inline]
    pub fn set_value(&self, image: &mut CoefficientImage, position: &CoefficientPosition, value: i16) {
        let coeff = self.dequantize(position.component as usize, position.index as usize, value);
        position.set(image, coeff);
    }

    /// Whether `value` survives being stored at `position`.
    #[inline]
    pub fn fits(&self, position: &CoefficientPosition, value: i16) -> bool {
        let (component, index) = (position.component as usize, position.index as usize);
        self.quantize(component, index, self.dequantize(component, index, value)) == value
    }

    /// Lattice value one magnitude step away from `value`, keeping its sign.
    ///
    /// The result stays inside the eligible band and is storable. `up`
    /// only decides when both neighbours qualify.
    pub fn step(&self, position: &CoefficientPosition, value: i16, up: bool) -> i16 {
        let magnitude = value.unsigned_abs();
        let sign = value.signum();
        let can_rise = magnitude < self.policy.ceiling()
            && self.fits(position, sign * (magnitude as i16 + 1));
        let can_fall = magnitude > self.policy.floor();

        let next = match (can_rise, can_fall) {
            (true, true) if up => magnitude + 1,
            (true, false) => magnitude + 1,
            (_, true) => magnitude - 1,
            (false, false) => magnitude,
        };
        sign * next as i16
    }

    /// Move every coefficient of the carrier bands onto its lattice point.
    ///
    /// Lattice values do not change, so neither does eligibility. Returns
    /// the number of stored coefficients that changed.
    pub fn snap(&self, image: &mut CoefficientImage) -> usize {
        let cutoff = self.policy.cutoff();
        let mut changed = 0;
        for (component, steps) in image.components_mut().iter_mut().zip(&self.components) {
            for block in component.data.chunks_exact_mut(64) {
                for (index, coeff) in block.iter_mut().enumerate().take(cutoff + 1).skip(1) {
                    let snapped = steps.dequantize(index, steps.quantize(index, *coeff));
                    if snapped != *coeff {
                        *coeff = snapped;
                        changed += 1;
                    }
                }
            }
        }
        log::trace!("{changed} coefficients snapped to the resistance grid");
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::cover_image;

    fn lattice(image: &CoefficientImage, level: u8) -> Lattice {
        Lattice::new(image, ResistancePolicy::for_level(level).unwrap()).unwrap()
    }

    fn values(image: &CoefficientImage, lattice: &Lattice) -> Vec<i16> {
        let cutoff = lattice.policy().cutoff();
        let mut values = Vec::new();
        for (c, component) in image.components().iter().enumerate() {
            for block in component.data.chunks_exact(64) {
                for (k, &coeff) in block.iter().enumerate().take(cutoff + 1).skip(1) {
                    values.push(lattice.quantize(c, k, coeff));
                }
            }
        }
        values
    }

    #[test]
    fn test_low_levels_read_stored_values() {
        let image = cover_image(64, 64, 85).requantize(85).unwrap();
        for level in 1..=5 {
            let lattice = lattice(&image, level);
            for (c, component) in image.components().iter().enumerate() {
                for block in component.data.chunks_exact(64) {
                    for (k, &coeff) in block.iter().enumerate().skip(1) {
                        assert_eq!(lattice.quantize(c, k, coeff), coeff);
                    }
                }
            }
            assert_eq!(lattice.snap(&mut image.clone()), 0, "level {level}");
        }
    }

    #[test]
    fn test_snap_keeps_values_and_is_idempotent() {
        let mut image = cover_image(64, 64, 85).requantize(85).unwrap();
        let lattice = lattice(&image, 9);
        let before = values(&image, &lattice);

        assert!(lattice.snap(&mut image) > 0);
        assert_eq!(values(&image, &lattice), before);
        assert_eq!(lattice.snap(&mut image), 0);
    }

    #[test]
    fn test_snapped_values_survive_coarser_tables() {
        let mut image = cover_image(96, 96, 85).requantize(85).unwrap();
        let grid = lattice(&image, 9);
        grid.snap(&mut image);
        let before = values(&image, &grid);

        for quality in [70, 50, 30] {
            let recompressed = image.requantize(quality).unwrap();
            let after = values(&recompressed, &lattice(&recompressed, 9));
            assert_eq!(after, before, "quality {quality}");
        }
    }

    #[test]
    fn test_step_stays_in_band() {
        let image = cover_image(16, 16, 85);
        let lattice = lattice(&image, 7);
        let policy = *lattice.policy();
        let position = CoefficientPosition {
            component: 0,
            block: 0,
            index: 1,
        };

        assert_eq!(lattice.step(&position, 1, false), 2);
        assert_eq!(lattice.step(&position, -1, false), -2);
        let ceiling = policy.ceiling() as i16;
        assert_eq!(lattice.step(&position, ceiling, true), ceiling - 1);
        assert_eq!(lattice.step(&position, 3, true), 4);
        assert_eq!(lattice.step(&position, -3, false), -2);
    }

    #[test]
    fn test_dequantize_clamps_to_baseline() {
        let image = cover_image(16, 16, 100);
        let lattice = lattice(&image, 10);
        assert_eq!(lattice.dequantize(0, 5, i16::MAX / 4), 1023);
        assert_eq!(lattice.dequantize(0, 5, -(i16::MAX / 4)), -1023);
    }
}
