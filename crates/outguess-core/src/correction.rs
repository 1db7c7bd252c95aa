//! Statistical correction.
//!
//! Embedding shifts lattice magnitudes by one, which evens out the counts
//! of neighbouring values and is exactly what a chi-square test looks for.
//! After the payload is in place, spare eligible coefficients are moved
//! back toward the per-band histograms of the cover.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::jpeg::CoefficientImage;
use crate::lattice::Lattice;
use crate::selection::CoefficientPosition;

/// Signed value counts for each of the 64 zigzag bands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandHistograms {
    bands: Vec<HashMap<i16, i64>>,
}

impl BandHistograms {
    /// Histograms of the lattice values at `positions`.
    pub fn collect(
        image: &CoefficientImage,
        lattice: &Lattice,
        positions: &[CoefficientPosition],
    ) -> Self {
        let mut bands = vec![HashMap::new(); 64];
        for position in positions {
            *bands[position.index as usize]
                .entry(lattice.value(image, position))
                .or_insert(0) += 1;
        }
        Self { bands }
    }

    pub fn count(&self, index: u8, value: i16) -> i64 {
        self.bands[index as usize].get(&value).copied().unwrap_or(0)
    }

    /// Sum of absolute count differences over every band and value.
    pub fn distance(&self, other: &Self) -> u64 {
        self.bands
            .iter()
            .zip(&other.bands)
            .map(|(a, b)| band_distance(a, b))
            .sum()
    }

    /// Shannon entropy in bits of the values, all bands pooled.
    pub fn entropy(&self) -> f64 {
        let mut pooled: BTreeMap<i16, i64> = BTreeMap::new();
        for band in &self.bands {
            for (&value, &count) in band {
                *pooled.entry(value).or_insert(0) += count;
            }
        }
        let total: i64 = pooled.values().sum();
        if total == 0 {
            return 0.0;
        }
        pooled
            .values()
            .filter(|&&count| count > 0)
            .map(|&count| {
                let p = count as f64 / total as f64;
                -p * p.log2()
            })
            .sum()
    }
}

fn band_distance(a: &HashMap<i16, i64>, b: &HashMap<i16, i64>) -> u64 {
    let only_in_b: u64 = b
        .iter()
        .filter(|(value, _)| !a.contains_key(value))
        .map(|(_, &count)| count.unsigned_abs())
        .sum();
    a.iter()
        .map(|(value, &count)| (count - b.get(value).copied().unwrap_or(0)).unsigned_abs())
        .sum::<u64>()
        + only_in_b
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    /// Spare coefficients changed.
    pub corrections: usize,
    /// Histogram distance right after embedding.
    pub imbalance_before: u64,
    /// Histogram distance left after correction.
    pub imbalance_after: u64,
}

/// Move spare coefficients until `positions` histograms match `target` as
/// closely as the spares allow.
///
/// Within a band and sign, embedding only moves counts between adjacent
/// magnitudes and keeps their total. The net flow over the edge between
/// magnitudes `m` and `m + 1` is then the running sum of the excess up to
/// `m`, and each unit of it is one spare stepping across that edge, so
/// excess reaches a distant deficit through chained steps. Spares are
/// taken in the given order, take part in one sweep only, and never move
/// to a value that would grow the imbalance. Sign and eligibility are
/// preserved, so the keyed selection of the image does not change. Sweeps
/// repeat until one makes no move.
pub fn restore_histograms(
    image: &mut CoefficientImage,
    target: &BandHistograms,
    positions: &[CoefficientPosition],
    spare: &[CoefficientPosition],
    lattice: &Lattice,
) -> CorrectionReport {
    let current = BandHistograms::collect(image, lattice, positions);
    let imbalance_before = current.distance(target);

    // excess per band and value: positive means too many, negative too few
    let mut excess: Vec<HashMap<i16, i64>> = current.bands;
    for (band, wanted) in excess.iter_mut().zip(&target.bands) {
        for (&value, &count) in wanted {
            *band.entry(value).or_insert(0) -= count;
        }
        band.retain(|_, delta| *delta != 0);
    }

    let mut pending = spare.to_vec();
    let mut corrections = 0;
    let mut sweeps = 0;
    loop {
        let moved = sweep(image, lattice, &mut excess, &mut pending);
        sweeps += 1;
        corrections += moved;
        if moved == 0 {
            break;
        }
    }

    let imbalance_after = excess
        .iter()
        .flat_map(|band| band.values())
        .map(|delta| delta.unsigned_abs())
        .sum();

    log::debug!(
        "statistical correction: {corrections} changes in {sweeps} sweeps, imbalance {imbalance_before} -> {imbalance_after}"
    );

    CorrectionReport {
        corrections,
        imbalance_before,
        imbalance_after,
    }
}

/// One pass of flow moves over every band. Moved spares leave `pending`.
fn sweep(
    image: &mut CoefficientImage,
    lattice: &Lattice,
    excess: &mut [HashMap<i16, i64>],
    pending: &mut Vec<CoefficientPosition>,
) -> usize {
    // unmoved spares per band and value, next in keyed order at the back
    let mut pools: HashMap<(u8, i16), VecDeque<usize>> = HashMap::new();
    for (slot, position) in pending.iter().enumerate().rev() {
        pools
            .entry((position.index, lattice.value(image, position)))
            .or_default()
            .push_back(slot);
    }

    let policy = *lattice.policy();
    let mut moved = vec![false; pending.len()];
    let mut moves = 0;
    for band in 1..=policy.cutoff() {
        let band_excess = &mut excess[band];
        if band_excess.is_empty() {
            continue;
        }
        for sign in [1i16, -1] {
            let flows: Vec<(i16, i64)> = (policy.floor()..policy.ceiling())
                .scan(0i64, |flow, magnitude| {
                    let value = sign * magnitude as i16;
                    *flow += band_excess.get(&value).copied().unwrap_or(0);
                    Some((value, *flow))
                })
                .filter(|&(_, flow)| flow != 0)
                .collect();

            // outward flows run from the small magnitudes and inward flows
            // from the large ones, so a spare that just arrived can go on
            let outward = flows.iter().filter(|(_, flow)| *flow > 0);
            let inward = flows.iter().rev().filter(|(_, flow)| *flow < 0);
            for &(value, flow) in outward.chain(inward) {
                let (from, to) = if flow > 0 {
                    (value, value + sign)
                } else {
                    (value + sign, value)
                };

                let mut remaining = flow.unsigned_abs();
                while remaining > 0 {
                    let from_excess = band_excess.get(&from).copied().unwrap_or(0);
                    let to_excess = band_excess.get(&to).copied().unwrap_or(0);
                    if from_excess <= 0 && to_excess >= 0 {
                        break;
                    }
                    let Some(slot) = pools
                        .get_mut(&(band as u8, from))
                        .and_then(|pool| pool.pop_back())
                    else {
                        break;
                    };
                    let position = pending[slot];
                    if !lattice.fits(&position, to) {
                        continue;
                    }

                    lattice.set_value(image, &position, to);
                    *band_excess.entry(from).or_insert(0) -= 1;
                    *band_excess.entry(to).or_insert(0) += 1;
                    // relayed spares are the last resort of the next edge
                    pools.entry((band as u8, to)).or_default().push_front(slot);
                    if !moved[slot] {
                        moved[slot] = true;
                        moves += 1;
                    }
                    remaining -= 1;
                }
            }
        }
        band_excess.retain(|_, delta| *delta != 0);
    }

    let mut slot = 0;
    pending.retain(|_| {
        let keep = !moved[slot];
        slot += 1;
        keep
    });
    moves
}
