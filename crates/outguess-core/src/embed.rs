//! Embedder - lays a framed payload into the keyed coefficient sequence.
//!
//! Each frame bit is carried by the parity of one lattice magnitude. The
//! carrier bands are snapped onto the resistance grid first, then a
//! mismatching coefficient moves one lattice step, keeping its sign and
//! staying inside the eligible band, so the extractor derives exactly the
//! same sequence from the modified image. Spare coefficients are then used
//! to restore the cover's per-band histograms.

use crate::capacity::total_coefficients;
use crate::correction::{restore_histograms, BandHistograms};
use crate::error::{OutguessError, Result};
use crate::frame::{bits, build_frame, FRAME_OVERHEAD_BITS};
use crate::jpeg::CoefficientImage;
use crate::options::Password;
use crate::permutation::{keyed_rng, Domain};
use crate::selection::select;

/// Receives embedding progress in percent, never decreasing, ending at 100.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(u8);

/// Bit carried by a coefficient value.
#[inline]
pub(crate) fn carried_bit(value: i16) -> bool {
    value.unsigned_abs() & 1 == 1
}

/// What an embedding did to the image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedStats {
    /// Coefficients eligible under the resistance level.
    pub eligible_coefficients: usize,
    /// Coefficients carrying frame bits.
    pub coefficients_used: usize,
    /// All AC coefficients of the image.
    pub total_coefficients: usize,
    /// Carriers whose value had to change.
    pub changed_coefficients: usize,
    /// Coefficients moved onto the resistance grid before embedding.
    pub snapped_coefficients: usize,
    /// Spare coefficients changed by the statistical correction.
    pub corrections: usize,
    /// Histogram distance to the cover right after embedding.
    pub imbalance_before_correction: u64,
    /// Histogram distance to the cover left after correction.
    pub residual_imbalance: u64,
    /// `coefficients_used / eligible_coefficients`.
    pub capacity_utilization: f64,
    pub resistance: u8,
    /// Quality of the tables the payload was embedded under.
    pub quality: u8,
    /// Shannon entropy of the eligible values after embedding, in bits.
    pub coefficient_entropy: f64,
}

/// Embeds payloads for one password and resistance level.
#[derive(Debug, Clone)]
pub struct Embedder {
    password: Password,
    resistance: u8,
}

impl Embedder {
    pub fn new(password: Password, resistance: u8) -> Self {
        Embedder {
            password,
            resistance,
        }
    }

    /// Embed `payload` into `image` in place.
    ///
    /// # Returns
    /// * `Ok(EmbedStats)` on success
    /// * `Err(OutguessError::Capacity)` if the frame does not fit
    /// * `Err(OutguessError::Range)` for an invalid resistance level
    pub fn embed(&self, image: &mut CoefficientImage, payload: &[u8]) -> Result<EmbedStats> {
        self.embed_with_progress(image, payload, &mut |_| {})
    }

    /// [`Embedder::embed`], reporting progress to `progress`.
    pub fn embed_with_progress(
        &self,
        image: &mut CoefficientImage,
        payload: &[u8],
        progress: ProgressCallback<'_>,
    ) -> Result<EmbedStats> {
        let key = self.password.key();
        let frame = build_frame(payload, key)?;
        let frame_bits = frame.len() * 8;

        let selection = select(image, &self.password, self.resistance)?;
        if frame_bits > selection.len() {
            return Err(OutguessError::Capacity {
                required_bits: payload.len() * 8,
                available_bits: selection.len().saturating_sub(FRAME_OVERHEAD_BITS),
            });
        }
        let lattice = selection.lattice();
        progress(10);

        let snapped = lattice.snap(image);
        let cover_histograms = BandHistograms::collect(image, lattice, selection.positions());
        let (carriers, spare) = selection.split_at(frame_bits);

        let mut directions = keyed_rng(key, Domain::Direction);
        let mut changed = 0;
        let mut reported = 10;
        for (done, (position, bit)) in carriers.iter().zip(bits(&frame)).enumerate() {
            let value = lattice.value(image, position);
            if carried_bit(value) != bit {
                let next = lattice.step(position, value, directions.bool());
                lattice.set_value(image, position, next);
                changed += 1;
            }

            let percent = (10 + (done + 1) * 70 / frame_bits) as u8;
            if percent > reported {
                reported = percent;
                progress(percent);
            }
        }
        log::trace!("{changed} of {frame_bits} carriers changed, {snapped} snapped");

        let report = restore_histograms(
            image,
            &cover_histograms,
            selection.positions(),
            spare,
            lattice,
        );
        progress(90);

        let stats = EmbedStats {
            eligible_coefficients: selection.len(),
            coefficients_used: frame_bits,
            total_coefficients: total_coefficients(image),
            changed_coefficients: changed,
            snapped_coefficients: snapped,
            corrections: report.corrections,
            imbalance_before_correction: report.imbalance_before,
            residual_imbalance: report.imbalance_after,
            capacity_utilization: frame_bits as f64 / selection.len() as f64,
            resistance: self.resistance,
            quality: image.estimated_quality(),
            coefficient_entropy: BandHistograms::collect(image, lattice, selection.positions())
                .entropy(),
        };
        progress(100);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;
    use crate::lattice::Lattice;
    use crate::selection::{eligible_positions, CoefficientPosition, ResistancePolicy};
    use crate::test_support::cover_image;

    fn eligible(image: &CoefficientImage, level: u8) -> Vec<CoefficientPosition> {
        let policy = ResistancePolicy::for_level(level).unwrap();
        eligible_positions(image, &Lattice::new(image, policy).unwrap())
    }

    #[test]
    fn test_carried_bit_ignores_sign() {
        assert!(carried_bit(3));
        assert!(carried_bit(-3));
        assert!(!carried_bit(-2));
        assert!(!carried_bit(0));
    }

    #[test]
    fn test_embed_then_extract() {
        let mut image = cover_image(128, 128, 85);
        let embedder = Embedder::new(Password::from("embed"), 5);
        let stats = embedder.embed(&mut image, b"Hello World").unwrap();

        assert_eq!(stats.coefficients_used, (12 + 11) * 8);
        assert!(stats.changed_coefficients <= stats.coefficients_used);
        assert!(stats.capacity_utilization > 0.0 && stats.capacity_utilization <= 1.0);
        assert_eq!(stats.total_coefficients, 16 * 16 * 3 * 63);

        let extracted = Extractor::new(Password::from("embed"), 5)
            .extract(&image)
            .unwrap();
        assert!(extracted.verified);
        assert_eq!(extracted.payload, b"Hello World");
    }

    #[test]
    fn test_embedding_keeps_the_eligible_set() {
        for level in [4, 8] {
            let cover = cover_image(96, 96, 85);
            let mut image = cover.clone();
            Embedder::new(Password::default(), level)
                .embed(&mut image, &[0xA5; 16])
                .unwrap();
            assert_eq!(eligible(&cover, level), eligible(&image, level), "level {level}");
        }
    }

    #[test]
    fn test_high_levels_snap_the_cover() {
        let mut image = cover_image(128, 128, 85);
        let low = Embedder::new(Password::default(), 3)
            .embed(&mut image.clone(), b"grid")
            .unwrap();
        assert_eq!(low.snapped_coefficients, 0);

        let high = Embedder::new(Password::default(), 8)
            .embed(&mut image, b"grid")
            .unwrap();
        assert!(high.snapped_coefficients > 0);
    }

    #[test]
    fn test_progress_is_monotonic_and_complete() {
        let mut image = cover_image(128, 128, 85);
        let mut seen = Vec::new();
        Embedder::new(Password::from("progress"), 5)
            .embed_with_progress(&mut image, &[7; 40], &mut |percent| seen.push(percent))
            .unwrap();

        assert_eq!(seen.first(), Some(&10));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.contains(&80));
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    }

    #[test]
    fn test_failed_embedding_reports_no_progress() {
        let mut image = cover_image(16, 16, 85);
        let mut calls = 0;
        let result = Embedder::new(Password::default(), 5).embed_with_progress(
            &mut image,
            &[0u8; 4096],
            &mut |_| calls += 1,
        );
        assert!(result.is_err());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_embed_rejects_oversized_payload() {
        let mut image = cover_image(16, 16, 85);
        let err = Embedder::new(Password::default(), 5)
            .embed(&mut image, &[0u8; 4096])
            .unwrap_err();
        assert!(matches!(err, OutguessError::Capacity { .. }));
    }

    #[test]
    fn test_correction_reduces_imbalance() {
        let mut image = cover_image(256, 256, 85);
        let stats = Embedder::new(Password::from("stats"), 3)
            .embed(&mut image, &[0x5A; 200])
            .unwrap();
        assert!(stats.residual_imbalance <= stats.imbalance_before_correction);
        assert!(stats.coefficient_entropy > 0.0);
    }
}
