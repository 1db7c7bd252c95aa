//! Capacity estimation.

use std::borrow::Cow;

use crate::error::Result;
use crate::frame::FRAME_OVERHEAD_BITS;
use crate::jpeg::CoefficientImage;
use crate::lattice::Lattice;
use crate::options::check_quality;
use crate::selection::{eligible_count, ResistancePolicy};

/// Carrier statistics of a cover, computed without embedding anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverStats {
    /// Coefficients eligible under the resistance level.
    pub eligible_coefficients: usize,
    /// All AC coefficients of the image.
    pub total_coefficients: usize,
    /// Payload bits that fit, frame header excluded.
    pub capacity_bits: usize,
    pub resistance: u8,
    /// Quality of the tables a payload would be embedded under.
    pub estimated_quality: u8,
}

/// The image payloads are actually embedded into for `quality`.
///
/// Covers estimated finer than `quality` are requantized to the standard
/// tables for it; everything else is used as is.
pub fn prepare_cover(image: &CoefficientImage, quality: u8) -> Result<Cow<'_, CoefficientImage>> {
    check_quality(quality)?;
    let estimated = image.estimated_quality();
    if quality < estimated {
        log::debug!("cover quality ~{estimated} is above target {quality}, requantizing");
        Ok(Cow::Owned(image.requantize(quality)?))
    } else {
        Ok(Cow::Borrowed(image))
    }
}

/// Payload bits that fit at `resistance` once the cover is prepared for
/// `quality`. Zero means nothing can be embedded.
pub fn max_message_bits(image: &CoefficientImage, resistance: u8, quality: u8) -> Result<usize> {
    Ok(cover_stats(image, resistance, quality)?.capacity_bits)
}

/// [`CoverStats`] of `image` once prepared for `quality`.
pub fn cover_stats(image: &CoefficientImage, resistance: u8, quality: u8) -> Result<CoverStats> {
    let policy = ResistancePolicy::for_level(resistance)?;
    let cover = prepare_cover(image, quality)?;
    let eligible = eligible_count(&cover, &Lattice::new(&cover, policy)?);
    Ok(CoverStats {
        eligible_coefficients: eligible,
        total_coefficients: total_coefficients(&cover),
        capacity_bits: eligible.saturating_sub(FRAME_OVERHEAD_BITS),
        resistance,
        estimated_quality: cover.estimated_quality(),
    })
}

/// AC coefficients of every component.
pub(crate) fn total_coefficients(image: &CoefficientImage) -> usize {
    image
        .components()
        .iter()
        .map(|component| component.block_count() * 63)
        .sum()
}
