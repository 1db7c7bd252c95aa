//! Byte-level entry points: JPEG in, JPEG or payload out.

use log::Level;

use crate::capacity::{cover_stats, max_message_bits, prepare_cover, CoverStats};
use crate::embed::{EmbedStats, Embedder, ProgressCallback};
use crate::error::{OutguessError, Result};
use crate::extract::Extractor;
use crate::jpeg;
use crate::options::{
    EmbeddingOptions, ExtractionOptions, Password, MAX_RESISTANCE, MIN_RESISTANCE,
};
use crate::resistance::test_resistance;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedMetadata {
    pub original_size: usize,
    pub output_size: usize,
    /// `output_size / original_size`.
    pub compression_ratio: f64,
    /// Quality estimated from the cover's quantization tables.
    pub estimated_quality: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedResult {
    pub output_bytes: Vec<u8>,
    pub message_size_bits: usize,
    pub metadata: EmbedMetadata,
    pub stats: EmbedStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractResult {
    pub message: Vec<u8>,
    pub message_size_bits: usize,
    pub verified: bool,
}

impl ExtractResult {
    /// The message as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.message).ok()
    }
}

fn summary_level(verbose: bool) -> Level {
    if verbose {
        Level::Info
    } else {
        Level::Debug
    }
}

/// Hide `message` in the JPEG `image_bytes`.
///
/// The result is a complete JPEG with the same dimensions and sampling.
/// Covers finer than `options.quality` are requantized before embedding.
pub fn embed(image_bytes: &[u8], message: &[u8], options: &EmbeddingOptions) -> Result<EmbedResult> {
    embed_with_progress(image_bytes, message, options, &mut |_| {})
}

/// [`embed`], reporting progress in percent to `progress`.
///
/// The encoded output is read back before it is returned, and 100 is only
/// reported once it came back intact. A payload that does not is an
/// `Integrity` error.
pub fn embed_with_progress(
    image_bytes: &[u8],
    message: &[u8],
    options: &EmbeddingOptions,
    progress: ProgressCallback<'_>,
) -> Result<EmbedResult> {
    options.validate()?;
    if message.len() > options.max_message_size {
        return Err(OutguessError::Capacity {
            required_bits: message.len() * 8,
            available_bits: options.max_message_size * 8,
        });
    }

    let cover = jpeg::decode(image_bytes)?;
    let estimated_quality = cover.estimated_quality();
    let mut image = prepare_cover(&cover, options.quality)?.into_owned();

    let stats = Embedder::new(options.password.clone(), options.compression_resistance)
        .embed_with_progress(&mut image, message, &mut |percent| {
            if percent < 100 {
                progress(percent);
            }
        })?;
    let output_bytes = jpeg::encode(&image, None)?;
    verify_embedding(&output_bytes, message, options)?;
    progress(100);

    let metadata = EmbedMetadata {
        original_size: image_bytes.len(),
        output_size: output_bytes.len(),
        compression_ratio: output_bytes.len() as f64 / image_bytes.len() as f64,
        estimated_quality,
    };

    log::log!(
        summary_level(options.verbose),
        "embedded {} bytes at resistance {}: {} of {} eligible coefficients used, {} changed, {} corrections, {} -> {} bytes",
        message.len(),
        options.compression_resistance,
        stats.coefficients_used,
        stats.eligible_coefficients,
        stats.changed_coefficients,
        stats.corrections,
        metadata.original_size,
        metadata.output_size
    );

    Ok(EmbedResult {
        output_bytes,
        message_size_bits: message.len() * 8,
        metadata,
        stats,
    })
}

/// Read `output_bytes` back the way `extract` would and compare.
fn verify_embedding(output_bytes: &[u8], message: &[u8], options: &EmbeddingOptions) -> Result<()> {
    let image = jpeg::decode(output_bytes)
        .map_err(|err| OutguessError::integrity(format!("output does not decode: {err}")))?;
    let extracted = Extractor::new(options.password.clone(), options.compression_resistance)
        .extract(&image)
        .map_err(|err| OutguessError::integrity(format!("payload does not read back: {err}")))?;

    if !extracted.verified {
        return Err(OutguessError::integrity("payload checksum does not match"));
    }
    if extracted.payload != message {
        return Err(OutguessError::integrity("payload differs from the message"));
    }
    log::trace!("embedded payload reads back intact");
    Ok(())
}

/// Recover the message hidden in `image_bytes`.
pub fn extract(image_bytes: &[u8], options: &ExtractionOptions) -> Result<ExtractResult> {
    options.validate()?;
    let image = jpeg::decode(image_bytes)?;
    let extracted =
        Extractor::new(options.password.clone(), options.compression_resistance).extract(&image)?;

    log::log!(
        summary_level(options.verbose),
        "extracted {} bytes at resistance {}, verified: {}",
        extracted.payload.len(),
        options.compression_resistance,
        extracted.verified
    );

    Ok(ExtractResult {
        message_size_bits: extracted.payload.len() * 8,
        message: extracted.payload,
        verified: extracted.verified,
    })
}

/// Whether `image_bytes` holds a verified payload embedded without password.
///
/// Password protected payloads are indistinguishable from an untouched
/// image and report `false`.
pub fn has_hidden_data(image_bytes: &[u8]) -> Result<bool> {
    let image = jpeg::decode(image_bytes)?;
    Ok((MIN_RESISTANCE..=MAX_RESISTANCE).any(|resistance| {
        Extractor::new(Password::default(), resistance)
            .extract(&image)
            .map_or(false, |extracted| extracted.verified)
    }))
}

/// Largest message in bytes `embed` accepts for `image_bytes` and `options`.
pub fn max_message_size(image_bytes: &[u8], options: &EmbeddingOptions) -> Result<usize> {
    options.validate()?;
    let image = jpeg::decode(image_bytes)?;
    let capacity = max_message_bits(&image, options.compression_resistance, options.quality)? / 8;

    log::log!(
        summary_level(options.verbose),
        "capacity at resistance {} and quality {}: {} bytes",
        options.compression_resistance,
        options.quality,
        capacity
    );
    Ok(capacity.min(options.max_message_size))
}

/// Carrier statistics of `image_bytes` under `options`, without embedding.
pub fn embedding_stats(image_bytes: &[u8], options: &EmbeddingOptions) -> Result<CoverStats> {
    options.validate()?;
    let image = jpeg::decode(image_bytes)?;
    let stats = cover_stats(&image, options.compression_resistance, options.quality)?;

    log::log!(
        summary_level(options.verbose),
        "{} of {} coefficients eligible at resistance {}",
        stats.eligible_coefficients,
        stats.total_coefficients,
        stats.resistance
    );
    Ok(stats)
}

/// Whether the payload in `image_bytes` survives recompression at
/// `target_quality`.
pub fn test_compression_resistance(
    image_bytes: &[u8],
    target_quality: u8,
    password: &Password,
) -> Result<bool> {
    let image = jpeg::decode(image_bytes)?;
    test_resistance(&image, target_quality, password)
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
