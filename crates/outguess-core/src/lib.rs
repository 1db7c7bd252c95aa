//! Outguess-style steganography for baseline JPEG images.
//!
//! Payload bits are carried by the parity of quantized DCT coefficient
//! magnitudes, read on a resistance grid that recompression down to a
//! known quality cannot move. Which coefficients carry them, and in which order, is
//! derived from a password, and a statistical correction pass restores
//! the cover's coefficient histograms afterwards.
//!
//! # Layer Responsibilities
//!
//! - [`jpeg`] decodes baseline JPEGs to coefficients and encodes them back
//! - [`Lattice`] reads coefficients on the resistance grid
//! - [`select`] derives the keyed coefficient sequence
//! - [`Embedder`] and [`Extractor`] write and read the payload frame
//! - the byte-level functions ([`embed`], [`extract`], ...) tie it together
//!
//! File handling, password prompting and persistence live in `outguess-cli`.
//!
//! # Example
//!
//! ```ignore
//! use outguess_core::{embed, extract, EmbeddingOptions};
//!
//! let cover = std::fs::read("cover.jpg")?;
//! let options = EmbeddingOptions::default().with_password("secret");
//!
//! let result = embed(&cover, b"hello world", &options)?;
//! let hidden = extract(&result.output_bytes, &options)?;
//! assert_eq!(hidden.message, b"hello world");
//! assert!(hidden.verified);
//! ```

mod api;
mod capacity;
mod correction;
mod embed;
mod error;
mod extract;
mod frame;
pub mod jpeg;
mod lattice;
mod options;
mod permutation;
mod resistance;
mod selection;

pub use api::{
    embed, embed_with_progress, embedding_stats, extract, has_hidden_data, max_message_size,
    test_compression_resistance, version, EmbedMetadata, EmbedResult, ExtractResult,
};
pub use capacity::{cover_stats, max_message_bits, prepare_cover, CoverStats};
pub use correction::{restore_histograms, BandHistograms, CorrectionReport};
pub use embed::{EmbedStats, Embedder, ProgressCallback};
pub use error::{OutguessError, Result};
pub use extract::{Extracted, Extractor};
pub use frame::{FRAME_OVERHEAD_BITS, MAGIC, MAX_PAYLOAD_BYTES};
pub use jpeg::CoefficientImage;
pub use lattice::Lattice;
pub use options::{
    EmbeddingOptions, ExtractionOptions, Password, DEFAULT_KEY, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_QUALITY, DEFAULT_RESISTANCE, MAX_RESISTANCE, MIN_RESISTANCE,
};
pub use resistance::test_resistance;
pub use selection::{
    eligible_count, eligible_positions, select, CoefficientPosition, ResistancePolicy,
    SelectionSequence,
};

#[cfg(test)]
pub(crate) mod test_support {
    use image::codecs::jpeg::JpegEncoder;
    use image::ColorType;

    use crate::jpeg::{decode, CoefficientImage};

    /// Baseline RGB JPEG with textured, deterministic content.
    pub fn cover_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
        let mut rng = fastrand::Rng::with_seed(0x5eed ^ (width as u64) << 16 ^ height as u64);
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let base = ((x * 255) / width.max(1)) as i32;
                let wave = (((x as f32 / 5.0).sin() + (y as f32 / 7.0).cos()) * 40.0) as i32;
                for channel in 0..3i32 {
                    let noise = rng.i32(-24..=24);
                    let value = base / (channel + 1) + wave + noise + 64 + channel * 20;
                    pixels.push(value.clamp(0, 255) as u8);
                }
            }
        }

        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode(&pixels, width, height, ColorType::Rgb8)
            .unwrap();
        bytes
    }

    pub fn cover_image(width: u32, height: u32, quality: u8) -> CoefficientImage {
        decode(&cover_bytes(width, height, quality)).unwrap()
    }
}
