//! Compression-resistance tester.
//!
//! Simulates a third party recompressing the image: requantize to the
//! target quality, write and decode the JPEG again, then check that the
//! payload still extracts verified and unchanged.

use crate::error::Result;
use crate::extract::Extractor;
use crate::jpeg::{self, CoefficientImage};
use crate::options::{check_quality, Password, MAX_RESISTANCE, MIN_RESISTANCE};

/// Resistance level and payload of the first verified frame for `password`.
///
/// The level a payload was embedded with is not stored in the image, so
/// every level is tried from the lowest.
pub(crate) fn locate_payload(image: &CoefficientImage, password: &Password) -> Option<(u8, Vec<u8>)> {
    (MIN_RESISTANCE..=MAX_RESISTANCE).find_map(|resistance| {
        match Extractor::new(password.clone(), resistance).extract(image) {
            Ok(extracted) if extracted.verified => Some((resistance, extracted.payload)),
            _ => None,
        }
    })
}

/// Whether the payload in `image` survives recompression at `target_quality`.
///
/// Returns `Ok(false)` when `image` holds no verified payload for `password`
/// to begin with.
pub fn test_resistance(
    image: &CoefficientImage,
    target_quality: u8,
    password: &Password,
) -> Result<bool> {
    check_quality(target_quality)?;

    let Some((resistance, original)) = locate_payload(image, password) else {
        log::debug!("no verified payload to test");
        return Ok(false);
    };

    let recompressed = jpeg::decode(&jpeg::encode(image, Some(target_quality))?)?;
    let survived = match Extractor::new(password.clone(), resistance).extract(&recompressed) {
        Ok(extracted) => extracted.verified && extracted.payload == original,
        Err(err) if err.is_recoverable() => false,
        Err(err) => return Err(err),
    };

    log::debug!(
        "payload at resistance {resistance} {} recompression to quality {target_quality}",
        if survived { "survives" } else { "does not survive" }
    );
    Ok(survived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::Embedder;
    use crate::test_support::cover_image;

    fn stego(resistance: u8, password: &str) -> CoefficientImage {
        let mut image = cover_image(128, 128, 85).requantize(85).unwrap();
        Embedder::new(Password::from(password), resistance)
            .embed(&mut image, b"resist")
            .unwrap();
        image
    }

    #[test]
    fn test_locate_payload_finds_the_level() {
        let image = stego(7, "locate");
        let (resistance, payload) = locate_payload(&image, &Password::from("locate")).unwrap();
        assert_eq!(resistance, 7);
        assert_eq!(payload, b"resist");
    }

    #[test]
    fn test_same_quality_survives() {
        let image = stego(5, "same");
        assert!(test_resistance(&image, 85, &Password::from("same")).unwrap());
    }

    #[test]
    fn test_without_payload_is_false() {
        let image = cover_image(64, 64, 85);
        assert!(!test_resistance(&image, 50, &Password::default()).unwrap());
    }

    #[test]
    fn test_rejects_invalid_quality() {
        let image = cover_image(16, 16, 85);
        assert!(test_resistance(&image, 0, &Password::default()).is_err());
    }
}
