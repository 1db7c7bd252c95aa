//! Extractor - reads a framed payload back out of the keyed sequence.

use crate::embed::carried_bit;
use crate::error::{OutguessError, Result};
use crate::frame::{pack_bits, whiten, FrameHeader, FRAME_OVERHEAD_BITS};
use crate::jpeg::CoefficientImage;
use crate::lattice::Lattice;
use crate::options::Password;
use crate::selection::{select, CoefficientPosition};

/// Payload read from an image.
///
/// `verified` is false when the frame parsed but its checksum did not match;
/// the bytes are returned anyway and the caller decides what to trust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub payload: Vec<u8>,
    pub verified: bool,
}

#[derive(Debug, Clone)]
pub struct Extractor {
    password: Password,
    resistance: u8,
}

impl Extractor {
    pub fn new(password: Password, resistance: u8) -> Self {
        Extractor {
            password,
            resistance,
        }
    }

    /// Extract the payload from `image`.
    ///
    /// Fails with `Verification` when no frame header is found: wrong
    /// password, wrong resistance, no payload and corruption look the same.
    pub fn extract(&self, image: &CoefficientImage) -> Result<Extracted> {
        let mut selection = select(image, &self.password, self.resistance)?;
        if selection.len() < FRAME_OVERHEAD_BITS {
            return Err(OutguessError::verification(
                "image has too few eligible coefficients for a frame",
            ));
        }

        let (header_positions, _) = selection.split_at(FRAME_OVERHEAD_BITS);
        let header = FrameHeader::parse(&read_bytes(image, selection.lattice(), header_positions))?;
        if header.frame_bits() > selection.len() {
            return Err(OutguessError::verification(format!(
                "frame claims {} bits but only {} coefficients are eligible",
                header.frame_bits(),
                selection.len()
            )));
        }
        log::debug!("frame header announces {} payload bytes", header.payload_len());

        selection.truncate(header.frame_bits());
        let (_, payload_positions) = selection.split_at(FRAME_OVERHEAD_BITS);
        let mut payload = read_bytes(image, selection.lattice(), payload_positions);
        whiten(&mut payload, self.password.key());
        let verified = crc32fast::hash(&payload) == header.checksum;
        if !verified {
            log::debug!("frame found but checksum does not match");
        }

        Ok(Extracted { payload, verified })
    }
}

fn read_bytes(
    image: &CoefficientImage,
    lattice: &Lattice,
    positions: &[CoefficientPosition],
) -> Vec<u8> {
    pack_bits(
        positions
            .iter()
            .map(|position| carried_bit(lattice.value(image, position))),
    )
}
