//! Payload frame: `MAGIC | LENGTH | CRC32 | payload`.
//!
//! LENGTH is the payload size in bits and CRC32 covers the raw payload,
//! both big-endian. The payload itself is whitened with a keyed stream
//! before it is laid into coefficients. Bits go MSB first.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::error::{OutguessError, Result};
use crate::permutation::{keyed_rng, Domain};

pub const MAGIC: [u8; 4] = *b"OGv2";

/// Header size in bytes: magic, length and checksum.
pub const HEADER_BYTES: usize = 12;

/// Bits a frame needs on top of the payload itself.
pub const FRAME_OVERHEAD_BITS: usize = HEADER_BYTES * 8;

/// Extraction refuses frames that claim more than this.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length_bits: u32,
    pub checksum: u32,
}

impl FrameHeader {
    pub fn for_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(OutguessError::Capacity {
                required_bits: payload.len() * 8 + FRAME_OVERHEAD_BITS,
                available_bits: MAX_PAYLOAD_BYTES * 8 + FRAME_OVERHEAD_BITS,
            });
        }
        Ok(Self {
            length_bits: (payload.len() * 8) as u32,
            checksum: crc32fast::hash(payload),
        })
    }

    /// Parse and sanity check a header read back from coefficients.
    pub fn parse(header: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(header);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(OutguessError::verification("frame magic mismatch"));
        }

        let length_bits = reader.read_u32::<BigEndian>()?;
        let checksum = reader.read_u32::<BigEndian>()?;

        if length_bits % 8 != 0 {
            return Err(OutguessError::verification(format!(
                "frame length {length_bits} is not a whole number of bytes"
            )));
        }
        if length_bits as usize / 8 > MAX_PAYLOAD_BYTES {
            return Err(OutguessError::verification(format!(
                "frame length {length_bits} exceeds the sanity limit"
            )));
        }

        Ok(Self {
            length_bits,
            checksum,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u32::<BigEndian>(self.length_bits)?;
        writer.write_u32::<BigEndian>(self.checksum)?;
        Ok(())
    }

    pub fn payload_len(&self) -> usize {
        self.length_bits as usize / 8
    }

    /// Bits the whole frame occupies.
    pub fn frame_bits(&self) -> usize {
        FRAME_OVERHEAD_BITS + self.length_bits as usize
    }
}

/// Serialize the complete frame with the payload whitened for `key`.
pub fn build_frame(payload: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let header = FrameHeader::for_payload(payload)?;
    let mut frame = Vec::with_capacity(HEADER_BYTES + payload.len());
    header.write_to(&mut frame)?;

    let start = frame.len();
    frame.extend_from_slice(payload);
    whiten(&mut frame[start..], key);
    Ok(frame)
}

/// XOR `data` with the keyed whitening stream. Its own inverse.
pub fn whiten(data: &mut [u8], key: &[u8]) {
    let mut rng = keyed_rng(key, Domain::Whitening);
    for byte in data {
        *byte ^= rng.u8(..);
    }
}

/// Bits of `bytes`, most significant first.
pub fn bits(bytes: &[u8]) -> impl Iterator<Item = bool> + '_ {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |shift| (byte >> shift) & 1 == 1))
}

/// Pack MSB-first bits into bytes; a trailing partial byte is zero padded.
pub fn pack_bits<I: IntoIterator<Item = bool>>(bits: I) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut current = 0u8;
    let mut filled = 0;
    for bit in bits {
        current = (current << 1) | bit as u8;
        filled += 1;
        if filled == 8 {
            bytes.push(current);
            current = 0;
            filled = 0;
        }
    }
    if filled > 0 {
        bytes.push(current << (8 - filled));
    }
    bytes
}
