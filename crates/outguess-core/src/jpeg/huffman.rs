//! Huffman entropy coding for baseline scan data.
//!
//! The reader works on a single restart interval at a time; the scan codec
//! splits the entropy-coded segment at RSTn markers before decoding.

use super::parser::HuffmanTable;
use crate::error::{OutguessError, Result};

const LUT_BITS: u8 = 8;
const LUT_SIZE: usize = 1 << LUT_BITS;

/// Decoding form of a Huffman table.
///
/// Codes up to 8 bits resolve through a lookup table, longer codes through
/// the per-length `maxcode`/`valptr` procedure of T.81 Figure F.16.
#[derive(Debug, Clone)]
pub struct HuffmanLookup {
    /// (symbol, code length); length 0 marks a longer code.
    lut: [(u8, u8); LUT_SIZE],
    maxcode: [i32; 17],
    mincode: [i32; 17],
    valptr: [usize; 17],
    values: Vec<u8>,
}

impl HuffmanLookup {
    pub fn from_table(table: &HuffmanTable) -> Result<Self> {
        let (code_sizes, codes) = derive_huffman_codes(&table.code_lengths)?;
        if code_sizes.len() > table.values.len() {
            return Err(OutguessError::format("Huffman table has fewer symbols than codes"));
        }

        let mut lookup = HuffmanLookup {
            lut: [(0, 0); LUT_SIZE],
            maxcode: [-1; 17],
            mincode: [0; 17],
            valptr: [0; 17],
            values: table.values.clone(),
        };

        for (idx, (&code, &len)) in codes.iter().zip(code_sizes.iter()).enumerate() {
            let symbol = table.values[idx];
            if len <= LUT_BITS {
                let shift = LUT_BITS - len;
                let base = (code as usize) << shift;
                for entry in &mut lookup.lut[base..base + (1 << shift)] {
                    *entry = (symbol, len);
                }
            }

            let l = len as usize;
            if lookup.maxcode[l] < 0 {
                lookup.mincode[l] = code as i32;
                lookup.valptr[l] = idx;
            }
            lookup.maxcode[l] = code as i32;
        }

        Ok(lookup)
    }
}

/// Encoding form of a Huffman table: symbol to (code, length).
#[derive(Debug, Clone)]
pub struct HuffmanEncoder {
    encode_map: [Option<(u16, u8)>; 256],
}

impl HuffmanEncoder {
    pub fn from_table(table: &HuffmanTable) -> Result<Self> {
        let (code_sizes, codes) = derive_huffman_codes(&table.code_lengths)?;

        let mut encode_map = [None; 256];
        for ((&code, &len), &symbol) in codes.iter().zip(code_sizes.iter()).zip(&table.values) {
            encode_map[symbol as usize] = Some((code, len));
        }

        Ok(HuffmanEncoder { encode_map })
    }

    #[inline]
    pub fn encode(&self, symbol: u8) -> Option<(u16, u8)> {
        self.encode_map[symbol as usize]
    }
}

/// Derive code sizes and codes from the per-length counts (T.81 Figures C.1, C.2).
fn derive_huffman_codes(code_lengths: &[u8; 16]) -> Result<(Vec<u8>, Vec<u16>)> {
    let total: usize = code_lengths.iter().map(|&n| n as usize).sum();
    if total > 256 {
        return Err(OutguessError::format("Huffman table has more than 256 symbols"));
    }

    let mut huffsize = Vec::with_capacity(total);
    for (len, &count) in code_lengths.iter().enumerate() {
        huffsize.extend(std::iter::repeat((len + 1) as u8).take(count as usize));
    }

    let mut huffcode = Vec::with_capacity(total);
    let mut code: u32 = 0;
    let mut si = huffsize.first().copied().unwrap_or(0);

    for &size in &huffsize {
        while si < size {
            code <<= 1;
            si += 1;
        }
        if code >= (1u32 << size) {
            return Err(OutguessError::format("invalid Huffman table (code overflow)"));
        }
        huffcode.push(code as u16);
        code += 1;
    }

    Ok((huffsize, huffcode))
}

/// Bit reader over one restart interval of entropy-coded data.
///
/// Removes byte stuffing (0xFF00 -> 0xFF). Past the end of the data it feeds
/// 1-bits, mirroring the encoder's padding, and remembers how many it fed so
/// truncation can be reported.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Left-aligned bit buffer.
    bits: u64,
    num_bits: u8,
    padded_bytes: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            pos: 0,
            bits: 0,
            num_bits: 0,
            padded_bytes: 0,
        }
    }

    fn fill_bits(&mut self) {
        while self.num_bits <= 56 {
            let byte = match self.data.get(self.pos) {
                Some(&byte) => {
                    self.pos += 1;
                    if byte == 0xFF && self.data.get(self.pos) == Some(&0x00) {
                        self.pos += 1;
                    }
                    byte
                }
                None => {
                    self.padded_bytes += 1;
                    0xFF
                }
            };
            self.bits |= (byte as u64) << (56 - self.num_bits);
            self.num_bits += 8;
        }
    }

    #[inline]
    fn peek_bits(&mut self, count: u8) -> u16 {
        if self.num_bits < count {
            self.fill_bits();
        }
        (self.bits >> (64 - count as u32)) as u16
    }

    #[inline]
    fn consume_bits(&mut self, count: u8) {
        self.bits <<= count;
        self.num_bits -= count;
    }

    pub fn read_bits(&mut self, count: u8) -> Result<u16> {
        if count == 0 {
            return Ok(0);
        }
        let value = self.peek_bits(count);
        self.consume_bits(count);
        self.check_overrun()?;
        Ok(value)
    }

    /// Fails once bits beyond the end of the data have been consumed.
    fn check_overrun(&self) -> Result<()> {
        if self.padded_bytes * 8 > self.num_bits as usize {
            return Err(OutguessError::format("scan data truncated"));
        }
        Ok(())
    }

    pub fn decode_huffman(&mut self, table: &HuffmanLookup) -> Result<u8> {
        let peek = self.peek_bits(16);

        let (symbol, len) = table.lut[(peek >> (16 - LUT_BITS)) as usize];
        if len > 0 {
            self.consume_bits(len);
            self.check_overrun()?;
            return Ok(symbol);
        }

        for len in (LUT_BITS + 1)..=16 {
            let code = (peek >> (16 - len)) as i32;
            let l = len as usize;
            if table.maxcode[l] >= 0 && code <= table.maxcode[l] && code >= table.mincode[l] {
                let index = table.valptr[l] + (code - table.mincode[l]) as usize;
                self.consume_bits(len);
                self.check_overrun()?;
                return table
                    .values
                    .get(index)
                    .copied()
                    .ok_or_else(|| OutguessError::format("Huffman symbol index out of range"));
            }
        }

        Err(OutguessError::format("invalid Huffman code in scan data"))
    }

    /// Read `size` bits and sign-extend them (T.81 Figure F.12).
    pub fn receive_extend(&mut self, size: u8) -> Result<i16> {
        if size == 0 {
            return Ok(0);
        }
        if size > 15 {
            return Err(OutguessError::format(format!("invalid coefficient size {size}")));
        }

        let value = self.read_bits(size)? as i32;
        let vt = 1 << (size - 1);
        let extended = if value < vt {
            value - (1 << size) + 1
        } else {
            value
        };
        Ok(extended as i16)
    }
}

/// Bit writer for entropy-coded data with byte stuffing and 1-bit padding.
pub struct BitWriter {
    data: Vec<u8>,
    bits: u32,
    num_bits: u8,
}

impl BitWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        BitWriter {
            data: Vec::with_capacity(capacity),
            bits: 0,
            num_bits: 0,
        }
    }

    /// Write the low `count` bits of `value`, MSB first.
    #[inline]
    pub fn write_bits(&mut self, value: u16, count: u8) {
        debug_assert!(count <= 16);
        if count == 0 {
            return;
        }

        let mask = if count == 16 { 0xFFFF } else { (1u32 << count) - 1 };
        self.bits = (self.bits << count) | (value as u32 & mask);
        self.num_bits += count;

        while self.num_bits >= 8 {
            self.num_bits -= 8;
            let byte = (self.bits >> self.num_bits) as u8;
            self.write_byte(byte);
        }

        self.bits &= (1u32 << self.num_bits) - 1;
    }

    /// Write a Huffman-coded symbol; `None` if the table has no code for it.
    #[inline]
    pub fn write_huffman(&mut self, symbol: u8, table: &HuffmanEncoder) -> Option<()> {
        let (code, len) = table.encode(symbol)?;
        self.write_bits(code, len);
        Some(())
    }

    fn write_byte(&mut self, byte: u8) {
        self.data.push(byte);
        if byte == 0xFF {
            self.data.push(0x00);
        }
    }

    /// Pad to a byte boundary with 1-bits.
    pub fn flush(&mut self) {
        if self.num_bits > 0 {
            let padding = 8 - self.num_bits;
            let value = (self.bits << padding) | ((1u32 << padding) - 1);
            self.write_byte(value as u8);
            self.num_bits = 0;
            self.bits = 0;
        }
    }

    /// Flush and emit restart marker RSTn (n taken modulo 8).
    pub fn write_restart(&mut self, n: u8) {
        self.flush();
        self.data.push(0xFF);
        self.data.push(0xD0 + (n & 0x07));
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.flush();
        self.data
    }
}

/// Size category and appended bits for a coefficient value; the inverse of
/// [`BitReader::receive_extend`].
#[inline]
pub fn encode_value(value: i16) -> (u8, u16) {
    if value == 0 {
        return (0, 0);
    }

    let magnitude = value.unsigned_abs();
    let size = 16 - magnitude.leading_zeros() as u8;
    let bits = if value < 0 {
        ((1u32 << size) - 1 - magnitude as u32) as u16
    } else {
        magnitude
    };

    (size, bits)
}
