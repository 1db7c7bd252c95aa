//! JPEG segment parsing.
//!
//! Splits a JPEG stream into the pieces the coefficient codec needs:
//! quantization tables (DQT), Huffman tables (DHT), frame info (SOF),
//! restart interval (DRI), the scan header (SOS) and the entropy-coded data.
//! Every other segment (APPn, COM) is kept verbatim so it can be written back.

use super::marker::Marker;
use crate::error::{OutguessError, Result};

/// Zigzag order to natural (row-major) order mapping.
pub const ZIGZAG_TO_NATURAL: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// A quantization table, values stored in zigzag order as in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationTable {
    pub id: u8,
    pub values: [u16; 64],
}

impl QuantizationTable {
    /// The table rearranged into natural (row-major) order.
    pub fn to_natural(&self) -> [u16; 64] {
        let mut natural = [0u16; 64];
        for (zigzag, &value) in self.values.iter().enumerate() {
            natural[ZIGZAG_TO_NATURAL[zigzag]] = value;
        }
        natural
    }
}

/// Huffman table as defined by a DHT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// 0 = DC, 1 = AC.
    pub class: u8,
    pub id: u8,
    /// Number of codes of each length 1..=16.
    pub code_lengths: [u8; 16],
    pub values: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: u8,
    pub h_sampling: u8,
    pub v_sampling: u8,
    pub quant_table_id: u8,
    /// Assigned by the SOS header.
    pub dc_table_id: u8,
    pub ac_table_id: u8,
}

#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub marker: Marker,
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: Vec<Component>,
}

/// A segment kept verbatim (without marker and length bytes).
#[derive(Debug, Clone)]
pub struct Segment {
    pub marker: Marker,
    pub data: Vec<u8>,
}

/// Scan header fields beyond the table assignments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanHeader {
    pub component_count: usize,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub approximation: u8,
}

/// Parsed JPEG structure.
#[derive(Debug, Clone, Default)]
pub struct JpegSegments {
    /// Segments with no codec meaning (APPn, COM, ...) in stream order.
    pub passthrough: Vec<Segment>,
    pub quant_tables: [Option<QuantizationTable>; 4],
    pub dc_huff_tables: [Option<HuffmanTable>; 4],
    pub ac_huff_tables: [Option<HuffmanTable>; 4],
    pub frame: Option<FrameInfo>,
    pub restart_interval: u16,
    pub scan: Option<ScanHeader>,
    /// Entropy-coded data with stuffing and RST markers still in place.
    pub scan_data: Vec<u8>,
}

/// Minimal big-endian cursor over the input bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u8(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| OutguessError::format("unexpected end of stream"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(OutguessError::format("segment runs past end of stream"));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Parse a JPEG stream into its segments.
pub fn parse_jpeg(data: &[u8]) -> Result<JpegSegments> {
    let mut cursor = Cursor { data, pos: 0 };
    let mut segments = JpegSegments::default();

    if cursor.take(2).ok() != Some(&[0xFF, 0xD8][..]) {
        return Err(OutguessError::format("not a JPEG file (missing SOI marker)"));
    }

    loop {
        let marker = read_marker(&mut cursor)?;
        match marker {
            Marker::EOI => break,
            Marker::SOS => {
                let header = read_segment(&mut cursor)?;
                parse_sos_header(header, &mut segments)?;
                let (scan_data, next) = read_scan_data(&mut cursor)?;
                segments.scan_data = scan_data;
                match next {
                    None | Some(Marker::EOI) => break,
                    Some(Marker::SOS) => {
                        return Err(OutguessError::format(
                            "multi-scan JPEGs are not supported",
                        ))
                    }
                    Some(Marker::DNL) => {
                        return Err(OutguessError::format("DNL markers are not supported"))
                    }
                    Some(other) => {
                        log::debug!("ignoring trailing marker {:?} after scan", other);
                        break;
                    }
                }
            }
            Marker::DQT => parse_dqt(read_segment(&mut cursor)?, &mut segments)?,
            Marker::DHT => parse_dht(read_segment(&mut cursor)?, &mut segments)?,
            Marker::SOF(_) => {
                if segments.frame.is_some() {
                    return Err(OutguessError::format("more than one SOF segment"));
                }
                segments.frame = Some(parse_sof(marker, read_segment(&mut cursor)?)?);
            }
            Marker::DRI => {
                let data = read_segment(&mut cursor)?;
                if data.len() < 2 {
                    return Err(OutguessError::format("DRI segment too short"));
                }
                segments.restart_interval = u16::from_be_bytes([data[0], data[1]]);
            }
            _ if marker.has_length() => {
                let data = read_segment(&mut cursor)?.to_vec();
                segments.passthrough.push(Segment { marker, data });
            }
            _ => {
                log::trace!("skipping stray marker {:?} before scan", marker);
            }
        }
    }

    Ok(segments)
}

/// Read the next marker, skipping fill bytes.
fn read_marker(cursor: &mut Cursor) -> Result<Marker> {
    if cursor.u8()? != 0xFF {
        return Err(OutguessError::format("expected a marker"));
    }
    let mut byte = cursor.u8()?;
    while byte == 0xFF {
        byte = cursor.u8()?;
    }
    Marker::from_u8(byte)
        .ok_or_else(|| OutguessError::format(format!("invalid marker byte: 0x{byte:02X}")))
}

/// Read a length-prefixed segment body.
fn read_segment<'a>(cursor: &mut Cursor<'a>) -> Result<&'a [u8]> {
    let length = cursor.u16()? as usize;
    if length < 2 {
        return Err(OutguessError::format("segment length too small"));
    }
    cursor.take(length - 2)
}

/// Read entropy-coded data up to the first marker that is not RSTn.
///
/// Stuffed bytes and restart markers stay in the returned data. The
/// terminating marker, if any, is returned alongside.
fn read_scan_data(cursor: &mut Cursor) -> Result<(Vec<u8>, Option<Marker>)> {
    let mut data = Vec::with_capacity(cursor.data.len().saturating_sub(cursor.pos));

    while !cursor.is_empty() {
        let byte = cursor.u8()?;
        if byte != 0xFF {
            data.push(byte);
            continue;
        }

        let mut next = match cursor.u8() {
            Ok(next) => next,
            Err(_) => break,
        };
        while next == 0xFF {
            next = match cursor.u8() {
                Ok(next) => next,
                Err(_) => return Ok((data, None)),
            };
        }

        match next {
            0x00 | 0xD0..=0xD7 => data.extend_from_slice(&[0xFF, next]),
            _ => return Ok((data, Marker::from_u8(next))),
        }
    }

    Ok((data, None))
}

/// Parse DQT (Define Quantization Table) segment.
fn parse_dqt(data: &[u8], segments: &mut JpegSegments) -> Result<()> {
    let mut cursor = Cursor { data, pos: 0 };

    while !cursor.is_empty() {
        let pq_tq = cursor.u8()?;
        let precision = pq_tq >> 4;
        let id = pq_tq & 0x0F;

        if id > 3 || precision > 1 {
            return Err(OutguessError::format(format!(
                "invalid quantization table: precision={precision}, id={id}"
            )));
        }

        let mut values = [0u16; 64];
        for value in values.iter_mut() {
            *value = if precision == 0 {
                cursor.u8()? as u16
            } else {
                cursor.u16()?
            };
        }

        if values.contains(&0) {
            return Err(OutguessError::format("quantization table contains zero"));
        }

        segments.quant_tables[id as usize] = Some(QuantizationTable { id, values });
    }

    Ok(())
}

/// Parse DHT (Define Huffman Table) segment.
fn parse_dht(data: &[u8], segments: &mut JpegSegments) -> Result<()> {
    let mut cursor = Cursor { data, pos: 0 };

    while !cursor.is_empty() {
        let tc_th = cursor.u8()?;
        let class = tc_th >> 4;
        let id = tc_th & 0x0F;

        if class > 1 || id > 3 {
            return Err(OutguessError::format(format!(
                "invalid Huffman table: class={class}, id={id}"
            )));
        }

        let mut code_lengths = [0u8; 16];
        code_lengths.copy_from_slice(cursor.take(16)?);
        let total_codes: usize = code_lengths.iter().map(|&n| n as usize).sum();
        let values = cursor.take(total_codes)?.to_vec();

        let table = HuffmanTable {
            class,
            id,
            code_lengths,
            values,
        };

        if class == 0 {
            segments.dc_huff_tables[id as usize] = Some(table);
        } else {
            segments.ac_huff_tables[id as usize] = Some(table);
        }
    }

    Ok(())
}

/// Parse SOF (Start of Frame) segment.
fn parse_sof(marker: Marker, data: &[u8]) -> Result<FrameInfo> {
    let mut cursor = Cursor { data, pos: 0 };

    let precision = cursor.u8()?;
    let height = cursor.u16()?;
    let width = cursor.u16()?;
    let num_components = cursor.u8()? as usize;

    let mut components = Vec::with_capacity(num_components);
    for _ in 0..num_components {
        let id = cursor.u8()?;
        let sampling = cursor.u8()?;
        let quant_table_id = cursor.u8()?;

        components.push(Component {
            id,
            h_sampling: sampling >> 4,
            v_sampling: sampling & 0x0F,
            quant_table_id,
            dc_table_id: 0,
            ac_table_id: 0,
        });
    }

    Ok(FrameInfo {
        marker,
        precision,
        height,
        width,
        components,
    })
}

/// Parse SOS (Start of Scan) header and assign entropy tables to components.
fn parse_sos_header(data: &[u8], segments: &mut JpegSegments) -> Result<()> {
    let mut cursor = Cursor { data, pos: 0 };
    let frame = segments
        .frame
        .as_mut()
        .ok_or_else(|| OutguessError::format("SOS before SOF"))?;

    let component_count = cursor.u8()? as usize;
    for _ in 0..component_count {
        let component_id = cursor.u8()?;
        let table_ids = cursor.u8()?;

        let component = frame
            .components
            .iter_mut()
            .find(|c| c.id == component_id)
            .ok_or_else(|| {
                OutguessError::format(format!("scan references unknown component {component_id}"))
            })?;
        component.dc_table_id = table_ids >> 4;
        component.ac_table_id = table_ids & 0x0F;
    }

    segments.scan = Some(ScanHeader {
        component_count,
        spectral_start: cursor.u8()?,
        spectral_end: cursor.u8()?,
        approximation: cursor.u8()?,
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag_mapping_is_permutation() {
        assert_eq!(ZIGZAG_TO_NATURAL[0], 0);
        let mut seen = [false; 64];
        for &natural in ZIGZAG_TO_NATURAL.iter() {
            assert!(!seen[natural]);
            seen[natural] = true;
        }
    }

    #[test]
    fn test_parse_minimal_jpeg() {
        let data = [0xFF, 0xD8, 0xFF, 0xD9];
        let segments = parse_jpeg(&data).unwrap();
        assert!(segments.frame.is_none());
        assert!(segments.scan_data.is_empty());
    }

    #[test]
    fn test_parse_invalid_not_jpeg() {
        let data = [0x89, 0x50, 0x4E, 0x47];
        assert!(matches!(
            parse_jpeg(&data),
            Err(OutguessError::Format { .. })
        ));
    }

    #[test]
    fn test_parse_truncated_segment() {
        // SOI, APP0 claiming 16 bytes but only 2 present
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert!(parse_jpeg(&data).is_err());
    }

    #[test]
    fn test_parse_tables_and_restart_interval() {
        let mut data = vec![0xFF, 0xD8];
        // DQT, 8-bit, id 1, values 1..=64
        data.extend_from_slice(&[0xFF, 0xDB, 0x00, 67, 0x01]);
        data.extend(1..=64u8);
        // DHT, AC table 0 with a single 1-bit code for symbol 0x00
        data.extend_from_slice(&[0xFF, 0xC4, 0x00, 20, 0x10, 1]);
        data.extend_from_slice(&[0; 15]);
        data.push(0x00);
        // DRI = 4
        data.extend_from_slice(&[0xFF, 0xDD, 0x00, 0x04, 0x00, 0x04]);
        // COM "hi"
        data.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x04, b'h', b'i']);
        data.extend_from_slice(&[0xFF, 0xD9]);

        let segments = parse_jpeg(&data).unwrap();
        let table = segments.quant_tables[1].as_ref().unwrap();
        assert_eq!(table.values[0], 1);
        assert_eq!(table.values[63], 64);
        assert_eq!(table.to_natural()[8], 3);

        let ac = segments.ac_huff_tables[0].as_ref().unwrap();
        assert_eq!(ac.code_lengths[0], 1);
        assert_eq!(ac.values, vec![0x00]);

        assert_eq!(segments.restart_interval, 4);
        assert_eq!(segments.passthrough.len(), 1);
        assert_eq!(segments.passthrough[0].marker, Marker::COM);
        assert_eq!(segments.passthrough[0].data, b"hi");
    }

    #[test]
    fn test_scan_data_keeps_stuffing_and_restarts() {
        let mut data = vec![0xFF, 0xD8];
        // SOF0 1x1 gray
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 11, 8, 0, 1, 0, 1, 1, 1, 0x11, 0]);
        // SOS one component
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 8, 1, 1, 0x00, 0, 63, 0]);
        data.extend_from_slice(&[0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0x56, 0xFF, 0xFF, 0xD9]);

        let segments = parse_jpeg(&data).unwrap();
        assert_eq!(
            segments.scan_data,
            vec![0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0x56]
        );
        let scan = segments.scan.unwrap();
        assert_eq!(scan.component_count, 1);
        assert_eq!(scan.spectral_end, 63);
    }

    #[test]
    fn test_second_scan_is_rejected() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 11, 8, 0, 1, 0, 1, 1, 1, 0x11, 0]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 8, 1, 1, 0x00, 0, 63, 0]);
        data.extend_from_slice(&[0x12, 0x34]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 8, 1, 1, 0x00, 0, 63, 0]);
        data.extend_from_slice(&[0xFF, 0xD9]);

        assert!(matches!(
            parse_jpeg(&data),
            Err(OutguessError::Format { .. })
        ));
    }
}
