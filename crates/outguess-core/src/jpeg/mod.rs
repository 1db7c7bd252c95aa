//! JPEG coefficient codec.
//!
//! Gives direct access to the quantized DCT coefficients of a baseline JPEG
//! without a full pixel decode, and writes modified coefficients back.
//!
//! # Architecture
//!
//! ```text
//! JPEG -> parse -> huffman decode -> CoefficientImage -> (modify) -> huffman encode -> JPEG
//! ```
//!
//! Supported input: SOF0/SOF1, 8-bit samples, Huffman coding, one scan
//! holding every component, any sampling factors, optional restart markers.

mod huffman;
mod marker;
mod parser;
mod quality;
mod scan;
mod tables;
mod writer;

pub use marker::Marker;
pub use parser::{QuantizationTable, ZIGZAG_TO_NATURAL};
pub use quality::{estimate_quality, FALLBACK_QUALITY};
pub use tables::{base_quant_values, scaled_quant_table};

use parser::{HuffmanTable, Segment};
use scan::ScanLayout;

use crate::error::{OutguessError, Result};
use crate::options::check_quality;

/// Coefficients of one component, blocks in raster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentBlocks {
    pub id: u8,
    pub h_sampling: u8,
    pub v_sampling: u8,
    pub quant_table_id: u8,
    dc_table_id: u8,
    ac_table_id: u8,
    /// Block grid size, including the padding blocks that complete MCUs.
    pub blocks_wide: usize,
    pub blocks_high: usize,
    /// 64 coefficients per block, zigzag order.
    pub data: Vec<i16>,
}

impl ComponentBlocks {
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks_wide * self.blocks_high
    }

    #[inline]
    pub fn block(&self, index: usize) -> &[i16] {
        let start = index * 64;
        &self.data[start..start + 64]
    }

    #[inline]
    pub fn block_mut(&mut self, index: usize) -> &mut [i16] {
        let start = index * 64;
        &mut self.data[start..start + 64]
    }
}

/// A decoded baseline JPEG: header metadata plus quantized coefficients.
#[derive(Debug, Clone)]
pub struct CoefficientImage {
    width: u16,
    height: u16,
    frame_marker: Marker,
    components: Vec<ComponentBlocks>,
    quant_tables: [Option<QuantizationTable>; 4],
    dc_huff_tables: [Option<HuffmanTable>; 4],
    ac_huff_tables: [Option<HuffmanTable>; 4],
    restart_interval: u16,
    passthrough: Vec<Segment>,
    layout: ScanLayout,
    scan_size: usize,
}

impl CoefficientImage {
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn components(&self) -> &[ComponentBlocks] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [ComponentBlocks] {
        &mut self.components
    }

    pub fn quant_table(&self, id: u8) -> Option<&QuantizationTable> {
        self.quant_tables.get(id as usize).and_then(Option::as_ref)
    }

    pub fn restart_interval(&self) -> u16 {
        self.restart_interval
    }

    /// Set the restart interval (in MCUs) used when encoding; 0 disables it.
    pub fn with_restart_interval(mut self, restart_interval: u16) -> Self {
        self.restart_interval = restart_interval;
        self
    }

    /// Distinct quantization tables in use, in component order.
    fn tables_in_use(&self) -> Vec<&QuantizationTable> {
        let mut tables: Vec<&QuantizationTable> = Vec::with_capacity(2);
        for component in &self.components {
            if let Some(table) = self.quant_table(component.quant_table_id) {
                if !tables.iter().any(|t| t.values == table.values) {
                    tables.push(table);
                }
            }
        }
        tables
    }

    /// IJG quality the quantization tables most likely came from.
    pub fn estimated_quality(&self) -> u8 {
        estimate_quality(&self.tables_in_use())
    }

    /// Requantize every block to the IJG tables for `quality`.
    ///
    /// Each coefficient becomes `round(c * q_old / q_new)`, clamped to the
    /// baseline range. Huffman tables switch to the standard ones since the
    /// old optimized tables may not cover the new values.
    pub fn requantize(&self, quality: u8) -> Result<CoefficientImage> {
        check_quality(quality)?;
        let mut image = self.clone();

        let mut new_tables: [Option<QuantizationTable>; 4] = [None, None, None, None];
        for component in &mut image.components {
            let id = component.quant_table_id;
            let old = self
                .quant_table(id)
                .ok_or_else(|| OutguessError::format(format!("missing quantization table {id}")))?;
            let new = new_tables[id as usize]
                .get_or_insert_with(|| tables::scaled_quant_table(id, quality));

            for block in component.data.chunks_exact_mut(64) {
                for (k, coeff) in block.iter_mut().enumerate() {
                    *coeff = rescale(*coeff, old.values[k], new.values[k]);
                }
            }
        }

        image.quant_tables = new_tables;
        image.use_standard_huffman_tables();
        log::debug!(
            "requantized {}x{} image from quality ~{} to {}",
            self.width,
            self.height,
            self.estimated_quality(),
            quality
        );
        Ok(image)
    }

    /// Switch to the Annex K tables: luminance for the first component,
    /// chrominance for the rest.
    fn use_standard_huffman_tables(&mut self) {
        self.dc_huff_tables = [Some(tables::std_dc_luminance()), None, None, None];
        self.ac_huff_tables = [Some(tables::std_ac_luminance()), None, None, None];
        if self.components.len() > 1 {
            self.dc_huff_tables[1] = Some(tables::std_dc_chrominance());
            self.ac_huff_tables[1] = Some(tables::std_ac_chrominance());
        }
        for (index, component) in self.components.iter_mut().enumerate() {
            let id = u8::from(index > 0);
            component.dc_table_id = id;
            component.ac_table_id = id;
        }
    }

    fn encode_scan(&self) -> Result<Option<Vec<u8>>> {
        scan::encode_scan(
            &self.layout,
            &self.components,
            &self.dc_huff_tables,
            &self.ac_huff_tables,
            self.restart_interval,
            self.scan_size,
        )
    }
}

/// `round(coeff * old / new)` with halves away from zero, clamped to ±1023.
fn rescale(coeff: i16, old: u16, new: u16) -> i16 {
    let numerator = coeff as i32 * old as i32;
    let divisor = new as i32;
    let magnitude = (numerator.abs() + divisor / 2) / divisor;
    (magnitude.min(1023) * numerator.signum()) as i16
}

/// Decode a baseline JPEG into its quantized coefficients.
pub fn decode(bytes: &[u8]) -> Result<CoefficientImage> {
    let segments = parser::parse_jpeg(bytes)?;

    let frame = segments
        .frame
        .ok_or_else(|| OutguessError::format("missing frame header (SOF)"))?;
    if !frame.marker.is_sequential_huffman() {
        return Err(OutguessError::format(format!(
            "only baseline JPEGs are supported, found {:?}",
            frame.marker
        )));
    }
    if frame.precision != 8 {
        return Err(OutguessError::format(format!(
            "unsupported sample precision {}",
            frame.precision
        )));
    }
    if frame.width == 0 || frame.height == 0 {
        return Err(OutguessError::format("image has zero width or height"));
    }
    if frame.components.is_empty() || frame.components.len() > 4 {
        return Err(OutguessError::format(format!(
            "unsupported component count {}",
            frame.components.len()
        )));
    }
    for component in &frame.components {
        if !(1..=4).contains(&component.h_sampling) || !(1..=4).contains(&component.v_sampling) {
            return Err(OutguessError::format("invalid sampling factor"));
        }
        if segments
            .quant_tables
            .get(component.quant_table_id as usize)
            .and_then(Option::as_ref)
            .is_none()
        {
            return Err(OutguessError::format(format!(
                "missing quantization table {}",
                component.quant_table_id
            )));
        }
    }

    let scan_header = segments
        .scan
        .ok_or_else(|| OutguessError::format("missing scan (SOS)"))?;
    if scan_header.component_count != frame.components.len() {
        return Err(OutguessError::format(
            "scan does not cover every component (multi-scan JPEG)",
        ));
    }
    if scan_header.spectral_start != 0
        || scan_header.spectral_end != 63
        || scan_header.approximation != 0
    {
        return Err(OutguessError::format("scan is not a full sequential scan"));
    }

    let (layout, mut components) = scan::allocate(&frame, segments.scan_data.len())?;
    scan::decode_scan(
        &segments.scan_data,
        &layout,
        &mut components,
        &segments.dc_huff_tables,
        &segments.ac_huff_tables,
        segments.restart_interval,
    )?;

    Ok(CoefficientImage {
        width: frame.width,
        height: frame.height,
        frame_marker: frame.marker,
        components,
        quant_tables: segments.quant_tables,
        dc_huff_tables: segments.dc_huff_tables,
        ac_huff_tables: segments.ac_huff_tables,
        restart_interval: segments.restart_interval,
        passthrough: segments.passthrough,
        layout,
        scan_size: segments.scan_data.len(),
    })
}

/// Encode a coefficient image back into a JPEG byte stream.
///
/// With `quality == None` the original quantization and Huffman tables are
/// reused. Should the Huffman tables lack a code the modified coefficients
/// need, the standard tables are written instead; coefficient values are
/// never altered. With `Some(quality)` the image is requantized first.
pub fn encode(image: &CoefficientImage, quality: Option<u8>) -> Result<Vec<u8>> {
    if let Some(quality) = quality {
        let requantized = image.requantize(quality)?;
        return encode(&requantized, None);
    }

    if let Some(scan_data) = image.encode_scan()? {
        return Ok(writer::write_jpeg(image, &scan_data));
    }

    log::warn!("original Huffman tables cannot code the modified coefficients, using standard tables");
    let mut standard = image.clone();
    standard.use_standard_huffman_tables();
    let scan_data = standard
        .encode_scan()?
        .ok_or_else(|| OutguessError::format("coefficient outside the baseline range"))?;
    Ok(writer::write_jpeg(&standard, &scan_data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_rounds_half_away_from_zero() {
        assert_eq!(rescale(3, 5, 2), 8); // 7.5
        assert_eq!(rescale(-3, 5, 2), -8);
        assert_eq!(rescale(7, 4, 10), 3); // 2.8
        assert_eq!(rescale(1, 3, 10), 0); // 0.3
        assert_eq!(rescale(0, 9, 1), 0);
        assert_eq!(rescale(1000, 50, 1), 1023);
        assert_eq!(rescale(-1000, 50, 1), -1023);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"definitely not a jpeg"),
            Err(OutguessError::Format { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_progressive() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xDB, 0x00, 67, 0x00]);
        data.extend_from_slice(&[1; 64]);
        data.extend_from_slice(&[0xFF, 0xC2, 0x00, 11, 8, 0, 8, 0, 8, 1, 1, 0x11, 0]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 8, 1, 1, 0x00, 0, 0, 0]);
        data.extend_from_slice(&[0x00, 0xFF, 0xD9]);

        let err = decode(&data).unwrap_err();
        assert!(format!("{err}").contains("baseline"), "{err}");
    }

    #[test]
    fn test_decode_rejects_zero_dimensions() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xDB, 0x00, 67, 0x00]);
        data.extend_from_slice(&[1; 64]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 11, 8, 0, 0, 0, 8, 1, 1, 0x11, 0]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 8, 1, 1, 0x00, 0, 63, 0]);
        data.extend_from_slice(&[0x00, 0xFF, 0xD9]);

        let err = decode(&data).unwrap_err();
        assert!(format!("{err}").contains("zero"), "{err}");
    }
}
