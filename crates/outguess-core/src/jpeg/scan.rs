//! Sequential (baseline) scan encoding and decoding.
//!
//! Converts between entropy-coded scan data and per-component coefficient
//! blocks without dequantization or IDCT. Blocks are stored per component
//! in raster order, each block as 64 coefficients in zigzag order.

use super::huffman::{encode_value, BitReader, BitWriter, HuffmanEncoder, HuffmanLookup};
use super::parser::{FrameInfo, HuffmanTable};
use super::ComponentBlocks;
use crate::error::{OutguessError, Result};

/// MCU grid of a single-scan image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanLayout {
    pub mcu_cols: usize,
    pub mcu_rows: usize,
    /// More than one component: MCUs hold H x V blocks of each component.
    pub interleaved: bool,
}

impl ScanLayout {
    pub fn mcu_count(&self) -> usize {
        self.mcu_cols * self.mcu_rows
    }
}

/// Every coded block takes at least a DC code and an EOB code of one bit.
const MIN_BITS_PER_BLOCK: usize = 2;

/// Compute the MCU grid and allocate zeroed component block storage.
///
/// Frames with more blocks than `scan_len` bytes of scan data can code
/// are rejected before anything is allocated.
pub(crate) fn allocate(
    frame: &FrameInfo,
    scan_len: usize,
) -> Result<(ScanLayout, Vec<ComponentBlocks>)> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let interleaved = frame.components.len() > 1;

    let h_max = frame.components.iter().map(|c| c.h_sampling as usize).max().unwrap_or(1);
    let v_max = frame.components.iter().map(|c| c.v_sampling as usize).max().unwrap_or(1);

    let layout = if interleaved {
        ScanLayout {
            mcu_cols: width.div_ceil(8 * h_max),
            mcu_rows: height.div_ceil(8 * v_max),
            interleaved,
        }
    } else {
        ScanLayout {
            mcu_cols: width.div_ceil(8),
            mcu_rows: height.div_ceil(8),
            interleaved,
        }
    };

    let grids: Vec<(usize, usize)> = frame
        .components
        .iter()
        .map(|c| {
            if interleaved {
                (
                    layout.mcu_cols * c.h_sampling as usize,
                    layout.mcu_rows * c.v_sampling as usize,
                )
            } else {
                (layout.mcu_cols, layout.mcu_rows)
            }
        })
        .collect();

    let total_blocks: usize = grids.iter().map(|&(wide, high)| wide * high).sum();
    let codable_blocks = scan_len.saturating_mul(8) / MIN_BITS_PER_BLOCK;
    if total_blocks > codable_blocks {
        return Err(OutguessError::format(format!(
            "{}x{} frame needs {total_blocks} blocks but {scan_len} bytes of scan data code at most {codable_blocks}",
            frame.width, frame.height
        )));
    }

    let components = frame
        .components
        .iter()
        .zip(grids)
        .map(|(c, (blocks_wide, blocks_high))| ComponentBlocks {
            id: c.id,
            h_sampling: c.h_sampling,
            v_sampling: c.v_sampling,
            quant_table_id: c.quant_table_id,
            dc_table_id: c.dc_table_id,
            ac_table_id: c.ac_table_id,
            blocks_wide,
            blocks_high,
            data: vec![0; blocks_wide * blocks_high * 64],
        })
        .collect();

    Ok((layout, components))
}

/// Visit the (component, block) pairs of MCU `mcu` in coding order.
fn for_each_mcu_block(
    layout: &ScanLayout,
    components: &[ComponentBlocks],
    mcu: usize,
    mut visit: impl FnMut(usize, usize) -> Result<()>,
) -> Result<()> {
    if !layout.interleaved {
        return visit(0, mcu);
    }

    let mcu_x = mcu % layout.mcu_cols;
    let mcu_y = mcu / layout.mcu_cols;
    for (comp_idx, component) in components.iter().enumerate() {
        let h = component.h_sampling as usize;
        let v = component.v_sampling as usize;
        for by in 0..v {
            for bx in 0..h {
                let row = mcu_y * v + by;
                let col = mcu_x * h + bx;
                visit(comp_idx, row * component.blocks_wide + col)?;
            }
        }
    }
    Ok(())
}

/// Split entropy-coded data at RSTn markers.
fn split_restart_intervals(data: &[u8]) -> Vec<&[u8]> {
    let mut intervals = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < data.len() {
        if data[i] == 0xFF && (0xD0..=0xD7).contains(&data[i + 1]) {
            intervals.push(&data[start..i]);
            i += 2;
            start = i;
        } else if data[i] == 0xFF {
            i += 2;
        } else {
            i += 1;
        }
    }
    intervals.push(&data[start.min(data.len())..]);
    intervals
}

fn build_tables<T>(
    tables: &[Option<HuffmanTable>; 4],
    build: impl Fn(&HuffmanTable) -> Result<T>,
) -> Result<[Option<T>; 4]> {
    let mut built: [Option<T>; 4] = [None, None, None, None];
    for (slot, table) in built.iter_mut().zip(tables.iter()) {
        if let Some(table) = table {
            *slot = Some(build(table)?);
        }
    }
    Ok(built)
}

fn table_for<'t, T>(tables: &'t [Option<T>; 4], id: u8, kind: &str) -> Result<&'t T> {
    tables
        .get(id as usize)
        .and_then(Option::as_ref)
        .ok_or_else(|| OutguessError::format(format!("missing {kind} Huffman table {id}")))
}

/// Decode the scan into `components` (as allocated by [`allocate`]).
pub(crate) fn decode_scan(
    scan_data: &[u8],
    layout: &ScanLayout,
    components: &mut [ComponentBlocks],
    dc_huff_tables: &[Option<HuffmanTable>; 4],
    ac_huff_tables: &[Option<HuffmanTable>; 4],
    restart_interval: u16,
) -> Result<()> {
    let dc_tables = build_tables(dc_huff_tables, HuffmanLookup::from_table)?;
    let ac_tables = build_tables(ac_huff_tables, HuffmanLookup::from_table)?;

    let lookups = components
        .iter()
        .map(|c| {
            Ok((
                table_for(&dc_tables, c.dc_table_id, "DC")?,
                table_for(&ac_tables, c.ac_table_id, "AC")?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let total_mcus = layout.mcu_count();
    let interval_len = match restart_interval {
        0 => total_mcus.max(1),
        n => n as usize,
    };
    let intervals = split_restart_intervals(scan_data);
    let needed = total_mcus.div_ceil(interval_len);
    if intervals.len() < needed {
        return Err(OutguessError::format(format!(
            "scan has {} restart intervals, expected {needed}",
            intervals.len()
        )));
    }

    let mut mcu = 0;
    for interval in intervals.iter().take(needed) {
        let mut reader = BitReader::new(interval);
        let mut predictors = vec![0i16; components.len()];
        let end = (mcu + interval_len).min(total_mcus);

        while mcu < end {
            let mut decoded = Vec::with_capacity(10);
            for_each_mcu_block(layout, components, mcu, |comp_idx, block_idx| {
                decoded.push((comp_idx, block_idx));
                Ok(())
            })?;
            for (comp_idx, block_idx) in decoded {
                let (dc_table, ac_table) = lookups[comp_idx];
                let block = components[comp_idx].block_mut(block_idx);
                decode_block(&mut reader, block, dc_table, ac_table, &mut predictors[comp_idx])?;
            }
            mcu += 1;
        }
    }

    log::debug!(
        "decoded {} MCUs in {} restart intervals ({} components)",
        total_mcus,
        needed,
        components.len()
    );
    Ok(())
}

/// Encode `components` into entropy-coded scan data.
///
/// Returns `Ok(None)` if a needed symbol has no code in the given tables,
/// which happens with optimized tables after coefficients were modified.
pub(crate) fn encode_scan(
    layout: &ScanLayout,
    components: &[ComponentBlocks],
    dc_huff_tables: &[Option<HuffmanTable>; 4],
    ac_huff_tables: &[Option<HuffmanTable>; 4],
    restart_interval: u16,
    size_hint: usize,
) -> Result<Option<Vec<u8>>> {
    let dc_encoders = build_tables(dc_huff_tables, HuffmanEncoder::from_table)?;
    let ac_encoders = build_tables(ac_huff_tables, HuffmanEncoder::from_table)?;

    let encoders = components
        .iter()
        .map(|c| {
            Ok((
                table_for(&dc_encoders, c.dc_table_id, "DC")?,
                table_for(&ac_encoders, c.ac_table_id, "AC")?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut writer = BitWriter::with_capacity(size_hint);
    let mut predictors = vec![0i16; components.len()];
    let mut restarts_written = 0u8;
    let mut missing_symbol = false;

    for mcu in 0..layout.mcu_count() {
        if restart_interval > 0 && mcu > 0 && mcu % restart_interval as usize == 0 {
            writer.write_restart(restarts_written);
            restarts_written = restarts_written.wrapping_add(1) & 0x07;
            predictors.fill(0);
        }

        for_each_mcu_block(layout, components, mcu, |comp_idx, block_idx| {
            let (dc_encoder, ac_encoder) = encoders[comp_idx];
            let block = components[comp_idx].block(block_idx);
            if encode_block(&mut writer, block, dc_encoder, ac_encoder, &mut predictors[comp_idx])
                .is_none()
            {
                missing_symbol = true;
            }
            Ok(())
        })?;

        if missing_symbol {
            log::debug!("Huffman table lacks a symbol needed at MCU {mcu}");
            return Ok(None);
        }
    }

    Ok(Some(writer.into_bytes()))
}

/// Encode one block; `None` if a symbol is missing from a table.
fn encode_block(
    writer: &mut BitWriter,
    block: &[i16],
    dc_encoder: &HuffmanEncoder,
    ac_encoder: &HuffmanEncoder,
    dc_predictor: &mut i16,
) -> Option<()> {
    let dc_diff = block[0].wrapping_sub(*dc_predictor);
    *dc_predictor = block[0];

    let (dc_size, dc_bits) = encode_value(dc_diff);
    writer.write_huffman(dc_size, dc_encoder)?;
    writer.write_bits(dc_bits, dc_size);

    let mut zero_run = 0u8;
    for &coeff in &block[1..] {
        if coeff == 0 {
            zero_run += 1;
            continue;
        }

        while zero_run >= 16 {
            writer.write_huffman(0xF0, ac_encoder)?;
            zero_run -= 16;
        }

        let (size, bits) = encode_value(coeff);
        writer.write_huffman((zero_run << 4) | size, ac_encoder)?;
        writer.write_bits(bits, size);
        zero_run = 0;
    }

    if zero_run > 0 {
        writer.write_huffman(0x00, ac_encoder)?;
    }

    Some(())
}

fn decode_block(
    reader: &mut BitReader,
    block: &mut [i16],
    dc_table: &HuffmanLookup,
    ac_table: &HuffmanLookup,
    dc_predictor: &mut i16,
) -> Result<()> {
    let dc_size = reader.decode_huffman(dc_table)?;
    if dc_size > 11 {
        return Err(OutguessError::format(format!("invalid DC size: {dc_size}")));
    }

    let dc_diff = reader.receive_extend(dc_size)?;
    *dc_predictor = dc_predictor.wrapping_add(dc_diff);
    block[0] = *dc_predictor;

    let mut k = 1;
    while k < 64 {
        let symbol = reader.decode_huffman(ac_table)?;
        let run = (symbol >> 4) as usize;
        let size = symbol & 0x0F;

        if size == 0 {
            match run {
                0 => break,
                15 => k += 16,
                _ => {
                    return Err(OutguessError::format(format!(
                        "invalid AC run/size: {symbol:02X}"
                    )))
                }
            }
            continue;
        }

        k += run;
        if k >= 64 {
            return Err(OutguessError::format("AC coefficient index out of bounds"));
        }
        block[k] = reader.receive_extend(size)?;
        k += 1;
    }

    if k > 64 {
        return Err(OutguessError::format("zero run past end of block"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::parser::{Component, FrameInfo};
    use crate::jpeg::tables::{std_ac_luminance, std_dc_luminance};
    use crate::jpeg::Marker;

    fn gray_frame(width: u16, height: u16) -> FrameInfo {
        FrameInfo {
            marker: Marker::SOF(0),
            precision: 8,
            height,
            width,
            components: vec![Component {
                id: 1,
                h_sampling: 1,
                v_sampling: 1,
                quant_table_id: 0,
                dc_table_id: 0,
                ac_table_id: 0,
            }],
        }
    }

    fn std_tables() -> ([Option<HuffmanTable>; 4], [Option<HuffmanTable>; 4]) {
        (
            [Some(std_dc_luminance()), None, None, None],
            [Some(std_ac_luminance()), None, None, None],
        )
    }

    fn fill(components: &mut [ComponentBlocks], seed: u64) {
        let mut rng = fastrand::Rng::with_seed(seed);
        for component in components.iter_mut() {
            for (i, coeff) in component.data.iter_mut().enumerate() {
                *coeff = match i % 64 {
                    0 => rng.i16(-300..300),
                    k if k < 20 => rng.i16(-40..40),
                    _ if rng.u8(..) < 40 => rng.i16(-3..4),
                    _ => 0,
                };
            }
        }
    }

    #[test]
    fn test_layout_for_subsampled_color() {
        let mut frame = gray_frame(33, 17);
        frame.components[0].h_sampling = 2;
        frame.components[0].v_sampling = 2;
        for id in 2..=3 {
            let mut chroma = frame.components[0].clone();
            chroma.id = id;
            chroma.h_sampling = 1;
            chroma.v_sampling = 1;
            frame.components.push(chroma);
        }

        let (layout, components) = allocate(&frame, usize::MAX).unwrap();
        assert_eq!((layout.mcu_cols, layout.mcu_rows), (3, 2));
        assert_eq!((components[0].blocks_wide, components[0].blocks_high), (6, 4));
        assert_eq!((components[1].blocks_wide, components[1].blocks_high), (3, 2));
    }

    #[test]
    fn test_frame_larger_than_its_scan_is_rejected() {
        let frame = gray_frame(65535, 65535);
        let err = allocate(&frame, 64).unwrap_err();
        assert!(matches!(err, OutguessError::Format { .. }), "{err}");

        // 4 blocks need at least one byte
        let frame = gray_frame(16, 16);
        assert!(allocate(&frame, 1).is_ok());
        assert!(allocate(&frame, 0).is_err());
    }

    #[test]
    fn test_split_restart_intervals() {
        let data: [u8; 9] = [0x01, 0xFF, 0x00, 0xFF, 0xD0, 0x02, 0xFF, 0xD1, 0x03];
        let intervals = split_restart_intervals(&data);
        assert_eq!(intervals, vec![&data[0..3], &data[5..6], &data[8..9]]);
    }

    #[test]
    fn test_scan_round_trip() {
        let frame = gray_frame(40, 24);
        let (layout, mut components) = allocate(&frame, usize::MAX).unwrap();
        fill(&mut components, 7);
        let (dc, ac) = std_tables();

        let data = encode_scan(&layout, &components, &dc, &ac, 0, 1024)
            .unwrap()
            .unwrap();

        let (_, mut decoded) = allocate(&frame, usize::MAX).unwrap();
        decode_scan(&data, &layout, &mut decoded, &dc, &ac, 0).unwrap();
        assert_eq!(decoded[0].data, components[0].data);
    }

    #[test]
    fn test_scan_round_trip_with_restart_markers() {
        let frame = gray_frame(64, 16);
        let (layout, mut components) = allocate(&frame, usize::MAX).unwrap();
        fill(&mut components, 11);
        let (dc, ac) = std_tables();

        let data = encode_scan(&layout, &components, &dc, &ac, 3, 1024)
            .unwrap()
            .unwrap();
        // 16 MCUs with an interval of 3 need 5 markers.
        assert_eq!(split_restart_intervals(&data).len(), 6);

        let (_, mut decoded) = allocate(&frame, usize::MAX).unwrap();
        decode_scan(&data, &layout, &mut decoded, &dc, &ac, 3).unwrap();
        assert_eq!(decoded[0].data, components[0].data);
    }

    #[test]
    fn test_missing_symbol_is_reported() {
        let frame = gray_frame(8, 8);
        let (layout, mut components) = allocate(&frame, usize::MAX).unwrap();
        components[0].data[5] = 1;
        // AC table that only knows EOB
        let ac_eob_only = HuffmanTable {
            class: 1,
            id: 0,
            code_lengths: [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            values: vec![0x00],
        };
        let (dc, _) = std_tables();
        let ac = [Some(ac_eob_only), None, None, None];

        let result = encode_scan(&layout, &components, &dc, &ac, 0, 16).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_truncated_scan_is_a_format_error() {
        let frame = gray_frame(64, 64);
        let (layout, mut components) = allocate(&frame, usize::MAX).unwrap();
        fill(&mut components, 3);
        let (dc, ac) = std_tables();

        let data = encode_scan(&layout, &components, &dc, &ac, 0, 1024)
            .unwrap()
            .unwrap();
        let truncated = &data[..data.len() / 2];

        let (_, mut decoded) = allocate(&frame, usize::MAX).unwrap();
        assert!(matches!(
            decode_scan(truncated, &layout, &mut decoded, &dc, &ac, 0),
            Err(OutguessError::Format { .. })
        ));
    }
}
