//! Reassembles a JPEG stream from a coefficient image and fresh scan data.

use super::marker::Marker;
use super::parser::{HuffmanTable, QuantizationTable};
use super::CoefficientImage;

/// Write a complete JPEG file.
///
/// Passthrough segments (APPn, COM) keep their original order and come
/// first, followed by the tables, frame header, restart interval and scan.
pub(crate) fn write_jpeg(image: &CoefficientImage, scan_data: &[u8]) -> Vec<u8> {
    let estimated_size = image
        .passthrough
        .iter()
        .map(|s| s.data.len() + 4)
        .sum::<usize>()
        + scan_data.len()
        + 1024;
    let mut output = Vec::with_capacity(estimated_size);

    write_marker(&mut output, Marker::SOI);

    for segment in &image.passthrough {
        write_segment(&mut output, segment.marker, &segment.data);
    }

    for table in image.quant_tables.iter().flatten() {
        write_segment(&mut output, Marker::DQT, &dqt_body(table));
    }

    write_segment(&mut output, image.frame_marker, &sof_body(image));

    let huffman: Vec<u8> = image
        .dc_huff_tables
        .iter()
        .chain(image.ac_huff_tables.iter())
        .flatten()
        .flat_map(dht_body)
        .collect();
    write_segment(&mut output, Marker::DHT, &huffman);

    if image.restart_interval > 0 {
        write_segment(&mut output, Marker::DRI, &image.restart_interval.to_be_bytes());
    }

    write_segment(&mut output, Marker::SOS, &sos_body(image));
    output.extend_from_slice(scan_data);
    write_marker(&mut output, Marker::EOI);

    output
}

fn write_marker(output: &mut Vec<u8>, marker: Marker) {
    output.push(0xFF);
    output.push(marker.to_u8());
}

fn write_segment(output: &mut Vec<u8>, marker: Marker, body: &[u8]) {
    write_marker(output, marker);
    output.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    output.extend_from_slice(body);
}

/// DQT body for one table; 16-bit precision only when a value needs it.
fn dqt_body(table: &QuantizationTable) -> Vec<u8> {
    let wide = table.values.iter().any(|&v| v > 255);
    let mut body = Vec::with_capacity(if wide { 129 } else { 65 });
    body.push(((wide as u8) << 4) | table.id);
    for &value in &table.values {
        if wide {
            body.extend_from_slice(&value.to_be_bytes());
        } else {
            body.push(value as u8);
        }
    }
    body
}

fn dht_body(table: &HuffmanTable) -> Vec<u8> {
    let mut body = Vec::with_capacity(17 + table.values.len());
    body.push((table.class << 4) | table.id);
    body.extend_from_slice(&table.code_lengths);
    body.extend_from_slice(&table.values);
    body
}

fn sof_body(image: &CoefficientImage) -> Vec<u8> {
    let mut body = Vec::with_capacity(6 + 3 * image.components.len());
    body.push(8);
    body.extend_from_slice(&image.height.to_be_bytes());
    body.extend_from_slice(&image.width.to_be_bytes());
    body.push(image.components.len() as u8);
    for component in &image.components {
        body.push(component.id);
        body.push((component.h_sampling << 4) | component.v_sampling);
        body.push(component.quant_table_id);
    }
    body
}

/// SOS body for the single sequential scan (Ss=0, Se=63, Ah=Al=0).
fn sos_body(image: &CoefficientImage) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + 2 * image.components.len());
    body.push(image.components.len() as u8);
    for component in &image.components {
        body.push(component.id);
        body.push((component.dc_table_id << 4) | component.ac_table_id);
    }
    body.extend_from_slice(&[0, 63, 0]);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dqt_body_precision() {
        let mut table = QuantizationTable {
            id: 1,
            values: [7; 64],
        };
        let body = dqt_body(&table);
        assert_eq!(body.len(), 65);
        assert_eq!(body[0], 0x01);

        table.values[3] = 300;
        let body = dqt_body(&table);
        assert_eq!(body.len(), 129);
        assert_eq!(body[0], 0x11);
        assert_eq!(&body[7..9], &[0x01, 0x2C]);
    }

    #[test]
    fn test_segment_length_includes_length_field() {
        let mut output = Vec::new();
        write_segment(&mut output, Marker::COM, b"abc");
        assert_eq!(output, vec![0xFF, 0xFE, 0x00, 0x05, b'a', b'b', b'c']);
    }
}
