mod common;

use common::{cover_jpeg, grayscale_jpeg};
use outguess_core::jpeg::{decode, encode};
use outguess_core::OutguessError;

#[test]
fn untouched_coefficients_survive_a_round_trip() {
    let original = decode(&cover_jpeg(160, 96, 85)).unwrap();
    let bytes = encode(&original, None).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert_eq!(decoded.width(), 160);
    assert_eq!(decoded.height(), 96);
    assert_eq!(decoded.components(), original.components());
    assert_eq!(decoded.quant_table(0), original.quant_table(0));
    assert_eq!(decoded.quant_table(1), original.quant_table(1));

    // a second pass is byte identical
    assert_eq!(encode(&decoded, None).unwrap(), bytes);
}

#[test]
fn odd_dimensions_round_trip() {
    let original = decode(&cover_jpeg(37, 23, 80)).unwrap();
    assert_eq!(original.components()[0].blocks_wide, 5);
    assert_eq!(original.components()[0].blocks_high, 3);

    let decoded = decode(&encode(&original, None).unwrap()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (37, 23));
    assert_eq!(decoded.components(), original.components());
}

#[test]
fn grayscale_round_trip() {
    let original = decode(&grayscale_jpeg(64, 48, 75)).unwrap();
    assert_eq!(original.components().len(), 1);
    assert_eq!(original.estimated_quality(), 75);

    let decoded = decode(&encode(&original, None).unwrap()).unwrap();
    assert_eq!(decoded.components(), original.components());
}

#[test]
fn restart_intervals_are_reproduced() {
    let original = decode(&cover_jpeg(96, 64, 85)).unwrap();
    let with_restarts = original.clone().with_restart_interval(5);
    let bytes = encode(&with_restarts, None).unwrap();
    assert!(bytes.windows(2).any(|w| w == [0xFF, 0xDD]), "DRI segment");
    assert!(bytes.windows(2).any(|w| w == [0xFF, 0xD0]), "RST0 marker");

    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.restart_interval(), 5);
    assert_eq!(decoded.components(), original.components());
}

#[test]
fn quality_is_estimated_from_tables() {
    for quality in [40, 60, 85, 95] {
        let image = decode(&cover_jpeg(32, 32, quality)).unwrap();
        assert_eq!(image.estimated_quality(), quality);
    }
}

#[test]
fn encoding_at_a_quality_requantizes() {
    let original = decode(&cover_jpeg(128, 128, 92)).unwrap();
    let coarse = decode(&encode(&original, Some(40)).unwrap()).unwrap();

    assert_eq!(coarse.estimated_quality(), 40);
    assert_eq!((coarse.width(), coarse.height()), (128, 128));

    let nonzero = |image: &outguess_core::CoefficientImage| {
        image.components()[0]
            .data
            .iter()
            .filter(|&&c| c != 0)
            .count()
    };
    assert!(nonzero(&coarse) < nonzero(&original));
}

#[test]
fn requantizing_to_the_same_tables_is_lossless() {
    let original = decode(&encode(&decode(&cover_jpeg(64, 64, 85)).unwrap(), Some(85)).unwrap()).unwrap();
    let again = decode(&encode(&original, Some(85)).unwrap()).unwrap();
    assert_eq!(again.components(), original.components());
}

#[test]
fn corrupt_streams_are_rejected() {
    let bytes = cover_jpeg(64, 64, 85);
    assert!(decode(&bytes[..bytes.len() / 2]).is_err());
    assert!(decode(&bytes[2..]).is_err());
    assert!(decode(&[]).is_err());
}

#[test]
fn oversized_frame_dimensions_are_a_format_error() {
    let mut bytes = cover_jpeg(64, 64, 85);
    // SOF0: marker, length (2), precision (1), then height and width
    let sof = bytes
        .windows(2)
        .position(|w| w == [0xFF, 0xC0])
        .expect("baseline frame header");
    bytes[sof + 5..sof + 9].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(err, OutguessError::Format { .. }), "{err}");
}
