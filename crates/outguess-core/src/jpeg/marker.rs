//! JPEG marker codes (ITU T.81 Table B.1) as far as the codec needs them.

/// A marker following a `0xFF` byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Marker {
    /// Start of frame; the parameter is the SOF number 0..=15.
    SOF(u8),
    DHT,
    /// Arithmetic coding conditioning; only appears in unsupported streams.
    DAC,
    /// Restart marker 0..=7.
    RST(u8),
    SOI,
    EOI,
    SOS,
    DQT,
    DNL,
    DRI,
    /// Application segment 0..=15.
    APP(u8),
    COM,
    /// Any other marker with a length field (JPG, JPGn, DHP, EXP, reserved).
    Other(u8),
}

impl Marker {
    /// Returns true if the marker is followed by a 2-byte length field.
    pub fn has_length(self) -> bool {
        !matches!(self, Marker::RST(..) | Marker::SOI | Marker::EOI)
            && self != Marker::Other(0x01)
    }

    /// Converts a marker byte. Returns `None` for stuffing (0x00) and fill (0xFF).
    pub fn from_u8(n: u8) -> Option<Marker> {
        use Marker::*;
        match n {
            0x00 | 0xFF => None,
            0xC4 => Some(DHT),
            0xCC => Some(DAC),
            0xC8 => Some(Other(n)),
            0xC0..=0xCF => Some(SOF(n - 0xC0)),
            0xD0..=0xD7 => Some(RST(n - 0xD0)),
            0xD8 => Some(SOI),
            0xD9 => Some(EOI),
            0xDA => Some(SOS),
            0xDB => Some(DQT),
            0xDC => Some(DNL),
            0xDD => Some(DRI),
            0xE0..=0xEF => Some(APP(n - 0xE0)),
            0xFE => Some(COM),
            _ => Some(Other(n)),
        }
    }

    pub fn to_u8(self) -> u8 {
        use Marker::*;
        match self {
            SOF(n) => 0xC0 + n,
            DHT => 0xC4,
            DAC => 0xCC,
            RST(n) => 0xD0 + n,
            SOI => 0xD8,
            EOI => 0xD9,
            SOS => 0xDA,
            DQT => 0xDB,
            DNL => 0xDC,
            DRI => 0xDD,
            APP(n) => 0xE0 + n,
            COM => 0xFE,
            Other(n) => n,
        }
    }

    /// SOF0 (baseline) and SOF1 (extended sequential, Huffman) are decodable.
    pub fn is_sequential_huffman(self) -> bool {
        matches!(self, Marker::SOF(0) | Marker::SOF(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_bytes_round_trip() {
        for byte in 0x01..=0xFEu8 {
            let marker = Marker::from_u8(byte).unwrap();
            assert_eq!(marker.to_u8(), byte, "marker 0x{byte:02X}");
        }
        assert_eq!(Marker::from_u8(0x00), None);
        assert_eq!(Marker::from_u8(0xFF), None);
    }

    #[test]
    fn test_classification() {
        assert_eq!(Marker::from_u8(0xC0), Some(Marker::SOF(0)));
        assert_eq!(Marker::from_u8(0xC2), Some(Marker::SOF(2)));
        assert_eq!(Marker::from_u8(0xC4), Some(Marker::DHT));
        assert_eq!(Marker::from_u8(0xD3), Some(Marker::RST(3)));
        assert!(Marker::SOF(1).is_sequential_huffman());
        assert!(!Marker::SOF(2).is_sequential_huffman());
        assert!(!Marker::SOF(9).is_sequential_huffman());
    }

    #[test]
    fn test_has_length() {
        assert!(Marker::SOF(0).has_length());
        assert!(Marker::DQT.has_length());
        assert!(Marker::APP(1).has_length());
        assert!(!Marker::SOI.has_length());
        assert!(!Marker::EOI.has_length());
        assert!(!Marker::RST(0).has_length());
        assert!(!Marker::Other(0x01).has_length());
    }
}
