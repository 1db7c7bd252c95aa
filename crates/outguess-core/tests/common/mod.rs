#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

/// Baseline JPEG with textured, deterministic content.
pub fn cover_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    encode_pixels(&pixels(width, height, 3), width, height, quality, ColorType::Rgb8)
}

pub fn grayscale_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    encode_pixels(&pixels(width, height, 1), width, height, quality, ColorType::L8)
}

/// Cover whose tables are exactly the IJG ones for `quality`, as written
/// by this crate's own encoder.
pub fn normalized_cover(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let image = outguess_core::jpeg::decode(&cover_jpeg(width, height, quality)).unwrap();
    outguess_core::jpeg::encode(&image, Some(quality)).unwrap()
}

fn pixels(width: u32, height: u32, channels: u32) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(((width as u64) << 32) | height as u64);
    let mut pixels = Vec::with_capacity((width * height * channels) as usize);
    for y in 0..height {
        for x in 0..width {
            let gradient = ((x + y) * 255 / (width + height)) as i32;
            let wave = (((x as f32 / 6.0).sin() * (y as f32 / 9.0).cos()) * 50.0) as i32;
            for channel in 0..channels as i32 {
                let noise = rng.i32(-20..=20);
                let value = gradient / (channel + 1) + wave + noise + 60 + channel * 25;
                pixels.push(value.clamp(0, 255) as u8);
            }
        }
    }
    pixels
}

fn encode_pixels(pixels: &[u8], width: u32, height: u32, quality: u8, color: ColorType) -> Vec<u8> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode(pixels, width, height, color)
        .unwrap();
    bytes
}
