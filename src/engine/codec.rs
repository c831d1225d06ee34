// src/engine/codec.rs
//
// Still-image codec seam. Corrupted JPEGs can be decoded and written back out
// so the glitch is baked into a file that any decoder accepts.

use crate::error::CrungeError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

type CodecResult<T> = std::result::Result<T, CrungeError>;

pub const DEFAULT_QUALITY: u8 = 90;

pub trait StillImageCodec: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> CodecResult<DynamicImage>;

    /// Encode at `quality` (1..=100, clamped).
    fn encode(&self, image: &DynamicImage, quality: u8) -> CodecResult<Vec<u8>>;

    /// Decode then encode again.
    fn reencode(&self, bytes: &[u8], quality: u8) -> CodecResult<Vec<u8>> {
        let image = self.decode(bytes)?;
        self.encode(&image, quality)
    }
}

/// Baseline JPEG through the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct JpegCodec;

impl StillImageCodec for JpegCodec {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<DynamicImage> {
        image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .map_err(|e| CrungeError::decode_failed(format!("jpeg: {e}")))
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> CodecResult<Vec<u8>> {
        let quality = quality.clamp(1, 100);
        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let mut out = Vec::new();
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
            .map_err(|e| CrungeError::encode_failed("jpeg", e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 200])
        }))
    }

    #[test]
    fn encode_then_decode_keeps_dimensions() {
        let codec = JpegCodec;
        let bytes = codec.encode(&gradient(33, 17), DEFAULT_QUALITY).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (33, 17));
    }

    #[test]
    fn reencode_produces_jpeg() {
        let codec = JpegCodec;
        let bytes = codec.encode(&gradient(16, 16), 0).unwrap();
        let again = codec.reencode(&bytes, 50).unwrap();
        assert_eq!(&again[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = JpegCodec.decode(b"\x00\x01\x02").unwrap_err();
        assert!(matches!(err, CrungeError::DecodeFailed { .. }));
    }
}
