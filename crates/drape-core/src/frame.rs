//! BGR image buffer with decoding, cropping, channel means and bilinear resize.
//!
//! Every stage works on B, G, R interleaved pixels. Decoded input is
//! converted to that order once, in [`BgrImage::decode`] / [`BgrImage::from_rgb`],
//! and never reordered again.

use crate::types::{AverageColorSample, FaceBox};
use image::{Rgb, RgbImage};
use thiserror::Error;

pub const CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("image dimensions are zero")]
    ZeroDimensions,
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error(
        "region {x},{y} {width}x{height} exceeds image bounds {image_width}x{image_height}"
    )]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },
}

/// An immutable 8-bit, 3-channel image in B, G, R order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl BgrImage {
    /// Wrap raw interleaved BGR bytes (`width * height * 3`).
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::ZeroDimensions);
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(ImageError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// A `width` × `height` image where every pixel is `bgr`.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Result<Self, ImageError> {
        let data = bgr
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::from_raw(width, height, data)
    }

    /// Decode any format the `image` crate understands into BGR.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
        Self::from_rgb(&decoded.to_rgb8())
    }

    /// Convert an RGB buffer to BGR.
    pub fn from_rgb(rgb: &RgbImage) -> Result<Self, ImageError> {
        let mut data = Vec::with_capacity(rgb.as_raw().len());
        for px in rgb.pixels() {
            let Rgb([r, g, b]) = *px;
            data.extend_from_slice(&[b, g, r]);
        }
        Self::from_raw(rgb.width(), rgb.height(), data)
    }

    /// Copy into an RGB buffer for display or encoding.
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let [b, g, r] = self.pixel(x, y);
            Rgb([r, g, b])
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// BGR triple at (x, y). Panics when out of range.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let off = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [self.data[off], self.data[off + 1], self.data[off + 2]]
    }

    /// Copy out the region covered by `face`.
    pub fn crop(&self, face: &FaceBox) -> Result<BgrImage, ImageError> {
        if face.width == 0 || face.height == 0 || !face.fits_within(self.width, self.height) {
            return Err(ImageError::OutOfBounds {
                x: face.x,
                y: face.y,
                width: face.width,
                height: face.height,
                image_width: self.width,
                image_height: self.height,
            });
        }

        let w = self.width as usize;
        let row_len = face.width as usize * CHANNELS;
        let mut data = Vec::with_capacity(row_len * face.height as usize);
        for y in face.y..face.bottom() {
            let start = (y as usize * w + face.x as usize) * CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Ok(BgrImage {
            data,
            width: face.width,
            height: face.height,
        })
    }

    /// Mean of each channel over the whole image.
    pub fn channel_means(&self) -> AverageColorSample {
        let mut sums = [0u64; CHANNELS];
        for px in self.data.chunks_exact(CHANNELS) {
            for c in 0..CHANNELS {
                sums[c] += px[c] as u64;
            }
        }
        let n = (self.width as u64 * self.height as u64) as f64;
        AverageColorSample::new(sums[0] as f64 / n, sums[1] as f64 / n, sums[2] as f64 / n)
    }

    /// Resize with bilinear interpolation on half-pixel centers.
    ///
    /// Source coordinates left of / above the first pixel center clamp to
    /// it, so edges are not blended with a phantom row.
    pub fn resize_bilinear(&self, new_w: u32, new_h: u32) -> BgrImage {
        let (src_w, src_h) = (self.width as usize, self.height as usize);
        let (dst_w, dst_h) = (new_w.max(1) as usize, new_h.max(1) as usize);
        if (src_w, src_h) == (dst_w, dst_h) {
            return self.clone();
        }

        let inv_scale_x = src_w as f32 / dst_w as f32;
        let inv_scale_y = src_h as f32 / dst_h as f32;
        let mut resized = vec![0u8; dst_w * dst_h * CHANNELS];

        for y in 0..dst_h {
            let src_y = ((y as f32 + 0.5) * inv_scale_y - 0.5).max(0.0);
            let y0 = (src_y.floor() as usize).min(src_h - 1);
            let y1 = (y0 + 1).min(src_h - 1);
            let fy = (src_y - y0 as f32).clamp(0.0, 1.0);

            for x in 0..dst_w {
                let src_x = ((x as f32 + 0.5) * inv_scale_x - 0.5).max(0.0);
                let x0 = (src_x.floor() as usize).min(src_w - 1);
                let x1 = (x0 + 1).min(src_w - 1);
                let fx = (src_x - x0 as f32).clamp(0.0, 1.0);

                let tl = (y0 * src_w + x0) * CHANNELS;
                let tr = (y0 * src_w + x1) * CHANNELS;
                let bl = (y1 * src_w + x0) * CHANNELS;
                let br = (y1 * src_w + x1) * CHANNELS;
                let out = (y * dst_w + x) * CHANNELS;

                for c in 0..CHANNELS {
                    let val = self.data[tl + c] as f32 * (1.0 - fx) * (1.0 - fy)
                        + self.data[tr + c] as f32 * fx * (1.0 - fy)
                        + self.data[bl + c] as f32 * (1.0 - fx) * fy
                        + self.data[br + c] as f32 * fx * fy;
                    resized[out + c] = val.round().clamp(0.0, 255.0) as u8;
                }
            }
        }

        BgrImage {
            data: resized,
            width: dst_w as u32,
            height: dst_h as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: u32, y: u32, w: u32, h: u32) -> FaceBox {
        FaceBox { x, y, width: w, height: h, confidence: 1.0 }
    }

    /// 4x2 image whose pixel (x, y) is [x, y, x + y].
    fn gradient() -> BgrImage {
        let mut data = Vec::new();
        for y in 0..2u8 {
            for x in 0..4u8 {
                data.extend_from_slice(&[x, y, x + y]);
            }
        }
        BgrImage::from_raw(4, 2, data).unwrap()
    }

    #[test]
    fn test_from_raw_rejects_bad_length() {
        let result = BgrImage::from_raw(2, 2, vec![0; 11]);
        assert!(matches!(
            result,
            Err(ImageError::InvalidLength { expected: 12, actual: 11 })
        ));
    }

    #[test]
    fn test_from_raw_rejects_zero_dimensions() {
        assert!(matches!(
            BgrImage::from_raw(0, 5, vec![]),
            Err(ImageError::ZeroDimensions)
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = BgrImage::decode(b"definitely not an image");
        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_decode_png_swaps_to_bgr() {
        let rgb = RgbImage::from_pixel(3, 2, Rgb([200, 100, 10]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(rgb)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let img = BgrImage::decode(&png).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        assert_eq!(img.pixel(2, 1), [10, 100, 200]);
    }

    #[test]
    fn test_rgb_roundtrip_preserves_pixels() {
        let img = gradient();
        let back = BgrImage::from_rgb(&img.to_rgb()).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_crop_copies_region() {
        let img = gradient();
        let crop = img.crop(&face(1, 1, 2, 1)).unwrap();
        assert_eq!((crop.width(), crop.height()), (2, 1));
        assert_eq!(crop.pixel(0, 0), [1, 1, 2]);
        assert_eq!(crop.pixel(1, 0), [2, 1, 3]);
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let img = gradient();
        assert!(matches!(
            img.crop(&face(3, 0, 2, 1)),
            Err(ImageError::OutOfBounds { .. })
        ));
        assert!(img.crop(&face(0, 0, 0, 1)).is_err());
    }

    #[test]
    fn test_channel_means() {
        let means = gradient().channel_means();
        assert!((means.b - 1.5).abs() < 1e-9);
        assert!((means.g - 0.5).abs() < 1e-9);
        assert!((means.r - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_bilinear_resize_uniform() {
        // Uniform input stays uniform in both directions
        let img = BgrImage::filled(100, 60, [128, 64, 32]).unwrap();
        for (w, h) in [(300, 300), (17, 9)] {
            let resized = img.resize_bilinear(w, h);
            assert_eq!((resized.width(), resized.height()), (w, h));
            assert!(
                resized.as_raw().chunks_exact(3).all(|p| p == [128, 64, 32]),
                "uniform resize to {w}x{h} should stay uniform"
            );
        }
    }

    #[test]
    fn test_bilinear_resize_upscale_interpolates() {
        let data = vec![0, 0, 0, 200, 200, 200];
        let img = BgrImage::from_raw(2, 1, data).unwrap();
        let resized = img.resize_bilinear(4, 1);
        // Outer pixels clamp to the source edges, inner ones blend.
        assert_eq!(resized.pixel(0, 0), [0, 0, 0]);
        assert_eq!(resized.pixel(1, 0), [50, 50, 50]);
        assert_eq!(resized.pixel(2, 0), [150, 150, 150]);
        assert_eq!(resized.pixel(3, 0), [200, 200, 200]);
    }
}
