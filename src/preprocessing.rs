// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for pose inference.
//!
//! Decodes raw bytes, stretches the frame to the model input resolution with a
//! cubic filter and converts it to a normalized NCHW tensor.

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array3, Array4};

use crate::error::{InferenceError, Result};

/// Reciprocal of 255 for normalization.
const INV_255: f32 = 1.0 / 255.0;

/// Decode an encoded image (PNG, JPEG, BMP, `WebP`) from memory.
///
/// # Errors
///
/// Returns [`InferenceError::InvalidImageError`] if the bytes are not a
/// supported image or the image has no pixels.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(InferenceError::InvalidImageError("empty input".to_string()));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|e| InferenceError::InvalidImageError(format!("Failed to decode image: {e}")))?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(InferenceError::InvalidImageError(format!(
            "Image has zero size ({width}x{height})"
        )));
    }
    Ok(image)
}

/// Resize an image to (height, width) without preserving aspect ratio.
///
/// Uses a Catmull-Rom convolution, the cubic filter closest to `INTER_CUBIC`.
///
/// # Errors
///
/// Returns [`InferenceError::InvalidImageError`] if either size is zero or the
/// resize fails.
#[allow(clippy::cast_possible_truncation)]
pub fn resize_image(image: &DynamicImage, target_size: (usize, usize)) -> Result<RgbImage> {
    let (dst_h, dst_w) = (target_size.0 as u32, target_size.1 as u32);
    if dst_h == 0 || dst_w == 0 {
        return Err(InferenceError::InvalidImageError(format!(
            "Target size must be non-zero, got {dst_h}x{dst_w}"
        )));
    }

    let rgb = image.to_rgb8();
    let (src_w, src_h) = rgb.dimensions();
    if (src_w, src_h) == (dst_w, dst_h) {
        return Ok(rgb);
    }

    let src = Image::from_vec_u8(src_w, src_h, rgb.into_raw(), PixelType::U8x3)
        .map_err(|e| InferenceError::InvalidImageError(format!("Invalid source buffer: {e}")))?;
    let mut dst = Image::new(dst_w, dst_h, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom));
    Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(|e| InferenceError::InvalidImageError(format!("Resize failed: {e}")))?;

    RgbImage::from_raw(dst_w, dst_h, dst.into_vec())
        .ok_or_else(|| InferenceError::InvalidImageError("Failed to create image buffer".to_string()))
}

/// Convert an RGB image to a normalized NCHW tensor.
///
/// # Returns
///
/// Array4 with shape (1, 3, H, W) and values in [0, 1].
#[must_use]
pub fn image_to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut tensor = Array4::zeros((1, 3, h, w));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            tensor[[0, c, y, x]] = f32::from(pixel[c]) * INV_255;
        }
    }

    tensor
}

/// Resize and normalize an image for the pose model.
///
/// # Arguments
///
/// * `image` - Source frame.
/// * `input_size` - Model input size as (height, width).
///
/// # Errors
///
/// Returns [`InferenceError::InvalidImageError`] if the frame cannot be resized.
pub fn preprocess_image(image: &DynamicImage, input_size: (usize, usize)) -> Result<Array4<f32>> {
    let resized = resize_image(image, input_size)?;
    Ok(image_to_tensor(&resized))
}

/// Convert a raw HWC RGB buffer into a `DynamicImage`.
///
/// # Errors
///
/// Returns [`InferenceError::InvalidImageError`] if the array is not (H, W, 3).
#[allow(clippy::cast_possible_truncation)]
pub fn array_to_image(pixels: &Array3<u8>) -> Result<DynamicImage> {
    let shape = pixels.shape();
    if shape[2] != 3 {
        return Err(InferenceError::InvalidImageError(format!(
            "Expected 3 channels, got {}",
            shape[2]
        )));
    }
    let (height, width) = (shape[0] as u32, shape[1] as u32);
    let data: Vec<u8> = pixels.iter().copied().collect();
    RgbImage::from_raw(width, height, data)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| InferenceError::InvalidImageError("Failed to create image buffer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([255, 128, 0]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_valid_png() {
        let image = decode_image(&png_bytes(32, 16)).unwrap();
        assert_eq!(image.dimensions(), (32, 16));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(InferenceError::InvalidImageError(_))
        ));
        assert!(matches!(decode_image(&[]), Err(InferenceError::InvalidImageError(_))));
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let image = decode_image(&png_bytes(640, 480)).unwrap();
        let tensor = preprocess_image(&image, (256, 192)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 256, 192]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        // Uniform colour survives the cubic resize.
        assert!((tensor[[0, 0, 100, 100]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 100, 100]] - 128.0 / 255.0).abs() < 1e-2);
        assert!(tensor[[0, 2, 100, 100]].abs() < 1e-6);
    }

    #[test]
    fn test_resize_rejects_zero_target() {
        let image = decode_image(&png_bytes(8, 8)).unwrap();
        assert!(resize_image(&image, (0, 8)).is_err());
    }

    #[test]
    fn test_array_to_image() {
        let pixels = Array3::<u8>::from_elem((4, 6, 3), 7);
        let image = array_to_image(&pixels).unwrap();
        assert_eq!(image.dimensions(), (6, 4));

        let gray = Array3::<u8>::zeros((4, 6, 1));
        assert!(array_to_image(&gray).is_err());
    }
}
