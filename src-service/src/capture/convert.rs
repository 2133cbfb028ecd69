//! Raw frame to image conversion.

use super::error::CaptureError;
use super::types::RawFrame;
use image::RgbaImage;

/// Convert a raw RGBA frame into an image of exactly `width` x `height`.
///
/// Mirror buffers can be wider than the display: each row may carry
/// padding past `width * pixel_stride` bytes. Rows are copied one by one
/// and cropped to the true display width.
pub fn frame_to_image(frame: &RawFrame, width: u32, height: u32) -> Result<RgbaImage, CaptureError> {
    if frame.pixel_stride != 4 {
        return Err(CaptureError::Conversion(format!(
            "unsupported pixel stride {} (expected 4)",
            frame.pixel_stride
        )));
    }
    if width == 0 || height == 0 {
        return Err(CaptureError::Conversion("empty target size".to_string()));
    }
    if frame.width < width || frame.height < height {
        return Err(CaptureError::Conversion(format!(
            "frame {}x{} smaller than display {}x{}",
            frame.width, frame.height, width, height
        )));
    }

    let row_bytes = width as usize * 4;
    let row_stride = frame.row_stride as usize;
    if row_stride < row_bytes {
        return Err(CaptureError::Conversion(format!(
            "row stride {} shorter than {} bytes per row",
            row_stride, row_bytes
        )));
    }

    let required = row_stride * (height as usize - 1) + row_bytes;
    if frame.data.len() < required {
        return Err(CaptureError::Conversion(format!(
            "buffer too small: expected at least {} bytes, got {}",
            required,
            frame.data.len()
        )));
    }

    let pixels = if row_stride == row_bytes {
        frame.data[..row_bytes * height as usize].to_vec()
    } else {
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in frame.data.chunks(row_stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }
        pixels
    };

    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| CaptureError::Conversion("failed to create image buffer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_frame_converts_directly() {
        let data: Vec<u8> = (0..2 * 2 * 4).map(|i| i as u8).collect();
        let frame = RawFrame::packed(2, 2, data.clone());

        let image = frame_to_image(&frame, 2, 2).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.as_raw(), &data);
    }

    #[test]
    fn test_row_padding_is_cropped() {
        // 2x2 image, each row padded with one extra pixel of 0xEE.
        let mut data = Vec::new();
        for row in 0..2u8 {
            data.extend_from_slice(&[row, 0, 0, 255, row, 1, 0, 255]);
            data.extend_from_slice(&[0xEE; 4]);
        }
        let frame = RawFrame {
            width: 2,
            height: 2,
            pixel_stride: 4,
            row_stride: 12,
            data,
        };

        let image = frame_to_image(&frame, 2, 2).unwrap();
        assert_eq!(image.get_pixel(1, 0).0, [0, 1, 0, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [1, 0, 0, 255]);
        assert!(!image.as_raw().contains(&0xEE));
    }

    #[test]
    fn test_last_row_may_omit_padding() {
        let mut data = vec![7u8; 12];
        data.extend_from_slice(&[9u8; 8]);
        let frame = RawFrame {
            width: 2,
            height: 2,
            pixel_stride: 4,
            row_stride: 12,
            data,
        };
        let image = frame_to_image(&frame, 2, 2).unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [9, 9, 9, 9]);
    }

    #[test]
    fn test_wider_frame_cropped_to_display() {
        let frame = RawFrame::packed(4, 1, vec![1u8; 16]);
        let image = frame_to_image(&frame, 3, 1).unwrap();
        assert_eq!(image.dimensions(), (3, 1));
    }

    #[test]
    fn test_bad_layouts_rejected() {
        let rgb = RawFrame {
            width: 1,
            height: 1,
            pixel_stride: 3,
            row_stride: 3,
            data: vec![0; 3],
        };
        assert!(matches!(
            frame_to_image(&rgb, 1, 1),
            Err(CaptureError::Conversion(_))
        ));

        let short = RawFrame::packed(2, 2, vec![0; 10]);
        assert!(frame_to_image(&short, 2, 2).is_err());

        let small = RawFrame::packed(1, 1, vec![0; 4]);
        assert!(frame_to_image(&small, 2, 2).is_err());
    }
}
