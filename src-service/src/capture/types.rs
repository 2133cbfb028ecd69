//! Runtime types for screen mirroring (service-internal).
//!
//! These types never cross the IPC boundary. For serializable types,
//! see skusho-common.

/// Baseline density for density-independent pixels (1 dp == 1 px at 160 dpi).
pub const BASELINE_DENSITY_DPI: u32 = 160;

/// Display geometry a frame sink is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayBounds {
    /// Width in physical pixels
    pub width: u32,
    /// Height in physical pixels
    pub height: u32,
    /// Density in dots per inch
    pub density_dpi: u32,
}

impl DisplayBounds {
    pub fn new(width: u32, height: u32, density_dpi: u32) -> Self {
        Self {
            width,
            height,
            density_dpi,
        }
    }

    /// Convert density-independent pixels to physical pixels.
    pub fn dp_to_px(&self, dp: f32) -> f32 {
        dp * self.density_dpi as f32 / BASELINE_DENSITY_DPI as f32
    }
}

/// One-time mirroring consent handed over by the system dialog.
#[derive(Clone, PartialEq, Eq)]
pub struct ConsentToken(String);

impl ConsentToken {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for ConsentToken {
    // The payload is a credential; keep it out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConsentToken({} bytes)", self.0.len())
    }
}

/// A raw RGBA frame as delivered by the mirrored display.
///
/// Rows may be padded: `row_stride` can exceed `width * pixel_stride`.
#[derive(Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel
    pub pixel_stride: u32,
    /// Bytes per row, including padding
    pub row_stride: u32,
    /// RGBA pixel data, `row_stride * height` bytes
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Build a tightly packed RGBA frame.
    pub fn packed(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixel_stride: 4,
            row_stride: width * 4,
            data,
        }
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_stride", &self.pixel_stride)
            .field("row_stride", &self.row_stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}
