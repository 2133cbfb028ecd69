//! Persistence of captured images to shared media storage.

pub mod media_store;

pub use media_store::{
    DirectoryMediaStore, MediaRecord, MediaStore, PendingEntry, StorageError,
    SCREENSHOTS_RELATIVE_PATH,
};

use crate::burst::CapturedImage;
use chrono::{Local, TimeZone};
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use skusho_common::ImageFormat;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Encoding options for one save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub format: ImageFormat,
    /// 1-100, JPEG only
    pub quality: u8,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: 100,
        }
    }
}

/// Screenshot file name for a capture timestamp and optional sequence.
///
/// `Screenshot_yyyyMMdd_HHmmss_SSS[_NN].<ext>` in local time.
pub fn screenshot_file_name(
    capture_timestamp_ms: i64,
    sequence: Option<u32>,
    format: ImageFormat,
) -> String {
    let stamp = match Local.timestamp_millis_opt(capture_timestamp_ms).single() {
        Some(time) => time.format("%Y%m%d_%H%M%S_%3f").to_string(),
        None => capture_timestamp_ms.to_string(),
    };

    match sequence {
        Some(seq) => format!("Screenshot_{}_{:02}.{}", stamp, seq, format.extension()),
        None => format!("Screenshot_{}.{}", stamp, format.extension()),
    }
}

/// Aggregate result of saving one burst.
#[derive(Debug, Default)]
pub struct SaveSummary {
    /// Shots the burst asked for
    pub requested: usize,
    /// Final locations in save order
    pub saved: Vec<PathBuf>,
    pub failures: Vec<StorageError>,
}

impl SaveSummary {
    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }
}

impl fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "saved {} of {}", self.saved.len(), self.requested)
    }
}

fn encode(
    image: &CapturedImage,
    options: SaveOptions,
    writer: &mut dyn Write,
) -> Result<(), StorageError> {
    let (width, height) = image.image.dimensions();
    match options.format {
        ImageFormat::Png => PngEncoder::new(&mut *writer)
            .write_image(image.image.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| StorageError::Encode(e.to_string()))?,
        ImageFormat::Jpeg => {
            let rgb: RgbImage = image.image.convert();
            JpegEncoder::new_with_quality(&mut *writer, options.quality.clamp(1, 100))
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| StorageError::Encode(e.to_string()))?
        }
    }
    writer
        .flush()
        .map_err(|e| StorageError::Write(e.to_string()))
}

/// Writes captured images through a [`MediaStore`].
#[derive(Clone)]
pub struct PersistencePipeline {
    store: Arc<dyn MediaStore>,
}

impl PersistencePipeline {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }

    /// Save one image. The reserved entry is deleted on any failure after
    /// it was created.
    pub fn save(&self, image: &CapturedImage, options: SaveOptions) -> Result<PathBuf, StorageError> {
        let record = MediaRecord {
            display_name: screenshot_file_name(
                image.capture_timestamp_ms,
                image.sequence,
                options.format,
            ),
            mime_type: options.format.mime_type(),
            relative_path: SCREENSHOTS_RELATIVE_PATH.to_string(),
            date_taken_ms: image.taken_at_ms(),
            width: image.image.width(),
            height: image.image.height(),
            is_pending: true,
        };

        let entry = self.store.insert_pending(record)?;

        let written = self.store.open_writer(&entry).and_then(|mut writer| {
            encode(image, options, writer.as_mut())
        });
        if let Err(e) = written {
            self.store.delete(&entry);
            return Err(e);
        }

        match self.store.publish(&entry) {
            Ok(location) => Ok(location),
            Err(e) => {
                self.store.delete(&entry);
                Err(e)
            }
        }
    }

    /// Save a burst's images one after another in sequence order.
    ///
    /// `requested` is the burst's shot count, the N in "saved K of N".
    pub fn save_burst(
        &self,
        mut images: Vec<CapturedImage>,
        requested: usize,
        options: SaveOptions,
    ) -> SaveSummary {
        images.sort_by_key(|image| image.sequence);

        let mut summary = SaveSummary {
            requested,
            ..SaveSummary::default()
        };

        for image in images {
            match self.save(&image, options) {
                Ok(location) => {
                    info!("Saved screenshot {:?}", location);
                    summary.saved.push(location);
                }
                Err(e) => {
                    warn!(
                        "Failed to save screenshot (sequence {:?}): {}",
                        image.sequence, e
                    );
                    summary.failures.push(e);
                }
            }
        }

        info!("Burst persisted: {}", summary);
        summary
    }
}
