//! Settings and feature flags for the capture service.
//!
//! Settings live in `settings.json` in the platform config directory:
//! - Linux: `~/.config/skusho/settings.json`
//! - macOS: `~/Library/Application Support/skusho/settings.json`
//! - Windows: `%APPDATA%\skusho\settings.json`
//!
//! A missing or unreadable file means defaults.

use crate::burst::{BurstConfig, DEFAULT_INTERVAL_MS, MAX_SHOTS};
use crate::capture::DisplayBounds;
use crate::overlay::gesture::Position;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use skusho_common::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Intervals the settings screen offers.
pub const SUPPORTED_INTERVALS_MS: [u64; 3] = [500, 750, 1000];

/// How long one completed reward unlocks capture.
pub const UNLOCK_GRANT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Date from which ads are required when no flag says otherwise.
pub const DEFAULT_AD_REQUIRED_FROM: &str = "2025-12-01T00:00:00Z";

/// Capture preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shots per trigger, 0 meaning a single shot
    pub continuous_shot_count: u32,
    /// Delay between shots of one burst
    pub continuous_shot_interval_ms: u64,
    pub image_format: ImageFormat,
    /// Encoder quality, 1-100. Only JPEG uses it.
    pub image_quality: u8,
    /// End of the unlock window in epoch ms, 0 when locked
    pub capture_unlock_expiry_ms: i64,
    /// Where the control was last snapped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_position: Option<Position>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            continuous_shot_count: 0,
            continuous_shot_interval_ms: DEFAULT_INTERVAL_MS,
            image_format: ImageFormat::Png,
            image_quality: 100,
            capture_unlock_expiry_ms: 0,
            overlay_position: None,
        }
    }
}

impl Settings {
    /// Clamp every field into its supported range.
    pub fn normalized(mut self) -> Self {
        self.continuous_shot_count = self.continuous_shot_count.min(MAX_SHOTS);
        if !SUPPORTED_INTERVALS_MS.contains(&self.continuous_shot_interval_ms) {
            self.continuous_shot_interval_ms = DEFAULT_INTERVAL_MS;
        }
        self.image_quality = self.image_quality.clamp(1, 100);
        if self.capture_unlock_expiry_ms < 0 {
            self.capture_unlock_expiry_ms = 0;
        }
        self
    }
}

/// Remote-config style switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagsConfig {
    /// Disables the unlock requirement entirely
    pub ad_free_mode_enabled: bool,
    /// RFC 3339 instant from which the unlock requirement applies
    pub ad_required_from: String,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            ad_free_mode_enabled: false,
            ad_required_from: DEFAULT_AD_REQUIRED_FROM.to_string(),
        }
    }
}

impl FlagsConfig {
    /// Whether capture needs an unlock at `now`. An unparsable start date
    /// counts as already started.
    pub fn is_ad_required_at(&self, now: DateTime<Utc>) -> bool {
        if self.ad_free_mode_enabled {
            return false;
        }
        match DateTime::parse_from_rfc3339(&self.ad_required_from) {
            Ok(from) => now >= from.with_timezone(&Utc),
            Err(e) => {
                debug!(
                    "Invalid ad_required_from {:?} ({}), treating as required",
                    self.ad_required_from, e
                );
                true
            }
        }
    }
}

/// On-disk layout of `settings.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(flatten)]
    pub settings: Settings,
    #[serde(default)]
    pub flags: FlagsConfig,
}

/// Read access to preferences plus the two values the service writes back.
pub trait SettingsStore: Send + Sync {
    /// Current preferences, normalized.
    fn settings(&self) -> Settings;

    fn unlock_expiry_ms(&self) -> i64 {
        self.settings().capture_unlock_expiry_ms
    }

    fn set_unlock_expiry_ms(&self, expiry_ms: i64);

    fn set_overlay_position(&self, position: Position);
}

/// Whether the unlock requirement is in force.
pub trait FeatureFlags: Send + Sync {
    fn is_ad_required(&self) -> bool;
}

/// Get the path to the settings file.
pub fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "skusho").map(|dirs| dirs.config_dir().join("settings.json"))
}

/// Load the settings file, falling back to defaults.
pub fn load_settings_file(path: &Path) -> SettingsFile {
    if !path.exists() {
        info!("No settings file at {:?}, using defaults", path);
        return SettingsFile::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<SettingsFile>(&contents) {
            Ok(file) => {
                info!("Loaded settings from {:?}", path);
                file
            }
            Err(e) => {
                warn!("Failed to parse settings file: {}. Using defaults.", e);
                SettingsFile::default()
            }
        },
        Err(e) => {
            warn!("Failed to read settings file: {}. Using defaults.", e);
            SettingsFile::default()
        }
    }
}

/// Write the settings file, creating its directory if needed.
pub fn save_settings_file(path: &Path, file: &SettingsFile) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let json = serde_json::to_string_pretty(file)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to write settings file: {}", e))?;

    debug!("Saved settings to {:?}", path);
    Ok(())
}

/// [`SettingsStore`] backed by `settings.json`.
///
/// Writes go to memory first and are then flushed to disk; a failed flush
/// is logged and the in-memory value stays authoritative.
pub struct JsonSettingsStore {
    path: Option<PathBuf>,
    file: RwLock<SettingsFile>,
}

impl JsonSettingsStore {
    /// Load from the platform settings path.
    pub fn load_default() -> Self {
        match settings_path() {
            Some(path) => Self::load(path),
            None => {
                warn!("Could not determine config directory, settings will not persist");
                Self::in_memory(SettingsFile::default())
            }
        }
    }

    pub fn load(path: PathBuf) -> Self {
        let file = load_settings_file(&path);
        Self {
            path: Some(path),
            file: RwLock::new(file),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory(file: SettingsFile) -> Self {
        Self {
            path: None,
            file: RwLock::new(file),
        }
    }

    /// Feature flags from the same file.
    pub fn flags(&self) -> FlagsConfig {
        self.read().flags.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, SettingsFile> {
        self.file.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SettingsFile> {
        self.file.write().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut Settings)) {
        let snapshot = {
            let mut file = self.write();
            f(&mut file.settings);
            file.clone()
        };

        if let Some(path) = &self.path {
            if let Err(e) = save_settings_file(path, &snapshot) {
                warn!("{}", e);
            }
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn settings(&self) -> Settings {
        self.read().settings.clone().normalized()
    }

    fn set_unlock_expiry_ms(&self, expiry_ms: i64) {
        self.update(|s| s.capture_unlock_expiry_ms = expiry_ms.max(0));
    }

    fn set_overlay_position(&self, position: Position) {
        self.update(|s| s.overlay_position = Some(position));
    }
}

/// [`FeatureFlags`] evaluated from [`FlagsConfig`] against wall time.
pub struct ConfigFeatureFlags {
    config: FlagsConfig,
}

impl ConfigFeatureFlags {
    pub fn new(config: FlagsConfig) -> Self {
        Self { config }
    }
}

impl FeatureFlags for ConfigFeatureFlags {
    fn is_ad_required(&self) -> bool {
        self.config.is_ad_required_at(Utc::now())
    }
}

/// Service tunables that are not user preferences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceConfig {
    pub burst: BurstConfig,
    /// Upper bound on how long the unlock gate sleeps between checks
    pub gate_poll_interval: Duration,
    /// Display geometry used when the platform reports none
    pub fallback_bounds: DisplayBounds,
    /// Size of the floating control in dp
    pub control_size_dp: f32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            burst: BurstConfig::default(),
            gate_poll_interval: Duration::from_millis(1000),
            fallback_bounds: DisplayBounds::new(1920, 1080, 160),
            control_size_dp: 56.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.continuous_shot_count, 0);
        assert_eq!(settings.continuous_shot_interval_ms, 500);
        assert_eq!(settings.image_format, ImageFormat::Png);
        assert_eq!(settings.image_quality, 100);
        assert_eq!(settings.capture_unlock_expiry_ms, 0);
        assert!(settings.overlay_position.is_none());
    }

    #[test]
    fn test_normalized_clamps_ranges() {
        let settings = Settings {
            continuous_shot_count: 12,
            continuous_shot_interval_ms: 600,
            image_quality: 0,
            capture_unlock_expiry_ms: -5,
            ..Settings::default()
        }
        .normalized();

        assert_eq!(settings.continuous_shot_count, 5);
        assert_eq!(settings.continuous_shot_interval_ms, 500);
        assert_eq!(settings.image_quality, 1);
        assert_eq!(settings.capture_unlock_expiry_ms, 0);

        let kept = Settings {
            continuous_shot_interval_ms: 750,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(kept.continuous_shot_interval_ms, 750);
    }

    #[test]
    fn test_settings_file_backward_compatible() {
        // Older files have no flags group and only some fields
        let json = r#"{"continuous_shot_count": 3, "image_format": "jpeg"}"#;
        let parsed: SettingsFile = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.settings.continuous_shot_count, 3);
        assert_eq!(parsed.settings.image_format, ImageFormat::Jpeg);
        assert_eq!(parsed.settings.continuous_shot_interval_ms, 500);
        assert_eq!(parsed.flags, FlagsConfig::default());
    }

    #[test]
    fn test_settings_file_serialization() {
        let mut file = SettingsFile::default();
        file.settings.overlay_position = Some(Position::new(930, 400));
        file.flags.ad_free_mode_enabled = true;

        let json = serde_json::to_string(&file).unwrap();
        let parsed: SettingsFile = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, file);
        assert!(json.contains("\"flags\""));
    }

    #[test]
    fn test_position_not_serialized_when_unset() {
        let json = serde_json::to_string(&SettingsFile::default()).unwrap();
        assert!(!json.contains("overlay_position"));
    }

    #[test]
    fn test_ad_required_after_start_date() {
        let flags = FlagsConfig::default();
        let before = Utc.with_ymd_and_hms(2025, 11, 30, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();

        assert!(!flags.is_ad_required_at(before));
        assert!(flags.is_ad_required_at(after));
    }

    #[test]
    fn test_ad_free_mode_disables_requirement() {
        let flags = FlagsConfig {
            ad_free_mode_enabled: true,
            ..FlagsConfig::default()
        };
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert!(!flags.is_ad_required_at(now));
    }

    #[test]
    fn test_invalid_start_date_means_required() {
        let flags = FlagsConfig {
            ad_free_mode_enabled: false,
            ad_required_from: "someday".to_string(),
        };
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(flags.is_ad_required_at(now));
    }

    #[test]
    fn test_json_store_persists_writes() {
        let dir = std::env::temp_dir().join(format!("skusho-config-test-{}", std::process::id()));
        let path = dir.join("settings.json");
        let _ = fs::remove_dir_all(&dir);

        let store = JsonSettingsStore::load(path.clone());
        assert_eq!(store.unlock_expiry_ms(), 0);

        store.set_unlock_expiry_ms(1_234);
        store.set_overlay_position(Position::new(0, 400));

        let reloaded = JsonSettingsStore::load(path);
        assert_eq!(reloaded.unlock_expiry_ms(), 1_234);
        assert_eq!(
            reloaded.settings().overlay_position,
            Some(Position::new(0, 400))
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_uppercase_image_format_keeps_other_settings() {
        let dir = std::env::temp_dir().join(format!("skusho-config-upper-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        fs::write(
            &path,
            r#"{"image_format":"JPEG","continuous_shot_count":3,"capture_unlock_expiry_ms":99999999999999}"#,
        )
        .unwrap();

        let store = JsonSettingsStore::load(path);
        let settings = store.settings();
        assert_eq!(settings.image_format, ImageFormat::Jpeg);
        assert_eq!(settings.continuous_shot_count, 3);
        assert_eq!(store.unlock_expiry_ms(), 99_999_999_999_999);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_file_uses_defaults() {
        let dir = std::env::temp_dir().join(format!("skusho-config-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonSettingsStore::load(path);
        assert_eq!(store.settings(), Settings::default());

        let _ = fs::remove_dir_all(&dir);
    }
}
