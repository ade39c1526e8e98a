// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Settings are plain values. The host application may edit them at any
//! time; the pipeline copies them when a capture starts so an edit only takes
//! effect on the next capture.

use crate::constants;
use crate::errors::{EnhanceError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Color processing settings applied to one capture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorProcessingSettings {
    /// Fuse exposure brackets into an HDR result
    pub hdr_enabled: bool,
    /// Apply the simulated wide-gamut vibrancy boost
    pub display_p3_enabled: bool,
    /// Only fuse when the scene actually has clipped shadows or highlights
    pub adaptive_hdr_enabled: bool,
    /// Saturation multiplier (0.5 - 2.0)
    pub saturation_boost: f32,
    /// Shadow lift strength (0.0 - 1.0)
    pub shadow_detail: f32,
    /// Highlight roll-off strength (0.0 - 1.0)
    pub highlight_recovery: f32,
    /// Bilateral noise reduction strength (0.0 - 1.0, 0.0 = off)
    pub noise_reduction: f32,
    /// How strongly skin tones are pulled back to their original color (0.0 - 1.0)
    pub skin_tone_preservation: f32,
}

impl Default for ColorProcessingSettings {
    fn default() -> Self {
        ColorPreset::Natural.settings()
    }
}

impl ColorProcessingSettings {
    /// Reject non-finite values and clamp everything into its documented range
    pub fn sanitized(&self) -> PipelineResult<Self> {
        let fields = [
            ("saturation_boost", self.saturation_boost),
            ("shadow_detail", self.shadow_detail),
            ("highlight_recovery", self.highlight_recovery),
            ("noise_reduction", self.noise_reduction),
            ("skin_tone_preservation", self.skin_tone_preservation),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EnhanceError::invalid(format!("{} is not finite: {}", name, value)));
        }

        Ok(Self {
            saturation_boost: self.saturation_boost.clamp(0.5, 2.0),
            shadow_detail: self.shadow_detail.clamp(0.0, 1.0),
            highlight_recovery: self.highlight_recovery.clamp(0.0, 1.0),
            noise_reduction: self.noise_reduction.clamp(0.0, 1.0),
            skin_tone_preservation: self.skin_tone_preservation.clamp(0.0, 1.0),
            ..*self
        })
    }
}

/// Named bundles of color settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorPreset {
    /// Balanced processing close to the captured scene
    #[default]
    Natural,
    /// Punchy colors and stronger tone curve
    Vivid,
    /// Gentle saturation, strong skin-tone protection and smoothing
    Portrait,
    /// Rich skies and foliage, strong shadow and highlight recovery
    Landscape,
}

impl ColorPreset {
    /// All presets for UI iteration
    pub const ALL: [ColorPreset; 4] = [
        ColorPreset::Natural,
        ColorPreset::Vivid,
        ColorPreset::Portrait,
        ColorPreset::Landscape,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ColorPreset::Natural => "Natural",
            ColorPreset::Vivid => "Vivid",
            ColorPreset::Portrait => "Portrait",
            ColorPreset::Landscape => "Landscape",
        }
    }

    /// Settings bundle for this preset
    pub fn settings(&self) -> ColorProcessingSettings {
        let base = ColorProcessingSettings {
            hdr_enabled: true,
            display_p3_enabled: true,
            adaptive_hdr_enabled: true,
            saturation_boost: 1.1,
            shadow_detail: 0.3,
            highlight_recovery: 0.4,
            noise_reduction: 0.3,
            skin_tone_preservation: 0.6,
        };

        match self {
            ColorPreset::Natural => base,
            ColorPreset::Vivid => ColorProcessingSettings {
                saturation_boost: 1.4,
                shadow_detail: 0.4,
                highlight_recovery: 0.5,
                noise_reduction: 0.2,
                skin_tone_preservation: 0.5,
                ..base
            },
            ColorPreset::Portrait => ColorProcessingSettings {
                saturation_boost: 1.05,
                shadow_detail: 0.35,
                highlight_recovery: 0.4,
                noise_reduction: 0.5,
                skin_tone_preservation: 0.9,
                ..base
            },
            ColorPreset::Landscape => ColorProcessingSettings {
                saturation_boost: 1.3,
                shadow_detail: 0.5,
                highlight_recovery: 0.6,
                noise_reduction: 0.15,
                skin_tone_preservation: 0.3,
                ..base
            },
        }
    }
}

impl std::str::FromStr for ColorPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "natural" => Ok(Self::Natural),
            "vivid" => Ok(Self::Vivid),
            "portrait" => Ok(Self::Portrait),
            "landscape" => Ok(Self::Landscape),
            _ => Err(format!("Unknown preset: {}", s)),
        }
    }
}

/// Capture and pipeline behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames per HDR bracket (1 - 5)
    pub bracket_count: usize,
    /// EV range of the bracket (0.5 - 4.0)
    pub ev_range: f32,
    /// Delay between bracket frames in milliseconds
    pub stabilization_delay_ms: u64,
    /// Use physical lenses for zoom where possible
    pub optical_zoom_enabled: bool,
    /// Crop high-resolution sensors instead of upscaling
    pub high_res_crop_enabled: bool,
    /// Maximum total zoom factor
    pub max_digital_zoom: f32,
    /// Send the final frame to the external super-resolution backend (opt-in)
    pub ai_super_resolution_enabled: bool,
    /// Upscale factor requested from super-resolution
    pub super_resolution_scale: f32,
    /// Bound on the external enhancement call in seconds
    pub external_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bracket_count: constants::DEFAULT_BRACKET_COUNT,
            ev_range: constants::DEFAULT_EV_RANGE,
            stabilization_delay_ms: constants::DEFAULT_STABILIZATION_DELAY.as_millis() as u64,
            optical_zoom_enabled: true,
            high_res_crop_enabled: true,
            max_digital_zoom: constants::DEFAULT_MAX_DIGITAL_ZOOM,
            ai_super_resolution_enabled: false, // Network dependent, opt-in
            super_resolution_scale: constants::DEFAULT_SUPER_RESOLUTION_SCALE,
            external_timeout_secs: constants::DEFAULT_EXTERNAL_TIMEOUT.as_secs(),
        }
    }
}

impl PipelineConfig {
    /// Check values before any hardware interaction
    pub fn validate(&self) -> PipelineResult<()> {
        if !(constants::MIN_BRACKET_COUNT..=constants::MAX_BRACKET_COUNT)
            .contains(&self.bracket_count)
        {
            return Err(EnhanceError::invalid(format!(
                "bracket count must be {}-{}, got {}",
                constants::MIN_BRACKET_COUNT,
                constants::MAX_BRACKET_COUNT,
                self.bracket_count
            )));
        }
        if !(constants::MIN_EV_RANGE..=constants::MAX_EV_RANGE).contains(&self.ev_range) {
            return Err(EnhanceError::invalid(format!(
                "EV range must be {}-{}, got {}",
                constants::MIN_EV_RANGE,
                constants::MAX_EV_RANGE,
                self.ev_range
            )));
        }
        if !self.max_digital_zoom.is_finite() || self.max_digital_zoom < 1.0 {
            return Err(EnhanceError::invalid(format!(
                "max digital zoom must be >= 1.0, got {}",
                self.max_digital_zoom
            )));
        }
        if !(self.super_resolution_scale >= 1.0
            && self.super_resolution_scale <= constants::MAX_SUPER_RESOLUTION_SCALE)
        {
            return Err(EnhanceError::invalid(format!(
                "super-resolution scale must be 1.0-{}, got {}",
                constants::MAX_SUPER_RESOLUTION_SCALE,
                self.super_resolution_scale
            )));
        }
        Ok(())
    }

    pub fn stabilization_delay(&self) -> Duration {
        Duration::from_millis(self.stabilization_delay_ms)
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }
}

/// Persisted configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version
    pub version: u32,
    /// Preset the color settings were last derived from
    pub preset: ColorPreset,
    /// Color settings for the next capture
    pub color: ColorProcessingSettings,
    /// Capture and pipeline behaviour
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: Self::VERSION,
            preset: ColorPreset::default(),
            color: ColorProcessingSettings::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Current schema version
    pub const VERSION: u32 = 1;

    /// Default config file location (`~/.config/camera-enhance/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(constants::APP_NAME).join("config.json"))
    }

    /// Load from a file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;

        if config.version != Self::VERSION {
            warn!(
                found = config.version,
                expected = Self::VERSION,
                "Config version mismatch, missing fields use defaults"
            );
        }
        config.pipeline.validate()?;

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from the default location
    pub fn load() -> PipelineResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Replace the color settings with a preset
    pub fn apply_preset(&mut self, preset: ColorPreset) {
        self.preset = preset;
        self.color = preset.settings();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.ai_super_resolution_enabled);
        assert_eq!(config.bracket_count, 3);
    }

    #[test]
    fn test_validate_rejects_bracket_count() {
        let config = PipelineConfig {
            bracket_count: 6,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EnhanceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_sanitized_clamps_ranges() {
        let settings = ColorProcessingSettings {
            saturation_boost: 5.0,
            noise_reduction: -1.0,
            ..Default::default()
        }
        .sanitized()
        .unwrap();
        assert_eq!(settings.saturation_boost, 2.0);
        assert_eq!(settings.noise_reduction, 0.0);
    }

    #[test]
    fn test_sanitized_rejects_nan() {
        let settings = ColorProcessingSettings {
            shadow_detail: f32::NAN,
            ..Default::default()
        };
        assert!(settings.sanitized().is_err());
    }

    #[test]
    fn test_presets_are_in_range() {
        for preset in ColorPreset::ALL {
            let settings = preset.settings();
            assert_eq!(settings.sanitized().unwrap(), settings, "{:?}", preset);
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"pipeline": {"bracket_count": 5}}"#).unwrap();
        assert_eq!(config.pipeline.bracket_count, 5);
        assert_eq!(config.pipeline.ev_range, constants::DEFAULT_EV_RANGE);
        assert_eq!(config.color, ColorProcessingSettings::default());
    }
}
