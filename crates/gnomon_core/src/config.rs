//! # Configuration
//!
//! TOML-backed settings for one synchronization session. Every field has a
//! default, so an empty document is a valid configuration:
//!
//! ```toml
//! [engine]
//! width = 1280
//! height = 720
//!
//! [tolerances]
//! poll_epsilon = 1e-5
//!
//! [frame]
//! target_fps = 60
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Comparison thresholds used across the sync layer.
///
/// They are deliberately separate: the poll threshold decides whether the
/// render side posts a transform, the pull threshold decides which fields
/// the UI side overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Per-field threshold for engine transform change detection.
    pub poll_epsilon: f32,
    /// Per-field threshold when copying an engine transform into a node.
    pub pull_epsilon: f32,
    /// Ratio returned by scalers for degenerate input.
    pub ratio_fallback: f32,
    /// Lower bound of every derived scale component.
    pub min_scale: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            poll_epsilon: 1e-5,
            pull_epsilon: 1e-6,
            ratio_fallback: 1.0,
            min_scale: 1e-4,
        }
    }
}

impl Tolerances {
    /// Checks every threshold is finite and positive.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTolerance`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        let fields = [
            ("poll_epsilon", self.poll_epsilon),
            ("pull_epsilon", self.pull_epsilon),
            ("ratio_fallback", self.ratio_fallback),
            ("min_scale", self.min_scale),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidTolerance { name, value });
            }
        }
        Ok(())
    }
}

/// Engine creation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial viewport width in pixels.
    pub width: u32,
    /// Initial viewport height in pixels.
    pub height: u32,
    /// Requested graphics context major version.
    pub gl_major: u8,
    /// Requested graphics context minor version.
    pub gl_minor: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            gl_major: 3,
            gl_minor: 3,
        }
    }
}

impl EngineConfig {
    /// Checks the viewport is non-empty and the context version plausible.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEngine`] describing the problem.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidEngine(format!(
                "viewport {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.gl_major < 3 {
            return Err(ConfigError::InvalidEngine(format!(
                "context {}.{} is below 3.0",
                self.gl_major, self.gl_minor
            )));
        }
        Ok(())
    }
}

/// Render thread pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Frames per second the render thread aims for when frames are
    /// requested back to back.
    pub target_fps: u32,
    /// How long an idle render thread sleeps before checking for a frame
    /// request again, in milliseconds.
    pub idle_wait_ms: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            idle_wait_ms: 50,
        }
    }
}

impl FrameConfig {
    /// Target duration of one frame. Zero fps means unpaced.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        if self.target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / self.target_fps
        }
    }

    /// Idle wait as a duration.
    #[must_use]
    pub const fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GnomonConfig {
    /// Engine creation settings.
    pub engine: EngineConfig,
    /// Comparison thresholds.
    pub tolerances: Tolerances,
    /// Render thread pacing.
    pub frame: FrameConfig,
}

impl GnomonConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Parse or validation errors.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// I/O, parse, or validation errors.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// The first validation failure.
    pub fn validate(&self) -> ConfigResult<()> {
        self.engine.validate()?;
        self.tolerances.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = GnomonConfig::from_toml_str("").unwrap();
        assert_eq!(config, GnomonConfig::default());
        assert!((config.tolerances.poll_epsilon - 1e-5).abs() < f32::EPSILON);
        assert!((config.tolerances.pull_epsilon - 1e-6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_override() {
        let config = GnomonConfig::from_toml_str(
            "[engine]\nwidth = 640\n\n[tolerances]\nmin_scale = 0.001\n",
        )
        .unwrap();
        assert_eq!(config.engine.width, 640);
        assert_eq!(config.engine.height, 720);
        assert!((config.tolerances.min_scale - 0.001).abs() < f32::EPSILON);
        assert!((config.tolerances.ratio_fallback - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rejects_bad_tolerance() {
        let err = GnomonConfig::from_toml_str("[tolerances]\npoll_epsilon = -1.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidTolerance {
                name: "poll_epsilon",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_empty_viewport() {
        let err = GnomonConfig::from_toml_str("[engine]\nheight = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEngine(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = GnomonConfig::from_toml_str("[engine\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_frame_budget() {
        let frame = FrameConfig::default();
        assert_eq!(frame.frame_budget(), Duration::from_secs(1) / 60);
        let unpaced = FrameConfig {
            target_fps: 0,
            ..FrameConfig::default()
        };
        assert_eq!(unpaced.frame_budget(), Duration::ZERO);
    }
}
