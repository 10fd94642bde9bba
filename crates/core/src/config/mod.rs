use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 22_050;
pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const DEFAULT_RMS_WINDOW_MS: u32 = 300;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;
pub const DEFAULT_INPUT_GAIN_DB: f32 = 24.0;

pub const DBFS_FLOOR: f32 = -96.0;
pub const DBFS_CEIL: f32 = 0.0;
pub const SPL_EST_MIN: f32 = 30.0;
pub const SPL_EST_MAX: f32 = 120.0;
pub const SPL_CAL_REF_DBFS: f32 = -50.9;
pub const SPL_CAL_REF_DB: f32 = 60.0;
pub const DISPLAY_SMOOTH_ALPHA: f32 = 0.15;
pub const INITIAL_SPL: f32 = 50.0;

pub const SPL_THRESHOLD_SLEEPY: f32 = 45.0;
pub const SPL_THRESHOLD_DIZZY: f32 = 60.0;
pub const SPL_HYSTERESIS_DB: f32 = 2.0;

pub const ANIM_FRAME_INTERVAL_MS: u64 = 180;
pub const TEXT_UPDATE_INTERVAL_MS: u64 = 180;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub calibration: CalibrationConfig,
    pub mood: MoodConfig,
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Parses a JSON document. Missing sections keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "loaded configuration file");
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every section for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.calibration.validate()?;
        self.mood.validate()?;
        self.display.validate()?;
        Ok(())
    }
}

/// Capture parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Samples per read; every block handed to the estimator has this length.
    pub block_size: usize,
    pub rms_window_ms: u32,
    pub retry_delay_ms: u64,
    pub input_gain_db: f32,
    /// Input device name for live capture; `None` picks the host default.
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE_HZ,
            block_size: DEFAULT_BLOCK_SIZE,
            rms_window_ms: DEFAULT_RMS_WINDOW_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            input_gain_db: DEFAULT_INPUT_GAIN_DB,
            device: None,
        }
    }
}

impl AudioConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Number of samples that close one RMS window. Never shorter than a
    /// single block, otherwise a short window could never close.
    pub fn window_target_samples(&self) -> usize {
        let configured =
            (self.sample_rate as f64 * self.rms_window_ms as f64 / 1000.0).round() as usize;
        configured.max(self.block_size)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::invalid("audio.sample_rate", "must be greater than 0").into());
        }
        if self.block_size == 0 {
            return Err(ConfigError::invalid("audio.block_size", "must be greater than 0").into());
        }
        if self.rms_window_ms == 0 {
            return Err(
                ConfigError::invalid("audio.rms_window_ms", "must be greater than 0").into(),
            );
        }
        if !self.input_gain_db.is_finite() {
            return Err(ConfigError::invalid("audio.input_gain_db", "must be finite").into());
        }
        Ok(())
    }
}

/// One-point calibration and display smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub ref_dbfs: f32,
    pub ref_spl: f32,
    pub dbfs_floor: f32,
    pub dbfs_ceil: f32,
    pub spl_min: f32,
    pub spl_max: f32,
    pub smoothing_alpha: f32,
    /// Value the shared estimate holds before the first window closes.
    pub initial_spl: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            ref_dbfs: SPL_CAL_REF_DBFS,
            ref_spl: SPL_CAL_REF_DB,
            dbfs_floor: DBFS_FLOOR,
            dbfs_ceil: DBFS_CEIL,
            spl_min: SPL_EST_MIN,
            spl_max: SPL_EST_MAX,
            smoothing_alpha: DISPLAY_SMOOTH_ALPHA,
            initial_spl: INITIAL_SPL,
        }
    }
}

impl CalibrationConfig {
    fn validate(&self) -> Result<()> {
        if self.dbfs_floor >= self.dbfs_ceil {
            return Err(ConfigError::invalid(
                "calibration.dbfs_floor",
                "must be below calibration.dbfs_ceil",
            )
            .into());
        }
        if self.spl_min >= self.spl_max {
            return Err(ConfigError::invalid(
                "calibration.spl_min",
                "must be below calibration.spl_max",
            )
            .into());
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha < 1.0) {
            return Err(ConfigError::invalid(
                "calibration.smoothing_alpha",
                "must lie strictly between 0.0 and 1.0",
            )
            .into());
        }
        Ok(())
    }
}

/// Mood thresholds in dB SPL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    pub sleepy_threshold: f32,
    pub dizzy_threshold: f32,
    pub hysteresis: f32,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            sleepy_threshold: SPL_THRESHOLD_SLEEPY,
            dizzy_threshold: SPL_THRESHOLD_DIZZY,
            hysteresis: SPL_HYSTERESIS_DB,
        }
    }
}

impl MoodConfig {
    fn validate(&self) -> Result<()> {
        if self.hysteresis < 0.0 {
            return Err(ConfigError::invalid("mood.hysteresis", "must not be negative").into());
        }
        // Leaving Sleepy must happen below the point where Dizzy can be left.
        if self.sleepy_threshold + self.hysteresis >= self.dizzy_threshold - self.hysteresis {
            return Err(ConfigError::invalid(
                "mood.sleepy_threshold",
                "hysteresis bands of the sleepy and dizzy thresholds overlap",
            )
            .into());
        }
        Ok(())
    }
}

/// Presentation tick periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub anim_interval_ms: u64,
    pub text_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            anim_interval_ms: ANIM_FRAME_INTERVAL_MS,
            text_interval_ms: TEXT_UPDATE_INTERVAL_MS,
        }
    }
}

impl DisplayConfig {
    pub fn anim_interval(&self) -> Duration {
        Duration::from_millis(self.anim_interval_ms)
    }

    pub fn text_interval(&self) -> Duration {
        Duration::from_millis(self.text_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.anim_interval_ms == 0 {
            return Err(
                ConfigError::invalid("display.anim_interval_ms", "must be greater than 0").into(),
            );
        }
        if self.text_interval_ms == 0 {
            return Err(
                ConfigError::invalid("display.text_interval_ms", "must be greater than 0").into(),
            );
        }
        Ok(())
    }
}
