//! Windowed RMS accumulation and dBFS/SPL conversion.

use crate::config::{AudioConfig, CalibrationConfig};

/// Largest magnitude of a signed 16-bit sample.
pub const FULL_SCALE: f64 = 32768.0;

/// Running sum of squares for the RMS window currently being filled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    sum_sq: f64,
    count: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: &[i16]) {
        for &sample in block {
            let s = sample as f64;
            self.sum_sq += s * s;
        }
        self.count += block.len();
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }

    /// Returns the RMS of everything accumulated and starts a new window.
    pub fn close(&mut self) -> f64 {
        let rms = if self.count == 0 {
            0.0
        } else {
            (self.sum_sq / self.count as f64).sqrt()
        };
        *self = Self::default();
        rms
    }
}

/// Immutable one-point calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub ref_dbfs: f32,
    pub ref_spl: f32,
    pub dbfs_floor: f32,
    pub dbfs_ceil: f32,
    pub spl_min: f32,
    pub spl_max: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::from(&CalibrationConfig::default())
    }
}

impl From<&CalibrationConfig> for Calibration {
    fn from(config: &CalibrationConfig) -> Self {
        Self {
            ref_dbfs: config.ref_dbfs,
            ref_spl: config.ref_spl,
            dbfs_floor: config.dbfs_floor,
            dbfs_ceil: config.dbfs_ceil,
            spl_min: config.spl_min,
            spl_max: config.spl_max,
        }
    }
}

impl Calibration {
    /// Fixed dB offset between the digital and acoustic scales.
    pub fn offset(&self) -> f32 {
        self.ref_spl - self.ref_dbfs
    }

    /// Converts an RMS magnitude in sample units to dBFS.
    ///
    /// Anything below one LSB sits under the quantization noise floor and
    /// maps to the floor directly, which also keeps `log10` away from zero.
    pub fn rms_to_dbfs(&self, rms: f64) -> f32 {
        if rms.is_nan() || rms < 1.0 {
            return self.dbfs_floor;
        }

        let dbfs = 20.0 * (rms / FULL_SCALE).log10();
        (dbfs as f32).clamp(self.dbfs_floor, self.dbfs_ceil)
    }

    pub fn dbfs_to_spl(&self, dbfs: f32) -> f32 {
        (dbfs + self.offset()).clamp(self.spl_min, self.spl_max)
    }
}

/// `rms_to_dbfs` with the default calibration.
pub fn rms_to_dbfs(rms: f64) -> f32 {
    Calibration::default().rms_to_dbfs(rms)
}

/// `dbfs_to_spl` with the default calibration.
pub fn dbfs_to_spl(dbfs: f32) -> f32 {
    Calibration::default().dbfs_to_spl(dbfs)
}

/// First-order IIR low-pass step.
pub fn smooth(previous: f32, new_reading: f32, alpha: f32) -> f32 {
    previous + alpha * (new_reading - previous)
}

/// One closed RMS window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    pub rms: f64,
    pub dbfs: f32,
    pub spl: f32,
    /// Display value after folding `spl` into the running average.
    pub smoothed_spl: f32,
}

/// Turns a stream of PCM blocks into periodic calibrated SPL readings.
///
/// The estimator is owned by the capture thread. It keeps the smoothed value
/// itself so the shared store only ever sees finished numbers.
#[derive(Debug, Clone)]
pub struct LevelEstimator {
    calibration: Calibration,
    accumulator: Accumulator,
    target_samples: usize,
    alpha: f32,
    smoothed: f32,
}

impl LevelEstimator {
    pub fn new(audio: &AudioConfig, calibration: &CalibrationConfig) -> Self {
        Self {
            calibration: Calibration::from(calibration),
            accumulator: Accumulator::new(),
            target_samples: audio.window_target_samples(),
            alpha: calibration.smoothing_alpha,
            smoothed: calibration.initial_spl,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn target_samples(&self) -> usize {
        self.target_samples
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn smoothed(&self) -> f32 {
        self.smoothed
    }

    /// Adds a block to the current window. Returns a reading when the block
    /// completes the window.
    pub fn ingest(&mut self, block: &[i16]) -> Option<LevelReading> {
        self.accumulator.push(block);
        if self.accumulator.count() < self.target_samples {
            return None;
        }

        let rms = self.accumulator.close();
        let dbfs = self.calibration.rms_to_dbfs(rms);
        let spl = self.calibration.dbfs_to_spl(dbfs);
        self.smoothed = smooth(self.smoothed, spl, self.alpha);

        Some(LevelReading {
            rms,
            dbfs,
            spl,
            smoothed_spl: self.smoothed,
        })
    }
}
