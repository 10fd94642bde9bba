//! Deterministic test-tone source that walks through a script of levels.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::{Pacer, SampleSource};
use crate::config::AudioConfig;
use crate::error::CaptureError;
use crate::level::FULL_SCALE;

const TONE_HZ: f64 = 440.0;

/// Hold a tone at `dbfs` (RMS) for `seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSegment {
    pub seconds: f32,
    pub dbfs: f32,
}

impl LevelSegment {
    pub fn new(seconds: f32, dbfs: f32) -> Self {
        Self { seconds, dbfs }
    }
}

/// Sine generator following a looping level script.
///
/// When paced, each read blocks for the block's real-time duration, like a
/// microphone would.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    script: Vec<LevelSegment>,
    paced: bool,
    sample_rate: u32,
    position: u64,
    phase: f64,
    pacer: Pacer,
}

impl SyntheticSource {
    pub fn new(script: Vec<LevelSegment>) -> Self {
        Self {
            script,
            paced: true,
            sample_rate: 0,
            position: 0,
            phase: 0.0,
            pacer: Pacer::default(),
        }
    }

    /// Steady tone at one level.
    pub fn constant(dbfs: f32) -> Self {
        Self::new(vec![LevelSegment::new(1.0, dbfs)])
    }

    /// Quiet, normal, loud, normal; long enough at each level for the
    /// smoothed estimate to settle into every mood.
    pub fn demo() -> Self {
        Self::new(vec![
            LevelSegment::new(8.0, -72.9),
            LevelSegment::new(8.0, -58.9),
            LevelSegment::new(8.0, -40.9),
            LevelSegment::new(8.0, -58.9),
        ])
    }

    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    fn script_samples(&self) -> u64 {
        self.script
            .iter()
            .map(|segment| self.segment_samples(segment))
            .sum()
    }

    fn segment_samples(&self, segment: &LevelSegment) -> u64 {
        ((segment.seconds.max(0.0) as f64) * self.sample_rate as f64).round() as u64
    }

    fn level_at(&self, position: u64) -> f32 {
        let total = self.script_samples();
        if total == 0 {
            return self.script.first().map(|s| s.dbfs).unwrap_or(-96.0);
        }
        let mut offset = position % total;
        for segment in &self.script {
            let len = self.segment_samples(segment);
            if offset < len {
                return segment.dbfs;
            }
            offset -= len;
        }
        self.script.last().map(|s| s.dbfs).unwrap_or(-96.0)
    }
}

impl SampleSource for SyntheticSource {
    fn open(&mut self, config: &AudioConfig) -> Result<(), CaptureError> {
        if self.script.is_empty() {
            return Err(CaptureError::Open("level script is empty".to_string()));
        }
        self.sample_rate = config.sample_rate;
        self.position = 0;
        self.phase = 0.0;
        self.pacer.reset();
        Ok(())
    }

    fn read_block(&mut self, block: &mut [i16]) -> Result<(), CaptureError> {
        if self.sample_rate == 0 {
            return Err(CaptureError::NotOpen);
        }

        let step = TAU * TONE_HZ / self.sample_rate as f64;
        for sample in block.iter_mut() {
            let dbfs = self.level_at(self.position) as f64;
            let peak = std::f64::consts::SQRT_2 * FULL_SCALE * 10f64.powf(dbfs / 20.0);
            let value = (peak * self.phase.sin()).round();
            *sample = value.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            self.phase = (self.phase + step) % TAU;
            self.position += 1;
        }

        if self.paced {
            self.pacer.wait(block.len(), self.sample_rate);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("synthetic tone ({} segments)", self.script.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::rms_to_dbfs;
    use crate::LevelEstimator;

    fn opened(source: SyntheticSource) -> SyntheticSource {
        let mut source = source.paced(false);
        source.open(&AudioConfig::default()).unwrap();
        source
    }

    #[test]
    fn tone_has_requested_rms_level() {
        let mut source = opened(SyntheticSource::constant(-30.0));
        let mut block = vec![0_i16; 22_050];
        source.read_block(&mut block).unwrap();

        let sum: f64 = block.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum / block.len() as f64).sqrt();
        assert!((rms_to_dbfs(rms) + 30.0).abs() < 0.1);
    }

    #[test]
    fn script_advances_and_loops() {
        let source = opened(SyntheticSource::new(vec![
            LevelSegment::new(1.0, -70.0),
            LevelSegment::new(1.0, -20.0),
        ]));
        assert_eq!(source.level_at(0), -70.0);
        assert_eq!(source.level_at(22_050), -20.0);
        assert_eq!(source.level_at(44_100), -70.0);
    }

    #[test]
    fn read_before_open_fails() {
        let mut source = SyntheticSource::demo();
        let mut block = [0_i16; 4];
        assert!(matches!(source.read_block(&mut block), Err(CaptureError::NotOpen)));
    }

    #[test]
    fn empty_script_fails_to_open() {
        let mut source = SyntheticSource::new(Vec::new());
        assert!(source.open(&AudioConfig::default()).is_err());
    }

    #[test]
    fn estimator_recovers_calibrated_level() {
        let config = AudioConfig::default();
        let calibration = crate::config::CalibrationConfig::default();
        let mut source = opened(SyntheticSource::constant(-50.9));
        let mut estimator = LevelEstimator::new(&config, &calibration);
        let mut block = vec![0_i16; config.block_size];

        let reading = loop {
            source.read_block(&mut block).unwrap();
            if let Some(reading) = estimator.ingest(&block) {
                break reading;
            }
        };
        assert!((reading.spl - 60.0).abs() < 0.2);
    }
}
