//! Replays a recorded WAV file as if it were the microphone.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};

use super::{Pacer, SampleSource};
use crate::config::AudioConfig;
use crate::error::CaptureError;

/// Looping 16-bit mono WAV source.
pub struct WavSource {
    path: PathBuf,
    paced: bool,
    reader: Option<WavReader<BufReader<File>>>,
    sample_rate: u32,
    total_samples: u32,
    pacer: Pacer,
}

impl WavSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            paced: true,
            reader: None,
            sample_rate: 0,
            total_samples: 0,
            pacer: Pacer::default(),
        }
    }

    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File sample rate, known once opened.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples in one pass through the file, known once opened.
    pub fn total_samples(&self) -> u32 {
        self.total_samples
    }

    fn next_sample(&mut self) -> Result<i16, CaptureError> {
        let reader = self.reader.as_mut().ok_or(CaptureError::NotOpen)?;
        if let Some(sample) = reader.samples::<i16>().next() {
            return Ok(sample?);
        }

        reader.seek(0).map_err(|e| CaptureError::Read(e.to_string()))?;
        match reader.samples::<i16>().next() {
            Some(sample) => Ok(sample?),
            None => Err(CaptureError::Read("wav file holds no samples".to_string())),
        }
    }
}

impl SampleSource for WavSource {
    fn open(&mut self, config: &AudioConfig) -> Result<(), CaptureError> {
        let reader = WavReader::open(&self.path)?;
        let spec = reader.spec();

        if spec.channels != 1 {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{} channels, expected mono",
                spec.channels
            )));
        }
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{}-bit {:?} samples, expected 16-bit integer",
                spec.bits_per_sample, spec.sample_format
            )));
        }
        if reader.duration() == 0 {
            return Err(CaptureError::Open("wav file holds no samples".to_string()));
        }
        if spec.sample_rate != config.sample_rate {
            tracing::warn!(
                file_rate = spec.sample_rate,
                configured_rate = config.sample_rate,
                "wav sample rate differs from configuration"
            );
        }

        self.sample_rate = spec.sample_rate;
        self.total_samples = reader.duration();
        self.reader = Some(reader);
        self.pacer.reset();
        Ok(())
    }

    fn read_block(&mut self, block: &mut [i16]) -> Result<(), CaptureError> {
        for sample in block.iter_mut() {
            *sample = self.next_sample()?;
        }
        if self.paced {
            self.pacer.wait(block.len(), self.sample_rate);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("wav file {}", self.path.display())
    }
}

impl std::fmt::Debug for WavSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSource")
            .field("path", &self.path)
            .field("paced", &self.paced)
            .field("open", &self.reader.is_some())
            .finish()
    }
}
