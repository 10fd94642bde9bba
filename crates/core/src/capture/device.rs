//! Live microphone capture using cpal.

use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use super::SampleSource;
use crate::config::AudioConfig;
use crate::error::CaptureError;

/// How long one block may take before the read counts as failed.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Microphone input through the host audio API.
///
/// `cpal::Stream` is not `Send`, so the stream lives on its own thread and
/// hands sample chunks over a bounded channel. Chunks are re-cut into blocks
/// of the configured size here.
pub struct DeviceSource {
    name: Option<String>,
    gain: f32,
    sample_rx: Option<Receiver<Vec<i16>>>,
    stop_tx: Option<Sender<()>>,
    pending: Vec<i16>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DeviceSource {
    /// `name` selects an input device by substring; `None` uses the default.
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            gain: 1.0,
            sample_rx: None,
            stop_tx: None,
            pending: Vec::new(),
            thread: None,
        }
    }

    fn find_device(&self, host: &cpal::Host) -> Result<Device, CaptureError> {
        let Some(name) = &self.name else {
            return host.default_input_device().ok_or(CaptureError::NoDevice);
        };

        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::Open(e.to_string()))?;
        for device in devices {
            if let Ok(device_name) = device.name() {
                if device_name.contains(name.as_str()) {
                    return Ok(device);
                }
            }
        }
        Err(CaptureError::DeviceNotFound(name.clone()))
    }

    fn apply_gain(&self, sample: i16) -> i16 {
        let scaled = (sample as f32 * self.gain).round();
        scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }
}

impl SampleSource for DeviceSource {
    fn open(&mut self, config: &AudioConfig) -> Result<(), CaptureError> {
        let host = cpal::default_host();
        let device = self.find_device(&host)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let sample_format = device
            .supported_input_configs()
            .map_err(|e| CaptureError::UnsupportedFormat(e.to_string()))?
            .filter(|c| c.channels() == 1)
            .find(|c| {
                c.min_sample_rate() <= SampleRate(config.sample_rate)
                    && c.max_sample_rate() >= SampleRate(config.sample_rate)
            })
            .map(|c| c.sample_format())
            .ok_or_else(|| {
                CaptureError::UnsupportedFormat(format!(
                    "no mono input at {} Hz on {}",
                    config.sample_rate, device_name
                ))
            })?;

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sample_tx, sample_rx) = bounded::<Vec<i16>>(64);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (started_tx, started_rx) = bounded::<Result<(), CaptureError>>(1);

        let handle = thread::Builder::new()
            .name("mic-stream".to_string())
            .spawn(move || {
                run_stream(device, stream_config, sample_format, sample_tx, stop_rx, started_tx)
            })
            .map_err(|e| CaptureError::Open(e.to_string()))?;

        started_rx
            .recv()
            .map_err(|_| CaptureError::Open("stream thread exited early".to_string()))??;

        tracing::info!(device = %device_name, format = ?sample_format, "microphone opened");
        self.gain = db_to_gain(config.input_gain_db);
        self.sample_rx = Some(sample_rx);
        self.stop_tx = Some(stop_tx);
        self.thread = Some(handle);
        self.pending.clear();
        Ok(())
    }

    fn read_block(&mut self, block: &mut [i16]) -> Result<(), CaptureError> {
        let rx = self.sample_rx.as_ref().ok_or(CaptureError::NotOpen)?;
        while self.pending.len() < block.len() {
            match rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => return Err(CaptureError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::Disconnected),
            }
        }

        for (dst, src) in block.iter_mut().zip(self.pending.drain(..block.len())) {
            *dst = src;
        }
        for sample in block.iter_mut() {
            *sample = self.apply_gain(*sample);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("input device `{name}`"),
            None => "default input device".to_string(),
        }
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn run_stream(
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    tx: Sender<Vec<i16>>,
    stop_rx: Receiver<()>,
    started_tx: Sender<Result<(), CaptureError>>,
) {
    let stream = match sample_format {
        SampleFormat::I8 => build_stream(&device, &config, tx, from_i8),
        SampleFormat::I16 => build_stream(&device, &config, tx, |s: i16| s),
        SampleFormat::I32 => build_stream(&device, &config, tx, from_i32),
        SampleFormat::I64 => build_stream(&device, &config, tx, from_i64),
        SampleFormat::U8 => build_stream(&device, &config, tx, from_u8),
        SampleFormat::U16 => build_stream(&device, &config, tx, from_u16),
        SampleFormat::U32 => build_stream(&device, &config, tx, from_u32),
        SampleFormat::U64 => build_stream(&device, &config, tx, from_u64),
        SampleFormat::F32 => build_stream(&device, &config, tx, |s: f32| from_float(s as f64)),
        SampleFormat::F64 => build_stream(&device, &config, tx, from_float),
        other => {
            let _ = started_tx.send(Err(CaptureError::UnsupportedFormat(format!("{other:?}"))));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = started_tx.send(Err(CaptureError::Open(e.to_string())));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = started_tx.send(Err(CaptureError::Open(e.to_string())));
        return;
    }
    let _ = started_tx.send(Ok(()));

    let _ = stop_rx.recv();
    tracing::debug!("input stream stopping");
    drop(stream);
}

/// Builds an input stream that converts every callback chunk to i16.
fn build_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    tx: Sender<Vec<i16>>,
    convert: F,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    F: Fn(T) -> i16 + Send + 'static,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples = data.iter().map(|&s| convert(s)).collect();
            let _ = tx.try_send(samples);
        },
        |err| tracing::warn!("input stream error: {}", err),
        None,
    )
}

fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

fn from_i8(s: i8) -> i16 {
    i16::from(s) << 8
}

fn from_i32(s: i32) -> i16 {
    (s >> 16) as i16
}

fn from_i64(s: i64) -> i16 {
    (s >> 48) as i16
}

// Unsigned formats are offset binary: mid-scale is silence.
fn from_u8(s: u8) -> i16 {
    (i16::from(s) - 128) << 8
}

fn from_u16(s: u16) -> i16 {
    (i32::from(s) - 32_768) as i16
}

fn from_u32(s: u32) -> i16 {
    from_u16((s >> 16) as u16)
}

fn from_u64(s: u64) -> i16 {
    from_u16((s >> 48) as u16)
}

fn from_float(s: f64) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_is_linear_in_decibels() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(20.0) - 10.0).abs() < 1e-4);
        assert!((db_to_gain(24.0) - 15.849).abs() < 1e-2);
    }

    #[test]
    fn gain_saturates_at_sample_limits() {
        let mut source = DeviceSource::new(None);
        source.gain = db_to_gain(24.0);

        assert_eq!(source.apply_gain(3000), i16::MAX);
        assert_eq!(source.apply_gain(-3000), i16::MIN);
        assert_eq!(source.apply_gain(100), 1585);
        assert_eq!(source.apply_gain(0), 0);
    }

    #[test]
    fn unity_gain_leaves_samples_alone() {
        let source = DeviceSource::new(None);
        assert_eq!(source.apply_gain(i16::MIN), i16::MIN);
        assert_eq!(source.apply_gain(1234), 1234);
    }

    #[test]
    fn integer_formats_map_to_i16_range() {
        assert_eq!(from_i8(i8::MIN), i16::MIN);
        assert_eq!(from_i8(1), 256);
        assert_eq!(from_i32(i32::MAX), i16::MAX);
        assert_eq!(from_i64(i64::MIN), i16::MIN);
    }

    #[test]
    fn unsigned_midpoint_is_silence() {
        assert_eq!(from_u8(128), 0);
        assert_eq!(from_u16(32_768), 0);
        assert_eq!(from_u32(1 << 31), 0);
        assert_eq!(from_u64(1 << 63), 0);
        assert_eq!(from_u8(0), i16::MIN);
        assert_eq!(from_u16(u16::MAX), i16::MAX);
    }

    #[test]
    fn float_samples_are_clamped() {
        assert_eq!(from_float(0.0), 0);
        assert_eq!(from_float(1.0), i16::MAX);
        assert_eq!(from_float(2.5), i16::MAX);
        assert_eq!(from_float(-2.5), -i16::MAX);
    }
}
