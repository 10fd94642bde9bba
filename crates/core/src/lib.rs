//! Core library for the Noise Mood sound level meter.
//!
//! The pipeline runs in one direction: a [`SampleSource`] feeds PCM blocks
//! to the [`LevelEstimator`] on the capture thread, which publishes smoothed
//! SPL values through the [`SharedEstimate`]. On the presentation side the
//! [`Presenter`] reads that estimate without blocking, classifies it into a
//! [`Mood`] with hysteresis and steps the [`FrameSequencer`].

pub mod animation;
pub mod capture;
pub mod config;
pub mod display;
pub mod error;
pub mod estimate;
pub mod level;
pub mod mood;
pub mod presenter;
pub mod timeline;

pub use animation::{AnimationCursor, FrameId, FrameSequencer, FrameSet, FrameTable, PING_PONG};
#[cfg(feature = "device")]
pub use capture::DeviceSource;
pub use capture::{
    run_capture, spawn_capture, CaptureExit, CaptureHandle, LevelSegment, SampleSource,
    SyntheticSource, WavSource,
};
pub use config::{AppConfig, AudioConfig, CalibrationConfig, DisplayConfig, MoodConfig};
pub use display::{status_text, DisplaySink, RecordingDisplay, STARTING_TEXT};
pub use error::{CaptureError, ConfigError, MeterError, Result};
pub use estimate::{EstimateSnapshot, SharedEstimate};
pub use level::{dbfs_to_spl, rms_to_dbfs, smooth, Accumulator, Calibration, LevelEstimator, LevelReading};
pub use mood::{Mood, MoodThresholds};
pub use presenter::Presenter;
pub use timeline::{PeriodicTimer, Scheduler, TickKind};
