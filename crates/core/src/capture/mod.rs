//! Capture sources and the estimation loop that runs on its own thread.

#[cfg(feature = "device")]
pub mod device;
pub mod synthetic;
pub mod wav;

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::config::AudioConfig;
use crate::error::CaptureError;
use crate::{LevelEstimator, MeterError, Result, SharedEstimate};

#[cfg(feature = "device")]
pub use device::DeviceSource;
pub use synthetic::{LevelSegment, SyntheticSource};
pub use wav::WavSource;

/// Producer of fixed-size blocks of signed 16-bit mono PCM.
pub trait SampleSource: Send {
    /// Prepares the source. A failure here ends the capture thread.
    fn open(&mut self, config: &AudioConfig) -> std::result::Result<(), CaptureError>;

    /// Fills `block` completely with the next samples.
    fn read_block(&mut self, block: &mut [i16]) -> std::result::Result<(), CaptureError>;

    /// Short human-readable label for logs.
    fn describe(&self) -> String;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn open(&mut self, config: &AudioConfig) -> std::result::Result<(), CaptureError> {
        (**self).open(config)
    }

    fn read_block(&mut self, block: &mut [i16]) -> std::result::Result<(), CaptureError> {
        (**self).read_block(block)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Holds reads to real time for sources that would otherwise run ahead.
#[derive(Debug, Clone, Default)]
pub(crate) struct Pacer {
    next_deadline: Option<Instant>,
}

impl Pacer {
    pub(crate) fn reset(&mut self) {
        self.next_deadline = None;
    }

    /// Sleeps until `samples` at `sample_rate` have had time to arrive.
    pub(crate) fn wait(&mut self, samples: usize, sample_rate: u32) {
        if sample_rate == 0 {
            return;
        }
        let block = Duration::from_secs_f64(samples as f64 / sample_rate as f64);
        let deadline = self.next_deadline.unwrap_or_else(Instant::now) + block;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
            self.next_deadline = Some(deadline);
        } else {
            // Fell behind; restart pacing from here instead of bursting.
            self.next_deadline = Some(now);
        }
    }
}

/// Why the capture loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureExit {
    /// The source could not be opened; the store never became ready.
    InitFailed(String),
    /// A stop was requested.
    Stopped,
    /// The shared estimate could no longer be written.
    StoreFailed(String),
}

/// Runs the capture loop until a stop is requested.
///
/// Read failures keep the partially filled window and retry after the
/// configured delay, indefinitely.
pub fn run_capture<S: SampleSource>(
    source: &mut S,
    estimator: &mut LevelEstimator,
    store: &SharedEstimate,
    config: &AudioConfig,
    stop_rx: &Receiver<()>,
) -> CaptureExit {
    if let Err(err) = source.open(config) {
        tracing::error!(source = %source.describe(), error = %err, "failed to open capture source");
        return CaptureExit::InitFailed(err.to_string());
    }

    let calibration = estimator.calibration();
    tracing::info!(
        ref_dbfs = calibration.ref_dbfs,
        ref_spl = calibration.ref_spl,
        "SPL calibration: {:.1} dBFS -> {:.1} dB SPL",
        calibration.ref_dbfs,
        calibration.ref_spl
    );
    tracing::info!(
        source = %source.describe(),
        window_ms = config.rms_window_ms,
        sample_rate = config.sample_rate,
        block_size = config.block_size,
        target_samples = estimator.target_samples(),
        "capture started"
    );

    if let Err(err) = store.mark_ready() {
        tracing::error!(error = %err, "could not publish readiness");
        return CaptureExit::StoreFailed(err.to_string());
    }

    let mut block = vec![0_i16; config.block_size];
    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                tracing::debug!("capture loop stopping");
                return CaptureExit::Stopped;
            }
            Err(TryRecvError::Empty) => {}
        }

        if let Err(err) = source.read_block(&mut block) {
            if err.is_transient() {
                tracing::warn!(error = %err, "capture read failed");
            } else {
                tracing::warn!(error = %err, "capture read failed, source may be gone");
            }
            // A stop request should not have to wait out the whole delay.
            if stop_rx.recv_timeout(config.retry_delay()).is_ok() {
                return CaptureExit::Stopped;
            }
            continue;
        }

        let Some(reading) = estimator.ingest(&block) else {
            continue;
        };

        tracing::debug!(
            rms = reading.rms,
            dbfs = reading.dbfs,
            spl = reading.spl,
            smoothed = reading.smoothed_spl,
            "level window closed"
        );

        if let Err(err) = store.write(reading.smoothed_spl) {
            tracing::error!(error = %err, "could not publish level estimate");
            return CaptureExit::StoreFailed(err.to_string());
        }
    }
}

/// Handle to a capture loop running on its own thread.
pub struct CaptureHandle {
    stop_tx: Sender<()>,
    thread: thread::JoinHandle<CaptureExit>,
}

impl CaptureHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Requests a stop and waits for the thread to return.
    pub fn stop(self) -> Result<CaptureExit> {
        let _ = self.stop_tx.try_send(());
        self.thread
            .join()
            .map_err(|_| MeterError::msg("capture thread panicked"))
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Starts [`run_capture`] on a dedicated `mic-capture` thread.
pub fn spawn_capture<S>(
    mut source: S,
    mut estimator: LevelEstimator,
    store: SharedEstimate,
    config: AudioConfig,
) -> Result<CaptureHandle>
where
    S: SampleSource + 'static,
{
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let thread = thread::Builder::new()
        .name("mic-capture".to_string())
        .spawn(move || run_capture(&mut source, &mut estimator, &store, &config, &stop_rx))?;

    Ok(CaptureHandle { stop_tx, thread })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted read results, then requests a stop.
    struct ScriptedSource {
        open_ok: bool,
        reads: VecDeque<std::result::Result<i16, CaptureError>>,
        stop_tx: Sender<()>,
        observed: Arc<Mutex<Vec<bool>>>,
        store_probe: Option<SharedEstimate>,
    }

    impl SampleSource for ScriptedSource {
        fn open(&mut self, _config: &AudioConfig) -> std::result::Result<(), CaptureError> {
            if self.open_ok {
                Ok(())
            } else {
                Err(CaptureError::NoDevice)
            }
        }

        fn read_block(&mut self, block: &mut [i16]) -> std::result::Result<(), CaptureError> {
            if let Some(store) = &self.store_probe {
                let ready = store.try_read().map(|s| s.ready).unwrap_or(false);
                self.observed.lock().unwrap().push(ready);
            }
            match self.reads.pop_front() {
                Some(Ok(value)) => {
                    block.fill(value);
                    Ok(())
                }
                Some(Err(err)) => Err(err),
                None => {
                    let _ = self.stop_tx.try_send(());
                    Err(CaptureError::Timeout)
                }
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn small_config() -> AudioConfig {
        AudioConfig {
            sample_rate: 1000,
            block_size: 10,
            rms_window_ms: 30,
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn source(
        open_ok: bool,
        reads: Vec<std::result::Result<i16, CaptureError>>,
        stop_tx: Sender<()>,
    ) -> ScriptedSource {
        ScriptedSource {
            open_ok,
            reads: reads.into(),
            stop_tx,
            observed: Arc::default(),
            store_probe: None,
        }
    }

    #[test]
    fn init_failure_leaves_store_not_ready() {
        let config = small_config();
        let store = SharedEstimate::default();
        let (stop_tx, stop_rx) = bounded(1);
        let mut src = source(false, Vec::new(), stop_tx);
        let mut estimator = LevelEstimator::new(&config, &CalibrationConfig::default());

        let exit = run_capture(&mut src, &mut estimator, &store, &config, &stop_rx);

        assert!(matches!(exit, CaptureExit::InitFailed(_)));
        assert!(!store.try_read().unwrap().ready);
    }

    #[test]
    fn ready_is_set_before_first_window() {
        let config = small_config();
        let store = SharedEstimate::default();
        let (stop_tx, stop_rx) = bounded(1);
        let mut src = source(true, vec![Ok(100)], stop_tx);
        src.store_probe = Some(store.clone());
        let observed = src.observed.clone();
        let mut estimator = LevelEstimator::new(&config, &CalibrationConfig::default());

        let exit = run_capture(&mut src, &mut estimator, &store, &config, &stop_rx);

        assert_eq!(exit, CaptureExit::Stopped);
        assert_eq!(observed.lock().unwrap().first(), Some(&true));
        // One block of ten samples never closes a thirty-sample window.
        assert_eq!(store.try_read().unwrap().spl, 50.0);
    }

    #[test]
    fn read_failures_keep_partial_window() {
        let config = small_config();
        let store = SharedEstimate::default();
        let (stop_tx, stop_rx) = bounded(1);
        let reads = vec![
            Ok(1000),
            Ok(1000),
            Err(CaptureError::Read("glitch".into())),
            Err(CaptureError::Timeout),
            Ok(1000),
        ];
        let mut src = source(true, reads, stop_tx);
        let mut estimator = LevelEstimator::new(&config, &CalibrationConfig::default());

        let exit = run_capture(&mut src, &mut estimator, &store, &config, &stop_rx);

        assert_eq!(exit, CaptureExit::Stopped);
        assert_eq!(estimator.accumulator().count(), 0);
        let snapshot = store.try_read().unwrap();
        assert!(snapshot.ready);
        assert_ne!(snapshot.spl, 50.0);
        assert_eq!(snapshot.spl, estimator.smoothed());
    }

    #[test]
    fn pacer_holds_reads_to_real_time() {
        let mut pacer = Pacer::default();
        let start = Instant::now();
        for _ in 0..3 {
            pacer.wait(100, 10_000);
        }
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pacer_restarts_after_falling_behind() {
        let mut pacer = Pacer::default();
        pacer.wait(1, 1_000_000);
        std::thread::sleep(Duration::from_millis(20));

        // Behind schedule, so this returns without sleeping.
        let start = Instant::now();
        pacer.wait(1, 1_000_000);
        assert!(start.elapsed() < Duration::from_millis(15));
        pacer.reset();
        assert!(pacer.next_deadline.is_none());
    }

    #[test]
    fn spawned_capture_stops_on_request() {
        let config = small_config();
        let store = SharedEstimate::default();
        let src = SyntheticSource::constant(-40.0);
        let estimator = LevelEstimator::new(&config, &CalibrationConfig::default());

        let handle = spawn_capture(src, estimator, store.clone(), config).unwrap();
        while !store.try_read().map(|s| s.ready).unwrap_or(false) {
            std::thread::yield_now();
        }
        assert_eq!(handle.stop().unwrap(), CaptureExit::Stopped);
        assert!(store.try_read().unwrap().ready);
    }
}
