mod terminal;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use noise_mood_core::{
    spawn_capture, AppConfig, AudioConfig, FrameSequencer, FrameTable, LevelEstimator,
    MeterError, MoodThresholds, Presenter, SampleSource, Scheduler, SharedEstimate,
    SyntheticSource, TickKind, WavSource,
};
use tracing_subscriber::EnvFilter;

use crate::terminal::TerminalDisplay;

fn main() -> noise_mood_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            source,
            input,
            device,
            duration,
        } => {
            let config = load_config(config.as_deref())?;
            let source = build_source(source, input, device, &config)?;
            run_live(config, source, duration)
        }
        Commands::Measure { input, config } => {
            let config = load_config(config.as_deref())?;
            let stdout = std::io::stdout();
            run_measure(&input, &config, &mut stdout.lock())?;
            Ok(())
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> noise_mood_core::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn build_source(
    kind: SourceKind,
    input: Option<PathBuf>,
    device: Option<String>,
    config: &AppConfig,
) -> noise_mood_core::Result<Box<dyn SampleSource>> {
    match kind {
        SourceKind::Synthetic => Ok(Box::new(SyntheticSource::demo())),
        SourceKind::Wav => {
            let input = input.ok_or_else(|| MeterError::msg("--input is required for the wav source"))?;
            Ok(Box::new(WavSource::new(input)))
        }
        SourceKind::Device => device_source(device.or_else(|| config.audio.device.clone())),
    }
}

#[cfg(feature = "device")]
fn device_source(name: Option<String>) -> noise_mood_core::Result<Box<dyn SampleSource>> {
    Ok(Box::new(noise_mood_core::DeviceSource::new(name)))
}

#[cfg(not(feature = "device"))]
fn device_source(_name: Option<String>) -> noise_mood_core::Result<Box<dyn SampleSource>> {
    Err(MeterError::msg(
        "live capture needs a build with the `device` feature",
    ))
}

fn run_live(
    config: AppConfig,
    source: Box<dyn SampleSource>,
    duration: Option<Duration>,
) -> noise_mood_core::Result<()> {
    tracing::info!(source = %source.describe(), ?duration, "starting noise meter");

    let store = SharedEstimate::new(config.calibration.initial_spl);
    let estimator = LevelEstimator::new(&config.audio, &config.calibration);
    let capture = spawn_capture(source, estimator, store.clone(), config.audio.clone())?;

    let sequencer = FrameSequencer::new(FrameTable::default(), MoodThresholds::from(&config.mood));
    let mut presenter = Presenter::new(store, sequencer, TerminalDisplay::stdout());
    let mut scheduler = Scheduler::from_config(&config.display);
    presenter.show_initial()?;

    let start = Instant::now();
    let mut capture_gone = false;
    loop {
        let now = start.elapsed();
        if duration.is_some_and(|limit| now >= limit) {
            break;
        }

        for tick in scheduler.due(now) {
            match tick {
                TickKind::Animation => {
                    presenter.animation_tick()?;
                }
                TickKind::Text => {
                    presenter.text_tick()?;
                }
            }
        }

        if !capture_gone && capture.is_finished() {
            capture_gone = true;
            tracing::warn!("capture thread ended; display keeps its last state");
        }

        let wake = scheduler.next_deadline();
        let wake = match duration {
            Some(limit) => wake.min(limit),
            None => wake,
        };
        std::thread::sleep(wake.saturating_sub(start.elapsed()));
    }

    presenter.into_display().finish()?;
    let exit = capture.stop()?;
    tracing::info!(?exit, "noise meter stopped");
    Ok(())
}

/// Writes one tab-separated row per closed window and returns the row count.
fn run_measure<W: Write>(
    input: &Path,
    config: &AppConfig,
    out: &mut W,
) -> noise_mood_core::Result<usize> {
    let mut source = WavSource::new(input).paced(false);
    source.open(&config.audio)?;

    // Windows follow the file's own rate rather than the configured one.
    let audio = AudioConfig {
        sample_rate: source.sample_rate(),
        ..config.audio.clone()
    };
    let mut estimator = LevelEstimator::new(&audio, &config.calibration);
    tracing::info!(
        input = %input.display(),
        sample_rate = audio.sample_rate,
        target_samples = estimator.target_samples(),
        "measuring"
    );

    let blocks = source.total_samples() as usize / audio.block_size;
    let mut block = vec![0_i16; audio.block_size];
    let mut window = 0usize;

    writeln!(out, "window\ttime_s\trms\tdbfs\tspl\tsmoothed")?;
    for index in 0..blocks {
        source.read_block(&mut block)?;
        if let Some(reading) = estimator.ingest(&block) {
            let end = ((index + 1) * audio.block_size) as f64 / audio.sample_rate as f64;
            writeln!(
                out,
                "{window}\t{end:.2}\t{:.1}\t{:.1}\t{:.1}\t{:.1}",
                reading.rms, reading.dbfs, reading.spl, reading.smoothed_spl
            )?;
            window += 1;
        }
    }

    if window == 0 {
        tracing::warn!("input is shorter than one RMS window");
    }
    out.flush()?;
    Ok(window)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Ambient sound level meter with a mood display", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the meter and show the mood display in the terminal.
    Run {
        /// JSON file overriding the built-in configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Where samples come from.
        #[arg(short, long, value_enum, default_value_t = SourceKind::Synthetic)]
        source: SourceKind,
        /// WAV file to replay with `--source wav`.
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Input device name for `--source device`.
        #[arg(short, long)]
        device: Option<String>,
        /// Stop after this many seconds instead of running until killed.
        #[arg(long, value_parser = parse_seconds)]
        duration: Option<Duration>,
    },
    /// Print per-window dBFS and SPL for a WAV recording.
    Measure {
        /// 16-bit mono WAV file.
        input: PathBuf,
        /// JSON file overriding the built-in configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration as JSON.
    Config {
        /// JSON file overriding the built-in configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("{e}"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Built-in test tone cycling through quiet, normal and loud.
    Synthetic,
    /// Looping WAV file playback.
    Wav,
    /// Live microphone.
    Device,
}
