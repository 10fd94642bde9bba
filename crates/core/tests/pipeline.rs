use std::time::{Duration, Instant};

use noise_mood_core::{
    spawn_capture, AppConfig, CaptureExit, EstimateSnapshot, FrameId, FrameSequencer, FrameTable,
    LevelEstimator, Mood, MoodThresholds, Presenter, RecordingDisplay, SharedEstimate,
    SyntheticSource,
};

fn presenter_for(store: &SharedEstimate, config: &AppConfig) -> Presenter<RecordingDisplay> {
    let sequencer = FrameSequencer::new(FrameTable::default(), MoodThresholds::from(&config.mood));
    Presenter::new(store.clone(), sequencer, RecordingDisplay::new())
}

#[test]
fn loud_tone_drives_display_to_dizzy() {
    let config = AppConfig::default();
    let store = SharedEstimate::new(config.calibration.initial_spl);
    let estimator = LevelEstimator::new(&config.audio, &config.calibration);
    let source = SyntheticSource::constant(-30.0).paced(false);
    let handle = spawn_capture(source, estimator, store.clone(), config.audio.clone()).unwrap();

    let mut presenter = presenter_for(&store, &config);
    let deadline = Instant::now() + Duration::from_secs(10);
    while presenter.mood() != Mood::Dizzy && Instant::now() < deadline {
        presenter.animation_tick().unwrap();
        std::thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(handle.stop().unwrap(), CaptureExit::Stopped);
    assert_eq!(presenter.mood(), Mood::Dizzy);

    let frames = presenter.display().frames();
    let first_dizzy = frames.iter().position(|f| f.mood == Mood::Dizzy).unwrap();
    assert_eq!(frames[first_dizzy], FrameId::new(Mood::Dizzy, 0));
    // Everything before the switch was Work; there is no Sleepy detour.
    assert!(frames[..first_dizzy].iter().all(|f| f.mood == Mood::Work));

    let text = presenter.text_tick().unwrap();
    assert!(text.ends_with("dB SPL (dizzy)"), "{text}");
}

#[test]
fn failed_source_keeps_presenter_in_starting_mode() {
    let config = AppConfig::default();
    let store = SharedEstimate::default();
    let estimator = LevelEstimator::new(&config.audio, &config.calibration);
    let source = SyntheticSource::new(Vec::new());
    let handle = spawn_capture(source, estimator, store.clone(), config.audio.clone()).unwrap();

    let exit = handle.stop().unwrap();
    assert!(matches!(exit, CaptureExit::InitFailed(_)));

    let mut presenter = presenter_for(&store, &config);
    for _ in 0..6 {
        let frame = presenter.animation_tick().unwrap();
        assert_eq!(frame.mood, Mood::Work);
    }
    assert_eq!(presenter.text_tick().unwrap(), "MIC starting...");
}

#[test]
fn store_driven_walk_through_all_moods() {
    let config = AppConfig::default();
    let store = SharedEstimate::default();
    let mut presenter = presenter_for(&store, &config);
    store.mark_ready().unwrap();

    let script = [
        (50.0, Mood::Work),
        (44.0, Mood::Work),
        (43.0, Mood::Sleepy),
        (46.0, Mood::Sleepy),
        (47.0, Mood::Work),
        (61.0, Mood::Work),
        (62.0, Mood::Dizzy),
        (59.0, Mood::Dizzy),
        (58.0, Mood::Work),
    ];

    for (spl, expected) in script {
        store.write(spl).unwrap();
        presenter.animation_tick().unwrap();
        assert_eq!(presenter.mood(), expected, "at {spl} dB");
    }
    assert_eq!(
        presenter.last_known(),
        EstimateSnapshot {
            spl: 58.0,
            ready: true
        }
    );
}
