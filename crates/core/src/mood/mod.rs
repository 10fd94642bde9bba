use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MoodConfig;

/// Discrete mood shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    /// Quiet room.
    Sleepy,
    /// Normal activity; also the neutral state while the microphone starts.
    #[default]
    Work,
    /// Loud room.
    Dizzy,
}

impl Mood {
    pub const ALL: [Mood; 3] = [Mood::Sleepy, Mood::Work, Mood::Dizzy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Sleepy => "sleepy",
            Mood::Work => "work",
            Mood::Dizzy => "dizzy",
        }
    }

    /// Applies one step of the hysteresis rule.
    ///
    /// Entering Sleepy or Dizzy needs the outer edge of the band; leaving
    /// needs the inner edge. Sleepy and Dizzy only reach each other through
    /// Work.
    pub fn next(self, spl: f32, mic_ready: bool, thresholds: &MoodThresholds) -> Mood {
        if !mic_ready {
            return Mood::Work;
        }

        match self {
            Mood::Sleepy => {
                if spl >= thresholds.sleepy_exit() {
                    Mood::Work
                } else {
                    Mood::Sleepy
                }
            }
            Mood::Dizzy => {
                if spl <= thresholds.dizzy_exit() {
                    Mood::Work
                } else {
                    Mood::Dizzy
                }
            }
            Mood::Work => {
                if spl <= thresholds.sleepy_entry() {
                    Mood::Sleepy
                } else if spl >= thresholds.dizzy_entry() {
                    Mood::Dizzy
                } else {
                    Mood::Work
                }
            }
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sleepy/Dizzy boundaries with a shared hysteresis band, in dB SPL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodThresholds {
    pub sleepy: f32,
    pub dizzy: f32,
    pub hysteresis: f32,
}

impl Default for MoodThresholds {
    fn default() -> Self {
        Self::from(&MoodConfig::default())
    }
}

impl From<&MoodConfig> for MoodThresholds {
    fn from(config: &MoodConfig) -> Self {
        Self {
            sleepy: config.sleepy_threshold,
            dizzy: config.dizzy_threshold,
            hysteresis: config.hysteresis,
        }
    }
}

impl MoodThresholds {
    pub fn sleepy_entry(&self) -> f32 {
        self.sleepy - self.hysteresis
    }

    pub fn sleepy_exit(&self) -> f32 {
        self.sleepy + self.hysteresis
    }

    pub fn dizzy_entry(&self) -> f32 {
        self.dizzy + self.hysteresis
    }

    pub fn dizzy_exit(&self) -> f32 {
        self.dizzy - self.hysteresis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn walk(start: Mood, inputs: &[f32]) -> Vec<Mood> {
        let thresholds = MoodThresholds::default();
        let mut mood = start;
        inputs
            .iter()
            .map(|&spl| {
                mood = mood.next(spl, true, &thresholds);
                mood
            })
            .collect()
    }

    #[test]
    fn band_edges_follow_defaults() {
        let t = MoodThresholds::default();
        assert_eq!(t.sleepy_entry(), 43.0);
        assert_eq!(t.sleepy_exit(), 47.0);
        assert_eq!(t.dizzy_exit(), 58.0);
        assert_eq!(t.dizzy_entry(), 62.0);
    }

    #[test]
    fn sleepy_boundary_has_hysteresis() {
        let moods = walk(Mood::Work, &[50.0, 44.0, 43.0, 46.0, 47.0]);
        assert_eq!(
            moods,
            vec![Mood::Work, Mood::Work, Mood::Sleepy, Mood::Sleepy, Mood::Work]
        );
    }

    #[test]
    fn dizzy_boundary_has_hysteresis() {
        let moods = walk(Mood::Work, &[50.0, 61.0, 62.0, 59.0, 58.0]);
        assert_eq!(
            moods,
            vec![Mood::Work, Mood::Work, Mood::Dizzy, Mood::Dizzy, Mood::Work]
        );
    }

    #[test]
    fn extremes_pass_through_work() {
        let thresholds = MoodThresholds::default();
        assert_eq!(Mood::Sleepy.next(110.0, true, &thresholds), Mood::Work);
        assert_eq!(Mood::Dizzy.next(30.0, true, &thresholds), Mood::Work);
    }

    #[test]
    fn not_ready_forces_work() {
        let thresholds = MoodThresholds::default();
        for mood in Mood::ALL {
            assert_eq!(mood.next(30.0, false, &thresholds), Mood::Work);
            assert_eq!(mood.next(100.0, false, &thresholds), Mood::Work);
        }
    }

    #[test]
    fn names_are_lowercase() {
        assert_eq!(Mood::Sleepy.to_string(), "sleepy");
        assert_eq!(Mood::Work.to_string(), "work");
        assert_eq!(Mood::Dizzy.to_string(), "dizzy");
        assert_eq!(Mood::default(), Mood::Work);
    }

    proptest! {
        #[test]
        fn never_jumps_between_extremes(spl in 0.0f32..140.0, ready in any::<bool>()) {
            let thresholds = MoodThresholds::default();
            prop_assert_ne!(Mood::Sleepy.next(spl, ready, &thresholds), Mood::Dizzy);
            prop_assert_ne!(Mood::Dizzy.next(spl, ready, &thresholds), Mood::Sleepy);
        }
    }
}
