//! Per-mood frame sets and the ping-pong frame sequencer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EstimateSnapshot, MeterError, Mood, MoodThresholds, Result};

/// Frame phases, in order. Frame 1 shows twice per cycle.
pub const PING_PONG: [usize; 4] = [0, 1, 2, 1];

/// Frames available per mood in the stock artwork.
pub const FRAMES_PER_MOOD: usize = 3;

/// Identifier of one image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId {
    pub mood: Mood,
    pub index: usize,
}

impl FrameId {
    pub fn new(mood: Mood, index: usize) -> Self {
        Self { mood, index }
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.mood, self.index)
    }
}

/// Ordered, non-empty frame list for one mood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSet {
    frames: Vec<FrameId>,
}

impl FrameSet {
    pub fn new(frames: Vec<FrameId>) -> Result<Self> {
        if frames.is_empty() {
            return Err(MeterError::msg("frame set must contain at least one frame"));
        }
        Ok(Self { frames })
    }

    /// The stock `<mood>_0 .. <mood>_{count-1}` frames.
    fn stock(mood: Mood, count: usize) -> Self {
        Self {
            frames: (0..count.max(1)).map(|index| FrameId::new(mood, index)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Looks up a slot, falling back to the last frame when the sequence
    /// asks for more frames than the set holds.
    pub fn resolve(&self, slot: usize) -> (usize, FrameId) {
        let index = slot.min(self.frames.len() - 1);
        (index, self.frames[index])
    }
}

/// Mapping from mood to its frame set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTable {
    sleepy: FrameSet,
    work: FrameSet,
    dizzy: FrameSet,
}

impl Default for FrameTable {
    fn default() -> Self {
        Self {
            sleepy: FrameSet::stock(Mood::Sleepy, FRAMES_PER_MOOD),
            work: FrameSet::stock(Mood::Work, FRAMES_PER_MOOD),
            dizzy: FrameSet::stock(Mood::Dizzy, FRAMES_PER_MOOD),
        }
    }
}

impl FrameTable {
    pub fn new(sleepy: FrameSet, work: FrameSet, dizzy: FrameSet) -> Self {
        Self { sleepy, work, dizzy }
    }

    pub fn frames(&self, mood: Mood) -> &FrameSet {
        match mood {
            Mood::Sleepy => &self.sleepy,
            Mood::Work => &self.work,
            Mood::Dizzy => &self.dizzy,
        }
    }
}

/// Position inside the current mood's animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationCursor {
    pub mood: Mood,
    /// Index into [`PING_PONG`].
    pub phase: usize,
    /// Resolved index into the mood's frame set.
    pub frame: usize,
}

impl Default for AnimationCursor {
    fn default() -> Self {
        Self::reset(Mood::Work)
    }
}

impl AnimationCursor {
    fn reset(mood: Mood) -> Self {
        Self {
            mood,
            phase: 0,
            frame: 0,
        }
    }
}

/// Chooses the frame to show on each animation tick.
#[derive(Debug, Clone)]
pub struct FrameSequencer {
    table: FrameTable,
    thresholds: MoodThresholds,
    cursor: AnimationCursor,
}

impl FrameSequencer {
    pub fn new(table: FrameTable, thresholds: MoodThresholds) -> Self {
        Self {
            table,
            thresholds,
            cursor: AnimationCursor::default(),
        }
    }

    pub fn cursor(&self) -> AnimationCursor {
        self.cursor
    }

    pub fn mood(&self) -> Mood {
        self.cursor.mood
    }

    /// Frame currently on screen.
    pub fn current_frame(&self) -> FrameId {
        self.table.frames(self.cursor.mood).resolve(self.cursor.frame).1
    }

    /// Runs one animation tick against the latest estimate.
    ///
    /// A mood change shows the new mood's first frame on the same tick; the
    /// ping-pong sequence only advances on ticks without a change.
    pub fn advance(&mut self, estimate: EstimateSnapshot) -> FrameId {
        let desired = self
            .cursor
            .mood
            .next(estimate.spl, estimate.ready, &self.thresholds);

        if desired != self.cursor.mood {
            tracing::info!(
                from = %self.cursor.mood,
                to = %desired,
                spl = estimate.spl,
                "mood changed"
            );
            self.cursor = AnimationCursor::reset(desired);
            return self.current_frame();
        }

        self.cursor.phase = (self.cursor.phase + 1) % PING_PONG.len();
        let (frame, id) = self
            .table
            .frames(self.cursor.mood)
            .resolve(PING_PONG[self.cursor.phase]);
        self.cursor.frame = frame;
        id
    }
}

impl Default for FrameSequencer {
    fn default() -> Self {
        Self::new(FrameTable::default(), MoodThresholds::default())
    }
}
