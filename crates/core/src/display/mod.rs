use crate::{EstimateSnapshot, FrameId, Mood, Result};

/// Text shown until the capture source reports ready.
pub const STARTING_TEXT: &str = "MIC starting...";

/// Formats the status line for the text tick.
pub fn status_text(estimate: EstimateSnapshot, mood: Mood) -> String {
    if !estimate.ready {
        return STARTING_TEXT.to_string();
    }
    format!("{:.1} dB SPL ({})", estimate.spl, mood)
}

/// Surface that shows the selected frame and the status text.
pub trait DisplaySink {
    fn show_frame(&mut self, frame: FrameId) -> Result<()>;
    fn show_text(&mut self, text: &str) -> Result<()>;
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn show_frame(&mut self, frame: FrameId) -> Result<()> {
        (**self).show_frame(frame)
    }

    fn show_text(&mut self, text: &str) -> Result<()> {
        (**self).show_text(text)
    }
}

/// In-memory sink that keeps everything it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    frames: Vec<FrameId>,
    texts: Vec<String>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[FrameId] {
        &self.frames
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn last_frame(&self) -> Option<FrameId> {
        self.frames.last().copied()
    }

    pub fn last_text(&self) -> Option<&str> {
        self.texts.last().map(String::as_str)
    }
}

impl DisplaySink for RecordingDisplay {
    fn show_frame(&mut self, frame: FrameId) -> Result<()> {
        self.frames.push(frame);
        Ok(())
    }

    fn show_text(&mut self, text: &str) -> Result<()> {
        self.texts.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_text_before_ready() {
        let text = status_text(EstimateSnapshot { spl: 72.0, ready: false }, Mood::Dizzy);
        assert_eq!(text, "MIC starting...");
    }

    #[test]
    fn formats_one_decimal_and_mood() {
        let text = status_text(EstimateSnapshot { spl: 51.46, ready: true }, Mood::Work);
        assert_eq!(text, "51.5 dB SPL (work)");

        let text = status_text(EstimateSnapshot { spl: 30.0, ready: true }, Mood::Sleepy);
        assert_eq!(text, "30.0 dB SPL (sleepy)");
    }

    #[test]
    fn boxed_sinks_forward() {
        let mut sink: Box<RecordingDisplay> = Box::default();
        sink.show_frame(FrameId::new(Mood::Work, 2)).unwrap();
        sink.show_text("hello").unwrap();
        assert_eq!(sink.last_frame(), Some(FrameId::new(Mood::Work, 2)));
        assert_eq!(sink.last_text(), Some("hello"));
    }
}
