use crate::display::status_text;
use crate::{
    DisplaySink, EstimateSnapshot, FrameId, FrameSequencer, Mood, Result, SharedEstimate,
};

/// Presentation side of the pipeline: turns the shared estimate into frame
/// and text updates on a [`DisplaySink`].
///
/// Every tick reads the store without blocking. When the writer holds the
/// lock the tick falls back to the last snapshot it managed to read.
#[derive(Debug)]
pub struct Presenter<D> {
    store: SharedEstimate,
    sequencer: FrameSequencer,
    display: D,
    last_known: EstimateSnapshot,
}

impl<D: DisplaySink> Presenter<D> {
    pub fn new(store: SharedEstimate, sequencer: FrameSequencer, display: D) -> Self {
        let last_known = store.try_read().unwrap_or_default();
        Self {
            store,
            sequencer,
            display,
            last_known,
        }
    }

    /// Shows the sequencer's starting frame and status text.
    pub fn show_initial(&mut self) -> Result<()> {
        self.display.show_frame(self.sequencer.current_frame())?;
        let text = status_text(self.last_known, self.sequencer.mood());
        self.display.show_text(&text)
    }

    pub fn animation_tick(&mut self) -> Result<FrameId> {
        let estimate = self.refresh();
        let frame = self.sequencer.advance(estimate);
        self.display.show_frame(frame)?;
        Ok(frame)
    }

    pub fn text_tick(&mut self) -> Result<String> {
        let estimate = self.refresh();
        let text = status_text(estimate, self.sequencer.mood());
        self.display.show_text(&text)?;
        Ok(text)
    }

    pub fn mood(&self) -> Mood {
        self.sequencer.mood()
    }

    pub fn last_known(&self) -> EstimateSnapshot {
        self.last_known
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn into_display(self) -> D {
        self.display
    }

    fn refresh(&mut self) -> EstimateSnapshot {
        match self.store.try_read() {
            Some(snapshot) => self.last_known = snapshot,
            None => tracing::trace!("shared estimate busy, reusing last value"),
        }
        self.last_known
    }
}
