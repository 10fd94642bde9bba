use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use noise_mood_core::{DisplaySink, FrameId, Result};

/// Single-line status display on stdout.
///
/// The line is only repainted when the frame or the text actually changes.
pub struct TerminalDisplay<W: Write = io::Stdout> {
    out: W,
    frame: Option<FrameId>,
    text: String,
    dirty: bool,
}

impl TerminalDisplay {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frame: None,
            text: String::new(),
            dirty: false,
        }
    }

    fn repaint(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let frame = self
            .frame
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        let line = format!("[{frame:<8}] {}", self.text);
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
        self.out.flush()?;
        self.dirty = false;
        Ok(())
    }

    /// Ends the status line so later output starts on a fresh line.
    pub fn finish(&mut self) -> Result<()> {
        writeln!(self.out)?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for TerminalDisplay<W> {
    fn show_frame(&mut self, frame: FrameId) -> Result<()> {
        if self.frame != Some(frame) {
            self.frame = Some(frame);
            self.dirty = true;
        }
        self.repaint()
    }

    fn show_text(&mut self, text: &str) -> Result<()> {
        if self.text != text {
            self.text = text.to_string();
            self.dirty = true;
        }
        self.repaint()
    }
}
