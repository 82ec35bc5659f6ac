use crate::domain::models::ColorCommand;

/// Fixed, non-empty list of colors played by the pattern animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternPalette {
    colors: Vec<ColorCommand>,
}

impl PatternPalette {
    /// Returns `None` for an empty color list.
    pub fn new(colors: Vec<ColorCommand>) -> Option<Self> {
        if colors.is_empty() {
            None
        } else {
            Some(Self { colors })
        }
    }

    fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn get(&self, index: usize) -> ColorCommand {
        self.colors[index % self.colors.len()]
    }

    pub fn colors(&self) -> &[ColorCommand] {
        &self.colors
    }
}

/// Cycles through a [`PatternPalette`].
///
/// The sequencer only tracks the cursor and whether it is running; the owner
/// drives [`tick`](Self::tick) from its timer and decides where the emitted
/// color goes. The cursor survives `stop()`, so a later `start()` resumes
/// where the animation left off.
#[derive(Debug, Clone)]
pub struct PatternSequencer {
    palette: PatternPalette,
    cursor: usize,
    running: bool,
}

impl PatternSequencer {
    pub fn new(palette: PatternPalette) -> Self {
        Self {
            palette,
            cursor: 0,
            running: false,
        }
    }

    /// Returns `true` if the sequencer was stopped and is now running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    /// Returns `true` if the sequencer was running.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Emit the color under the cursor and advance it, wrapping at the end
    /// of the palette. Nothing is emitted while stopped.
    pub fn tick(&mut self) -> Option<ColorCommand> {
        if !self.running {
            return None;
        }
        let color = self.palette.get(self.cursor);
        self.cursor = (self.cursor + 1) % self.palette.len();
        Some(color)
    }
}
