use crate::prefs::Prefs;
use crate::render::{ReferenceStyle, Surface};

/// Width at or below which the layout collapses and the navigation panel
/// disappears.
pub const DEFAULT_BREAKPOINT: u16 = 810;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compact,
    Full,
}

/// Watches the layout width and applies the presentation side effects that
/// belong to a mode switch. Navigation state is untouched; the controller
/// only consults [`Viewport::is_compact`] when an intent arrives.
#[derive(Debug)]
pub struct Viewport {
    breakpoint: u16,
    mode: Option<Mode>,
}

impl Viewport {
    pub fn new(breakpoint: u16) -> Self {
        Self {
            breakpoint,
            mode: None,
        }
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn is_compact(&self) -> bool {
        self.mode == Some(Mode::Compact)
    }

    /// Feeds a new layout width. Returns the mode entered when this width
    /// crosses the breakpoint, applying the transition side effects; returns
    /// `None` when the mode is unchanged.
    pub fn update(&mut self, width: u16, prefs: &Prefs, surface: &mut dyn Surface) -> Option<Mode> {
        let next = if width <= self.breakpoint {
            Mode::Compact
        } else {
            Mode::Full
        };
        if self.mode == Some(next) {
            return None;
        }
        self.mode = Some(next);

        match next {
            Mode::Compact => {
                surface.set_compact(true);
                surface.set_reference_style(ReferenceStyle::Superscript);
            }
            Mode::Full => {
                surface.set_compact(false);
                surface.set_reference_style(ReferenceStyle::Asterisk);
                let offset = prefs.scroll_offset();
                if offset > 0 {
                    surface.scroll_to(offset);
                }
            }
        }
        Some(next)
    }
}
