//! ANSI color helpers for ranking output.
//!
//! Color scheme:
//! - Repository headers bold blue
//! - The reference login highlighted so it is easy to spot in its own ranking
//! - Score bars cyan, metric names green, weights dimmed

use owo_colors::{OwoColorize, Style};

/// Applies styles only when color output is enabled.
#[derive(Debug, Clone, Copy)]
pub struct Colorizer {
    pub enabled: bool,
}

impl Colorizer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn paint(&self, s: &str, style: Style) -> String {
        if self.enabled {
            s.style(style).to_string()
        } else {
            s.to_string()
        }
    }

    pub fn header(&self, s: &str) -> String {
        self.paint(s, Style::new().bright_blue().bold())
    }

    pub fn reference_login(&self, s: &str) -> String {
        self.paint(s, Style::new().bright_magenta().bold())
    }

    pub fn login(&self, s: &str) -> String {
        s.to_string()
    }

    pub fn bar(&self, s: &str) -> String {
        self.paint(s, Style::new().cyan())
    }

    pub fn metric(&self, s: &str) -> String {
        self.paint(s, Style::new().green())
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint(s, Style::new().dimmed())
    }
}
