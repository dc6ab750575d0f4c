//! Ranked score tables as terminal bar charts.
//!
//! ```text
//! seifferth/pandoc-filters
//!   1. seifferth          ████████████████████  5.2134
//!   2. jgm                ███████████           2.9021
//!   3. ghost                                    -inf
//! ```
//!
//! Bars scale linearly between the lowest and highest finite display
//! score. Logins with no finite display score get no bar.

use std::fmt::Write;

use super::colors::Colorizer;
use crate::metrics::{Metric, WeightMap};
use crate::scoring::ScoreTable;

const BAR_CHAR: char = '█';

pub struct RankingRenderer {
    colors: Colorizer,
    bar_width: usize,
    /// Login to highlight (the reference contributor).
    highlight: Option<String>,
}

impl RankingRenderer {
    pub fn new(color: bool) -> Self {
        Self {
            colors: Colorizer::new(color),
            bar_width: 30,
            highlight: None,
        }
    }

    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width;
        self
    }

    pub fn with_highlight(mut self, login: impl Into<String>) -> Self {
        self.highlight = Some(login.into());
        self
    }

    pub fn render(&self, repo: &str, table: &ScoreTable) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.colors.header(repo));

        let finite: Vec<f64> = table
            .entries
            .iter()
            .map(|e| e.display)
            .filter(|d| d.is_finite())
            .collect();
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = (max - min).max(f64::EPSILON);
        let name_width = table
            .entries
            .iter()
            .map(|e| e.login.chars().count())
            .max()
            .unwrap_or(0);

        for (rank, entry) in table.entries.iter().enumerate() {
            let bar_len = if entry.display.is_finite() {
                // The lowest finite score still gets one block.
                (((entry.display - min) / range) * self.bar_width.saturating_sub(1) as f64).round() as usize + 1
            } else {
                0
            };
            let bar: String = std::iter::repeat_n(BAR_CHAR, bar_len.min(self.bar_width)).collect();
            let padded = format!("{:<name_width$}", entry.login);
            let login = if self.highlight.as_deref() == Some(entry.login.as_str()) {
                self.colors.reference_login(&padded)
            } else {
                self.colors.login(&padded)
            };
            let _ = writeln!(
                out,
                "{:>4}. {}  {:<width$}  {:.4}",
                rank + 1,
                login,
                self.colors.bar(&bar),
                entry.display,
                width = self.bar_width,
            );
        }
        out
    }

    /// Nonzero weights, one per line, in schema order.
    pub fn render_weights(&self, weights: &WeightMap) -> String {
        let mut out = String::new();
        let active: Vec<(Metric, f64)> = weights.iter().filter(|(_, w)| *w != 0.0).collect();
        if active.is_empty() {
            let _ = writeln!(out, "{}", self.colors.dim("(no metric received a nonzero weight)"));
            return out;
        }
        let width = active.iter().map(|(m, _)| m.name().len()).max().unwrap_or(0);
        for (metric, w) in active {
            let name = format!("{:<width$}", metric.name());
            let _ = writeln!(out, "  {}  {}", self.colors.metric(&name), self.colors.dim(&format!("{w:.6}")));
        }
        out
    }
}
