//! Output rendering - from score tables to terminal text.
//!
//! - Ranking mode: one bar chart per repository, best match first
//! - Weights mode: the learned nonzero weights in schema order

mod colors;
mod ranking;

pub use colors::Colorizer;
pub use ranking::RankingRenderer;
