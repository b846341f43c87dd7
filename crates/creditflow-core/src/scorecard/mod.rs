//! Scorecard scoring: weight of evidence, points scaling and binning.
//!
//! - `woe` -- WOE/IV per attribute and the points-to-odds scaling
//! - `calculator` -- attribute matching and total score computation
//! - `binning` -- equal-width / equal-frequency bins and automatic WOE binning

pub mod binning;
pub mod calculator;
pub mod woe;

pub use calculator::{describe, score};
pub use woe::Scaling;
