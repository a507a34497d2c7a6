//! Multi-criterion screening over indicator snapshots.
//!
//! A symbol is selected for prediction when its RSI sits inside the
//! configured band, its relative volume exceeds the minimum and its latest
//! close has just broken above the pivot.

pub mod filter;

pub use filter::{FilterResult, ScreeningFilter, ScreeningThresholds};
