//! Simple to use cli for keeping habits and tasks. Completions are stored as an append-only log,
//! streaks are recomputed from it on every read and a year of activity can be printed as a
//! contribution style heatmap right in the terminal.
//!

pub mod cli;
pub mod engine;
pub mod storage;
pub mod tracker;
pub mod utils;
