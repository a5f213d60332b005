//! Pure computations over completion histories. Nothing in here reads a clock or touches
//! storage, "today" and the day boundary are always passed in.

pub mod day;
pub mod heatmap;
pub mod momentum;
pub mod series;
pub mod streak;
