//! Export functionality for analysis
//!
//! Trajectory results are saved whole as JSON through
//! [`TrajectoryResult::save`](crate::inference::TrajectoryResult::save); this
//! module flattens their traces into CSV tables for plotting.

mod trace_csv;

pub use trace_csv::{PrecisionRecord, StepRecord, TraceCsvExporter};
