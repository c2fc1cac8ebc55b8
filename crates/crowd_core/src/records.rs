//! Flat output contracts consumed by reporting and UI collaborators.
//!
//! Both record streams are schema-stable: downstream consumers never need
//! to know the grid resolution a run settled on. Times are seconds since
//! the run's anchor; [`RunMetadata`] carries the anchor for conversion to
//! clock time.

use serde::{Deserialize, Serialize};

use crate::classify::{LosGrade, Severity};
use crate::flow::FlowOutcome;

/// One row per segment × distance-bin × time-window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinRecord {
    pub segment_id: String,
    pub start_km: f64,
    pub end_km: f64,
    pub t_start: f64,
    pub t_end: f64,
    pub density: f64,
    pub rate: f64,
    pub los_grade: LosGrade,
    pub severity: Severity,
}

/// One row per configured (segment, event pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub segment_id: String,
    pub event_a: String,
    pub event_b: String,
    pub outcome: FlowOutcome,
    pub has_convergence: bool,
    pub spatial_overlap: bool,
    pub temporal_overlap: bool,
    pub convergence_point_km: Option<f64>,
    pub convergence_point_fraction: Option<f64>,
    pub overtaking_count_a: u32,
    pub overtaking_count_b: u32,
    pub copresence_count_a: u32,
    pub copresence_count_b: u32,
    pub sample_runner_ids_a: Vec<u32>,
    pub sample_runner_ids_b: Vec<u32>,
}

/// Run-level metadata: the resolution the run committed to, what it
/// produced, and any warnings (budget overruns, excluded segments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Minutes from midnight of the earliest event start (window 0).
    pub anchor_minutes: f64,
    pub requested_window_sec: f64,
    pub requested_bin_len_m: f64,
    pub effective_window_sec: f64,
    pub effective_bin_len_m: f64,
    pub time_factor: u32,
    pub distance_factor: u32,
    pub projected_cells: u64,
    pub emitted_cells: u64,
    pub over_budget: bool,
    pub wall_clock_sec: f64,
    pub warnings: Vec<String>,
}
