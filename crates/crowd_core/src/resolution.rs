//! Adaptive resolution control: an a-priori estimate of accumulation
//! volume, coarsening time windows first and distance bins second until a
//! performance budget fits, while hotspot segments keep their original
//! resolution.
//!
//! This is a decision point, not a data structure: the output is a set of
//! grid parameters the run commits to before accumulation starts. There is
//! no mid-run cancellation; if the budget still cannot be met the run
//! completes and the overrun is surfaced as a warning, since truncated
//! crowd-safety output is worse than a slow run.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::course::{EventField, Segment};

/// Hard ceilings for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceBudget {
    pub max_wall_clock_sec: f64,
    pub max_cells: u64,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self {
            max_wall_clock_sec: 30.0,
            max_cells: 2_000_000,
        }
    }
}

/// Requested (pre-coarsening) grid parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub window_sec: f64,
    pub bin_len_m: f64,
    pub duration_sec: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            window_sec: 60.0,
            bin_len_m: 100.0,
            duration_sec: 6.0 * 3600.0,
        }
    }
}

/// The committed resolution for a run. `window_sec`/`bin_len_m` apply to
/// every non-hotspot segment; hotspots keep `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionPlan {
    pub base: GridSpec,
    pub window_sec: f64,
    pub bin_len_m: f64,
    pub time_factor: u32,
    pub distance_factor: u32,
    pub projected_cells: u64,
    pub projected_cost_sec: f64,
    pub over_budget: bool,
}

impl ResolutionPlan {
    pub fn coarsened(&self) -> bool {
        self.time_factor > 1 || self.distance_factor > 1
    }

    /// Resolution for one segment under this plan.
    pub fn for_segment(&self, segment_id: &str, hotspots: &BTreeSet<String>) -> (f64, f64) {
        if hotspots.contains(segment_id) {
            (self.base.window_sec, self.base.bin_len_m)
        } else {
            (self.window_sec, self.bin_len_m)
        }
    }
}

/// Doubling either axis more than this stops helping and starts hiding
/// structure the classification needs.
pub const MAX_COARSEN_FACTOR: u32 = 8;

/// Calibrated per-cell accumulation cost and per-(runner, window) mapping
/// cost, in seconds.
const CELL_COST_SEC: f64 = 4e-8;
const MAP_COST_SEC: f64 = 6e-9;

fn windows_for(duration_sec: f64, window_sec: f64) -> u64 {
    (duration_sec / window_sec).ceil() as u64
}

fn cells_for(segment: &Segment, window_sec: f64, bin_len_m: f64, duration_sec: f64) -> u64 {
    let bins = ((segment.length_m() / bin_len_m).ceil() as u64).max(1);
    windows_for(duration_sec, window_sec) * bins
}

/// Projected output cell count for a candidate resolution, hotspots held
/// at the base resolution.
pub fn projected_cells(
    segments: &[&Segment],
    base: &GridSpec,
    window_sec: f64,
    bin_len_m: f64,
    hotspots: &BTreeSet<String>,
) -> u64 {
    segments
        .iter()
        .map(|segment| {
            if hotspots.contains(&segment.id) {
                cells_for(segment, base.window_sec, base.bin_len_m, base.duration_sec)
            } else {
                cells_for(segment, window_sec, bin_len_m, base.duration_sec)
            }
        })
        .sum()
}

fn projected_cost_sec(cells: u64, total_runners: u64, windows: u64, n_segments: u64) -> f64 {
    cells as f64 * CELL_COST_SEC + (total_runners * windows * n_segments) as f64 * MAP_COST_SEC
}

/// Decides the grid resolution for a run: time windows are widened first
/// (doubling), distance bins second, each capped at
/// [`MAX_COARSEN_FACTOR`]. Hotspot segments are exempt throughout.
pub fn plan_resolution(
    segments: &[&Segment],
    events: &[EventField],
    base: &GridSpec,
    budget: &PerformanceBudget,
    hotspots: &BTreeSet<String>,
) -> ResolutionPlan {
    let total_runners: u64 = events.iter().map(|e| e.runners.len() as u64).sum();
    let n_segments = segments.len() as u64;

    let mut time_factor = 1u32;
    let mut distance_factor = 1u32;

    let fits = |tf: u32, df: u32| -> (u64, f64, bool) {
        let window_sec = base.window_sec * tf as f64;
        let bin_len_m = base.bin_len_m * df as f64;
        let cells = projected_cells(segments, base, window_sec, bin_len_m, hotspots);
        let windows = windows_for(base.duration_sec, window_sec);
        let cost = projected_cost_sec(cells, total_runners, windows, n_segments);
        let ok = cells <= budget.max_cells && cost <= budget.max_wall_clock_sec;
        (cells, cost, ok)
    };

    // Widen time windows first; temporal resolution is cheaper to give up
    // than the distance structure the flagging reads.
    while time_factor < MAX_COARSEN_FACTOR && !fits(time_factor, distance_factor).2 {
        time_factor *= 2;
        debug!("coarsening time windows to factor {time_factor}");
    }
    while distance_factor < MAX_COARSEN_FACTOR && !fits(time_factor, distance_factor).2 {
        distance_factor *= 2;
        debug!("coarsening distance bins to factor {distance_factor}");
    }

    let (projected, cost, ok) = fits(time_factor, distance_factor);
    if !ok {
        warn!(
            "run exceeds performance budget even at coarsest resolution \
             (projected {projected} cells, {cost:.1}s); completing anyway"
        );
    }

    ResolutionPlan {
        base: *base,
        window_sec: base.window_sec * time_factor as f64,
        bin_len_m: base.bin_len_m * distance_factor as f64,
        time_factor,
        distance_factor,
        projected_cells: projected,
        projected_cost_sec: cost,
        over_budget: !ok,
    }
}
