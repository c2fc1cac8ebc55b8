//! Run orchestration: one analysis invocation over a fixed, already-loaded
//! dataset.
//!
//! The pipeline is: validate geometry, build the global time grid, commit
//! a resolution plan, map and accumulate every event against the same
//! grid, finalize and classify, then run flow detection for the configured
//! pairs. Per-segment and per-pair failures are isolated; anchoring
//! failures abort the run.

use std::collections::BTreeSet;
use std::time::Instant;

use log::warn;

use crate::accumulate::BinArena;
use crate::classify::{percentile_cutoff, FlaggingPolicy, LosGrade, SegmentFlagSummary, Severity};
use crate::course::{Course, EventField};
use crate::error::{ConfigError, EngineError};
use crate::flow::{detect_flow, FlowPairSpec};
use crate::grid::TimeGrid;
use crate::mapping::EventArrays;
use crate::records::{BinRecord, FlowRecord, RunMetadata};
use crate::resolution::{plan_resolution, GridSpec, PerformanceBudget};

/// Everything one run needs beyond the course and the runner tables.
#[derive(Debug, Clone)]
pub struct AnalysisParams {
    pub grid: GridSpec,
    pub budget: PerformanceBudget,
    /// Segments exempt from coarsening.
    pub hotspots: BTreeSet<String>,
    pub policy: FlaggingPolicy,
    pub flow_pairs: Vec<FlowPairSpec>,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            grid: GridSpec::default(),
            budget: PerformanceBudget::default(),
            hotspots: BTreeSet::new(),
            policy: FlaggingPolicy::standard(),
            flow_pairs: Vec::new(),
        }
    }
}

impl AnalysisParams {
    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_budget(mut self, budget: PerformanceBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_hotspot(mut self, segment_id: impl Into<String>) -> Self {
        self.hotspots.insert(segment_id.into());
        self
    }

    pub fn with_policy(mut self, policy: FlaggingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_flow_pair(mut self, pair: FlowPairSpec) -> Self {
        self.flow_pairs.push(pair);
        self
    }
}

/// The full output of one run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub bins: Vec<BinRecord>,
    pub flows: Vec<FlowRecord>,
    pub summaries: Vec<SegmentFlagSummary>,
    pub metadata: RunMetadata,
}

/// Executes one analysis run. Course and runner tables are read-only
/// throughout; only the output structures are written.
pub fn run_analysis(
    course: &Course,
    events: &[EventField],
    params: &AnalysisParams,
) -> Result<AnalysisOutput, EngineError> {
    let started = Instant::now();
    let mut warnings = Vec::new();

    let (valid_segments, geometry_errors) = course.validate();
    for err in &geometry_errors {
        warn!("{err}");
        warnings.push(err.to_string());
    }

    // The shared grid is built once; every event resolves against it. The
    // plan only widens windows/bins, it never moves the anchor.
    let fine = TimeGrid::build(events, params.grid.window_sec, params.grid.duration_sec)?;
    let plan = plan_resolution(
        &valid_segments,
        events,
        &params.grid,
        &params.budget,
        &params.hotspots,
    );
    if plan.over_budget {
        warnings.push(format!(
            "performance budget exceeded: projected {} cells, {:.1}s at coarsest allowed resolution",
            plan.projected_cells, plan.projected_cost_sec
        ));
    }
    let coarse = fine.coarsen(plan.time_factor);

    let (mut arena, bin_errors) = BinArena::build(valid_segments.iter().copied(), |segment| {
        let (window_sec, bin_len_m) = plan.for_segment(&segment.id, &params.hotspots);
        let n_windows = if params.hotspots.contains(&segment.id) {
            fine.n_windows()
        } else {
            coarse.n_windows()
        };
        (n_windows, window_sec, bin_len_m)
    });
    for err in &bin_errors {
        warnings.push(err.to_string());
    }

    let arrays: Vec<EventArrays> = events
        .iter()
        .map(|field| EventArrays::from_field(field, &fine))
        .collect();

    // Events are mapped one at a time, but window indices come from the
    // same grid whichever order they run in.
    for seg_grid in &mut arena.segments {
        let Some(segment) = course.segment(&seg_grid.segment_id) else {
            continue;
        };
        let grid = if params.hotspots.contains(&segment.id) {
            &fine
        } else {
            &coarse
        };
        for event_arrays in &arrays {
            let Some(span) = segment.span_for(&event_arrays.event) else {
                continue;
            };
            for w in 0..grid.n_windows() {
                let occ = event_arrays.occupancy_at(span, grid.window_midpoint_sec(w));
                if !occ.is_empty() {
                    seg_grid.record(w, &occ);
                }
            }
        }
    }

    // Classification: resolve schemas first, then one population-wide
    // cutoff over the segments that will actually classify. Densities of
    // excluded segments must not shape the cutoff applied to the rest.
    let mut classified = Vec::new();
    for seg_grid in &arena.segments {
        let Some(segment) = course.segment(&seg_grid.segment_id) else {
            continue;
        };
        match params.policy.table_for(segment) {
            Ok(table) => classified.push((seg_grid, seg_grid.finalize(), table)),
            Err(err) => {
                warn!("{err}");
                warnings.push(err.to_string());
            }
        }
    }
    let densities: Vec<f64> = classified
        .iter()
        .flat_map(|(_, cells, _)| cells.iter().map(|c| c.density))
        .collect();
    let cutoff = percentile_cutoff(&densities, params.policy.percentile);

    let mut bins = Vec::new();
    let mut summaries = Vec::new();
    for (seg_grid, cells, table) in &classified {
        let mut worst_los = LosGrade::A;
        let mut flagged_cells = 0u64;
        let mut peak_density = 0.0f64;
        for cell in cells {
            let grade = table.grade(cell.density);
            let severity = params.policy.severity(grade, cell.density, cutoff);
            if cell.count > 0 {
                worst_los = worst_los.max(grade);
                peak_density = peak_density.max(cell.density);
            }
            if severity != Severity::None {
                flagged_cells += 1;
            }
            bins.push(BinRecord {
                segment_id: seg_grid.segment_id.clone(),
                start_km: seg_grid.origin_km + cell.start_m / 1000.0,
                end_km: seg_grid.origin_km + cell.end_m / 1000.0,
                t_start: cell.t_start_sec,
                t_end: cell.t_end_sec,
                density: cell.density,
                rate: cell.rate,
                los_grade: grade,
                severity,
            });
        }
        summaries.push(SegmentFlagSummary {
            segment_id: seg_grid.segment_id.clone(),
            worst_los,
            flagged_cells,
            peak_density,
        });
    }

    // Flow detection samples the fine grid, independent of bin resolution.
    let mut flows = Vec::new();
    for pair in &params.flow_pairs {
        let Some(segment) = course.segment(&pair.segment_id) else {
            let err = ConfigError::UnknownFlowSegment {
                segment: pair.segment_id.clone(),
            };
            warn!("{err}");
            warnings.push(err.to_string());
            continue;
        };
        let (Some(arrays_a), Some(arrays_b)) = (
            arrays.iter().find(|a| a.event == pair.event_a),
            arrays.iter().find(|a| a.event == pair.event_b),
        ) else {
            let missing = if arrays.iter().any(|a| a.event == pair.event_a) {
                pair.event_b.clone()
            } else {
                pair.event_a.clone()
            };
            let err = ConfigError::UnknownFlowEvent { event: missing };
            warn!("{err}");
            warnings.push(err.to_string());
            continue;
        };
        flows.push(detect_flow(segment, arrays_a, arrays_b, &fine, pair));
    }

    let metadata = RunMetadata {
        anchor_minutes: fine.anchor_minutes(),
        requested_window_sec: params.grid.window_sec,
        requested_bin_len_m: params.grid.bin_len_m,
        effective_window_sec: plan.window_sec,
        effective_bin_len_m: plan.bin_len_m,
        time_factor: plan.time_factor,
        distance_factor: plan.distance_factor,
        projected_cells: plan.projected_cells,
        emitted_cells: bins.len() as u64,
        over_budget: plan.over_budget,
        wall_clock_sec: started.elapsed().as_secs_f64(),
        warnings,
    };

    Ok(AnalysisOutput {
        bins,
        flows,
        summaries,
        metadata,
    })
}
