//! Flow and convergence detection for designated (segment, event A,
//! event B) pairs.
//!
//! Spatial overlap of the two events' spans and temporal overlap of their
//! presence on that shared zone are established independently; convergence
//! requires both. A genuine overtake is an order reversal between two
//! runners within a short conflict length of each other across consecutive
//! samples — co-presence alone is counted separately and never inflates
//! the overtake numbers. Spatial-only pairs are a valid, common outcome,
//! not a detection failure.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::course::{Segment, SegmentSpan};
use crate::grid::TimeGrid;
use crate::mapping::EventArrays;
use crate::records::FlowRecord;

/// How the fast/slow runner pair for the convergence point is chosen.
/// The overtaking-heavier event supplies the fast runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepresentativePolicy {
    /// Fast = 25th-percentile pace of the overtaking event, slow =
    /// 75th-percentile pace of the other. Robust when both events share a
    /// pace distribution (median-vs-median lines would run parallel).
    #[default]
    FastSlowQuartile,
    /// Median-pace runner of each event.
    MedianPace,
}

/// Outcome of one pair analysis. All variants are valid results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowOutcome {
    Converged,
    SpatialOnlyNoTemporal,
    NoSpatialOverlap,
    /// One of the events has no runners at all.
    EmptyField,
}

/// Configuration for one segment-pair analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPairSpec {
    pub segment_id: String,
    pub event_a: String,
    pub event_b: String,
    /// Slack when testing temporal overlap of presence intervals.
    pub tolerance_sec: f64,
    /// Two runners closer than this are in conflict range.
    pub conflict_len_m: f64,
    /// How many illustrative runner ids to attach per event.
    pub sample_limit: usize,
    pub representative: RepresentativePolicy,
}

impl FlowPairSpec {
    pub fn new(
        segment_id: impl Into<String>,
        event_a: impl Into<String>,
        event_b: impl Into<String>,
    ) -> Self {
        Self {
            segment_id: segment_id.into(),
            event_a: event_a.into(),
            event_b: event_b.into(),
            tolerance_sec: 120.0,
            conflict_len_m: 10.0,
            sample_limit: 5,
            representative: RepresentativePolicy::default(),
        }
    }

    pub fn with_tolerance_sec(mut self, tolerance_sec: f64) -> Self {
        self.tolerance_sec = tolerance_sec;
        self
    }

    pub fn with_conflict_len_m(mut self, conflict_len_m: f64) -> Self {
        self.conflict_len_m = conflict_len_m;
        self
    }

    pub fn with_representative(mut self, policy: RepresentativePolicy) -> Self {
        self.representative = policy;
        self
    }
}

/// Presence interval of one event's field on a course zone, seconds since
/// anchor, clipped to the analysis duration.
fn presence_interval(arrays: &EventArrays, zone: &SegmentSpan, duration_sec: f64) -> Option<(f64, f64)> {
    let mut earliest = f64::INFINITY;
    let mut latest = f64::NEG_INFINITY;
    for i in 0..arrays.len() {
        earliest = earliest.min(arrays.time_at_km(i, zone.from_km));
        latest = latest.max(arrays.time_at_km(i, zone.to_km));
    }
    let start = earliest.max(0.0);
    let end = latest.min(duration_sec);
    (start < end).then_some((start, end))
}

fn intervals_overlap(a: (f64, f64), b: (f64, f64), tolerance_sec: f64) -> bool {
    a.0 <= b.1 + tolerance_sec && b.0 <= a.1 + tolerance_sec
}

/// Pace-quantile runner index: `q` in 0..=1 over the pace-sorted field
/// (0 = fastest).
fn pace_quantile_idx(arrays: &EventArrays, q: f64) -> usize {
    let sorted = arrays.indices_by_pace();
    let rank = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Where the position-time lines of runners `fast` (of `fast_ev`) and
/// `slow` (of `slow_ev`) cross, in course km. `None` when the lines are
/// parallel.
fn crossing_km(fast_ev: &EventArrays, fast: usize, slow_ev: &EventArrays, slow: usize) -> Option<f64> {
    let pf = fast_ev.pace_sec_per_km(fast);
    let ps = slow_ev.pace_sec_per_km(slow);
    if (ps - pf).abs() < 1e-9 {
        return None;
    }
    let af = fast_ev.abs_start_sec(fast);
    let als = slow_ev.abs_start_sec(slow);
    let t = (ps * af - pf * als) / (ps - pf);
    Some((t - af) / pf)
}

struct PairCounts {
    passers_a: BTreeSet<u32>,
    passers_b: BTreeSet<u32>,
    copresent_a: BTreeSet<u32>,
    copresent_b: BTreeSet<u32>,
}

/// Window-sampled overtake and co-presence counting over the shared zone.
fn count_interactions(
    arrays_a: &EventArrays,
    arrays_b: &EventArrays,
    zone: &SegmentSpan,
    grid: &TimeGrid,
    spec: &FlowPairSpec,
) -> PairCounts {
    let mut counts = PairCounts {
        passers_a: BTreeSet::new(),
        passers_b: BTreeSet::new(),
        copresent_a: BTreeSet::new(),
        copresent_b: BTreeSet::new(),
    };
    let mut counted_pairs: BTreeSet<(u32, u32)> = BTreeSet::new();
    let conflict_km = spec.conflict_len_m / 1000.0;
    let mut prev_t: Option<f64> = None;

    for w in 0..grid.n_windows() {
        let t = grid.window_midpoint_sec(w);
        let in_a = arrays_a.zone_positions_at(zone, t);
        if in_a.is_empty() {
            prev_t = Some(t);
            continue;
        }
        let mut in_b = arrays_b.zone_positions_at(zone, t);
        if in_b.is_empty() {
            prev_t = Some(t);
            continue;
        }
        in_b.sort_by(|x, y| x.1.total_cmp(&y.1));

        for &(ai, _) in &in_a {
            counts.copresent_a.insert(ai);
        }
        for &(bi, _) in &in_b {
            counts.copresent_b.insert(bi);
        }

        // Conflict-range neighbours only: positions are sorted, so each A
        // runner scans a short contiguous slice of B.
        for &(ai, akm) in &in_a {
            let from = in_b.partition_point(|&(_, bkm)| bkm < akm - conflict_km);
            for &(bi, bkm) in &in_b[from..] {
                if bkm > akm + conflict_km {
                    break;
                }
                let Some(tp) = prev_t else {
                    continue;
                };
                let prev_delta = arrays_a.position_km(ai as usize, tp)
                    - arrays_b.position_km(bi as usize, tp);
                let now_delta = akm - bkm;
                if prev_delta * now_delta < 0.0 && counted_pairs.insert((ai, bi)) {
                    if now_delta > 0.0 {
                        counts.passers_a.insert(ai);
                    } else {
                        counts.passers_b.insert(bi);
                    }
                }
            }
        }
        prev_t = Some(t);
    }
    counts
}

fn sample_ids(arrays: &EventArrays, set: &BTreeSet<u32>, limit: usize) -> Vec<u32> {
    set.iter().take(limit).map(|&i| arrays.runner_id(i)).collect()
}

fn empty_record(spec: &FlowPairSpec, outcome: FlowOutcome, spatial: bool, temporal: bool) -> FlowRecord {
    FlowRecord {
        segment_id: spec.segment_id.clone(),
        event_a: spec.event_a.clone(),
        event_b: spec.event_b.clone(),
        outcome,
        has_convergence: false,
        spatial_overlap: spatial,
        temporal_overlap: temporal,
        convergence_point_km: None,
        convergence_point_fraction: None,
        overtaking_count_a: 0,
        overtaking_count_b: 0,
        copresence_count_a: 0,
        copresence_count_b: 0,
        sample_runner_ids_a: Vec::new(),
        sample_runner_ids_b: Vec::new(),
    }
}

/// Analyzes one configured pair. `grid` is the fine (pre-coarsening) grid;
/// flow detection samples independently of whatever resolution the bin
/// engine settled on.
pub fn detect_flow(
    segment: &Segment,
    arrays_a: &EventArrays,
    arrays_b: &EventArrays,
    grid: &TimeGrid,
    spec: &FlowPairSpec,
) -> FlowRecord {
    if arrays_a.is_empty() || arrays_b.is_empty() {
        return empty_record(spec, FlowOutcome::EmptyField, false, false);
    }

    let (Some(span_a), Some(span_b)) = (
        segment.span_for(&spec.event_a),
        segment.span_for(&spec.event_b),
    ) else {
        return empty_record(spec, FlowOutcome::NoSpatialOverlap, false, false);
    };
    let Some(zone) = span_a.intersect(span_b) else {
        return empty_record(spec, FlowOutcome::NoSpatialOverlap, false, false);
    };

    let duration = grid.duration_sec();
    let presence_a = presence_interval(arrays_a, &zone, duration);
    let presence_b = presence_interval(arrays_b, &zone, duration);
    let temporal = match (presence_a, presence_b) {
        (Some(a), Some(b)) => intervals_overlap(a, b, spec.tolerance_sec),
        _ => false,
    };
    if !temporal {
        return empty_record(spec, FlowOutcome::SpatialOnlyNoTemporal, true, false);
    }

    let counts = count_interactions(arrays_a, arrays_b, &zone, grid, spec);

    // The event with more passing runners supplies the fast representative;
    // a tie goes to the later-starting event, which is the one catching up.
    let a_overtakes = counts.passers_a.len() >= counts.passers_b.len()
        && !(counts.passers_a.len() == counts.passers_b.len()
            && arrays_b.abs_start_sec(0) > arrays_a.abs_start_sec(0));
    let (fast_ev, slow_ev) = if a_overtakes {
        (arrays_a, arrays_b)
    } else {
        (arrays_b, arrays_a)
    };
    let (fast_q, slow_q) = match spec.representative {
        RepresentativePolicy::FastSlowQuartile => (0.25, 0.75),
        RepresentativePolicy::MedianPace => (0.5, 0.5),
    };
    let fast = pace_quantile_idx(fast_ev, fast_q);
    let slow = pace_quantile_idx(slow_ev, slow_q);
    let point_km = crossing_km(fast_ev, fast, slow_ev, slow)
        .map(|km| km.clamp(zone.from_km, zone.to_km));
    let fraction = point_km.map(|km| (km - zone.from_km) / zone.length_km());

    FlowRecord {
        segment_id: spec.segment_id.clone(),
        event_a: spec.event_a.clone(),
        event_b: spec.event_b.clone(),
        outcome: FlowOutcome::Converged,
        has_convergence: true,
        spatial_overlap: true,
        temporal_overlap: true,
        convergence_point_km: point_km,
        convergence_point_fraction: fraction,
        overtaking_count_a: counts.passers_a.len() as u32,
        overtaking_count_b: counts.passers_b.len() as u32,
        copresence_count_a: counts.copresent_a.len() as u32,
        copresence_count_b: counts.copresent_b.len() as u32,
        sample_runner_ids_a: sample_ids(arrays_a, &counts.copresent_a, spec.sample_limit),
        sample_runner_ids_b: sample_ids(arrays_b, &counts.copresent_b, spec.sample_limit),
    }
}
