mod support;

use crowd_core::analysis::{run_analysis, AnalysisParams};
use crowd_core::flow::{FlowOutcome, FlowPairSpec};
use crowd_core::resolution::{GridSpec, PerformanceBudget};
use crowd_core::scenario::{HALF, MARATHON};
use support::seeded_scenario;

fn default_pairs() -> Vec<FlowPairSpec> {
    vec![
        FlowPairSpec::new("riverside_narrows", MARATHON, HALF),
        FlowPairSpec::new("finish_straight", MARATHON, HALF),
    ]
}

#[test]
fn end_to_end_run_produces_the_full_record_set() {
    let (course, events) = seeded_scenario(250);
    let mut params = AnalysisParams::default();
    params.flow_pairs = default_pairs();
    let output = run_analysis(&course, &events, &params).unwrap();

    assert_eq!(output.summaries.len(), course.segments.len());
    assert_eq!(output.flows.len(), 2);
    assert_eq!(output.flows[0].outcome, FlowOutcome::Converged);
    assert_eq!(output.flows[1].outcome, FlowOutcome::NoSpatialOverlap);
    assert_eq!(output.metadata.emitted_cells, output.bins.len() as u64);
    assert!(!output.metadata.over_budget);
    assert_eq!(output.metadata.time_factor, 1);
    assert!(output.metadata.wall_clock_sec >= 0.0);
    assert_eq!(output.metadata.anchor_minutes, 540.0);
}

#[test]
fn reruns_on_the_same_input_are_bit_identical() {
    let (course, events) = seeded_scenario(200);
    let mut params = AnalysisParams::default();
    params.flow_pairs = default_pairs();

    let first = run_analysis(&course, &events, &params).unwrap();
    let second = run_analysis(&course, &events, &params).unwrap();
    // Wall clock differs between runs; every analytical output must not.
    assert_eq!(first.bins, second.bins);
    assert_eq!(first.flows, second.flows);
    assert_eq!(first.summaries, second.summaries);
    assert_eq!(first.metadata.warnings, second.metadata.warnings);
}

#[test]
fn tight_budget_coarsens_but_hotspots_keep_their_resolution() {
    let (course, events) = seeded_scenario(100);
    let base = GridSpec::default();
    let params = AnalysisParams::default()
        .with_grid(base)
        .with_budget(PerformanceBudget {
            max_wall_clock_sec: 1e9,
            max_cells: 8_000,
        })
        .with_hotspot("riverside_narrows");
    let output = run_analysis(&course, &events, &params).unwrap();

    assert!(output.metadata.time_factor > 1);
    assert!(output.metadata.effective_window_sec > base.window_sec);

    // Hotspot bins stay on the requested window; the rest widen.
    let narrows_window = output
        .bins
        .iter()
        .find(|b| b.segment_id == "riverside_narrows")
        .map(|b| b.t_end - b.t_start)
        .unwrap();
    let embankment_window = output
        .bins
        .iter()
        .find(|b| b.segment_id == "embankment")
        .map(|b| b.t_end - b.t_start)
        .unwrap();
    assert_eq!(narrows_window, base.window_sec);
    assert_eq!(embankment_window, output.metadata.effective_window_sec);
}

#[test]
fn invalid_segment_is_excluded_without_sinking_the_run() {
    let (mut course, events) = seeded_scenario(60);
    course.segments[0].width_m = -3.0;
    let output = run_analysis(&course, &events, &AnalysisParams::default()).unwrap();

    assert!(output.bins.iter().all(|b| b.segment_id != "start_corral"));
    assert!(output
        .metadata
        .warnings
        .iter()
        .any(|w| w.contains("start_corral")));
    // The other three segments still report.
    assert_eq!(output.summaries.len(), 3);
}
