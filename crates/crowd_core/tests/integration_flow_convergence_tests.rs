mod support;

use crowd_core::flow::{detect_flow, FlowOutcome, FlowPairSpec};
use crowd_core::grid::TimeGrid;
use crowd_core::mapping::EventArrays;
use crowd_core::scenario::{HALF, MARATHON};
use support::seeded_scenario;

#[test]
fn the_narrows_converge_on_a_seeded_field() {
    let (course, events) = seeded_scenario(300);
    let grid = TimeGrid::build(&events, 30.0, 6.0 * 3600.0).unwrap();
    let marathon = EventArrays::from_field(&events[0], &grid);
    let half = EventArrays::from_field(&events[1], &grid);
    let segment = course.segment("riverside_narrows").unwrap();

    let spec = FlowPairSpec::new("riverside_narrows", MARATHON, HALF).with_conflict_len_m(25.0);
    let record = detect_flow(segment, &marathon, &half, &grid, &spec);

    assert_eq!(record.outcome, FlowOutcome::Converged);
    assert!(record.spatial_overlap && record.temporal_overlap);
    let km = record.convergence_point_km.unwrap();
    assert!((9.4..=10.6).contains(&km));
    let fraction = record.convergence_point_fraction.unwrap();
    assert!((0.0..=1.0).contains(&fraction));

    // 300 runners per event through a 1.2 km zone must co-occupy it.
    assert!(record.copresence_count_a > 0);
    assert!(record.copresence_count_b > 0);
    assert!(record.overtaking_count_a <= record.copresence_count_a);
    assert!(record.overtaking_count_b <= record.copresence_count_b);
    // A genuine pass needs an order reversal, so passers are rarer than
    // co-present runners in a dense mixed field.
    assert!(
        record.overtaking_count_a + record.overtaking_count_b > 0,
        "mixed pace fields 20 minutes apart must produce real passes"
    );

    assert!(record.sample_runner_ids_a.len() <= spec.sample_limit);
    assert!(record.sample_runner_ids_b.len() <= spec.sample_limit);
    assert!(record.sample_runner_ids_b.iter().all(|&id| id < 300));
}

#[test]
fn disjoint_finish_spans_are_spatial_non_overlap() {
    let (course, events) = seeded_scenario(50);
    let grid = TimeGrid::build(&events, 60.0, 6.0 * 3600.0).unwrap();
    let marathon = EventArrays::from_field(&events[0], &grid);
    let half = EventArrays::from_field(&events[1], &grid);
    let segment = course.segment("finish_straight").unwrap();

    let spec = FlowPairSpec::new("finish_straight", MARATHON, HALF);
    let record = detect_flow(segment, &marathon, &half, &grid, &spec);

    assert_eq!(record.outcome, FlowOutcome::NoSpatialOverlap);
    assert!(!record.has_convergence);
    assert_eq!(record.overtaking_count_a, 0);
    assert_eq!(record.copresence_count_b, 0);
}

#[test]
fn flow_results_are_reproducible() {
    let (course, events) = seeded_scenario(120);
    let grid = TimeGrid::build(&events, 30.0, 6.0 * 3600.0).unwrap();
    let marathon = EventArrays::from_field(&events[0], &grid);
    let half = EventArrays::from_field(&events[1], &grid);
    let segment = course.segment("riverside_narrows").unwrap();
    let spec = FlowPairSpec::new("riverside_narrows", MARATHON, HALF);

    let first = detect_flow(segment, &marathon, &half, &grid, &spec);
    let second = detect_flow(segment, &marathon, &half, &grid, &spec);
    assert_eq!(first, second);
}
