mod support;

use crowd_core::accumulate::{BinArena, SegmentGrid};
use crowd_core::grid::TimeGrid;
use crowd_core::mapping::EventArrays;
use support::{explicit_field, seeded_scenario};

#[test]
fn accumulated_mass_matches_the_sampled_occupancy() {
    let (course, events) = seeded_scenario(200);
    let grid = TimeGrid::build(&events, 60.0, 6.0 * 3600.0).unwrap();
    let (valid, errors) = course.validate();
    assert!(errors.is_empty());

    let (mut arena, bin_errors) =
        BinArena::build(valid.iter().copied(), |_| (grid.n_windows(), 60.0, 100.0));
    assert!(bin_errors.is_empty());

    let arrays: Vec<EventArrays> = events
        .iter()
        .map(|f| EventArrays::from_field(f, &grid))
        .collect();

    let mut expected: u64 = 0;
    for seg_grid in &mut arena.segments {
        let segment = course.segment(&seg_grid.segment_id).unwrap();
        for event_arrays in &arrays {
            let Some(span) = segment.span_for(&event_arrays.event) else {
                continue;
            };
            for w in 0..grid.n_windows() {
                let occ = event_arrays.occupancy_at(span, grid.window_midpoint_sec(w));
                expected += occ.len() as u64;
                seg_grid.record(w, &occ);
            }
        }
    }
    assert!(expected > 0, "a 200-runner field must occupy the course");
    assert_eq!(arena.total_count(), expected);
}

#[test]
fn coarsening_conserves_mass_on_a_real_field() {
    let (course, events) = seeded_scenario(150);
    let fine = TimeGrid::build(&events, 60.0, 6.0 * 3600.0).unwrap();
    let coarse = fine.coarsen(4);

    let segment = course.segment("embankment").unwrap();
    let mut grid = SegmentGrid::new(segment, fine.n_windows(), 60.0, 100.0).unwrap();
    let arrays: Vec<EventArrays> = events
        .iter()
        .map(|f| EventArrays::from_field(f, &fine))
        .collect();
    for event_arrays in &arrays {
        let span = segment.span_for(&event_arrays.event).unwrap();
        for w in 0..fine.n_windows() {
            grid.record(w, &event_arrays.occupancy_at(span, fine.window_midpoint_sec(w)));
        }
    }
    assert!(grid.total_count() > 0);

    let remapped = grid.coarsen_time(&coarse);
    assert_eq!(remapped.total_count(), grid.total_count());

    let widened = remapped.coarsen_distance(4);
    assert_eq!(widened.total_count(), grid.total_count());
    assert_eq!(widened.n_bins(), grid.n_bins().div_ceil(4));
}

#[test]
fn derived_metrics_follow_the_density_and_throughput_identities() {
    // One 3 m/s runner on a 5 m wide, 100 m binned segment.
    let events = vec![explicit_field("race", 540.0, &[1000.0 / 3.0])];
    let grid = TimeGrid::build(&events, 60.0, 3600.0).unwrap();
    let segment = crowd_core::test_helpers::simple_segment("s", 5.0, 0.0, 1.0);
    let arrays = EventArrays::from_field(&events[0], &grid);
    let span = segment.span_for("race").unwrap();

    let mut seg_grid = SegmentGrid::new(&segment, grid.n_windows(), 60.0, 100.0).unwrap();
    for w in 0..grid.n_windows() {
        seg_grid.record(w, &arrays.occupancy_at(span, grid.window_midpoint_sec(w)));
    }

    let occupied: Vec<_> = seg_grid.finalize().into_iter().filter(|c| c.count > 0).collect();
    assert!(!occupied.is_empty());
    for cell in occupied {
        assert!((cell.density - cell.count as f64 / (100.0 * 5.0)).abs() < 1e-12);
        let mean = cell.mean_speed_m_s.unwrap();
        assert!((mean - 3.0).abs() < 1e-9);
        assert!((cell.rate - cell.density * 5.0 * mean).abs() < 1e-12);
    }
}
