//! Scenario setup: generate a synthetic two-event course and runner fields
//! with seeded random paces and corral-release start offsets.
//!
//! The generated course is a city-race shape: a shared start corral, an
//! open embankment stretch, a narrow riverside merge both events funnel
//! through, and separate finish straights.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use crate::course::{Course, EventField, Runner, Segment, SegmentSpan};
use crate::distributions::{NormalPace, PaceDistribution};

pub const MARATHON: &str = "marathon";
pub const HALF: &str = "half";

/// Default gun times, minutes from midnight: marathon 09:00, half 09:20.
const DEFAULT_FIRST_START_MIN: f64 = 540.0;
const DEFAULT_START_GAP_MIN: f64 = 20.0;

/// Default corral release window: the field crosses the line over 10 min.
const DEFAULT_RELEASE_WINDOW_SEC: f64 = 600.0;

/// Parameters for building a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    pub runners_per_event: usize,
    /// Random seed for reproducibility (optional; if None, uses entropy).
    pub seed: Option<u64>,
    pub first_start_minutes: f64,
    pub start_gap_minutes: f64,
    /// Seconds over which each field crosses its own start line.
    pub release_window_sec: f64,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            runners_per_event: 1000,
            seed: None,
            first_start_minutes: DEFAULT_FIRST_START_MIN,
            start_gap_minutes: DEFAULT_START_GAP_MIN,
            release_window_sec: DEFAULT_RELEASE_WINDOW_SEC,
        }
    }
}

impl ScenarioParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_runners_per_event(mut self, runners: usize) -> Self {
        self.runners_per_event = runners;
        self
    }

    /// Gap between the two gun times in minutes.
    pub fn with_start_gap_minutes(mut self, gap: f64) -> Self {
        self.start_gap_minutes = gap;
        self
    }

    pub fn with_release_window_sec(mut self, window_sec: f64) -> Self {
        self.release_window_sec = window_sec;
        self
    }
}

fn spans_for(entries: &[(&str, f64, f64)]) -> BTreeMap<String, SegmentSpan> {
    entries
        .iter()
        .map(|&(event, from, to)| (event.to_string(), SegmentSpan::new(from, to)))
        .collect()
}

/// The synthetic course both events run over.
pub fn build_course() -> Course {
    Course {
        segments: vec![
            Segment {
                id: "start_corral".to_string(),
                label: "Start corral".to_string(),
                schema: "start_corral".to_string(),
                width_m: 12.0,
                spans: spans_for(&[(MARATHON, 0.0, 0.4), (HALF, 0.0, 0.4)]),
            },
            Segment {
                id: "embankment".to_string(),
                label: "Embankment".to_string(),
                schema: "open_course".to_string(),
                width_m: 6.0,
                spans: spans_for(&[(MARATHON, 2.0, 6.5), (HALF, 2.0, 6.5)]),
            },
            Segment {
                id: "riverside_narrows".to_string(),
                label: "Riverside narrows".to_string(),
                schema: "narrow_merge".to_string(),
                width_m: 3.5,
                spans: spans_for(&[(MARATHON, 9.4, 10.6), (HALF, 9.4, 10.6)]),
            },
            Segment {
                id: "finish_straight".to_string(),
                label: "Finish straight".to_string(),
                schema: "open_course".to_string(),
                width_m: 8.0,
                spans: spans_for(&[(MARATHON, 41.3, 42.2), (HALF, 20.3, 21.1)]),
            },
        ],
    }
}

fn build_field(
    name: &str,
    start_minutes: f64,
    n: usize,
    paces: &dyn PaceDistribution,
    release_window_sec: f64,
    rng: &mut StdRng,
) -> EventField {
    let mut field = EventField::new(name, start_minutes);
    for i in 0..n {
        let pace = paces.sample_sec_per_km(i as u64);
        let offset = if release_window_sec > 0.0 {
            rng.gen_range(0.0..=release_window_sec)
        } else {
            0.0
        };
        field.runners.push(Runner::new(i as u32, pace, offset));
    }
    field
}

/// Builds the course and both runner fields. Marathon paces centre on
/// 6:00/km, the half a touch quicker at 5:30/km.
pub fn build_scenario(params: &ScenarioParams) -> (Course, Vec<EventField>) {
    let seed = params.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);

    let marathon_paces = NormalPace::new(360.0, 50.0, seed ^ 0x6d61_7261).with_clamp(180.0, 600.0);
    let half_paces = NormalPace::new(330.0, 45.0, seed ^ 0x6861_6c66).with_clamp(170.0, 560.0);

    let events = vec![
        build_field(
            MARATHON,
            params.first_start_minutes,
            params.runners_per_event,
            &marathon_paces,
            params.release_window_sec,
            &mut rng,
        ),
        build_field(
            HALF,
            params.first_start_minutes + params.start_gap_minutes,
            params.runners_per_event,
            &half_paces,
            params.release_window_sec,
            &mut rng,
        ),
    ];

    (build_course(), events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_scenario_populates_both_fields() {
        let params = ScenarioParams::default()
            .with_seed(42)
            .with_runners_per_event(50);
        let (course, events) = build_scenario(&params);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].runners.len(), 50);
        assert_eq!(events[1].runners.len(), 50);
        assert_eq!(events[0].name, MARATHON);
        assert!(events[1].start_minutes > events[0].start_minutes);
        let (valid, errors) = course.validate();
        assert_eq!(valid.len(), course.segments.len());
        assert!(errors.is_empty());
    }

    #[test]
    fn same_seed_reproduces_the_field() {
        let params = ScenarioParams::default()
            .with_seed(7)
            .with_runners_per_event(25);
        let (_, a) = build_scenario(&params);
        let (_, b) = build_scenario(&params);
        assert_eq!(a[0].runners, b[0].runners);
        assert_eq!(a[1].runners, b[1].runners);
    }

    #[test]
    fn every_segment_is_traversed_by_both_events() {
        let course = build_course();
        for segment in &course.segments {
            assert!(segment.span_for(MARATHON).is_some(), "{}", segment.id);
            assert!(segment.span_for(HALF).is_some(), "{}", segment.id);
        }
    }

    #[test]
    fn offsets_stay_inside_the_release_window() {
        let params = ScenarioParams::default()
            .with_seed(3)
            .with_runners_per_event(100)
            .with_release_window_sec(300.0);
        let (_, events) = build_scenario(&params);
        for field in &events {
            for runner in &field.runners {
                assert!((0.0..=300.0).contains(&runner.start_offset_sec));
            }
        }
    }
}
