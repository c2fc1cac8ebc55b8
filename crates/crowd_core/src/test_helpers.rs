//! Test helpers for common test setup and utilities.
//!
//! This module provides shared fixtures to reduce duplication across test
//! files: a minimal single-event segment and a small two-event course.

use std::collections::BTreeMap;

use crate::course::{Course, EventField, Runner, Segment, SegmentSpan};

/// A single-span open-course segment traversed by an event named "race".
pub fn simple_segment(id: &str, width_m: f64, from_km: f64, to_km: f64) -> Segment {
    let mut spans = BTreeMap::new();
    spans.insert("race".to_string(), SegmentSpan::new(from_km, to_km));
    Segment {
        id: id.to_string(),
        label: id.to_string(),
        schema: "open_course".to_string(),
        width_m,
        spans,
    }
}

/// A three-segment course traversed by "marathon" and "half".
pub fn small_course() -> Course {
    let both = |from: f64, to: f64| -> BTreeMap<String, SegmentSpan> {
        let mut spans = BTreeMap::new();
        spans.insert("marathon".to_string(), SegmentSpan::new(from, to));
        spans.insert("half".to_string(), SegmentSpan::new(from, to));
        spans
    };
    Course {
        segments: vec![
            Segment {
                id: "start".to_string(),
                label: "Start corral".to_string(),
                schema: "start_corral".to_string(),
                width_m: 12.0,
                spans: both(0.0, 0.4),
            },
            Segment {
                id: "embankment".to_string(),
                label: "Embankment".to_string(),
                schema: "open_course".to_string(),
                width_m: 6.0,
                spans: both(2.0, 5.0),
            },
            Segment {
                id: "narrows".to_string(),
                label: "Narrows".to_string(),
                schema: "narrow_merge".to_string(),
                width_m: 4.0,
                spans: both(9.4, 10.6),
            },
        ],
    }
}

/// Two deterministic fields, "marathon" at 09:00 and "half" at 09:20, with
/// `n` runners each. Paces and offsets cycle arithmetically so reruns are
/// bit-identical without an RNG.
pub fn small_events(n: usize) -> Vec<EventField> {
    let mut marathon = EventField::new("marathon", 540.0);
    let mut half = EventField::new("half", 560.0);
    for i in 0..n {
        let pace = 270.0 + (i % 9) as f64 * 20.0;
        let offset = (i % 60) as f64 * 5.0;
        marathon.runners.push(Runner::new(i as u32, pace, offset));
        half.runners
            .push(Runner::new(1000 + i as u32, pace - 30.0, offset));
    }
    vec![marathon, half]
}
