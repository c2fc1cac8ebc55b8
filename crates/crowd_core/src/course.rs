//! Course and population model: segments, per-event distance spans, and
//! constant-pace runners.
//!
//! Distances are course kilometres (chainage); widths are metres. A runner
//! belongs to exactly one event and is immutable once loaded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The stretch of a course (in km marks) an event covers on a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpan {
    pub from_km: f64,
    pub to_km: f64,
}

impl SegmentSpan {
    pub fn new(from_km: f64, to_km: f64) -> Self {
        Self { from_km, to_km }
    }

    pub fn length_km(&self) -> f64 {
        self.to_km - self.from_km
    }

    pub fn length_m(&self) -> f64 {
        self.length_km() * 1000.0
    }

    pub fn contains(&self, km: f64) -> bool {
        km >= self.from_km && km <= self.to_km
    }

    /// Intersection of two spans, if they overlap at all.
    pub fn intersect(&self, other: &SegmentSpan) -> Option<SegmentSpan> {
        let from = self.from_km.max(other.from_km);
        let to = self.to_km.min(other.to_km);
        if from < to {
            Some(SegmentSpan::new(from, to))
        } else {
            None
        }
    }
}

/// One course segment. The classification schema is a property of the
/// segment itself, never inferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub label: String,
    /// Name of the LOS threshold schema governing this segment
    /// (e.g. "start_corral", "open_course", "narrow_merge").
    pub schema: String,
    pub width_m: f64,
    /// Per-event distance span; absent if the event does not traverse it.
    pub spans: BTreeMap<String, SegmentSpan>,
}

impl Segment {
    pub fn span_for(&self, event: &str) -> Option<&SegmentSpan> {
        self.spans.get(event)
    }

    /// Physical segment length: the longest span any traversing event
    /// covers. Bins are laid out over this extent in segment-local metres.
    pub fn length_m(&self) -> f64 {
        self.spans
            .values()
            .map(SegmentSpan::length_m)
            .fold(0.0, f64::max)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.width_m.is_finite() {
            return Err(ConfigError::NonFiniteGeometry {
                segment: self.id.clone(),
            });
        }
        if self.width_m <= 0.0 {
            return Err(ConfigError::NonPositiveWidth {
                segment: self.id.clone(),
                width_m: self.width_m,
            });
        }
        if self.spans.is_empty() {
            return Err(ConfigError::NoSpans {
                segment: self.id.clone(),
            });
        }
        for (event, span) in &self.spans {
            if !span.from_km.is_finite() || !span.to_km.is_finite() {
                return Err(ConfigError::NonFiniteGeometry {
                    segment: self.id.clone(),
                });
            }
            if span.from_km > span.to_km {
                return Err(ConfigError::InvertedSpan {
                    segment: self.id.clone(),
                    event: event.clone(),
                    from_km: span.from_km,
                    to_km: span.to_km,
                });
            }
        }
        Ok(())
    }
}

/// One runner: constant pace, personal start offset after the event gun.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    pub id: u32,
    /// Seconds to cover one kilometre.
    pub pace_sec_per_km: f64,
    /// Seconds after the event's gun time this runner crosses the start.
    pub start_offset_sec: f64,
}

impl Runner {
    pub fn new(id: u32, pace_sec_per_km: f64, start_offset_sec: f64) -> Self {
        Self {
            id,
            pace_sec_per_km,
            start_offset_sec,
        }
    }

    /// Position in course km after `elapsed_sec` of running.
    pub fn position_km(&self, elapsed_sec: f64) -> f64 {
        elapsed_sec / self.pace_sec_per_km
    }

    pub fn speed_m_s(&self) -> f64 {
        1000.0 / self.pace_sec_per_km
    }
}

/// One event's start time and its whole runner field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventField {
    pub name: String,
    /// Gun time, minutes from midnight.
    pub start_minutes: f64,
    pub runners: Vec<Runner>,
}

impl EventField {
    pub fn new(name: impl Into<String>, start_minutes: f64) -> Self {
        Self {
            name: name.into(),
            start_minutes,
            runners: Vec::new(),
        }
    }
}

/// The full course: an ordered list of segments. Order is preserved into
/// the output record stream, which keeps reruns bit-identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub segments: Vec<Segment>,
}

impl Course {
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Splits segments into geometrically valid ones and the errors for
    /// the rest. Invalid segments are excluded from a run, not defaulted.
    pub fn validate(&self) -> (Vec<&Segment>, Vec<ConfigError>) {
        let mut valid = Vec::with_capacity(self.segments.len());
        let mut errors = Vec::new();
        for segment in &self.segments {
            match segment.validate() {
                Ok(()) => valid.push(segment),
                Err(err) => errors.push(err),
            }
        }
        (valid, errors)
    }
}
