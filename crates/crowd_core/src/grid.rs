//! Global time grid: one shared sequence of fixed-width windows anchored
//! to the earliest event start.
//!
//! All events index into the same window sequence via an integer
//! `start_index` derived from `(event_start - earliest_start)`. The grid is
//! an immutable value object: coarsening produces a *new* grid with the
//! same anchor rather than mutating indices in place.

use std::collections::BTreeMap;

use crate::course::EventField;
use crate::error::AnchorError;

/// Shared, contiguous, non-overlapping time windows. Window `i` covers
/// `[i * window_sec, (i + 1) * window_sec)` seconds since the anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    window_sec: f64,
    duration_sec: f64,
    /// Earliest event gun time, minutes from midnight. Window 0 begins here.
    anchor_minutes: f64,
    n_windows: usize,
    start_indices: BTreeMap<String, usize>,
}

impl TimeGrid {
    /// Builds the grid anchored to the earliest start among `events`.
    pub fn build(
        events: &[EventField],
        window_sec: f64,
        duration_sec: f64,
    ) -> Result<Self, AnchorError> {
        let anchor = events
            .iter()
            .map(|e| e.start_minutes)
            .fold(f64::INFINITY, f64::min);
        if !anchor.is_finite() {
            return Err(AnchorError::NoEvents);
        }
        Self::build_anchored(anchor, events, window_sec, duration_sec)
    }

    /// Builds the grid against an explicit anchor. An event starting before
    /// the anchor would need a negative window index, which invalidates the
    /// shared grid; that is a run-fatal error.
    pub fn build_anchored(
        anchor_minutes: f64,
        events: &[EventField],
        window_sec: f64,
        duration_sec: f64,
    ) -> Result<Self, AnchorError> {
        if events.is_empty() {
            return Err(AnchorError::NoEvents);
        }
        if !(window_sec > 0.0) || !window_sec.is_finite() {
            return Err(AnchorError::NonPositiveWindow { window_sec });
        }
        if !(duration_sec > 0.0) || !duration_sec.is_finite() {
            return Err(AnchorError::NonPositiveDuration { duration_sec });
        }

        let mut start_indices = BTreeMap::new();
        for event in events {
            let offset_sec = (event.start_minutes - anchor_minutes) * 60.0;
            if offset_sec < 0.0 {
                return Err(AnchorError::StartsBeforeAnchor {
                    event: event.name.clone(),
                    start_minutes: event.start_minutes,
                    anchor_minutes,
                });
            }
            let index = (offset_sec / window_sec).floor() as usize;
            start_indices.insert(event.name.clone(), index);
        }

        let n_windows = (duration_sec / window_sec).ceil() as usize;
        Ok(Self {
            window_sec,
            duration_sec,
            anchor_minutes,
            n_windows,
            start_indices,
        })
    }

    pub fn window_sec(&self) -> f64 {
        self.window_sec
    }

    pub fn duration_sec(&self) -> f64 {
        self.duration_sec
    }

    pub fn anchor_minutes(&self) -> f64 {
        self.anchor_minutes
    }

    pub fn n_windows(&self) -> usize {
        self.n_windows
    }

    /// Window index of an event's gun time. Exactly 0 for the earliest
    /// event by construction.
    pub fn start_index(&self, event: &str) -> Result<usize, AnchorError> {
        self.start_indices
            .get(event)
            .copied()
            .ok_or_else(|| AnchorError::UnknownEvent {
                event: event.to_string(),
            })
    }

    /// Seconds since anchor at which the event's gun fires.
    pub fn event_start_sec(&self, event: &EventField) -> f64 {
        (event.start_minutes - self.anchor_minutes) * 60.0
    }

    pub fn window_start_sec(&self, index: usize) -> f64 {
        index as f64 * self.window_sec
    }

    pub fn window_end_sec(&self, index: usize) -> f64 {
        (index as f64 + 1.0) * self.window_sec
    }

    pub fn window_midpoint_sec(&self, index: usize) -> f64 {
        (index as f64 + 0.5) * self.window_sec
    }

    /// Clock time of a window's start, minutes from midnight.
    pub fn window_clock_minutes(&self, index: usize) -> f64 {
        self.anchor_minutes + self.window_start_sec(index) / 60.0
    }

    /// Window containing `t_sec` (seconds since anchor), or `None` when the
    /// instant falls outside the analysis duration. Coarsening re-maps
    /// accumulated data through this, never by reusing old indices.
    pub fn window_of(&self, t_sec: f64) -> Option<usize> {
        if t_sec < 0.0 {
            return None;
        }
        let index = (t_sec / self.window_sec).floor() as usize;
        (index < self.n_windows).then_some(index)
    }

    /// A new grid with the same anchor and `factor`-times wider windows.
    pub fn coarsen(&self, factor: u32) -> TimeGrid {
        let factor = factor.max(1);
        let window_sec = self.window_sec * factor as f64;
        let n_windows = (self.duration_sec / window_sec).ceil() as usize;
        let start_indices = self
            .start_indices
            .iter()
            .map(|(event, _)| {
                // Re-derive under the new width; old indices are stale here.
                let offset_sec = self.event_offset_sec(event);
                (event.clone(), (offset_sec / window_sec).floor() as usize)
            })
            .collect();
        TimeGrid {
            window_sec,
            duration_sec: self.duration_sec,
            anchor_minutes: self.anchor_minutes,
            n_windows,
            start_indices,
        }
    }

    fn event_offset_sec(&self, event: &str) -> f64 {
        // start_index was floored; reconstructing from it would lose the
        // sub-window remainder, so offsets are kept recomputable from the
        // stored index times the original width. Indices are exact for the
        // anchoring rule because both grids share the anchor.
        self.start_indices[event] as f64 * self.window_sec
    }
}
