//! Runner-to-bin mapping: projects every runner of an event onto a segment
//! for one time window in a single array pass.
//!
//! Per-runner data is laid out as flat columns (`EventArrays`) so the hot
//! loop is one linear sweep per (segment, window) with no per-runner
//! branching beyond the membership mask.

use crate::course::{EventField, SegmentSpan};
use crate::grid::TimeGrid;

/// Column layout of one event's field, with start times made absolute
/// (seconds since the grid anchor) so every window lookup is a subtraction.
#[derive(Debug, Clone)]
pub struct EventArrays {
    pub event: String,
    abs_start_sec: Vec<f64>,
    pace_sec_per_km: Vec<f64>,
    speed_m_s: Vec<f64>,
    runner_ids: Vec<u32>,
}

/// Runners of one event occupying one segment during one window: positions
/// in metres from the segment start, matched speeds, and the indices back
/// into the event field.
#[derive(Debug, Clone, Default)]
pub struct SegmentOccupancy {
    pub runner_idx: Vec<u32>,
    pub positions_m: Vec<f64>,
    pub speeds_m_s: Vec<f64>,
}

impl SegmentOccupancy {
    pub fn len(&self) -> usize {
        self.positions_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions_m.is_empty()
    }
}

impl EventArrays {
    pub fn from_field(field: &EventField, grid: &TimeGrid) -> Self {
        let event_start = grid.event_start_sec(field);
        let n = field.runners.len();
        let mut abs_start_sec = Vec::with_capacity(n);
        let mut pace_sec_per_km = Vec::with_capacity(n);
        let mut speed_m_s = Vec::with_capacity(n);
        let mut runner_ids = Vec::with_capacity(n);
        for runner in &field.runners {
            abs_start_sec.push(event_start + runner.start_offset_sec);
            pace_sec_per_km.push(runner.pace_sec_per_km);
            speed_m_s.push(runner.speed_m_s());
            runner_ids.push(runner.id);
        }
        Self {
            event: field.name.clone(),
            abs_start_sec,
            pace_sec_per_km,
            speed_m_s,
            runner_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.abs_start_sec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abs_start_sec.is_empty()
    }

    pub fn runner_id(&self, idx: u32) -> u32 {
        self.runner_ids[idx as usize]
    }

    /// Course position of runner `idx` at `t_sec` (seconds since anchor).
    /// Negative before the runner's own start.
    pub fn position_km(&self, idx: usize, t_sec: f64) -> f64 {
        (t_sec - self.abs_start_sec[idx]) / self.pace_sec_per_km[idx]
    }

    pub fn speed_m_s(&self, idx: usize) -> f64 {
        self.speed_m_s[idx]
    }

    /// All runners of this event inside `span` at instant `t_sec`, as
    /// segment-local metres. One pass; runners who have not started yet are
    /// masked out by the `elapsed >= 0` test.
    pub fn occupancy_at(&self, span: &SegmentSpan, t_sec: f64) -> SegmentOccupancy {
        let mut occ = SegmentOccupancy::default();
        for i in 0..self.abs_start_sec.len() {
            let elapsed = t_sec - self.abs_start_sec[i];
            if elapsed < 0.0 {
                continue;
            }
            let pos_km = elapsed / self.pace_sec_per_km[i];
            if pos_km >= span.from_km && pos_km <= span.to_km {
                occ.runner_idx.push(i as u32);
                occ.positions_m.push((pos_km - span.from_km) * 1000.0);
                occ.speeds_m_s.push(self.speed_m_s[i]);
            }
        }
        occ
    }

    /// Like [`occupancy_at`](Self::occupancy_at) but reporting course km,
    /// for the flow detector's shared-zone geometry.
    pub fn zone_positions_at(&self, zone: &SegmentSpan, t_sec: f64) -> Vec<(u32, f64)> {
        let mut out = Vec::new();
        for i in 0..self.abs_start_sec.len() {
            let elapsed = t_sec - self.abs_start_sec[i];
            if elapsed < 0.0 {
                continue;
            }
            let pos_km = elapsed / self.pace_sec_per_km[i];
            if pos_km >= zone.from_km && pos_km <= zone.to_km {
                out.push((i as u32, pos_km));
            }
        }
        out
    }

    /// Seconds since anchor at which runner `idx` reaches course `km`.
    pub fn time_at_km(&self, idx: usize, km: f64) -> f64 {
        self.abs_start_sec[idx] + km * self.pace_sec_per_km[idx]
    }

    pub fn abs_start_sec(&self, idx: usize) -> f64 {
        self.abs_start_sec[idx]
    }

    pub fn pace_sec_per_km(&self, idx: usize) -> f64 {
        self.pace_sec_per_km[idx]
    }

    /// Indices sorted by pace, fastest (smallest sec/km) first.
    pub fn indices_by_pace(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.pace_sec_per_km.len()).collect();
        idx.sort_by(|&a, &b| {
            self.pace_sec_per_km[a]
                .total_cmp(&self.pace_sec_per_km[b])
                .then(a.cmp(&b))
        });
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{EventField, Runner, SegmentSpan};
    use crate::grid::TimeGrid;

    fn field() -> EventField {
        let mut field = EventField::new("half", 550.0);
        // 5:00/km from the gun, 6:00/km starting 120 s later.
        field.runners.push(Runner::new(1, 300.0, 0.0));
        field.runners.push(Runner::new(2, 360.0, 120.0));
        field
    }

    fn grid_for(field: &EventField) -> TimeGrid {
        let earliest = EventField::new("marathon", 540.0);
        TimeGrid::build(&[earliest, field.clone()], 60.0, 4.0 * 3600.0).unwrap()
    }

    #[test]
    fn positions_account_for_event_and_personal_offsets() {
        let field = field();
        let grid = grid_for(&field);
        let arrays = EventArrays::from_field(&field, &grid);
        // Event gun at 600 s after anchor; runner 0 at 5:00/km.
        assert!((arrays.position_km(0, 600.0) - 0.0).abs() < 1e-12);
        assert!((arrays.position_km(0, 900.0) - 1.0).abs() < 1e-12);
        // Runner 1 starts at 720 s and runs 6:00/km.
        assert!((arrays.position_km(1, 1080.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn occupancy_masks_unstarted_runners() {
        let field = field();
        let grid = grid_for(&field);
        let arrays = EventArrays::from_field(&field, &grid);
        let span = SegmentSpan::new(0.0, 5.0);
        // At 660 s only runner 0 has started.
        let occ = arrays.occupancy_at(&span, 660.0);
        assert_eq!(occ.runner_idx, vec![0]);
        assert!((occ.positions_m[0] - 200.0).abs() < 1e-9);
        assert!((occ.speeds_m_s[0] - 1000.0 / 300.0).abs() < 1e-12);
    }

    #[test]
    fn occupancy_is_segment_local_metres() {
        let field = field();
        let grid = grid_for(&field);
        let arrays = EventArrays::from_field(&field, &grid);
        let span = SegmentSpan::new(1.0, 2.0);
        // Runner 0 at km 1.5 after 450 s of running (gun + 450 = 1050).
        let occ = arrays.occupancy_at(&span, 1050.0);
        assert_eq!(occ.len(), 1);
        assert!((occ.positions_m[0] - 500.0).abs() < 1e-9);
    }

    #[test]
    fn time_at_km_inverts_position() {
        let field = field();
        let grid = grid_for(&field);
        let arrays = EventArrays::from_field(&field, &grid);
        let t = arrays.time_at_km(1, 2.5);
        assert!((arrays.position_km(1, t) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn indices_by_pace_puts_fastest_first() {
        let field = field();
        let grid = grid_for(&field);
        let arrays = EventArrays::from_field(&field, &grid);
        assert_eq!(arrays.indices_by_pace(), vec![0, 1]);
    }
}
