//! Bin accumulation: per-run arena of occupant-count and speed-sum arrays
//! indexed by (segment, window, distance bin).
//!
//! The arena is owned exclusively by the accumulator for the lifetime of a
//! run; each cell has exactly one logical producer (one segment, one
//! window), so a parallel-by-segment reimplementation needs no locking.
//!
//! A run commits its resolution up front and samples the committed grids
//! directly. [`SegmentGrid::coarsen_time`] and
//! [`SegmentGrid::coarsen_distance`] are the mass-conserving path for data
//! that was already accumulated at a finer resolution, for callers that
//! widen the grid after the fact instead of re-sampling.

use log::warn;

use crate::course::Segment;
use crate::error::ConfigError;
use crate::grid::TimeGrid;
use crate::mapping::SegmentOccupancy;

/// One finalized cell: derived metrics for a (window, distance-bin) pair
/// of a single segment.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedCell {
    pub window: usize,
    pub bin: usize,
    pub start_m: f64,
    pub end_m: f64,
    pub t_start_sec: f64,
    pub t_end_sec: f64,
    pub count: u32,
    /// Occupants per square metre.
    pub density: f64,
    /// Undefined (skipped) when the cell is empty.
    pub mean_speed_m_s: Option<f64>,
    /// Occupants per second through the cell cross-section.
    pub rate: f64,
}

/// Accumulation arrays for one segment, window-major. A segment may carry
/// its own resolution: hotspot segments stay fine while the rest of the
/// course is coarsened.
#[derive(Debug, Clone)]
pub struct SegmentGrid {
    pub segment_id: String,
    pub width_m: f64,
    /// Course km of the segment entrance (smallest from_km of any span);
    /// bin `b` covers `[origin + b*bin_len, origin + (b+1)*bin_len)` m.
    pub origin_km: f64,
    pub length_m: f64,
    pub window_sec: f64,
    pub bin_len_m: f64,
    n_windows: usize,
    n_bins: usize,
    counts: Vec<u32>,
    speed_sums: Vec<f64>,
}

impl SegmentGrid {
    /// Validates geometry before allocating. Invalid geometry is fatal for
    /// this segment only; the caller logs and excludes it.
    pub fn new(
        segment: &Segment,
        n_windows: usize,
        window_sec: f64,
        bin_len_m: f64,
    ) -> Result<Self, ConfigError> {
        segment.validate()?;
        if !(bin_len_m > 0.0) || !bin_len_m.is_finite() {
            return Err(ConfigError::NonPositiveBinLength {
                segment: segment.id.clone(),
                bin_len_m,
            });
        }
        let length_m = segment.length_m();
        let origin_km = segment
            .spans
            .values()
            .map(|s| s.from_km)
            .fold(f64::INFINITY, f64::min);
        let n_bins = ((length_m / bin_len_m).ceil() as usize).max(1);
        Ok(Self {
            segment_id: segment.id.clone(),
            width_m: segment.width_m,
            origin_km,
            length_m,
            window_sec,
            bin_len_m,
            n_windows,
            n_bins,
            counts: vec![0; n_windows * n_bins],
            speed_sums: vec![0.0; n_windows * n_bins],
        })
    }

    pub fn n_windows(&self) -> usize {
        self.n_windows
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn n_cells(&self) -> usize {
        self.counts.len()
    }

    fn cell(&self, window: usize, bin: usize) -> usize {
        window * self.n_bins + bin
    }

    pub fn count(&self, window: usize, bin: usize) -> u32 {
        self.counts[self.cell(window, bin)]
    }

    pub fn total_count(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// Scatter-add one window's occupancy: integer-divide each position
    /// into its distance bin, bump the count and speed sum. The exact
    /// right-edge position lands in the last bin.
    pub fn record(&mut self, window: usize, occupancy: &SegmentOccupancy) {
        debug_assert!(window < self.n_windows, "window index out of range");
        for (pos_m, speed) in occupancy
            .positions_m
            .iter()
            .zip(occupancy.speeds_m_s.iter())
        {
            let bin = ((pos_m / self.bin_len_m) as usize).min(self.n_bins - 1);
            let cell = self.cell(window, bin);
            self.counts[cell] += 1;
            self.speed_sums[cell] += speed;
        }
    }

    /// Re-maps accumulated counts onto a coarser time grid. Window
    /// membership is recomputed from window start times under the shared
    /// anchor; old indices are never reused, so a late-starting event's
    /// occupants aggregate into the correct coarse window.
    pub fn coarsen_time(&self, new_grid: &TimeGrid) -> SegmentGrid {
        let n_windows = new_grid.n_windows();
        let mut out = SegmentGrid {
            segment_id: self.segment_id.clone(),
            width_m: self.width_m,
            origin_km: self.origin_km,
            length_m: self.length_m,
            window_sec: new_grid.window_sec(),
            bin_len_m: self.bin_len_m,
            n_windows,
            n_bins: self.n_bins,
            counts: vec![0; n_windows * self.n_bins],
            speed_sums: vec![0.0; n_windows * self.n_bins],
        };
        for w in 0..self.n_windows {
            let t_mid = (w as f64 + 0.5) * self.window_sec;
            let Some(new_w) = new_grid.window_of(t_mid) else {
                continue;
            };
            for b in 0..self.n_bins {
                let src = self.cell(w, b);
                let dst = out.cell(new_w, b);
                out.counts[dst] += self.counts[src];
                out.speed_sums[dst] += self.speed_sums[src];
            }
        }
        out
    }

    /// Aggregates whole distance bins into `factor`-times longer ones.
    pub fn coarsen_distance(&self, factor: u32) -> SegmentGrid {
        let factor = factor.max(1) as usize;
        let n_bins = self.n_bins.div_ceil(factor);
        let mut out = SegmentGrid {
            segment_id: self.segment_id.clone(),
            width_m: self.width_m,
            origin_km: self.origin_km,
            length_m: self.length_m,
            window_sec: self.window_sec,
            bin_len_m: self.bin_len_m * factor as f64,
            n_windows: self.n_windows,
            n_bins,
            counts: vec![0; self.n_windows * n_bins],
            speed_sums: vec![0.0; self.n_windows * n_bins],
        };
        for w in 0..self.n_windows {
            for b in 0..self.n_bins {
                let src = self.cell(w, b);
                let dst = out.cell(w, b / factor);
                out.counts[dst] += self.counts[src];
                out.speed_sums[dst] += self.speed_sums[src];
            }
        }
        out
    }

    /// Derives density, mean speed, and throughput for every cell, in
    /// window-major order. Empty cells carry zero density and rate and no
    /// mean speed.
    pub fn finalize(&self) -> Vec<FinalizedCell> {
        let area_m2 = self.bin_len_m * self.width_m;
        let mut cells = Vec::with_capacity(self.counts.len());
        for w in 0..self.n_windows {
            for b in 0..self.n_bins {
                let idx = self.cell(w, b);
                let count = self.counts[idx];
                let (density, mean_speed, rate) = if count > 0 {
                    let density = count as f64 / area_m2;
                    let mean_speed = self.speed_sums[idx] / count as f64;
                    (density, Some(mean_speed), density * self.width_m * mean_speed)
                } else {
                    (0.0, None, 0.0)
                };
                cells.push(FinalizedCell {
                    window: w,
                    bin: b,
                    start_m: b as f64 * self.bin_len_m,
                    end_m: ((b + 1) as f64 * self.bin_len_m).min(self.length_m),
                    t_start_sec: w as f64 * self.window_sec,
                    t_end_sec: (w + 1) as f64 * self.window_sec,
                    count,
                    density,
                    mean_speed_m_s: mean_speed,
                    rate,
                });
            }
        }
        cells
    }
}

/// The per-run arena: one [`SegmentGrid`] per valid segment, in course
/// order. Segments whose geometry fails validation are excluded and their
/// errors returned alongside.
#[derive(Debug, Default)]
pub struct BinArena {
    pub segments: Vec<SegmentGrid>,
}

impl BinArena {
    /// `resolve` supplies the (n_windows, window_sec, bin_len_m) for each
    /// segment, which lets hotspot segments keep the fine resolution.
    pub fn build<'a, F>(
        segments: impl IntoIterator<Item = &'a Segment>,
        mut resolve: F,
    ) -> (Self, Vec<ConfigError>)
    where
        F: FnMut(&Segment) -> (usize, f64, f64),
    {
        let mut arena = BinArena::default();
        let mut errors = Vec::new();
        for segment in segments {
            let (n_windows, window_sec, bin_len_m) = resolve(segment);
            match SegmentGrid::new(segment, n_windows, window_sec, bin_len_m) {
                Ok(grid) => arena.segments.push(grid),
                Err(err) => {
                    warn!("excluding segment from accumulation: {err}");
                    errors.push(err);
                }
            }
        }
        (arena, errors)
    }

    pub fn total_cells(&self) -> u64 {
        self.segments.iter().map(|s| s.n_cells() as u64).sum()
    }

    pub fn total_count(&self) -> u64 {
        self.segments.iter().map(SegmentGrid::total_count).sum()
    }
}
