//! Level-of-Service classification and severity flagging.
//!
//! Each segment names a schema; each schema owns an ordered LOS band table
//! (upper-bound densities for grades A through E, F catch-all). Severity
//! combines the LOS grade with a run-wide percentile cutoff over bin
//! densities. A segment whose schema has no table fails loudly — silently
//! defaulting a managed start corral to open-course thresholds is exactly
//! the classification drift this guards against.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::course::Segment;
use crate::error::ConfigError;

/// Pedestrian level-of-service grade, A (free flow) to F (jammed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LosGrade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl LosGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            LosGrade::A => "A",
            LosGrade::B => "B",
            LosGrade::C => "C",
            LosGrade::D => "D",
            LosGrade::E => "E",
            LosGrade::F => "F",
        }
    }
}

/// Flag severity for one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    None,
    Watch,
    Caution,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Watch => "WATCH",
            Severity::Caution => "CAUTION",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Upper-bound densities (runners/m²) for grades A..E; anything above the
/// E bound is F.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LosBandTable {
    upper_bounds: [f64; 5],
}

impl LosBandTable {
    pub fn new(context: &str, upper_bounds: [f64; 5]) -> Result<Self, ConfigError> {
        let monotonic = upper_bounds.windows(2).all(|w| w[0] < w[1])
            && upper_bounds.iter().all(|b| b.is_finite() && *b > 0.0);
        if !monotonic {
            return Err(ConfigError::NonMonotonicBands {
                context: context.to_string(),
            });
        }
        Ok(Self { upper_bounds })
    }

    /// Fruin-style walkway thresholds for open on-course running.
    pub fn open_course() -> Self {
        Self {
            upper_bounds: [0.27, 0.43, 0.72, 1.08, 2.17],
        }
    }

    /// Managed start corrals tolerate far higher standing densities.
    pub fn start_corral() -> Self {
        Self {
            upper_bounds: [0.8, 1.1, 1.5, 2.0, 3.0],
        }
    }

    /// Narrow or merging sections degrade earlier than open course.
    pub fn narrow_merge() -> Self {
        Self {
            upper_bounds: [0.2, 0.31, 0.5, 0.8, 1.5],
        }
    }

    /// First band whose upper bound exceeds the density; F above them all.
    pub fn grade(&self, density: f64) -> LosGrade {
        const GRADES: [LosGrade; 5] =
            [LosGrade::A, LosGrade::B, LosGrade::C, LosGrade::D, LosGrade::E];
        for (bound, grade) in self.upper_bounds.iter().zip(GRADES) {
            if density < *bound {
                return grade;
            }
        }
        LosGrade::F
    }
}

/// Schema lookup plus the severity combination rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggingPolicy {
    schemas: BTreeMap<String, LosBandTable>,
    /// Percentile (0..100) over all bin densities in the run, empty bins
    /// included.
    pub percentile: f64,
    /// Grades at or above this count as "high LOS" for flagging.
    pub high_los: LosGrade,
}

impl FlaggingPolicy {
    /// The three stock schemas with a 95th-percentile cutoff and E as the
    /// high-LOS threshold.
    pub fn standard() -> Self {
        let mut schemas = BTreeMap::new();
        schemas.insert("open_course".to_string(), LosBandTable::open_course());
        schemas.insert("start_corral".to_string(), LosBandTable::start_corral());
        schemas.insert("narrow_merge".to_string(), LosBandTable::narrow_merge());
        Self {
            schemas,
            percentile: 95.0,
            high_los: LosGrade::E,
        }
    }

    pub fn with_schema(mut self, name: impl Into<String>, table: LosBandTable) -> Self {
        self.schemas.insert(name.into(), table);
        self
    }

    pub fn with_percentile(mut self, percentile: f64) -> Self {
        self.percentile = percentile;
        self
    }

    pub fn with_high_los(mut self, grade: LosGrade) -> Self {
        self.high_los = grade;
        self
    }

    /// Resolves the table governing a segment. Missing schema is a loud
    /// per-segment error, never a silent default.
    pub fn table_for(&self, segment: &Segment) -> Result<&LosBandTable, ConfigError> {
        self.schemas
            .get(&segment.schema)
            .ok_or_else(|| ConfigError::UnknownSchema {
                segment: segment.id.clone(),
                schema: segment.schema.clone(),
            })
    }

    /// Severity matrix: CRITICAL when both the LOS and the population
    /// cutoff fire, CAUTION on LOS alone, WATCH on the cutoff alone.
    /// Empty cells never flag.
    pub fn severity(&self, grade: LosGrade, density: f64, cutoff: f64) -> Severity {
        let high_los = grade >= self.high_los;
        let above_cutoff = density > 0.0 && density >= cutoff;
        match (high_los, above_cutoff) {
            (true, true) => Severity::Critical,
            (true, false) => Severity::Caution,
            (false, true) => Severity::Watch,
            (false, false) => Severity::None,
        }
    }
}

/// Linear-interpolated percentile over every bin density of a run, empty
/// bins included. On a sparse grid the cutoff drops toward zero and each
/// occupied bin clears it; the severity rule still requires a positive
/// density, so empty cells themselves never flag. Returns infinity when
/// there are no bins at all.
pub fn percentile_cutoff(densities: &[f64], percentile: f64) -> f64 {
    if densities.is_empty() {
        return f64::INFINITY;
    }
    let mut sorted = densities.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (percentile / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Per-segment roll-up for the reporting boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentFlagSummary {
    pub segment_id: String,
    pub worst_los: LosGrade,
    pub flagged_cells: u64,
    pub peak_density: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::simple_segment;

    #[test]
    fn grading_walks_the_bands_in_order() {
        let table = LosBandTable::open_course();
        assert_eq!(table.grade(0.0), LosGrade::A);
        assert_eq!(table.grade(0.3), LosGrade::B);
        assert_eq!(table.grade(0.5), LosGrade::C);
        assert_eq!(table.grade(1.0), LosGrade::D);
        assert_eq!(table.grade(2.0), LosGrade::E);
        assert_eq!(table.grade(5.0), LosGrade::F);
    }

    #[test]
    fn grading_is_monotonic_in_density() {
        let table = LosBandTable::narrow_merge();
        let mut last = LosGrade::A;
        for step in 0..200 {
            let grade = table.grade(step as f64 * 0.02);
            assert!(grade >= last, "higher density must never improve the grade");
            last = grade;
        }
    }

    #[test]
    fn non_monotonic_bands_are_rejected() {
        let err = LosBandTable::new("bad", [0.5, 0.4, 0.6, 0.8, 1.0]).unwrap_err();
        assert!(matches!(err, ConfigError::NonMonotonicBands { .. }));
    }

    #[test]
    fn unknown_schema_fails_loudly() {
        let policy = FlaggingPolicy::standard();
        let mut segment = simple_segment("s", 5.0, 0.0, 1.0);
        segment.schema = "vip_area".to_string();
        let err = policy.table_for(&segment).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSchema { .. }));
    }

    #[test]
    fn severity_matrix() {
        let policy = FlaggingPolicy::standard();
        let cutoff = 1.0;
        assert_eq!(policy.severity(LosGrade::F, 1.5, cutoff), Severity::Critical);
        assert_eq!(policy.severity(LosGrade::E, 0.5, cutoff), Severity::Caution);
        assert_eq!(policy.severity(LosGrade::B, 1.5, cutoff), Severity::Watch);
        assert_eq!(policy.severity(LosGrade::B, 0.5, cutoff), Severity::None);
    }

    #[test]
    fn empty_cells_never_flag() {
        let policy = FlaggingPolicy::standard();
        assert_eq!(policy.severity(LosGrade::A, 0.0, 0.0), Severity::None);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let densities = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile_cutoff(&densities, 50.0) - 2.5).abs() < 1e-12);
        assert_eq!(percentile_cutoff(&densities, 100.0), 4.0);
        assert_eq!(percentile_cutoff(&densities, 0.0), 1.0);
    }

    #[test]
    fn percentile_population_includes_empty_cells() {
        let densities = [0.0, 0.0, 2.0, 4.0];
        assert!((percentile_cutoff(&densities, 50.0) - 1.0).abs() < 1e-12);
        assert_eq!(percentile_cutoff(&[], 95.0), f64::INFINITY);
    }

    #[test]
    fn sparse_grid_cutoff_still_flags_occupied_bins() {
        // Eight empty bins drag the median to zero; the occupied
        // low-density bin clears the cutoff and draws a WATCH, while the
        // empty bins themselves stay unflagged.
        let mut densities = vec![0.0; 8];
        densities.extend([0.2, 1.0]);
        let cutoff = percentile_cutoff(&densities, 50.0);
        assert_eq!(cutoff, 0.0);
        let policy = FlaggingPolicy::standard();
        assert_eq!(policy.severity(LosGrade::A, 0.2, cutoff), Severity::Watch);
        assert_eq!(policy.severity(LosGrade::A, 0.0, cutoff), Severity::None);
    }
}
