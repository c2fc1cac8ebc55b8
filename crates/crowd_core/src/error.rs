//! Error taxonomy for the engine.
//!
//! Configuration errors are fatal only for the segment they name; the run
//! keeps going for every other segment. Anchoring errors invalidate the
//! shared time grid and abort the whole run.

use thiserror::Error;

/// Per-segment configuration problems. Logged with identifying context and
/// the segment is excluded; never silently defaulted.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("segment `{segment}`: non-positive width {width_m} m")]
    NonPositiveWidth { segment: String, width_m: f64 },

    #[error("segment `{segment}`: inverted span {from_km}..{to_km} km for event `{event}`")]
    InvertedSpan {
        segment: String,
        event: String,
        from_km: f64,
        to_km: f64,
    },

    #[error("segment `{segment}`: non-finite geometry")]
    NonFiniteGeometry { segment: String },

    #[error("segment `{segment}`: no event traverses it")]
    NoSpans { segment: String },

    #[error("segment `{segment}`: no LOS threshold table for schema `{schema}`")]
    UnknownSchema { segment: String, schema: String },

    #[error("non-positive distance bin length {bin_len_m} m (segment `{segment}`)")]
    NonPositiveBinLength { segment: String, bin_len_m: f64 },

    #[error("LOS band table `{context}`: upper bounds must be strictly increasing")]
    NonMonotonicBands { context: String },

    #[error("flow pair references unknown segment `{segment}`")]
    UnknownFlowSegment { segment: String },

    #[error("flow pair references unknown event `{event}`")]
    UnknownFlowEvent { event: String },
}

/// Failures building or resolving against the global time grid. Every
/// downstream bin and flow computation depends on the grid, so these are
/// fatal for the whole run.
#[derive(Debug, Clone, Error)]
pub enum AnchorError {
    #[error("no events configured; cannot anchor the time grid")]
    NoEvents,

    #[error("event `{event}` starts at {start_minutes} min, before the grid anchor at {anchor_minutes} min")]
    StartsBeforeAnchor {
        event: String,
        start_minutes: f64,
        anchor_minutes: f64,
    },

    #[error("non-positive time window width {window_sec} s")]
    NonPositiveWindow { window_sec: f64 },

    #[error("non-positive analysis duration {duration_sec} s")]
    NonPositiveDuration { duration_sec: f64 },

    #[error("event `{event}` is not registered on the time grid")]
    UnknownEvent { event: String },
}

/// Top-level error for an analysis run. Configuration problems are
/// isolated per segment or per pair and surfaced as warnings, so only
/// grid anchoring can fail a run outright.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Anchor(#[from] AnchorError),
}
