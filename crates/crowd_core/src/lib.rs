pub mod accumulate;
pub mod analysis;
pub mod classify;
pub mod course;
pub mod distributions;
pub mod error;
pub mod export;
pub mod flow;
pub mod grid;
pub mod mapping;
pub mod records;
pub mod resolution;
pub mod scenario;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
