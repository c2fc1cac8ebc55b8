//! Probability distributions for runner paces.
//!
//! These distributions control the pace spread of a synthetic field,
//! enabling realistic fast/slow mixes in generated scenarios.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Trait for sampling a runner's pace (in seconds per kilometre).
pub trait PaceDistribution: Send + Sync + std::fmt::Debug {
    /// Sample a pace for the runner at `runner_index` within the field.
    /// The same index always yields the same pace for a given distribution.
    fn sample_sec_per_km(&self, runner_index: u64) -> f64;
}

/// Uniform distribution: every pace in `[min, max]` equally likely.
#[derive(Debug, Clone)]
pub struct UniformPace {
    pub min_sec_per_km: f64,
    pub max_sec_per_km: f64,
    /// Seed for RNG (for reproducibility).
    pub seed: u64,
}

impl UniformPace {
    pub fn new(min_sec_per_km: f64, max_sec_per_km: f64, seed: u64) -> Self {
        Self {
            min_sec_per_km,
            max_sec_per_km: max_sec_per_km.max(min_sec_per_km),
            seed,
        }
    }
}

impl PaceDistribution for UniformPace {
    fn sample_sec_per_km(&self, runner_index: u64) -> f64 {
        if self.max_sec_per_km <= self.min_sec_per_km {
            return self.min_sec_per_km;
        }
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(runner_index));
        rng.gen_range(self.min_sec_per_km..=self.max_sec_per_km)
    }
}

/// Normal distribution clamped to a plausible pace range. Race fields
/// cluster around a typical pace with long but bounded tails.
#[derive(Debug, Clone)]
pub struct NormalPace {
    pub mean_sec_per_km: f64,
    pub std_dev_sec: f64,
    pub min_sec_per_km: f64,
    pub max_sec_per_km: f64,
    /// Seed for RNG (for reproducibility).
    pub seed: u64,
}

impl NormalPace {
    pub fn new(mean_sec_per_km: f64, std_dev_sec: f64, seed: u64) -> Self {
        Self {
            mean_sec_per_km,
            std_dev_sec: std_dev_sec.max(0.0),
            min_sec_per_km: mean_sec_per_km - 3.0 * std_dev_sec,
            max_sec_per_km: mean_sec_per_km + 3.0 * std_dev_sec,
            seed,
        }
    }

    pub fn with_clamp(mut self, min_sec_per_km: f64, max_sec_per_km: f64) -> Self {
        self.min_sec_per_km = min_sec_per_km;
        self.max_sec_per_km = max_sec_per_km.max(min_sec_per_km);
        self
    }
}

impl PaceDistribution for NormalPace {
    fn sample_sec_per_km(&self, runner_index: u64) -> f64 {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(runner_index));
        // Box-Muller transform from two uniform samples.
        let u1: f64 = rng.gen::<f64>().max(1e-10);
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        (self.mean_sec_per_km + z * self.std_dev_sec)
            .clamp(self.min_sec_per_km, self.max_sec_per_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_pace_stays_in_range() {
        let dist = UniformPace::new(240.0, 480.0, 42);
        for i in 0..500 {
            let pace = dist.sample_sec_per_km(i);
            assert!((240.0..=480.0).contains(&pace));
        }
    }

    #[test]
    fn uniform_pace_is_deterministic_per_index() {
        let dist = UniformPace::new(240.0, 480.0, 42);
        assert_eq!(dist.sample_sec_per_km(7), dist.sample_sec_per_km(7));
        assert_ne!(dist.sample_sec_per_km(7), dist.sample_sec_per_km(8));
    }

    #[test]
    fn degenerate_uniform_returns_the_single_pace() {
        let dist = UniformPace::new(300.0, 300.0, 42);
        assert_eq!(dist.sample_sec_per_km(0), 300.0);
    }

    #[test]
    fn normal_pace_respects_the_clamp() {
        let dist = NormalPace::new(360.0, 45.0, 7).with_clamp(300.0, 420.0);
        for i in 0..500 {
            let pace = dist.sample_sec_per_km(i);
            assert!((300.0..=420.0).contains(&pace));
        }
    }

    #[test]
    fn normal_pace_centers_near_the_mean() {
        let dist = NormalPace::new(360.0, 30.0, 7);
        let n = 2000;
        let sum: f64 = (0..n).map(|i| dist.sample_sec_per_km(i)).sum();
        let mean = sum / n as f64;
        assert!((mean - 360.0).abs() < 5.0, "sample mean {mean} drifted");
    }
}
