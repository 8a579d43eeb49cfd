// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Evaluator configuration.
use crate::error::ConfigError;

/// Tuning knobs for an [`Evaluator`](crate::Evaluator).
///
/// None of these affect evaluation results; they only change how much work
/// runs in parallel and how finely the per-pair critical sections are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvaluatorConfig {
    /// Maximum number of worker threads used for independent sub-evaluations
    /// (union operands, cross-product pairs). `1` evaluates serially.
    pub workers: usize,
    /// Number of lock shards guarding the check-then-compose critical section.
    /// Must be a power of two.
    pub pair_lock_shards: usize,
    /// Minimum number of independent items before a worker pool is spawned.
    pub parallel_threshold: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            pair_lock_shards: 64,
            parallel_threshold: 2,
        }
    }
}

impl EvaluatorConfig {
    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the number of pair-lock shards.
    pub fn with_pair_lock_shards(mut self, shards: usize) -> Self {
        self.pair_lock_shards = shards;
        self
    }

    /// Sets the parallel threshold.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Checks the invariants the evaluator relies on.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroWorkers`] if `workers == 0`;
    /// [`ConfigError::ShardCountNotPowerOfTwo`] if `pair_lock_shards` is not a
    /// non-zero power of two.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if !self.pair_lock_shards.is_power_of_two() {
            return Err(ConfigError::ShardCountNotPowerOfTwo(self.pair_lock_shards));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_and_serial() {
        let cfg = EvaluatorConfig::default();
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_workers() {
        let cfg = EvaluatorConfig::default().with_workers(0);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroWorkers));
    }

    #[test]
    fn rejects_non_power_of_two_shards() {
        for bad in [0, 3, 48] {
            let cfg = EvaluatorConfig::default().with_pair_lock_shards(bad);
            assert_eq!(
                cfg.validate(),
                Err(ConfigError::ShardCountNotPowerOfTwo(bad))
            );
        }
        let cfg = EvaluatorConfig::default().with_pair_lock_shards(1);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: EvaluatorConfig = serde_json::from_str(r#"{"workers": 4}"#).unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.pair_lock_shards, 64);
        assert_eq!(cfg.parallel_threshold, 2);
    }
}
