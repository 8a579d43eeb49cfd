// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Evaluator builder utilities for tests.

use std::sync::Arc;

use rulecomp_core::{Evaluator, EvaluatorConfig, Oracles};

use crate::oracles::{CountingIsomorphism, ScriptedComposer, ToyPrimitives};
use crate::rules::{ToyGraph, ToyRule};

/// An evaluator over toy rules plus handles to the doubles it was built with.
pub struct TestHarness {
    /// The evaluator under test.
    pub evaluator: Evaluator<ToyRule, ToyGraph>,
    /// Shared handle to the isomorphism oracle.
    pub isomorphism: CountingIsomorphism,
    /// Shared handle to the composition oracle.
    pub composer: ScriptedComposer,
}

/// Builder for test evaluators wired to the toy doubles.
///
/// # Example
///
/// ```
/// use rulecomp_dry_tests::{toy, EvaluatorTestBuilder};
///
/// let harness = EvaluatorTestBuilder::new()
///     .with_workers(4)
///     .with_rule(toy("a"))
///     .build();
/// assert_eq!(harness.evaluator.database().len(), 1);
/// ```
pub struct EvaluatorTestBuilder {
    config: EvaluatorConfig,
    composer: ScriptedComposer,
    database: Vec<Arc<ToyRule>>,
}

impl Default for EvaluatorTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluatorTestBuilder {
    /// Create a builder with the default config and an unscripted composer.
    pub fn new() -> Self {
        Self {
            config: EvaluatorConfig::default(),
            composer: ScriptedComposer::new(),
            database: Vec::new(),
        }
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config = self.config.with_workers(workers);
        self
    }

    /// Replace the whole config.
    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a pre-scripted composer.
    pub fn with_composer(mut self, composer: ScriptedComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Seed the initial database with a rule.
    pub fn with_rule(mut self, rule: Arc<ToyRule>) -> Self {
        self.database.push(rule);
        self
    }

    /// Build the evaluator.
    ///
    /// # Panics
    ///
    /// Panics if the configured [`EvaluatorConfig`] is invalid.
    #[allow(clippy::expect_used)]
    pub fn build(self) -> TestHarness {
        let isomorphism = CountingIsomorphism::new();
        let oracles = Oracles::new(isomorphism.clone(), self.composer.clone(), ToyPrimitives);
        let evaluator = Evaluator::with_database(oracles, self.config, self.database)
            .expect("valid evaluator config");
        TestHarness {
            evaluator,
            isomorphism,
            composer: self.composer,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rules::toy;

    #[test]
    fn seeds_are_interned_in_order() {
        let h = EvaluatorTestBuilder::new()
            .with_rule(toy("a"))
            .with_rule(toy("b"))
            .with_rule(Arc::new(ToyRule::new("a-again", "a")))
            .build();
        let db = h.evaluator.database();
        assert_eq!(db.len(), 2);
        let first = *db.iter().next().unwrap();
        assert_eq!(h.evaluator.rule(first).unwrap().label, "a");
        assert!(h.isomorphism.calls() > 0);
    }

    #[test]
    fn config_is_forwarded() {
        let h = EvaluatorTestBuilder::new().with_workers(3).build();
        assert_eq!(h.evaluator.config().workers, 3);
    }
}
