// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Counting and scripted oracle doubles.
//!
//! Every double is `Clone` and shares its state between clones, so a test can
//! hand one clone to the evaluator and keep another to inspect call counts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rulecomp_core::{
    CompositionError, CompositionOracle, CompositionPolicy, IsomorphismOracle, PrimitiveBuilder,
};

use crate::rules::{ToyGraph, ToyRule};

/// Isomorphism by shape equality that counts its invocations.
#[derive(Clone, Default)]
pub struct CountingIsomorphism {
    calls: Arc<AtomicUsize>,
}

impl CountingIsomorphism {
    /// Create a fresh counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `are_isomorphic` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl IsomorphismOracle<ToyRule> for CountingIsomorphism {
    fn are_isomorphic(&self, a: &ToyRule, b: &ToyRule) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        a.shape == b.shape
    }
}

type PairKey = (String, String, CompositionPolicy);

#[derive(Default)]
struct ComposerInner {
    script: HashMap<(String, String), Result<Vec<ToyRule>, CompositionError>>,
    calls: HashMap<PairKey, usize>,
    total: usize,
}

/// Composition oracle driven by a per-shape-pair script.
///
/// Unscripted pairs compose to a single rule whose label is `a.b` and whose
/// shape is the concatenation of the operand shapes. Scripted pairs return
/// whatever was registered with [`with`](Self::with) or
/// [`failing`](Self::failing), regardless of policy.
///
/// # Example
///
/// ```
/// use rulecomp_core::{CompositionError, CompositionOracle, CompositionPolicy, ComposeKind};
/// use rulecomp_dry_tests::{ScriptedComposer, ToyRule};
///
/// let composer = ScriptedComposer::new()
///     .failing("a", "b", CompositionError::Inapplicable("no overlap".into()));
/// let policy = CompositionPolicy::new(ComposeKind::Parallel, false);
/// let a = ToyRule::named("a");
/// let b = ToyRule::named("b");
/// assert!(composer.compose(&a, &b, &policy).is_err());
/// assert_eq!(composer.compose(&b, &a, &policy).unwrap()[0].label, "b.a");
/// assert_eq!(composer.calls(), 2);
/// ```
#[derive(Clone, Default)]
pub struct ScriptedComposer {
    inner: Arc<Mutex<ComposerInner>>,
    delay: Option<Duration>,
}

impl ScriptedComposer {
    /// Create a composer with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the results for the shape pair `(first, second)`.
    pub fn with(self, first: &str, second: &str, results: Vec<ToyRule>) -> Self {
        self.script(first, second, Ok(results))
    }

    /// Script a failure for the shape pair `(first, second)`.
    pub fn failing(self, first: &str, second: &str, error: CompositionError) -> Self {
        self.script(first, second, Err(error))
    }

    /// Sleep inside every `compose` call; widens race windows in
    /// concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn script(
        self,
        first: &str,
        second: &str,
        outcome: Result<Vec<ToyRule>, CompositionError>,
    ) -> Self {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .script
            .insert((first.to_string(), second.to_string()), outcome);
        self
    }

    /// Total number of `compose` calls.
    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).total
    }

    /// Calls for one shape pair, summed over all policies.
    pub fn calls_for(&self, first: &str, second: &str) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .iter()
            .filter(|((a, b, _), _)| a == first && b == second)
            .map(|(_, n)| n)
            .sum()
    }

    /// Highest call count observed for any single `(first, second, policy)`.
    pub fn max_calls_per_key(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }
}

impl CompositionOracle<ToyRule> for ScriptedComposer {
    fn compose(
        &self,
        first: &ToyRule,
        second: &ToyRule,
        policy: &CompositionPolicy,
    ) -> Result<Vec<ToyRule>, CompositionError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.total += 1;
        *inner
            .calls
            .entry((first.shape.clone(), second.shape.clone(), *policy))
            .or_default() += 1;
        match inner
            .script
            .get(&(first.shape.clone(), second.shape.clone()))
        {
            Some(outcome) => outcome.clone(),
            None => Ok(vec![ToyRule::new(
                &format!("{}.{}", first.label, second.label),
                &format!("{}{}", first.shape, second.shape),
            )]),
        }
    }
}

/// Primitive constructors: `+g`, `=g` and `-g` shapes for bind, identity and
/// unbind.
#[derive(Clone, Copy, Default)]
pub struct ToyPrimitives;

impl PrimitiveBuilder<ToyRule, ToyGraph> for ToyPrimitives {
    fn bind(&self, graph: &ToyGraph) -> ToyRule {
        ToyRule::new(&format!("bind({graph})"), &format!("+{graph}"))
    }

    fn identity(&self, graph: &ToyGraph) -> ToyRule {
        ToyRule::new(&format!("id({graph})"), &format!("={graph}"))
    }

    fn unbind(&self, graph: &ToyGraph) -> ToyRule {
        ToyRule::new(&format!("unbind({graph})"), &format!("-{graph}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rulecomp_core::ComposeKind;

    fn parallel() -> CompositionPolicy {
        CompositionPolicy::new(ComposeKind::Parallel, false)
    }

    #[test]
    fn isomorphism_compares_shapes_and_counts() {
        let iso = CountingIsomorphism::new();
        let probe = iso.clone();
        assert!(iso.are_isomorphic(&ToyRule::new("a", "s"), &ToyRule::new("b", "s")));
        assert!(!iso.are_isomorphic(&ToyRule::named("a"), &ToyRule::named("b")));
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn scripted_results_override_the_default() {
        let composer = ScriptedComposer::new().with(
            "a",
            "b",
            vec![ToyRule::named("x"), ToyRule::named("y")],
        );
        let out = composer
            .compose(&ToyRule::named("a"), &ToyRule::named("b"), &parallel())
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].label, "y");
    }

    #[test]
    fn calls_are_tracked_per_key() {
        let composer = ScriptedComposer::new();
        let (a, b) = (ToyRule::named("a"), ToyRule::named("b"));
        let sub = CompositionPolicy::new(ComposeKind::Sub { allow_partial: false }, true);
        composer.compose(&a, &b, &parallel()).unwrap();
        composer.compose(&a, &b, &parallel()).unwrap();
        composer.compose(&a, &b, &sub).unwrap();
        composer.compose(&b, &a, &sub).unwrap();
        assert_eq!(composer.calls(), 4);
        assert_eq!(composer.calls_for("a", "b"), 3);
        assert_eq!(composer.calls_for("b", "a"), 1);
        assert_eq!(composer.max_calls_per_key(), 2);
    }

    #[test]
    fn primitives_build_distinct_shapes() {
        let g = ToyGraph("G".into());
        let p = ToyPrimitives;
        assert_eq!(p.bind(&g).shape, "+G");
        assert_eq!(p.identity(&g).shape, "=G");
        assert_eq!(p.unbind(&g).shape, "-G");
        assert_eq!(p.unbind(&g).label, "unbind(G)");
    }
}
