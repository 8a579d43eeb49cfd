// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Seams for the external collaborators.
//!
//! The evaluator never looks inside a rule. Equivalence, composition and the
//! bind/identity/unbind constructors are all supplied by the caller through
//! the traits below. Implementations must be `Send + Sync`: a single
//! evaluator may call them from several worker threads at once.
use std::sync::Arc;

use crate::error::CompositionError;
use crate::expression::CompositionPolicy;

/// Equivalence test over rules.
///
/// Must be reflexive, symmetric and transitive. Violations are not detected;
/// the universe's one-member-per-class guarantee only holds for a correct
/// oracle.
pub trait IsomorphismOracle<R>: Send + Sync {
    /// Returns `true` iff `a` and `b` are the same rule up to isomorphism.
    fn are_isomorphic(&self, a: &R, b: &R) -> bool;
}

/// Computes the results of composing two rules.
///
/// Assumed deterministic and side-effect free: the evaluator calls it at most
/// once per `(first, second, policy)` and memoizes the outcome, failures
/// included. When `policy.discard_nonchemical` is set the oracle is expected to
/// drop chemically invalid candidates itself; otherwise it may report them as
/// [`CompositionError::Nonchemical`].
pub trait CompositionOracle<R>: Send + Sync {
    /// Returns zero or more candidate results, in oracle order.
    ///
    /// # Errors
    ///
    /// Any [`CompositionError`]; it aborts the enclosing evaluation.
    fn compose(
        &self,
        first: &R,
        second: &R,
        policy: &CompositionPolicy,
    ) -> Result<Vec<R>, CompositionError>;
}

/// Builds primitive rules from a graph. Total over well-formed graphs.
pub trait PrimitiveBuilder<R, G>: Send + Sync {
    /// Rule creating the graph from nothing.
    fn bind(&self, graph: &G) -> R;
    /// Rule mapping the graph to itself.
    fn identity(&self, graph: &G) -> R;
    /// Rule deleting the graph.
    fn unbind(&self, graph: &G) -> R;
}

/// The three collaborators an [`Evaluator`](crate::Evaluator) is built from.
pub struct Oracles<R, G> {
    /// Rule equivalence.
    pub isomorphism: Arc<dyn IsomorphismOracle<R>>,
    /// Pairwise composition.
    pub composition: Arc<dyn CompositionOracle<R>>,
    /// Primitive rule constructors.
    pub primitives: Arc<dyn PrimitiveBuilder<R, G>>,
}

impl<R, G> Oracles<R, G> {
    /// Bundles owned collaborators.
    pub fn new<I, C, P>(isomorphism: I, composition: C, primitives: P) -> Self
    where
        I: IsomorphismOracle<R> + 'static,
        C: CompositionOracle<R> + 'static,
        P: PrimitiveBuilder<R, G> + 'static,
    {
        Self {
            isomorphism: Arc::new(isomorphism),
            composition: Arc::new(composition),
            primitives: Arc::new(primitives),
        }
    }

    /// Bundles shared collaborators, e.g. counting doubles a test keeps a
    /// handle to.
    pub fn from_shared(
        isomorphism: Arc<dyn IsomorphismOracle<R>>,
        composition: Arc<dyn CompositionOracle<R>>,
        primitives: Arc<dyn PrimitiveBuilder<R, G>>,
    ) -> Self {
        Self {
            isomorphism,
            composition,
            primitives,
        }
    }
}

impl<R, G> Clone for Oracles<R, G> {
    fn clone(&self) -> Self {
        Self {
            isomorphism: Arc::clone(&self.isomorphism),
            composition: Arc::clone(&self.composition),
            primitives: Arc::clone(&self.primitives),
        }
    }
}

impl<R, G> core::fmt::Debug for Oracles<R, G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Oracles").finish_non_exhaustive()
    }
}
