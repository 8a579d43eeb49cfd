// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for expression construction, composition and evaluation.
use thiserror::Error;

use crate::universe::RuleId;

/// Raised while building an expression; never deferred to evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// A union (parallel composition) was given no operands.
    #[error("[RC_EMPTY_UNION] a union expression must have at least one operand")]
    EmptyUnion,
}

/// Failure reported by a [`CompositionOracle`](crate::CompositionOracle).
///
/// `Clone` so the evaluator can memoize failures alongside results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// The operator cannot be applied to the given operands.
    #[error("composition inapplicable: {0}")]
    Inapplicable(String),
    /// A candidate result was chemically invalid and `discardNonchemical` was off.
    #[error("nonchemical result: {0}")]
    Nonchemical(String),
    /// Any other oracle-side failure.
    #[error("composition failed: {0}")]
    Other(String),
}

/// Error returned by [`Evaluator::evaluate`](crate::Evaluator::evaluate) and
/// the evaluator's mutating helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The composition oracle failed for one operand pair.
    #[error("[RC_COMPOSE] {expression}: composing {first} with {second}: {source}")]
    Composition {
        /// Rendering of the offending composition sub-expression.
        expression: String,
        /// Canonical first operand.
        first: RuleId,
        /// Canonical second operand.
        second: RuleId,
        /// Oracle failure.
        source: CompositionError,
    },
    /// A rule handle that does not belong to this evaluator's universe.
    #[error("[RC_UNKNOWN_RULE] rule {0} is not in the universe")]
    UnknownRule(RuleId),
}

/// Invalid [`EvaluatorConfig`](crate::EvaluatorConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// At least one worker is required.
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    /// Pair-lock shards are routed by bit mask.
    #[error("pair lock shard count must be a non-zero power of two, got {0}")]
    ShardCountNotPowerOfTwo(usize),
}
