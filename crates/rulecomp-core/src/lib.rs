// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! rulecomp-core: evaluator for algebraic expressions over transformation rules.
//!
//! Rules are opaque values. Their identity is decided by an external
//! [`IsomorphismOracle`], and combining two rules is delegated to an external
//! [`CompositionOracle`]. This crate owns what sits between them:
//!
//! - the [`Expression`] algebra (terminals, unions, primitive constructors and
//!   four composition operators),
//! - the [`RuleUniverse`], which keeps exactly one canonical member per
//!   isomorphism class,
//! - the [`DerivationGraph`], an append-only provenance DAG that doubles as the
//!   memo table for pairwise compositions,
//! - the [`Evaluator`], which walks expressions and keeps the other two in sync.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rulecomp_core::{
//!     CompositionError, CompositionOracle, CompositionPolicy, Evaluator, Expression,
//!     IsomorphismOracle, Oracles, PrimitiveBuilder,
//! };
//!
//! struct SameText;
//! impl IsomorphismOracle<String> for SameText {
//!     fn are_isomorphic(&self, a: &String, b: &String) -> bool {
//!         a == b
//!     }
//! }
//!
//! struct Concat;
//! impl CompositionOracle<String> for Concat {
//!     fn compose(
//!         &self,
//!         first: &String,
//!         second: &String,
//!         _policy: &CompositionPolicy,
//!     ) -> Result<Vec<String>, CompositionError> {
//!         Ok(vec![format!("{first}{second}")])
//!     }
//! }
//!
//! struct Wrap;
//! impl PrimitiveBuilder<String, String> for Wrap {
//!     fn bind(&self, g: &String) -> String {
//!         format!("+{g}")
//!     }
//!     fn identity(&self, g: &String) -> String {
//!         format!("={g}")
//!     }
//!     fn unbind(&self, g: &String) -> String {
//!         format!("-{g}")
//!     }
//! }
//!
//! let evaluator = Evaluator::new(Oracles::new(SameText, Concat, Wrap));
//! let exp: Expression<String, String> = Expression::compose_parallel(
//!     Expression::terminal(Arc::new("a".to_owned())),
//!     Expression::terminal(Arc::new("b".to_owned())),
//!     false,
//! );
//! let result = evaluator.evaluate(&exp).unwrap();
//! assert_eq!(result.len(), 1);
//! assert_eq!(evaluator.database().len(), 3);
//! assert!(evaluator.products().is_empty());
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod config;
mod derivation;
mod error;
mod evaluator;
mod expression;
mod oracle;
mod pool;
mod shard;
mod universe;

/// Evaluator tuning knobs (worker count, lock sharding).
pub use config::EvaluatorConfig;
/// Derivation graph, its vertices, edges and diagnostic dump.
pub use derivation::{
    CompositionKey, DerivationGraph, Edge, EdgeKind, GraphDump, Vertex, VertexId,
};
/// Error taxonomy: construction, composition, evaluation and configuration.
pub use error::{CompositionError, ConfigError, ConstructionError, EvalError};
/// Expression evaluator and its counters.
pub use evaluator::{Evaluator, EvaluatorStats};
/// Expression algebra.
pub use expression::{Compose, ComposeKind, CompositionPolicy, Expression, Union};
/// External collaborator seams.
pub use oracle::{CompositionOracle, IsomorphismOracle, Oracles, PrimitiveBuilder};
/// Canonical rule store.
pub use universe::{Interned, RuleId, RuleOrigin, RuleSet, RuleUniverse};
