// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for rulecomp crates.
#![forbid(unsafe_code)]
//!
//! The core evaluator treats rules, graphs and every oracle as opaque. This
//! crate supplies small deterministic stand-ins so tests can observe exactly
//! how often the evaluator reaches for each collaborator.
//!
//! # Modules
//!
//! - [`rules`] - Toy rule and graph values
//! - [`oracles`] - Counting isomorphism oracle, scripted composer, primitives
//! - [`evaluator`] - Evaluator builder wiring the doubles together

pub mod evaluator;
pub mod oracles;
pub mod rules;

pub use evaluator::{EvaluatorTestBuilder, TestHarness};
pub use oracles::{CountingIsomorphism, ScriptedComposer, ToyPrimitives};
pub use rules::{toy, ToyGraph, ToyRule};
