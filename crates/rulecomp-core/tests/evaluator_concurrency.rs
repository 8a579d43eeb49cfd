// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::panic)]
//! At-most-once composition and deterministic failure under parallel evaluation.

use std::sync::Arc;
use std::time::Duration;

use rulecomp_core::{CompositionError, EvalError, EvaluatorConfig, Expression, RuleSet};
use rulecomp_dry_tests::{toy, EvaluatorTestBuilder, ScriptedComposer, ToyGraph, ToyRule};

type Exp = Expression<ToyRule, ToyGraph>;

fn t(name: &str) -> Exp {
    Exp::terminal(toy(name))
}

// {a, b, c} x {d, e}: six distinct keys.
fn cross() -> Exp {
    Exp::compose_parallel(
        Exp::union(vec![t("a"), t("b"), t("c")]).unwrap(),
        Exp::union(vec![t("d"), t("e")]).unwrap(),
        false,
    )
}

#[test]
fn workers_compose_each_key_at_most_once() {
    for workers in [2, 4, 8] {
        let composer = ScriptedComposer::new().with_delay(Duration::from_millis(2));
        let h = EvaluatorTestBuilder::new()
            .with_workers(workers)
            .with_composer(composer)
            .build();
        // Every child races on the same six keys.
        let exp = Exp::union((0..16).map(|_| cross()).collect()).unwrap();
        let out = h.evaluator.evaluate(&exp).unwrap();
        assert_eq!(out.len(), 6, "workers = {workers}");
        assert_eq!(h.composer.calls(), 6, "workers = {workers}");
        assert_eq!(h.composer.max_calls_per_key(), 1);
        // Five terminals plus six products, despite sixteen copies of each.
        assert_eq!(h.evaluator.database().len(), 11);
    }
}

#[test]
fn concurrent_evaluate_calls_share_one_memo_table() {
    let composer = ScriptedComposer::new().with_delay(Duration::from_millis(1));
    let h = EvaluatorTestBuilder::new()
        .with_config(
            EvaluatorConfig::default()
                .with_workers(2)
                .with_pair_lock_shards(4),
        )
        .with_composer(composer)
        .build();
    let evaluator = &h.evaluator;
    let exp = cross();

    let results: Vec<RuleSet> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| evaluator.evaluate(&exp).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(h.composer.calls(), 6);
    let stats = h.evaluator.stats();
    assert_eq!(stats.cache_misses, 6);
    assert_eq!(stats.cache_hits + stats.cache_misses, 8 * 6);
}

#[test]
fn lowest_failing_child_is_reported() {
    let composer = ScriptedComposer::new()
        .failing("b", "x", CompositionError::Inapplicable("first".into()))
        .failing("d", "x", CompositionError::Other("second".into()));
    let h = EvaluatorTestBuilder::new()
        .with_workers(4)
        .with_composer(composer)
        .build();
    let exp = Exp::union(vec![
        Exp::compose_parallel(t("a"), t("x"), false),
        Exp::compose_parallel(t("b"), t("x"), false),
        Exp::compose_parallel(t("c"), t("x"), false),
        Exp::compose_parallel(t("d"), t("x"), false),
    ])
    .unwrap();

    for _ in 0..4 {
        match h.evaluator.evaluate(&exp) {
            Err(EvalError::Composition {
                expression, source, ..
            }) => {
                assert_eq!(expression, "b *rcParallel(discardNonchemical=false)* x");
                assert_eq!(source, CompositionError::Inapplicable("first".into()));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}

#[test]
fn shared_evaluator_across_threads() {
    let h = EvaluatorTestBuilder::new().build();
    let evaluator = Arc::new(h.evaluator);
    let handles: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|name| {
            let evaluator = Arc::clone(&evaluator);
            std::thread::spawn(move || {
                evaluator
                    .evaluate(&Exp::compose_parallel(t(name), t("z"), true))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().len(), 1);
    }
    // Four operands, the shared "z" and four products.
    assert_eq!(evaluator.database().len(), 9);
    assert_eq!(h.composer.calls(), 4);
}
