// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use rulecomp_core::{Expression, RuleSet};
use rulecomp_dry_tests::{EvaluatorTestBuilder, TestHarness, ToyGraph, ToyRule};

type Exp = Expression<ToyRule, ToyGraph>;

// A union child: a bare terminal, or a parallel composition of two terminals.
type Child = (String, Option<String>);

fn term(shape: &str) -> Exp {
    Exp::terminal(Arc::new(ToyRule::named(shape)))
}

fn child(desc: &Child) -> Exp {
    match desc {
        (a, None) => term(a),
        (a, Some(b)) => Exp::compose_parallel(term(a), term(b), false),
    }
}

fn union_of(shapes: &[String]) -> Exp {
    Exp::union(shapes.iter().map(|s| term(s)).collect()).unwrap()
}

// Results from different evaluators are compared by shape, never by handle.
fn shapes(h: &TestHarness, set: &RuleSet) -> BTreeSet<String> {
    set.iter()
        .map(|id| h.evaluator.rule(*id).unwrap().shape.clone())
        .collect()
}

fn shape_strategy() -> impl Strategy<Value = String> {
    "[a-d]{1,2}"
}

fn child_strategy() -> impl Strategy<Value = Child> {
    (shape_strategy(), proptest::option::of(shape_strategy()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn interning_is_idempotent(shapes in proptest::collection::vec(shape_strategy(), 1..8)) {
        let h = EvaluatorTestBuilder::new().build();
        for s in &shapes {
            let first = h.evaluator.add_rule(Arc::new(ToyRule::new("first", s)));
            let canonical = h.evaluator.rule(first.id).unwrap();
            prop_assert_eq!(h.evaluator.add_rule(canonical).id, first.id);
            let copy = h.evaluator.add_rule(Arc::new(ToyRule::new("copy", s)));
            prop_assert_eq!(copy.id, first.id);
            prop_assert!(!copy.is_new);
        }
        let distinct: BTreeSet<&String> = shapes.iter().collect();
        prop_assert_eq!(h.evaluator.database().len(), distinct.len());
    }

    #[test]
    fn compose_distributes_over_union(
        lhs in proptest::collection::vec(shape_strategy(), 1..4),
        rhs in proptest::collection::vec(shape_strategy(), 1..4),
    ) {
        let h = EvaluatorTestBuilder::new().build();
        let whole = h
            .evaluator
            .evaluate(&Exp::compose_parallel(union_of(&lhs), union_of(&rhs), false))
            .unwrap();

        let mut pieces = RuleSet::new();
        for a in &lhs {
            for c in &rhs {
                pieces.extend(
                    h.evaluator
                        .evaluate(&Exp::compose_parallel(term(a), term(c), false))
                        .unwrap(),
                );
            }
        }
        prop_assert_eq!(&whole, &pieces);
        // Every piece was already memoized by the first evaluation.
        prop_assert_eq!(h.composer.max_calls_per_key(), 1);
    }

    #[test]
    fn union_order_is_not_observable(
        (children, shuffled) in proptest::collection::vec(child_strategy(), 1..6)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let forward = EvaluatorTestBuilder::new().build();
        let reordered = EvaluatorTestBuilder::new().build();
        let a = forward
            .evaluator
            .evaluate(&Exp::union(children.iter().map(child).collect()).unwrap())
            .unwrap();
        let b = reordered
            .evaluator
            .evaluate(&Exp::union(shuffled.iter().map(child).collect()).unwrap())
            .unwrap();
        prop_assert_eq!(shapes(&forward, &a), shapes(&reordered, &b));
        prop_assert_eq!(
            forward.evaluator.database().len(),
            reordered.evaluator.database().len()
        );
    }

    #[test]
    fn worker_count_is_not_observable(
        children in proptest::collection::vec(child_strategy(), 1..6),
        workers in 2usize..6,
    ) {
        let serial = EvaluatorTestBuilder::new().build();
        let parallel = EvaluatorTestBuilder::new().with_workers(workers).build();
        let exp = Exp::union(children.iter().map(child).collect()).unwrap();
        let a = serial.evaluator.evaluate(&exp).unwrap();
        let b = parallel.evaluator.evaluate(&exp).unwrap();
        prop_assert_eq!(shapes(&serial, &a), shapes(&parallel, &b));
        prop_assert_eq!(serial.composer.calls(), parallel.composer.calls());
    }
}
