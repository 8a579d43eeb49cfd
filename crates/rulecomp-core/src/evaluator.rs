// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Expression evaluator.
//!
//! The evaluator owns the [`RuleUniverse`] and the [`DerivationGraph`] and is
//! the only component that mutates them. Both persist across `evaluate`
//! calls, so every evaluation on the same instance shares one memo table.
//!
//! # Locking
//!
//! - Universe: `RwLock`. Interning scans under the read lock, then takes the
//!   write lock and rescans only members appended in between.
//! - Graph: `Mutex`, held only for lookups and recording, never across an
//!   oracle call.
//! - Pair shards: `Mutex<()>` per shard, held across the whole
//!   check-compose-record sequence for a key. Equal keys share a shard, so
//!   the composition oracle runs at most once per key.
//!
//! Lock order is pair shard, then universe, then graph; a thread never holds
//! two pair shards at once.
use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, instrument, trace};

use crate::config::EvaluatorConfig;
use crate::derivation::{CompositionKey, DerivationGraph, GraphDump};
use crate::error::{CompositionError, ConfigError, EvalError};
use crate::expression::{Compose, Expression};
use crate::oracle::{CompositionOracle, Oracles, PrimitiveBuilder};
use crate::pool::try_run_claimed;
use crate::shard::shard_of;
use crate::universe::{Interned, RuleId, RuleOrigin, RuleSet, RuleUniverse};

/// Point-in-time evaluator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluatorStats {
    /// Isomorphism oracle invocations.
    pub isomorphism_tests: u64,
    /// Composition oracle invocations.
    pub composition_calls: u64,
    /// Operand pairs answered from the memo table (results or failures).
    pub cache_hits: u64,
    /// Operand pairs that had to be composed.
    pub cache_misses: u64,
    /// Rules that became new canonical members.
    pub rules_interned: u64,
}

#[derive(Debug, Default)]
struct Counters {
    composition_calls: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rules_interned: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// Whether the current call may still fan out to the worker pool.
#[derive(Clone, Copy)]
struct Ctx {
    parallel: bool,
}

/// Evaluates [`Expression`]s into sets of canonical rules.
///
/// `evaluate` takes `&self`; an evaluator can be shared (e.g. in an `Arc`)
/// between threads evaluating different expressions.
pub struct Evaluator<R, G> {
    config: EvaluatorConfig,
    universe: RwLock<RuleUniverse<R>>,
    graph: Mutex<DerivationGraph>,
    pair_locks: Box<[Mutex<()>]>,
    composition: Arc<dyn CompositionOracle<R>>,
    primitives: Arc<dyn PrimitiveBuilder<R, G>>,
    counters: Counters,
}

impl<R, G> Evaluator<R, G>
where
    R: Send + Sync,
    G: Send + Sync,
{
    /// Creates an evaluator with an empty database and the default config.
    pub fn new(oracles: Oracles<R, G>) -> Self {
        Self::build(oracles, EvaluatorConfig::default())
    }

    /// Creates an evaluator with an empty database.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] reported by [`EvaluatorConfig::validate`].
    pub fn with_config(oracles: Oracles<R, G>, config: EvaluatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(oracles, config))
    }

    /// Creates an evaluator seeded with `database`.
    ///
    /// Seed rules are interned as primitives, so isomorphic duplicates in the
    /// seed collapse to their first occurrence.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] reported by [`EvaluatorConfig::validate`].
    pub fn with_database(
        oracles: Oracles<R, G>,
        config: EvaluatorConfig,
        database: impl IntoIterator<Item = Arc<R>>,
    ) -> Result<Self, ConfigError> {
        let evaluator = Self::with_config(oracles, config)?;
        for rule in database {
            evaluator.intern(rule, RuleOrigin::Primitive);
        }
        Ok(evaluator)
    }

    fn build(oracles: Oracles<R, G>, config: EvaluatorConfig) -> Self {
        let pair_locks = (0..config.pair_lock_shards.max(1))
            .map(|_| Mutex::new(()))
            .collect();
        Self {
            config,
            universe: RwLock::new(RuleUniverse::new(oracles.isomorphism)),
            graph: Mutex::new(DerivationGraph::new()),
            pair_locks,
            composition: oracles.composition,
            primitives: oracles.primitives,
            counters: Counters::default(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    fn read_universe(&self) -> RwLockReadGuard<'_, RuleUniverse<R>> {
        self.universe.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_universe(&self) -> RwLockWriteGuard<'_, RuleUniverse<R>> {
        self.universe.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_graph(&self) -> MutexGuard<'_, DerivationGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn intern(&self, candidate: Arc<R>, origin: RuleOrigin) -> Interned {
        let scanned = {
            let universe = self.read_universe();
            if let Some(id) = universe.lookup_ptr(&candidate) {
                return Interned { id, is_new: false };
            }
            if let Some(id) = universe.find_isomorphic(&candidate) {
                return Interned { id, is_new: false };
            }
            universe.len()
        };
        let interned = self
            .write_universe()
            .intern_after_scan(candidate, origin, scanned);
        if interned.is_new {
            Counters::bump(&self.counters.rules_interned);
        }
        interned
    }

    /// Interns an externally supplied rule as a primitive.
    pub fn add_rule(&self, rule: Arc<R>) -> Interned {
        self.intern(rule, RuleOrigin::Primitive)
    }

    /// Canonical member isomorphic to `rule`, without inserting anything.
    pub fn find_isomorphic(&self, rule: &R) -> Option<RuleId> {
        self.read_universe().find_isomorphic(rule)
    }

    /// Canonical rule behind `id`.
    pub fn rule(&self, id: RuleId) -> Option<Arc<R>> {
        self.read_universe().get(id).cloned()
    }

    /// Every canonical rule known to the evaluator.
    pub fn database(&self) -> RuleSet {
        self.read_universe().database()
    }

    /// Rules marked as products.
    pub fn products(&self) -> RuleSet {
        self.read_universe().products().clone()
    }

    /// `true` if `id` is marked as a product.
    pub fn is_product(&self, id: RuleId) -> bool {
        self.read_universe().is_product(id)
    }

    /// Marks a canonical rule as a product; idempotent. Returns `true` if the
    /// rule was newly marked. Evaluation never marks products on its own.
    ///
    /// # Errors
    ///
    /// [`EvalError::UnknownRule`] if `id` does not belong to this evaluator.
    pub fn mark_as_product(&self, id: RuleId) -> Result<bool, EvalError> {
        self.write_universe().mark_as_product(id)
    }

    /// How `id` first entered the universe.
    pub fn origin(&self, id: RuleId) -> Option<RuleOrigin> {
        self.read_universe().origin(id)
    }

    /// Recorded compositions that produced `id`.
    pub fn derivations_of(&self, id: RuleId) -> Vec<CompositionKey> {
        self.lock_graph().derivations_of(id)
    }

    /// Vertex/edge listing of the derivation graph.
    pub fn graph_dump(&self) -> GraphDump {
        self.lock_graph().dump()
    }

    /// Runs `f` with read access to the derivation graph.
    pub fn with_graph<T>(&self, f: impl FnOnce(&DerivationGraph) -> T) -> T {
        f(&self.lock_graph())
    }

    /// Snapshot of the evaluator's counters.
    pub fn stats(&self) -> EvaluatorStats {
        EvaluatorStats {
            isomorphism_tests: self.read_universe().isomorphism_tests(),
            composition_calls: self.counters.composition_calls.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            rules_interned: self.counters.rules_interned.load(Ordering::Relaxed),
        }
    }
}

impl<R, G> Evaluator<R, G>
where
    R: Send + Sync + fmt::Display,
    G: Send + Sync + fmt::Display,
{
    /// Evaluates `exp` to the set of canonical rules it denotes.
    ///
    /// Every rule produced along the way is interned into the database; none
    /// is marked as a product.
    ///
    /// # Errors
    ///
    /// [`EvalError::Composition`] if the composition oracle fails for any
    /// operand pair. Evaluation is all-or-nothing: no partial result set is
    /// returned, although compositions recorded before the failure stay in the
    /// derivation graph.
    #[instrument(level = "debug", skip_all, fields(nodes = exp.size()))]
    pub fn evaluate(&self, exp: &Expression<R, G>) -> Result<RuleSet, EvalError> {
        let result = self.eval(exp, Ctx { parallel: true })?;
        debug!(results = result.len(), "evaluation finished");
        Ok(result)
    }

    fn eval(&self, exp: &Expression<R, G>, ctx: Ctx) -> Result<RuleSet, EvalError> {
        match exp {
            Expression::Terminal(rule) => Ok(self.singleton(Arc::clone(rule))),
            Expression::Bind(graph) => Ok(self.singleton(Arc::new(self.primitives.bind(graph)))),
            Expression::Identity(graph) => {
                Ok(self.singleton(Arc::new(self.primitives.identity(graph))))
            }
            Expression::Unbind(graph) => {
                Ok(self.singleton(Arc::new(self.primitives.unbind(graph))))
            }
            Expression::Union(union) => {
                let operands = union.operands();
                let parts = self.fan_out(operands.len(), ctx, |i, inner| {
                    self.eval(&operands[i], inner)
                })?;
                Ok(parts.into_iter().flatten().collect())
            }
            Expression::Compose(node) => self.eval_compose(node, ctx),
        }
    }

    fn singleton(&self, rule: Arc<R>) -> RuleSet {
        RuleSet::from([self.intern(rule, RuleOrigin::Primitive).id])
    }

    fn eval_compose(&self, node: &Compose<R, G>, ctx: Ctx) -> Result<RuleSet, EvalError> {
        let firsts = self.eval(node.first(), ctx)?;
        let seconds = self.eval(node.second(), ctx)?;
        let policy = node.policy();
        let keys: Vec<CompositionKey> = firsts
            .iter()
            .flat_map(|&a| seconds.iter().map(move |&b| CompositionKey::new(a, b, policy)))
            .collect();
        let parts = self.fan_out(keys.len(), ctx, |i, _| self.compose_pair(keys[i], node))?;
        Ok(parts.into_iter().flatten().collect())
    }

    // Runs independent items serially or on the worker pool. Workers get a
    // non-parallel context so pools never nest; serial items keep the caller's.
    fn fan_out<F>(&self, count: usize, ctx: Ctx, work: F) -> Result<Vec<RuleSet>, EvalError>
    where
        F: Fn(usize, Ctx) -> Result<RuleSet, EvalError> + Sync,
    {
        let workers = self.config.workers;
        if ctx.parallel && workers > 1 && count >= self.config.parallel_threshold {
            trace!(count, workers, "fanning out");
            try_run_claimed(count, workers, |i| work(i, Ctx { parallel: false }))
        } else {
            try_run_claimed(count, 1, |i| work(i, ctx))
        }
    }

    fn cached(&self, key: &CompositionKey) -> Option<Result<RuleSet, CompositionError>> {
        let graph = self.lock_graph();
        if let Some(results) = graph.cached_results(key) {
            return Some(Ok(results.clone()));
        }
        graph.cached_failure(key).cloned().map(Err)
    }

    fn compose_pair(&self, key: CompositionKey, node: &Compose<R, G>) -> Result<RuleSet, EvalError> {
        if let Some(hit) = self.cached(&key) {
            return self.cache_hit(key, node, hit);
        }

        let shard = shard_of(&key, self.pair_locks.len());
        let _pair = self.pair_locks[shard]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Another worker may have composed this key while we waited.
        if let Some(hit) = self.cached(&key) {
            return self.cache_hit(key, node, hit);
        }
        Counters::bump(&self.counters.cache_misses);

        let (first, second) = {
            let universe = self.read_universe();
            match (universe.get(key.first), universe.get(key.second)) {
                (Some(a), Some(b)) => (Arc::clone(a), Arc::clone(b)),
                (None, _) => return Err(EvalError::UnknownRule(key.first)),
                (_, None) => return Err(EvalError::UnknownRule(key.second)),
            }
        };

        Counters::bump(&self.counters.composition_calls);
        match self.composition.compose(&first, &second, &key.policy) {
            Ok(candidates) => {
                debug!(
                    first = %key.first,
                    second = %key.second,
                    policy = %key.policy,
                    candidates = candidates.len(),
                    "composed"
                );
                let ids: Vec<RuleId> = candidates
                    .into_iter()
                    .map(|c| self.intern(Arc::new(c), RuleOrigin::Derived).id)
                    .collect();
                Ok(self.lock_graph().record_composition(key, ids).clone())
            }
            Err(source) => {
                debug!(first = %key.first, second = %key.second, error = %source, "composition failed");
                self.lock_graph().record_failure(key, source.clone());
                Err(Self::composition_error(key, node, source))
            }
        }
    }

    fn cache_hit(
        &self,
        key: CompositionKey,
        node: &Compose<R, G>,
        hit: Result<RuleSet, CompositionError>,
    ) -> Result<RuleSet, EvalError> {
        Counters::bump(&self.counters.cache_hits);
        trace!(first = %key.first, second = %key.second, "composition cache hit");
        hit.map_err(|source| Self::composition_error(key, node, source))
    }

    fn composition_error(
        key: CompositionKey,
        node: &Compose<R, G>,
        source: CompositionError,
    ) -> EvalError {
        EvalError::Composition {
            expression: node.to_string(),
            first: key.first,
            second: key.second,
            source,
        }
    }
}

impl<R, G> fmt::Debug for Evaluator<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
