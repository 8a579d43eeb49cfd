// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Derivation graph: composition provenance and memo table.
//!
//! Two vertex kinds: one rule vertex per canonical rule, one composition
//! vertex per distinct [`CompositionKey`]. A composition vertex has a `First`
//! and a `Second` edge to its operands and one `Result` edge per distinct
//! canonical result. Edges are stored as handle pairs in an arena; nothing
//! points back into the graph.
//!
//! # Invariants
//!
//! - At most one composition vertex per key; this is the memoization contract.
//! - Append-only: vertices, edges and memoized failures are never removed, so
//!   a recorded outcome stays valid for the lifetime of the graph.

// Vertex handles are u32, like rule handles.
#![allow(clippy::cast_possible_truncation)]

use core::fmt;

use rustc_hash::FxHashMap;

use crate::error::CompositionError;
use crate::expression::CompositionPolicy;
use crate::universe::{RuleId, RuleSet};

/// Handle to a vertex of the derivation graph.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexId(u32);

impl VertexId {
    /// Arena index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Memoization key: ordered operand pair plus policy.
///
/// Order matters; `(a, b)` and `(b, a)` are distinct keys even for
/// operators that happen to be commutative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompositionKey {
    /// Canonical first operand.
    pub first: RuleId,
    /// Canonical second operand.
    pub second: RuleId,
    /// Operator, flags and `discardNonchemical`.
    pub policy: CompositionPolicy,
}

impl CompositionKey {
    /// Creates a key.
    pub fn new(first: RuleId, second: RuleId, policy: CompositionPolicy) -> Self {
        Self {
            first,
            second,
            policy,
        }
    }
}

/// Vertex payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Vertex {
    /// A canonical rule.
    Rule(RuleId),
    /// One application of a composition operator.
    Composition(CompositionKey),
}

/// Edge classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeKind {
    /// Composition -> first operand.
    First,
    /// Composition -> second operand.
    Second,
    /// Composition -> produced rule.
    Result,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::First => "First",
            Self::Second => "Second",
            Self::Result => "Result",
        })
    }
}

/// Directed edge; the source is always a composition vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// Composition vertex.
    pub source: VertexId,
    /// Rule vertex.
    pub target: VertexId,
    /// Role of `target` in the composition.
    pub kind: EdgeKind,
}

/// Owned vertex/edge listing for tooling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphDump {
    /// Vertices in creation order; position `i` is `VertexId(i)`.
    pub vertices: Vec<Vertex>,
    /// Edges in creation order.
    pub edges: Vec<Edge>,
}

impl fmt::Display for GraphDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "derivation graph: {} vertices, {} edges",
            self.vertices.len(),
            self.edges.len()
        )?;
        for (i, vertex) in self.vertices.iter().enumerate() {
            let id = VertexId(i as u32);
            match vertex {
                Vertex::Rule(rule) => writeln!(f, "  {id} rule {rule}")?,
                Vertex::Composition(key) => writeln!(
                    f,
                    "  {id} compose {} {} {}",
                    key.first, key.policy, key.second
                )?,
            }
        }
        for edge in &self.edges {
            writeln!(f, "  {} -{}-> {}", edge.source, edge.kind, edge.target)?;
        }
        Ok(())
    }
}

/// Append-only provenance DAG and composition memo table.
#[derive(Debug, Default)]
pub struct DerivationGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    rule_to_vertex: FxHashMap<RuleId, VertexId>,
    args_to_vertex: FxHashMap<CompositionKey, VertexId>,
    results: FxHashMap<VertexId, RuleSet>,
    // Rule -> composition vertices with a Result edge to it.
    produced_by: FxHashMap<RuleId, Vec<VertexId>>,
    failures: FxHashMap<CompositionKey, CompositionError>,
}

impl DerivationGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices (both kinds).
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of composition vertices.
    pub fn composition_count(&self) -> usize {
        self.args_to_vertex.len()
    }

    /// Vertex payload.
    pub fn vertex(&self, id: VertexId) -> Option<Vertex> {
        self.vertices.get(id.index()).copied()
    }

    fn push_vertex(&mut self, vertex: Vertex) -> VertexId {
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(vertex);
        id
    }

    /// Rule vertex for a canonical rule, created on first use.
    pub fn vertex_for_rule(&mut self, rule: RuleId) -> VertexId {
        if let Some(&v) = self.rule_to_vertex.get(&rule) {
            return v;
        }
        let v = self.push_vertex(Vertex::Rule(rule));
        self.rule_to_vertex.insert(rule, v);
        v
    }

    /// Existing rule vertex, without creating one.
    pub fn rule_vertex(&self, rule: RuleId) -> Option<VertexId> {
        self.rule_to_vertex.get(&rule).copied()
    }

    /// Composition vertex for `key`, or `None` on a cache miss.
    pub fn vertex_for_args(&self, key: &CompositionKey) -> Option<VertexId> {
        self.args_to_vertex.get(key).copied()
    }

    /// Memoized results for `key`, or `None` on a cache miss.
    pub fn cached_results(&self, key: &CompositionKey) -> Option<&RuleSet> {
        self.vertex_for_args(key)
            .and_then(|v| self.results.get(&v))
    }

    /// Memoized oracle failure for `key`.
    pub fn cached_failure(&self, key: &CompositionKey) -> Option<&CompositionError> {
        self.failures.get(key)
    }

    /// Records a composition and its canonical results.
    ///
    /// `results` must already be interned. Duplicates collapse to one
    /// `Result` edge. If `key` was recorded before, nothing changes and the
    /// stored set is returned.
    pub fn record_composition(
        &mut self,
        key: CompositionKey,
        results: impl IntoIterator<Item = RuleId>,
    ) -> &RuleSet {
        let comp = if let Some(v) = self.vertex_for_args(&key) {
            v
        } else {
            let first = self.vertex_for_rule(key.first);
            let second = self.vertex_for_rule(key.second);
            let comp = self.push_vertex(Vertex::Composition(key));
            self.args_to_vertex.insert(key, comp);
            self.edges.push(Edge {
                source: comp,
                target: first,
                kind: EdgeKind::First,
            });
            self.edges.push(Edge {
                source: comp,
                target: second,
                kind: EdgeKind::Second,
            });
            let mut recorded = RuleSet::new();
            for rule in results {
                if !recorded.insert(rule) {
                    continue;
                }
                let target = self.vertex_for_rule(rule);
                self.edges.push(Edge {
                    source: comp,
                    target,
                    kind: EdgeKind::Result,
                });
                self.produced_by.entry(rule).or_default().push(comp);
            }
            self.results.insert(comp, recorded);
            comp
        };
        self.results.entry(comp).or_default()
    }

    /// Memoizes an oracle failure. The first recorded failure for a key wins.
    pub fn record_failure(&mut self, key: CompositionKey, error: CompositionError) {
        self.failures.entry(key).or_insert(error);
    }

    /// Every recorded composition that produced `rule`, in recording order.
    pub fn derivations_of(&self, rule: RuleId) -> Vec<CompositionKey> {
        self.produced_by
            .get(&rule)
            .into_iter()
            .flatten()
            .filter_map(|v| match self.vertex(*v) {
                Some(Vertex::Composition(key)) => Some(key),
                _ => None,
            })
            .collect()
    }

    /// `true` if some recorded composition produced `rule`.
    pub fn is_derived(&self, rule: RuleId) -> bool {
        self.produced_by.contains_key(&rule)
    }

    /// Snapshot of all vertices and edges.
    pub fn dump(&self) -> GraphDump {
        GraphDump {
            vertices: self.vertices.clone(),
            edges: self.edges.clone(),
        }
    }
}
