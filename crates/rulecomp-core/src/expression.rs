// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Expression algebra over transformation rules.
//!
//! Expressions are immutable trees built by the caller and handed to an
//! [`Evaluator`](crate::Evaluator). Validation happens at construction time:
//! an empty [`Union`] cannot be built, and primitive nodes hold `Arc<G>`, so a
//! missing graph is unrepresentable.
//!
//! The `Display` rendering is a pure function of structure and is reused in
//! evaluation errors to point at the failing sub-expression.
use core::fmt;
use std::sync::Arc;

use crate::error::ConstructionError;

/// Composition operator together with its operator-specific flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComposeKind {
    /// Compose along common subgraphs.
    Common {
        /// Only use maximum common subgraphs.
        maximum: bool,
        /// Only use connected common subgraphs.
        connected: bool,
    },
    /// Compose with an empty overlap (disjoint union of rules).
    Parallel,
    /// Compose where the right side of the first rule must be a subgraph of the
    /// left side of the second.
    Sub {
        /// Allow only part of the first rule's right side to be matched.
        allow_partial: bool,
    },
    /// Compose where the left side of the second rule must be a subgraph of
    /// the right side of the first.
    Super {
        /// Allow only part of the second rule's left side to be matched.
        allow_partial: bool,
        /// Reject results that violate the operands' matching constraints.
        enforce_constraints: bool,
    },
}

/// Everything a [`CompositionOracle`](crate::CompositionOracle) needs besides
/// the two operands. Part of the memoization key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompositionPolicy {
    /// Operator and its flags.
    pub kind: ComposeKind,
    /// Silently drop chemically invalid candidates instead of failing.
    pub discard_nonchemical: bool,
}

impl CompositionPolicy {
    /// Creates a policy.
    pub fn new(kind: ComposeKind, discard_nonchemical: bool) -> Self {
        Self {
            kind,
            discard_nonchemical,
        }
    }
}

impl fmt::Display for CompositionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ComposeKind::Common { maximum, connected } => {
                write!(f, "rcCommon(maximum={maximum}, connected={connected}, ")?;
            }
            ComposeKind::Parallel => f.write_str("rcParallel(")?,
            ComposeKind::Sub { allow_partial } => {
                write!(f, "rcSub(allowPartial={allow_partial}, ")?;
            }
            ComposeKind::Super {
                allow_partial,
                enforce_constraints,
            } => write!(
                f,
                "rcSuper(allowPartial={allow_partial}, enforceConstraints={enforce_constraints}, "
            )?,
        }
        write!(f, "discardNonchemical={})", self.discard_nonchemical)
    }
}

/// Non-empty list of operands evaluated independently and unioned.
pub struct Union<R, G> {
    operands: Vec<Expression<R, G>>,
}

impl<R, G> Union<R, G> {
    /// Builds a union.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::EmptyUnion`] if `operands` is empty.
    pub fn new(operands: Vec<Expression<R, G>>) -> Result<Self, ConstructionError> {
        if operands.is_empty() {
            return Err(ConstructionError::EmptyUnion);
        }
        Ok(Self { operands })
    }

    /// Operands in construction order. Never empty.
    pub fn operands(&self) -> &[Expression<R, G>] {
        &self.operands
    }
}

impl<R, G> Clone for Union<R, G> {
    fn clone(&self) -> Self {
        Self {
            operands: self.operands.clone(),
        }
    }
}

impl<R: fmt::Debug, G: fmt::Debug> fmt::Debug for Union<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.operands).finish()
    }
}

/// Binary composition node.
pub struct Compose<R, G> {
    first: Expression<R, G>,
    second: Expression<R, G>,
    policy: CompositionPolicy,
}

impl<R, G> Compose<R, G> {
    /// Left operand.
    pub fn first(&self) -> &Expression<R, G> {
        &self.first
    }

    /// Right operand.
    pub fn second(&self) -> &Expression<R, G> {
        &self.second
    }

    /// Operator, flags and `discardNonchemical`.
    pub fn policy(&self) -> CompositionPolicy {
        self.policy
    }
}

impl<R, G> Clone for Compose<R, G> {
    fn clone(&self) -> Self {
        Self {
            first: self.first.clone(),
            second: self.second.clone(),
            policy: self.policy,
        }
    }
}

impl<R: fmt::Debug, G: fmt::Debug> fmt::Debug for Compose<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compose")
            .field("first", &self.first)
            .field("second", &self.second)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Rule-valued expression.
///
/// `R` is the opaque rule type, `G` the graph type consumed by the primitive
/// constructors.
pub enum Expression<R, G> {
    /// An externally supplied rule.
    Terminal(Arc<R>),
    /// Parallel composition: union of the operands' results.
    Union(Union<R, G>),
    /// Rule binding the graph.
    Bind(Arc<G>),
    /// Identity rule on the graph.
    Identity(Arc<G>),
    /// Rule unbinding the graph.
    Unbind(Arc<G>),
    /// Binary composition.
    Compose(Box<Compose<R, G>>),
}

impl<R, G> Expression<R, G> {
    /// Wraps a rule.
    pub fn terminal(rule: Arc<R>) -> Self {
        Self::Terminal(rule)
    }

    /// Builds a union.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::EmptyUnion`] if `operands` is empty.
    pub fn union(operands: Vec<Self>) -> Result<Self, ConstructionError> {
        Union::new(operands).map(Self::Union)
    }

    /// Bind primitive.
    pub fn bind(graph: Arc<G>) -> Self {
        Self::Bind(graph)
    }

    /// Identity primitive.
    pub fn identity(graph: Arc<G>) -> Self {
        Self::Identity(graph)
    }

    /// Unbind primitive.
    pub fn unbind(graph: Arc<G>) -> Self {
        Self::Unbind(graph)
    }

    /// Composition under an arbitrary policy.
    pub fn compose(first: Self, second: Self, policy: CompositionPolicy) -> Self {
        Self::Compose(Box::new(Compose {
            first,
            second,
            policy,
        }))
    }

    /// Common-subgraph composition.
    pub fn compose_common(
        first: Self,
        second: Self,
        discard_nonchemical: bool,
        maximum: bool,
        connected: bool,
    ) -> Self {
        Self::compose(
            first,
            second,
            CompositionPolicy::new(ComposeKind::Common { maximum, connected }, discard_nonchemical),
        )
    }

    /// Parallel (empty overlap) composition.
    pub fn compose_parallel(first: Self, second: Self, discard_nonchemical: bool) -> Self {
        Self::compose(
            first,
            second,
            CompositionPolicy::new(ComposeKind::Parallel, discard_nonchemical),
        )
    }

    /// Sub composition.
    pub fn compose_sub(
        first: Self,
        second: Self,
        discard_nonchemical: bool,
        allow_partial: bool,
    ) -> Self {
        Self::compose(
            first,
            second,
            CompositionPolicy::new(ComposeKind::Sub { allow_partial }, discard_nonchemical),
        )
    }

    /// Super composition.
    pub fn compose_super(
        first: Self,
        second: Self,
        discard_nonchemical: bool,
        allow_partial: bool,
        enforce_constraints: bool,
    ) -> Self {
        Self::compose(
            first,
            second,
            CompositionPolicy::new(
                ComposeKind::Super {
                    allow_partial,
                    enforce_constraints,
                },
                discard_nonchemical,
            ),
        )
    }

    /// Nesting depth; leaves have depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Terminal(_) | Self::Bind(_) | Self::Identity(_) | Self::Unbind(_) => 1,
            Self::Union(u) => 1 + u.operands.iter().map(Self::depth).max().unwrap_or(0),
            Self::Compose(c) => 1 + c.first.depth().max(c.second.depth()),
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Self::Terminal(_) | Self::Bind(_) | Self::Identity(_) | Self::Unbind(_) => 1,
            Self::Union(u) => 1 + u.operands.iter().map(Self::size).sum::<usize>(),
            Self::Compose(c) => 1 + c.first.size() + c.second.size(),
        }
    }
}

impl<R, G> Clone for Expression<R, G> {
    fn clone(&self) -> Self {
        match self {
            Self::Terminal(r) => Self::Terminal(Arc::clone(r)),
            Self::Union(u) => Self::Union(u.clone()),
            Self::Bind(g) => Self::Bind(Arc::clone(g)),
            Self::Identity(g) => Self::Identity(Arc::clone(g)),
            Self::Unbind(g) => Self::Unbind(Arc::clone(g)),
            Self::Compose(c) => Self::Compose(c.clone()),
        }
    }
}

impl<R: fmt::Debug, G: fmt::Debug> fmt::Debug for Expression<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(r) => f.debug_tuple("Terminal").field(r).finish(),
            Self::Union(u) => f.debug_tuple("Union").field(u).finish(),
            Self::Bind(g) => f.debug_tuple("Bind").field(g).finish(),
            Self::Identity(g) => f.debug_tuple("Identity").field(g).finish(),
            Self::Unbind(g) => f.debug_tuple("Unbind").field(g).finish(),
            Self::Compose(c) => f.debug_tuple("Compose").field(c).finish(),
        }
    }
}

impl<R: fmt::Display, G: fmt::Display> fmt::Display for Union<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, exp) in self.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{exp}")?;
        }
        f.write_str("}")
    }
}

impl<R: fmt::Display, G: fmt::Display> fmt::Display for Compose<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} *{}* {}", self.first, self.policy, self.second)
    }
}

impl<R: fmt::Display, G: fmt::Display> fmt::Display for Expression<R, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(r) => write!(f, "{r}"),
            Self::Union(u) => write!(f, "{u}"),
            Self::Bind(g) => write!(f, "bind({g})"),
            Self::Identity(g) => write!(f, "id({g})"),
            Self::Unbind(g) => write!(f, "unbind({g})"),
            Self::Compose(c) => write!(f, "{c}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    type Exp = Expression<&'static str, &'static str>;

    fn t(name: &'static str) -> Exp {
        Expression::terminal(Arc::new(name))
    }

    #[test]
    fn empty_union_is_rejected_at_construction() {
        let err = Exp::union(Vec::new()).unwrap_err();
        assert_eq!(err, ConstructionError::EmptyUnion);
    }

    #[test]
    fn union_keeps_operand_order() {
        let exp = Exp::union(vec![t("a"), t("b"), t("c")]).unwrap();
        match &exp {
            Expression::Union(u) => assert_eq!(u.operands().len(), 3),
            other => panic!("expected union, got {other:?}"),
        }
        assert_eq!(exp.to_string(), "{a, b, c}");
    }

    #[test]
    fn primitives_render_with_operator_name() {
        assert_eq!(Exp::bind(Arc::new("H2O")).to_string(), "bind(H2O)");
        assert_eq!(Exp::identity(Arc::new("H2O")).to_string(), "id(H2O)");
        assert_eq!(Exp::unbind(Arc::new("H2O")).to_string(), "unbind(H2O)");
    }

    #[test]
    fn compose_rendering_lists_flags() {
        let common = Exp::compose_common(t("a"), t("b"), false, true, false);
        assert_eq!(
            common.to_string(),
            "a *rcCommon(maximum=true, connected=false, discardNonchemical=false)* b"
        );
        let parallel = Exp::compose_parallel(t("a"), t("b"), true);
        assert_eq!(
            parallel.to_string(),
            "a *rcParallel(discardNonchemical=true)* b"
        );
        let sub = Exp::compose_sub(t("a"), t("b"), false, true);
        assert_eq!(
            sub.to_string(),
            "a *rcSub(allowPartial=true, discardNonchemical=false)* b"
        );
        let sup = Exp::compose_super(t("a"), t("b"), false, false, true);
        assert_eq!(
            sup.to_string(),
            "a *rcSuper(allowPartial=false, enforceConstraints=true, discardNonchemical=false)* b"
        );
    }

    #[test]
    fn nested_rendering_is_structural_and_stable() {
        let inner = Exp::union(vec![t("a"), Exp::bind(Arc::new("g"))]).unwrap();
        let exp = Exp::compose_parallel(inner, t("c"), false);
        let once = exp.to_string();
        assert_eq!(once, "{a, bind(g)} *rcParallel(discardNonchemical=false)* c");
        assert_eq!(exp.clone().to_string(), once);
    }

    #[test]
    fn depth_and_size() {
        let leaf = t("a");
        assert_eq!((leaf.depth(), leaf.size()), (1, 1));
        let exp = Exp::compose_parallel(
            Exp::union(vec![t("a"), t("b")]).unwrap(),
            t("c"),
            false,
        );
        assert_eq!(exp.depth(), 3);
        assert_eq!(exp.size(), 5);
    }

    #[test]
    fn policies_differ_by_kind_and_flags() {
        let p = CompositionPolicy::new(ComposeKind::Parallel, false);
        let q = CompositionPolicy::new(ComposeKind::Parallel, true);
        let s = CompositionPolicy::new(ComposeKind::Sub { allow_partial: false }, false);
        assert_ne!(p, q);
        assert_ne!(p, s);
        assert_eq!(p, CompositionPolicy::new(ComposeKind::Parallel, false));
    }
}
