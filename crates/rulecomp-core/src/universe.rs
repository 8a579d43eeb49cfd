// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical rule store (interning by isomorphism).
//!
//! # Invariant
//!
//! No two members are isomorphic. [`RuleUniverse::intern`] is the only way in:
//! a candidate isomorphic to an existing member is dropped and the member's
//! [`RuleId`] is returned instead.
//!
//! The arena is append-only, so a `RuleId` stays valid for the lifetime of the
//! universe and members never move. The evaluator relies on this to scan
//! without the write lock and only rescan the tail before inserting.

// Rule handles are u32; more than 2^32 canonical rules is out of scope.
#![allow(clippy::cast_possible_truncation)]

use core::fmt;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::EvalError;
use crate::oracle::IsomorphismOracle;

/// Stable handle to a canonical rule.
///
/// Dense index into the universe's arena; handles from one evaluator are
/// meaningless in another.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleId(u32);

impl RuleId {
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Arena index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw handle value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Set of canonical rules in ascending handle order.
pub type RuleSet = BTreeSet<RuleId>;

/// How a rule first entered the universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleOrigin {
    /// Supplied by the caller or built by a primitive constructor.
    Primitive,
    /// First produced by a composition.
    Derived,
}

/// Outcome of [`RuleUniverse::intern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interned {
    /// Canonical handle.
    pub id: RuleId,
    /// `true` iff the candidate became a new canonical member.
    pub is_new: bool,
}

struct Member<R> {
    rule: Arc<R>,
    origin: RuleOrigin,
}

/// The database of canonical rules plus the product marks.
pub struct RuleUniverse<R> {
    isomorphism: Arc<dyn IsomorphismOracle<R>>,
    members: Vec<Member<R>>,
    // Allocation address -> handle. Members are never dropped, so an address
    // match always means the very same allocation.
    by_ptr: FxHashMap<usize, RuleId>,
    products: RuleSet,
    isomorphism_tests: AtomicU64,
}

fn ptr_key<R>(rule: &Arc<R>) -> usize {
    Arc::as_ptr(rule).cast::<()>() as usize
}

impl<R> RuleUniverse<R> {
    /// Creates an empty universe using `isomorphism` for equivalence.
    pub fn new(isomorphism: Arc<dyn IsomorphismOracle<R>>) -> Self {
        Self {
            isomorphism,
            members: Vec::new(),
            by_ptr: FxHashMap::default(),
            products: RuleSet::new(),
            isomorphism_tests: AtomicU64::new(0),
        }
    }

    /// Number of canonical rules.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// `true` if no rule has been interned.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// `true` if `id` belongs to this universe.
    pub fn contains(&self, id: RuleId) -> bool {
        id.index() < self.members.len()
    }

    /// Canonical rule behind `id`.
    pub fn get(&self, id: RuleId) -> Option<&Arc<R>> {
        self.members.get(id.index()).map(|m| &m.rule)
    }

    /// How `id` first entered the universe.
    pub fn origin(&self, id: RuleId) -> Option<RuleOrigin> {
        self.members.get(id.index()).map(|m| m.origin)
    }

    /// All canonical rules (the database).
    pub fn database(&self) -> RuleSet {
        (0..self.members.len() as u32).map(RuleId).collect()
    }

    /// Rules marked as products.
    pub fn products(&self) -> &RuleSet {
        &self.products
    }

    /// `true` if `id` is marked as a product.
    pub fn is_product(&self, id: RuleId) -> bool {
        self.products.contains(&id)
    }

    /// Marks a canonical rule as a product. Returns `true` if newly marked.
    ///
    /// # Errors
    ///
    /// [`EvalError::UnknownRule`] if `id` is not a member.
    pub fn mark_as_product(&mut self, id: RuleId) -> Result<bool, EvalError> {
        if !self.contains(id) {
            return Err(EvalError::UnknownRule(id));
        }
        Ok(self.products.insert(id))
    }

    /// Number of isomorphism tests issued so far.
    pub fn isomorphism_tests(&self) -> u64 {
        self.isomorphism_tests.load(Ordering::Relaxed)
    }

    /// Handle of the member stored in exactly this allocation, if any.
    pub fn lookup_ptr(&self, rule: &Arc<R>) -> Option<RuleId> {
        self.by_ptr.get(&ptr_key(rule)).copied()
    }

    /// Searches for a member isomorphic to `candidate` without inserting it.
    pub fn find_isomorphic(&self, candidate: &R) -> Option<RuleId> {
        self.find_isomorphic_from(candidate, 0)
    }

    /// Like [`find_isomorphic`](Self::find_isomorphic) but only considers
    /// members with index `>= start`.
    pub fn find_isomorphic_from(&self, candidate: &R, start: usize) -> Option<RuleId> {
        let tail = self.members.get(start..)?;
        for (offset, member) in tail.iter().enumerate() {
            self.isomorphism_tests.fetch_add(1, Ordering::Relaxed);
            if self.isomorphism.are_isomorphic(&member.rule, candidate) {
                return Some(RuleId((start + offset) as u32));
            }
        }
        None
    }

    /// Maps `candidate` to its canonical member, inserting it if its class is
    /// not represented yet.
    ///
    /// `origin` is recorded only when the candidate becomes a new member.
    pub fn intern(&mut self, candidate: Arc<R>, origin: RuleOrigin) -> Interned {
        self.intern_after_scan(candidate, origin, 0)
    }

    /// Interning where members below `scanned` are already known not to be
    /// isomorphic to `candidate`.
    pub(crate) fn intern_after_scan(
        &mut self,
        candidate: Arc<R>,
        origin: RuleOrigin,
        scanned: usize,
    ) -> Interned {
        if let Some(id) = self.lookup_ptr(&candidate) {
            return Interned { id, is_new: false };
        }
        if let Some(id) = self.find_isomorphic_from(&candidate, scanned) {
            return Interned { id, is_new: false };
        }
        let id = RuleId(self.members.len() as u32);
        self.by_ptr.insert(ptr_key(&candidate), id);
        self.members.push(Member {
            rule: candidate,
            origin,
        });
        trace!(rule = %id, ?origin, "interned new canonical rule");
        Interned { id, is_new: true }
    }
}

impl<R> fmt::Debug for RuleUniverse<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleUniverse")
            .field("len", &self.members.len())
            .field("products", &self.products)
            .finish_non_exhaustive()
    }
}
