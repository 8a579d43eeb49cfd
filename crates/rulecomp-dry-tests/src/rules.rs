// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Toy rule and graph values.

use std::fmt;
use std::sync::Arc;

/// A rule reduced to a display label and a structural "shape".
///
/// Two toy rules are isomorphic iff their shapes are equal; the label is only
/// there so tests can tell which instance became canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToyRule {
    /// Name shown by `Display` (and therefore in rendered expressions).
    pub label: String,
    /// Isomorphism class.
    pub shape: String,
}

impl ToyRule {
    /// Create a rule with distinct label and shape.
    pub fn new(label: &str, shape: &str) -> Self {
        Self {
            label: label.to_string(),
            shape: shape.to_string(),
        }
    }

    /// Create a rule whose label equals its shape.
    pub fn named(name: &str) -> Self {
        Self::new(name, name)
    }
}

impl fmt::Display for ToyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Shorthand for `Arc::new(ToyRule::named(name))`.
pub fn toy(name: &str) -> Arc<ToyRule> {
    Arc::new(ToyRule::named(name))
}

/// A graph reduced to its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToyGraph(pub String);

impl ToyGraph {
    /// Create a shared graph handle, ready for `Expression::bind` and friends.
    pub fn shared(name: &str) -> Arc<Self> {
        Arc::new(Self(name.to_string()))
    }
}

impl fmt::Display for ToyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
