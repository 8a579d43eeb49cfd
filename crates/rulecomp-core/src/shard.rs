// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lock-shard routing for composition keys.
//!
//! ```text
//! shard = FxHash(first, second, policy) & (shards - 1)
//! ```
//!
//! Equal keys always land on the same shard, which is what makes the
//! check-then-compose sequence atomic per key. Routing is process-local; it is
//! never persisted.

use core::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::derivation::CompositionKey;

/// Shard index for `key`. `shards` must be a power of two.
#[inline]
// Truncation is the point: only the low bits select the shard.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn shard_of(key: &CompositionKey, shards: usize) -> usize {
    debug_assert!(shards.is_power_of_two(), "shard count must be a power of two");
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() as usize) & (shards - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ComposeKind, CompositionPolicy};
    use crate::universe::RuleId;

    fn key(a: u32, b: u32) -> CompositionKey {
        CompositionKey::new(
            RuleId::from_raw(a),
            RuleId::from_raw(b),
            CompositionPolicy::new(ComposeKind::Parallel, false),
        )
    }

    #[test]
    fn routing_is_stable_and_in_range() {
        for a in 0..16 {
            for b in 0..16 {
                let k = key(a, b);
                let s = shard_of(&k, 8);
                assert!(s < 8);
                assert_eq!(s, shard_of(&k, 8));
            }
        }
    }

    #[test]
    fn single_shard_takes_everything() {
        assert_eq!(shard_of(&key(3, 9), 1), 0);
    }
}
