//! Property-Based Tests for Memory Cache Accounting
//!
//! Uses proptest to drive random operation sequences against the memory
//! cache and check its byte accounting.
//!
//! # Test Properties
//!
//! 1. **Usage Accounting**: tracked usage always equals the sum of stored payloads
//! 2. **Budget**: usage never exceeds the memory limit
//! 3. **Object Ceiling**: no stored object exceeds the per-object limit
//! 4. **Round Trip**: a storable object set last is read back unchanged

#![cfg(test)]

use proptest::prelude::*;

use super::memory::{EvictionPolicy, MemoryCache, MemoryCacheConfig};
use super::object::Object;
use super::traits::Cache;

// =============================================================================
// Property Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Set(u8, usize),
    Del(u8),
    DelPrefix(u8),
    DelAll,
}

fn key(k: u8) -> String {
    format!("k{}/{}", k % 4, k)
}

/// Strategy for generating cache operations over a small key space.
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u8..32, 0usize..200).prop_map(|(k, size)| Op::Set(k, size)),
        2 => (0u8..32).prop_map(Op::Del),
        1 => (0u8..4).prop_map(Op::DelPrefix),
        1 => Just(Op::DelAll),
    ]
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::FullFlush),
        Just(EvictionPolicy::LeastRecentlyUsed),
    ]
}

fn apply(cache: &MemoryCache, op: &Op) {
    match op {
        Op::Set(k, size) => cache.set(&key(*k), Object::now(vec![*k; *size])).unwrap(),
        Op::Del(k) => cache.del(&key(*k)),
        Op::DelPrefix(p) => cache.del(&format!("k{}/*", p)),
        Op::DelAll => cache.del("*"),
    }
}

// =============================================================================
// Accounting Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Tracked usage matches stored content after any operation sequence.
    #[test]
    fn prop_usage_matches_stored_bytes(
        ops in prop::collection::vec(op_strategy(), 1..200),
        memory_limit in 200u64..2000,
        object_limit in prop_oneof![Just(0u64), 50u64..200],
        eviction in policy_strategy(),
    ) {
        let cache = MemoryCache::with_config(MemoryCacheConfig {
            memory_limit,
            object_limit,
            eviction,
        });

        for op in &ops {
            apply(&cache, op);
            prop_assert_eq!(cache.usage(), cache.stored_bytes());
            prop_assert!(cache.usage() <= memory_limit);
        }
    }

    /// Storable objects read back unchanged; oversized ones are absent.
    #[test]
    fn prop_set_then_get(
        size in 0usize..400,
        object_limit in prop_oneof![Just(0u64), 1u64..300],
    ) {
        let cache = MemoryCache::new(1024, object_limit);
        let obj = Object::now(vec![7u8; size]);

        cache.set("key", obj.clone()).unwrap();
        let fits = object_limit == 0 || size as u64 <= object_limit;

        match cache.get("key", None) {
            Ok(got) => {
                prop_assert!(fits);
                prop_assert_eq!(got, obj);
            }
            Err(e) => {
                prop_assert!(!fits);
                prop_assert!(e.is_not_found());
            }
        }
    }
}
