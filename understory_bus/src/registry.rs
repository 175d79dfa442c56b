// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handler registry: storage, lookup, and removal of subscriptions.
//!
//! ## Layout
//!
//! Subscriptions are grouped by channel, then by subject pattern. Each
//! pattern bucket keeps its subscriptions in insertion order. Patterns are
//! compiled once, when their bucket is created.
//!
//! ## Matching
//!
//! The stored pattern is tested against the incoming subject, never the
//! other way around. An empty pattern is a wildcard and matches every
//! non-empty subject. Patterns are unanchored: `"save"` matches `"autosave"`;
//! use `"^save$"` for an exact match.
//!
//! ## Ids
//!
//! Ids come from a counter owned by the registry. The counter wraps to zero
//! when it reaches the id limit (see [`HandlerRegistry::with_id_limit`]).
//! After the first wrap, allocation skips ids still held by live
//! subscriptions, so ids stay unique until every id in the space is live.

use std::rc::Rc;

use hashbrown::HashMap;
use regex::Regex;

use crate::error::RegistryError;
use crate::types::{Handler, Subscription, SubscriptionId};

#[derive(Debug)]
enum Matcher {
    Any,
    Pattern(Regex),
}

impl Matcher {
    fn compile(pattern: &str) -> Result<Self, regex::Error> {
        if pattern.is_empty() {
            Ok(Self::Any)
        } else {
            Regex::new(pattern).map(Self::Pattern)
        }
    }

    fn matches(&self, subject: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Pattern(re) => re.is_match(subject),
        }
    }
}

#[derive(Debug)]
struct Bucket<P> {
    matcher: Matcher,
    subs: Vec<Rc<Subscription<P>>>,
}

/// Subscriptions keyed by channel and subject pattern.
///
/// Most callers use the registry through [`MessageBus`](crate::MessageBus),
/// which adds argument validation and dispatch.
///
/// ## Example
///
/// ```
/// use understory_bus::HandlerRegistry;
///
/// let mut registry: HandlerRegistry<u32> = HandlerRegistry::new();
/// let all = registry.add("room", "", Box::new(|_, _, _| Ok(()))).unwrap();
/// let temp = registry.add("room", "^temp", Box::new(|_, _, _| Ok(()))).unwrap();
///
/// let ids: Vec<_> = registry.find("room", "temperature").iter().map(|s| s.id()).collect();
/// assert_eq!(ids, vec![all, temp]);
/// assert_eq!(registry.find("room", "humidity").len(), 1);
///
/// assert!(registry.remove(all));
/// assert!(!registry.remove(all));
/// ```
pub struct HandlerRegistry<P> {
    channels: HashMap<String, HashMap<String, Bucket<P>>>,
    next_id: u64,
    id_limit: u64,
    wrapped: bool,
    next_seq: u64,
    len: usize,
}

impl<P> core::fmt::Debug for HandlerRegistry<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("channels", &self.channels.len())
            .field("subscriptions", &self.len)
            .field("next_id", &self.next_id)
            .field("id_limit", &self.id_limit)
            .finish_non_exhaustive()
    }
}

impl<P> Default for HandlerRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> HandlerRegistry<P> {
    /// Create an empty registry whose ids span the full `u64` range.
    pub fn new() -> Self {
        Self::with_id_limit(u64::MAX)
    }

    /// Create an empty registry whose ids wrap back to zero at `limit`.
    ///
    /// Ids are drawn from `0..limit`. A `limit` of zero is treated as one.
    pub fn with_id_limit(limit: u64) -> Self {
        Self {
            channels: HashMap::new(),
            next_id: 0,
            id_limit: limit.max(1),
            wrapped: false,
            next_seq: 0,
            len: 0,
        }
    }

    /// Number of live subscriptions across all channels.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no subscriptions are registered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Channels that currently have at least one subscription.
    pub fn channels(&self) -> impl Iterator<Item = &str> + '_ {
        self.channels.keys().map(String::as_str)
    }

    /// Whether a live subscription holds `id`.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.iter().any(|s| s.id == id)
    }

    fn iter(&self) -> impl Iterator<Item = &Rc<Subscription<P>>> + '_ {
        self.channels
            .values()
            .flat_map(|buckets| buckets.values())
            .flat_map(|bucket| bucket.subs.iter())
    }

    /// Register `callback` under `(channel, pattern)` and return its id.
    ///
    /// The pattern is compiled when its bucket is first created; a malformed
    /// pattern is rejected before an id is allocated.
    pub fn add(
        &mut self,
        channel: &str,
        pattern: &str,
        callback: Box<Handler<P>>,
    ) -> Result<SubscriptionId, RegistryError> {
        if channel.is_empty() {
            return Err(RegistryError::EmptyChannel);
        }
        let has_bucket = self
            .channels
            .get(channel)
            .is_some_and(|buckets| buckets.contains_key(pattern));
        let fresh = if has_bucket {
            None
        } else {
            Some(Matcher::compile(pattern)?)
        };

        let id = self.allocate_id();
        let seq = self.next_seq;
        self.next_seq += 1;

        let bucket = self
            .channels
            .entry_ref(channel)
            .or_default()
            .entry_ref(pattern)
            .or_insert_with(|| Bucket {
                matcher: fresh.unwrap_or(Matcher::Any),
                subs: Vec::new(),
            });
        bucket.subs.push(Rc::new(Subscription {
            id,
            channel: channel.to_owned(),
            pattern: pattern.to_owned(),
            seq,
            callback,
        }));
        self.len += 1;
        Ok(id)
    }

    /// Remove the subscription holding `id`, wherever it is registered.
    ///
    /// Returns `false` if no live subscription holds `id`. Empty buckets and
    /// channels are dropped.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for buckets in self.channels.values_mut() {
            for bucket in buckets.values_mut() {
                let before = bucket.subs.len();
                bucket.subs.retain(|s| s.id != id);
                if bucket.subs.len() != before {
                    removed = true;
                    self.len -= before - bucket.subs.len();
                }
            }
            buckets.retain(|_, bucket| !bucket.subs.is_empty());
        }
        self.channels.retain(|_, buckets| !buckets.is_empty());
        removed
    }

    /// Subscriptions on `channel` whose pattern matches `subject`, in
    /// registration order.
    ///
    /// Returns an empty list for an unknown channel or an empty subject.
    pub fn find(&self, channel: &str, subject: &str) -> Vec<Rc<Subscription<P>>> {
        if subject.is_empty() {
            return Vec::new();
        }
        let Some(buckets) = self.channels.get(channel) else {
            return Vec::new();
        };
        let mut out: Vec<Rc<Subscription<P>>> = buckets
            .values()
            .filter(|bucket| bucket.matcher.matches(subject))
            .flat_map(|bucket| bucket.subs.iter().cloned())
            .collect();
        out.sort_by_key(|s| s.seq);
        out
    }

    fn advance(&mut self) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        if self.next_id >= self.id_limit {
            self.next_id = 0;
            self.wrapped = true;
        }
        SubscriptionId(id)
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        let mut candidate = self.advance();
        if self.wrapped {
            // Among `len + 1` consecutive ids at least one is free, unless
            // the whole id space is live; then a duplicate is accepted.
            let attempts = u64::try_from(self.len).unwrap_or(u64::MAX).min(self.id_limit);
            for _ in 0..attempts {
                if !self.contains(candidate) {
                    break;
                }
                candidate = self.advance();
            }
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn noop() -> Box<Handler<()>> {
        Box::new(|_, _, _| Ok(()))
    }

    fn ids(subs: &[Rc<Subscription<()>>]) -> Vec<u64> {
        subs.iter().map(|s| s.id().get()).collect()
    }

    #[test]
    fn add_assigns_sequential_ids() {
        let mut reg = HandlerRegistry::new();
        let a = reg.add("c", "x", noop()).unwrap();
        let b = reg.add("c", "x", noop()).unwrap();
        let c = reg.add("other", "", noop()).unwrap();
        assert_eq!((a.get(), b.get(), c.get()), (0, 1, 2));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn wildcard_matches_any_non_empty_subject() {
        let mut reg = HandlerRegistry::new();
        reg.add("c", "", noop()).unwrap();
        assert_eq!(reg.find("c", "anything").len(), 1);
        assert_eq!(reg.find("c", "x").len(), 1);
        assert!(reg.find("c", "").is_empty(), "empty subject never matches");
    }

    #[test]
    fn stored_pattern_is_tested_against_subject() {
        let mut reg = HandlerRegistry::new();
        reg.add("c", "^foo", noop()).unwrap();
        assert_eq!(reg.find("c", "foobar").len(), 1);
        assert!(reg.find("c", "barfoo").is_empty());
        // The subject is never treated as a pattern.
        reg.add("d", "a.c", noop()).unwrap();
        assert_eq!(reg.find("d", "abc").len(), 1);
        assert!(reg.find("d", "a.").is_empty());
    }

    #[test]
    fn unknown_channel_finds_nothing() {
        let mut reg = HandlerRegistry::new();
        reg.add("c", "", noop()).unwrap();
        assert!(reg.find("nope", "x").is_empty());
    }

    #[test]
    fn find_merges_buckets_in_registration_order() {
        let mut reg = HandlerRegistry::new();
        reg.add("c", "^sa", noop()).unwrap(); // 0
        reg.add("c", "", noop()).unwrap(); // 1
        reg.add("c", "ve$", noop()).unwrap(); // 2
        reg.add("c", "^sa", noop()).unwrap(); // 3
        reg.add("c", "^load", noop()).unwrap(); // 4
        assert_eq!(ids(&reg.find("c", "save")), vec![0, 1, 2, 3]);
        assert_eq!(ids(&reg.find("c", "load")), vec![1, 4]);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut reg = HandlerRegistry::new();
        let a = reg.add("c", "", noop()).unwrap();
        assert!(!reg.remove(SubscriptionId(99)));
        assert!(reg.contains(a));
        assert!(reg.remove(a));
        assert!(!reg.contains(a));
        assert!(reg.is_empty());
        assert_eq!(reg.channels().count(), 0, "empty channels are pruned");
    }

    #[test]
    fn remove_only_touches_matching_id() {
        let mut reg = HandlerRegistry::new();
        let a = reg.add("c", "x", noop()).unwrap();
        let b = reg.add("c", "x", noop()).unwrap();
        assert!(reg.remove(a));
        assert_eq!(ids(&reg.find("c", "x")), vec![b.get()]);
    }

    #[test]
    fn malformed_pattern_is_rejected_without_consuming_an_id() {
        let mut reg = HandlerRegistry::new();
        let err = reg.add("c", "(", noop()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPattern(_)));
        assert!(reg.is_empty());
        let a = reg.add("c", "ok", noop()).unwrap();
        assert_eq!(a.get(), 0);
    }

    #[test]
    fn empty_channel_is_rejected() {
        let mut reg = HandlerRegistry::new();
        assert!(matches!(
            reg.add("", "x", noop()),
            Err(RegistryError::EmptyChannel)
        ));
    }

    #[test]
    fn ids_wrap_and_skip_live_ones() {
        let mut reg = HandlerRegistry::with_id_limit(3);
        let a = reg.add("c", "", noop()).unwrap();
        let b = reg.add("c", "", noop()).unwrap();
        let c = reg.add("c", "", noop()).unwrap();
        assert_eq!((a.get(), b.get(), c.get()), (0, 1, 2));
        assert!(reg.remove(b));
        // Counter wrapped to 0, which is live; 1 is free.
        let d = reg.add("c", "", noop()).unwrap();
        assert_eq!(d.get(), 1);
        // Registration order survives the wrap.
        assert_eq!(ids(&reg.find("c", "x")), vec![0, 2, 1]);
    }

    proptest! {
        #[test]
        fn live_ids_are_pairwise_distinct(
            ops in proptest::collection::vec((any::<bool>(), 0_usize..8), 1..64),
            limit in 4_u64..16,
        ) {
            let mut reg: HandlerRegistry<()> = HandlerRegistry::with_id_limit(limit);
            let mut live: Vec<SubscriptionId> = Vec::new();
            for (add, pick) in ops {
                if add && (live.len() as u64) < limit {
                    live.push(reg.add("c", "", noop()).unwrap());
                } else if !live.is_empty() {
                    let id = live.remove(pick % live.len());
                    prop_assert!(reg.remove(id));
                }
                let mut seen = live.clone();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), live.len());
                prop_assert_eq!(reg.len(), live.len());
            }
        }

        #[test]
        fn find_preserves_registration_order(patterns in proptest::collection::vec(
            prop_oneof![Just(""), Just("^a"), Just("b"), Just("^ab$")], 1..24)
        ) {
            let mut reg: HandlerRegistry<()> = HandlerRegistry::new();
            for p in &patterns {
                reg.add("c", p, noop()).unwrap();
            }
            let found = ids(&reg.find("c", "ab"));
            let mut sorted = found.clone();
            sorted.sort_unstable();
            prop_assert_eq!(found.len(), patterns.len());
            prop_assert_eq!(found, sorted);
        }
    }
}
