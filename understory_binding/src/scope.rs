// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding scopes: named field sets owned by scope-owner nodes.

use core::hash::Hash;
use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::host::BindingHost;

/// The set of field ids bound within one scope.
///
/// Iteration is in lexical order so gathered payloads are reproducible.
///
/// Membership has set semantics, but each id also counts its declarations:
/// an id added twice stays bound until it has been removed twice. Two
/// fields declaring the same id therefore share one entry, and dropping
/// either leaves the other bound.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindingScope {
    fields: BTreeMap<String, usize>,
}

impl BindingScope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration of `field_id`. Returns `true` if the id was not
    /// bound before.
    pub fn add_binding(&mut self, field_id: &str) -> bool {
        if let Some(count) = self.fields.get_mut(field_id) {
            *count += 1;
            return false;
        }
        self.fields.insert(field_id.to_owned(), 1);
        true
    }

    /// Drop one declaration of `field_id`. Returns `true` if that was the
    /// last one and the id is no longer bound.
    pub fn remove_binding(&mut self, field_id: &str) -> bool {
        let Some(count) = self.fields.get_mut(field_id) else {
            return false;
        };
        *count -= 1;
        if *count > 0 {
            return false;
        }
        self.fields.remove(field_id);
        true
    }

    /// Whether `field_id` is bound.
    pub fn contains(&self, field_id: &str) -> bool {
        self.fields.contains_key(field_id)
    }

    /// Bound field ids.
    pub fn fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    /// Number of bound fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are bound.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Scopes keyed by their owner node.
#[derive(Clone, Debug)]
pub struct ScopeRegistry<K> {
    scopes: HashMap<K, BindingScope>,
}

impl<K> Default for ScopeRegistry<K> {
    fn default() -> Self {
        Self {
            scopes: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> ScopeRegistry<K> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope owned by `owner`, if any field was ever bound to it.
    pub fn get(&self, owner: &K) -> Option<&BindingScope> {
        self.scopes.get(owner)
    }

    /// Mutable scope owned by `owner`, if it exists.
    pub fn get_mut(&mut self, owner: &K) -> Option<&mut BindingScope> {
        self.scopes.get_mut(owner)
    }

    /// Scope owned by `owner`, created empty on first use.
    pub fn scope_mut(&mut self, owner: K) -> &mut BindingScope {
        self.scopes.entry(owner).or_default()
    }

    /// Drop the scope owned by `owner`.
    pub fn remove(&mut self, owner: &K) -> Option<BindingScope> {
        self.scopes.remove(owner)
    }

    /// Snapshot of the field ids bound in `owner`'s scope.
    pub fn fields_of(&self, owner: &K) -> Vec<String> {
        self.scopes
            .get(owner)
            .map(|s| s.fields().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Number of scopes with a registry entry.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether the registry has no scopes.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Nearest scope owner at or above `node`.
///
/// Walks `node` and then its ancestors; returns `None` when a root is
/// reached without finding an owner.
pub fn find_enclosing_scope<H: BindingHost + ?Sized>(
    host: &H,
    node: &H::Node,
) -> Option<H::Node> {
    let mut cur = *node;
    // Caller ensures acyclic ancestry.
    loop {
        if host.is_scope_owner(&cur) {
            return Some(cur);
        }
        cur = host.parent_of(&cur)?;
    }
}
