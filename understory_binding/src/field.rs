// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Field declarations that register an id into the nearest scope.

use core::fmt::Debug;
use core::hash::Hash;

use crate::host::BindingHost;
use crate::scope::{ScopeRegistry, find_enclosing_scope};

/// Declares that `field_id` belongs to the scope enclosing `node`.
///
/// ## Lifecycle
///
/// - [`connect`](Self::connect) resolves the enclosing scope and registers
///   the id. Without a scope, nothing is registered.
/// - [`set_field_id`](Self::set_field_id) removes the old id from the scope
///   it was registered in, then registers the new one.
/// - [`disconnect`](Self::disconnect) removes the registered id.
///
/// Two fields declaring the same id in one scope share a single entry; the
/// id stays bound until both have disconnected or moved to another id.
#[derive(Clone, Debug)]
pub struct BindingField<K> {
    node: K,
    field_id: String,
    registered: Option<(K, String)>,
}

impl<K: Copy + Eq + Hash + Debug> BindingField<K> {
    /// Declare `field_id` at `node`. Nothing is registered until
    /// [`connect`](Self::connect).
    pub fn new(node: K, field_id: &str) -> Self {
        Self {
            node,
            field_id: field_id.to_owned(),
            registered: None,
        }
    }

    /// Node carrying the declaration.
    pub fn node(&self) -> K {
        self.node
    }

    /// Declared field id.
    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    /// Scope the id is currently registered in.
    pub fn scope(&self) -> Option<K> {
        self.registered.as_ref().map(|(scope, _)| *scope)
    }

    /// Register the field id with the enclosing scope.
    ///
    /// Returns the scope registered into, or `None` if there is no enclosing
    /// scope. Connecting again first drops the previous registration.
    pub fn connect<H>(&mut self, host: &H, scopes: &mut ScopeRegistry<K>) -> Option<K>
    where
        H: BindingHost<Node = K> + ?Sized,
    {
        self.disconnect(scopes);
        let Some(scope) = find_enclosing_scope(host, &self.node) else {
            tracing::debug!(node = ?self.node, field = %self.field_id, "no enclosing scope");
            return None;
        };
        scopes.scope_mut(scope).add_binding(&self.field_id);
        tracing::debug!(node = ?self.node, ?scope, field = %self.field_id, "field bound");
        self.registered = Some((scope, self.field_id.clone()));
        Some(scope)
    }

    /// Change the declared id, migrating any existing registration.
    pub fn set_field_id<H>(
        &mut self,
        field_id: &str,
        host: &H,
        scopes: &mut ScopeRegistry<K>,
    ) -> Option<K>
    where
        H: BindingHost<Node = K> + ?Sized,
    {
        let was_connected = self.registered.is_some();
        self.disconnect(scopes);
        field_id.clone_into(&mut self.field_id);
        if was_connected {
            self.connect(host, scopes)
        } else {
            None
        }
    }

    /// Remove the registered id from its scope.
    pub fn disconnect(&mut self, scopes: &mut ScopeRegistry<K>) {
        if let Some((scope, field_id)) = self.registered.take() {
            if let Some(bound) = scopes.get_mut(&scope) {
                bound.remove_binding(&field_id);
            }
            tracing::debug!(node = ?self.node, ?scope, field = %field_id, "field unbound");
        }
    }
}
