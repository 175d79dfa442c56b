// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subscriptions that write message payloads back onto scope controls.

use core::fmt::Debug;
use core::hash::Hash;
use std::rc::Rc;

use serde_json::Value;
use understory_bus::SubscriptionId;

use crate::context::BindingContext;
use crate::error::BindingError;
use crate::host::{BindingHost, write_control};
use crate::scope::{ScopeRegistry, find_enclosing_scope};

/// Attributes of a subscribe-sync element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Channel to subscribe on.
    pub channel: String,
    /// Subject pattern; empty matches every subject.
    pub subject: String,
}

/// Mirrors matching messages into the controls of its enclosing scope.
///
/// Only ids that are bound in the scope and present in the payload object are
/// written; everything else keeps its value. Payloads that are not JSON
/// objects are ignored.
#[derive(Clone, Debug)]
pub struct SubscribeSync<K> {
    node: K,
    config: SyncConfig,
    subscription: Option<SubscriptionId>,
}

impl<K: Copy + Eq + Hash + Debug + 'static> SubscribeSync<K> {
    /// Create a disconnected sync for `node`.
    pub fn new(node: K, config: SyncConfig) -> Self {
        Self {
            node,
            config,
            subscription: None,
        }
    }

    /// Node carrying the subscription.
    pub fn node(&self) -> K {
        self.node
    }

    /// Current configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Live subscription id, if connected.
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Subscribe on the context's bus, replacing any earlier subscription.
    pub fn connect<H>(&mut self, cx: &BindingContext<H>) -> Result<SubscriptionId, BindingError>
    where
        H: BindingHost<Node = K> + 'static,
    {
        self.disconnect(cx);
        let host = Rc::downgrade(&cx.host);
        let scopes = Rc::downgrade(&cx.scopes);
        let node = self.node;
        let id = cx.bus.subscribe(
            &self.config.channel,
            &self.config.subject,
            move |_, subject, payload| {
                let (Some(host), Some(scopes)) = (host.upgrade(), scopes.upgrade()) else {
                    return Ok(());
                };
                let mut host = host.try_borrow_mut()?;
                let scopes = scopes.try_borrow()?;
                let written = scatter(&mut *host, &scopes, &node, payload);
                tracing::trace!(?node, subject, written, "sync");
                Ok(())
            },
        )?;
        self.subscription = Some(id);
        Ok(id)
    }

    /// Replace the configuration, resubscribing if connected.
    pub fn reconfigure<H>(
        &mut self,
        config: SyncConfig,
        cx: &BindingContext<H>,
    ) -> Result<(), BindingError>
    where
        H: BindingHost<Node = K> + 'static,
    {
        let was_connected = self.disconnect(cx);
        self.config = config;
        if was_connected {
            self.connect(cx)?;
        }
        Ok(())
    }

    /// Drop the subscription. Returns `false` if it was not connected.
    pub fn disconnect<H>(&mut self, cx: &BindingContext<H>) -> bool
    where
        H: BindingHost<Node = K>,
    {
        match self.subscription.take() {
            Some(id) => cx
                .bus
                .unsubscribe(&self.config.channel, &self.config.subject, id),
            None => false,
        }
    }
}

/// Write the entries of `payload` onto the controls of the scope enclosing
/// `node`.
///
/// Returns the number of controls written.
pub fn scatter<H: BindingHost + ?Sized>(
    host: &mut H,
    scopes: &ScopeRegistry<H::Node>,
    node: &H::Node,
    payload: &Value,
) -> usize {
    let Value::Object(values) = payload else {
        return 0;
    };
    let Some(scope) = find_enclosing_scope(&*host, node) else {
        return 0;
    };
    let Some(bound) = scopes.get(&scope) else {
        return 0;
    };
    let mut written = 0;
    for field in bound.fields() {
        let Some(value) = values.get(field) else {
            continue;
        };
        if let Some(control) = host.find_control(&scope, field) {
            write_control(host, &control, value);
            written += 1;
        }
    }
    written
}
