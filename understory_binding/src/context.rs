// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared state handed to binding components.

use std::cell::RefCell;
use std::rc::Rc;

use understory_bus::{MessageBus, default_bus};

use crate::exec::ActionTable;
use crate::host::BindingHost;
use crate::scope::ScopeRegistry;

/// Host tree, scopes, actions, and bus shared by the components of one
/// document.
///
/// Cloning is cheap and shares the same state. Subscription handlers hold
/// weak references to the host and scopes, so dropping every context clone
/// releases them even while subscriptions are still registered on the bus.
pub struct BindingContext<H: BindingHost> {
    /// The tree being bound.
    pub host: Rc<RefCell<H>>,
    /// Field sets per scope owner.
    pub scopes: Rc<RefCell<ScopeRegistry<H::Node>>>,
    /// Named actions for [`SubscribeExec`](crate::SubscribeExec).
    pub actions: Rc<RefCell<ActionTable<H::Node>>>,
    /// The bus messages are published on.
    pub bus: Rc<MessageBus>,
}

impl<H: BindingHost> BindingContext<H> {
    /// Bind `host` to `bus`.
    pub fn new(host: H, bus: Rc<MessageBus>) -> Self {
        Self {
            host: Rc::new(RefCell::new(host)),
            scopes: Rc::new(RefCell::new(ScopeRegistry::new())),
            actions: Rc::new(RefCell::new(ActionTable::new())),
            bus,
        }
    }

    /// Bind `host` to the current thread's [`default_bus`].
    pub fn with_default_bus(host: H) -> Self {
        Self::new(host, default_bus())
    }
}

impl<H: BindingHost> Clone for BindingContext<H> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            scopes: self.scopes.clone(),
            actions: self.actions.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<H: BindingHost> core::fmt::Debug for BindingContext<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BindingContext")
            .field("scopes", &self.scopes.try_borrow().map(|s| s.len()).ok())
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
