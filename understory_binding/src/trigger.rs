// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Publishing components: scope triggers and literal-payload buttons.

use core::fmt::Debug;
use core::hash::Hash;

use serde_json::{Map, Value};

use crate::context::BindingContext;
use crate::error::BindingError;
use crate::host::{BindingHost, read_control};
use crate::scope::{ScopeRegistry, find_enclosing_scope};

/// Attributes of a publish trigger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Event name that fires the trigger.
    pub event: String,
    /// Channel to publish on.
    pub channel: String,
    /// Subject to publish with.
    pub subject: String,
}

/// Publishes the values of its enclosing scope when its event fires.
///
/// The payload is a JSON object mapping every field id bound in the scope to
/// the current value of its control (see [`read_control`]). Fields whose
/// control cannot be found are left out.
///
/// The sender passed to the bus is the trigger's node handle `K`, so a
/// subscriber identifies the origin with `sender.downcast_ref::<K>()`
/// (a [`NodeId`](crate::NodeId) for [`Document`](crate::Document) hosts).
#[derive(Clone, Debug)]
pub struct PublishTrigger<K> {
    node: K,
    config: TriggerConfig,
}

impl<K: Copy + Eq + Hash + Debug + 'static> PublishTrigger<K> {
    /// Create a trigger for `node`.
    pub fn new(node: K, config: TriggerConfig) -> Self {
        Self { node, config }
    }

    /// Node carrying the trigger.
    pub fn node(&self) -> K {
        self.node
    }

    /// Current configuration.
    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: TriggerConfig) {
        self.config = config;
    }

    /// Handle `event` raised on or below the trigger node.
    ///
    /// Returns `Ok(None)` when the event is not the trigger's event or there is
    /// no enclosing scope, otherwise the number of handlers the publish
    /// reached.
    pub fn fire<H>(
        &self,
        event: &str,
        cx: &BindingContext<H>,
    ) -> Result<Option<usize>, BindingError>
    where
        H: BindingHost<Node = K>,
    {
        if event != self.config.event {
            return Ok(None);
        }
        let payload = {
            let host = cx.host.borrow();
            let Some(scope) = find_enclosing_scope(&*host, &self.node) else {
                tracing::debug!(node = ?self.node, event, "trigger outside any scope");
                return Ok(None);
            };
            gather_scope(&*host, &cx.scopes.borrow(), &scope)
        };
        let delivered = cx.bus.send(
            &self.node,
            &self.config.channel,
            &self.config.subject,
            Value::Object(payload),
        )?;
        Ok(Some(delivered))
    }
}

/// Values of every control bound in `scope`, keyed by field id.
pub fn gather_scope<H: BindingHost + ?Sized>(
    host: &H,
    scopes: &ScopeRegistry<H::Node>,
    scope: &H::Node,
) -> Map<String, Value> {
    let mut out = Map::new();
    let Some(bound) = scopes.get(scope) else {
        return out;
    };
    for field in bound.fields() {
        if let Some(control) = host.find_control(scope, field) {
            out.insert(field.to_owned(), read_control(host, &control));
        }
    }
    out
}

/// Attributes of a publish button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonConfig {
    /// Channel to publish on.
    pub channel: String,
    /// Subject to publish with.
    pub subject: String,
    /// Literal payload, published as a JSON string.
    pub payload: String,
}

impl ButtonConfig {
    /// Subject used when none is given.
    pub const DEFAULT_SUBJECT: &'static str = "click";
}

/// Publishes a fixed string payload when clicked.
///
/// Like [`PublishTrigger`], the sender is the button's node handle.
#[derive(Clone, Debug)]
pub struct PublishButton<K> {
    node: K,
    config: ButtonConfig,
}

impl<K: Copy + Eq + Hash + Debug + 'static> PublishButton<K> {
    /// Event name the button reacts to.
    pub const EVENT: &'static str = "click";

    /// Create a button for `node`.
    pub fn new(node: K, config: ButtonConfig) -> Self {
        Self { node, config }
    }

    /// Node carrying the button.
    pub fn node(&self) -> K {
        self.node
    }

    /// Current configuration.
    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: ButtonConfig) {
        self.config = config;
    }

    /// Publish the payload if `event` is a click.
    pub fn fire<H>(
        &self,
        event: &str,
        cx: &BindingContext<H>,
    ) -> Result<Option<usize>, BindingError>
    where
        H: BindingHost<Node = K>,
    {
        if event != Self::EVENT {
            return Ok(None);
        }
        let delivered = cx.bus.send(
            &self.node,
            &self.config.channel,
            &self.config.subject,
            Value::String(self.config.payload.clone()),
        )?;
        Ok(Some(delivered))
    }
}
