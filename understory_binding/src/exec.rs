// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subscriptions that run a named action on delivery.
//!
//! Actions are plain Rust callbacks registered by name in an [`ActionTable`].
//! A [`SubscribeExec`] names the action it runs; the name is resolved at
//! delivery time, so actions may be registered after the subscription is
//! connected, and replacing an action takes effect on the next message.

use core::fmt::Debug;
use core::hash::Hash;
use std::any::Any;
use std::rc::Rc;

use hashbrown::HashMap;
use serde_json::Value;
use understory_bus::{HandlerResult, SubscriptionId};

use crate::context::BindingContext;
use crate::error::BindingError;
use crate::host::BindingHost;

/// A message as seen by an action.
#[derive(Clone, Copy)]
pub struct Delivery<'a, K> {
    /// Node carrying the subscription.
    pub receiver: K,
    /// Sender passed to the bus.
    pub sender: &'a dyn Any,
    /// Subject of the message.
    pub subject: &'a str,
    /// Message payload.
    pub payload: &'a Value,
}

impl<K: Debug> Debug for Delivery<'_, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Delivery")
            .field("receiver", &self.receiver)
            .field("subject", &self.subject)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Callback stored in an [`ActionTable`].
pub type Action<K> = dyn Fn(&Delivery<'_, K>) -> HandlerResult;

/// Named actions available to [`SubscribeExec`].
pub struct ActionTable<K> {
    actions: HashMap<String, Rc<Action<K>>>,
}

impl<K> Default for ActionTable<K> {
    fn default() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }
}

impl<K> Debug for ActionTable<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ActionTable")
            .field("actions", &names)
            .finish()
    }
}

impl<K> ActionTable<K> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` under `name`, replacing any previous action.
    ///
    /// Returns `true` if an action was replaced.
    pub fn register<F>(&mut self, name: &str, action: F) -> bool
    where
        F: Fn(&Delivery<'_, K>) -> HandlerResult + 'static,
    {
        self.actions
            .insert(name.to_owned(), Rc::new(action))
            .is_some()
    }

    /// Remove the action named `name`.
    pub fn remove(&mut self, name: &str) -> bool {
        self.actions.remove(name).is_some()
    }

    /// Whether an action named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// The action named `name`.
    pub fn get(&self, name: &str) -> Option<Rc<Action<K>>> {
        self.actions.get(name).cloned()
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no actions are registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Attributes of a subscribe-and-execute element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecConfig {
    /// Channel to subscribe on.
    pub channel: String,
    /// Subject pattern; empty matches every subject.
    pub subject: String,
    /// Name of the action to run.
    pub action: String,
}

/// Runs a named action for every message matching its channel and subject.
///
/// An action name that is not registered when a message arrives fails the
/// handler with [`BindingError::UnknownAction`], which the bus reports as a
/// handler failure to the publisher.
#[derive(Clone, Debug)]
pub struct SubscribeExec<K> {
    node: K,
    config: ExecConfig,
    subscription: Option<SubscriptionId>,
}

impl<K: Copy + Eq + Hash + Debug + 'static> SubscribeExec<K> {
    /// Create a disconnected subscription for `node`.
    pub fn new(node: K, config: ExecConfig) -> Self {
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
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Live subscription id, if connected.
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Subscribe on the context's bus, replacing any earlier subscription.
    pub fn connect<H>(&mut self, cx: &BindingContext<H>) -> Result<SubscriptionId, BindingError>
    where
        H: BindingHost<Node = K>,
    {
        self.disconnect(cx);
        let actions = Rc::downgrade(&cx.actions);
        let name = self.config.action.clone();
        let receiver = self.node;
        let id = cx.bus.subscribe(
            &self.config.channel,
            &self.config.subject,
            move |sender, subject, payload| {
                let Some(actions) = actions.upgrade() else {
                    return Ok(());
                };
                let action = actions.try_borrow()?.get(&name);
                let Some(action) = action else {
                    return Err(BindingError::UnknownAction(name.clone()).into());
                };
                tracing::trace!(?receiver, action = %name, subject, "exec");
                action(&Delivery {
                    receiver,
                    sender,
                    subject,
                    payload,
                })
            },
        )?;
        self.subscription = Some(id);
        Ok(id)
    }

    /// Replace the configuration, resubscribing if connected.
    pub fn reconfigure<H>(
        &mut self,
        config: ExecConfig,
        cx: &BindingContext<H>,
    ) -> Result<(), BindingError>
    where
        H: BindingHost<Node = K>,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Element, NodeId};
    use serde_json::json;
    use std::cell::RefCell;
    use understory_bus::{BusError, MessageBus};

    fn setup() -> (BindingContext<Document>, NodeId) {
        let mut doc = Document::new();
        let node = doc.insert(None, Element::new("bind-exec"));
        let cx = BindingContext::new(doc, Rc::new(MessageBus::new()));
        (cx, node)
    }

    fn config(action: &str) -> ExecConfig {
        ExecConfig {
            channel: "jobs".into(),
            subject: "^run$".into(),
            action: action.into(),
        }
    }

    #[test]
    fn runs_named_action_with_delivery() {
        let (cx, node) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        cx.actions.borrow_mut().register("log", move |d: &Delivery<'_, NodeId>| {
            let from = d.sender.downcast_ref::<&str>().copied();
            sink.borrow_mut()
                .push((d.receiver, from, d.subject.to_owned(), d.payload.clone()));
            Ok(())
        });
        let mut exec = SubscribeExec::new(node, config("log"));
        exec.connect(&cx).unwrap();

        assert_eq!(cx.bus.send(&"tester", "jobs", "run", json!(7)).unwrap(), 1);
        assert_eq!(cx.bus.send(&"tester", "jobs", "runs", json!(8)).unwrap(), 0);
        assert_eq!(
            *seen.borrow(),
            vec![(node, Some("tester"), "run".to_owned(), json!(7))]
        );
    }

    #[test]
    fn unknown_action_fails_the_publish() {
        let (cx, node) = setup();
        let mut exec = SubscribeExec::new(node, config("missing"));
        exec.connect(&cx).unwrap();
        let err = cx.bus.send(&(), "jobs", "run", json!(null)).unwrap_err();
        match err {
            BusError::HandlerFailed { source, .. } => assert_eq!(
                source.to_string(),
                BindingError::UnknownAction("missing".into()).to_string()
            ),
            other => panic!("expected handler failure, got {other:?}"),
        }
    }

    #[test]
    fn action_resolved_at_delivery() {
        let (cx, node) = setup();
        let mut exec = SubscribeExec::new(node, config("late"));
        exec.connect(&cx).unwrap();
        let hits = Rc::new(RefCell::new(0));
        let sink = hits.clone();
        cx.actions.borrow_mut().register("late", move |_: &Delivery<'_, NodeId>| {
            *sink.borrow_mut() += 1;
            Ok(())
        });
        cx.bus.send(&(), "jobs", "run", json!(null)).unwrap();
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn disconnect_and_reconfigure() {
        let (cx, node) = setup();
        cx.actions
            .borrow_mut()
            .register("noop", |_: &Delivery<'_, NodeId>| Ok(()));
        let mut exec = SubscribeExec::new(node, config("noop"));
        exec.connect(&cx).unwrap();

        let mut moved = config("noop");
        moved.channel = "other".into();
        exec.reconfigure(moved, &cx).unwrap();
        assert_eq!(cx.bus.send(&(), "jobs", "run", json!(null)).unwrap(), 0);
        assert_eq!(cx.bus.send(&(), "other", "run", json!(null)).unwrap(), 1);

        assert!(exec.disconnect(&cx));
        assert!(!exec.disconnect(&cx));
        assert_eq!(cx.bus.subscription_count(), 0);
    }
}
