// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Message bus: validated publish, subscribe, and unsubscribe over a
//! [`HandlerRegistry`].
//!
//! ## Dispatch
//!
//! [`MessageBus::publish`] resolves the payload, looks up matching
//! subscriptions, snapshots them, and then invokes each handler in
//! registration order. The registry is not borrowed while handlers run, so a
//! handler may publish, subscribe, or unsubscribe on the same bus. Changes made
//! during a pass take effect from the next publish.
//!
//! Every matching handler is invoked. A handler cannot stop delivery to later
//! handlers except by failing: the first `Err` aborts the pass and is returned
//! as [`BusError::HandlerFailed`].

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::error::{Argument, BusError};
use crate::registry::HandlerRegistry;
use crate::types::{HandlerResult, Payload, SubscriptionId};

/// Synchronous publish/subscribe bus.
///
/// `P` is the payload type; it defaults to [`serde_json::Value`].
///
/// ## Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use understory_bus::MessageBus;
///
/// let bus: MessageBus<i32> = MessageBus::new();
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// bus.subscribe("room", "^temp", move |_, subject, value| {
///     sink.borrow_mut().push((subject.to_owned(), *value));
///     Ok(())
/// })
/// .unwrap();
///
/// assert_eq!(bus.send(&(), "room", "temperature", 21).unwrap(), 1);
/// assert_eq!(bus.send(&(), "room", "humidity", 40).unwrap(), 0);
/// assert_eq!(*seen.borrow(), vec![("temperature".to_owned(), 21)]);
/// ```
pub struct MessageBus<P = Value> {
    registry: RefCell<HandlerRegistry<P>>,
}

impl<P> core::fmt::Debug for MessageBus<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageBus")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<P: 'static> Default for MessageBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> MessageBus<P> {
    /// Create a bus with an empty registry.
    pub fn new() -> Self {
        Self::with_registry(HandlerRegistry::new())
    }

    /// Create a bus whose subscription ids wrap at `limit`.
    pub fn with_id_limit(limit: u64) -> Self {
        Self::with_registry(HandlerRegistry::with_id_limit(limit))
    }

    /// Create a bus around an existing registry.
    pub fn with_registry(registry: HandlerRegistry<P>) -> Self {
        Self {
            registry: RefCell::new(registry),
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Register `callback` for messages on `channel` whose subject matches
    /// `pattern`.
    ///
    /// An empty `pattern` matches every subject. Failures (empty channel,
    /// malformed pattern) are reported as [`BusError::SubscriptionFailed`].
    pub fn subscribe<F>(
        &self,
        channel: &str,
        pattern: &str,
        callback: F,
    ) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&dyn Any, &str, &P) -> HandlerResult + 'static,
    {
        let id = self
            .registry
            .borrow_mut()
            .add(channel, pattern, Box::new(callback))
            .map_err(|source| BusError::SubscriptionFailed {
                channel: channel.to_owned(),
                pattern: pattern.to_owned(),
                source,
            })?;
        tracing::debug!(channel, pattern, %id, "subscribed");
        Ok(id)
    }

    /// Remove the subscription holding `id`.
    ///
    /// `channel` and `pattern` are accepted for symmetry with
    /// [`subscribe`](Self::subscribe); ids are unique, so removal does not
    /// need them. Returns `false` for an unknown id.
    pub fn unsubscribe(&self, channel: &str, pattern: &str, id: SubscriptionId) -> bool {
        let removed = self.registry.borrow_mut().remove(id);
        tracing::debug!(channel, pattern, %id, removed, "unsubscribed");
        removed
    }

    /// Publish a message and deliver it to every matching subscription.
    ///
    /// All four arguments are mandatory; an absent one yields
    /// [`BusError::InvalidArgument`]. The payload is resolved once before any
    /// handler runs.
    ///
    /// Returns the number of handlers invoked. No match is not an error; an
    /// empty subject or an empty channel matches nothing.
    pub fn publish(
        &self,
        sender: Option<&dyn Any>,
        channel: Option<&str>,
        subject: Option<&str>,
        payload: Option<Payload<'_, P>>,
    ) -> Result<usize, BusError> {
        let sender = sender.ok_or(BusError::InvalidArgument(Argument::Sender))?;
        let channel = channel.ok_or(BusError::InvalidArgument(Argument::Channel))?;
        let subject = subject.ok_or(BusError::InvalidArgument(Argument::Subject))?;
        let payload = payload
            .ok_or(BusError::InvalidArgument(Argument::Payload))?
            .resolve();

        // Snapshot, then release the borrow so handlers can re-enter the bus.
        let targets = self.registry.borrow().find(channel, subject);
        tracing::trace!(channel, subject, matched = targets.len(), "publish");

        for sub in &targets {
            if let Err(source) = sub.invoke(sender, subject, &payload) {
                tracing::warn!(channel, subject, id = %sub.id(), error = %source, "handler failed");
                return Err(BusError::HandlerFailed {
                    id: sub.id(),
                    channel: channel.to_owned(),
                    subject: subject.to_owned(),
                    source,
                });
            }
        }
        Ok(targets.len())
    }

    /// [`publish`](Self::publish) with every argument present.
    pub fn send<'a>(
        &self,
        sender: &dyn Any,
        channel: &str,
        subject: &str,
        payload: impl Into<Payload<'a, P>>,
    ) -> Result<usize, BusError> {
        self.publish(Some(sender), Some(channel), Some(subject), Some(payload.into()))
    }
}

thread_local! {
    static DEFAULT_BUS: Rc<MessageBus> = Rc::new(MessageBus::new());
}

/// The current thread's shared bus with JSON payloads.
///
/// Components that are not handed an explicit bus can fall back to this
/// instance. Tests should prefer their own [`MessageBus`] for isolation.
pub fn default_bus() -> Rc<MessageBus> {
    DEFAULT_BUS.with(Rc::clone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Widget(u32);

    fn recorder() -> (Rc<RefCell<Vec<String>>>, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (log.clone(), log)
    }

    #[test]
    fn wildcard_receives_every_subject() {
        let bus: MessageBus<i32> = MessageBus::new();
        let (log, sink) = recorder();
        bus.subscribe("c", "", move |_, subject, _| {
            sink.borrow_mut().push(subject.to_owned());
            Ok(())
        })
        .unwrap();
        bus.send(&(), "c", "alpha", 1).unwrap();
        bus.send(&(), "c", "beta", 2).unwrap();
        assert_eq!(*log.borrow(), vec!["alpha", "beta"]);
    }

    #[test]
    fn pattern_delivery_is_directional() {
        let bus: MessageBus<i32> = MessageBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        bus.subscribe("c", "^foo", move |_, _, _| {
            h.set(h.get() + 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(bus.send(&(), "c", "foobar", 0).unwrap(), 1);
        assert_eq!(bus.send(&(), "c", "barfoo", 0).unwrap(), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus: MessageBus<i32> = MessageBus::new();
        let (log, sink) = recorder();
        for name in ["h1", "h2", "h3"] {
            let sink = sink.clone();
            bus.subscribe("c", "s", move |_, _, _| {
                sink.borrow_mut().push(name.to_owned());
                Ok(())
            })
            .unwrap();
        }
        bus.send(&(), "c", "s", 0).unwrap();
        assert_eq!(*log.borrow(), vec!["h1", "h2", "h3"]);
    }

    #[test]
    fn lazy_payload_resolves_once_and_is_shared() {
        let bus: MessageBus<Rc<String>> = MessageBus::new();
        let seen: Rc<RefCell<Vec<Rc<String>>>> = Rc::default();
        for _ in 0..3 {
            let seen = seen.clone();
            bus.subscribe("c", "", move |_, _, p| {
                seen.borrow_mut().push(p.clone());
                Ok(())
            })
            .unwrap();
        }
        let calls = Cell::new(0);
        let delivered = bus
            .send(
                &(),
                "c",
                "s",
                Payload::lazy(|| {
                    calls.set(calls.get() + 1);
                    Rc::new("resolved".to_owned())
                }),
            )
            .unwrap();
        assert_eq!(delivered, 3);
        assert_eq!(calls.get(), 1);
        let seen = seen.borrow();
        assert!(seen.iter().all(|p| Rc::ptr_eq(p, &seen[0])));
    }

    #[test]
    fn unsubscribe_stops_delivery_and_tolerates_unknown_ids() {
        let bus: MessageBus<i32> = MessageBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let id = bus
            .subscribe("c", "", move |_, _, _| {
                h.set(h.get() + 1);
                Ok(())
            })
            .unwrap();
        bus.send(&(), "c", "s", 0).unwrap();
        assert!(bus.unsubscribe("c", "", id));
        bus.send(&(), "c", "s", 0).unwrap();
        assert_eq!(hits.get(), 1);
        assert!(!bus.unsubscribe("c", "", id));
        assert!(!bus.unsubscribe("elsewhere", "x", SubscriptionId(12345)));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus: MessageBus<i32> = MessageBus::new();
        assert_eq!(bus.send(&Widget(1), "unused-channel", "x", 1).unwrap(), 0);
    }

    #[test]
    fn missing_arguments_are_rejected_by_position() {
        let bus: MessageBus<i32> = MessageBus::new();
        let widget = Widget(7);
        let w: &dyn Any = &widget;
        let cases: [(Option<&dyn Any>, Option<&str>, Option<&str>, bool, Argument); 4] = [
            (Some(w), Some("c"), Some("s"), false, Argument::Payload),
            (None, Some("c"), Some("s"), true, Argument::Sender),
            (Some(w), None, Some("s"), true, Argument::Channel),
            (Some(w), Some("c"), None, true, Argument::Subject),
        ];
        for (sender, channel, subject, has_payload, expected) in cases {
            let payload = has_payload.then(|| Payload::Value(1));
            let err = bus.publish(sender, channel, subject, payload).unwrap_err();
            assert!(
                matches!(err, BusError::InvalidArgument(arg) if arg == expected),
                "expected {expected}, got {err:?}"
            );
        }
    }

    #[test]
    fn empty_subject_or_channel_publishes_nothing() {
        let bus: MessageBus<i32> = MessageBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        bus.subscribe("c", "", move |_, _, _| {
            h.set(h.get() + 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(bus.send(&(), "c", "", 1).unwrap(), 0);
        assert_eq!(bus.send(&(), "", "s", 1).unwrap(), 0);
        assert_eq!(
            bus.publish(Some(&()), Some("c"), Some(""), Some(Payload::Value(1)))
                .unwrap(),
            0
        );
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn sender_is_passed_through() {
        let bus: MessageBus<i32> = MessageBus::new();
        let got = Rc::new(Cell::new(0));
        let g = got.clone();
        bus.subscribe("c", "", move |sender, _, _| {
            if let Some(w) = sender.downcast_ref::<Widget>() {
                g.set(w.0);
            }
            Ok(())
        })
        .unwrap();
        bus.send(&Widget(42), "c", "s", 0).unwrap();
        assert_eq!(got.get(), 42);
    }

    #[test]
    fn malformed_pattern_reports_subscription_failed() {
        let bus: MessageBus<i32> = MessageBus::new();
        let err = bus.subscribe("c", "[", |_, _, _| Ok(())).unwrap_err();
        match err {
            BusError::SubscriptionFailed { channel, pattern, .. } => {
                assert_eq!(channel, "c");
                assert_eq!(pattern, "[");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn failing_handler_aborts_remaining_deliveries() {
        let bus: MessageBus<i32> = MessageBus::new();
        let (log, sink) = recorder();
        let s1 = sink.clone();
        bus.subscribe("c", "", move |_, _, _| {
            s1.borrow_mut().push("first".to_owned());
            Ok(())
        })
        .unwrap();
        let failing = bus
            .subscribe("c", "", |_, _, _| Err("boom".into()))
            .unwrap();
        bus.subscribe("c", "", move |_, _, _| {
            sink.borrow_mut().push("third".to_owned());
            Ok(())
        })
        .unwrap();
        let err = bus.send(&(), "c", "s", 0).unwrap_err();
        assert!(matches!(err, BusError::HandlerFailed { id, .. } if id == failing));
        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn reentrant_changes_apply_to_next_pass_only() {
        let bus: Rc<MessageBus<i32>> = Rc::new(MessageBus::new());
        let (log, sink) = recorder();

        let victim_sink = sink.clone();
        let victim = bus
            .subscribe("c", "", move |_, _, _| {
                victim_sink.borrow_mut().push("victim".to_owned());
                Ok(())
            })
            .unwrap();

        // Registered after the victim but removes it; also adds a newcomer.
        let weak = Rc::downgrade(&bus);
        let added = Rc::new(Cell::new(false));
        let added_flag = added.clone();
        let newcomer_sink = sink.clone();
        bus.subscribe("c", "", move |_, _, _| {
            let Some(bus) = weak.upgrade() else {
                return Ok(());
            };
            bus.unsubscribe("c", "", victim);
            if !added_flag.replace(true) {
                let s = newcomer_sink.clone();
                bus.subscribe("c", "", move |_, _, _| {
                    s.borrow_mut().push("newcomer".to_owned());
                    Ok(())
                })?;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(bus.send(&(), "c", "s", 0).unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["victim"]);
        log.borrow_mut().clear();

        assert_eq!(bus.send(&(), "c", "s", 0).unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["newcomer"]);
    }

    #[test]
    fn handler_may_publish_reentrantly() {
        let bus: Rc<MessageBus<i32>> = Rc::new(MessageBus::new());
        let (log, sink) = recorder();
        let weak = Rc::downgrade(&bus);
        bus.subscribe("in", "", move |_, _, v| {
            if let Some(bus) = weak.upgrade() {
                bus.send(&(), "out", "echo", v + 1)?;
            }
            Ok(())
        })
        .unwrap();
        bus.subscribe("out", "", move |_, subject, v| {
            sink.borrow_mut().push(format!("{subject}:{v}"));
            Ok(())
        })
        .unwrap();
        bus.send(&(), "in", "ping", 1).unwrap();
        assert_eq!(*log.borrow(), vec!["echo:2"]);
    }

    #[test]
    fn default_bus_is_shared_per_thread() {
        let a = default_bus();
        let b = default_bus();
        assert!(Rc::ptr_eq(&a, &b));
    }
}
