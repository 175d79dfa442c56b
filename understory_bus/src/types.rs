// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the bus: subscription ids, payloads, and handler callbacks.

use std::any::Any;
use std::fmt;

/// Identifier of a subscription.
///
/// Ids come from a counter owned by a [`HandlerRegistry`](crate::HandlerRegistry)
/// and are unique among live subscriptions of that registry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    /// Raw numeric value of the id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error a handler returns to abort the current publish pass.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a single handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// Callback invoked with `(sender, subject, payload)` for every matching message.
pub type Handler<P> = dyn Fn(&dyn Any, &str, &P) -> HandlerResult;

/// A message body, either ready or produced on demand.
///
/// A [`Payload::Lazy`] producer runs exactly once per publish, before any
/// handler is invoked, and every matching handler sees the same value.
pub enum Payload<'a, P> {
    /// A value supplied as-is.
    Value(P),
    /// A zero-argument producer resolved at publish time.
    Lazy(Box<dyn FnOnce() -> P + 'a>),
}

impl<'a, P> Payload<'a, P> {
    /// Wrap a producer that is resolved when the message is published.
    pub fn lazy(producer: impl FnOnce() -> P + 'a) -> Self {
        Self::Lazy(Box::new(producer))
    }

    /// Resolve to a concrete value, running the producer if there is one.
    pub fn resolve(self) -> P {
        match self {
            Self::Value(value) => value,
            Self::Lazy(producer) => producer(),
        }
    }
}

impl<P> From<P> for Payload<'_, P> {
    fn from(value: P) -> Self {
        Self::Value(value)
    }
}

impl<P: fmt::Debug> fmt::Debug for Payload<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// A registered handler plus its addressing.
pub struct Subscription<P> {
    pub(crate) id: SubscriptionId,
    pub(crate) channel: String,
    pub(crate) pattern: String,
    // Registration sequence; unlike `id` it never wraps, so it orders buckets.
    pub(crate) seq: u64,
    pub(crate) callback: Box<Handler<P>>,
}

impl<P> Subscription<P> {
    /// Id assigned at registration.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Channel the subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Subject pattern as registered. Empty means every subject.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub(crate) fn invoke(&self, sender: &dyn Any, subject: &str, payload: &P) -> HandlerResult {
        (self.callback)(sender, subject, payload)
    }
}

impl<P> fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}
