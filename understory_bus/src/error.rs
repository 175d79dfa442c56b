// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for registration and publishing.

use crate::types::{HandlerError, SubscriptionId};

/// A positional argument of [`MessageBus::publish`](crate::MessageBus::publish).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Argument {
    /// The originating object.
    Sender,
    /// The routing channel.
    Channel,
    /// The message subject.
    Subject,
    /// The message body.
    Payload,
}

impl core::fmt::Display for Argument {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Sender => "sender",
            Self::Channel => "channel",
            Self::Subject => "subject",
            Self::Payload => "payload",
        })
    }
}

/// Why the registry rejected a subscription.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Channels must be non-empty.
    #[error("channel is empty")]
    EmptyChannel,
    /// The subject pattern is not a valid regular expression.
    #[error("invalid subject pattern")]
    InvalidPattern(#[from] regex::Error),
}

/// Errors surfaced by [`MessageBus`](crate::MessageBus).
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// A mandatory publish argument was absent.
    #[error("missing {0} argument")]
    InvalidArgument(Argument),
    /// Registering a handler failed.
    #[error("failed to subscribe to channel `{channel}` with pattern `{pattern}`")]
    SubscriptionFailed {
        /// Channel passed to `subscribe`.
        channel: String,
        /// Subject pattern passed to `subscribe`.
        pattern: String,
        /// Underlying registry failure.
        #[source]
        source: RegistryError,
    },
    /// A handler returned an error; later handlers in the pass were skipped.
    #[error("handler {id} failed on `{channel}`/`{subject}`")]
    HandlerFailed {
        /// The failing subscription.
        id: SubscriptionId,
        /// Channel of the message.
        channel: String,
        /// Subject of the message.
        subject: String,
        /// Error returned by the handler.
        #[source]
        source: HandlerError,
    },
}
