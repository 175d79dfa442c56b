// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_bus --heading-base-level=0

//! Understory Bus: an in-process, synchronous publish/subscribe bus.
//!
//! ## Overview
//!
//! Messages are addressed by a **channel** (an exact routing key) and a
//! **subject**. Subscribers register a subject **pattern**: a regular
//! expression tested against the subject of every message on their channel,
//! or the empty string to receive every subject.
//!
//! - [`HandlerRegistry`]: stores subscriptions by channel and pattern, finds
//!   matches, and removes subscriptions by [`SubscriptionId`].
//! - [`MessageBus`]: validates publish arguments, resolves [`Payload`]s,
//!   and dispatches to matching handlers.
//!
//! ## Semantics
//!
//! - Dispatch is synchronous: [`MessageBus::publish`] returns after every
//!   matching handler ran.
//! - Handlers run in registration order, across all matching patterns.
//! - The matching set is snapshotted before the first handler runs. Handlers
//!   may publish, subscribe, or unsubscribe re-entrantly; such changes apply
//!   from the next publish.
//! - A lazy payload is produced once per publish and shared by all handlers.
//! - Publishing with no subscribers is a silent no-op.
//! - The first handler error aborts the pass and is returned to the caller.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use understory_bus::{MessageBus, Payload};
//!
//! let bus: MessageBus = MessageBus::new();
//! bus.subscribe("form", "^save$", |_sender, _subject, payload| {
//!     assert_eq!(payload["name"], "Ada");
//!     Ok(())
//! })
//! .unwrap();
//!
//! let delivered = bus
//!     .publish(
//!         Some(&"toolbar"),
//!         Some("form"),
//!         Some("save"),
//!         Some(Payload::lazy(|| json!({ "name": "Ada" }))),
//!     )
//!     .unwrap();
//! assert_eq!(delivered, 1);
//! ```
//!
//! The bus is single-threaded by construction (`!Send`, `!Sync`). Each thread
//! can reach a shared instance through [`default_bus`].

mod bus;
mod error;
mod registry;
mod types;

pub use bus::{MessageBus, default_bus};
pub use error::{Argument, BusError, RegistryError};
pub use registry::HandlerRegistry;
pub use types::{Handler, HandlerError, HandlerResult, Payload, Subscription, SubscriptionId};
