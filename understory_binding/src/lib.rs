// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_binding --heading-base-level=0

//! Understory Binding: declarative two-way data binding over a message bus.
//!
//! ## Overview
//!
//! A **scope** is a node that groups the field ids declared beneath it.
//! Components attached to nodes inside a scope move values between the
//! scope's controls and an [`understory_bus::MessageBus`]:
//!
//! - [`BindingField`] registers a field id into the nearest enclosing scope.
//! - [`PublishTrigger`] gathers every bound control of its scope into a JSON
//!   object and publishes it when its event fires.
//! - [`SubscribeSync`] writes incoming JSON objects back onto the scope's
//!   controls.
//! - [`SubscribeExec`] runs a named action from an [`ActionTable`] for every
//!   matching message.
//! - [`PublishButton`] publishes a fixed string on click.
//!
//! Components are independent of any UI toolkit. They walk parents, find
//! scope owners, and read or write controls through the [`BindingHost`] trait.
//! [`Document`] is an in-memory host, and [`Binder`] instantiates components
//! from tagged [`Document`] elements (see [`Vocabulary`]).
//!
//! A component with no enclosing scope does nothing; this is not an error.
//!
//! ## Workflow
//!
//! 1) Build a [`Document`] with scope, field, and trigger elements.
//! 2) Hand it to a [`Binder`] and call [`Binder::connect_subtree`].
//! 3) Route UI events through [`Binder::dispatch_event`]; subscribers on the
//!    bus receive the scope's values.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_binding::{Binder, Document, Element};
//! use understory_bus::MessageBus;
//!
//! let mut doc = Document::new();
//! let form = doc.insert(None, Element::new("bind-scope"));
//! doc.insert(Some(form), Element::new("input").with_attribute("id", "name").with_value("Ada"));
//! doc.insert(Some(form), Element::new("bind-field").with_attribute("for", "name"));
//! let save = doc.insert(
//!     Some(form),
//!     Element::new("bind-publish")
//!         .with_attribute("onevent", "submit")
//!         .with_attribute("channel", "form")
//!         .with_attribute("subject", "save"),
//! );
//!
//! let bus: Rc<MessageBus> = Rc::new(MessageBus::new());
//! let saved = Rc::new(RefCell::new(None));
//! let sink = saved.clone();
//! bus.subscribe("form", "^save$", move |_, _, payload| {
//!     *sink.borrow_mut() = Some(payload["name"].clone());
//!     Ok(())
//! })
//! .unwrap();
//!
//! let mut binder = Binder::new(doc, bus);
//! binder.connect_subtree(form).unwrap();
//! binder.dispatch_event(save, "submit").unwrap();
//! assert_eq!(saved.borrow().as_ref().and_then(|v| v.as_str()), Some("Ada"));
//! ```

mod binder;
mod context;
mod document;
mod error;
mod exec;
mod field;
mod host;
mod scope;
mod sync;
mod trigger;

pub use binder::{Binder, Role, Vocabulary};
pub use context::BindingContext;
pub use document::{Document, Element, ElementFlags, NodeId};
pub use error::BindingError;
pub use exec::{Action, ActionTable, Delivery, ExecConfig, SubscribeExec};
pub use field::BindingField;
pub use host::{BindingHost, ControlKind, read_control, write_control};
pub use scope::{BindingScope, ScopeRegistry, find_enclosing_scope};
pub use sync::{SubscribeSync, SyncConfig, scatter};
pub use trigger::{ButtonConfig, PublishButton, PublishTrigger, TriggerConfig, gather_scope};
