// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Markup surface: turns tagged elements of a [`Document`] into binding
//! components and routes events to them.
//!
//! ## Markup roles
//!
//! | Role | Default tag | Attributes |
//! |---|---|---|
//! | [`Role::Scope`] | `bind-scope` | |
//! | [`Role::Field`] | `bind-field` | `for` |
//! | [`Role::Trigger`] | `bind-publish` | `onevent`, `channel`, `subject` |
//! | [`Role::Sync`] | `bind-subscribe` | `channel`, `subject` (optional) |
//! | [`Role::Exec`] | `bind-exec` | `channel`, `subject` (optional), `execute` |
//! | [`Role::Button`] | `publish-button` | `publish-channel`, `publish-payload`, `publish-subject` (optional) |
//!
//! Tags are configurable through [`Vocabulary`].

use core::cell::{Ref, RefMut};
use std::rc::Rc;

use hashbrown::HashMap;
use smallvec::SmallVec;
use understory_bus::{HandlerResult, MessageBus};

use crate::context::BindingContext;
use crate::document::{Document, Element, ElementFlags, NodeId};
use crate::error::BindingError;
use crate::exec::{Delivery, ExecConfig, SubscribeExec};
use crate::field::BindingField;
use crate::host::BindingHost;
use crate::sync::{SubscribeSync, SyncConfig};
use crate::trigger::{ButtonConfig, PublishButton, PublishTrigger, TriggerConfig};

/// What a tagged element does.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Establishes a binding scope for its subtree.
    Scope,
    /// Registers a field id into the enclosing scope.
    Field,
    /// Publishes the enclosing scope's values on an event.
    Trigger,
    /// Writes matching messages back into the enclosing scope.
    Sync,
    /// Runs a named action for matching messages.
    Exec,
    /// Publishes a literal payload on click.
    Button,
}

/// Tag names recognized for each [`Role`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vocabulary {
    scope: String,
    field: String,
    trigger: String,
    sync: String,
    exec: String,
    button: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            scope: "bind-scope".into(),
            field: "bind-field".into(),
            trigger: "bind-publish".into(),
            sync: "bind-subscribe".into(),
            exec: "bind-exec".into(),
            button: "publish-button".into(),
        }
    }
}

impl Vocabulary {
    /// Tag recognized for `role`.
    pub fn tag(&self, role: Role) -> &str {
        match role {
            Role::Scope => &self.scope,
            Role::Field => &self.field,
            Role::Trigger => &self.trigger,
            Role::Sync => &self.sync,
            Role::Exec => &self.exec,
            Role::Button => &self.button,
        }
    }

    /// Use `tag` for `role`. Tags are matched case-insensitively.
    #[must_use]
    pub fn with_tag(mut self, role: Role, tag: &str) -> Self {
        let slot = match role {
            Role::Scope => &mut self.scope,
            Role::Field => &mut self.field,
            Role::Trigger => &mut self.trigger,
            Role::Sync => &mut self.sync,
            Role::Exec => &mut self.exec,
            Role::Button => &mut self.button,
        };
        *slot = tag.to_ascii_lowercase();
        self
    }

    /// Role of an element with `tag`, if any.
    pub fn role_of(&self, tag: &str) -> Option<Role> {
        [
            Role::Scope,
            Role::Field,
            Role::Trigger,
            Role::Sync,
            Role::Exec,
            Role::Button,
        ]
        .into_iter()
        .find(|role| self.tag(*role).eq_ignore_ascii_case(tag))
    }
}

/// Binding components attached to a [`Document`].
///
/// The binder owns the document (through its [`BindingContext`]) and one
/// component per tagged element. Connect a subtree once it is built, route
/// events with [`dispatch_event`](Self::dispatch_event), and change attributes
/// through [`set_attribute`](Self::set_attribute) so components follow.
#[derive(Debug)]
pub struct Binder {
    cx: BindingContext<Document>,
    vocabulary: Vocabulary,
    fields: HashMap<NodeId, BindingField<NodeId>>,
    triggers: HashMap<NodeId, PublishTrigger<NodeId>>,
    buttons: HashMap<NodeId, PublishButton<NodeId>>,
    syncs: HashMap<NodeId, SubscribeSync<NodeId>>,
    execs: HashMap<NodeId, SubscribeExec<NodeId>>,
}

impl Binder {
    /// Bind `document` to `bus` with the default [`Vocabulary`].
    pub fn new(document: Document, bus: Rc<MessageBus>) -> Self {
        Self::from_context(BindingContext::new(document, bus))
    }

    /// Bind `document` to the current thread's default bus.
    pub fn with_default_bus(document: Document) -> Self {
        Self::from_context(BindingContext::with_default_bus(document))
    }

    fn from_context(cx: BindingContext<Document>) -> Self {
        Self {
            cx,
            vocabulary: Vocabulary::default(),
            fields: HashMap::new(),
            triggers: HashMap::new(),
            buttons: HashMap::new(),
            syncs: HashMap::new(),
            execs: HashMap::new(),
        }
    }

    /// Replace the tag vocabulary. Affects subsequent connects only.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Shared binding state.
    pub fn context(&self) -> &BindingContext<Document> {
        &self.cx
    }

    /// The bound document.
    ///
    /// # Panics
    ///
    /// Panics if the document is mutably borrowed.
    pub fn document(&self) -> Ref<'_, Document> {
        self.cx.host.borrow()
    }

    /// The bound document, mutably. Attribute changes made through this
    /// borrow are not seen by components; use
    /// [`set_attribute`](Self::set_attribute) for those.
    ///
    /// # Panics
    ///
    /// Panics if the document is already borrowed.
    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.cx.host.borrow_mut()
    }

    /// The bus components publish on.
    pub fn bus(&self) -> &Rc<MessageBus> {
        &self.cx.bus
    }

    /// Register an action for exec elements.
    pub fn register_action<F>(&self, name: &str, action: F) -> bool
    where
        F: Fn(&Delivery<'_, NodeId>) -> HandlerResult + 'static,
    {
        self.cx.actions.borrow_mut().register(name, action)
    }

    /// Whether `node` carries a connected component.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.fields.contains_key(&node)
            || self.triggers.contains_key(&node)
            || self.buttons.contains_key(&node)
            || self.syncs.contains_key(&node)
            || self.execs.contains_key(&node)
    }

    /// Field ids bound in the scope owned by `owner`.
    pub fn fields_of(&self, owner: NodeId) -> Vec<String> {
        self.cx.scopes.borrow().fields_of(&owner)
    }

    /// Connect every tagged element in the subtree of `root`, parents first.
    ///
    /// Elements that are already connected are skipped. Returns the number of
    /// components created. The first element missing a required attribute
    /// stops the walk; components created before it stay connected.
    pub fn connect_subtree(&mut self, root: NodeId) -> Result<usize, BindingError> {
        let nodes = {
            let doc = self.cx.host.borrow();
            if !doc.is_alive(root) {
                return Err(BindingError::UnknownNode);
            }
            doc.descendants(root)
        };
        let mut connected = 0;
        for node in nodes {
            if self.is_connected(node) {
                continue;
            }
            let Some(element) = self.cx.host.borrow().element(node).cloned() else {
                continue;
            };
            let Some(role) = self.vocabulary.role_of(&element.tag) else {
                continue;
            };
            self.connect_node(node, role, &element)?;
            if role != Role::Scope {
                connected += 1;
            }
        }
        tracing::debug!(?root, connected, "subtree connected");
        Ok(connected)
    }

    fn connect_node(
        &mut self,
        node: NodeId,
        role: Role,
        element: &Element,
    ) -> Result<(), BindingError> {
        match role {
            Role::Scope => {
                if let Some(el) = self.cx.host.borrow_mut().element_mut(node) {
                    el.flags.insert(ElementFlags::SCOPE_OWNER);
                }
            }
            Role::Field => {
                let mut field = BindingField::new(node, &required(element, FOR)?);
                field.connect(&*self.cx.host.borrow(), &mut self.cx.scopes.borrow_mut());
                self.fields.insert(node, field);
            }
            Role::Trigger => {
                let trigger = PublishTrigger::new(node, trigger_config(element)?);
                self.triggers.insert(node, trigger);
            }
            Role::Button => {
                let button = PublishButton::new(node, button_config(element)?);
                self.buttons.insert(node, button);
            }
            Role::Sync => {
                let mut sync = SubscribeSync::new(node, sync_config(element)?);
                sync.connect(&self.cx)?;
                self.syncs.insert(node, sync);
            }
            Role::Exec => {
                let mut exec = SubscribeExec::new(node, exec_config(element)?);
                exec.connect(&self.cx)?;
                self.execs.insert(node, exec);
            }
        }
        Ok(())
    }

    /// Raise `event` at `target` and bubble it to the root.
    ///
    /// Triggers and buttons on `target` and each of its ancestors fire in
    /// that order. Returns the number of handlers reached by all publishes.
    pub fn dispatch_event(&self, target: NodeId, event: &str) -> Result<usize, BindingError> {
        let path: SmallVec<[NodeId; 16]> = {
            let doc = self.cx.host.borrow();
            if !doc.is_alive(target) {
                return Err(BindingError::UnknownNode);
            }
            core::iter::successors(Some(target), |n| doc.parent_of(n)).collect()
        };
        tracing::trace!(?target, event, depth = path.len(), "dispatch event");
        let mut delivered = 0;
        for node in &path {
            if let Some(trigger) = self.triggers.get(node) {
                delivered += trigger.fire(event, &self.cx)?.unwrap_or(0);
            }
            if let Some(button) = self.buttons.get(node) {
                delivered += button.fire(event, &self.cx)?.unwrap_or(0);
            }
        }
        Ok(delivered)
    }

    /// Set an attribute on `node` and update its component.
    ///
    /// Changing `for` migrates the field id between scopes. Changing the
    /// configuration attributes of a sync or exec element resubscribes it.
    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), BindingError> {
        let element = {
            let mut doc = self.cx.host.borrow_mut();
            let el = doc.element_mut(node).ok_or(BindingError::UnknownNode)?;
            let previous = el.attributes.insert(name.to_owned(), value.to_owned());
            if previous.as_deref() == Some(value) {
                return Ok(());
            }
            el.clone()
        };

        if let Some(field) = self.fields.get_mut(&node)
            && name == FOR
        {
            field.set_field_id(
                value,
                &*self.cx.host.borrow(),
                &mut self.cx.scopes.borrow_mut(),
            );
        }
        if let Some(trigger) = self.triggers.get_mut(&node) {
            trigger.set_config(trigger_config(&element)?);
        }
        if let Some(button) = self.buttons.get_mut(&node) {
            button.set_config(button_config(&element)?);
        }
        if let Some(sync) = self.syncs.get_mut(&node) {
            let config = sync_config(&element)?;
            if *sync.config() != config {
                sync.reconfigure(config, &self.cx)?;
            }
        }
        if let Some(exec) = self.execs.get_mut(&node) {
            let config = exec_config(&element)?;
            if *exec.config() != config {
                exec.reconfigure(config, &self.cx)?;
            }
        }
        Ok(())
    }

    /// Tear down every component in the subtree of `root`.
    ///
    /// Field ids are removed from their scopes, subscriptions are dropped, and
    /// scopes owned inside the subtree are forgotten. Returns the number of
    /// components removed.
    pub fn disconnect_subtree(&mut self, root: NodeId) -> usize {
        let nodes = self.cx.host.borrow().descendants(root);
        let mut removed = 0;
        for node in &nodes {
            if let Some(mut field) = self.fields.remove(node) {
                field.disconnect(&mut self.cx.scopes.borrow_mut());
                removed += 1;
            }
            if self.triggers.remove(node).is_some() {
                removed += 1;
            }
            if self.buttons.remove(node).is_some() {
                removed += 1;
            }
            if let Some(mut sync) = self.syncs.remove(node) {
                sync.disconnect(&self.cx);
                removed += 1;
            }
            if let Some(mut exec) = self.execs.remove(node) {
                exec.disconnect(&self.cx);
                removed += 1;
            }
        }
        let mut scopes = self.cx.scopes.borrow_mut();
        for node in &nodes {
            scopes.remove(node);
        }
        tracing::debug!(?root, removed, "subtree disconnected");
        removed
    }

    /// Disconnect the subtree of `node` and remove it from the document.
    pub fn remove(&mut self, node: NodeId) -> usize {
        let removed = self.disconnect_subtree(node);
        self.cx.host.borrow_mut().remove(node);
        removed
    }
}

const FOR: &str = "for";

fn required(element: &Element, attribute: &'static str) -> Result<String, BindingError> {
    element
        .attribute(attribute)
        .map(str::to_owned)
        .ok_or_else(|| BindingError::MissingAttribute {
            tag: element.tag.clone(),
            attribute,
        })
}

fn optional(element: &Element, attribute: &str) -> String {
    element.attribute(attribute).unwrap_or_default().to_owned()
}

fn trigger_config(element: &Element) -> Result<TriggerConfig, BindingError> {
    Ok(TriggerConfig {
        event: required(element, "onevent")?,
        channel: required(element, "channel")?,
        subject: required(element, "subject")?,
    })
}

fn button_config(element: &Element) -> Result<ButtonConfig, BindingError> {
    Ok(ButtonConfig {
        channel: required(element, "publish-channel")?,
        subject: element
            .attribute("publish-subject")
            .unwrap_or(ButtonConfig::DEFAULT_SUBJECT)
            .to_owned(),
        payload: required(element, "publish-payload")?,
    })
}

fn sync_config(element: &Element) -> Result<SyncConfig, BindingError> {
    Ok(SyncConfig {
        channel: required(element, "channel")?,
        subject: optional(element, "subject"),
    })
}

fn exec_config(element: &Element) -> Result<ExecConfig, BindingError> {
    Ok(ExecConfig {
        channel: required(element, "channel")?,
        subject: optional(element, "subject"),
        action: required(element, "execute")?,
    })
}
