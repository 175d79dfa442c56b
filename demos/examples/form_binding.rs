// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two scopes talking over one bus: a profile form and a live preview.
//!
//! This example shows how to combine:
//! - `bind-field` and `bind-publish` to publish a form's values on submit,
//! - `bind-subscribe` to mirror those values into another scope,
//! - `bind-exec` and an action table to react to the same message in code,
//! - `publish-button` to send a fixed message on click.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example form_binding`

use std::rc::Rc;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use understory_binding::{
    Binder, BindingError, Delivery, Document, Element, ElementFlags, NodeId,
};
use understory_bus::MessageBus;

fn main() -> Result<(), BindingError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut doc = Document::new();
    let page = doc.insert(None, Element::new("main"));

    // Profile form: two controls, their field declarations, and a trigger.
    let form = doc.insert(Some(page), Element::new("bind-scope"));
    let name = doc.insert(
        Some(form),
        Element::new("input").with_attribute("id", "name"),
    );
    let subscribed = doc.insert(
        Some(form),
        Element::new("input")
            .with_attribute("id", "newsletter")
            .with_attribute("type", "checkbox"),
    );
    for id in ["name", "newsletter"] {
        doc.insert(Some(form), Element::new("bind-field").with_attribute("for", id));
    }
    let save = doc.insert(
        Some(form),
        Element::new("bind-publish")
            .with_attribute("onevent", "submit")
            .with_attribute("channel", "profile")
            .with_attribute("subject", "save"),
    );

    // Preview: shows the last saved values.
    let preview = doc.insert(Some(page), Element::new("bind-scope"));
    let preview_name = doc.insert(
        Some(preview),
        Element::new("span").with_attribute("id", "name"),
    );
    doc.insert(Some(preview), Element::new("bind-field").with_attribute("for", "name"));
    doc.insert(
        Some(preview),
        Element::new("bind-subscribe")
            .with_attribute("channel", "profile")
            .with_attribute("subject", "^save$"),
    );
    doc.insert(
        Some(page),
        Element::new("bind-exec")
            .with_attribute("channel", "profile")
            .with_attribute("execute", "audit"),
    );
    let reset = doc.insert(
        Some(page),
        Element::new("publish-button")
            .with_attribute("publish-channel", "profile")
            .with_attribute("publish-payload", "reset"),
    );

    let bus: Rc<MessageBus> = Rc::new(MessageBus::new());
    let mut binder = Binder::new(doc, bus);
    binder.register_action("audit", |d: &Delivery<'_, NodeId>| {
        tracing::info!(subject = d.subject, payload = %d.payload, "audit");
        Ok(())
    });
    let connected = binder.connect_subtree(page)?;
    tracing::info!(connected, "page bound");

    // The user types and submits.
    {
        let mut doc = binder.document_mut();
        if let Some(el) = doc.element_mut(name) {
            el.value = "Ada".into();
        }
        if let Some(el) = doc.element_mut(subscribed) {
            el.flags.insert(ElementFlags::CHECKED);
        }
    }
    let reached = binder.dispatch_event(save, "submit")?;
    tracing::info!(reached, "form submitted");

    let shown = binder
        .document()
        .element(preview_name)
        .map(|el| el.text.clone())
        .unwrap_or_default();
    println!("preview shows {shown:?}");

    // Code can publish too; the preview follows.
    binder
        .bus()
        .send(&"console", "profile", "save", json!({ "name": "Grace" }))?;
    let shown = binder
        .document()
        .element(preview_name)
        .map(|el| el.text.clone())
        .unwrap_or_default();
    println!("preview shows {shown:?}");

    binder.dispatch_event(reset, "click")?;
    Ok(())
}
