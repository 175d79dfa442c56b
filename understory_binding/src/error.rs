// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by binding components.

use understory_bus::BusError;

/// Errors surfaced by the binding layer.
///
/// A missing enclosing scope is not an error: components silently do nothing.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    /// Publishing or subscribing failed.
    #[error(transparent)]
    Bus(#[from] BusError),
    /// A message named an action that is not registered.
    #[error("no action named `{0}` is registered")]
    UnknownAction(String),
    /// A markup element lacks an attribute its role requires.
    #[error("`{tag}` element is missing the `{attribute}` attribute")]
    MissingAttribute {
        /// Tag of the offending element.
        tag: String,
        /// Name of the missing attribute.
        attribute: &'static str,
    },
    /// The node is not live in the document.
    #[error("node is not part of the document")]
    UnknownNode,
}
