// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tree abstraction the binding layer runs on, and the control value
//! convention shared by publishing and syncing.
//!
//! ## Value convention
//!
//! | Control | Read | Write |
//! |---|---|---|
//! | checkbox, radio | `checked` as a JSON bool | truthiness of the value |
//! | text input, select, textarea | `value` as a JSON string | value rendered as text |
//! | anything else | rendered text as a JSON string | value rendered as text |
//!
//! "Rendered as text" means strings are written verbatim, `null` becomes the
//! empty string, and every other JSON value uses its compact JSON form
//! (`21`, `true`, `[1,2]`).

use core::fmt::Debug;
use core::hash::Hash;

use serde_json::Value;

/// How a control exposes its current value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Checkbox input: value is its checked state.
    Checkbox,
    /// Radio input: value is its checked state.
    Radio,
    /// Text-like input: value is its `value`.
    TextInput,
    /// Select: value is its selected `value`.
    Select,
    /// Textarea: value is its `value`.
    TextArea,
    /// Any other element: value is its rendered text.
    Other,
}

impl ControlKind {
    /// Whether the control's value is a checked state.
    pub fn is_toggle(self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }

    /// Whether the control's value is its `value` property.
    pub fn has_value(self) -> bool {
        matches!(self, Self::TextInput | Self::Select | Self::TextArea)
    }
}

/// A tree of nodes with parent links, scope owners, and readable/writable
/// controls.
///
/// The binding layer never touches a concrete UI toolkit; it only walks
/// parents, asks which nodes own a scope, and reads or writes controls through
/// this trait. [`Document`](crate::Document) is an in-memory implementation.
pub trait BindingHost {
    /// Small, copyable node handle.
    type Node: Copy + Eq + Hash + Debug + 'static;

    /// Parent of `node`, or `None` at a root or for a stale handle.
    fn parent_of(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Whether `node` establishes a binding scope.
    fn is_scope_owner(&self, node: &Self::Node) -> bool;

    /// The control bound to `field_id` inside the subtree of `scope`.
    fn find_control(&self, scope: &Self::Node, field_id: &str) -> Option<Self::Node>;

    /// How `node` exposes its value.
    fn control_kind(&self, node: &Self::Node) -> ControlKind;

    /// Checked state of a toggle control.
    fn checked(&self, node: &Self::Node) -> bool;

    /// Set the checked state of a toggle control.
    fn set_checked(&mut self, node: &Self::Node, checked: bool);

    /// The `value` property of a value-bearing control.
    fn value(&self, node: &Self::Node) -> String;

    /// Set the `value` property of a value-bearing control.
    fn set_value(&mut self, node: &Self::Node, value: &str);

    /// Rendered text of `node`.
    fn text(&self, node: &Self::Node) -> String;

    /// Replace the rendered text of `node`.
    fn set_text(&mut self, node: &Self::Node, text: &str);
}

/// Read the current value of a control.
pub fn read_control<H: BindingHost + ?Sized>(host: &H, node: &H::Node) -> Value {
    let kind = host.control_kind(node);
    if kind.is_toggle() {
        Value::Bool(host.checked(node))
    } else if kind.has_value() {
        Value::String(host.value(node))
    } else {
        Value::String(host.text(node))
    }
}

/// Write `value` onto a control; the inverse of [`read_control`].
pub fn write_control<H: BindingHost + ?Sized>(host: &mut H, node: &H::Node, value: &Value) {
    let kind = host.control_kind(node);
    if kind.is_toggle() {
        host.set_checked(node, truthy(value));
    } else if kind.has_value() {
        host.set_value(node, &render(value));
    } else {
        host.set_text(node, &render(value));
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
