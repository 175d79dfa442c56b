// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory element tree implementing [`BindingHost`].

use hashbrown::HashMap;

use crate::host::{BindingHost, ControlKind};

/// Identifier for a node in the document (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(u32, u32);

impl NodeId {
    const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Per-element state flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ElementFlags: u8 {
        /// Element establishes a binding scope for its subtree.
        const SCOPE_OWNER = 0b0000_0001;
        /// Toggle control is checked.
        const CHECKED     = 0b0000_0010;
    }
}

/// An element: tag, attributes, and control state.
#[derive(Clone, Debug, Default)]
pub struct Element {
    /// Lower-case tag name.
    pub tag: String,
    /// Attribute map.
    pub attributes: HashMap<String, String>,
    /// The `value` property of value-bearing controls.
    pub value: String,
    /// Rendered text.
    pub text: String,
    /// State flags.
    pub flags: ElementFlags,
}

impl Element {
    /// Create an element with the given tag.
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Set an attribute.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Set the `value` property.
    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_owned();
        self
    }

    /// Set the rendered text.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_owned();
        self
    }

    /// Set the checked state.
    pub fn with_checked(mut self, checked: bool) -> Self {
        self.flags.set(ElementFlags::CHECKED, checked);
        self
    }

    /// Mark the element as a scope owner.
    pub fn scope_owner(mut self) -> Self {
        self.flags |= ElementFlags::SCOPE_OWNER;
        self
    }

    /// Attribute value, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    /// Classify the element as a control.
    pub fn control_kind(&self) -> ControlKind {
        match self.tag.as_str() {
            "input" => match self.attribute("type") {
                Some(t) if t.eq_ignore_ascii_case("checkbox") => ControlKind::Checkbox,
                Some(t) if t.eq_ignore_ascii_case("radio") => ControlKind::Radio,
                _ => ControlKind::TextInput,
            },
            "select" => ControlKind::Select,
            "textarea" => ControlKind::TextArea,
            _ => ControlKind::Other,
        }
    }
}

#[derive(Clone, Debug)]
struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    element: Element,
}

/// A tree of [`Element`]s addressed by generational [`NodeId`]s.
///
/// ## Example
///
/// ```rust
/// use understory_binding::{BindingHost, Document, Element};
///
/// let mut doc = Document::new();
/// let form = doc.insert(None, Element::new("form").scope_owner());
/// let input = doc.insert(Some(form), Element::new("input").with_attribute("id", "name"));
///
/// assert_eq!(doc.parent_of(&input), Some(form));
/// assert!(doc.is_scope_owner(&form));
/// assert_eq!(doc.find_control(&form, "name"), Some(input));
///
/// doc.remove(form);
/// assert!(!doc.is_alive(input));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Document {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `element` as the last child of `parent` (or as a root if `None`).
    ///
    /// A stale `parent` inserts the element as a root.
    pub fn insert(&mut self, parent: Option<NodeId>, element: Element) -> NodeId {
        let node = |generation| Node {
            generation,
            parent: None,
            children: Vec::new(),
            element,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(node(generation));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(node(generation)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        if let Some(p) = parent
            && self.is_alive(p)
        {
            self.link_parent(id, p);
        }
        id
    }

    /// Remove a node and its subtree. Stale ids are ignored.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).and_then(|n| n.parent) {
            self.unlink_parent(id, parent);
        }
        for child in self.children_of(id).to_vec() {
            self.remove(child);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Whether `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Children of a live node, in insertion order.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Element of a live node.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id).map(|n| &n.element)
    }

    /// Mutable element of a live node.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.node_mut(id).map(|n| &mut n.element)
    }

    /// Attribute of a live node.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    /// Set an attribute on a live node and return the previous value.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Option<String> {
        self.element_mut(id)?
            .attributes
            .insert(name.to_owned(), value.to_owned())
    }

    /// Replace the flags of a live node.
    pub fn set_flags(&mut self, id: NodeId, flags: ElementFlags) {
        if let Some(el) = self.element_mut(id) {
            el.flags = flags;
        }
    }

    /// Live nodes of the subtree rooted at `root`, in depth-first pre-order
    /// (`root` first).
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(root) {
            return out;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            // Reverse so children are visited in insertion order.
            stack.extend(self.children_of(id).iter().rev().copied());
        }
        out
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = Some(parent);
        }
    }

    fn unlink_parent(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = None;
        }
    }
}

impl BindingHost for Document {
    type Node = NodeId;

    fn parent_of(&self, node: &NodeId) -> Option<NodeId> {
        self.node(*node)?.parent
    }

    fn is_scope_owner(&self, node: &NodeId) -> bool {
        self.element(*node)
            .is_some_and(|el| el.flags.contains(ElementFlags::SCOPE_OWNER))
    }

    fn find_control(&self, scope: &NodeId, field_id: &str) -> Option<NodeId> {
        self.descendants(*scope)
            .into_iter()
            .find(|id| self.element(*id).and_then(Element::id) == Some(field_id))
    }

    fn control_kind(&self, node: &NodeId) -> ControlKind {
        self.element(*node)
            .map_or(ControlKind::Other, Element::control_kind)
    }

    fn checked(&self, node: &NodeId) -> bool {
        self.element(*node)
            .is_some_and(|el| el.flags.contains(ElementFlags::CHECKED))
    }

    fn set_checked(&mut self, node: &NodeId, checked: bool) {
        if let Some(el) = self.element_mut(*node) {
            el.flags.set(ElementFlags::CHECKED, checked);
        }
    }

    fn value(&self, node: &NodeId) -> String {
        self.element(*node)
            .map(|el| el.value.clone())
            .unwrap_or_default()
    }

    fn set_value(&mut self, node: &NodeId, value: &str) {
        if let Some(el) = self.element_mut(*node) {
            value.clone_into(&mut el.value);
        }
    }

    fn text(&self, node: &NodeId) -> String {
        self.element(*node)
            .map(|el| el.text.clone())
            .unwrap_or_default()
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        if let Some(el) = self.element_mut(*node) {
            text.clone_into(&mut el.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{read_control, write_control};
    use serde_json::json;

    #[test]
    fn liveness_insert_remove_reuse() {
        let mut doc = Document::new();
        let root = doc.insert(None, Element::new("div"));
        let child = doc.insert(Some(root), Element::new("span"));
        assert!(doc.is_alive(child));
        doc.remove(child);
        assert!(!doc.is_alive(child));
        assert!(doc.children_of(root).is_empty());

        // Slot reuse bumps the generation; the old id stays stale.
        let reused = doc.insert(Some(root), Element::new("span"));
        assert_eq!(reused.0, child.0);
        assert_ne!(reused, child);
        assert!(!doc.is_alive(child));
        assert_eq!(doc.parent_of(&child), None);
        assert_eq!(doc.parent_of(&reused), Some(root));
    }

    #[test]
    fn remove_drops_subtree() {
        let mut doc = Document::new();
        let root = doc.insert(None, Element::new("div"));
        let a = doc.insert(Some(root), Element::new("div"));
        let b = doc.insert(Some(a), Element::new("div"));
        doc.remove(a);
        assert!(doc.is_alive(root));
        assert!(!doc.is_alive(a));
        assert!(!doc.is_alive(b));
    }

    #[test]
    fn descendants_are_pre_order() {
        let mut doc = Document::new();
        let root = doc.insert(None, Element::new("div"));
        let a = doc.insert(Some(root), Element::new("div"));
        let a1 = doc.insert(Some(a), Element::new("div"));
        let b = doc.insert(Some(root), Element::new("div"));
        assert_eq!(doc.descendants(root), vec![root, a, a1, b]);
        assert_eq!(doc.descendants(a), vec![a, a1]);
    }

    #[test]
    fn control_kinds_follow_tag_and_type() {
        let kind = |el: Element| el.control_kind();
        assert_eq!(kind(Element::new("input")), ControlKind::TextInput);
        assert_eq!(
            kind(Element::new("INPUT").with_attribute("type", "Checkbox")),
            ControlKind::Checkbox
        );
        assert_eq!(
            kind(Element::new("input").with_attribute("type", "radio")),
            ControlKind::Radio
        );
        assert_eq!(kind(Element::new("select")), ControlKind::Select);
        assert_eq!(kind(Element::new("textarea")), ControlKind::TextArea);
        assert_eq!(kind(Element::new("span")), ControlKind::Other);
    }

    #[test]
    fn read_and_write_controls() {
        let mut doc = Document::new();
        let text = doc.insert(None, Element::new("input").with_value("Ada"));
        let check = doc.insert(
            None,
            Element::new("input")
                .with_attribute("type", "checkbox")
                .with_checked(true),
        );
        let label = doc.insert(None, Element::new("span").with_text("hello"));

        assert_eq!(read_control(&doc, &text), json!("Ada"));
        assert_eq!(read_control(&doc, &check), json!(true));
        assert_eq!(read_control(&doc, &label), json!("hello"));

        write_control(&mut doc, &text, &json!(21));
        write_control(&mut doc, &check, &json!(false));
        write_control(&mut doc, &label, &json!("bye"));
        assert_eq!(doc.value(&text), "21");
        assert!(!doc.checked(&check));
        assert_eq!(doc.text(&label), "bye");
    }

    #[test]
    fn find_control_is_limited_to_subtree() {
        let mut doc = Document::new();
        let outer = doc.insert(None, Element::new("div"));
        let form = doc.insert(Some(outer), Element::new("form"));
        let inside = doc.insert(Some(form), Element::new("input").with_attribute("id", "a"));
        let _outside = doc.insert(Some(outer), Element::new("input").with_attribute("id", "b"));
        assert_eq!(doc.find_control(&form, "a"), Some(inside));
        assert_eq!(doc.find_control(&form, "b"), None);
    }
}
