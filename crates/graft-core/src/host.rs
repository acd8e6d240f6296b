//! Host capability layer.
//!
//! The engine never touches a concrete presentation tree. Everything it
//! needs from the platform goes through [`Host`]: creating text and element
//! nodes, setting attributes/classes/styles, wiring platform listeners and
//! inserting/removing nodes. [`MemoryHost`] is an arena-backed
//! implementation used by tests and headless drivers.

use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::ReconcileError;

pub type HostNodeId = usize;

/// Opaque handle returned when a platform listener is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback attached to a host node for one platform event name.
///
/// The host invokes it with itself, so the listener can drive further
/// reconciliation (for example a component `set_state`).
pub type HostListener = Rc<dyn Fn(&mut dyn Host, &Value) -> Result<(), ReconcileError>>;

pub fn host_listener(
    f: impl Fn(&mut dyn Host, &Value) -> Result<(), ReconcileError> + 'static,
) -> HostListener {
    Rc::new(f)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Missing { id: HostNodeId },
    NotAChild { parent: HostNodeId, child: HostNodeId },
    KindMismatch { id: HostNodeId, expected: &'static str },
    UnknownListener { id: HostNodeId, listener: ListenerId },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { id } => write!(f, "host node {id} missing"),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::KindMismatch { id, expected } => {
                write!(f, "host node {id} kind mismatch; expected {expected}")
            }
            HostError::UnknownListener { id, listener } => {
                write!(f, "listener {} not attached to host node {id}", listener.0)
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Primitive operations the engine requires from a presentation platform.
pub trait Host {
    fn create_text(&mut self, text: &str) -> HostNodeId;
    fn create_element(&mut self, tag: &str) -> HostNodeId;
    fn set_text(&mut self, node: HostNodeId, text: &str) -> Result<(), HostError>;

    fn set_attribute(&mut self, node: HostNodeId, name: &str, value: &str)
        -> Result<(), HostError>;
    fn remove_attribute(&mut self, node: HostNodeId, name: &str) -> Result<(), HostError>;
    fn add_class(&mut self, node: HostNodeId, class: &str) -> Result<(), HostError>;
    fn remove_class(&mut self, node: HostNodeId, class: &str) -> Result<(), HostError>;
    fn set_style(&mut self, node: HostNodeId, property: &str, value: &str)
        -> Result<(), HostError>;
    fn remove_style(&mut self, node: HostNodeId, property: &str) -> Result<(), HostError>;

    fn add_listener(
        &mut self,
        node: HostNodeId,
        event: &str,
        listener: HostListener,
    ) -> Result<ListenerId, HostError>;
    fn remove_listener(&mut self, node: HostNodeId, listener: ListenerId)
        -> Result<(), HostError>;

    /// Insert `child` into `parent` before `before`, or at the end when
    /// `before` is `None`. A child that is already attached somewhere is
    /// detached first, which is how nodes are moved.
    fn insert_before(
        &mut self,
        parent: HostNodeId,
        child: HostNodeId,
        before: Option<HostNodeId>,
    ) -> Result<(), HostError>;

    /// Detach `node` from its parent and release it.
    fn remove(&mut self, node: HostNodeId) -> Result<(), HostError>;

    fn children(&self, parent: HostNodeId) -> Result<Vec<HostNodeId>, HostError>;

    fn index_of(&self, parent: HostNodeId, child: HostNodeId) -> Result<Option<usize>, HostError> {
        Ok(self.children(parent)?.iter().position(|&c| c == child))
    }

    /// Insert at a child position, appending when `index` is absent or past
    /// the end of the parent's children.
    fn insert_at(
        &mut self,
        parent: HostNodeId,
        child: HostNodeId,
        index: Option<usize>,
    ) -> Result<(), HostError> {
        let before = match index {
            Some(index) => self.children(parent)?.get(index).copied(),
            None => None,
        };
        self.insert_before(parent, child, before)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNodeKind {
    Text(String),
    Element(HostElement),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostElement {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub classes: IndexSet<String>,
    pub styles: IndexMap<String, String>,
}

/// A mutation applied to a [`MemoryHost`], in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateText { node: HostNodeId, text: String },
    CreateElement { node: HostNodeId, tag: String },
    SetText { node: HostNodeId, text: String },
    SetAttribute { node: HostNodeId, name: String, value: String },
    RemoveAttribute { node: HostNodeId, name: String },
    AddClass { node: HostNodeId, class: String },
    RemoveClass { node: HostNodeId, class: String },
    SetStyle { node: HostNodeId, property: String, value: String },
    RemoveStyle { node: HostNodeId, property: String },
    AddListener { node: HostNodeId, event: String },
    RemoveListener { node: HostNodeId, event: String },
    Insert { parent: HostNodeId, child: HostNodeId, before: Option<HostNodeId> },
    Remove { node: HostNodeId },
}

impl HostOp {
    /// Whether the operation changes an already existing node or the shape
    /// of the tree, as opposed to creating a detached node.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostOp::CreateText { .. } | HostOp::CreateElement { .. })
    }
}

struct AttachedListener {
    id: ListenerId,
    event: String,
    listener: HostListener,
}

struct HostNode {
    kind: HostNodeKind,
    parent: Option<HostNodeId>,
    children: Vec<HostNodeId>,
    listeners: Vec<AttachedListener>,
}

impl HostNode {
    fn new(kind: HostNodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<Option<HostNode>>,
    ops: Vec<HostOp>,
    next_listener: u64,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to mount trees into.
    pub fn create_root(&mut self) -> HostNodeId {
        self.create_element("root")
    }

    fn node(&self, id: HostNodeId) -> Result<&HostNode, HostError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(HostError::Missing { id })
    }

    fn node_mut(&mut self, id: HostNodeId) -> Result<&mut HostNode, HostError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(HostError::Missing { id })
    }

    fn element_mut(&mut self, id: HostNodeId) -> Result<&mut HostElement, HostError> {
        match &mut self.node_mut(id)?.kind {
            HostNodeKind::Element(element) => Ok(element),
            HostNodeKind::Text(_) => Err(HostError::KindMismatch {
                id,
                expected: "element",
            }),
        }
    }

    fn push_node(&mut self, kind: HostNodeKind) -> HostNodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(HostNode::new(kind)));
        id
    }

    pub fn contains(&self, id: HostNodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self, id: HostNodeId) -> Option<&HostNodeKind> {
        self.node(id).ok().map(|node| &node.kind)
    }

    pub fn element(&self, id: HostNodeId) -> Option<&HostElement> {
        match self.kind(id)? {
            HostNodeKind::Element(element) => Some(element),
            HostNodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: HostNodeId) -> Option<&str> {
        match self.kind(id)? {
            HostNodeKind::Text(text) => Some(text),
            HostNodeKind::Element(_) => None,
        }
    }

    pub fn parent_of(&self, id: HostNodeId) -> Option<HostNodeId> {
        self.node(id).ok().and_then(|node| node.parent)
    }

    pub fn listener_count(&self, id: HostNodeId) -> usize {
        self.node(id).map(|node| node.listeners.len()).unwrap_or(0)
    }

    /// Concatenated text of every text node below `id`, in tree order.
    pub fn text_content(&self, id: HostNodeId) -> String {
        let mut output = String::new();
        self.collect_text(id, &mut output);
        output
    }

    fn collect_text(&self, id: HostNodeId, output: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            HostNodeKind::Text(text) => output.push_str(text),
            HostNodeKind::Element(_) => {
                for &child in &node.children {
                    self.collect_text(child, output);
                }
            }
        }
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Fire a platform event at `node`, invoking every listener attached for
    /// `event` in attachment order. Returns how many listeners ran.
    pub fn dispatch_event(
        &mut self,
        node: HostNodeId,
        event: &str,
        payload: &Value,
    ) -> Result<usize, ReconcileError> {
        let listeners: Vec<HostListener> = self
            .node(node)?
            .listeners
            .iter()
            .filter(|attached| attached.event == event)
            .map(|attached| Rc::clone(&attached.listener))
            .collect();
        for listener in &listeners {
            listener(self, payload)?;
        }
        Ok(listeners.len())
    }

    /// Render the subtree rooted at `root` with one node per line.
    ///
    /// Attributes, classes and styles are sorted so that trees built through
    /// different mutation sequences dump identically.
    pub fn dump_tree(&self, root: HostNodeId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: HostNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Ok(node) = self.node(id) else {
            output.push_str(&format!("{indent}(missing #{id})\n"));
            return;
        };
        match &node.kind {
            HostNodeKind::Text(text) => output.push_str(&format!("{indent}{text:?}\n")),
            HostNodeKind::Element(element) => {
                output.push_str(&format!("{indent}<{}", element.tag));
                let mut attributes: Vec<_> = element.attributes.iter().collect();
                attributes.sort();
                for (name, value) in attributes {
                    output.push_str(&format!(" {name}={value:?}"));
                }
                if !element.classes.is_empty() {
                    let mut classes: Vec<_> = element.classes.iter().map(String::as_str).collect();
                    classes.sort_unstable();
                    output.push_str(&format!(" class={:?}", classes.join(" ")));
                }
                if !element.styles.is_empty() {
                    let mut styles: Vec<_> = element
                        .styles
                        .iter()
                        .map(|(property, value)| format!("{property}: {value}"))
                        .collect();
                    styles.sort();
                    output.push_str(&format!(" style={:?}", styles.join("; ")));
                }
                output.push_str(">\n");
                for &child in &node.children {
                    self.dump_node(output, child, depth + 1);
                }
            }
        }
    }

    fn detach(&mut self, child: HostNodeId) -> Result<(), HostError> {
        let Some(parent) = self.node_mut(child)?.parent.take() else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|&c| c != child);
        Ok(())
    }

    fn release(&mut self, id: HostNodeId) {
        let Some(node) = self.nodes.get_mut(id).and_then(Option::take) else {
            return;
        };
        for child in node.children {
            self.release(child);
        }
    }
}

impl Host for MemoryHost {
    fn create_text(&mut self, text: &str) -> HostNodeId {
        let node = self.push_node(HostNodeKind::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn create_element(&mut self, tag: &str) -> HostNodeId {
        let node = self.push_node(HostNodeKind::Element(HostElement {
            tag: tag.to_string(),
            ..HostElement::default()
        }));
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn set_text(&mut self, node: HostNodeId, text: &str) -> Result<(), HostError> {
        match &mut self.node_mut(node)?.kind {
            HostNodeKind::Text(current) => *current = text.to_string(),
            HostNodeKind::Element(_) => {
                return Err(HostError::KindMismatch {
                    id: node,
                    expected: "text",
                })
            }
        }
        self.ops.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
        Ok(())
    }

    fn set_attribute(&mut self, node: HostNodeId, name: &str, value: &str) -> Result<(), HostError> {
        self.element_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        self.ops.push(HostOp::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: HostNodeId, name: &str) -> Result<(), HostError> {
        self.element_mut(node)?.attributes.shift_remove(name);
        self.ops.push(HostOp::RemoveAttribute {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    fn add_class(&mut self, node: HostNodeId, class: &str) -> Result<(), HostError> {
        self.element_mut(node)?.classes.insert(class.to_string());
        self.ops.push(HostOp::AddClass {
            node,
            class: class.to_string(),
        });
        Ok(())
    }

    fn remove_class(&mut self, node: HostNodeId, class: &str) -> Result<(), HostError> {
        self.element_mut(node)?.classes.shift_remove(class);
        self.ops.push(HostOp::RemoveClass {
            node,
            class: class.to_string(),
        });
        Ok(())
    }

    fn set_style(&mut self, node: HostNodeId, property: &str, value: &str) -> Result<(), HostError> {
        self.element_mut(node)?
            .styles
            .insert(property.to_string(), value.to_string());
        self.ops.push(HostOp::SetStyle {
            node,
            property: property.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_style(&mut self, node: HostNodeId, property: &str) -> Result<(), HostError> {
        self.element_mut(node)?.styles.shift_remove(property);
        self.ops.push(HostOp::RemoveStyle {
            node,
            property: property.to_string(),
        });
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: HostNodeId,
        event: &str,
        listener: HostListener,
    ) -> Result<ListenerId, HostError> {
        self.element_mut(node)?;
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.node_mut(node)?.listeners.push(AttachedListener {
            id,
            event: event.to_string(),
            listener,
        });
        self.ops.push(HostOp::AddListener {
            node,
            event: event.to_string(),
        });
        Ok(id)
    }

    fn remove_listener(&mut self, node: HostNodeId, listener: ListenerId) -> Result<(), HostError> {
        let listeners = &mut self.node_mut(node)?.listeners;
        let index = listeners
            .iter()
            .position(|attached| attached.id == listener)
            .ok_or(HostError::UnknownListener { id: node, listener })?;
        let removed = listeners.remove(index);
        self.ops.push(HostOp::RemoveListener {
            node,
            event: removed.event,
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostNodeId,
        child: HostNodeId,
        before: Option<HostNodeId>,
    ) -> Result<(), HostError> {
        self.element_mut(parent)?;
        self.node(child)?;
        if before == Some(child) {
            return Ok(());
        }
        if let Some(before) = before {
            if self.node(before)?.parent != Some(parent) {
                return Err(HostError::NotAChild {
                    parent,
                    child: before,
                });
            }
        }
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let position = before
            .and_then(|before| siblings.iter().position(|&c| c == before))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        self.ops.push(HostOp::Insert {
            parent,
            child,
            before,
        });
        Ok(())
    }

    fn remove(&mut self, node: HostNodeId) -> Result<(), HostError> {
        self.detach(node)?;
        self.release(node);
        self.ops.push(HostOp::Remove { node });
        Ok(())
    }

    fn children(&self, parent: HostNodeId) -> Result<Vec<HostNodeId>, HostError> {
        Ok(self.node(parent)?.children.clone())
    }
}
