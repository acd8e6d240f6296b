//! Virtual nodes: immutable descriptions of desired UI plus the mount-state
//! the engine records on them once they are materialized.

use std::fmt;

use indexmap::IndexMap;

use crate::component::Component;
use crate::fiber::Fiber;
use crate::host::{HostNodeId, ListenerId};
use crate::props::Props;

/// Mount-state carried by a node. Cloning a node yields an unmounted copy,
/// and mount-state never takes part in node equality.
#[derive(Default)]
pub(crate) struct Mounted<T: Default>(pub(crate) T);

impl<T: Default> Clone for Mounted<T> {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<T: Default> PartialEq for Mounted<T> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl<T: Default + fmt::Debug> fmt::Debug for Mounted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default, Debug)]
pub(crate) struct ElementMount {
    pub(crate) node: Option<HostNodeId>,
    pub(crate) listeners: IndexMap<String, ListenerId>,
}

#[derive(Default, Debug)]
pub(crate) struct ComponentMount {
    pub(crate) fiber: Option<Fiber>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextNode {
    pub value: String,
    pub(crate) mount: Mounted<Option<HostNodeId>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub props: Props,
    pub children: Vec<VNode>,
    pub(crate) mount: Mounted<ElementMount>,
}

/// Transparent group of siblings. Once mounted, the anchor is the host
/// node its children were inserted into.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentNode {
    pub children: Vec<VNode>,
    pub(crate) mount: Mounted<Option<HostNodeId>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComponentNode {
    pub component: Component,
    pub props: Props,
    pub children: Vec<VNode>,
    pub(crate) mount: Mounted<ComponentMount>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VNode {
    Text(TextNode),
    Element(ElementNode),
    Fragment(FragmentNode),
    Component(ComponentNode),
}

impl VNode {
    pub fn key(&self) -> Option<&str> {
        match self {
            VNode::Element(node) => node.props.key_value(),
            VNode::Component(node) => node.props.key_value(),
            VNode::Text(_) | VNode::Fragment(_) => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element(node) => &node.children,
            VNode::Fragment(node) => &node.children,
            VNode::Component(node) => &node.children,
            VNode::Text(_) => &[],
        }
    }

    /// Host node this vnode owns directly, if mounted. For components this
    /// is the first host node of the rendered tree; fragments own none.
    pub fn host_node(&self) -> Option<HostNodeId> {
        match self {
            VNode::Text(node) => node.mount.0,
            VNode::Element(node) => node.mount.0.node,
            VNode::Component(node) => node
                .mount
                .0
                .fiber
                .as_ref()
                .and_then(Fiber::first_host_node),
            VNode::Fragment(_) => None,
        }
    }

    /// Host nodes this vnode contributes to its parent, in order.
    pub fn host_nodes(&self) -> Vec<HostNodeId> {
        let mut nodes = Vec::new();
        self.collect_host_nodes(&mut nodes);
        nodes
    }

    fn collect_host_nodes(&self, out: &mut Vec<HostNodeId>) {
        match self {
            VNode::Text(node) => out.extend(node.mount.0),
            VNode::Element(node) => out.extend(node.mount.0.node),
            VNode::Fragment(node) => {
                for child in &node.children {
                    child.collect_host_nodes(out);
                }
            }
            VNode::Component(node) => {
                if let Some(fiber) = &node.mount.0.fiber {
                    out.extend(fiber.host_nodes());
                }
            }
        }
    }

    pub fn first_host_node(&self) -> Option<HostNodeId> {
        match self {
            VNode::Fragment(node) => node.children.iter().find_map(VNode::first_host_node),
            other => other.host_node(),
        }
    }

    /// Fragment anchor, if this is a mounted fragment.
    pub fn anchor(&self) -> Option<HostNodeId> {
        match self {
            VNode::Fragment(node) => node.mount.0,
            _ => None,
        }
    }

    /// Live fiber of a mounted component node.
    pub fn fiber(&self) -> Option<&Fiber> {
        match self {
            VNode::Component(node) => node.mount.0.fiber.as_ref(),
            _ => None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        match self {
            VNode::Fragment(node) => node.mount.0.is_some(),
            VNode::Component(node) => node.mount.0.fiber.is_some(),
            other => other.host_node().is_some(),
        }
    }
}

/// Whether `new` can be patched onto `old` in place.
///
/// Texts always can (their content is updated), elements need the same tag
/// and key, fragments always can, components need the same definition and
/// key. Different variants never match.
pub fn same_identity(old: &VNode, new: &VNode) -> bool {
    match (old, new) {
        (VNode::Text(_), VNode::Text(_)) => true,
        (VNode::Element(a), VNode::Element(b)) => {
            a.tag == b.tag && a.props.key_value() == b.props.key_value()
        }
        (VNode::Fragment(_), VNode::Fragment(_)) => true,
        (VNode::Component(a), VNode::Component(b)) => {
            a.component.ptr_eq(&b.component) && a.props.key_value() == b.props.key_value()
        }
        _ => false,
    }
}

/// Matching rule used when diffing child lists: like [`same_identity`],
/// except texts only match when their content is equal, so shifted text
/// siblings are kept instead of rewritten.
pub(crate) fn same_list_entry(old: &VNode, new: &VNode) -> bool {
    match (old, new) {
        (VNode::Text(a), VNode::Text(b)) => a.value == b.value,
        _ => same_identity(old, new),
    }
}

/// Flatten nested fragments into one list of their leaves. When `anchor`
/// is given, every fragment passed through is anchored to it.
pub(crate) fn flatten_children(
    children: &mut [VNode],
    anchor: Option<HostNodeId>,
) -> Vec<&mut VNode> {
    let mut flat = Vec::with_capacity(children.len());
    collect_leaves(children, anchor, &mut flat);
    flat
}

fn collect_leaves<'a>(
    children: &'a mut [VNode],
    anchor: Option<HostNodeId>,
    out: &mut Vec<&'a mut VNode>,
) {
    for child in children {
        match child {
            VNode::Fragment(fragment) => {
                if anchor.is_some() {
                    fragment.mount.0 = anchor;
                }
                collect_leaves(&mut fragment.children, anchor, out);
            }
            leaf => out.push(leaf),
        }
    }
}

/// One entry of a children list before normalization.
#[derive(Clone, Debug)]
pub enum Child {
    Node(VNode),
    Text(String),
    Empty,
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Child::Text(value.to_string())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Child::Text(value)
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

/// Normalized children list: strings became text nodes and empty entries
/// were dropped.
#[derive(Clone, Debug, Default)]
pub struct Children(Vec<VNode>);

impl Children {
    pub fn into_vec(self) -> Vec<VNode> {
        self.0
    }
}

impl FromIterator<Child> for Children {
    fn from_iter<I: IntoIterator<Item = Child>>(iter: I) -> Self {
        Children(
            iter.into_iter()
                .filter_map(|child| match child {
                    Child::Node(node) => Some(node),
                    Child::Text(value) => Some(text(value)),
                    Child::Empty => None,
                })
                .collect(),
        )
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::default()
    }
}

impl From<VNode> for Children {
    fn from(node: VNode) -> Self {
        Children(vec![node])
    }
}

impl From<&str> for Children {
    fn from(value: &str) -> Self {
        Children(vec![text(value)])
    }
}

impl From<String> for Children {
    fn from(value: String) -> Self {
        Children(vec![text(value)])
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children(nodes)
    }
}

impl<const N: usize> From<[VNode; N]> for Children {
    fn from(nodes: [VNode; N]) -> Self {
        Children(nodes.into())
    }
}

impl<const N: usize> From<[&str; N]> for Children {
    fn from(values: [&str; N]) -> Self {
        Children(values.iter().map(|value| text(*value)).collect())
    }
}

impl<const N: usize> From<[Child; N]> for Children {
    fn from(children: [Child; N]) -> Self {
        children.into_iter().collect()
    }
}

impl From<Vec<Child>> for Children {
    fn from(children: Vec<Child>) -> Self {
        children.into_iter().collect()
    }
}

impl From<Vec<Option<VNode>>> for Children {
    fn from(children: Vec<Option<VNode>>) -> Self {
        Children(children.into_iter().flatten().collect())
    }
}

pub fn text(value: impl Into<String>) -> VNode {
    VNode::Text(TextNode {
        value: value.into(),
        mount: Mounted::default(),
    })
}

/// Element node. Panics on an empty tag.
pub fn element(tag: impl Into<String>, props: Props, children: impl Into<Children>) -> VNode {
    let tag = tag.into();
    assert!(!tag.is_empty(), "element tag must not be empty");
    VNode::Element(ElementNode {
        tag,
        props,
        children: children.into().into_vec(),
        mount: Mounted::default(),
    })
}

pub fn fragment(children: impl Into<Children>) -> VNode {
    VNode::Fragment(FragmentNode {
        children: children.into().into_vec(),
        mount: Mounted::default(),
    })
}

/// Component node. Event handlers in `props` become the subscriptions the
/// component's `emit` reaches; the other attributes are its props; the
/// children are its slot.
pub fn component(def: &Component, props: Props, children: impl Into<Children>) -> VNode {
    VNode::Component(ComponentNode {
        component: def.clone(),
        props,
        children: children.into().into_vec(),
        mount: Mounted::default(),
    })
}
