//! Materializes virtual nodes into the host tree.

use crate::events::attach_listeners;
use crate::fiber::Fiber;
use crate::host::{Host, HostNodeId};
use crate::lead::{assign_leads, Lead};
use crate::props::apply_props;
use crate::scheduler::Scheduler;
use crate::vnode::{ComponentMount, ComponentNode, ElementMount, ElementNode, FragmentNode, VNode};
use crate::ReconcileError;

/// Create the host representation of `vnode` under `parent`, at child
/// position `index` or appended when `index` is `None`, and record the
/// mount-state on the node. `owner` is the fiber whose render output the
/// node belongs to.
pub(crate) fn mount_node(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    vnode: &mut VNode,
    parent: HostNodeId,
    index: Option<usize>,
    owner: Option<&Fiber>,
) -> Result<(), ReconcileError> {
    match vnode {
        VNode::Text(node) => {
            let id = host.create_text(&node.value);
            host.insert_at(parent, id, index)?;
            node.mount.0 = Some(id);
            Ok(())
        }
        VNode::Element(node) => mount_element(host, scheduler, node, parent, index, owner),
        VNode::Fragment(node) => mount_fragment(host, scheduler, node, parent, index, owner),
        VNode::Component(node) => mount_component(host, scheduler, node, parent, index, owner),
    }
}

fn mount_element(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    node: &mut ElementNode,
    parent: HostNodeId,
    index: Option<usize>,
    owner: Option<&Fiber>,
) -> Result<(), ReconcileError> {
    let id = host.create_element(&node.tag);
    let listeners = attach_listeners(host, id, node.props.events(), owner)?;
    apply_props(host, id, &node.props)?;
    node.mount.0 = ElementMount {
        node: Some(id),
        listeners,
    };
    for child in &mut node.children {
        mount_node(host, scheduler, child, id, None, owner)?;
    }
    assign_leads(&node.children, Lead::Start);
    host.insert_at(parent, id, index)?;
    Ok(())
}

fn mount_fragment(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    node: &mut FragmentNode,
    parent: HostNodeId,
    index: Option<usize>,
    owner: Option<&Fiber>,
) -> Result<(), ReconcileError> {
    // Fails on a missing parent even when there are no children to insert.
    host.children(parent)?;
    node.mount.0 = Some(parent);
    let mut cursor = index;
    for child in &mut node.children {
        mount_node(host, scheduler, child, parent, cursor, owner)?;
        if let Some(position) = cursor.as_mut() {
            *position += child.host_nodes().len();
        }
    }
    Ok(())
}

fn mount_component(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    node: &mut ComponentNode,
    parent: HostNodeId,
    index: Option<usize>,
    owner: Option<&Fiber>,
) -> Result<(), ReconcileError> {
    let fiber = Fiber::new(
        node.component.clone(),
        node.props.to_object(),
        node.props.events().clone(),
        node.children.clone(),
        owner,
        scheduler.clone(),
    );
    fiber.mount(host, parent, index)?;
    node.mount.0 = ComponentMount {
        fiber: Some(fiber.clone()),
    };
    scheduler.enqueue(move |host| fiber.did_mount(host));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostError, MemoryHost};
    use crate::props::Props;
    use crate::vnode::{element, fragment, text};
    use serde_json::json;

    #[test]
    fn element_subtree_is_built_before_insertion() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let scheduler = Scheduler::default();
        let mut tree = element(
            "div",
            Props::new().attr("id", "x").class("a b"),
            [element("span", Props::new(), "hi"), text("tail")],
        );

        mount_node(&mut host, &scheduler, &mut tree, root, None, None).expect("mount");

        assert_eq!(
            host.dump_tree(root),
            "<root>\n  <div id=\"x\" class=\"a b\">\n    <span>\n      \"hi\"\n    \"tail\"\n"
        );
        let div = tree.host_node().expect("mounted");
        assert_eq!(host.parent_of(div), Some(root));
        assert!(tree.children().iter().all(VNode::is_mounted));
    }

    #[test]
    fn fragment_children_land_at_consecutive_positions() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let scheduler = Scheduler::default();
        let mut before = text("first");
        let mut after = text("last");
        mount_node(&mut host, &scheduler, &mut before, root, None, None).expect("mount");
        mount_node(&mut host, &scheduler, &mut after, root, None, None).expect("mount");

        let mut group = fragment(vec![text("a"), fragment(["b", "c"]), text("d")]);
        mount_node(&mut host, &scheduler, &mut group, root, Some(1), None).expect("mount");

        assert_eq!(host.text_content(root), "firstabcdlast");
        assert_eq!(group.anchor(), Some(root));
        assert_eq!(group.host_nodes().len(), 4);
    }

    #[test]
    fn missing_parent_is_an_error() {
        let mut host = MemoryHost::new();
        let scheduler = Scheduler::default();
        let mut tree = fragment(());
        let result = mount_node(&mut host, &scheduler, &mut tree, 42, None, None);
        assert_eq!(
            result,
            Err(ReconcileError::Host(HostError::Missing { id: 42 }))
        );
    }

    #[test]
    fn null_attributes_are_not_written() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let scheduler = Scheduler::default();
        let mut tree = element(
            "input",
            Props::new()
                .attr("value", json!(3))
                .attr("placeholder", serde_json::Value::Null),
            (),
        );
        mount_node(&mut host, &scheduler, &mut tree, root, None, None).expect("mount");

        let input = host.element(tree.host_node().expect("mounted")).expect("element");
        assert_eq!(input.attributes.len(), 1);
        assert_eq!(input.attributes.get("value").map(String::as_str), Some("3"));
    }
}
