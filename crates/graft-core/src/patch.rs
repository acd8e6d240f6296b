//! Transforms a mounted virtual tree into a new one in place.

use crate::array_diff::{diff_sequences, ArrayDiffOp};
use crate::destroy::destroy_node;
use crate::events::patch_listeners;
use crate::fiber::Fiber;
use crate::host::{Host, HostNodeId};
use crate::lead::{assign_leads, lead_before, Lead};
use crate::mount::mount_node;
use crate::props::patch_props;
use crate::scheduler::Scheduler;
use crate::vnode::{
    flatten_children, same_identity, same_list_entry, ComponentMount, ComponentNode, ElementMount,
    ElementNode, TextNode, VNode,
};
use crate::ReconcileError;

/// Patch the mounted `old` into `new` under `parent`. Afterwards `new`
/// carries the mount-state and `old` is spent. `owner` is the fiber whose
/// render output is being patched, `lead` whatever precedes the node's host
/// nodes in `parent`.
///
/// Mount-state moves over before each fallible host call, so after an
/// error every host node is still reachable from exactly one of the trees.
pub(crate) fn patch_node(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    old: &mut VNode,
    new: &mut VNode,
    parent: HostNodeId,
    owner: Option<&Fiber>,
    lead: &Lead,
) -> Result<(), ReconcileError> {
    let same = same_identity(old, new);
    match (old, new) {
        (VNode::Text(old), VNode::Text(new)) => patch_text(host, old, new),
        (VNode::Element(old), VNode::Element(new)) if same => {
            patch_element(host, scheduler, old, new, owner)
        }
        (VNode::Fragment(old), VNode::Fragment(new)) => {
            new.mount.0 = old.mount.0.take().or(Some(parent));
            patch_children(
                host,
                scheduler,
                &mut old.children,
                &mut new.children,
                parent,
                owner,
                lead,
            )
        }
        (VNode::Component(old), VNode::Component(new)) if same => {
            patch_component(host, old, new, lead)
        }
        (old, new) => replace(host, scheduler, old, new, parent, owner, lead),
    }
}

/// Destroy `old` and mount `new` right after `lead`.
fn replace(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    old: &mut VNode,
    new: &mut VNode,
    parent: HostNodeId,
    owner: Option<&Fiber>,
    lead: &Lead,
) -> Result<(), ReconcileError> {
    let position = lead.insertion_index(host, parent)?;
    log::trace!("replacing node at {position} in host node {parent}");
    destroy_node(host, scheduler, old)?;
    mount_node(host, scheduler, new, parent, Some(position), owner)?;
    assign_leads(std::slice::from_ref(new), lead.clone());
    Ok(())
}

fn patch_text(
    host: &mut dyn Host,
    old: &mut TextNode,
    new: &mut TextNode,
) -> Result<(), ReconcileError> {
    let id = old
        .mount
        .0
        .take()
        .ok_or(ReconcileError::NodeNotMounted { kind: "text" })?;
    new.mount.0 = Some(id);
    if old.value != new.value {
        host.set_text(id, &new.value)?;
    }
    Ok(())
}

fn patch_element(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    old: &mut ElementNode,
    new: &mut ElementNode,
    owner: Option<&Fiber>,
) -> Result<(), ReconcileError> {
    let mount = std::mem::take(&mut old.mount.0);
    let id = mount
        .node
        .ok_or(ReconcileError::NodeNotMounted { kind: "element" })?;
    new.mount.0 = ElementMount {
        node: Some(id),
        listeners: mount.listeners,
    };
    patch_props(host, id, &old.props, &new.props)?;
    let listeners = std::mem::take(&mut new.mount.0.listeners);
    new.mount.0.listeners = patch_listeners(
        host,
        id,
        listeners,
        old.props.events(),
        new.props.events(),
        owner,
    )?;
    patch_children(
        host,
        scheduler,
        &mut old.children,
        &mut new.children,
        id,
        owner,
        &Lead::Start,
    )
}

fn patch_component(
    host: &mut dyn Host,
    old: &mut ComponentNode,
    new: &mut ComponentNode,
    lead: &Lead,
) -> Result<(), ReconcileError> {
    let mount = std::mem::take(&mut old.mount.0);
    let fiber = mount
        .fiber
        .ok_or(ReconcileError::NodeNotMounted { kind: "component" })?;
    fiber.set_lead(lead.clone());
    new.mount.0 = ComponentMount {
        fiber: Some(fiber.clone()),
    };
    fiber.update(host, new.props.to_object(), Some(new.children.clone()))
}

/// Reconcile two child lists of `parent`, fragments flattened away. Each
/// entry is placed after the host nodes of the entries before it, or after
/// `lead` when none of them present any.
fn patch_children(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    old_children: &mut [VNode],
    new_children: &mut [VNode],
    parent: HostNodeId,
    owner: Option<&Fiber>,
    lead: &Lead,
) -> Result<(), ReconcileError> {
    let mut old = flatten_children(old_children, None);
    let mut new = flatten_children(new_children, Some(parent));
    let ops = diff_sequences(&old, &new, |a, b| same_list_entry(a, b));

    for op in ops {
        log::trace!("host node {parent}: {op:?}");
        match op {
            ArrayDiffOp::Add { index } => {
                let entry_lead = lead_before(&new, index, lead);
                let position = entry_lead.insertion_index(host, parent)?;
                mount_node(host, scheduler, &mut *new[index], parent, Some(position), owner)?;
                assign_leads(std::slice::from_ref(&*new[index]), entry_lead);
            }
            ArrayDiffOp::Remove { original_index, .. } => {
                destroy_node(host, scheduler, &mut *old[original_index])?
            }
            ArrayDiffOp::Move {
                original_index,
                index,
                ..
            } => {
                let entry_lead = lead_before(&new, index, lead);
                let moved = old[original_index].host_nodes();
                let position = entry_lead.insertion_index(host, parent)?;
                let before = host.children(parent)?.get(position).copied();
                // Already in place when the target slot holds one of its nodes.
                if !before.is_some_and(|node| moved.contains(&node)) {
                    for node in moved {
                        host.insert_before(parent, node, before)?;
                    }
                }
                patch_node(
                    host,
                    scheduler,
                    &mut *old[original_index],
                    &mut *new[index],
                    parent,
                    owner,
                    &entry_lead,
                )?;
            }
            ArrayDiffOp::Noop {
                original_index,
                index,
            } => {
                let entry_lead = lead_before(&new, index, lead);
                patch_node(
                    host,
                    scheduler,
                    &mut *old[original_index],
                    &mut *new[index],
                    parent,
                    owner,
                    &entry_lead,
                )?
            }
        }
    }
    Ok(())
}
