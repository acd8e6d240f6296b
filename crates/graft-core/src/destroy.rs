//! Tears down mounted virtual nodes.

use crate::events::remove_listeners;
use crate::host::Host;
use crate::scheduler::Scheduler;
use crate::vnode::VNode;
use crate::ReconcileError;

/// Remove the host representation of `vnode` and clear its mount-state.
/// Destroying a node that was never mounted does nothing.
pub(crate) fn destroy_node(
    host: &mut dyn Host,
    scheduler: &Scheduler,
    vnode: &mut VNode,
) -> Result<(), ReconcileError> {
    match vnode {
        VNode::Text(node) => {
            if let Some(id) = node.mount.0.take() {
                host.remove(id)?;
            }
        }
        VNode::Element(node) => {
            for child in &mut node.children {
                destroy_node(host, scheduler, child)?;
            }
            let mount = std::mem::take(&mut node.mount.0);
            if let Some(id) = mount.node {
                remove_listeners(host, id, &mount.listeners)?;
                host.remove(id)?;
            }
        }
        VNode::Fragment(node) => {
            for child in &mut node.children {
                destroy_node(host, scheduler, child)?;
            }
            node.mount.0 = None;
        }
        VNode::Component(node) => {
            let mount = std::mem::take(&mut node.mount.0);
            if let Some(fiber) = mount.fiber {
                fiber.unmount(host)?;
                scheduler.enqueue(move |host| fiber.did_unmount(host));
            }
        }
    }
    Ok(())
}
