//! Host positions derived from neighbouring host nodes.
//!
//! Components and fragments can present zero or many host nodes, so a
//! position in a virtual child list says nothing about a position in the
//! host parent. Instead, every run of host nodes is placed right after its
//! [`Lead`]: the last host node of whatever precedes it.

use crate::fiber::{Fiber, WeakFiber};
use crate::host::{Host, HostNodeId};
use crate::vnode::VNode;
use crate::ReconcileError;

/// What precedes a run of host nodes in their host parent.
#[derive(Clone, Debug)]
pub(crate) enum Lead {
    /// Nothing; the run starts the parent's child list.
    Start,
    Node(HostNodeId),
    /// Whatever a sibling component presents, or its own lead while it
    /// presents nothing.
    After(WeakFiber),
    /// Whatever precedes an enclosing component.
    Inherit(WeakFiber),
}

impl Lead {
    /// Host node the run follows, `None` at the start of the parent.
    pub(crate) fn resolve(&self) -> Option<HostNodeId> {
        match self {
            Lead::Start => None,
            Lead::Node(node) => Some(*node),
            Lead::After(fiber) => fiber.upgrade().and_then(|fiber| {
                fiber
                    .host_nodes()
                    .last()
                    .copied()
                    .or_else(|| fiber.lead().resolve())
            }),
            Lead::Inherit(fiber) => fiber.upgrade().and_then(|fiber| fiber.lead().resolve()),
        }
    }

    /// Lead of whatever gets inserted at child position `index` of
    /// `parent`, or appended when `index` is `None`.
    pub(crate) fn at_index(
        host: &dyn Host,
        parent: HostNodeId,
        index: Option<usize>,
    ) -> Result<Self, ReconcileError> {
        let children = host.children(parent)?;
        let end = index.map_or(children.len(), |index| index.min(children.len()));
        Ok(end
            .checked_sub(1)
            .map_or(Lead::Start, |previous| Lead::Node(children[previous])))
    }

    /// Child position of `parent` right after the lead. A lead node that
    /// left the parent places the run at the end.
    pub(crate) fn insertion_index(
        &self,
        host: &dyn Host,
        parent: HostNodeId,
    ) -> Result<usize, ReconcileError> {
        let Some(node) = self.resolve() else {
            return Ok(0);
        };
        match host.index_of(parent, node)? {
            Some(index) => Ok(index + 1),
            None => {
                log::debug!("lead {node} is not a child of host node {parent}; appending");
                Ok(host.children(parent)?.len())
            }
        }
    }
}

/// Lead of entry `index` in a flattened child list whose earlier entries
/// are already in place.
pub(crate) fn lead_before(entries: &[&mut VNode], index: usize, list: &Lead) -> Lead {
    for entry in entries[..index].iter().rev() {
        if let Some(fiber) = entry.fiber() {
            return Lead::After(fiber.downgrade());
        }
        if let Some(node) = entry.host_node() {
            return Lead::Node(node);
        }
    }
    list.clone()
}

/// Hand every component in `children`, fragments looked through, the lead
/// it sits behind. Returns the lead of whatever follows the list.
pub(crate) fn assign_leads(children: &[VNode], lead: Lead) -> Lead {
    let mut lead = lead;
    for child in children {
        lead = match child {
            VNode::Fragment(fragment) => assign_leads(&fragment.children, lead),
            VNode::Component(_) => match child.fiber() {
                Some(fiber) => follow(fiber, lead),
                None => lead,
            },
            other => other.host_node().map_or(lead, Lead::Node),
        };
    }
    lead
}

fn follow(fiber: &Fiber, lead: Lead) -> Lead {
    fiber.set_lead(lead);
    Lead::After(fiber.downgrade())
}
