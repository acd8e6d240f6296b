#![doc = r"Reconciliation engine that keeps a host presentation tree in sync with a virtual tree."]
//!
//! A driver describes the desired UI as a [`VNode`] tree and hands it to a
//! [`Reconciler`], which materializes it through a [`Host`]. Later
//! descriptions are diffed against the live tree and only the required
//! host mutations are applied. Stateful [`Component`]s run as [`Fiber`]s
//! that re-render and patch their own subtree when their props or state
//! change.

pub mod array_diff;
pub mod collections;
mod component;
mod destroy;
pub mod dispatcher;
mod events;
mod fiber;
pub mod host;
mod lead;
mod mount;
mod patch;
pub mod platform;
mod props;
pub mod scheduler;
mod vnode;

pub use array_diff::{diff_sequences, ArrayDiffOp};
pub use component::{Component, ComponentBuilder, RenderScope};
pub use dispatcher::{action_handler, ActionHandler, AfterDispatchHook, Dispatcher, Subscription};
pub use events::{Handler, HandlerContext};
pub use fiber::{Fiber, FiberId, WeakFiber};
pub use host::{
    host_listener, Host, HostElement, HostError, HostListener, HostNodeId, HostNodeKind, HostOp,
    ListenerId, MemoryHost,
};
pub use platform::{DefaultScheduler, RuntimeScheduler};
pub use props::{ClassList, Props};
pub use scheduler::{Job, Scheduler};
pub use vnode::{
    component, element, fragment, same_identity, text, Child, Children, ComponentNode,
    ElementNode, FragmentNode, TextNode, VNode,
};

pub use serde_json::{json, Value};

use std::fmt;
use std::rc::Rc;

use lead::{assign_leads, Lead};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    Host(HostError),
    AlreadyMounted { component: &'static str },
    NotMounted { component: &'static str },
    NodeNotMounted { kind: &'static str },
    NoOwningFiber,
    UnknownMethod { component: &'static str, method: String },
    DuplicateMethod { component: &'static str, method: &'static str },
    NotAnObject { component: &'static str, field: &'static str },
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Host(err) => write!(f, "host error: {err}"),
            ReconcileError::AlreadyMounted { component } => {
                write!(f, "component {component} is already mounted")
            }
            ReconcileError::NotMounted { component } => {
                write!(f, "component {component} is not mounted")
            }
            ReconcileError::NodeNotMounted { kind } => {
                write!(f, "{kind} node has no host representation")
            }
            ReconcileError::NoOwningFiber => {
                write!(f, "handler requires an owning component but none is present")
            }
            ReconcileError::UnknownMethod { component, method } => {
                write!(f, "component {component} has no method {method}")
            }
            ReconcileError::DuplicateMethod { component, method } => {
                write!(f, "method {method} already exists in component {component}")
            }
            ReconcileError::NotAnObject { component, field } => {
                write!(f, "{field} of component {component} must be a JSON object")
            }
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for ReconcileError {
    fn from(err: HostError) -> Self {
        ReconcileError::Host(err)
    }
}

/// Identity comparison for shared callbacks, ignoring vtable metadata.
pub(crate) fn same_rc<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Driver owning a host and the scheduler its lifecycle callbacks run on.
pub struct Reconciler<H: Host> {
    host: H,
    scheduler: Scheduler,
}

impl<H: Host> Reconciler<H> {
    pub fn new(host: H) -> Self {
        Self::with_scheduler(host, Scheduler::default())
    }

    pub fn with_scheduler(host: H, scheduler: Scheduler) -> Self {
        Self { host, scheduler }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Materialize `vnode` as the last children of `root`.
    pub fn mount(&mut self, vnode: &mut VNode, root: HostNodeId) -> Result<(), ReconcileError> {
        self.mount_with(vnode, root, None)
    }

    /// Materialize `vnode` starting at child position `index` of `root`.
    pub fn mount_at(
        &mut self,
        vnode: &mut VNode,
        root: HostNodeId,
        index: usize,
    ) -> Result<(), ReconcileError> {
        self.mount_with(vnode, root, Some(index))
    }

    fn mount_with(
        &mut self,
        vnode: &mut VNode,
        root: HostNodeId,
        index: Option<usize>,
    ) -> Result<(), ReconcileError> {
        let lead = Lead::at_index(&self.host, root, index)?;
        mount::mount_node(&mut self.host, &self.scheduler, vnode, root, index, None)?;
        assign_leads(std::slice::from_ref(vnode), lead);
        Ok(())
    }

    /// Bring the host tree for `old` in line with `new` and return the live
    /// tree, which now carries the mount-state.
    ///
    /// On error both trees are destroyed before the error is returned, so
    /// the host keeps none of their nodes or listeners and `root` holds only
    /// what it held besides `old`. Mount again to recover.
    pub fn patch(
        &mut self,
        mut old: VNode,
        mut new: VNode,
        root: HostNodeId,
    ) -> Result<VNode, ReconcileError> {
        let lead = self.lead_of(&old, root)?;
        let result = patch::patch_node(
            &mut self.host,
            &self.scheduler,
            &mut old,
            &mut new,
            root,
            None,
            &lead,
        );
        let Err(err) = result else {
            return Ok(new);
        };
        log::error!("patch under host node {root} failed: {err}");
        for tree in [&mut old, &mut new] {
            if let Err(cleanup) = destroy::destroy_node(&mut self.host, &self.scheduler, tree) {
                log::warn!("cleanup under host node {root} failed: {cleanup}");
            }
        }
        Err(err)
    }

    /// What precedes a mounted top-level tree in `root`. A tree presenting
    /// no host nodes is treated as the last thing in `root`.
    fn lead_of(&self, tree: &VNode, root: HostNodeId) -> Result<Lead, ReconcileError> {
        if let Some(fiber) = tree.fiber() {
            return Ok(fiber.lead());
        }
        let position = match tree.first_host_node() {
            Some(first) => self.host.index_of(root, first)?,
            None => None,
        };
        Lead::at_index(&self.host, root, position)
    }

    pub fn destroy(&mut self, vnode: &mut VNode) -> Result<(), ReconcileError> {
        destroy::destroy_node(&mut self.host, &self.scheduler, vnode)
    }

    /// Run queued lifecycle callbacks. Returns how many ran.
    pub fn flush(&mut self) -> usize {
        self.scheduler.flush(&mut self.host)
    }
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod reconciler_tests;

#[cfg(test)]
#[path = "tests/fiber_tests.rs"]
mod fiber_tests;
