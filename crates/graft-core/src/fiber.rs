//! Live component instances.
//!
//! A [`Fiber`] is created when a component node is mounted and lives until
//! that node, or one of its ancestors, is destroyed. It owns its props, its
//! state, a private [`Dispatcher`] and the tree its render function last
//! produced. Child fibers are owned through that tree; the link back to the
//! parent fiber is weak, so ownership stays tree-shaped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::component::{Component, RenderScope};
use crate::destroy::destroy_node;
use crate::dispatcher::{action_handler, Dispatcher, Subscription};
use crate::events::{Handler, HandlerContext};
use crate::host::{Host, HostNodeId};
use crate::mount::mount_node;
use crate::lead::{assign_leads, Lead};
use crate::patch::patch_node;
use crate::scheduler::Scheduler;
use crate::vnode::VNode;
use crate::ReconcileError;

pub type FiberId = usize;

static NEXT_FIBER_ID: AtomicUsize = AtomicUsize::new(1);

fn next_fiber_id() -> FiberId {
    NEXT_FIBER_ID.fetch_add(1, Ordering::Relaxed)
}

struct FiberInner {
    id: FiberId,
    component: Component,
    scheduler: Scheduler,
    parent: Option<WeakFiber>,
    events: IndexMap<String, Handler>,
    dispatcher: Dispatcher,
    props: RefCell<Value>,
    state: RefCell<Value>,
    children: RefCell<Vec<VNode>>,
    subscriptions: RefCell<Vec<Subscription>>,
    mounted: Cell<bool>,
    rendered: RefCell<Option<VNode>>,
    host_parent: Cell<Option<HostNodeId>>,
    lead: RefCell<Lead>,
}

#[derive(Clone)]
pub struct Fiber {
    inner: Rc<FiberInner>,
}

/// Non-owning handle to a [`Fiber`].
#[derive(Clone)]
pub struct WeakFiber(Weak<FiberInner>);

impl WeakFiber {
    pub fn upgrade(&self) -> Option<Fiber> {
        self.0.upgrade().map(|inner| Fiber { inner })
    }
}

#[derive(Clone, Copy)]
enum Field {
    Props,
    State,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Field::Props => "props",
            Field::State => "state",
        }
    }
}

impl Fiber {
    pub(crate) fn new(
        component: Component,
        props: Value,
        events: IndexMap<String, Handler>,
        children: Vec<VNode>,
        parent: Option<&Fiber>,
        scheduler: Scheduler,
    ) -> Self {
        let state = component.initial_state(&props);
        Self {
            inner: Rc::new(FiberInner {
                id: next_fiber_id(),
                component,
                scheduler,
                parent: parent.map(Fiber::downgrade),
                events,
                dispatcher: Dispatcher::new(),
                props: RefCell::new(props),
                state: RefCell::new(state),
                children: RefCell::new(children),
                subscriptions: RefCell::new(Vec::new()),
                mounted: Cell::new(false),
                rendered: RefCell::new(None),
                host_parent: Cell::new(None),
                lead: RefCell::new(Lead::Start),
            }),
        }
    }

    pub fn id(&self) -> FiberId {
        self.inner.id
    }

    pub fn component(&self) -> &Component {
        &self.inner.component
    }

    pub fn name(&self) -> &'static str {
        self.inner.component.name()
    }

    pub fn props(&self) -> Value {
        self.inner.props.borrow().clone()
    }

    pub fn state(&self) -> Value {
        self.inner.state.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    pub fn parent(&self) -> Option<Fiber> {
        self.inner.parent.as_ref().and_then(WeakFiber::upgrade)
    }

    pub fn host_parent(&self) -> Option<HostNodeId> {
        self.inner.host_parent.get()
    }

    pub fn downgrade(&self) -> WeakFiber {
        WeakFiber(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Fiber) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy of the tree the last render produced.
    pub fn rendered(&self) -> Option<VNode> {
        self.inner.rendered.borrow().clone()
    }

    /// Every host node this fiber presents to its host parent, in order,
    /// looking through fragments and nested components.
    pub fn host_nodes(&self) -> Vec<HostNodeId> {
        self.inner
            .rendered
            .borrow()
            .as_ref()
            .map(VNode::host_nodes)
            .unwrap_or_default()
    }

    pub fn first_host_node(&self) -> Option<HostNodeId> {
        self.inner
            .rendered
            .borrow()
            .as_ref()
            .and_then(VNode::first_host_node)
    }

    /// Position in the host parent's child list where this fiber's own
    /// nodes begin, or would begin while it presents none.
    pub fn offset(&self, host: &dyn Host) -> Result<usize, ReconcileError> {
        match self.inner.host_parent.get() {
            Some(parent) => self.lead().insertion_index(host, parent),
            None => Ok(0),
        }
    }

    pub(crate) fn lead(&self) -> Lead {
        self.inner.lead.borrow().clone()
    }

    pub(crate) fn set_lead(&self, lead: Lead) {
        *self.inner.lead.borrow_mut() = lead;
    }

    pub fn mount(
        &self,
        host: &mut dyn Host,
        host_parent: HostNodeId,
        index: Option<usize>,
    ) -> Result<(), ReconcileError> {
        if self.is_mounted() {
            return Err(ReconcileError::AlreadyMounted {
                component: self.name(),
            });
        }
        self.set_lead(Lead::at_index(host, host_parent, index)?);
        let mut tree = self.render();
        mount_node(
            host,
            &self.inner.scheduler,
            &mut tree,
            host_parent,
            index,
            Some(self),
        )?;
        assign_leads(std::slice::from_ref(&tree), Lead::Inherit(self.downgrade()));
        *self.inner.rendered.borrow_mut() = Some(tree);
        self.subscribe_events();
        self.inner.host_parent.set(Some(host_parent));
        self.inner.mounted.set(true);
        log::trace!("mounted {}#{}", self.name(), self.id());
        Ok(())
    }

    pub fn unmount(&self, host: &mut dyn Host) -> Result<(), ReconcileError> {
        self.ensure_mounted()?;
        let tree = self.inner.rendered.borrow_mut().take();
        if let Some(mut tree) = tree {
            destroy_node(host, &self.inner.scheduler, &mut tree)?;
        }
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        self.inner.host_parent.set(None);
        self.set_lead(Lead::Start);
        self.inner.mounted.set(false);
        log::trace!("unmounted {}#{}", self.name(), self.id());
        Ok(())
    }

    /// Shallow-merge `partial` into the props and re-render if they changed.
    pub fn update_props(&self, host: &mut dyn Host, partial: Value) -> Result<(), ReconcileError> {
        self.update(host, partial, None)
    }

    /// Shallow-merge `partial` into the state and re-render if it changed.
    pub fn set_state(&self, host: &mut dyn Host, partial: Value) -> Result<(), ReconcileError> {
        self.ensure_mounted()?;
        let next = self.merged(Field::State, partial)?;
        if *self.inner.state.borrow() == next {
            return Ok(());
        }
        *self.inner.state.borrow_mut() = next;
        self.patch(host)
    }

    /// Props and slot children forwarded by a parent patch. A change in
    /// either one re-renders.
    pub(crate) fn update(
        &self,
        host: &mut dyn Host,
        partial: Value,
        children: Option<Vec<VNode>>,
    ) -> Result<(), ReconcileError> {
        self.ensure_mounted()?;
        let next = self.merged(Field::Props, partial)?;
        let mut changed = false;
        if *self.inner.props.borrow() != next {
            *self.inner.props.borrow_mut() = next;
            changed = true;
        }
        if let Some(children) = children {
            if *self.inner.children.borrow() != children {
                *self.inner.children.borrow_mut() = children;
                changed = true;
            }
        }
        if changed {
            self.patch(host)
        } else {
            Ok(())
        }
    }

    /// Dispatch `event` to whatever the parent subscribed for it.
    pub fn emit(
        &self,
        host: &mut dyn Host,
        event: &str,
        payload: &Value,
    ) -> Result<(), ReconcileError> {
        let dispatcher = self.inner.dispatcher.clone();
        dispatcher.dispatch(host, event, payload)
    }

    /// Invoke one of the component's named methods with this fiber as
    /// context.
    pub fn call(
        &self,
        host: &mut dyn Host,
        method: &str,
        payload: &Value,
    ) -> Result<(), ReconcileError> {
        let handler = self.inner.component.method(method).cloned().ok_or_else(|| {
            ReconcileError::UnknownMethod {
                component: self.name(),
                method: method.to_string(),
            }
        })?;
        handler.call(&mut HandlerContext::new(host, Some(self.clone())), payload)
    }

    /// Register a hook on the private dispatcher that runs after every
    /// emitted event.
    pub fn after_every_emit(
        &self,
        hook: impl Fn(&mut dyn Host) -> Result<(), ReconcileError> + 'static,
    ) -> Subscription {
        self.inner.dispatcher.after_every_dispatch(hook)
    }

    pub(crate) fn did_mount(&self, host: &mut dyn Host) -> Result<(), ReconcileError> {
        self.run_hook(host, self.inner.component.on_mounted().cloned())
    }

    pub(crate) fn did_unmount(&self, host: &mut dyn Host) -> Result<(), ReconcileError> {
        self.run_hook(host, self.inner.component.on_unmounted().cloned())
    }

    fn run_hook(&self, host: &mut dyn Host, hook: Option<Handler>) -> Result<(), ReconcileError> {
        let Some(hook) = hook else {
            return Ok(());
        };
        hook.call(&mut HandlerContext::new(host, Some(self.clone())), &Value::Null)
    }

    fn ensure_mounted(&self) -> Result<(), ReconcileError> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(ReconcileError::NotMounted {
                component: self.name(),
            })
        }
    }

    fn merged(&self, field: Field, partial: Value) -> Result<Value, ReconcileError> {
        let Value::Object(entries) = partial else {
            return Err(ReconcileError::NotAnObject {
                component: self.name(),
                field: field.name(),
            });
        };
        let current = match field {
            Field::Props => self.inner.props.borrow(),
            Field::State => self.inner.state.borrow(),
        };
        let mut next = match &*current {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        next.extend(entries);
        Ok(Value::Object(next))
    }

    fn render(&self) -> VNode {
        let props = self.props();
        let state = self.state();
        let children = self.inner.children.borrow().clone();
        self.inner
            .component
            .render(&RenderScope::new(self, &props, &state, &children))
    }

    fn patch(&self, host: &mut dyn Host) -> Result<(), ReconcileError> {
        let host_parent = self
            .inner
            .host_parent
            .get()
            .ok_or(ReconcileError::NotMounted {
                component: self.name(),
            })?;
        let mut next = self.render();
        let Some(mut previous) = self.inner.rendered.borrow_mut().take() else {
            return Err(ReconcileError::NotMounted {
                component: self.name(),
            });
        };
        let result = patch_node(
            host,
            &self.inner.scheduler,
            &mut previous,
            &mut next,
            host_parent,
            Some(self),
            &Lead::Inherit(self.downgrade()),
        );
        if let Err(err) = &result {
            // Nodes the failed patch did not carry over have no other owner.
            log::error!("patching {}#{} failed: {err}", self.name(), self.id());
            if let Err(cleanup) = destroy_node(host, &self.inner.scheduler, &mut previous) {
                log::warn!("leftover nodes of {}#{}: {cleanup}", self.name(), self.id());
            }
        }
        *self.inner.rendered.borrow_mut() = Some(next);
        result
    }

    /// Route each declared event to its handler, run with the parent fiber
    /// as context.
    fn subscribe_events(&self) {
        let subscriptions: Vec<Subscription> = self
            .inner
            .events
            .iter()
            .map(|(event, handler)| {
                let handler = handler.clone();
                let parent = self.inner.parent.clone();
                self.inner.dispatcher.subscribe(
                    event,
                    action_handler(move |host, payload| {
                        let context = parent.as_ref().and_then(WeakFiber::upgrade);
                        handler.call(&mut HandlerContext::new(host, context), payload)
                    }),
                )
            })
            .collect();
        *self.inner.subscriptions.borrow_mut() = subscriptions;
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.inner.id)
            .field("component", &self.inner.component.name())
            .field("mounted", &self.inner.mounted.get())
            .finish()
    }
}

impl fmt::Debug for WeakFiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakFiber")
            .field(&self.upgrade().map(|fiber| fiber.id()))
            .finish()
    }
}
