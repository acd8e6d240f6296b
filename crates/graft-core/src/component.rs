//! Reusable component definitions.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::events::{Handler, HandlerContext};
use crate::fiber::Fiber;
use crate::vnode::VNode;
use crate::ReconcileError;

type RenderFn = dyn Fn(&RenderScope<'_>) -> VNode;
type StateFn = dyn Fn(&Value) -> Value;

struct ComponentDef {
    name: &'static str,
    render: Rc<RenderFn>,
    state: Option<Rc<StateFn>>,
    methods: IndexMap<String, Handler>,
    on_mounted: Option<Handler>,
    on_unmounted: Option<Handler>,
}

/// A component definition: a render function, an initial-state function,
/// named methods and lifecycle hooks.
///
/// Definitions compare by identity, so component nodes built from two
/// clones of one definition patch in place while nodes from two distinct
/// definitions always remount.
#[derive(Clone)]
pub struct Component {
    def: Rc<ComponentDef>,
}

impl Component {
    pub fn builder(
        name: &'static str,
        render: impl Fn(&RenderScope<'_>) -> VNode + 'static,
    ) -> ComponentBuilder {
        ComponentBuilder {
            name,
            render: Rc::new(render),
            state: None,
            methods: IndexMap::new(),
            duplicate: None,
            on_mounted: None,
            on_unmounted: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.def, &other.def)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.def.methods.contains_key(name)
    }

    pub(crate) fn render(&self, scope: &RenderScope<'_>) -> VNode {
        (self.def.render)(scope)
    }

    pub(crate) fn initial_state(&self, props: &Value) -> Value {
        match &self.def.state {
            Some(state) => state(props),
            None => Value::Object(Map::new()),
        }
    }

    pub(crate) fn method(&self, name: &str) -> Option<&Handler> {
        self.def.methods.get(name)
    }

    pub(crate) fn on_mounted(&self) -> Option<&Handler> {
        self.def.on_mounted.as_ref()
    }

    pub(crate) fn on_unmounted(&self) -> Option<&Handler> {
        self.def.on_unmounted.as_ref()
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.def.name)
            .field("methods", &self.def.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct ComponentBuilder {
    name: &'static str,
    render: Rc<RenderFn>,
    state: Option<Rc<StateFn>>,
    methods: IndexMap<String, Handler>,
    duplicate: Option<&'static str>,
    on_mounted: Option<Handler>,
    on_unmounted: Option<Handler>,
}

impl ComponentBuilder {
    /// Derive the initial state from the initial props. Without it the
    /// state starts as an empty object.
    pub fn state(mut self, state: impl Fn(&Value) -> Value + 'static) -> Self {
        self.state = Some(Rc::new(state));
        self
    }

    pub fn method(
        mut self,
        name: &'static str,
        method: impl Fn(&mut HandlerContext<'_>, &Value) -> Result<(), ReconcileError> + 'static,
    ) -> Self {
        if self.methods.contains_key(name) {
            self.duplicate.get_or_insert(name);
        } else {
            self.methods.insert(name.to_string(), Handler::new(method));
        }
        self
    }

    /// Hook run by the scheduler after the component is mounted.
    pub fn on_mounted(
        mut self,
        hook: impl Fn(&mut HandlerContext<'_>, &Value) -> Result<(), ReconcileError> + 'static,
    ) -> Self {
        self.on_mounted = Some(Handler::new(hook));
        self
    }

    /// Hook run by the scheduler after the component is unmounted.
    pub fn on_unmounted(
        mut self,
        hook: impl Fn(&mut HandlerContext<'_>, &Value) -> Result<(), ReconcileError> + 'static,
    ) -> Self {
        self.on_unmounted = Some(Handler::new(hook));
        self
    }

    pub fn build(self) -> Result<Component, ReconcileError> {
        if let Some(method) = self.duplicate {
            return Err(ReconcileError::DuplicateMethod {
                component: self.name,
                method,
            });
        }
        Ok(Component {
            def: Rc::new(ComponentDef {
                name: self.name,
                render: self.render,
                state: self.state,
                methods: self.methods,
                on_mounted: self.on_mounted,
                on_unmounted: self.on_unmounted,
            }),
        })
    }
}

static NULL: Value = Value::Null;

/// Read-only view handed to a render function.
pub struct RenderScope<'a> {
    fiber: &'a Fiber,
    props: &'a Value,
    state: &'a Value,
    children: &'a [VNode],
}

impl<'a> RenderScope<'a> {
    pub(crate) fn new(
        fiber: &'a Fiber,
        props: &'a Value,
        state: &'a Value,
        children: &'a [VNode],
    ) -> Self {
        Self {
            fiber,
            props,
            state,
            children,
        }
    }

    pub fn props(&self) -> &Value {
        self.props
    }

    /// A single prop, `null` when absent.
    pub fn prop(&self, name: &str) -> &Value {
        self.props.get(name).unwrap_or(&NULL)
    }

    pub fn state(&self) -> &Value {
        self.state
    }

    /// A single state entry, `null` when absent.
    pub fn state_value(&self, name: &str) -> &Value {
        self.state.get(name).unwrap_or(&NULL)
    }

    /// Slot children passed by the parent. Returned as fresh copies ready
    /// to be placed in the rendered tree.
    pub fn children(&self) -> Vec<VNode> {
        self.children.to_vec()
    }

    pub fn fiber(&self) -> &Fiber {
        self.fiber
    }
}
