//! Event handlers and their host listeners.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::fiber::{Fiber, WeakFiber};
use crate::host::{host_listener, Host, HostError, HostNodeId, ListenerId};
use crate::{same_rc, ReconcileError};

type HandlerFn = dyn Fn(&mut HandlerContext<'_>, &Value) -> Result<(), ReconcileError>;

/// Callback bound to a named event.
///
/// Handlers compare by identity: two clones of one handler are equal, two
/// separately created handlers never are, even with identical bodies.
#[derive(Clone)]
pub struct Handler(Rc<HandlerFn>);

impl Handler {
    pub fn new(
        f: impl Fn(&mut HandlerContext<'_>, &Value) -> Result<(), ReconcileError> + 'static,
    ) -> Self {
        Self(Rc::new(f))
    }

    /// Handler that invokes the named method of the owning component.
    pub fn method(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move |cx, payload| cx.call(&name, payload))
    }

    pub fn call(&self, cx: &mut HandlerContext<'_>, payload: &Value) -> Result<(), ReconcileError> {
        (self.0)(cx, payload)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        same_rc(&self.0, &other.0)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// What a handler can reach while it runs: the host and, when the handler
/// was declared inside a component's render output, that component.
pub struct HandlerContext<'a> {
    host: &'a mut dyn Host,
    fiber: Option<Fiber>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(host: &'a mut dyn Host, fiber: Option<Fiber>) -> Self {
        Self { host, fiber }
    }

    pub fn host(&mut self) -> &mut dyn Host {
        &mut *self.host
    }

    pub fn fiber(&self) -> Result<&Fiber, ReconcileError> {
        self.fiber.as_ref().ok_or(ReconcileError::NoOwningFiber)
    }

    pub fn props(&self) -> Result<Value, ReconcileError> {
        Ok(self.fiber()?.props())
    }

    pub fn state(&self) -> Result<Value, ReconcileError> {
        Ok(self.fiber()?.state())
    }

    pub fn set_state(&mut self, partial: Value) -> Result<(), ReconcileError> {
        let fiber = self.fiber()?.clone();
        fiber.set_state(&mut *self.host, partial)
    }

    pub fn update_props(&mut self, partial: Value) -> Result<(), ReconcileError> {
        let fiber = self.fiber()?.clone();
        fiber.update_props(&mut *self.host, partial)
    }

    pub fn emit(&mut self, event: &str, payload: &Value) -> Result<(), ReconcileError> {
        let fiber = self.fiber()?.clone();
        fiber.emit(&mut *self.host, event, payload)
    }

    pub fn call(&mut self, method: &str, payload: &Value) -> Result<(), ReconcileError> {
        let fiber = self.fiber()?.clone();
        fiber.call(&mut *self.host, method, payload)
    }
}

fn attach_listener(
    host: &mut dyn Host,
    node: HostNodeId,
    event: &str,
    handler: &Handler,
    owner: Option<&Fiber>,
) -> Result<ListenerId, HostError> {
    let handler = handler.clone();
    let owner: Option<WeakFiber> = owner.map(Fiber::downgrade);
    let listener = host_listener(move |host, payload| {
        let fiber = owner.as_ref().and_then(WeakFiber::upgrade);
        handler.call(&mut HandlerContext::new(host, fiber), payload)
    });
    host.add_listener(node, event, listener)
}

pub(crate) fn attach_listeners(
    host: &mut dyn Host,
    node: HostNodeId,
    events: &IndexMap<String, Handler>,
    owner: Option<&Fiber>,
) -> Result<IndexMap<String, ListenerId>, HostError> {
    let mut attached = IndexMap::with_capacity(events.len());
    for (event, handler) in events {
        let id = attach_listener(host, node, event, handler, owner)?;
        attached.insert(event.clone(), id);
    }
    Ok(attached)
}

pub(crate) fn remove_listeners(
    host: &mut dyn Host,
    node: HostNodeId,
    attached: &IndexMap<String, ListenerId>,
) -> Result<(), HostError> {
    for id in attached.values() {
        host.remove_listener(node, *id)?;
    }
    Ok(())
}

/// Rewire listeners whose handler changed identity, detaching stale ones
/// before attaching replacements. Returns the updated attachment table.
pub(crate) fn patch_listeners(
    host: &mut dyn Host,
    node: HostNodeId,
    mut attached: IndexMap<String, ListenerId>,
    old: &IndexMap<String, Handler>,
    new: &IndexMap<String, Handler>,
    owner: Option<&Fiber>,
) -> Result<IndexMap<String, ListenerId>, HostError> {
    for (event, handler) in old {
        let unchanged = new
            .get(event)
            .is_some_and(|candidate| candidate.ptr_eq(handler));
        if unchanged {
            continue;
        }
        if let Some(id) = attached.shift_remove(event) {
            host.remove_listener(node, id)?;
        }
    }
    for (event, handler) in new {
        if attached.contains_key(event) {
            continue;
        }
        let id = attach_listener(host, node, event, handler, owner)?;
        attached.insert(event.clone(), id);
    }
    Ok(attached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostOp, MemoryHost};
    use serde_json::json;
    use std::cell::RefCell;

    fn counting(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> Handler {
        let log = Rc::clone(log);
        Handler::new(move |_, payload| {
            log.borrow_mut().push(format!("{label}:{payload}"));
            Ok(())
        })
    }

    #[test]
    fn listener_invokes_handler_with_payload() {
        let mut host = MemoryHost::new();
        let node = host.create_element("button");
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut events = IndexMap::new();
        events.insert("click".to_string(), counting(&log, "click"));

        attach_listeners(&mut host, node, &events, None).expect("attach");
        let ran = host
            .dispatch_event(node, "click", &json!({"x": 1}))
            .expect("dispatch");

        assert_eq!(ran, 1);
        assert_eq!(*log.borrow(), vec![r#"click:{"x":1}"#]);
    }

    #[test]
    fn unchanged_handlers_keep_their_listener() {
        let mut host = MemoryHost::new();
        let node = host.create_element("button");
        let log = Rc::new(RefCell::new(Vec::new()));
        let keep = counting(&log, "keep");
        let mut old = IndexMap::new();
        old.insert("focus".to_string(), keep.clone());
        old.insert("click".to_string(), counting(&log, "old"));
        old.insert("blur".to_string(), counting(&log, "blur"));
        let attached = attach_listeners(&mut host, node, &old, None).expect("attach");
        host.clear_ops();

        let mut new = IndexMap::new();
        new.insert("focus".to_string(), keep);
        new.insert("click".to_string(), counting(&log, "new"));
        let attached =
            patch_listeners(&mut host, node, attached, &old, &new, None).expect("patch");

        assert_eq!(
            host.take_ops(),
            vec![
                HostOp::RemoveListener {
                    node,
                    event: "click".to_string()
                },
                HostOp::RemoveListener {
                    node,
                    event: "blur".to_string()
                },
                HostOp::AddListener {
                    node,
                    event: "click".to_string()
                },
            ]
        );
        assert_eq!(attached.len(), 2);
        host.dispatch_event(node, "click", &Value::Null)
            .expect("dispatch");
        assert_eq!(*log.borrow(), vec!["new:null"]);
    }

    #[test]
    fn method_handler_without_owner_fails() {
        let mut host = MemoryHost::new();
        let handler = Handler::method("save");
        let result = handler.call(&mut HandlerContext::new(&mut host, None), &Value::Null);
        assert_eq!(result, Err(ReconcileError::NoOwningFiber));
    }
}
