//! Per-scope publish/subscribe action bus.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::collections::map::HashMap;
use crate::host::Host;
use crate::{same_rc, ReconcileError};

pub type ActionHandler = Rc<dyn Fn(&mut dyn Host, &Value) -> Result<(), ReconcileError>>;
pub type AfterDispatchHook = Rc<dyn Fn(&mut dyn Host) -> Result<(), ReconcileError>>;

pub fn action_handler(
    f: impl Fn(&mut dyn Host, &Value) -> Result<(), ReconcileError> + 'static,
) -> ActionHandler {
    Rc::new(f)
}

#[derive(Default)]
struct Subscriptions {
    actions: HashMap<String, Vec<ActionHandler>>,
    after: Vec<AfterDispatchHook>,
}

/// Routes named actions to subscribed handlers.
///
/// Cloning yields another handle to the same subscription table.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Rc<RefCell<Subscriptions>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `action`. Registering the same handler twice
    /// under one action is a no-op and returns an inert subscription.
    pub fn subscribe(&self, action: &str, handler: ActionHandler) -> Subscription {
        {
            let mut subscriptions = self.inner.borrow_mut();
            let handlers = subscriptions.actions.entry(action.to_string()).or_default();
            if handlers.iter().any(|existing| same_rc(existing, &handler)) {
                return Subscription::inert();
            }
            handlers.push(Rc::clone(&handler));
        }

        let table = Rc::downgrade(&self.inner);
        let action = action.to_string();
        Subscription::new(move || {
            if let Some(table) = table.upgrade() {
                if let Some(handlers) = table.borrow_mut().actions.get_mut(&action) {
                    handlers.retain(|existing| !same_rc(existing, &handler));
                }
            }
        })
    }

    /// Register a hook that runs after every dispatch, whatever the action.
    pub fn after_every_dispatch(
        &self,
        hook: impl Fn(&mut dyn Host) -> Result<(), ReconcileError> + 'static,
    ) -> Subscription {
        let hook: AfterDispatchHook = Rc::new(hook);
        self.inner.borrow_mut().after.push(Rc::clone(&hook));
        let table: Weak<RefCell<Subscriptions>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(table) = table.upgrade() {
                table
                    .borrow_mut()
                    .after
                    .retain(|existing| !same_rc(existing, &hook));
            }
        })
    }

    pub fn has_handlers(&self, action: &str) -> bool {
        self.inner
            .borrow()
            .actions
            .get(action)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Invoke the handlers for `action` in registration order, then every
    /// after-dispatch hook. An action nobody listens to is logged and
    /// otherwise ignored.
    pub fn dispatch(
        &self,
        host: &mut dyn Host,
        action: &str,
        payload: &Value,
    ) -> Result<(), ReconcileError> {
        let (handlers, hooks) = {
            let subscriptions = self.inner.borrow();
            (
                subscriptions.actions.get(action).cloned().unwrap_or_default(),
                subscriptions.after.clone(),
            )
        };

        if handlers.is_empty() {
            log::warn!("no handlers found for action `{action}`");
        }
        for handler in &handlers {
            handler(host, payload)?;
        }
        for hook in &hooks {
            hook(host)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions = self.inner.borrow();
        f.debug_struct("Dispatcher")
            .field("actions", &subscriptions.actions.len())
            .field("after", &subscriptions.after.len())
            .finish()
    }
}

/// Capability to remove one registration from a [`Dispatcher`].
///
/// Dropping it leaves the registration in place.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
