//! Application shell: mounts one root component into a host root and
//! drives the deferred lifecycle flushes from the embedder's update loop.

use graft_core::{
    component, Component, Fiber, Host, HostNodeId, Props, ReconcileError, Reconciler, VNode,
};
use graft_runtime_std::StdRuntime;

struct MountedApp {
    root: HostNodeId,
    tree: VNode,
}

pub struct AppShell<H: Host> {
    runtime: StdRuntime,
    reconciler: Reconciler<H>,
    component: Component,
    props: Props,
    mounted: Option<MountedApp>,
}

impl<H: Host> AppShell<H> {
    pub fn new(host: H, component: Component, props: Props) -> Self {
        let runtime = StdRuntime::new();
        let reconciler = Reconciler::with_scheduler(host, runtime.scheduler());
        Self {
            runtime,
            reconciler,
            component,
            props,
            mounted: None,
        }
    }

    pub fn host(&self) -> &H {
        self.reconciler.host()
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.reconciler.host_mut()
    }

    pub fn runtime(&self) -> &StdRuntime {
        &self.runtime
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Fiber of the root component while the app is mounted.
    pub fn root_fiber(&self) -> Option<Fiber> {
        self.mounted
            .as_ref()
            .and_then(|mounted| mounted.tree.fiber().cloned())
    }

    /// Mount the root component as the last child of `root`.
    pub fn mount(&mut self, root: HostNodeId) -> Result<(), ReconcileError> {
        if self.mounted.is_some() {
            return Err(ReconcileError::AlreadyMounted {
                component: self.component.name(),
            });
        }
        let mut tree = component(&self.component, self.props.clone(), ());
        self.reconciler.mount(&mut tree, root)?;
        log::debug!("mounted app {} into host node {root}", self.component.name());
        self.mounted = Some(MountedApp { root, tree });
        Ok(())
    }

    /// Destroy the root component and run the unmount callbacks it queued.
    /// The shell can be mounted again afterwards.
    pub fn unmount(&mut self) -> Result<(), ReconcileError> {
        let Some(mut mounted) = self.mounted.take() else {
            return Err(ReconcileError::NotMounted {
                component: self.component.name(),
            });
        };
        self.reconciler.destroy(&mut mounted.tree)?;
        self.runtime.take_flush_request();
        self.reconciler.flush();
        log::debug!(
            "unmounted app {} from host node {}",
            self.component.name(),
            mounted.root
        );
        Ok(())
    }

    /// Shallow-merge new root props into the mounted root component.
    pub fn update_props(&mut self, props: Props) -> Result<(), ReconcileError> {
        let fiber = self.root_fiber().ok_or(ReconcileError::NotMounted {
            component: self.component.name(),
        })?;
        fiber.update_props(self.reconciler.host_mut(), props.to_object())?;
        self.props = props;
        Ok(())
    }

    /// Whether lifecycle callbacks are waiting for [`AppShell::update`].
    pub fn should_update(&self) -> bool {
        self.reconciler.scheduler().has_pending_jobs()
    }

    /// Run the lifecycle callbacks the platform asked to flush. Failing
    /// callbacks are logged by the scheduler and do not stop the pass.
    /// Returns how many callbacks ran.
    pub fn update(&mut self) -> usize {
        let requested = self.runtime.take_flush_request();
        if !requested && !self.should_update() {
            return 0;
        }
        let ran = self.reconciler.flush();
        log::trace!("app shell flushed {ran} lifecycle callbacks");
        ran
    }
}
