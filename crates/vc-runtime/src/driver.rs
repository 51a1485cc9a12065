//! # Probe Driver
//!
//! Owns instance contexts on behalf of the lifecycle controller and retries
//! deferred creates until their dependencies appear.
//!
//! ## Probe Loop
//!
//! ```text
//! pending ──create──→ Active ───────────→ instance table
//!    ↑                  │
//!    └──── Deferred ────┤
//!                       └── fatal ──→ failure log
//! ```
//!
//! A pass that activates nothing is stalled; the next pass waits for the
//! retry delay. Teardown runs in reverse activation order, so a composite
//! built on another composite goes first.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tracing::{debug, info, warn};
use vc_01_virt_concat::{
    CompositeDeviceSpec, CompositeLifecycleApi, CreateError, InstanceContext, InstanceName,
    InstanceState,
};
use vc_telemetry::{
    log_instance_event, metric_inc, time_histogram, COMPONENT_HANDLES_HELD, CREATE_DURATION,
    CREATE_OUTCOMES, INSTANCES_ACTIVE, PROBE_PASSES, TEARDOWNS,
};

use crate::config::ProbeConfig;

/// Driver errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// An instance with this name is already pending or active.
    #[error("Instance {0} is already declared")]
    DuplicateInstance(InstanceName),

    /// No active instance has this name.
    #[error("Instance {0} is not active")]
    UnknownInstance(InstanceName),

    /// Other active instances are built on this one.
    #[error("Instance {name} is in use by {dependents:?}")]
    InUse {
        /// Instance asked to go
        name: InstanceName,
        /// Active instances naming it as a component
        dependents: Vec<InstanceName>,
    },
}

/// Outcome of one probe pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Instances that reached `Active`.
    pub activated: usize,
    /// Instances left pending.
    pub deferred: usize,
    /// Instances dropped after a fatal error.
    pub failed: usize,
}

/// Outcome of a full probe run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    /// Passes executed.
    pub passes: u32,
    /// Instances active after the run.
    pub active: usize,
    /// Instances still deferred when the run gave up.
    pub unresolved: Vec<InstanceName>,
    /// Instances that failed fatally, over the driver's lifetime.
    pub failed: usize,
}

/// External lifecycle driver.
pub struct ProbeDriver<S>
where
    S: CompositeLifecycleApi,
{
    service: S,
    config: ProbeConfig,
    pending: VecDeque<CompositeDeviceSpec>,
    instances: HashMap<InstanceName, InstanceContext>,
    activation_order: Vec<InstanceName>,
    failures: Vec<(InstanceName, CreateError)>,
}

impl<S> ProbeDriver<S>
where
    S: CompositeLifecycleApi,
{
    /// Create a driver with nothing pending.
    pub fn new(service: S, config: ProbeConfig) -> Self {
        Self {
            service,
            config,
            pending: VecDeque::new(),
            instances: HashMap::new(),
            activation_order: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Queue `spec` for the next probe pass.
    pub fn submit(&mut self, spec: CompositeDeviceSpec) -> Result<(), DriverError> {
        let name = spec.name();
        let queued = self.pending.iter().any(|p| p.name() == name);
        if queued || self.instances.contains_key(name) {
            return Err(DriverError::DuplicateInstance(name.clone()));
        }
        debug!(instance = %name, components = spec.len(), "Instance queued");
        self.pending.push_back(spec);
        Ok(())
    }

    /// Attempt `create` on every pending spec once, in queue order.
    pub fn probe_pass(&mut self) -> PassReport {
        metric_inc!(PROBE_PASSES);
        let mut report = PassReport::default();

        for spec in std::mem::take(&mut self.pending) {
            let name = spec.name().clone();
            let outcome = {
                let _timer = time_histogram!(CREATE_DURATION);
                self.service.create(spec.clone())
            };

            match outcome {
                Ok(ctx) => {
                    metric_inc!(CREATE_OUTCOMES, &["active"]);
                    metric_inc!(INSTANCES_ACTIVE);
                    COMPONENT_HANDLES_HELD.add(ctx.held_handles() as f64);
                    log_instance_event!(
                        info,
                        name,
                        ctx.state(),
                        "Instance probed",
                        components = ctx.held_handles()
                    );
                    self.activation_order.push(name.clone());
                    self.instances.insert(name, ctx);
                    report.activated += 1;
                }
                Err(err) if err.is_deferred() => {
                    metric_inc!(CREATE_OUTCOMES, &[err.kind()]);
                    debug!(instance = %name, error = %err, "Probe deferred");
                    self.pending.push_back(spec);
                    report.deferred += 1;
                }
                Err(err) => {
                    metric_inc!(CREATE_OUTCOMES, &[err.kind()]);
                    log_instance_event!(
                        warn,
                        name,
                        InstanceState::Removed,
                        "Probe failed",
                        error = %err
                    );
                    self.failures.push((name, err));
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Run passes until nothing is pending or `max_passes` is reached.
    pub async fn run(&mut self) -> ProbeSummary {
        let mut passes = 0;

        while !self.pending.is_empty() && passes < self.config.max_passes {
            if passes > 0 {
                tokio::time::sleep(self.config.retry_delay()).await;
            }

            // Repeat immediately while passes make progress
            loop {
                let report = self.probe_pass();
                passes += 1;
                debug!(pass = passes, ?report, "Probe pass complete");

                let stalled = report.activated == 0;
                if stalled || self.pending.is_empty() || passes >= self.config.max_passes {
                    break;
                }
            }
        }

        let summary = ProbeSummary {
            passes,
            active: self.instances.len(),
            unresolved: self.pending_names(),
            failed: self.failures.len(),
        };
        if !summary.unresolved.is_empty() {
            warn!(
                passes,
                unresolved = summary.unresolved.len(),
                "Probe gave up with instances still deferred"
            );
        }
        summary
    }

    /// Tear down one active instance.
    ///
    /// Refused while another active instance uses it as a component; tear
    /// the dependents down first.
    pub fn destroy_instance(&mut self, name: &InstanceName) -> Result<(), DriverError> {
        if !self.instances.contains_key(name) {
            return Err(DriverError::UnknownInstance(name.clone()));
        }
        let dependents = self.dependents_of(name);
        if !dependents.is_empty() {
            warn!(instance = %name, ?dependents, "Refusing teardown of an instance in use");
            return Err(DriverError::InUse {
                name: name.clone(),
                dependents,
            });
        }

        let mut ctx = self
            .instances
            .remove(name)
            .ok_or_else(|| DriverError::UnknownInstance(name.clone()))?;
        self.activation_order.retain(|n| n != name);
        self.teardown(&mut ctx);
        Ok(())
    }

    /// Tear down every active instance in reverse activation order.
    pub fn teardown_all(&mut self) -> usize {
        let mut torn_down = 0;
        while let Some(name) = self.activation_order.pop() {
            if let Some(mut ctx) = self.instances.remove(&name) {
                self.teardown(&mut ctx);
                torn_down += 1;
            }
        }
        info!(torn_down, "All instances torn down");
        torn_down
    }

    /// Active instances that list `name` among their components, in
    /// activation order.
    pub fn dependents_of(&self, name: &InstanceName) -> Vec<InstanceName> {
        let reference = name.as_component_ref();
        self.activation_order
            .iter()
            .filter(|other| *other != name)
            .filter(|other| {
                self.instances
                    .get(*other)
                    .is_some_and(|ctx| ctx.spec().components().contains(&reference))
            })
            .cloned()
            .collect()
    }

    fn teardown(&self, ctx: &mut InstanceContext) {
        let held = ctx.held_handles();
        self.service.destroy(ctx);
        INSTANCES_ACTIVE.dec();
        COMPONENT_HANDLES_HELD.sub(held as f64);
        metric_inc!(TEARDOWNS);
        log_instance_event!(info, ctx.name(), ctx.state(), "Instance removed", released = held);
    }

    /// Active instance by name.
    pub fn instance(&self, name: &str) -> Option<&InstanceContext> {
        self.instances.get(&InstanceName::new(name))
    }

    /// Active instance names in activation order.
    pub fn active_names(&self) -> &[InstanceName] {
        &self.activation_order
    }

    /// Names still waiting for a dependency.
    pub fn pending_names(&self) -> Vec<InstanceName> {
        self.pending.iter().map(|s| s.name().clone()).collect()
    }

    /// Fatal create errors so far.
    pub fn failures(&self) -> &[(InstanceName, CreateError)] {
        &self.failures
    }

    /// The lifecycle controller.
    pub fn service(&self) -> &S {
        &self.service
    }
}

impl<S> Drop for ProbeDriver<S>
where
    S: CompositeLifecycleApi,
{
    fn drop(&mut self) {
        if !self.instances.is_empty() {
            warn!(active = self.instances.len(), "Driver dropped with active instances");
            self.teardown_all();
        }
    }
}
