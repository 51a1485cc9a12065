//! # Virtual Concat Service
//!
//! The lifecycle controller implementing `CompositeLifecycleApi`.
//!
//! ## Architecture
//!
//! This service:
//! 1. Validates the declared spec before touching any device
//! 2. Acquires component handles in declared order (`acquirer`)
//! 3. Builds the composite mapping (`aggregator`)
//! 4. Publishes it (`registrar`)
//! 5. Routes every failure and every teardown through one release routine
//!
//! The service holds no per-instance state: contexts are owned by the caller.

pub mod acquirer;
pub mod aggregator;
pub mod registrar;

use crate::domain::{check_instance, ConfigError, CreateError, InstanceContext, InstanceState};
use crate::ports::inbound::CompositeLifecycleApi;
use crate::ports::outbound::{ConcatenationEngine, DevicePublisher, DeviceRegistry};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

pub use acquirer::acquire_components;
pub use aggregator::aggregate;

/// Lifecycle counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LifecycleStats {
    /// `activate` calls on fresh contexts.
    pub create_attempts: u64,
    /// Instances that reached `Active`.
    pub activations: u64,
    /// Creates that returned `Deferred`.
    pub deferrals: u64,
    /// Creates that failed fatally.
    pub failures: u64,
    /// Active instances torn down.
    pub teardowns: u64,
    /// Component handles taken.
    pub handles_acquired: u64,
    /// Component handles returned.
    pub handles_released: u64,
}

impl LifecycleStats {
    /// Handles currently held across all instances driven by this service.
    pub fn handles_outstanding(&self) -> u64 {
        self.handles_acquired - self.handles_released
    }
}

/// Dependencies for VirtConcatService
pub struct VirtConcatDependencies<R, E, P> {
    /// Device Registry.
    pub registry: R,
    /// Concatenation Engine.
    pub engine: E,
    /// Publish surface.
    pub publisher: P,
}

/// The composite-device lifecycle controller.
pub struct VirtConcatService<R, E, P>
where
    R: DeviceRegistry,
    E: ConcatenationEngine,
    P: DevicePublisher,
{
    /// Resolves and releases component handles.
    registry: R,
    /// Builds composite mappings.
    engine: E,
    /// Publishes composites.
    publisher: P,
    stats: Mutex<LifecycleStats>,
}

impl<R, E, P> VirtConcatService<R, E, P>
where
    R: DeviceRegistry,
    E: ConcatenationEngine,
    P: DevicePublisher,
{
    /// Create a new service with the given collaborators.
    pub fn new(deps: VirtConcatDependencies<R, E, P>) -> Self {
        Self {
            registry: deps.registry,
            engine: deps.engine,
            publisher: deps.publisher,
            stats: Mutex::new(LifecycleStats::default()),
        }
    }

    /// Snapshot of the lifecycle counters.
    pub fn stats(&self) -> LifecycleStats {
        self.stats.lock().clone()
    }

    /// Device Registry in use.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Publish surface in use.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Spec validation, acquisition, aggregation, publication.
    ///
    /// Leaves whatever it acquired in `ctx` on error; the caller rolls back.
    fn bring_up(&self, ctx: &mut InstanceContext) -> Result<(), CreateError> {
        ctx.enter(InstanceState::ResolvingSpec);
        if ctx.spec.name().is_blank() {
            return Err(ConfigError::EmptyInstanceName.into());
        }
        if ctx.spec.is_empty() {
            return Err(ConfigError::EmptySpec(ctx.spec.name().clone()).into());
        }
        ctx.handles
            .try_reserve_exact(ctx.spec.len())
            .map_err(|e| CreateError::Resource(e.to_string()))?;

        ctx.enter(InstanceState::Acquiring);
        let acquired = acquire_components(&self.registry, ctx.spec.components(), &mut ctx.handles);
        self.stats.lock().handles_acquired += ctx.handles.len() as u64;
        acquired.map_err(|e| CreateError::from_acquire(ctx.spec.name(), e))?;

        ctx.enter(InstanceState::Aggregating);
        let device = aggregate(&self.engine, &ctx.spec, &ctx.handles)?;

        ctx.enter(InstanceState::Registering);
        let published = registrar::publish(&self.publisher, ctx.spec.name(), &device);
        ctx.composite = Some(device);
        published?;
        ctx.published = true;

        Ok(())
    }

    /// The single release routine: unpublish, drop the mapping, release
    /// handles in reverse acquisition order.
    fn release_all(&self, ctx: &mut InstanceContext) -> usize {
        if ctx.published {
            if let Some(device) = ctx.composite.as_ref() {
                registrar::unpublish(&self.publisher, device);
            }
            ctx.published = false;
        }

        if let Some(device) = ctx.composite.take() {
            debug!(
                instance = %ctx.spec.name(),
                device_id = %device.id(),
                "Composite mapping discarded"
            );
        }

        let mut released = 0;
        while let Some(handle) = ctx.handles.pop() {
            debug!(
                instance = %ctx.spec.name(),
                index = handle.index(),
                reference = %handle.reference(),
                "Releasing component"
            );
            self.registry.release(handle);
            released += 1;
        }

        self.stats.lock().handles_released += released as u64;
        released
    }
}

impl<R, E, P> CompositeLifecycleApi for VirtConcatService<R, E, P>
where
    R: DeviceRegistry,
    E: ConcatenationEngine,
    P: DevicePublisher,
{
    #[instrument(skip(self, ctx), fields(instance = %ctx.name()))]
    fn activate(&self, ctx: &mut InstanceContext) -> Result<(), CreateError> {
        if ctx.state() != InstanceState::Uninitialized {
            return Err(ConfigError::NotFresh {
                instance: ctx.name().clone(),
                state: ctx.state(),
            }
            .into());
        }
        self.stats.lock().create_attempts += 1;

        let outcome = self.bring_up(ctx);
        match &outcome {
            Ok(()) => {
                ctx.enter(InstanceState::Active);
                self.stats.lock().activations += 1;
                info!(components = ctx.held_handles(), "Composite instance active");
            }
            Err(err) => {
                warn!(state = ?ctx.state(), error = %err, "Create failed, rolling back");
                ctx.enter(InstanceState::RollingBack);
                let released = self.release_all(ctx);
                ctx.enter(InstanceState::Removed);

                let mut stats = self.stats.lock();
                if err.is_deferred() {
                    stats.deferrals += 1;
                } else {
                    stats.failures += 1;
                }
                debug!(released, "Rollback complete");
            }
        }

        debug_assert!(check_instance(ctx).is_ok());
        outcome
    }

    #[instrument(skip(self, ctx), fields(instance = %ctx.name()))]
    fn destroy(&self, ctx: &mut InstanceContext) {
        match ctx.state() {
            InstanceState::Removed => {
                debug!("Instance already removed");
            }
            InstanceState::Uninitialized => {
                ctx.enter(InstanceState::Removed);
                debug!("Instance never started, nothing to release");
            }
            state => {
                if state.is_transient() {
                    warn!(state = ?state, "Teardown of an instance caught mid-operation");
                }
                ctx.state = InstanceState::TearingDown;
                let released = self.release_all(ctx);
                ctx.enter(InstanceState::Removed);
                self.stats.lock().teardowns += 1;
                info!(released, "Composite instance torn down");
            }
        }

        debug_assert!(check_instance(ctx).is_ok());
    }
}
