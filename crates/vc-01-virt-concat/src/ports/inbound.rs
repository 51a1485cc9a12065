//! # Inbound Ports
//!
//! Lifecycle API consumed by the external driver (probe/remove host).

use crate::domain::{CompositeDeviceSpec, CreateError, InstanceContext};

/// Composite lifecycle API - inbound port.
///
/// The caller serializes operations per instance name; implementations do no
/// locking for that case.
pub trait CompositeLifecycleApi {
    /// Build, publish and return an `Active` instance.
    ///
    /// On error everything acquired has already been released.
    fn create(&self, spec: CompositeDeviceSpec) -> Result<InstanceContext, CreateError> {
        let mut ctx = InstanceContext::new(spec);
        self.activate(&mut ctx)?;
        Ok(ctx)
    }

    /// Run the create pipeline on a caller-owned `Uninitialized` context.
    ///
    /// On error the context is left `Removed`, holding nothing.
    fn activate(&self, ctx: &mut InstanceContext) -> Result<(), CreateError>;

    /// Unpublish and release everything. Idempotent, never fails.
    fn destroy(&self, ctx: &mut InstanceContext);
}
