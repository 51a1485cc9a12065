//! # Outbound Ports
//!
//! Collaborators the lifecycle controller drives. All calls are synchronous
//! and may block inside the collaborator.

use crate::domain::{
    ComponentHandle, ComponentRef, CompositeDevice, EngineError, InstanceName, PublishError,
    ResolveError,
};
use std::sync::Arc;

/// Device Registry - outbound port.
///
/// Resolves references into shared-use handles and takes them back.
pub trait DeviceRegistry: Send + Sync {
    /// Resolve `reference` (declared at `index`) and take a shared-use handle.
    ///
    /// Increments the device's use count on success.
    fn resolve(
        &self,
        index: usize,
        reference: &ComponentRef,
    ) -> Result<ComponentHandle, ResolveError>;

    /// Return a handle. Consumes it, so it cannot be released twice.
    fn release(&self, handle: ComponentHandle);
}

/// Concatenation Engine - outbound port.
pub trait ConcatenationEngine: Send + Sync {
    /// Build the composite mapping over `components` in order.
    ///
    /// Borrows the handles: on failure they remain entirely with the caller.
    fn build(
        &self,
        name: &InstanceName,
        components: &[ComponentHandle],
    ) -> Result<CompositeDevice, EngineError>;
}

/// Publish surface of the Device Registry - outbound port.
pub trait DevicePublisher: Send + Sync {
    /// Make `device` visible under `name`.
    fn publish(&self, name: &InstanceName, device: &CompositeDevice) -> Result<(), PublishError>;

    /// Withdraw `device`. No-op if it is not currently published.
    fn unpublish(&self, device: &CompositeDevice);
}

impl<T: DeviceRegistry + ?Sized> DeviceRegistry for Arc<T> {
    fn resolve(
        &self,
        index: usize,
        reference: &ComponentRef,
    ) -> Result<ComponentHandle, ResolveError> {
        (**self).resolve(index, reference)
    }

    fn release(&self, handle: ComponentHandle) {
        (**self).release(handle)
    }
}

impl<T: ConcatenationEngine + ?Sized> ConcatenationEngine for Arc<T> {
    fn build(
        &self,
        name: &InstanceName,
        components: &[ComponentHandle],
    ) -> Result<CompositeDevice, EngineError> {
        (**self).build(name, components)
    }
}

impl<T: DevicePublisher + ?Sized> DevicePublisher for Arc<T> {
    fn publish(&self, name: &InstanceName, device: &CompositeDevice) -> Result<(), PublishError> {
        (**self).publish(name, device)
    }

    fn unpublish(&self, device: &CompositeDevice) {
        (**self).unpublish(device)
    }
}
