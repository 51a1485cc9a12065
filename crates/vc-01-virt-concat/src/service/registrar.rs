//! # Registrar
//!
//! Publishes the composite under its instance name. Publishing is the only
//! point at which the device becomes externally visible.

use crate::domain::{CompositeDevice, InstanceName, PublishError};
use crate::ports::outbound::DevicePublisher;
use tracing::{debug, info};

/// Publish `device` under `name`.
pub fn publish<P>(
    publisher: &P,
    name: &InstanceName,
    device: &CompositeDevice,
) -> Result<(), PublishError>
where
    P: DevicePublisher + ?Sized,
{
    debug_assert_eq!(device.name(), name);
    publisher.publish(name, device)?;
    info!(
        instance = %name,
        device_id = %device.id(),
        size = device.size(),
        components = device.component_count(),
        "Composite device published"
    );
    Ok(())
}

/// Withdraw `device`. Idempotent.
pub fn unpublish<P>(publisher: &P, device: &CompositeDevice)
where
    P: DevicePublisher + ?Sized,
{
    publisher.unpublish(device);
    debug!(instance = %device.name(), device_id = %device.id(), "Composite device unpublished");
}
