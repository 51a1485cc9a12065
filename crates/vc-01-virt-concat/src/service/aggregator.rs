//! # Aggregator
//!
//! Hands a complete, ordered handle set to the Concatenation Engine.

use crate::domain::{ComponentHandle, CompositeDevice, CompositeDeviceSpec, EngineError};
use crate::ports::outbound::ConcatenationEngine;
use tracing::debug;

/// Build the composite for `spec` over `handles`.
///
/// Never takes ownership of the handles; on error nothing else is touched.
pub fn aggregate<E>(
    engine: &E,
    spec: &CompositeDeviceSpec,
    handles: &[ComponentHandle],
) -> Result<CompositeDevice, EngineError>
where
    E: ConcatenationEngine + ?Sized,
{
    if handles.is_empty() {
        return Err(EngineError::EmptyComponentSet);
    }
    if handles.len() != spec.len() {
        return Err(EngineError::IncompleteComponentSet {
            got: handles.len(),
            expected: spec.len(),
        });
    }

    let device = engine.build(spec.name(), handles)?;

    if device.component_count() != handles.len() {
        return Err(EngineError::Rejected(format!(
            "engine mapped {} of {} components",
            device.component_count(),
            handles.len()
        )));
    }

    debug!(
        instance = %spec.name(),
        device_id = %device.id(),
        size = device.size(),
        "Composite mapping built"
    );
    Ok(device)
}
