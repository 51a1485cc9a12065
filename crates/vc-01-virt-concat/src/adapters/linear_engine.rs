//! Linear Concatenation Engine
//!
//! Implements `ConcatenationEngine` by laying components end to end in
//! declared order.

use crate::domain::{
    ComponentHandle, CompositeDevice, DeviceGeometry, EngineError, Extent, InstanceName,
};
use crate::ports::outbound::ConcatenationEngine;
use tracing::debug;

/// Concatenates components back to back.
///
/// All components must share medium kind and write size. The composite erase
/// size is the largest component erase size.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearConcatEngine;

impl LinearConcatEngine {
    fn check_compatible(components: &[ComponentHandle]) -> Result<DeviceGeometry, EngineError> {
        let first = components.first().ok_or(EngineError::EmptyComponentSet)?;
        let base = *first.geometry();
        let mut erase_size = base.erase_size;

        for (index, handle) in components.iter().enumerate() {
            let geometry = handle.geometry();
            if geometry.size == 0 {
                return Err(EngineError::ZeroSizedComponent { index });
            }
            if geometry.kind != base.kind {
                return Err(EngineError::IncompatibleMedium {
                    index,
                    expected: base.kind,
                    found: geometry.kind,
                });
            }
            if geometry.write_size != base.write_size {
                return Err(EngineError::WriteSizeMismatch {
                    index,
                    expected: base.write_size,
                    found: geometry.write_size,
                });
            }
            erase_size = erase_size.max(geometry.erase_size);
        }

        Ok(DeviceGeometry::new(0, erase_size, base.write_size, base.kind))
    }
}

impl ConcatenationEngine for LinearConcatEngine {
    fn build(
        &self,
        name: &InstanceName,
        components: &[ComponentHandle],
    ) -> Result<CompositeDevice, EngineError> {
        let mut geometry = Self::check_compatible(components)?;

        let mut extents = Vec::with_capacity(components.len());
        let mut start: u64 = 0;
        for handle in components {
            let len = handle.size();
            extents.push(Extent {
                index: handle.index(),
                token: handle.token(),
                start,
                len,
            });
            start = start.checked_add(len).ok_or(EngineError::SizeOverflow)?;
        }
        geometry.size = start;

        debug!(
            "[vc-01] Linear concat {}: {} components, {} bytes, erase {}",
            name,
            extents.len(),
            geometry.size,
            geometry.erase_size
        );

        let sources = components.iter().map(|h| h.reference().clone()).collect();
        Ok(CompositeDevice::new(name.clone(), sources, geometry, extents))
    }
}
