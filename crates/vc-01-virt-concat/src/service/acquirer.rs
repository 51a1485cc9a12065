//! # Component Acquirer
//!
//! Takes one handle per declared reference, strictly in order, stopping at
//! the first refusal.

use crate::domain::{AcquireError, ComponentHandle, ComponentRef};
use crate::ports::outbound::DeviceRegistry;
use tracing::debug;

/// Acquire handles for `references` into `acquired`.
///
/// On failure at index `k`, `acquired` holds exactly the handles for
/// `[0, k)` and the caller owns their release. No retries.
pub fn acquire_components<R>(
    registry: &R,
    references: &[ComponentRef],
    acquired: &mut Vec<ComponentHandle>,
) -> Result<(), AcquireError>
where
    R: DeviceRegistry + ?Sized,
{
    for (index, reference) in references.iter().enumerate() {
        match registry.resolve(index, reference) {
            Ok(handle) => {
                debug_assert_eq!(handle.index(), index);
                debug!(
                    index,
                    reference = %reference,
                    size = handle.size(),
                    "Component acquired"
                );
                acquired.push(handle);
            }
            Err(cause) => {
                debug!(index, reference = %reference, error = %cause, "Component refused");
                return Err(AcquireError { index, cause });
            }
        }
    }
    Ok(())
}
