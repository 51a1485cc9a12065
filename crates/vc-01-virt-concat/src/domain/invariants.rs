//! # Domain Invariants
//!
//! Lifecycle rules that must hold at every observable point.

use super::entities::{ComponentHandle, InstanceContext};
use super::errors::InvariantViolation;
use super::value_objects::InstanceState;

/// Handles occupy the declared prefix `[0, k)`, in order.
pub fn invariant_prefix_acquisition(
    handles: &[ComponentHandle],
    declared: usize,
) -> Result<(), InvariantViolation> {
    if handles.len() > declared {
        return Err(InvariantViolation::NonPrefixAcquisition(format!(
            "{} handles for {} declared components",
            handles.len(),
            declared
        )));
    }

    for (position, handle) in handles.iter().enumerate() {
        if handle.index() != position {
            return Err(InvariantViolation::NonPrefixAcquisition(format!(
                "handle at position {} has index {}",
                position,
                handle.index()
            )));
        }
    }

    Ok(())
}

/// A composite exists only over a complete handle set.
pub fn invariant_composite_complete(ctx: &InstanceContext) -> Result<(), InvariantViolation> {
    if ctx.has_composite() && ctx.held_handles() != ctx.spec().len() {
        return Err(InvariantViolation::IncompleteComposite {
            held: ctx.held_handles(),
            declared: ctx.spec().len(),
        });
    }
    Ok(())
}

/// A removed context owns nothing.
pub fn invariant_torn_down(ctx: &InstanceContext) -> Result<(), InvariantViolation> {
    if ctx.state() == InstanceState::Removed && (ctx.held_handles() > 0 || ctx.has_composite()) {
        return Err(InvariantViolation::ResidualResources {
            handles: ctx.held_handles(),
            composite: ctx.has_composite(),
        });
    }
    Ok(())
}

/// All structural invariants at once.
pub fn check_instance(ctx: &InstanceContext) -> Result<(), InvariantViolation> {
    invariant_prefix_acquisition(ctx.handles(), ctx.spec().len())?;
    invariant_composite_complete(ctx)?;
    invariant_torn_down(ctx)
}
