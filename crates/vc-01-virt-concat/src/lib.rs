//! # VC-01 Virtual Concat
//!
//! Lifecycle controller for composite storage devices.
//!
//! **Subsystem ID:** 01  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Combine several independently managed storage devices into one logical
//! device whose address space is their in-order concatenation:
//! - Acquire every declared component through the Device Registry
//! - Build the composite mapping through the Concatenation Engine
//! - Publish the composite, and undo all of it on failure or teardown
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | Atomic create | Every failure path runs the single release routine |
//! | No leaked handles | Handles are consumed by `release` |
//! | No double release | `ComponentHandle` is not `Clone` |
//! | Reverse teardown | Handles are popped off the acquisition stack |
//!
//! ## Module Structure
//!
//! ```text
//! vc-01-virt-concat/
//! ├── domain/          # Spec, handles, composite, context, errors
//! ├── ports/           # Lifecycle API + registry/engine/publisher traits
//! ├── service/         # Acquirer, aggregator, registrar, controller
//! └── adapters/        # Linear engine, in-memory device table
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(test)]
mod test_utils;

// Re-exports
pub use adapters::{InMemoryDeviceTable, LinearConcatEngine};
pub use domain::{
    check_instance, invariant_composite_complete, invariant_prefix_acquisition,
    invariant_torn_down, AcquireError, ComponentHandle, ComponentRef, CompositeDevice,
    CompositeDeviceSpec, ConfigError, CreateError, DeviceGeometry, DeviceId, EngineError, Extent,
    HandleToken, InstanceContext, InstanceName, InstanceState, InvariantViolation, Location,
    MediumKind, PublishError, ResolveError,
};
pub use ports::{CompositeLifecycleApi, ConcatenationEngine, DevicePublisher, DeviceRegistry};
pub use service::{LifecycleStats, VirtConcatDependencies, VirtConcatService};

/// Compatible string of declarative nodes this subsystem binds to.
pub const COMPATIBLE: &str = "mtd-concat";

/// Driver name reported in logs.
pub const DRIVER_NAME: &str = "virt-mtdconcat";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
