//! # Ports Layer
//!
//! Defines the port traits for the Virtual Concat subsystem.
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (lifecycle API for the external driver)
//! - `outbound.rs` - Driven ports (Device Registry, Concatenation Engine, publish surface)

pub mod inbound;
pub mod outbound;

pub use inbound::CompositeLifecycleApi;
pub use outbound::{ConcatenationEngine, DevicePublisher, DeviceRegistry};
