//! # Virtual Concat Runtime Library
//!
//! This library exposes the runtime modules for testing.
//! The main entry point is the `main.rs` binary.
//!
//! - `config` - JSON configuration with environment overrides
//! - `driver` - Deferred-probe driver owning instance contexts
//! - `runtime` - Device table and driver wiring

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod driver;
pub mod runtime;

pub use config::{ConfigError, DeviceConfig, NodeConfig, ProbeConfig, RuntimeConfig};
pub use driver::{DriverError, PassReport, ProbeDriver, ProbeSummary};
pub use runtime::{TableService, VirtConcatRuntime};
