//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound port traits for in-process use.

mod device_table;
mod linear_engine;

pub use device_table::InMemoryDeviceTable;
pub use linear_engine::LinearConcatEngine;
