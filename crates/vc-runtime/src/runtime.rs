//! # Virtual Concat Runtime
//!
//! Wires one in-memory device table into the lifecycle controller as both
//! registry and publish surface, then hands bound nodes to the probe driver.

use std::sync::Arc;

use tracing::info;
use vc_01_virt_concat::{
    InMemoryDeviceTable, LinearConcatEngine, VirtConcatDependencies, VirtConcatService,
    DRIVER_NAME,
};

use crate::config::RuntimeConfig;
use crate::driver::{DriverError, ProbeDriver, ProbeSummary};

/// Lifecycle controller over the shared device table.
pub type TableService =
    VirtConcatService<Arc<InMemoryDeviceTable>, LinearConcatEngine, Arc<InMemoryDeviceTable>>;

/// The runtime: device table plus probe driver.
pub struct VirtConcatRuntime {
    table: Arc<InMemoryDeviceTable>,
    driver: ProbeDriver<TableService>,
}

impl VirtConcatRuntime {
    /// Register static devices and queue every bound node.
    ///
    /// Bound node names are declared expected in the table, so a node that
    /// references another composite defers until that composite is published.
    pub fn new(config: &RuntimeConfig) -> Result<Self, DriverError> {
        let table = Arc::new(InMemoryDeviceTable::new());
        for device in &config.devices {
            table.register_device(device.name.clone(), device.geometry());
        }

        let specs = config.bound_specs();
        for spec in &specs {
            table.expect(spec.name().as_str());
        }

        let service = VirtConcatService::new(VirtConcatDependencies {
            registry: Arc::clone(&table),
            engine: LinearConcatEngine,
            publisher: Arc::clone(&table),
        });
        let mut driver = ProbeDriver::new(service, config.probe.clone());
        for spec in specs {
            driver.submit(spec)?;
        }

        info!(
            driver = DRIVER_NAME,
            devices = config.devices.len(),
            pending = driver.pending_names().len(),
            "Runtime created"
        );

        Ok(Self { table, driver })
    }

    /// Probe until everything is active or the driver gives up.
    pub async fn probe(&mut self) -> ProbeSummary {
        self.driver.run().await
    }

    /// Tear down every active instance.
    pub fn shutdown(&mut self) -> usize {
        let torn_down = self.driver.teardown_all();
        self.table.close();
        let stats = self.driver.service().stats();
        info!(
            torn_down,
            handles_outstanding = stats.handles_outstanding(),
            "Runtime shut down"
        );
        torn_down
    }

    /// Shared device table.
    pub fn table(&self) -> &Arc<InMemoryDeviceTable> {
        &self.table
    }

    /// Probe driver.
    pub fn driver(&self) -> &ProbeDriver<TableService> {
        &self.driver
    }

    /// Mutable probe driver, for submitting or destroying instances at runtime.
    pub fn driver_mut(&mut self) -> &mut ProbeDriver<TableService> {
        &mut self.driver
    }
}
