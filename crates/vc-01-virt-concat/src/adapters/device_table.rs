//! In-Memory Device Table
//!
//! Implements both `DeviceRegistry` and `DevicePublisher` over one table, so
//! a published composite can itself be resolved as a component.

use crate::domain::{
    ComponentHandle, ComponentRef, CompositeDevice, DeviceGeometry, DeviceId, HandleToken,
    InstanceName, PublishError, ResolveError,
};
use crate::ports::outbound::{DevicePublisher, DeviceRegistry};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
struct DeviceEntry {
    /// Distinguishes successive entries registered under one name.
    generation: u64,
    geometry: DeviceGeometry,
    use_count: usize,
    /// Set for published composites.
    composite: Option<DeviceId>,
}

#[derive(Debug, Default)]
struct TableState {
    devices: HashMap<ComponentRef, DeviceEntry>,
    /// References that may appear later.
    expected: HashSet<ComponentRef>,
    /// Issued handles, keyed to the entry generation they were taken on.
    outstanding: HashMap<HandleToken, (ComponentRef, u64)>,
    closed: bool,
    next_token: u64,
    next_generation: u64,
    acquired_total: u64,
    released_total: u64,
    release_log: Vec<ComponentRef>,
}

/// Device table shared between the registry and the publish surface.
#[derive(Debug, Default)]
pub struct InMemoryDeviceTable {
    state: RwLock<TableState>,
}

impl TableState {
    fn insert_entry(
        &mut self,
        reference: ComponentRef,
        geometry: DeviceGeometry,
        composite: Option<DeviceId>,
    ) {
        self.next_generation += 1;
        self.devices.insert(
            reference,
            DeviceEntry {
                generation: self.next_generation,
                geometry,
                use_count: 0,
                composite,
            },
        );
    }
}

impl InMemoryDeviceTable {
    /// Create an empty, open table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a static device. Replaces an existing static entry of that name.
    pub fn register_device(&self, name: impl Into<String>, geometry: DeviceGeometry) {
        let reference = ComponentRef::new(name);
        let mut state = self.state.write();
        if let Some(old) = state.devices.get(&reference) {
            if old.composite.is_some() || old.use_count > 0 {
                warn!(
                    reference = %reference,
                    "Refusing to replace a device that is published or in use"
                );
                return;
            }
        }
        debug!(reference = %reference, size = geometry.size, "Device registered");
        state.insert_entry(reference, geometry, None);
    }

    /// Declare that `name` may appear later. Resolving it before then is
    /// `DependencyNotReady` rather than `ReferenceInvalid`.
    pub fn expect(&self, name: impl Into<String>) {
        self.state.write().expected.insert(ComponentRef::new(name));
    }

    /// Stop accepting publications.
    pub fn close(&self) {
        self.state.write().closed = true;
    }

    /// Accept publications again.
    pub fn reopen(&self) {
        self.state.write().closed = false;
    }

    /// Whether a composite is currently published under `name`.
    pub fn is_published(&self, name: &str) -> bool {
        self.state
            .read()
            .devices
            .get(&ComponentRef::new(name))
            .is_some_and(|entry| entry.composite.is_some())
    }

    /// Whether `name` resolves right now.
    pub fn contains(&self, name: &str) -> bool {
        self.state
            .read()
            .devices
            .contains_key(&ComponentRef::new(name))
    }

    /// Live handles on `name`, `None` if absent.
    pub fn use_count(&self, name: &str) -> Option<usize> {
        self.state
            .read()
            .devices
            .get(&ComponentRef::new(name))
            .map(|entry| entry.use_count)
    }

    /// Handles issued and not yet returned.
    pub fn outstanding_handles(&self) -> usize {
        self.state.read().outstanding.len()
    }

    /// Total handles ever issued.
    pub fn acquired_total(&self) -> u64 {
        self.state.read().acquired_total
    }

    /// Total handles ever returned.
    pub fn released_total(&self) -> u64 {
        self.state.read().released_total
    }

    /// References in the order their handles came back.
    pub fn release_log(&self) -> Vec<ComponentRef> {
        self.state.read().release_log.clone()
    }
}

impl DeviceRegistry for InMemoryDeviceTable {
    fn resolve(
        &self,
        index: usize,
        reference: &ComponentRef,
    ) -> Result<ComponentHandle, ResolveError> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let (geometry, generation) = match state.devices.get_mut(reference) {
            Some(entry) => {
                entry.use_count += 1;
                (entry.geometry, entry.generation)
            }
            None if state.expected.contains(reference) => {
                return Err(ResolveError::DependencyNotReady(reference.clone()));
            }
            None => return Err(ResolveError::ReferenceInvalid(reference.clone())),
        };

        state.next_token += 1;
        let token = HandleToken(state.next_token);
        state
            .outstanding
            .insert(token, (reference.clone(), generation));
        state.acquired_total += 1;

        Ok(ComponentHandle::new(index, reference.clone(), token, geometry))
    }

    fn release(&self, handle: ComponentHandle) {
        let mut state = self.state.write();

        let Some((reference, generation)) = state.outstanding.remove(&handle.token()) else {
            warn!(token = handle.token().0, "Release of a handle this table never issued");
            return;
        };
        match state.devices.get_mut(&reference) {
            Some(entry) if entry.generation == generation => {
                entry.use_count = entry.use_count.saturating_sub(1);
            }
            _ => debug!(reference = %reference, "Released handle outlived its device entry"),
        }
        state.released_total += 1;
        state.release_log.push(reference);
    }
}

impl DevicePublisher for InMemoryDeviceTable {
    fn publish(&self, name: &InstanceName, device: &CompositeDevice) -> Result<(), PublishError> {
        let mut state = self.state.write();
        if state.closed {
            return Err(PublishError::RegistryUnavailable);
        }

        let reference = name.as_component_ref();
        if state.devices.contains_key(&reference) {
            return Err(PublishError::NameConflict(name.clone()));
        }

        state.insert_entry(reference, *device.geometry(), Some(device.id()));
        info!(instance = %name, device_id = %device.id(), "Composite added to device table");
        Ok(())
    }

    fn unpublish(&self, device: &CompositeDevice) {
        let mut state = self.state.write();
        let reference = device.name().as_component_ref();

        let matches = state
            .devices
            .get(&reference)
            .is_some_and(|entry| entry.composite == Some(device.id()));
        if !matches {
            return;
        }

        if let Some(entry) = state.devices.remove(&reference) {
            if entry.use_count > 0 {
                error!(
                    instance = %device.name(),
                    use_count = entry.use_count,
                    "Composite withdrawn while still in use"
                );
            }
        }
    }
}
