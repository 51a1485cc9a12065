//! Counting collaborator doubles shared by the unit tests.

use crate::domain::{
    ComponentHandle, ComponentRef, CompositeDevice, CompositeDeviceSpec, DeviceGeometry, DeviceId,
    EngineError, Extent, HandleToken, InstanceName, PublishError, ResolveError,
};
use crate::ports::outbound::{ConcatenationEngine, DevicePublisher, DeviceRegistry};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct RegistryLog {
    devices: HashMap<String, DeviceGeometry>,
    not_ready: HashSet<String>,
    next_token: u64,
    live: HashMap<HandleToken, usize>,
    resolve_attempts: usize,
    acquired: usize,
    released: Vec<usize>,
    double_releases: usize,
}

/// Device Registry that counts every resolve and release.
///
/// Unknown references are `ReferenceInvalid`; references marked not ready are
/// `DependencyNotReady`.
#[derive(Default)]
pub struct CountingRegistry {
    log: Mutex<RegistryLog>,
}

impl CountingRegistry {
    pub fn with_devices(devices: &[(&str, u64)]) -> Self {
        let registry = Self::default();
        for (name, size) in devices {
            registry.add_device(name, DeviceGeometry::nand(*size));
        }
        registry
    }

    pub fn add_device(&self, name: &str, geometry: DeviceGeometry) {
        self.log.lock().devices.insert(name.to_string(), geometry);
    }

    pub fn mark_not_ready(&self, name: &str) {
        self.log.lock().not_ready.insert(name.to_string());
    }

    pub fn resolve_attempts(&self) -> usize {
        self.log.lock().resolve_attempts
    }

    pub fn acquire_count(&self) -> usize {
        self.log.lock().acquired
    }

    pub fn release_count(&self) -> usize {
        self.log.lock().released.len()
    }

    /// Declared indexes in the order they were released.
    pub fn released_indexes(&self) -> Vec<usize> {
        self.log.lock().released.clone()
    }

    pub fn live_handles(&self) -> usize {
        self.log.lock().live.len()
    }

    pub fn double_releases(&self) -> usize {
        self.log.lock().double_releases
    }

    /// Resolve every component of `spec`, panicking on refusal.
    pub fn acquire_spec(&self, spec: &CompositeDeviceSpec) -> Vec<ComponentHandle> {
        spec.components()
            .iter()
            .enumerate()
            .map(|(index, reference)| self.resolve(index, reference).unwrap())
            .collect()
    }

    pub fn release_all(&self, mut handles: Vec<ComponentHandle>) {
        while let Some(handle) = handles.pop() {
            self.release(handle);
        }
    }
}

impl DeviceRegistry for CountingRegistry {
    fn resolve(
        &self,
        index: usize,
        reference: &ComponentRef,
    ) -> Result<ComponentHandle, ResolveError> {
        let mut log = self.log.lock();
        log.resolve_attempts += 1;

        if log.not_ready.contains(reference.as_str()) {
            return Err(ResolveError::DependencyNotReady(reference.clone()));
        }
        let geometry = *log
            .devices
            .get(reference.as_str())
            .ok_or_else(|| ResolveError::ReferenceInvalid(reference.clone()))?;

        log.next_token += 1;
        let token = HandleToken(log.next_token);
        log.live.insert(token, index);
        log.acquired += 1;
        Ok(ComponentHandle::new(index, reference.clone(), token, geometry))
    }

    fn release(&self, handle: ComponentHandle) {
        let mut log = self.log.lock();
        match log.live.remove(&handle.token()) {
            Some(index) => log.released.push(index),
            None => log.double_releases += 1,
        }
    }
}

/// Engine that rejects every component set.
pub struct FailingEngine;

impl ConcatenationEngine for FailingEngine {
    fn build(
        &self,
        _name: &InstanceName,
        _components: &[ComponentHandle],
    ) -> Result<CompositeDevice, EngineError> {
        Err(EngineError::Rejected(
            "incompatible component characteristics".to_string(),
        ))
    }
}

#[derive(Default)]
struct PublisherLog {
    published: HashMap<String, DeviceId>,
    fail_with: Option<PublishError>,
    publish_calls: usize,
    unpublish_calls: usize,
}

/// Publish surface that records calls and can be told to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    log: Mutex<PublisherLog>,
}

impl RecordingPublisher {
    pub fn failing(err: PublishError) -> Self {
        let publisher = Self::default();
        publisher.log.lock().fail_with = Some(err);
        publisher
    }

    pub fn is_published(&self, name: &str) -> bool {
        self.log.lock().published.contains_key(name)
    }

    pub fn publish_calls(&self) -> usize {
        self.log.lock().publish_calls
    }

    pub fn unpublish_calls(&self) -> usize {
        self.log.lock().unpublish_calls
    }
}

impl DevicePublisher for RecordingPublisher {
    fn publish(&self, name: &InstanceName, device: &CompositeDevice) -> Result<(), PublishError> {
        let mut log = self.log.lock();
        log.publish_calls += 1;
        if let Some(err) = log.fail_with.clone() {
            return Err(err);
        }
        if log.published.contains_key(name.as_str()) {
            return Err(PublishError::NameConflict(name.clone()));
        }
        log.published.insert(name.as_str().to_string(), device.id());
        Ok(())
    }

    fn unpublish(&self, device: &CompositeDevice) {
        let mut log = self.log.lock();
        log.unpublish_calls += 1;
        if log.published.get(device.name().as_str()) == Some(&device.id()) {
            log.published.remove(device.name().as_str());
        }
    }
}

/// Single-component composite not backed by any registry.
pub fn sample_device(name: &str) -> CompositeDevice {
    let geometry = DeviceGeometry::nand(1024 * 1024);
    CompositeDevice::new(
        InstanceName::new(name),
        vec![ComponentRef::new("nand0")],
        geometry,
        vec![Extent {
            index: 0,
            token: HandleToken(1),
            start: 0,
            len: geometry.size,
        }],
    )
}
