//! # Domain Entities
//!
//! Core entities for Virtual Concat: the declared spec, acquired component
//! handles, the composite view and the instance context that owns them.

use super::value_objects::{
    ComponentRef, DeviceGeometry, DeviceId, Extent, HandleToken, InstanceName, InstanceState,
    Location,
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Declared composite device: a unique name and ordered component references.
///
/// Order is significant, it fixes the address order of the composite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeDeviceSpec {
    /// Instance name, unique among active instances.
    #[serde(rename = "instance_name")]
    name: InstanceName,
    /// Component references in address order.
    components: Vec<ComponentRef>,
}

impl CompositeDeviceSpec {
    /// Create a spec.
    pub fn new(name: impl Into<String>, components: Vec<ComponentRef>) -> Self {
        Self {
            name: InstanceName::new(name),
            components,
        }
    }

    /// Convenience constructor from plain strings.
    pub fn from_refs<I, S>(name: impl Into<String>, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, refs.into_iter().map(ComponentRef::new).collect())
    }

    /// Instance name.
    pub fn name(&self) -> &InstanceName {
        &self.name
    }

    /// Declared components in order.
    pub fn components(&self) -> &[ComponentRef] {
        &self.components
    }

    /// Number of declared components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True if no components are declared.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Owned reference to one acquired component device.
///
/// Not `Clone`: exactly one handle exists per successful acquisition, and
/// releasing it through the registry consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct ComponentHandle {
    index: usize,
    reference: ComponentRef,
    token: HandleToken,
    geometry: DeviceGeometry,
}

impl ComponentHandle {
    /// Issued by a Device Registry when a reference resolves.
    pub fn new(
        index: usize,
        reference: ComponentRef,
        token: HandleToken,
        geometry: DeviceGeometry,
    ) -> Self {
        Self {
            index,
            reference,
            token,
            geometry,
        }
    }

    /// Position in declared order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Reference this handle was resolved from.
    pub fn reference(&self) -> &ComponentRef {
        &self.reference
    }

    /// Registry token.
    pub fn token(&self) -> HandleToken {
        self.token
    }

    /// Reported geometry.
    pub fn geometry(&self) -> &DeviceGeometry {
        &self.geometry
    }

    /// Reported size in bytes.
    pub fn size(&self) -> u64 {
        self.geometry.size
    }
}

/// Aggregate view built by the Concatenation Engine.
///
/// Holds only the mapping; backing handles are referenced by token and owned
/// by the instance context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeDevice {
    id: DeviceId,
    name: InstanceName,
    sources: Vec<ComponentRef>,
    geometry: DeviceGeometry,
    extents: Vec<Extent>,
}

impl CompositeDevice {
    /// Assemble a composite from contiguous extents in declared order.
    pub fn new(
        name: InstanceName,
        sources: Vec<ComponentRef>,
        geometry: DeviceGeometry,
        extents: Vec<Extent>,
    ) -> Self {
        Self {
            id: DeviceId::new(),
            name,
            sources,
            geometry,
            extents,
        }
    }

    /// Identity of this build.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Owning instance, also the published name.
    pub fn name(&self) -> &InstanceName {
        &self.name
    }

    /// Component references this device was built from.
    pub fn sources(&self) -> &[ComponentRef] {
        &self.sources
    }

    /// Composite geometry.
    pub fn geometry(&self) -> &DeviceGeometry {
        &self.geometry
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.geometry.size
    }

    /// Per-component extents in address order.
    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    /// Number of backing components.
    pub fn component_count(&self) -> usize {
        self.extents.len()
    }

    /// Map a composite offset to its component and local offset.
    pub fn locate(&self, offset: u64) -> Option<Location> {
        let pos = self.extents.partition_point(|e| e.end() <= offset);
        let extent = self.extents.get(pos)?;
        extent.contains(offset).then(|| Location {
            component: extent.index,
            offset: offset - extent.start,
        })
    }
}

/// Unit of lifecycle: owns the spec, the acquired handle prefix and the
/// composite once built.
#[derive(Debug)]
pub struct InstanceContext {
    pub(crate) spec: CompositeDeviceSpec,
    pub(crate) state: InstanceState,
    pub(crate) handles: Vec<ComponentHandle>,
    pub(crate) composite: Option<CompositeDevice>,
    pub(crate) published: bool,
}

impl InstanceContext {
    /// Fresh context in `Uninitialized`.
    pub fn new(spec: CompositeDeviceSpec) -> Self {
        Self {
            spec,
            state: InstanceState::Uninitialized,
            handles: Vec::new(),
            composite: None,
            published: false,
        }
    }

    /// Declared spec.
    pub fn spec(&self) -> &CompositeDeviceSpec {
        &self.spec
    }

    /// Instance name.
    pub fn name(&self) -> &InstanceName {
        self.spec.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Currently owned handles, in acquisition order.
    pub fn handles(&self) -> &[ComponentHandle] {
        &self.handles
    }

    /// Number of handles still owned.
    pub fn held_handles(&self) -> usize {
        self.handles.len()
    }

    /// True while the composite is visible to the rest of the system.
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// True if a composite mapping exists, published or not.
    pub fn has_composite(&self) -> bool {
        self.composite.is_some()
    }

    /// The composite device, only exposed while `Active`.
    pub fn device(&self) -> Option<&CompositeDevice> {
        match self.state {
            InstanceState::Active => self.composite.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn enter(&mut self, next: InstanceState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        if !self.handles.is_empty() || self.published {
            error!(
                instance = %self.spec.name(),
                handles = self.handles.len(),
                published = self.published,
                state = ?self.state,
                "Instance dropped without teardown; component handles leaked"
            );
        }
    }
}
