//! # Domain Value Objects
//!
//! Immutable value types for Virtual Concat.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque component device reference, understood only by the Device Registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentRef(String);

impl ComponentRef {
    /// Wrap a reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Raw reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique instance name; also the name the composite is published under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceName(String);

impl InstanceName {
    /// Wrap a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank names are rejected before acquisition.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The reference under which this instance's composite can be resolved.
    pub fn as_component_ref(&self) -> ComponentRef {
        ComponentRef(self.0.clone())
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an instance context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InstanceState {
    /// Created, nothing attempted.
    #[default]
    Uninitialized,
    /// Validating the declared spec.
    ResolvingSpec,
    /// Taking component handles in declared order.
    Acquiring,
    /// Handing handles to the Concatenation Engine.
    Aggregating,
    /// Publishing the composite.
    Registering,
    /// Published and usable.
    Active,
    /// Undoing a failed create.
    RollingBack,
    /// Explicit teardown in progress.
    TearingDown,
    /// Terminal.
    Removed,
}

impl InstanceState {
    /// Check if transition to next state is valid.
    pub fn can_transition_to(&self, next: InstanceState) -> bool {
        use InstanceState::*;
        match (self, next) {
            (Uninitialized, ResolvingSpec) => true,
            (Uninitialized, Removed) => true, // teardown of an unstarted instance
            (ResolvingSpec, Acquiring) => true,
            (Acquiring, Aggregating) => true,
            (Aggregating, Registering) => true,
            (Registering, Active) => true,
            (ResolvingSpec | Acquiring | Aggregating | Registering, RollingBack) => true,
            (Active, TearingDown) => true,
            (RollingBack | TearingDown, Removed) => true,
            (Removed, Removed) => true,
            _ => false,
        }
    }

    /// Check if this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Removed)
    }

    /// States in which a create is in flight.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ResolvingSpec
                | Self::Acquiring
                | Self::Aggregating
                | Self::Registering
                | Self::RollingBack
                | Self::TearingDown
        )
    }
}

/// Storage medium of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediumKind {
    /// NOR flash.
    Nor,
    /// NAND flash.
    Nand,
    /// RAM-backed device.
    Ram,
}

/// Physical characteristics reported for a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceGeometry {
    /// Capacity in bytes.
    pub size: u64,
    /// Erase block size in bytes.
    pub erase_size: u32,
    /// Minimum write unit in bytes.
    pub write_size: u32,
    /// Medium kind.
    pub kind: MediumKind,
}

impl DeviceGeometry {
    /// Create a geometry.
    pub fn new(size: u64, erase_size: u32, write_size: u32, kind: MediumKind) -> Self {
        Self {
            size,
            erase_size,
            write_size,
            kind,
        }
    }

    /// NAND geometry with common 128 KiB blocks and 2 KiB pages.
    pub fn nand(size: u64) -> Self {
        Self::new(size, 128 * 1024, 2048, MediumKind::Nand)
    }
}

/// Registry-issued token identifying one acquired handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleToken(pub u64);

/// Identity of one built composite device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One component's slice of the composite address space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    /// Component index in declared order.
    pub index: usize,
    /// Backing handle (referenced, not owned).
    pub token: HandleToken,
    /// First composite offset covered.
    pub start: u64,
    /// Length in bytes.
    pub len: u64,
}

impl Extent {
    /// One past the last covered offset.
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    /// Whether `offset` falls inside this extent.
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end()
    }
}

/// Result of locating a composite offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    /// Component index in declared order.
    pub component: usize,
    /// Offset local to that component.
    pub offset: u64,
}
