//! # Domain Errors
//!
//! Error types for the Virtual Concat subsystem.
//!
//! Collaborator errors (`ResolveError`, `EngineError`, `PublishError`) are
//! folded into `CreateError`, the only error surfaced by `create`.

use super::value_objects::{ComponentRef, InstanceName, InstanceState, MediumKind};
use thiserror::Error;

/// Device Registry resolution failure for a single reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Declared but not resolvable yet (owning subsystem still initializing).
    #[error("Dependency not ready: {0}")]
    DependencyNotReady(ComponentRef),

    /// Unknown to the registry and not expected to appear later.
    #[error("Invalid device reference: {0}")]
    ReferenceInvalid(ComponentRef),
}

impl ResolveError {
    /// Whether retrying the whole create later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DependencyNotReady(_))
    }
}

/// Component Acquirer failure: which declared index stopped acquisition.
///
/// The handles for `[0, index)` stay with the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to acquire component {index}: {cause}")]
pub struct AcquireError {
    /// Index of the failing reference in declared order.
    pub index: usize,
    /// Why the registry refused it.
    pub cause: ResolveError,
}

/// Concatenation Engine rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Nothing to concatenate.
    #[error("Aggregation failed: empty component set")]
    EmptyComponentSet,

    /// Handle count does not match the declared component count.
    #[error("Aggregation failed: {got} of {expected} components acquired")]
    IncompleteComponentSet {
        /// Handles supplied
        got: usize,
        /// Components declared
        expected: usize,
    },

    /// A component reports zero capacity.
    #[error("Aggregation failed: component {index} has zero size")]
    ZeroSizedComponent {
        /// Offending component
        index: usize,
    },

    /// Components of different media cannot share one address space.
    #[error("Aggregation failed: component {index} is {found:?}, expected {expected:?}")]
    IncompatibleMedium {
        /// Offending component
        index: usize,
        /// Medium of component 0
        expected: MediumKind,
        /// Medium of the offending component
        found: MediumKind,
    },

    /// Write units must match across components.
    #[error("Aggregation failed: component {index} write size {found}, expected {expected}")]
    WriteSizeMismatch {
        /// Offending component
        index: usize,
        /// Write size of component 0
        expected: u32,
        /// Write size of the offending component
        found: u32,
    },

    /// Total size does not fit the address space.
    #[error("Aggregation failed: composite size overflows")]
    SizeOverflow,

    /// Engine-specific rejection.
    #[error("Aggregation failed: {0}")]
    Rejected(String),
}

/// Publish surface failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Another live device already uses this name.
    #[error("Name conflict: {0} is already published")]
    NameConflict(InstanceName),

    /// Registry cannot accept new devices right now.
    #[error("Device registry unavailable")]
    RegistryUnavailable,
}

/// Non-retryable configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No components declared.
    #[error("Instance {0} declares no components")]
    EmptySpec(InstanceName),

    /// Instance name is blank.
    #[error("Instance name must not be empty")]
    EmptyInstanceName,

    /// A reference will never resolve.
    #[error("Component {index} of {instance} is invalid: {reference}")]
    InvalidReference {
        /// Owning instance
        instance: InstanceName,
        /// Index in declared order
        index: usize,
        /// The reference as declared
        reference: ComponentRef,
    },

    /// `activate` called on a context that already left `Uninitialized`.
    #[error("Instance {instance} is not fresh (state {state:?})")]
    NotFresh {
        /// Owning instance
        instance: InstanceName,
        /// Current state
        state: InstanceState,
    },
}

/// Outcome of a failed `create`. The instance is fully rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    /// Fatal configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A dependency is not ready; retry the whole create later.
    #[error("Deferred: component {index} ({reference}) not ready")]
    Deferred {
        /// Index in declared order
        index: usize,
        /// The reference that was not ready
        reference: ComponentRef,
    },

    /// Concatenation Engine refused the component set.
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] EngineError),

    /// Publish failed.
    #[error("Registration error: {0}")]
    Registration(#[from] PublishError),

    /// Internal bookkeeping could not be allocated.
    #[error("Resource error: {0}")]
    Resource(String),
}

impl CreateError {
    /// Stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Deferred { .. } => "deferred",
            Self::Aggregation(_) => "aggregation",
            Self::Registration(_) => "registration",
            Self::Resource(_) => "resource",
        }
    }

    /// Only `Deferred` invites a retry.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }

    /// Map an acquisition failure for `instance` to its create outcome.
    pub fn from_acquire(instance: &InstanceName, err: AcquireError) -> Self {
        match err.cause {
            ResolveError::DependencyNotReady(reference) => Self::Deferred {
                index: err.index,
                reference,
            },
            ResolveError::ReferenceInvalid(reference) => {
                Self::Config(ConfigError::InvalidReference {
                    instance: instance.clone(),
                    index: err.index,
                    reference,
                })
            }
        }
    }
}

/// Broken lifecycle invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Handles are not the declared prefix.
    #[error("Acquired handles are not a declared prefix: {0}")]
    NonPrefixAcquisition(String),

    /// Composite present without a complete handle set.
    #[error("Composite device without complete component set: {held}/{declared}")]
    IncompleteComposite {
        /// Handles held
        held: usize,
        /// Components declared
        declared: usize,
    },

    /// Torn-down context still owns resources.
    #[error("Removed instance still holds {handles} handles (composite: {composite})")]
    ResidualResources {
        /// Handles still held
        handles: usize,
        /// Whether a composite is still present
        composite: bool,
    },
}
