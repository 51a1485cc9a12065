//! Structured log helpers.
//!
//! Lifecycle events carry a consistent field set so log queries can follow
//! one instance through create, rollback and teardown:
//! - `subsystem`: always `virt-concat`
//! - `instance`: instance name
//! - `state`: lifecycle state at the time of the event

/// Log an instance lifecycle event with the standard fields.
///
/// ```rust,ignore
/// log_instance_event!(info, "flash", "Active", "Instance probed", components = 3);
/// ```
#[macro_export]
macro_rules! log_instance_event {
    ($level:ident, $instance:expr, $state:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = "virt-concat",
            instance = %$instance,
            state = ?$state,
            $($($field)*,)?
            $msg
        )
    };
}
