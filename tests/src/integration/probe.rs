//! # Probe Integration
//!
//! The runtime's probe loop: deferred instances resolved by a later pass,
//! nested composites, and teardown in reverse activation order.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use vc_01_virt_concat::{CompositeDeviceSpec, DeviceGeometry, InstanceName};
    use vc_runtime::{DriverError, RuntimeConfig, VirtConcatRuntime};

    const MIB: u64 = 1024 * 1024;

    fn config(raw: &str) -> RuntimeConfig {
        RuntimeConfig::from_json(raw).unwrap()
    }

    /// Three-level nesting declared outermost first.
    const NESTED: &str = r#"{
        "devices": [
            { "name": "nand0", "size": 1048576 },
            { "name": "nand1", "size": 1048576 },
            { "name": "nand2", "size": 2097152 },
            { "name": "nand3", "size": 4194304 }
        ],
        "nodes": [
            { "name": "outer", "devices": ["middle", "nand3"] },
            { "name": "middle", "devices": ["inner", "nand2"] },
            { "name": "inner", "devices": ["nand0", "nand1"] }
        ],
        "probe": { "max_passes": 5, "retry_delay_ms": 1 }
    }"#;

    #[tokio::test]
    async fn test_nested_chain_activates_in_dependency_order() {
        let mut runtime = VirtConcatRuntime::new(&config(NESTED)).unwrap();

        let summary = runtime.probe().await;

        assert_eq!(summary.active, 3);
        assert_eq!(summary.passes, 3);
        assert_eq!(
            runtime.driver().active_names(),
            &[
                InstanceName::new("inner"),
                InstanceName::new("middle"),
                InstanceName::new("outer"),
            ]
        );
        let outer = runtime.driver().instance("outer").unwrap();
        assert_eq!(outer.device().unwrap().size(), 8 * MIB);

        runtime.shutdown();
        let log: Vec<String> = runtime
            .table()
            .release_log()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(
            log,
            ["nand3", "middle", "nand2", "inner", "nand1", "nand0"]
        );
        assert_eq!(runtime.table().outstanding_handles(), 0);
    }

    #[tokio::test]
    async fn test_inner_composite_kept_while_outer_active() {
        let mut runtime = VirtConcatRuntime::new(&config(NESTED)).unwrap();
        runtime.probe().await;
        let inner = InstanceName::new("inner");

        let err = runtime.driver_mut().destroy_instance(&inner).unwrap_err();

        assert!(matches!(
            err,
            DriverError::InUse { ref dependents, .. } if dependents == &[InstanceName::new("middle")]
        ));
        for name in ["inner", "middle", "outer"] {
            assert!(runtime.table().is_published(name), "{name} withdrawn");
        }
        assert_eq!(runtime.table().use_count("nand0"), Some(1));
        assert_eq!(runtime.table().use_count("inner"), Some(1));
        assert_eq!(runtime.table().released_total(), 0);

        runtime.driver_mut().destroy_instance(&InstanceName::new("outer")).unwrap();
        runtime.driver_mut().destroy_instance(&InstanceName::new("middle")).unwrap();
        runtime.driver_mut().destroy_instance(&inner).unwrap();
        assert_eq!(runtime.table().outstanding_handles(), 0);
        runtime.shutdown();
    }

    #[tokio::test]
    async fn test_late_device_resolves_deferred_instance() {
        let raw = r#"{
            "devices": [{ "name": "nand0", "size": 1048576 }],
            "nodes": [{ "name": "flash", "devices": ["nand0", "usb0"] }],
            "probe": { "max_passes": 50, "retry_delay_ms": 5 }
        }"#;
        let mut runtime = VirtConcatRuntime::new(&config(raw)).unwrap();
        runtime.table().expect("usb0");
        let table = std::sync::Arc::clone(runtime.table());

        let hotplug = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            table.register_device("usb0", DeviceGeometry::nand(MIB));
        };
        let (summary, ()) = tokio::join!(runtime.probe(), hotplug);

        assert_eq!(summary.active, 1);
        assert!(summary.unresolved.is_empty());
        assert!(summary.passes > 1);
        assert!(runtime.table().is_published("flash"));

        let stats = runtime.driver().service().stats();
        assert!(stats.deferrals >= 1);
        assert_eq!(stats.activations, 1);
        assert_eq!(stats.handles_outstanding(), 2);

        runtime.shutdown();
        assert_eq!(runtime.driver().service().stats().handles_outstanding(), 0);
    }

    #[tokio::test]
    async fn test_fatal_errors_do_not_block_others() {
        let raw = r#"{
            "devices": [
                { "name": "nand0", "size": 1048576 },
                { "name": "nor0", "size": 65536, "erase_size": 4096, "write_size": 1, "kind": "nor" }
            ],
            "nodes": [
                { "name": "mixed", "devices": ["nand0", "nor0"] },
                { "name": "typo", "devices": ["nand7"] },
                { "name": "empty", "devices": [] },
                { "name": "flash", "devices": ["nand0"] }
            ],
            "probe": { "max_passes": 3, "retry_delay_ms": 1 }
        }"#;
        let mut runtime = VirtConcatRuntime::new(&config(raw)).unwrap();

        let summary = runtime.probe().await;

        assert_eq!(summary.active, 1);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.passes, 1);
        let kinds: Vec<&str> = runtime
            .driver()
            .failures()
            .iter()
            .map(|(_, err)| err.kind())
            .collect();
        assert_eq!(kinds, ["aggregation", "config", "config"]);
        assert_eq!(runtime.table().use_count("nand0"), Some(1));

        runtime.shutdown();
    }

    #[tokio::test]
    async fn test_destroy_then_resubmit() {
        let raw = r#"{
            "devices": [{ "name": "nand0", "size": 1048576 }],
            "nodes": [{ "name": "flash", "devices": ["nand0"] }]
        }"#;
        let mut runtime = VirtConcatRuntime::new(&config(raw)).unwrap();
        runtime.probe().await;
        let first_id = runtime
            .driver()
            .instance("flash")
            .and_then(|ctx| ctx.device())
            .map(|device| device.id())
            .unwrap();

        let name = InstanceName::new("flash");
        runtime.driver_mut().destroy_instance(&name).unwrap();
        assert!(!runtime.table().is_published("flash"));

        let spec = raw_spec("flash", &["nand0"]);
        runtime.driver_mut().submit(spec).unwrap();
        let summary = runtime.probe().await;

        assert_eq!(summary.active, 1);
        let second_id = runtime
            .driver()
            .instance("flash")
            .and_then(|ctx| ctx.device())
            .map(|device| device.id())
            .unwrap();
        assert_ne!(first_id, second_id);
        runtime.shutdown();
    }

    fn raw_spec(name: &str, refs: &[&str]) -> CompositeDeviceSpec {
        CompositeDeviceSpec::from_refs(name, refs.iter().copied())
    }
}
