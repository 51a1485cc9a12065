//! # Lifecycle Integration
//!
//! The lifecycle controller driven against the in-memory device table and the
//! linear engine, with no test doubles in between.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::seq::SliceRandom;
    use rand::Rng;
    use vc_01_virt_concat::{
        CompositeDeviceSpec, CompositeLifecycleApi, ConfigError, CreateError, DeviceGeometry,
        EngineError, InMemoryDeviceTable, InstanceContext, InstanceState, LinearConcatEngine,
        MediumKind, VirtConcatDependencies, VirtConcatService,
    };

    const MIB: u64 = 1024 * 1024;

    type TableService =
        VirtConcatService<Arc<InMemoryDeviceTable>, LinearConcatEngine, Arc<InMemoryDeviceTable>>;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn service_over(table: &Arc<InMemoryDeviceTable>) -> TableService {
        VirtConcatService::new(VirtConcatDependencies {
            registry: Arc::clone(table),
            engine: LinearConcatEngine,
            publisher: Arc::clone(table),
        })
    }

    /// Table with `nand0`..`nand2` at 4, 4 and 8 MiB.
    fn board() -> Arc<InMemoryDeviceTable> {
        let table = Arc::new(InMemoryDeviceTable::new());
        table.register_device("nand0", DeviceGeometry::nand(4 * MIB));
        table.register_device("nand1", DeviceGeometry::nand(4 * MIB));
        table.register_device("nand2", DeviceGeometry::nand(8 * MIB));
        table
    }

    fn flash_spec() -> CompositeDeviceSpec {
        CompositeDeviceSpec::from_refs("flash", ["nand0", "nand1", "nand2"])
    }

    // =============================================================================
    // CREATE OUTCOMES
    // =============================================================================

    #[test]
    fn test_full_success_maps_offsets() {
        let table = board();
        let service = service_over(&table);

        let mut ctx = service.create(flash_spec()).unwrap();
        let device = ctx.device().unwrap();

        assert_eq!(device.size(), 16 * MIB);
        for (offset, component) in [
            (0, 0),
            (4 * MIB - 1, 0),
            (4 * MIB, 1),
            (8 * MIB - 1, 1),
            (8 * MIB, 2),
            (16 * MIB - 1, 2),
        ] {
            assert_eq!(device.locate(offset).unwrap().component, component);
        }
        assert!(device.locate(16 * MIB).is_none());
        assert!(table.is_published("flash"));
        assert_eq!(table.use_count("nand1"), Some(1));

        service.destroy(&mut ctx);
        assert!(!table.is_published("flash"));
        assert_eq!(table.outstanding_handles(), 0);
    }

    #[test]
    fn test_empty_spec_touches_nothing() {
        let table = board();
        let service = service_over(&table);

        let err = service
            .create(CompositeDeviceSpec::from_refs("flash", Vec::<String>::new()))
            .unwrap_err();

        assert!(matches!(err, CreateError::Config(ConfigError::EmptySpec(_))));
        assert_eq!(table.acquired_total(), 0);
    }

    #[test]
    fn test_not_ready_middle_component_defers() {
        let table = board();
        table.expect("nand9");
        let service = service_over(&table);

        let err = service
            .create(CompositeDeviceSpec::from_refs("flash", ["nand0", "nand9", "nand2"]))
            .unwrap_err();

        assert!(matches!(err, CreateError::Deferred { index: 1, .. }));
        assert_eq!(table.acquired_total(), 1);
        assert_eq!(table.released_total(), 1);
        assert_eq!(table.release_log()[0].as_str(), "nand0");
        assert_eq!(table.outstanding_handles(), 0);
        assert_eq!(table.use_count("nand2"), Some(0));
    }

    #[test]
    fn test_incompatible_medium_rolls_back_all() {
        let table = board();
        table.register_device(
            "nor0",
            DeviceGeometry::new(MIB, 64 * 1024, 2048, MediumKind::Nor),
        );
        let service = service_over(&table);

        let err = service
            .create(CompositeDeviceSpec::from_refs("flash", ["nand0", "nand1", "nor0"]))
            .unwrap_err();

        assert!(matches!(
            err,
            CreateError::Aggregation(EngineError::IncompatibleMedium { index: 2, .. })
        ));
        assert_eq!(table.acquired_total(), 3);
        assert_eq!(table.released_total(), 3);
        let log: Vec<String> = table
            .release_log()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(log, ["nor0", "nand1", "nand0"]);
        assert!(!table.is_published("flash"));
    }

    #[test]
    fn test_closed_table_is_registration_error() {
        let table = board();
        table.close();
        let service = service_over(&table);

        let err = service.create(flash_spec()).unwrap_err();

        assert_eq!(err.kind(), "registration");
        assert_eq!(table.outstanding_handles(), 0);
    }

    #[test]
    fn test_name_of_static_device_conflicts() {
        let table = board();
        let service = service_over(&table);

        let err = service
            .create(CompositeDeviceSpec::from_refs("nand2", ["nand0", "nand1"]))
            .unwrap_err();

        assert_eq!(err.kind(), "registration");
        assert_eq!(table.outstanding_handles(), 0);
    }

    // =============================================================================
    // TEARDOWN
    // =============================================================================

    #[test]
    fn test_double_destroy_both_outcomes() {
        let table = board();
        table.expect("later");
        let service = service_over(&table);

        let mut ok = service.create(flash_spec()).unwrap();
        let mut failed = InstanceContext::new(CompositeDeviceSpec::from_refs(
            "other",
            ["nand0", "later"],
        ));
        assert!(service.activate(&mut failed).is_err());

        for ctx in [&mut ok, &mut failed] {
            service.destroy(ctx);
            assert_eq!(table.outstanding_handles(), 0);
            service.destroy(ctx);
            assert_eq!(table.outstanding_handles(), 0);
            assert_eq!(ctx.state(), InstanceState::Removed);
        }
        assert_eq!(table.acquired_total(), table.released_total());
    }

    #[test]
    fn test_destroy_unstarted_context() {
        let table = board();
        let service = service_over(&table);
        let mut ctx = InstanceContext::new(flash_spec());

        service.destroy(&mut ctx);

        assert_eq!(ctx.state(), InstanceState::Removed);
        assert_eq!(table.acquired_total(), 0);
        assert_eq!(service.stats().teardowns, 0);
    }

    /// Random specs over a partly-ready table never leak a handle.
    #[test]
    fn test_random_specs_never_leak() {
        let mut rng = rand::thread_rng();
        let table = board();
        table.expect("pending0");
        table.expect("pending1");
        let service = service_over(&table);
        let pool = ["nand0", "nand1", "nand2", "pending0", "pending1", "ghost"];

        for round in 0..200 {
            let len = rng.gen_range(0..=4);
            let refs: Vec<&str> = (0..len)
                .map(|_| *pool.choose(&mut rng).unwrap_or(&"nand0"))
                .collect();
            let spec = CompositeDeviceSpec::from_refs(format!("c{round}"), refs);

            if let Ok(mut ctx) = service.create(spec) {
                assert_eq!(table.outstanding_handles(), ctx.held_handles());
                service.destroy(&mut ctx);
            }
            assert_eq!(table.outstanding_handles(), 0, "round {round}");
        }

        let stats = service.stats();
        assert_eq!(stats.handles_outstanding(), 0);
        assert_eq!(stats.create_attempts, 200);
    }
}
