//! End-to-end tests of the bridge state machine over a mocked target.

use pretty_assertions::assert_eq;
use test_case::test_case;

use pulp_bridge::{
    create_bridge, BinaryImage, BinarySet, Bridge, BridgeState, ConfigError, ConfigTree, Error,
    FakeTransport, RegisterId, RunState, TransportError,
};

fn config(chip: &str) -> ConfigTree {
    ConfigTree::from_yaml_str(&format!("board:\n  pulp_chip:\n    name: {chip}\n")).unwrap()
}

fn attached(chip: &str) -> (Bridge, FakeTransport) {
    attached_with(chip, BinarySet::new())
}

fn attached_with(chip: &str, binaries: BinarySet) -> (Bridge, FakeTransport) {
    let mut bridge = create_bridge(&config(chip), binaries, false).unwrap();
    let link = FakeTransport::new();
    bridge.attach(Box::new(link.clone())).unwrap();
    (bridge, link)
}

#[test_case("gap", "gap")]
#[test_case("wolfe", "wolfe")]
#[test_case("fulmine", "fulmine")]
#[test_case("unknown-chip-123", "generic"; "unknown identity falls back to generic")]
fn selector_resolves_configured_chip(chip: &str, implementation: &str) {
    let bridge = create_bridge(&config(chip), BinarySet::new(), false).unwrap();
    assert_eq!(bridge.chip_name(), implementation);
    assert_eq!(bridge.state(), BridgeState::Unattached);
}

#[test]
fn selector_rejects_missing_chip_declaration() {
    let tree = ConfigTree::from_yaml_str("board:\n  name: gapuino\n").unwrap();
    let error = create_bridge(&tree, BinarySet::new(), false).unwrap_err();
    assert!(matches!(
        error,
        Error::Configuration(ConfigError::ChipNodeMissing { .. })
    ));
}

#[test]
fn selector_rejects_ambiguous_chip_declaration() {
    let tree = ConfigTree::from_yaml_str(
        "a:\n  pulp_chip:\n    name: gap\nb:\n  pulp_chip:\n    name: wolfe\n",
    )
    .unwrap();
    let error = create_bridge(&tree, BinarySet::new(), false).unwrap_err();
    assert!(matches!(
        error,
        Error::Configuration(ConfigError::ChipNodeAmbiguous { count: 2, .. })
    ));
}

#[test]
fn selector_rejects_unnamed_chip_declaration() {
    let tree = ConfigTree::from_yaml_str("board:\n  pulp_chip:\n    name: \"\"\n").unwrap();
    let error = create_bridge(&tree, BinarySet::new(), false).unwrap_err();
    assert!(matches!(
        error,
        Error::Configuration(ConfigError::ChipNameMissing)
    ));
}

#[test]
fn selector_rejects_unparseable_parameters() {
    let tree =
        ConfigTree::from_yaml_str("board:\n  pulp_chip:\n    name: gap\n    core_count: many\n")
            .unwrap();
    let error = create_bridge(&tree, BinarySet::new(), false).unwrap_err();
    assert!(matches!(
        error,
        Error::Configuration(ConfigError::InvalidField {
            name: "core_count",
            ..
        })
    ));
}

#[test]
fn selector_rejects_oversized_core_count() {
    // Cores are addressed by one byte on the link; a count above 255 must
    // be rejected at parse time instead of silently truncated.
    let tree =
        ConfigTree::from_yaml_str("board:\n  pulp_chip:\n    name: gap\n    core_count: 300\n")
            .unwrap();
    let error = create_bridge(&tree, BinarySet::new(), false).unwrap_err();
    assert!(matches!(
        error,
        Error::Configuration(ConfigError::InvalidField {
            name: "core_count",
            ..
        })
    ));
}

#[test]
fn operations_require_attachment() {
    let mut bridge = create_bridge(&config("gap"), BinarySet::new(), false).unwrap();
    let mut buffer = [0u8; 4];
    assert!(matches!(
        bridge.read_memory(0x1C00_0000, &mut buffer),
        Err(Error::InvalidState {
            operation: "read_memory",
            ..
        })
    ));
    assert!(matches!(bridge.run(), Err(Error::InvalidState { .. })));
    assert!(matches!(bridge.load(), Err(Error::InvalidState { .. })));
}

#[test]
fn detach_is_terminal_and_idempotent() {
    let (mut bridge, link) = attached("gap");
    bridge.detach().unwrap();
    assert_eq!(bridge.state(), BridgeState::Detached);
    assert!(!link.is_open());

    // Second detach is a no-op.
    bridge.detach().unwrap();

    assert!(matches!(bridge.run(), Err(Error::InvalidState { .. })));
    assert!(matches!(
        bridge.attach(Box::new(FakeTransport::new())),
        Err(Error::InvalidState {
            operation: "attach",
            ..
        })
    ));
}

#[test]
fn dropping_an_attached_bridge_releases_the_transport() {
    let link = FakeTransport::new();
    {
        let mut bridge = create_bridge(&config("gap"), BinarySet::new(), false).unwrap();
        bridge.attach(Box::new(link.clone())).unwrap();
        assert!(link.is_open());
    }
    assert!(!link.is_open());
}

#[test]
fn same_state_transitions_are_no_ops() {
    let (mut bridge, link) = attached("gap");
    assert_eq!(bridge.state(), BridgeState::Attached(RunState::Stopped));

    bridge.stop().unwrap();
    assert_eq!(bridge.state(), BridgeState::Attached(RunState::Stopped));

    bridge.run().unwrap();
    assert!(link.is_running(0));
    let requests_after_first_run = link.operations().len();

    // Already running; no further traffic.
    bridge.run().unwrap();
    assert_eq!(link.operations().len(), requests_after_first_run);

    bridge.stop().unwrap();
    bridge.stop().unwrap();
    assert!(!link.is_running(0));
    assert_eq!(bridge.state(), BridgeState::Attached(RunState::Stopped));
}

#[test]
fn load_streams_images_into_target_memory() {
    let mut binaries = BinarySet::new();
    binaries.push(BinaryImage::new(0x1C00_0000, vec![0xAA; 64]));
    binaries.push(BinaryImage::new(0x1C00_1000, (0..32).collect()));
    let (mut bridge, link) = attached_with("gap", binaries);

    bridge.load().unwrap();
    assert_eq!(link.memory(0x1C00_0000, 64), vec![0xAA; 64]);
    assert_eq!(link.memory(0x1C00_1000, 32), (0..32).collect::<Vec<u8>>());
}

#[test]
fn load_rejects_images_outside_the_memory_map() {
    let (mut bridge, link) = attached("gap");
    let writes_after_attach = link.memory_write_requests();

    let mut binaries = BinarySet::new();
    binaries.push(BinaryImage::new(0x3000_0000, vec![0u8; 64]));
    let error = bridge.load_images(&binaries).unwrap_err();
    assert!(matches!(
        error,
        Error::OutOfRange {
            address: 0x3000_0000,
            length: 64,
            ..
        }
    ));
    // The bounds check ran before any byte went over the link.
    assert_eq!(link.memory_write_requests(), writes_after_attach);
}

#[test]
fn load_rejects_images_overflowing_the_address_space() {
    let (mut bridge, link) = attached("gap");
    let writes_after_attach = link.memory_write_requests();

    // 64 bytes at u64::MAX - 8 would wrap past the top of the address
    // space; this must surface as out-of-range, not panic.
    let mut binaries = BinarySet::new();
    binaries.push(BinaryImage::new(u64::MAX - 8, vec![0u8; 64]));
    let error = bridge.load_images(&binaries).unwrap_err();
    assert!(matches!(
        error,
        Error::OutOfRange { address, length: 64, .. } if address == u64::MAX - 8
    ));
    assert_eq!(link.memory_write_requests(), writes_after_attach);

    // The same guard covers raw accesses near the top of the address space.
    let mut buffer = [0u8; 16];
    assert!(matches!(
        bridge.read_memory(u64::MAX - 4, &mut buffer),
        Err(Error::OutOfRange { .. })
    ));
    assert!(matches!(
        bridge.write_memory(u64::MAX - 4, &buffer),
        Err(Error::OutOfRange { .. })
    ));
}

#[test]
fn load_rejects_images_straddling_a_region_end() {
    let tree = ConfigTree::from_yaml_str(
        "board:\n  pulp_chip:\n    name: gap\n    l2_size: \"0x2000\"\n",
    )
    .unwrap();
    let mut bridge = create_bridge(&tree, BinarySet::new(), false).unwrap();
    bridge.attach(Box::new(FakeTransport::new())).unwrap();

    let mut fits = BinarySet::new();
    fits.push(BinaryImage::new(0x1C00_1000, vec![0u8; 64]));
    bridge.load_images(&fits).unwrap();

    let mut too_far = BinarySet::new();
    too_far.push(BinaryImage::new(0x1C00_5000, vec![0u8; 64]));
    assert!(matches!(
        bridge.load_images(&too_far),
        Err(Error::OutOfRange { .. })
    ));
}

#[test]
fn partial_load_failure_leaves_earlier_images_in_place() {
    let mut binaries = BinarySet::new();
    binaries.push(BinaryImage::new(0x1C00_0000, vec![0x11; 16]));
    binaries.push(BinaryImage::new(0x1C00_2000, vec![0x22; 16]));
    let (mut bridge, link) = attached_with("gap", binaries);

    // One more request goes through, then the link drops.
    link.fail_sends_after(1);
    let error = bridge.load().unwrap_err();
    assert!(matches!(error, Error::Transport(TransportError::Io(_))));
    assert_eq!(link.memory(0x1C00_0000, 16), vec![0x11; 16]);
    assert_eq!(link.memory(0x1C00_2000, 16), vec![0; 16]);
}

#[test]
fn step_requires_stopped_core() {
    let (mut bridge, _link) = attached("gap");

    bridge.step().unwrap();
    assert_eq!(bridge.state(), BridgeState::Attached(RunState::Stopped));

    bridge.run().unwrap();
    assert!(matches!(
        bridge.step(),
        Err(Error::InvalidState {
            operation: "step",
            ..
        })
    ));
}

#[test]
fn live_memory_access_depends_on_the_chip() {
    // GAP8 cannot touch memory while cores run.
    let (mut gap, _) = attached("gap");
    gap.run().unwrap();
    let mut buffer = [0u8; 4];
    assert!(matches!(
        gap.read_memory(0x1C00_0000, &mut buffer),
        Err(Error::InvalidState { .. })
    ));

    // Mr. Wolf's debug unit arbitrates live accesses.
    let (mut wolfe, link) = attached("wolfe");
    wolfe.run().unwrap();
    link.preload_memory(0x1C00_0000, &[1, 2, 3, 4]);
    wolfe.read_memory(0x1C00_0000, &mut buffer).unwrap();
    assert_eq!(buffer, [1, 2, 3, 4]);
}

#[test]
fn register_access_is_validated_against_the_declared_set() {
    let (mut bridge, link) = attached("gap");

    bridge.write_register(2u16, 0xdead_beef).unwrap();
    assert_eq!(link.register(0, 2), Some(0xdead_beef));
    assert_eq!(bridge.read_register(2u16).unwrap(), 0xdead_beef);

    // Id 42 is outside x0-x31/pc/npc/cause; nothing reaches the target.
    let error = bridge.write_register(42u16, 7).unwrap_err();
    assert!(matches!(
        error,
        Error::UnknownRegister {
            id: RegisterId(42),
            ..
        }
    ));
    assert_eq!(link.register(0, 42), None);
}

#[test]
fn start_jumps_to_the_entry_point() {
    let mut binaries = BinarySet::new();
    binaries.push(BinaryImage::new(0x1C00_0000, vec![0u8; 64]).with_entry_point(0x1C00_0100));
    let (mut bridge, link) = attached_with("gap", binaries);

    bridge.load().unwrap();
    bridge.start().unwrap();

    // Entry point landed in the fabric controller's PC, all cores released.
    assert_eq!(link.register(0, 32), Some(0x1C00_0100));
    assert!(link.is_running(0));
    assert!(link.is_running(8));
    assert_eq!(bridge.state(), BridgeState::Attached(RunState::Running));
}

#[test]
fn malformed_handshake_reply_is_a_protocol_error() {
    let mut bridge = create_bridge(&config("gap"), BinarySet::new(), false).unwrap();
    let link = FakeTransport::new().with_handshake_reply(*b"BOOT");
    let error = bridge.attach(Box::new(link.clone())).unwrap_err();
    assert!(matches!(error, Error::Protocol { operation: "attach", .. }));

    // The failed attach released the transport and left the bridge usable.
    assert_eq!(bridge.state(), BridgeState::Unattached);
    assert!(!link.is_open());
}

#[test]
fn timeout_degrades_the_run_state_until_reattach() {
    let (mut bridge, link) = attached("gap");

    link.timeout_next_receive();
    let error = bridge.run().unwrap_err();
    assert!(matches!(
        error,
        Error::Transport(TransportError::Timeout(_))
    ));
    assert_eq!(bridge.state(), BridgeState::Attached(RunState::Unknown));

    // Everything but detach is rejected in the degraded condition.
    let mut buffer = [0u8; 4];
    assert!(matches!(
        bridge.read_memory(0x1C00_0000, &mut buffer),
        Err(Error::InvalidState { .. })
    ));
    assert!(matches!(bridge.run(), Err(Error::InvalidState { .. })));

    bridge.detach().unwrap();

    // Recovery happens over a fresh bridge and attachment.
    let mut bridge = create_bridge(&config("gap"), BinarySet::new(), false).unwrap();
    bridge.attach(Box::new(link.clone())).unwrap();
    assert_eq!(bridge.state(), BridgeState::Attached(RunState::Stopped));
}

#[test]
fn reset_returns_the_target_to_stopped() {
    let (mut bridge, link) = attached("fulmine");
    bridge.run().unwrap();
    assert!(link.is_running(0));

    bridge.reset().unwrap();
    assert_eq!(bridge.state(), BridgeState::Attached(RunState::Stopped));
    assert!(!link.is_running(0));
}

#[test]
fn gap_attach_programs_the_soc_fll() {
    let tree = ConfigTree::from_yaml_str(
        "board:\n  pulp_chip:\n    name: gap\n    clock_hz: 100000000\n",
    )
    .unwrap();
    let mut bridge = create_bridge(&tree, BinarySet::new(), false).unwrap();
    let link = FakeTransport::new();
    bridge.attach(Box::new(link.clone())).unwrap();

    let fll = link.memory(0x1A10_0004, 4);
    assert_eq!(u32::from_le_bytes(fll.try_into().unwrap()), 100_000_000);
}

#[test]
fn word_accessors_round_trip() {
    let (mut bridge, _link) = attached("wolfe");
    bridge.write_word_32(0x1C00_0040, 0x0102_0304).unwrap();
    assert_eq!(bridge.read_word_32(0x1C00_0040).unwrap(), 0x0102_0304);
}
