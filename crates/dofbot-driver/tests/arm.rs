use dofbot_driver::{
    ArmConfig, DeviceError, DofbotArm, JointCache, JointLimit, JointTargets, KinestheticConfig,
    KinestheticSession, RobotRegistry, SimulatedDofbot, TimingConfig,
};
use dofbot_protocol::{angle_to_raw, JointId, ServoSpec};
use safety_guard::SafetyLimit;
use serial_transport::MockTransport;

fn j(n: u8) -> JointId {
    JointId::new(n).unwrap()
}

fn test_config() -> ArmConfig {
    ArmConfig {
        timing: TimingConfig {
            command_delay_ms: 0,
            settle_ms: 0,
            read_gap_ms: 0,
        },
        home_duration_ms: 0,
        ..ArmConfig::new("sim")
    }
}

fn targets(items: &[(u8, f64)]) -> JointTargets {
    items.iter().map(|&(n, a)| (j(n), a)).collect()
}

#[test]
fn connect_enables_torque_and_moves_home() {
    let sim = SimulatedDofbot::new();
    let _arm = DofbotArm::connect(sim.transport(), test_config()).unwrap();
    assert!(sim.torque());
    assert_eq!(sim.led(), (0, 255, 0));
    assert_eq!(sim.raw_position(j(6)), 3100);
    assert_eq!(sim.last_duration_ms(), Some(0));
}

#[test]
fn read_only_connect_leaves_arm_alone() {
    let sim = SimulatedDofbot::new();
    let before = sim.raw_position(j(6));
    let config = ArmConfig {
        read_only: true,
        ..test_config()
    };
    let arm = DofbotArm::connect(sim.transport(), config).unwrap();
    assert!(arm.is_read_only());
    assert!(!sim.torque());
    assert_eq!(sim.led(), (0, 255, 0));
    assert_eq!(sim.raw_position(j(6)), before);
    assert_eq!(sim.last_duration_ms(), None);
}

#[test]
fn invalid_config_is_rejected_before_io() {
    let port = MockTransport::new();
    let handle = port.handle();
    let config = ArmConfig {
        max_relative_target: Some(SafetyLimit::Uniform(f64::NAN)),
        ..test_config()
    };
    assert!(matches!(
        DofbotArm::connect(port, config),
        Err(DeviceError::InvalidConfig(_))
    ));
    assert!(handle.written().is_empty());
}

#[test]
fn large_steps_are_rate_limited() {
    let sim = SimulatedDofbot::new();
    let mut arm = DofbotArm::connect(sim.transport(), test_config()).unwrap();
    let mut cache = JointCache::new();

    let sent = arm
        .send_action(&targets(&[(1, 150.0)]), &mut cache)
        .unwrap();
    assert_eq!(sent[&j(1)], 120.0);
    assert_eq!(sent.len(), 6);
    assert_eq!(
        sim.raw_position(j(1)),
        angle_to_raw(120.0, ServoSpec::for_joint(j(1)))
    );
    // joints absent from the action hold where they are
    assert!((sent[&j(6)] - 180.0).abs() < 0.1);
    assert_eq!(sim.last_duration_ms(), Some(100));
    assert_eq!(cache.last_known(j(1)), Some(90.0));
}

#[test]
fn joint_limits_clip_after_rate_limit() {
    let sim = SimulatedDofbot::new();
    let mut config = test_config();
    config.max_relative_target = None;
    config
        .joint_limits
        .insert("joint_1".into(), JointLimit { min: 10.0, max: 170.0 });
    let mut arm = DofbotArm::connect(sim.transport(), config).unwrap();
    let mut cache = JointCache::new();

    let sent = arm
        .send_action(&targets(&[(1, 175.0), (2, 5.0)]), &mut cache)
        .unwrap();
    assert_eq!(sent[&j(1)], 170.0);
    assert_eq!(sent[&j(2)], 5.0);
}

#[test]
fn unreadable_joint_without_cache_is_not_rate_limited() {
    let sim = SimulatedDofbot::new();
    let mut arm = DofbotArm::connect(sim.transport(), test_config()).unwrap();
    let mut cache = JointCache::new();
    sim.mute(j(3), true);

    let sent = arm
        .send_action(&targets(&[(1, 150.0), (3, 10.0)]), &mut cache)
        .unwrap();
    assert_eq!(sent[&j(1)], 120.0);
    assert_eq!(sent[&j(3)], 10.0);
}

#[test]
fn unreadable_joint_uses_cached_present() {
    let sim = SimulatedDofbot::new();
    let mut arm = DofbotArm::connect(sim.transport(), test_config()).unwrap();
    let mut cache = JointCache::new();
    cache.record_success(j(3), 100.0);
    sim.mute(j(3), true);

    let sent = arm
        .send_action(&targets(&[(3, 10.0)]), &mut cache)
        .unwrap();
    assert_eq!(sent[&j(3)], 70.0);
}

#[test]
fn read_only_drops_actions() {
    let sim = SimulatedDofbot::new();
    let port = sim.transport();
    let handle = port.handle();
    let mut arm = DofbotArm::connect(port, test_config()).unwrap();
    arm.set_read_only(true);
    handle.take_written();

    let action = targets(&[(1, 10.0)]);
    let sent = arm.send_action(&action, &mut JointCache::new()).unwrap();
    assert_eq!(sent, action);
    assert!(handle.written().is_empty());
}

#[test]
fn observe_falls_back_to_cache_then_default() {
    let sim = SimulatedDofbot::new();
    let mut arm = DofbotArm::connect(sim.transport(), test_config()).unwrap();
    let mut cache = JointCache::new();

    sim.set_angle(j(3), 40.0);
    let obs = arm.observe(&mut cache).unwrap();
    assert!(obs.fallback.is_empty());
    assert!(obs.timestamp.is_some());
    assert!((obs.positions[&j(3)] - 40.0).abs() < 0.1);

    sim.mute(j(3), true);
    let obs = arm.observe(&mut cache).unwrap();
    assert_eq!(obs.fallback, vec![j(3)]);
    assert_eq!(Some(obs.positions[&j(3)]), cache.last_known(j(3)));
    assert_eq!(cache.fail_count(j(3)), 1);

    let mut fresh = JointCache::new();
    sim.mute(j(5), true);
    let obs = arm.observe(&mut fresh).unwrap();
    assert_eq!(obs.fallback, vec![j(3), j(5)]);
    assert_eq!(obs.positions[&j(3)], 90.0);
    assert_eq!(obs.positions[&j(5)], 135.0);
}

#[test]
fn observe_propagates_transport_failure() {
    let sim = SimulatedDofbot::new();
    let port = sim.transport();
    let handle = port.handle();
    let mut arm = DofbotArm::connect(port, test_config()).unwrap();
    handle.close();
    assert!(matches!(
        arm.observe(&mut JointCache::new()),
        Err(DeviceError::TransportUnavailable(_))
    ));
}

#[test]
fn disconnect_releases_torque_and_turns_led_red() {
    let sim = SimulatedDofbot::new();
    let arm = DofbotArm::connect(sim.transport(), test_config()).unwrap();
    let _port = arm.disconnect();
    assert!(!sim.torque());
    assert_eq!(sim.led(), (255, 0, 0));

    let sim = SimulatedDofbot::new();
    let config = ArmConfig {
        disable_torque_on_disconnect: false,
        ..test_config()
    };
    let arm = DofbotArm::connect(sim.transport(), config).unwrap();
    let _port = arm.disconnect();
    assert!(sim.torque());
}

#[test]
fn disconnect_survives_a_dead_port() {
    let sim = SimulatedDofbot::new();
    let port = sim.transport();
    let handle = port.handle();
    let arm = DofbotArm::connect(port, test_config()).unwrap();
    handle.close();
    let _port = arm.disconnect();
    assert!(sim.torque());
}

#[test]
fn kinesthetic_session_records_hand_moves() {
    let sim = SimulatedDofbot::new();
    let mut arm = DofbotArm::connect(sim.transport(), test_config()).unwrap();

    let mut session = KinestheticSession::start(&mut arm, KinestheticConfig::default()).unwrap();
    assert!(!sim.torque());
    sim.set_angle(j(1), 30.0);
    let action = session.action().unwrap();
    assert_eq!(action.len(), 6);
    assert!((action[&j(1)] - 30.0).abs() < 0.1);
    session.finish().unwrap();
    assert!(sim.torque());

    let session = KinestheticSession::start(
        &mut arm,
        KinestheticConfig {
            disable_torque: false,
        },
    )
    .unwrap();
    assert!(sim.torque());
    session.finish().unwrap();
}

#[test]
fn registry_builds_known_robots() {
    let registry = RobotRegistry::<MockTransport>::with_builtin();
    assert_eq!(registry.names(), vec!["dofbot_se"]);

    match registry.create("so100", test_config()) {
        Err(DeviceError::UnknownRobot { name, known }) => {
            assert_eq!(name, "so100");
            assert_eq!(known, "dofbot_se");
        }
        Err(other) => panic!("unexpected {other:?}"),
        Ok(_) => panic!("unknown robot type accepted"),
    }

    let arm = registry.create("dofbot_se", test_config()).unwrap();
    assert_eq!(arm.config().port, "sim");
}
