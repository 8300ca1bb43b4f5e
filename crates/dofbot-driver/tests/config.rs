use dofbot_driver::{load_config_file, ArmConfig, JointLimit};
use dofbot_protocol::JointId;
use safety_guard::SafetyLimit;
use std::io::Write;

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_yaml_with_defaults() {
    let file = write_yaml(
        r#"
port: /dev/ttyUSB0
timeout_ms: 250
max_relative_target:
  joint_1: 15
  joint_5: 45
joint_limits:
  joint_6: { min: 30, max: 180 }
timing:
  settle_ms: 500
"#,
    );
    let cfg = load_config_file(file.path()).unwrap();
    assert_eq!(cfg.port, "/dev/ttyUSB0");
    assert_eq!(cfg.baud_rate, 115_200);
    assert_eq!(cfg.timeout_ms, 250);
    assert_eq!(
        cfg.max_relative_target.as_ref().and_then(|l| l.max_delta("joint_5")),
        Some(45.0)
    );
    assert_eq!(
        cfg.joint_limit(JointId::new(6).unwrap()),
        JointLimit {
            min: 30.0,
            max: 180.0
        }
    );
    // a map replaces the defaults; unlisted joints fall back to the servo range
    assert_eq!(cfg.joint_limit(JointId::new(5).unwrap()).max, 270.0);
    assert_eq!(cfg.timing.settle_ms, 500);
    assert_eq!(cfg.timing.command_delay_ms, 10);
    assert_eq!(cfg.home_duration_ms, 2000);
    assert!(cfg.disable_torque_on_disconnect);
}

#[test]
fn scalar_rate_limit_and_read_only() {
    let file = write_yaml("port: COM3\nmax_relative_target: 12.5\nread_only: true\n");
    let cfg = load_config_file(file.path()).unwrap();
    assert_eq!(cfg.max_relative_target, Some(SafetyLimit::Uniform(12.5)));
    assert!(cfg.read_only);
}

#[test]
fn errors_name_the_file_and_the_problem() {
    let file = write_yaml("port: [unterminated\n");
    let err = load_config_file(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("parsing yaml"));

    let file = write_yaml("joint_limits:\n  joint_2: { min: -5, max: 90 }\n");
    let err = load_config_file(file.path()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("validating config"), "{msg}");
    assert!(msg.contains("joint_2"), "{msg}");

    let err = load_config_file("/nonexistent/dofbot.yaml").unwrap_err();
    assert!(format!("{err:#}").contains("reading config"));
}

#[test]
fn config_survives_a_yaml_round_trip() {
    let cfg = ArmConfig::new("/dev/ttyACM0");
    let text = serde_yaml::to_string(&cfg).unwrap();
    let file = write_yaml(&text);
    assert_eq!(load_config_file(file.path()).unwrap(), cfg);
}
