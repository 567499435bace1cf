//! Drive configuration file tests.
//!
//! Loading `DriveConfig` from TOML files: defaults, frame variant names,
//! unknown field rejection and semantic validation.

use servo_common::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_drive_toml(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(format!("{name}.toml"));
    fs::write(&path, body).unwrap();
    path
}

const STANDARD_MULTI_MODE: &str = r#"
rx_pdo_type = "standard"
tx_pdo_type = "standard"
mode_of_operation = "profile_velocity"
use_multiple_modes_of_operation = true
position_encoder_resolution = 8192
motor_constant = 0.07
gear_ratio = 3.0
max_current_a = 6.0
drive_state_change_min_timeout_us = 1000
drive_state_change_max_timeout_us = 50000
min_successful_target_state_readings = 3
"#;

#[test]
fn test_load_standard_multi_mode() {
    let dir = TempDir::new().unwrap();
    let path = write_drive_toml(dir.path(), "joint_1", STANDARD_MULTI_MODE);

    let cfg = DriveConfig::load(&path).unwrap();
    cfg.validate().unwrap();

    assert_eq!(cfg.rx_pdo_type, RxPdoType::Standard);
    assert_eq!(cfg.tx_pdo_type, TxPdoType::Standard);
    assert_eq!(cfg.mode_of_operation, ModeOfOperation::ProfileVelocity);
    assert!(cfg.allows_mode_change());
    // backfilled from the drive during startup
    assert_eq!(cfg.nominal_current_a, 0.0);
    assert_eq!(cfg.config_run_sdo_verify_timeout_us, DEFAULT_SDO_VERIFY_TIMEOUT_US);
    assert_eq!(cfg.min_successful_target_state_readings, 3);
}

#[test]
fn test_every_variant_name_parses() {
    let dir = TempDir::new().unwrap();
    for (name, rx, tx) in [
        ("csp", RxPdoType::Csp, TxPdoType::Csp),
        ("cst", RxPdoType::Cst, TxPdoType::Cst),
        ("csv", RxPdoType::Csv, TxPdoType::Csv),
        ("cst_csp", RxPdoType::CstCsp, TxPdoType::CstCsp),
        ("pvm", RxPdoType::Pvm, TxPdoType::Pvm),
        ("na", RxPdoType::Na, TxPdoType::Na),
    ] {
        let body = STANDARD_MULTI_MODE
            .replace("rx_pdo_type = \"standard\"", &format!("rx_pdo_type = \"{name}\""))
            .replace("tx_pdo_type = \"standard\"", &format!("tx_pdo_type = \"{name}\""));
        let path = write_drive_toml(dir.path(), name, &body);
        let cfg = DriveConfig::load(&path).unwrap();
        assert_eq!((cfg.rx_pdo_type, cfg.tx_pdo_type), (rx, tx));
        assert!(!cfg.allows_mode_change(), "{name}");
    }
}

#[test]
fn test_missing_required_field() {
    let dir = TempDir::new().unwrap();
    let body = STANDARD_MULTI_MODE.replace("max_current_a = 6.0", "");
    let path = write_drive_toml(dir.path(), "incomplete", &body);
    assert!(matches!(DriveConfig::load(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_inverted_timeouts_fail_validation() {
    let dir = TempDir::new().unwrap();
    let body = STANDARD_MULTI_MODE.replace(
        "drive_state_change_max_timeout_us = 50000",
        "drive_state_change_max_timeout_us = 500",
    );
    let path = write_drive_toml(dir.path(), "inverted", &body);
    let cfg = DriveConfig::load(&path).unwrap();
    assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_config_serializes_back_to_toml() {
    let cfg = DriveConfig::from_toml_str(STANDARD_MULTI_MODE).unwrap();
    let text = toml::to_string(&cfg).unwrap();
    assert_eq!(DriveConfig::from_toml_str(&text).unwrap(), cfg);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        DriveConfig::load(&dir.path().join("absent.toml")),
        Err(ConfigError::FileNotFound(_))
    ));
}
