//! Drive integration tests against the simulated fieldbus.
//!
//! Verifies:
//! 1. Startup maps the PDOs, writes the mode and backfills the nominal current.
//! 2. PDO state changes walk the drive one transition per dwell.
//! 3. SDO state changes, pre-shutdown and shutdown.
//! 4. Command staging and the mode-change policy.
//! 5. Error flags for unsupported frames, missing mode and faults.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use servo_common::drive::od;
use servo_common::prelude::*;
use servo_drive::sim::{SimulatedBus, SimulatedDevice};
use servo_drive::{Drive, DriveError};
use tempfile::TempDir;

// ─── Helpers ────────────────────────────────────────────────────────

const ADDRESS: u16 = 1;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const CSP_DRIVE: &str = r#"
rx_pdo_type = "csp"
tx_pdo_type = "csp"
mode_of_operation = "cyclic_sync_position"
position_encoder_resolution = 4096
motor_constant = 0.1
gear_ratio = 2.0
nominal_current_a = 2.0
max_current_a = 4.0
config_run_sdo_verify_timeout_us = 500
drive_state_change_min_timeout_us = 1000
drive_state_change_max_timeout_us = 500000
min_successful_target_state_readings = 2
"#;

const STANDARD_MULTI_MODE: &str = r#"
rx_pdo_type = "standard"
tx_pdo_type = "standard"
mode_of_operation = "profile_velocity"
use_multiple_modes_of_operation = true
position_encoder_resolution = 8192
max_current_a = 6.0
config_run_sdo_verify_timeout_us = 500
drive_state_change_min_timeout_us = 1000
drive_state_change_max_timeout_us = 500000
min_successful_target_state_readings = 2
"#;

fn setup(body: &str, device: SimulatedDevice) -> (Arc<SimulatedBus>, Drive) {
    init_tracing();
    let bus = Arc::new(SimulatedBus::new().with_device(ADDRESS, device));
    let config = DriveConfig::from_toml_str(body).unwrap();
    let drive = Drive::new("joint_1", ADDRESS, bus.clone(), config).unwrap();
    (bus, drive)
}

fn started(body: &str) -> (Arc<SimulatedBus>, Drive) {
    let (bus, drive) = setup(body, SimulatedDevice::new(2_500));
    drive.startup().unwrap();
    (bus, drive)
}

/// Run read/write cycles until the armed state change completes.
fn cycle_until_completed(drive: &Drive, max_cycles: usize) -> bool {
    for _ in 0..max_cycles {
        drive.update_read().unwrap();
        drive.update_write().unwrap();
        if drive.state_change_completed() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn applied(bus: &SimulatedBus) -> Vec<u16> {
    bus.with(ADDRESS, |d| {
        d.applied_controlwords()
            .iter()
            .map(|cw| cw.raw())
            .collect()
    })
    .unwrap()
}

// ─── Startup ────────────────────────────────────────────────────────

#[test]
fn test_startup_maps_pdos_and_writes_mode() {
    let (bus, drive) = started(CSP_DRIVE);

    assert_eq!(drive.rx_pdo_size() as usize, RxFrame::size_of(RxPdoType::Csp));
    assert_eq!(drive.tx_pdo_size() as usize, TxFrame::size_of(TxPdoType::Csp));
    assert_eq!(
        bus.with(ADDRESS, |d| d.object(od::MODES_OF_OPERATION).map(<[u8]>::to_vec)),
        Some(Some(vec![8]))
    );
    assert_eq!(
        bus.with(ADDRESS, |d| d.object(od::INTERPOLATION_TIME_PERIOD_INDEX).map(<[u8]>::to_vec)),
        Some(Some(vec![(-3i8) as u8]))
    );
    assert!(drive.reading().errors().is_empty());
}

#[test]
fn test_startup_backfills_nominal_current() {
    let body = CSP_DRIVE.replace("nominal_current_a = 2.0\n", "");
    let (_bus, drive) = started(&body);

    assert_eq!(drive.configuration().nominal_current_a, 2.5);
    assert_eq!(drive.reading().scaling().current, 1000.0 / 2.5);
}

#[test]
fn test_startup_failure_flags_configuration() {
    let mut device = SimulatedDevice::new(2_500);
    device.set_read_only(od::MODES_OF_OPERATION);
    let (_bus, drive) = setup(CSP_DRIVE, device);

    match drive.startup() {
        Err(DriveError::Startup { name, reason }) => {
            assert_eq!(name, "joint_1");
            assert!(reason.contains("mode of operation"), "{reason}");
        }
        other => panic!("unexpected startup result: {other:?}"),
    }
    assert!(drive.reading().has_error(DriveErrorFlags::CONFIGURATION));
    // later steps still ran
    assert_eq!(drive.rx_pdo_size(), 13);
}

// ─── PDO State Change ───────────────────────────────────────────────

#[test]
fn test_enable_via_pdo_one_transition_per_dwell() {
    let (bus, drive) = started(CSP_DRIVE);

    drive
        .set_drive_state_via_pdo(DriveState::OperationEnabled, false)
        .unwrap();
    assert!(cycle_until_completed(&drive, 500));

    assert_eq!(applied(&bus), vec![0x06, 0x07, 0x0F]);
    assert_eq!(bus.with(ADDRESS, |d| d.drive_state()), Some(DriveState::OperationEnabled));
    assert_eq!(bus.with(ADDRESS, |d| d.mode()), Some(8));
    assert_eq!(drive.reading().drive_state, DriveState::OperationEnabled);

    // steady state keeps the enable control word
    drive.update_read().unwrap();
    drive.update_write().unwrap();
    assert_eq!(applied(&bus), vec![0x06, 0x07, 0x0F]);
}

#[test]
fn test_enable_with_standard_frames_and_multi_mode() {
    let (bus, drive) = started(STANDARD_MULTI_MODE);
    assert_eq!(drive.rx_pdo_size(), 3);
    assert_eq!(drive.tx_pdo_size(), 2);

    drive
        .set_drive_state_via_pdo(DriveState::OperationEnabled, false)
        .unwrap();
    let started_at = std::time::Instant::now();
    assert!(cycle_until_completed(&drive, 500));

    assert_eq!(applied(&bus), vec![0x06, 0x07, 0x0F]);
    // three transitions, each at least one dwell after the previous change
    assert!(started_at.elapsed() >= Duration::from_millis(3));
    assert_eq!(drive.reading().drive_state, DriveState::OperationEnabled);
    assert_eq!(bus.with(ADDRESS, |d| d.mode()), Some(3));
}

#[test]
fn test_blocking_state_change_with_scheduler_thread() {
    let (bus, drive) = started(CSP_DRIVE);
    let drive = Arc::new(drive);
    let stop = Arc::new(AtomicBool::new(false));

    let scheduler = {
        let drive = drive.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                drive.update_read().unwrap();
                drive.update_write().unwrap();
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let result = drive.set_drive_state_via_pdo(DriveState::OperationEnabled, true);
    stop.store(true, Ordering::Relaxed);
    scheduler.join().unwrap();

    result.unwrap();
    assert_eq!(bus.with(ADDRESS, |d| d.drive_state()), Some(DriveState::OperationEnabled));
}

#[test]
fn test_blocking_state_change_times_out() {
    let body = CSP_DRIVE.replace(
        "drive_state_change_max_timeout_us = 500000",
        "drive_state_change_max_timeout_us = 30000",
    );
    let (bus, drive) = started(&body);
    // control words never reach the device within the timeout
    bus.with(ADDRESS, |d| d.set_latency(100_000));
    let drive = Arc::new(drive);
    let stop = Arc::new(AtomicBool::new(false));

    let scheduler = {
        let drive = drive.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                drive.update_read().unwrap();
                drive.update_write().unwrap();
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let result = drive.set_drive_state_via_pdo(DriveState::OperationEnabled, true);
    stop.store(true, Ordering::Relaxed);
    scheduler.join().unwrap();

    assert_eq!(
        result,
        Err(DriveError::StateChangeTimeout {
            target: DriveState::OperationEnabled,
            last: DriveState::SwitchOnDisabled,
            timeout: Duration::from_millis(30),
        })
    );
    assert!(drive.reading().has_error(DriveErrorFlags::PDO_STATE_TRANSITION));
    assert!(!drive.state_change_completed());
}

#[test]
fn test_fault_code_captured_and_reset_via_pdo() {
    let (bus, drive) = started(CSP_DRIVE);
    bus.with(ADDRESS, |d| d.inject_fault(0x2310));

    drive.update_read().unwrap();
    let reading = drive.reading();
    assert_eq!(reading.drive_state, DriveState::Fault);
    assert_eq!(reading.fault_code, Some(0x2310));
    assert_eq!(reading.fault_description(), Some("continuous overcurrent"));

    drive
        .set_drive_state_via_pdo(DriveState::SwitchOnDisabled, false)
        .unwrap();
    assert!(cycle_until_completed(&drive, 500));
    assert_eq!(applied(&bus), vec![0x80, 0x00]);
    assert_eq!(bus.with(ADDRESS, |d| d.drive_state()), Some(DriveState::SwitchOnDisabled));

    drive.clear_errors();
    assert_eq!(drive.reading().fault_code, None);
}

#[test]
fn test_repeated_faults_reset_via_pdo() {
    let (bus, drive) = started(CSP_DRIVE);

    for code in [0x2310u16, 0x3210] {
        bus.with(ADDRESS, |d| d.inject_fault(code));
        drive.update_read().unwrap();
        assert_eq!(drive.reading().fault_code, Some(code));

        drive
            .set_drive_state_via_pdo(DriveState::SwitchOnDisabled, false)
            .unwrap();
        assert!(cycle_until_completed(&drive, 500));
        assert_eq!(bus.with(ADDRESS, |d| d.drive_state()), Some(DriveState::SwitchOnDisabled));
    }

    assert_eq!(applied(&bus), vec![0x80, 0x00, 0x80, 0x00]);
    assert!(!drive.reading().has_error(DriveErrorFlags::PDO_STATE_TRANSITION));
}

// ─── SDO State Change ───────────────────────────────────────────────

#[test]
fn test_sdo_state_change_and_shutdown() {
    let (bus, drive) = started(CSP_DRIVE);

    drive
        .set_drive_state_via_sdo(DriveState::OperationEnabled)
        .unwrap();
    assert_eq!(bus.with(ADDRESS, |d| d.drive_state()), Some(DriveState::OperationEnabled));
    assert_eq!(
        drive.statusword_via_sdo().unwrap().drive_state(),
        DriveState::OperationEnabled
    );

    // already reached is not an error
    drive
        .set_drive_state_via_sdo(DriveState::OperationEnabled)
        .unwrap();

    drive.pre_shutdown().unwrap();
    assert_eq!(applied(&bus), vec![0x06, 0x07, 0x0F, 0x02, 0x00]);
    assert_eq!(bus.with(ADDRESS, |d| d.drive_state()), Some(DriveState::SwitchOnDisabled));

    drive.shutdown().unwrap();
    assert_eq!(bus.with(ADDRESS, |d| d.bus_state()), Some(BusState::Init));
}

#[test]
fn test_pre_shutdown_without_quick_stop_below_enabled() {
    let (bus, drive) = started(CSP_DRIVE);
    drive.set_drive_state_via_sdo(DriveState::SwitchedOn).unwrap();

    drive.pre_shutdown().unwrap();
    assert_eq!(applied(&bus), vec![0x06, 0x07, 0x00]);
}

#[test]
fn test_sdo_state_change_to_fault_is_rejected() {
    let (_bus, drive) = started(CSP_DRIVE);

    let err = drive.set_drive_state_via_sdo(DriveState::Fault).unwrap_err();
    assert!(matches!(err, DriveError::Transition { .. }));
    assert!(drive.reading().has_error(DriveErrorFlags::SDO_STATE_TRANSITION));
}

#[test]
fn test_sdo_state_change_issues_every_hop_after_failure() {
    let (bus, drive) = started(CSP_DRIVE);
    bus.with(ADDRESS, |d| d.reject_writes(od::CONTROLWORD));

    let err = drive
        .set_drive_state_via_sdo(DriveState::OperationEnabled)
        .unwrap_err();
    assert!(matches!(err, DriveError::Bus { .. }));
    // shutdown, switch on and enable operation were all attempted
    assert_eq!(bus.with(ADDRESS, |d| d.rejected_writes()), Some(3));
    assert!(drive.reading().has_error(DriveErrorFlags::SDO_STATE_TRANSITION));
}

// ─── Command Staging ────────────────────────────────────────────────

#[test]
fn test_staged_command_supersedes_previous() {
    let (_bus, drive) = started(CSP_DRIVE);
    let scaling = Scaling::from_config(&drive.configuration());

    let mut command = Command::with_mode(ModeOfOperation::CyclicSyncPosition);
    command.target_position = 1.0;
    drive.stage_command(&command).unwrap();
    command.target_position = 2.0;
    drive.stage_command(&command).unwrap();

    assert_eq!(
        drive.staged_command().target_position,
        scaling.position_to_wire(2.0)
    );

    drive
        .set_drive_state_via_sdo(DriveState::OperationEnabled)
        .unwrap();
    drive.update_read().unwrap();
    drive.update_write().unwrap();
    drive.update_read().unwrap();
    let position = drive.reading().actual_position;
    assert!((position - 2.0).abs() < 1e-3, "{position}");
}

#[test]
fn test_mode_change_allowed_for_standard_multi_mode() {
    let (bus, drive) = started(STANDARD_MULTI_MODE);
    assert_eq!(drive.active_mode(), ModeOfOperation::ProfileVelocity);

    drive
        .stage_command(&Command::with_mode(ModeOfOperation::CyclicSyncVelocity))
        .unwrap();
    assert_eq!(drive.active_mode(), ModeOfOperation::CyclicSyncVelocity);

    // Na keeps the active mode
    drive.stage_command(&Command::default()).unwrap();
    assert_eq!(drive.active_mode(), ModeOfOperation::CyclicSyncVelocity);

    drive.update_read().unwrap();
    drive.update_write().unwrap();
    assert_eq!(bus.with(ADDRESS, |d| d.mode()), Some(9));
}

#[test]
fn test_mode_change_rejected_keeps_setpoints() {
    let (_bus, drive) = started(CSP_DRIVE);

    let mut command = Command::with_mode(ModeOfOperation::CyclicSyncTorque);
    command.target_position = 0.5;
    let err = drive.stage_command(&command).unwrap_err();

    assert_eq!(
        err,
        DriveError::ModeChangeRejected {
            active: ModeOfOperation::CyclicSyncPosition,
            requested: ModeOfOperation::CyclicSyncTorque,
        }
    );
    assert_eq!(drive.active_mode(), ModeOfOperation::CyclicSyncPosition);
    assert_ne!(drive.staged_command().target_position, 0);
    assert!(drive.reading().has_error(DriveErrorFlags::MODE_OF_OPERATION));
}

#[test]
fn test_raw_commands_bypass_scaling() {
    let body = format!("{CSP_DRIVE}use_raw_commands = true\n");
    let (_bus, drive) = started(&body);

    let mut command = Command::with_mode(ModeOfOperation::CyclicSyncPosition);
    command.target_position = 1234.0;
    command.target_torque = 20_000.0;
    drive.stage_command(&command).unwrap();

    let staged = drive.staged_command();
    assert_eq!(staged.target_position, 1234);
    assert_eq!(staged.target_torque, 20_000);
}

// ─── Error Flags ────────────────────────────────────────────────────

#[test]
fn test_io_before_startup_flags_frame_sizes() {
    let (_bus, drive) = setup(CSP_DRIVE, SimulatedDevice::new(2_500));

    assert_eq!(
        drive.update_read(),
        Err(DriveError::UnsupportedTxFrame {
            variant: TxPdoType::Csp,
            hw_size: 0,
        })
    );
    assert_eq!(
        drive.update_write(),
        Err(DriveError::UnsupportedRxFrame {
            variant: RxPdoType::Csp,
            hw_size: 0,
        })
    );
    let errors = drive.reading().errors();
    assert!(errors.contains(DriveErrorFlags::TX_PDO_TYPE | DriveErrorFlags::RX_PDO_TYPE));
    assert!(errors.has_fatal());
}

#[test]
fn test_slave_frame_smaller_than_layout() {
    let (bus, drive) = started(CSP_DRIVE);
    bus.with(ADDRESS, |d| d.override_pdo_sizes(3, 12));
    drive.auto_configure_pdo_sizes();

    drive.update_read().unwrap();
    assert_eq!(
        drive.update_write(),
        Err(DriveError::UnsupportedRxFrame {
            variant: RxPdoType::Csp,
            hw_size: 3,
        })
    );
}

#[test]
fn test_write_without_mode_flags_mode_of_operation() {
    let body = CSP_DRIVE.replace("\"cyclic_sync_position\"", "\"na\"");
    let (_bus, drive) = started(&body);

    assert_eq!(drive.update_write(), Err(DriveError::ModeNotSet));
    assert!(drive.reading().has_error(DriveErrorFlags::MODE_OF_OPERATION));
}

// ─── Configuration ──────────────────────────────────────────────────

#[test]
fn test_load_configuration_resets_mode_policy() {
    let (_bus, drive) = setup(STANDARD_MULTI_MODE, SimulatedDevice::default());
    drive
        .stage_command(&Command::with_mode(ModeOfOperation::CyclicSyncTorque))
        .unwrap();

    let csp = DriveConfig::from_toml_str(CSP_DRIVE).unwrap();
    drive.load_configuration(csp).unwrap();
    assert_eq!(drive.active_mode(), ModeOfOperation::CyclicSyncPosition);
    assert!(drive
        .stage_command(&Command::with_mode(ModeOfOperation::CyclicSyncTorque))
        .is_err());

    let mut invalid = drive.configuration();
    invalid.max_current_a = 0.0;
    assert!(matches!(
        drive.load_configuration(invalid),
        Err(DriveError::Config { .. })
    ));
}

#[test]
fn test_drive_from_config_file() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("joint_1.toml");
    std::fs::write(&path, CSP_DRIVE).unwrap();
    let bus = Arc::new(SimulatedBus::new().with_device(ADDRESS, SimulatedDevice::default()));

    let drive = Drive::from_config_file(&path, "joint_1", ADDRESS, bus.clone()).unwrap();
    assert_eq!(drive.configuration().rx_pdo_type, RxPdoType::Csp);

    let missing = dir.path().join("missing.toml");
    assert!(matches!(
        Drive::from_config_file(&missing, "joint_2", ADDRESS, bus),
        Err(DriveError::Config { .. })
    ));
}
