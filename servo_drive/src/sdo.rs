//! Service channel operations: hardware bring-up, PDO mapping, shutdown and
//! synchronous state transitions.
//!
//! Everything here blocks on SDO transactions and must not be called from
//! the bus scheduler thread.

use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use servo_common::cia402::{ControlWord, DriveState, StatusWord, TransitionError, transitions_for};
use servo_common::consts::{PRE_OP_POLL_INTERVAL_MS, PRE_OP_TIMEOUT_MS, STARTUP_SETTLE_MS};
use servo_common::drive::od::{self, OdAddress, PdoEntry};
use servo_common::drive::{BusError, BusState, FieldbusExt, Scaling};

use crate::drive::Drive;
use crate::error::{DriveError, DriveResult};

impl Drive {
    // ─── Bring-up ───────────────────────────────────────────────────

    /// Configure the drive hardware over SDO.
    ///
    /// 1. Wait for PRE-OP and settle.
    /// 2. Read the nominal current from the motor data when configured as 0.
    /// 3. Map the configured PDO layouts.
    /// 4. Set the interpolation time period (1 ms) and the mode of operation
    ///    with verified writes.
    /// 5. Cache the slave's PDO sizes.
    ///
    /// Every step is attempted; any failure flags `CONFIGURATION` and the
    /// collected failures are returned.
    pub fn startup(&self) -> DriveResult<()> {
        let mut failures: Vec<String> = Vec::new();
        let mut check = |step: &str, result: Result<(), BusError>| {
            if let Err(err) = result {
                error!(drive = %self.name(), step, "{err}");
                failures.push(format!("{step}: {err}"));
            }
        };

        check(
            "wait for PRE-OP",
            self.bus.wait_for_state(
                BusState::PreOp,
                self.address(),
                Duration::from_millis(PRE_OP_POLL_INTERVAL_MS),
                Duration::from_millis(PRE_OP_TIMEOUT_MS),
            ),
        );
        thread::sleep(Duration::from_millis(STARTUP_SETTLE_MS));

        check("nominal current", self.backfill_nominal_current());
        check("pdo mapping", self.map_pdos());

        let (verify_delay, mode) = {
            let cfg = self.config.read();
            (cfg.sdo_verify_timeout(), cfg.mode_of_operation)
        };
        check(
            "interpolation period",
            self.bus.write_sdo_verified(
                self.address(),
                od::INTERPOLATION_TIME_PERIOD_VALUE,
                1u8,
                verify_delay,
            ),
        );
        thread::sleep(verify_delay);
        check(
            "interpolation index",
            self.bus.write_sdo_verified(
                self.address(),
                od::INTERPOLATION_TIME_PERIOD_INDEX,
                -3i8,
                verify_delay,
            ),
        );
        thread::sleep(verify_delay);
        check(
            "mode of operation",
            self.bus
                .write_sdo_verified(self.address(), od::MODES_OF_OPERATION, mode.raw(), verify_delay),
        );

        self.auto_configure_pdo_sizes();

        if !failures.is_empty() {
            let err = DriveError::Startup {
                name: self.name().to_string(),
                reason: failures.join("; "),
            };
            error!(drive = %self.name(), "hardware configuration not successful");
            self.add_error(err.flag());
            return Err(err);
        }

        info!(drive = %self.name(), rx = self.rx_pdo_size(), tx = self.tx_pdo_size(), "hardware configuration succeeded");
        thread::sleep(Duration::from_millis(STARTUP_SETTLE_MS));
        Ok(())
    }

    fn backfill_nominal_current(&self) -> Result<(), BusError> {
        if self.config.read().nominal_current_a != 0.0 {
            return Ok(());
        }

        let milliamps: u32 = self.bus.read_sdo(self.address(), od::MOTOR_NOMINAL_CURRENT)?;
        let scaling = {
            let mut cfg = self.config.write();
            cfg.nominal_current_a = milliamps as f64 / 1000.0;
            Scaling::from_config(&cfg)
        };
        self.reading.lock().configure(scaling);
        info!(drive = %self.name(), nominal_current_a = milliamps as f64 / 1000.0, "nominal current read from drive");
        Ok(())
    }

    /// Write the PDO mapping and sync manager assignment for both directions.
    fn map_pdos(&self) -> Result<(), BusError> {
        let (rx, tx) = {
            let cfg = self.config.read();
            (cfg.rx_pdo_type, cfg.tx_pdo_type)
        };

        let rx_entries = od::rx_mapping(rx);
        if rx_entries.is_empty() {
            warn!(drive = %self.name(), "no command frame layout configured");
        } else {
            self.map_pdo(od::RX_PDO_ASSIGN, od::RX_PDO_MAPPING, rx_entries)?;
        }

        let tx_entries = od::tx_mapping(tx);
        if tx_entries.is_empty() {
            warn!(drive = %self.name(), "no telemetry frame layout configured");
        } else {
            self.map_pdo(od::TX_PDO_ASSIGN, od::TX_PDO_MAPPING, tx_entries)?;
        }

        debug!(drive = %self.name(), ?rx, ?tx, "pdo mapping written");
        Ok(())
    }

    fn map_pdo(&self, assign: u16, mapping: u16, entries: &[PdoEntry]) -> Result<(), BusError> {
        let address = self.address();
        self.bus.write_sdo(address, OdAddress::new(assign, 0), 0u8)?;
        self.bus.write_sdo(address, OdAddress::new(mapping, 0), 0u8)?;
        for (sub, entry) in (1u8..).zip(entries) {
            self.bus
                .write_sdo(address, OdAddress::new(mapping, sub), entry.mapping_value())?;
        }
        self.bus
            .write_sdo(address, OdAddress::new(mapping, 0), entries.len() as u8)?;
        self.bus.write_sdo(address, OdAddress::new(assign, 1), mapping)?;
        self.bus.write_sdo(address, OdAddress::new(assign, 0), 1u8)
    }

    // ─── Shutdown ───────────────────────────────────────────────────

    /// Bring the drive down over SDO: quick stop when operation is enabled,
    /// then switch on disabled.
    ///
    /// Quick stop is skipped from any state below OperationEnabled, so a
    /// disabled drive is never enabled only to be quick stopped. Both steps
    /// are attempted; the first failure is returned.
    pub fn pre_shutdown(&self) -> DriveResult<()> {
        let quick_stop = match self.statusword_via_sdo() {
            Ok(sw) if sw.drive_state() == DriveState::OperationEnabled => {
                self.set_drive_state_via_sdo(DriveState::QuickStopActive)
            }
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        };
        let disable = self.set_drive_state_via_sdo(DriveState::SwitchOnDisabled);
        info!(drive = %self.name(), "pre-shutdown done");
        quick_stop.and(disable)
    }

    /// Return the slave to the INIT bus state.
    pub fn shutdown(&self) -> DriveResult<()> {
        self.bus.set_state(BusState::Init, self.address())?;
        info!(drive = %self.name(), "shutdown");
        Ok(())
    }

    // ─── Synchronous State Change ───────────────────────────────────

    /// Read the status word over SDO.
    pub fn statusword_via_sdo(&self) -> DriveResult<StatusWord> {
        let raw: u16 = self.bus.read_sdo(self.address(), od::STATUSWORD)?;
        Ok(StatusWord::from_raw(raw))
    }

    /// Write the control word over SDO.
    pub fn set_controlword_via_sdo(&self, controlword: ControlWord) -> DriveResult<()> {
        self.bus
            .write_sdo(self.address(), od::CONTROLWORD, controlword.raw())?;
        Ok(())
    }

    /// Walk the drive to `target` over SDO.
    ///
    /// The path is computed once from the state read at the start; every hop
    /// is written back to back without re-reading the status word. A failed
    /// write does not stop the walk: the remaining hops are still issued and
    /// the first failure is returned. Intended for startup and shutdown only.
    pub fn set_drive_state_via_sdo(&self, target: DriveState) -> DriveResult<()> {
        let current = match self.statusword_via_sdo() {
            Ok(sw) => sw.drive_state(),
            Err(err) => {
                error!(drive = %self.name(), "status word read failed: {err}");
                self.add_error(err.flag());
                return Err(err);
            }
        };

        let Some(path) = transitions_for(current, target) else {
            let err = DriveError::from(TransitionError::NoMapping {
                current,
                requested: target,
            });
            error!(drive = %self.name(), "{err}");
            self.add_error(err.flag());
            return Err(err);
        };

        if path.is_empty() {
            debug!(drive = %self.name(), state = %current, "drive state already reached");
            return Ok(());
        }

        let mut first_failure = None;
        for transition in path {
            match self.set_controlword_via_sdo(transition.control_word()) {
                Ok(()) => debug!(drive = %self.name(), %transition, "sdo state transition"),
                Err(err) => {
                    error!(drive = %self.name(), %transition, "sdo state transition failed: {err}");
                    self.add_error(err.flag());
                    first_failure.get_or_insert(err);
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}
