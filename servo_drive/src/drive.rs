//! CiA 402 servo drive on a cyclic fieldbus.
//!
//! # Threading
//!
//! One bus scheduler thread calls [`Drive::update_read`] then
//! [`Drive::update_write`] every period. Any number of caller threads stage
//! commands, copy readings and request state changes concurrently. State is
//! split into independent lock domains:
//!
//! | Domain   | Contents                                        |
//! |----------|-------------------------------------------------|
//! | config   | `DriveConfig` (read-mostly)                     |
//! | staging  | staged command, active mode, mode-change policy |
//! | cycle    | PDO state machine, fresh-read flag, fault edge  |
//! | reading  | latest telemetry and accumulated errors         |
//!
//! Locks are never held across bus I/O. When two are held at once the order
//! is `cycle` then `reading`.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use servo_common::cia402::{DriveState, ModeOfOperation};
use servo_common::config::{ConfigLoader, Validate};
use servo_common::consts::{MAX_PDO_BYTES, STATE_CHANGE_POLL_INTERVAL_US};
use servo_common::drive::{
    Command, DriveConfig, Fieldbus, FieldbusExt, Reading, RxFrame, Scaling, StagedCommand,
    TxFrame, TxPdoType, od,
};
use servo_common::error::DriveErrorFlags;

use crate::error::{DriveError, DriveResult};
use crate::lifecycle::{PdoStateMachine, StateChangePolicy, StepOutcome};

/// Staged command and the mode of operation written with every frame.
#[derive(Debug, Clone, Copy)]
struct Staging {
    command: StagedCommand,
    active_mode: ModeOfOperation,
    allow_mode_change: bool,
}

impl Staging {
    fn from_config(cfg: &DriveConfig) -> Self {
        Self {
            command: StagedCommand::default(),
            active_mode: cfg.mode_of_operation,
            allow_mode_change: cfg.allows_mode_change(),
        }
    }
}

/// State shared between the cyclic read/write and state change requests.
#[derive(Debug)]
struct CycleState {
    machine: PdoStateMachine,
    /// A telemetry frame was decoded since the last state machine step.
    has_read: bool,
    /// Drive state was Fault on the previous read.
    in_fault: bool,
}

/// A CiA 402 servo drive.
pub struct Drive {
    name: String,
    address: u16,
    pub(crate) bus: Arc<dyn Fieldbus>,
    pub(crate) config: RwLock<DriveConfig>,
    staging: Mutex<Staging>,
    cycle: Mutex<CycleState>,
    state_changed: Condvar,
    pub(crate) reading: Mutex<Reading>,
    rx_pdo_size: AtomicU16,
    tx_pdo_size: AtomicU16,
}

impl Drive {
    /// Create a drive at bus `address` with a validated configuration.
    pub fn new(
        name: impl Into<String>,
        address: u16,
        bus: Arc<dyn Fieldbus>,
        config: DriveConfig,
    ) -> DriveResult<Self> {
        config.validate()?;
        let name = name.into();
        debug!(drive = %name, address, rx = ?config.rx_pdo_type, tx = ?config.tx_pdo_type, "drive created");

        Ok(Self {
            name,
            address,
            bus,
            staging: Mutex::new(Staging::from_config(&config)),
            cycle: Mutex::new(CycleState {
                machine: PdoStateMachine::new(StateChangePolicy::from_config(&config)),
                has_read: false,
                in_fault: false,
            }),
            state_changed: Condvar::new(),
            reading: Mutex::new(Reading::new(Scaling::from_config(&config))),
            config: RwLock::new(config),
            rx_pdo_size: AtomicU16::new(0),
            tx_pdo_size: AtomicU16::new(0),
        })
    }

    /// Create a drive from a TOML configuration file.
    pub fn from_config_file(
        path: &Path,
        name: impl Into<String>,
        address: u16,
        bus: Arc<dyn Fieldbus>,
    ) -> DriveResult<Self> {
        let config = DriveConfig::load(path)?;
        Self::new(name, address, bus, config)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn address(&self) -> u16 {
        self.address
    }

    // ─── Configuration ──────────────────────────────────────────────

    /// Copy of the active configuration.
    pub fn configuration(&self) -> DriveConfig {
        self.config.read().clone()
    }

    /// Replace the configuration.
    ///
    /// Recomputes the mode-change permission, resets the active mode to the
    /// configured one and re-derives the reading scaling. An armed state
    /// change keeps running under the new timing.
    pub fn load_configuration(&self, config: DriveConfig) -> DriveResult<()> {
        config.validate()?;

        {
            let mut staging = self.staging.lock();
            staging.active_mode = config.mode_of_operation;
            staging.allow_mode_change = config.allows_mode_change();
        }
        self.cycle
            .lock()
            .machine
            .set_policy(StateChangePolicy::from_config(&config));
        self.reading.lock().configure(Scaling::from_config(&config));

        debug!(drive = %self.name, mode = ?config.mode_of_operation, "configuration loaded");
        *self.config.write() = config;
        Ok(())
    }

    /// Mode of operation written with every frame.
    pub fn active_mode(&self) -> ModeOfOperation {
        self.staging.lock().active_mode
    }

    // ─── Readings ───────────────────────────────────────────────────

    /// Copy of the latest reading.
    pub fn reading(&self) -> Reading {
        *self.reading.lock()
    }

    /// Copy the latest reading into `reading`.
    pub fn read_into(&self, reading: &mut Reading) {
        *reading = *self.reading.lock();
    }

    /// Clear accumulated error flags and the stored fault code.
    pub fn clear_errors(&self) {
        self.reading.lock().clear_errors();
    }

    pub(crate) fn add_error(&self, flags: DriveErrorFlags) {
        self.reading.lock().add_error(flags);
    }

    // ─── Command Staging ────────────────────────────────────────────

    /// Stage `command` for all following write cycles, replacing the
    /// previously staged one.
    ///
    /// A command requesting a different mode than the active one updates the
    /// mode only when the configuration allows mode changes; otherwise the
    /// setpoints are still staged, the active mode is kept and
    /// [`DriveError::ModeChangeRejected`] is returned. `Na` keeps the active
    /// mode.
    pub fn stage_command(&self, command: &Command) -> DriveResult<()> {
        let scaling = {
            let cfg = self.config.read();
            if cfg.use_raw_commands {
                Scaling::raw()
            } else {
                Scaling::from_config(&cfg)
            }
        };
        let staged = StagedCommand::stage(command, &scaling);

        let result = {
            let mut staging = self.staging.lock();
            staging.command = staged;
            let requested = command.mode;
            if !requested.is_resolved() || requested == staging.active_mode {
                Ok(())
            } else if staging.allow_mode_change {
                debug!(drive = %self.name, from = ?staging.active_mode, to = ?requested, "mode of operation changed");
                staging.active_mode = requested;
                Ok(())
            } else {
                Err(DriveError::ModeChangeRejected {
                    active: staging.active_mode,
                    requested,
                })
            }
        };

        if let Err(err) = &result {
            error!(drive = %self.name, "{err}: mode changes are not allowed for the active configuration");
            self.add_error(err.flag());
        }
        result
    }

    /// Copy of the currently staged command.
    pub fn staged_command(&self) -> StagedCommand {
        self.staging.lock().command
    }

    // ─── Cyclic I/O ─────────────────────────────────────────────────

    /// Read and decode one telemetry frame.
    ///
    /// Skipped with `TX_PDO_TYPE` when no frame layout is configured or the
    /// slave's telemetry frame is smaller than the layout.
    pub fn update_read(&self) -> DriveResult<()> {
        let variant = self.config.read().tx_pdo_type;
        let size = TxFrame::size_of(variant);
        let hw_size = self.tx_pdo_size.load(Ordering::Acquire) as usize;

        if variant == TxPdoType::Na || hw_size < size {
            let err = DriveError::UnsupportedTxFrame { variant, hw_size };
            error!(drive = %self.name, size, "{err}");
            self.add_error(err.flag());
            return Err(err);
        }

        let mut buf = [0u8; MAX_PDO_BYTES];
        self.bus.read_tx_pdo(self.address, &mut buf[..size])?;
        let frame = TxFrame::decode(variant, &buf[..size])?;
        let now = Instant::now();

        let (state, entered_fault) = {
            let mut cycle = self.cycle.lock();
            let state = {
                let mut reading = self.reading.lock();
                reading.update(&frame, now);
                reading.drive_state
            };
            cycle.has_read = true;
            let in_fault = state == DriveState::Fault;
            let entered = in_fault && !cycle.in_fault;
            cycle.in_fault = in_fault;
            (state, entered)
        };
        trace!(drive = %self.name, statusword = frame.statusword().raw(), %state, "read");

        if entered_fault {
            self.capture_fault_code();
        }
        if state == DriveState::Fault {
            let reading = self.reading.lock();
            error!(
                drive = %self.name,
                code = ?reading.fault_code,
                description = reading.fault_description().unwrap_or("unknown"),
                "drive is in state 'fault'"
            );
        }
        Ok(())
    }

    fn capture_fault_code(&self) {
        match self.bus.read_sdo::<u16>(self.address, od::ERROR_CODE) {
            Ok(code) => {
                self.reading.lock().fault_code = Some(code);
            }
            Err(err) => warn!(drive = %self.name, "failed to read error code: {err}"),
        }
    }

    /// Build and send one command frame.
    ///
    /// Requires a resolved mode of operation (`MODE_OF_OPERATION` otherwise).
    /// When a state change is pending and a frame was read since the last
    /// step, the state machine is advanced first; it owns the state bits of
    /// the control word while pending.
    pub fn update_write(&self) -> DriveResult<()> {
        let staging = *self.staging.lock();
        if !staging.active_mode.is_resolved() {
            let err = DriveError::ModeNotSet;
            error!(drive = %self.name, "{err}");
            self.add_error(err.flag());
            return Err(err);
        }

        let controlword = {
            let mut cycle = self.cycle.lock();
            if cycle.machine.is_pending() && cycle.has_read {
                self.engage_state_machine(&mut cycle, Instant::now());
            }
            if cycle.machine.is_pending() {
                cycle.machine.controlword()
            } else {
                cycle
                    .machine
                    .controlword()
                    .with_mode_bits(staging.command.control_bits)
            }
        };

        let variant = self.config.read().rx_pdo_type;
        let hw_size = self.rx_pdo_size.load(Ordering::Acquire) as usize;
        let frame = match RxFrame::from_staged(variant, &staging.command, controlword, staging.active_mode) {
            Some(frame) if frame.size() <= hw_size => frame,
            _ => {
                let err = DriveError::UnsupportedRxFrame { variant, hw_size };
                error!(drive = %self.name, "{err}");
                self.add_error(err.flag());
                return Err(err);
            }
        };

        let buf = frame.to_buf()?;
        trace!(drive = %self.name, controlword = controlword.raw(), "write");
        self.bus.write_rx_pdo(self.address, &buf)?;
        Ok(())
    }

    fn engage_state_machine(&self, cycle: &mut CycleState, now: Instant) {
        let current = self.reading.lock().drive_state;
        match cycle.machine.step(current, now) {
            StepOutcome::Completed => {
                debug!(drive = %self.name, state = %current, "state change completed");
                self.state_changed.notify_all();
            }
            StepOutcome::Transition(transition) => {
                debug!(drive = %self.name, %current, %transition, "state transition");
            }
            StepOutcome::Failed(err) => {
                warn!(drive = %self.name, "{err}");
                self.add_error(DriveErrorFlags::PDO_STATE_TRANSITION);
            }
            StepOutcome::FaultResetReleased => {
                debug!(drive = %self.name, "fault reset bit released");
            }
            StepOutcome::Confirming(_) | StepOutcome::Waiting | StepOutcome::Idle => {}
        }
        cycle.has_read = false;
    }

    // ─── PDO State Change ───────────────────────────────────────────

    /// Request `target` through the cyclic write path.
    ///
    /// Without `wait` this only arms the change and returns. With `wait` the
    /// caller blocks until the change completes or the configured maximum
    /// timeout passes. A timed-out change stays armed until re-armed.
    pub fn set_drive_state_via_pdo(&self, target: DriveState, wait: bool) -> DriveResult<()> {
        let mut cycle = self.cycle.lock();
        let armed_at = Instant::now();
        cycle.machine.arm(target, armed_at);
        cycle.has_read = false;
        debug!(drive = %self.name, %target, wait, "state change armed");

        if !wait {
            return Ok(());
        }

        let poll = Duration::from_micros(STATE_CHANGE_POLL_INTERVAL_US);
        loop {
            if cycle.machine.is_completed() {
                return Ok(());
            }
            let now = Instant::now();
            if cycle.machine.expired(now) {
                let err = DriveError::StateChangeTimeout {
                    target,
                    last: self.reading.lock().drive_state,
                    timeout: cycle.machine.policy().max_timeout,
                };
                warn!(drive = %self.name, "{err}");
                self.add_error(err.flag());
                return Err(err);
            }
            let deadline = armed_at + cycle.machine.policy().max_timeout;
            self.state_changed
                .wait_until(&mut cycle, deadline.min(now + poll));
        }
    }

    /// Whether the last PDO state change completed.
    pub fn state_change_completed(&self) -> bool {
        self.cycle.lock().machine.is_completed()
    }

    // ─── PDO Sizes ──────────────────────────────────────────────────

    /// Re-read the slave's process data sizes.
    pub fn auto_configure_pdo_sizes(&self) {
        let (rx, tx) = self.bus.hardware_pdo_sizes(self.address);
        self.rx_pdo_size.store(rx, Ordering::Release);
        self.tx_pdo_size.store(tx, Ordering::Release);
        debug!(drive = %self.name, rx, tx, "pdo sizes configured");
    }

    /// Cached write-direction frame size of the slave.
    #[inline]
    pub fn rx_pdo_size(&self) -> u16 {
        self.rx_pdo_size.load(Ordering::Acquire)
    }

    /// Cached read-direction frame size of the slave.
    #[inline]
    pub fn tx_pdo_size(&self) -> u16 {
        self.tx_pdo_size.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Drive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drive")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("rx_pdo_size", &self.rx_pdo_size())
            .field("tx_pdo_size", &self.tx_pdo_size())
            .finish_non_exhaustive()
    }
}
