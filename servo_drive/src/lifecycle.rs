//! Asynchronous (PDO channel) drive state change negotiation.
//!
//! A state change is armed with a target and then advanced once per write
//! cycle that follows a fresh read. Each step either counts a confirming read
//! of the target state or, once the minimum dwell since the last control word
//! change has elapsed, selects the control word of the next single
//! transition. Time is an input so the machine can be driven with synthetic
//! instants.
//!
//! ```text
//!            arm(target)
//!   Idle ───────────────────► Pending { target, confirmations }
//!    ▲                              │
//!    └──── confirmations reached ───┘
//! ```

use std::time::{Duration, Instant};

use servo_common::cia402::{ControlWord, DriveState, StateTransition, TransitionError, next_transition};
use servo_common::drive::DriveConfig;

/// Timing and confirmation parameters of a PDO state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangePolicy {
    /// Minimum time between two control word changes.
    pub min_dwell: Duration,
    /// Time after which a waiting caller gives up.
    pub max_timeout: Duration,
    /// Consecutive reads of the target state that complete the change.
    pub min_confirmations: u32,
}

impl StateChangePolicy {
    pub fn from_config(cfg: &DriveConfig) -> Self {
        Self {
            min_dwell: cfg.state_change_min_timeout(),
            max_timeout: cfg.state_change_max_timeout(),
            min_confirmations: cfg.min_successful_target_state_readings.max(1),
        }
    }
}

impl Default for StateChangePolicy {
    fn default() -> Self {
        Self::from_config(&DriveConfig::default())
    }
}

/// Negotiation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending {
        target: DriveState,
        confirmations: u32,
    },
}

/// Result of one [`PdoStateMachine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No state change armed.
    Idle,
    /// Target read `n` times in a row, not yet enough.
    Confirming(u32),
    /// Dwell not elapsed; the previous control word is kept.
    Waiting,
    /// New control word selected for this transition.
    Transition(StateTransition),
    /// Fault reset bit dropped so the next transition 15 is a rising edge.
    FaultResetReleased,
    /// Target confirmed; the machine returned to idle.
    Completed,
    /// No transition leads to the target. The change stays armed.
    Failed(TransitionError),
}

/// PDO state change negotiation.
#[derive(Debug, Clone)]
pub struct PdoStateMachine {
    policy: StateChangePolicy,
    phase: Phase,
    armed_at: Option<Instant>,
    last_change: Option<Instant>,
    controlword: ControlWord,
    completed: bool,
}

impl PdoStateMachine {
    pub fn new(policy: StateChangePolicy) -> Self {
        Self {
            policy,
            phase: Phase::Idle,
            armed_at: None,
            last_change: None,
            controlword: ControlWord::DISABLE_VOLTAGE,
            completed: false,
        }
    }

    #[inline]
    pub fn policy(&self) -> &StateChangePolicy {
        &self.policy
    }

    /// Replace the policy; an armed change keeps running under the new values.
    pub fn set_policy(&mut self, policy: StateChangePolicy) {
        self.policy = policy;
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    /// Target of the armed change.
    pub fn target(&self) -> Option<DriveState> {
        match self.phase {
            Phase::Pending { target, .. } => Some(target),
            Phase::Idle => None,
        }
    }

    /// Whether the last armed change completed.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Control word owned by the state machine for the write path.
    #[inline]
    pub fn controlword(&self) -> ControlWord {
        self.controlword
    }

    /// Arm a change towards `target`, replacing any change in progress.
    ///
    /// The dwell timer starts now: the first transition is selected on the
    /// first step at least `min_dwell` later.
    pub fn arm(&mut self, target: DriveState, now: Instant) {
        self.phase = Phase::Pending {
            target,
            confirmations: 0,
        };
        self.armed_at = Some(now);
        self.last_change = Some(now);
        self.completed = false;
    }

    /// Whether the armed change has been running for at least `max_timeout`.
    pub fn expired(&self, now: Instant) -> bool {
        match (self.phase, self.armed_at) {
            (Phase::Pending { .. }, Some(armed_at)) => {
                now.saturating_duration_since(armed_at) >= self.policy.max_timeout
            }
            _ => false,
        }
    }

    /// Advance with the drive state decoded from a fresh read.
    ///
    /// The fault reset bit is only held while the drive reads Fault; a fault
    /// reset is always issued as a 0 to 1 edge of that bit.
    pub fn step(&mut self, current: DriveState, now: Instant) -> StepOutcome {
        if current != DriveState::Fault {
            self.controlword.remove(ControlWord::FAULT_RESET);
        }

        let Phase::Pending {
            target,
            confirmations,
        } = self.phase
        else {
            return StepOutcome::Idle;
        };

        if current == target {
            let confirmations = confirmations + 1;
            if confirmations >= self.policy.min_confirmations {
                self.phase = Phase::Idle;
                self.completed = true;
                return StepOutcome::Completed;
            }
            self.phase = Phase::Pending {
                target,
                confirmations,
            };
            return StepOutcome::Confirming(confirmations);
        }

        self.phase = Phase::Pending {
            target,
            confirmations: 0,
        };

        let dwell_elapsed = self
            .last_change
            .is_none_or(|t| now.saturating_duration_since(t) >= self.policy.min_dwell);
        if !dwell_elapsed {
            return StepOutcome::Waiting;
        }

        match next_transition(current, target) {
            Ok(StateTransition::T15) if self.controlword.contains(ControlWord::FAULT_RESET) => {
                self.controlword.remove(ControlWord::FAULT_RESET);
                self.last_change = Some(now);
                StepOutcome::FaultResetReleased
            }
            Ok(transition) => {
                self.controlword = transition.control_word();
                self.last_change = Some(now);
                StepOutcome::Transition(transition)
            }
            Err(err) => StepOutcome::Failed(err),
        }
    }
}

impl Default for PdoStateMachine {
    fn default() -> Self {
        Self::new(StateChangePolicy::default())
    }
}
