//! Timing-offset measurement controller.
//!
//! Measures the offset between a reference epoch and the matching
//! sample epoch, both observed as relayed pulses on the control
//! domain's tick. One measurement cycle walks
//! `Idle -> Armed -> Measuring -> Done`; offsets are latched against a
//! free-running control-domain counter at the moment each edge is
//! observed.
//!
//! `done` asserts on the tick that observes the sample epoch; `valid`
//! asserts exactly one control tick later so consumers always read a
//! stable snapshot. Both are monotone within a cycle and cleared when
//! the next cycle arms.
//!
//! If no sample epoch arrives within the timeout window the controller
//! drops back to `Armed` without asserting `done` and raises a sticky
//! timeout flag, cleared on the next software-requested arm or the
//! next completed measurement.

use crate::bus::map::timing as reg;

/// Measurement state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TdcState {
    /// Disabled; waiting for the enable bit.
    Idle,
    /// Enabled; waiting for the next reference epoch.
    Armed,
    /// Reference seen; waiting for the matching sample epoch.
    Measuring,
    /// Offsets latched. Stays here until re-armed or disabled.
    Done,
}

impl TdcState {
    fn code(self) -> u32 {
        match self {
            TdcState::Idle => 0,
            TdcState::Armed => 1,
            TdcState::Measuring => 2,
            TdcState::Done => 3,
        }
    }
}

/// Latched measurement snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetMeasurement {
    /// Control ticks from arm to the reference epoch.
    pub reference_offset: i64,
    /// Control ticks from arm to the sample epoch.
    pub sample_offset: i64,
    /// Measurement complete; offsets latched.
    pub done: bool,
    /// Offsets stable; asserted one control tick after `done`.
    pub valid: bool,
}

/// The offset measurement ("TDC") controller.
#[derive(Debug)]
pub struct OffsetMeasurementController {
    /// Current state.
    pub state: TdcState,
    /// Latest measurement snapshot.
    pub measurement: OffsetMeasurement,
    /// Sticky timeout status, distinct from `done`.
    pub timeout_flag: bool,
    /// Completed measurements since reset.
    pub completed: u64,
    /// Timeouts since reset.
    pub timeouts: u64,

    // Register-visible controls.
    enable: bool,
    auto_rearm: bool,
    cadence: u64,
    timeout_window: u64,

    // Free-running control-domain counter and latches.
    counter: u64,
    armed_at: u64,
    measuring_since: u64,
    done_ticks: u64,
}

impl OffsetMeasurementController {
    /// Create a controller with the given timeout window and automatic
    /// re-arm cadence (both in control ticks; cadence 0 leaves auto
    /// re-arm with no effect until software sets one).
    pub fn new(timeout_window: u64, cadence: u64) -> Self {
        Self {
            state: TdcState::Idle,
            measurement: OffsetMeasurement::default(),
            timeout_flag: false,
            completed: 0,
            timeouts: 0,
            enable: false,
            auto_rearm: false,
            cadence,
            timeout_window: timeout_window.max(1),
            counter: 0,
            armed_at: 0,
            measuring_since: 0,
            done_ticks: 0,
        }
    }

    /// Start a new measurement cycle: clear the snapshot and wait for
    /// the next reference epoch. Timeout status survives a timeout
    /// re-arm but not a software arm.
    fn arm(&mut self, clear_timeout: bool) {
        self.state = TdcState::Armed;
        self.measurement.done = false;
        self.measurement.valid = false;
        self.armed_at = self.counter;
        self.done_ticks = 0;
        if clear_timeout {
            self.timeout_flag = false;
        }
        log::debug!("tdc armed at tick {}", self.counter);
    }

    /// Advance one control-domain tick.
    ///
    /// `ref_epoch` and `sample_epoch` are the relayed epoch pulses as
    /// observed on this tick.
    pub fn tick(&mut self, ref_epoch: bool, sample_epoch: bool) {
        self.counter += 1;

        match self.state {
            TdcState::Idle => {
                if self.enable {
                    self.arm(true);
                }
            }
            TdcState::Armed => {
                if !self.enable {
                    self.state = TdcState::Idle;
                } else if ref_epoch {
                    self.measurement.reference_offset = (self.counter - self.armed_at) as i64;
                    self.measuring_since = self.counter;
                    self.state = TdcState::Measuring;
                }
            }
            TdcState::Measuring => {
                if sample_epoch {
                    self.measurement.sample_offset = (self.counter - self.armed_at) as i64;
                    self.measurement.done = true;
                    self.timeout_flag = false;
                    self.completed += 1;
                    self.state = TdcState::Done;
                    log::debug!(
                        "tdc done: ref {} sample {}",
                        self.measurement.reference_offset,
                        self.measurement.sample_offset
                    );
                } else if self.counter - self.measuring_since >= self.timeout_window {
                    // No matching sample epoch: back to Armed, no done.
                    self.timeout_flag = true;
                    self.timeouts += 1;
                    log::warn!("tdc measurement timeout after {} ticks", self.timeout_window);
                    self.arm(false);
                }
            }
            TdcState::Done => {
                if !self.measurement.valid {
                    // One-cycle settle between done and valid.
                    self.measurement.valid = true;
                } else if !self.enable {
                    self.state = TdcState::Idle;
                } else if self.auto_rearm && self.cadence > 0 {
                    self.done_ticks += 1;
                    if self.done_ticks >= self.cadence {
                        self.arm(true);
                    }
                }
            }
        }
    }

    /// Register write dispatch for the TDC offsets within the timing
    /// window.
    pub fn reg_write(&mut self, offset: u32, data: u32) {
        match offset {
            reg::TDC_CONTROL => {
                let was_enabled = self.enable;
                self.enable = data & reg::TDC_CONTROL_ENABLE != 0;
                self.auto_rearm = data & reg::TDC_CONTROL_AUTO_REARM != 0;
                if !was_enabled && self.enable {
                    self.timeout_flag = false;
                }
                // Rerun is a write-1 pulse, honored only from Done.
                if data & reg::TDC_CONTROL_RERUN != 0 && self.state == TdcState::Done {
                    self.arm(true);
                }
            }
            reg::TDC_CADENCE => self.cadence = data as u64,
            reg::TDC_TIMEOUT => self.timeout_window = (data as u64).max(1),
            _ => {}
        }
    }

    /// Register read dispatch for the TDC offsets within the timing
    /// window.
    pub fn reg_read(&self, offset: u32) -> u32 {
        match offset {
            reg::TDC_CONTROL => {
                let mut v = 0;
                if self.enable {
                    v |= reg::TDC_CONTROL_ENABLE;
                }
                if self.auto_rearm {
                    v |= reg::TDC_CONTROL_AUTO_REARM;
                }
                v
            }
            reg::TDC_STATUS => {
                let mut v = self.state.code() << 4;
                if self.measurement.done {
                    v |= reg::TDC_STATUS_DONE;
                }
                if self.measurement.valid {
                    v |= reg::TDC_STATUS_VALID;
                }
                if self.timeout_flag {
                    v |= reg::TDC_STATUS_TIMEOUT;
                }
                v
            }
            reg::TDC_REF_OFFSET => self.measurement.reference_offset as u32,
            reg::TDC_SAMPLE_OFFSET => self.measurement.sample_offset as u32,
            reg::TDC_CADENCE => self.cadence as u32,
            reg::TDC_TIMEOUT => self.timeout_window as u32,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_tdc(timeout: u64) -> OffsetMeasurementController {
        let mut tdc = OffsetMeasurementController::new(timeout, 0);
        tdc.reg_write(reg::TDC_CONTROL, reg::TDC_CONTROL_ENABLE);
        tdc.tick(false, false); // Idle -> Armed
        assert_eq!(tdc.state, TdcState::Armed);
        tdc
    }

    #[test]
    fn test_measurement_cycle() {
        let mut tdc = enabled_tdc(16);

        tdc.tick(false, false);
        tdc.tick(true, false); // reference epoch at 2 ticks after arm
        assert_eq!(tdc.state, TdcState::Measuring);
        assert!(!tdc.measurement.done);

        tdc.tick(false, false);
        tdc.tick(false, true); // sample epoch
        assert_eq!(tdc.state, TdcState::Done);
        assert!(tdc.measurement.done);
        // valid lags done by exactly one tick.
        assert!(!tdc.measurement.valid);
        tdc.tick(false, false);
        assert!(tdc.measurement.valid);

        assert_eq!(tdc.measurement.reference_offset, 2);
        assert_eq!(tdc.measurement.sample_offset, 4);
        assert_eq!(tdc.completed, 1);
    }

    #[test]
    fn test_offsets_stable_until_rearm() {
        let mut tdc = enabled_tdc(16);
        tdc.tick(true, false);
        tdc.tick(false, true);
        tdc.tick(false, false); // valid

        let snapshot = tdc.measurement;
        for _ in 0..10 {
            tdc.tick(false, false);
        }
        assert_eq!(tdc.measurement.reference_offset, snapshot.reference_offset);
        assert_eq!(tdc.measurement.sample_offset, snapshot.sample_offset);
        assert!(tdc.measurement.done && tdc.measurement.valid);
        assert_eq!(tdc.state, TdcState::Done);
    }

    #[test]
    fn test_timeout_returns_to_armed_without_done() {
        let mut tdc = enabled_tdc(4);
        tdc.tick(true, false); // Measuring
        for _ in 0..4 {
            tdc.tick(false, false);
        }
        assert_eq!(tdc.state, TdcState::Armed);
        assert!(!tdc.measurement.done);
        assert!(tdc.timeout_flag);
        assert_eq!(tdc.timeouts, 1);
        let status = tdc.reg_read(reg::TDC_STATUS);
        assert_ne!(status & reg::TDC_STATUS_TIMEOUT, 0);
        assert_eq!(status & reg::TDC_STATUS_DONE, 0);
    }

    #[test]
    fn test_timeout_flag_cleared_on_completion() {
        let mut tdc = enabled_tdc(4);
        tdc.tick(true, false);
        for _ in 0..4 {
            tdc.tick(false, false); // times out, re-arms
        }
        assert!(tdc.timeout_flag);

        // Next cycle completes and clears the flag.
        tdc.tick(true, false);
        tdc.tick(false, true);
        assert!(!tdc.timeout_flag);
        assert!(tdc.measurement.done);
    }

    #[test]
    fn test_explicit_rerun() {
        let mut tdc = enabled_tdc(16);
        tdc.tick(true, false);
        tdc.tick(false, true);
        tdc.tick(false, false); // valid
        assert_eq!(tdc.state, TdcState::Done);

        tdc.reg_write(
            reg::TDC_CONTROL,
            reg::TDC_CONTROL_ENABLE | reg::TDC_CONTROL_RERUN,
        );
        assert_eq!(tdc.state, TdcState::Armed);
        assert!(!tdc.measurement.done);
        assert!(!tdc.measurement.valid);
    }

    #[test]
    fn test_auto_rearm_on_cadence() {
        let mut tdc = OffsetMeasurementController::new(16, 3);
        tdc.reg_write(
            reg::TDC_CONTROL,
            reg::TDC_CONTROL_ENABLE | reg::TDC_CONTROL_AUTO_REARM,
        );
        tdc.tick(false, false); // Armed
        tdc.tick(true, false);
        tdc.tick(false, true); // Done
        tdc.tick(false, false); // valid
        for _ in 0..3 {
            tdc.tick(false, false);
        }
        assert_eq!(tdc.state, TdcState::Armed);
    }

    #[test]
    fn test_no_rearm_stays_done() {
        let mut tdc = enabled_tdc(16);
        tdc.tick(true, false);
        tdc.tick(false, true);
        for _ in 0..20 {
            tdc.tick(false, false);
        }
        assert_eq!(tdc.state, TdcState::Done);
    }

    #[test]
    fn test_disable_returns_to_idle() {
        let mut tdc = enabled_tdc(16);
        tdc.reg_write(reg::TDC_CONTROL, 0);
        tdc.tick(false, false);
        assert_eq!(tdc.state, TdcState::Idle);
    }

    #[test]
    fn test_status_register_state_code() {
        let tdc = enabled_tdc(16);
        assert_eq!(tdc.reg_read(reg::TDC_STATUS) >> 4, 1); // Armed
    }
}
