//! Register map for the front-end controller.
//!
//! Addresses are byte addresses into a flat 32-bit register space.
//! Each subsystem owns one non-overlapping window; register offsets
//! below are relative to the owning window's base.
//!
//! ```text
//! 0x0000 .. 0x2000   link-sync subsystem (8 KiB)
//! 0x2000 .. 0x2200   timing subsystem: TDC + epoch (512 B)
//! ```

/// Base of the link-sync register window.
pub const LINK_SYNC_BASE: u32 = 0x0000;
/// Size of the link-sync register window (8 KiB).
pub const LINK_SYNC_SIZE: u32 = 0x2000;

/// Base of the timing (TDC + epoch) register window.
pub const TIMING_BASE: u32 = 0x2000;
/// Size of the timing register window (512 B).
pub const TIMING_SIZE: u32 = 0x200;

/// Value returned for reads of unmapped addresses. Writes to unmapped
/// addresses are silently dropped.
pub const UNMAPPED_READ_VALUE: u32 = 0;

/// Link-sync subsystem registers (offsets within its window).
pub mod link {
    /// Control register.
    pub const CONTROL: u32 = 0x000;
    /// CONTROL bit 0: hold the link domain in reset while set.
    pub const CONTROL_LINK_RESET: u32 = 1 << 0;

    /// Status register (read-only).
    pub const STATUS: u32 = 0x004;
    /// STATUS bit 0: a SysRef edge has been captured since release.
    pub const STATUS_SYSREF_SEEN: u32 = 1 << 0;
    /// STATUS bit 1: ingress direction reports sync achieved.
    pub const STATUS_RX_SYNC: u32 = 1 << 1;
    /// STATUS bit 2: egress direction reports sync achieved.
    pub const STATUS_TX_SYNC: u32 = 1 << 2;
    /// STATUS bit 3: link will accept sample traffic.
    pub const STATUS_READY_FOR_INPUT: u32 = 1 << 3;
    /// STATUS bit 4: link sample output is trustworthy.
    pub const STATUS_DATA_VALID: u32 = 1 << 4;

    /// Bring-up state machine code (read-only).
    pub const STATE: u32 = 0x008;
}

/// Timing subsystem registers (offsets within its window).
pub mod timing {
    /// TDC control register.
    pub const TDC_CONTROL: u32 = 0x000;
    /// TDC_CONTROL bit 0: enable measurement (arms from Idle).
    pub const TDC_CONTROL_ENABLE: u32 = 1 << 0;
    /// TDC_CONTROL bit 1: write 1 to re-arm a completed measurement.
    pub const TDC_CONTROL_RERUN: u32 = 1 << 1;
    /// TDC_CONTROL bit 2: re-arm automatically on the cadence.
    pub const TDC_CONTROL_AUTO_REARM: u32 = 1 << 2;

    /// TDC status register (read-only).
    pub const TDC_STATUS: u32 = 0x004;
    /// TDC_STATUS bit 0: measurement complete, offsets latched.
    pub const TDC_STATUS_DONE: u32 = 1 << 0;
    /// TDC_STATUS bit 1: offsets stable, asserted one cycle after done.
    pub const TDC_STATUS_VALID: u32 = 1 << 1;
    /// TDC_STATUS bit 2: last cycle timed out waiting for the sample epoch.
    pub const TDC_STATUS_TIMEOUT: u32 = 1 << 2;

    /// Latched reference-epoch offset, signed (read-only).
    pub const TDC_REF_OFFSET: u32 = 0x008;
    /// Latched sample-epoch offset, signed (read-only).
    pub const TDC_SAMPLE_OFFSET: u32 = 0x00C;
    /// Automatic re-arm cadence in control ticks.
    pub const TDC_CADENCE: u32 = 0x010;
    /// Measurement timeout window in control ticks.
    pub const TDC_TIMEOUT: u32 = 0x014;

    /// Epoch distributor control register.
    pub const EPOCH_CONTROL: u32 = 0x020;
    /// EPOCH_CONTROL bit 0: capture inbound reference epochs.
    pub const EPOCH_CONTROL_IN_ENABLE: u32 = 1 << 0;
    /// EPOCH_CONTROL bit 1: gate for the relayed epoch output.
    pub const EPOCH_CONTROL_OUT_ENABLE: u32 = 1 << 1;

    /// Inbound epochs captured since reset (read-only).
    pub const EPOCH_IN_COUNT: u32 = 0x024;
    /// Gated output pulses emitted since reset (read-only).
    pub const EPOCH_OUT_COUNT: u32 = 0x028;
}
