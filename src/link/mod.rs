//! Serial-link bring-up and ready/valid gating.
//!
//! The controller walks the link through its bring-up sequence on the
//! control domain's tick: hold the link domain in reset until its
//! upstream domains are stable, release it, capture a SysRef edge for
//! framing, wait for both per-direction sync flags, then open the
//! ready/valid gates for sample traffic.
//!
//! Re-asserting link reset from any state goes straight to the
//! not-ready safe state: `ready_for_input` and `data_valid` are forced
//! false on the same control tick, never through an intermediate true.
//!
//! All link-domain observations (SysRef capture, rx/tx sync) reach the
//! control domain through relays; the sample data plane itself is out
//! of scope and only its control signals are modeled here.

use crate::bus::map::link as reg;
use crate::bus::RegisterBlock;
use crate::domain::{CrossDomainRelay, SignalKind};

/// Bring-up state machine, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link domain held in reset; waiting for upstream domains.
    Reset,
    /// Link released; waiting for a SysRef capture.
    SysRefWait,
    /// SysRef captured; waiting for both direction sync flags.
    SyncWait,
    /// Both directions synchronized; sample traffic gated open.
    Active,
}

impl LinkState {
    fn code(self) -> u32 {
        match self {
            LinkState::Reset => 0,
            LinkState::SysRefWait => 1,
            LinkState::SyncWait => 2,
            LinkState::Active => 3,
        }
    }
}

/// Link bring-up controller and its register block.
#[derive(Debug)]
pub struct LinkSyncController {
    /// Current bring-up state.
    pub state: LinkState,
    /// Control domain may feed samples to the link.
    pub ready_for_input: bool,
    /// Samples from the link are trustworthy.
    pub data_valid: bool,

    /// Software-requested link reset (register bit).
    reset_request: bool,
    /// SysRef edge seen since the last release (sticky, control side).
    sysref_seen: bool,

    /// SysRef capture pulse, link -> control.
    sysref_relay: CrossDomainRelay,
    /// Ingress sync flag, link -> control.
    rx_sync_relay: CrossDomainRelay,
    /// Egress sync flag, link -> control.
    tx_sync_relay: CrossDomainRelay,
}

impl LinkSyncController {
    /// Create a controller with the given relay depth. Comes up with
    /// link reset requested, matching the hardware power-on state.
    pub fn new(relay_depth: usize) -> Self {
        Self {
            state: LinkState::Reset,
            ready_for_input: false,
            data_valid: false,
            reset_request: true,
            sysref_seen: false,
            sysref_relay: CrossDomainRelay::new(SignalKind::Pulse, relay_depth),
            rx_sync_relay: CrossDomainRelay::new(SignalKind::Level, relay_depth),
            tx_sync_relay: CrossDomainRelay::new(SignalKind::Level, relay_depth),
        }
    }

    /// Whether this controller is holding the link domain in reset.
    /// The reset sequencer combines this with its own gating.
    pub fn holds_link_reset(&self) -> bool {
        self.reset_request || self.state == LinkState::Reset
    }

    /// Link-domain tick: sample the link's local signals into the
    /// relays. `sysref_edge` models the aligned SysRef sample; the
    /// sync flags come from the transceiver's own framing logic.
    pub fn link_tick(
        &mut self,
        sysref_edge: bool,
        rx_synced: bool,
        tx_synced: bool,
        link_in_reset: bool,
    ) {
        if link_in_reset {
            self.rx_sync_relay.set_level(false);
            self.tx_sync_relay.set_level(false);
            return;
        }
        if sysref_edge {
            self.sysref_relay.send_pulse();
        }
        self.rx_sync_relay.set_level(rx_synced);
        self.tx_sync_relay.set_level(tx_synced);
    }

    /// Control-domain tick. `upstream_ready` reports whether every
    /// domain the link depends on is out of reset and stable.
    pub fn control_tick(&mut self, upstream_ready: bool, control_in_reset: bool) {
        let sysref = self.sysref_relay.tick(control_in_reset);
        let rx = self.rx_sync_relay.tick(control_in_reset);
        let tx = self.tx_sync_relay.tick(control_in_reset);

        if control_in_reset {
            self.to_reset();
            return;
        }

        // Reset request wins from any state, with no transient ready.
        if self.reset_request {
            self.to_reset();
            return;
        }

        self.sysref_seen |= sysref;

        self.state = match self.state {
            LinkState::Reset => {
                if upstream_ready {
                    log::debug!("link reset released");
                    LinkState::SysRefWait
                } else {
                    LinkState::Reset
                }
            }
            LinkState::SysRefWait => {
                if !upstream_ready {
                    self.to_reset();
                    LinkState::Reset
                } else if self.sysref_seen {
                    log::debug!("sysref captured");
                    LinkState::SyncWait
                } else {
                    LinkState::SysRefWait
                }
            }
            LinkState::SyncWait => {
                if !upstream_ready {
                    self.to_reset();
                    LinkState::Reset
                } else if rx && tx {
                    log::info!("link synchronized, opening sample gates");
                    LinkState::Active
                } else {
                    LinkState::SyncWait
                }
            }
            LinkState::Active => {
                if !upstream_ready {
                    self.to_reset();
                    LinkState::Reset
                } else if !(rx && tx) {
                    log::warn!("link sync lost (rx={}, tx={})", rx, tx);
                    self.ready_for_input = false;
                    self.data_valid = false;
                    LinkState::SyncWait
                } else {
                    LinkState::Active
                }
            }
        };

        if self.state == LinkState::Active {
            self.ready_for_input = true;
            self.data_valid = true;
        }
    }

    /// Drop to the safe not-ready state and restart the sequence.
    fn to_reset(&mut self) {
        if self.state != LinkState::Reset {
            log::debug!("link dropped to reset");
        }
        self.state = LinkState::Reset;
        self.ready_for_input = false;
        self.data_valid = false;
        self.sysref_seen = false;
    }
}

impl RegisterBlock for LinkSyncController {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            reg::CONTROL => {
                if self.reset_request {
                    reg::CONTROL_LINK_RESET
                } else {
                    0
                }
            }
            reg::STATUS => {
                let mut v = 0;
                if self.sysref_seen {
                    v |= reg::STATUS_SYSREF_SEEN;
                }
                if self.rx_sync_relay.output() {
                    v |= reg::STATUS_RX_SYNC;
                }
                if self.tx_sync_relay.output() {
                    v |= reg::STATUS_TX_SYNC;
                }
                if self.ready_for_input {
                    v |= reg::STATUS_READY_FOR_INPUT;
                }
                if self.data_valid {
                    v |= reg::STATUS_DATA_VALID;
                }
                v
            }
            reg::STATE => self.state.code(),
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, data: u32) {
        if offset == reg::CONTROL {
            let assert = data & reg::CONTROL_LINK_RESET != 0;
            if assert && !self.reset_request {
                log::info!("link reset asserted by software");
            }
            self.reset_request = assert;
        }
    }
}
