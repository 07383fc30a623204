//! Top-level synchronization system.
//!
//! [`SyncSystem`] owns the four execution domains of the front-end
//! controller and steps them as independent actors: each `step()`
//! advances simulation time to the earliest pending domain tick and
//! runs that domain's update. Domains never touch each other's state
//! directly; everything crosses through the relays owned by the
//! timing and link subsystems.
//!
//! External collaborators are modeled as injected inputs: the
//! reference-time source supplies epoch pulses, and the opaque
//! transceiver supplies SysRef edges and per-direction sync flags.

use crate::bus::{
    map, BusOp, OwnerId, RegisterBlock, RegisterBusRouter, RegisterTransaction,
};
use crate::config::Config;
use crate::domain::{Domain, DomainId, ResetKind, ResetSequencer};
use crate::link::LinkSyncController;
use crate::timing::TimingBlock;
use anyhow::Context;

/// Control domain: register bus and supervisory state machines.
pub const CONTROL: DomainId = DomainId(0);
/// Reference domain: external epoch timebase.
pub const REFERENCE: DomainId = DomainId(1);
/// Sample domain: converter-rate logic.
pub const SAMPLE: DomainId = DomainId(2);
/// Link domain: serial transceiver side.
pub const LINK: DomainId = DomainId(3);

/// The front-end controller synchronization core.
#[derive(Debug)]
pub struct SyncSystem {
    /// Current simulation time.
    pub time: u64,
    domains: Vec<Domain>,
    /// Canonical reset state for every domain.
    pub resets: ResetSequencer,
    router: RegisterBusRouter,
    /// Timing subsystem: TDC + epoch distributor.
    pub timing: TimingBlock,
    /// Link bring-up subsystem.
    pub link: LinkSyncController,

    // Injected external inputs, consumed on the owning domain's tick.
    ref_epoch_pending: bool,
    sysref_pending: bool,
    link_rx_synced: bool,
    link_tx_synced: bool,
}

impl SyncSystem {
    /// Build the system from configuration.
    ///
    /// The reset dependency graph is fixed by the board topology: the
    /// sample domain derives from the reference timebase, and the link
    /// needs both before bring-up. Validation failures (a cycle would
    /// take a code change to produce) are fatal.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let domains = vec![
            Domain::new(CONTROL, "control", ResetKind::Synchronous, config.control_period()),
            Domain::new(REFERENCE, "reference", ResetKind::Asynchronous, config.reference_period()),
            Domain::new(SAMPLE, "sample", ResetKind::Synchronous, config.sample_period()),
            Domain::new(LINK, "link", ResetKind::Synchronous, config.link_period()),
        ];
        let dependencies = vec![
            vec![],          // control
            vec![CONTROL],   // reference
            vec![REFERENCE], // sample
            vec![REFERENCE, SAMPLE], // link
        ];
        let resets = ResetSequencer::new(dependencies, config.settle_delay())
            .context("invalid reset dependency graph")?;

        Ok(Self {
            time: 0,
            domains,
            resets,
            router: RegisterBusRouter::standard(),
            timing: TimingBlock::new(
                config.relay_depth(),
                config.tdc_timeout(),
                config.tdc_cadence(),
            ),
            link: LinkSyncController::new(config.relay_depth()),
            ref_epoch_pending: false,
            sysref_pending: false,
            link_rx_synced: false,
            link_tx_synced: false,
        })
    }

    /// Request system-wide reset release; domains come up in
    /// dependency order over the following ticks.
    pub fn power_on(&mut self) {
        self.resets.request_release();
    }

    /// Assert system-wide reset.
    pub fn system_reset(&mut self) {
        self.resets.request_reset();
        self.ref_epoch_pending = false;
        self.sysref_pending = false;
    }

    /// Inject one reference epoch pulse, consumed at the next
    /// reference-domain tick.
    pub fn inject_reference_epoch(&mut self) {
        self.ref_epoch_pending = true;
    }

    /// Inject one SysRef edge, consumed at the next link-domain tick.
    pub fn inject_sysref(&mut self) {
        self.sysref_pending = true;
    }

    /// Set the transceiver's per-direction sync reports.
    pub fn set_link_sync(&mut self, rx_synced: bool, tx_synced: bool) {
        self.link_rx_synced = rx_synced;
        self.link_tx_synced = tx_synced;
    }

    /// Gated epoch output level as of the last reference tick.
    pub fn epoch_output(&self) -> bool {
        self.timing.epoch.output()
    }

    /// Access a domain's bookkeeping.
    pub fn domain(&self, id: DomainId) -> &Domain {
        &self.domains[id.0]
    }

    /// Advance to the earliest pending domain tick and run it.
    /// Returns the domain that ticked.
    pub fn step(&mut self) -> DomainId {
        let mut idx = 0;
        for i in 1..self.domains.len() {
            if self.domains[i].next_due() < self.domains[idx].next_due() {
                idx = i;
            }
        }
        self.time = self.domains[idx].next_due();
        self.domains[idx].advance();
        let id = self.domains[idx].id;

        self.resets.tick_domain(id);
        let in_reset = !self.resets.domain_ready(id);
        self.domains[idx].in_reset = in_reset;

        match id {
            CONTROL => {
                self.timing.control_tick(in_reset);
                let upstream_ready =
                    self.resets.domain_ready(REFERENCE) && self.resets.domain_ready(SAMPLE);
                self.link.control_tick(upstream_ready, in_reset);
            }
            REFERENCE => {
                let epoch_in = std::mem::take(&mut self.ref_epoch_pending);
                if epoch_in && !in_reset {
                    self.timing.ref_epoch_relay.send_pulse();
                }
                self.timing.epoch.reference_tick(epoch_in, in_reset);
            }
            SAMPLE => {
                if self.timing.epoch.sample_tick(in_reset) {
                    self.timing.sample_epoch_relay.send_pulse();
                }
            }
            LINK => {
                let link_in_reset = in_reset || self.link.holds_link_reset();
                let sysref = std::mem::take(&mut self.sysref_pending);
                self.link.link_tick(
                    sysref,
                    self.link_rx_synced,
                    self.link_tx_synced,
                    link_in_reset,
                );
            }
            _ => {}
        }
        id
    }

    /// Run a fixed number of steps.
    pub fn run(&mut self, steps: usize) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Step until every domain reports ready, up to `max_steps`.
    /// Returns true on success.
    pub fn settle(&mut self, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            if self.resets.all_ready() {
                return true;
            }
            self.step();
        }
        self.resets.all_ready()
    }

    /// Execute one transaction on the configuration bus.
    ///
    /// Reads OR-combine per-owner response words; owners not holding
    /// the addressed window contribute zero. Unmapped addresses read
    /// the fill value and swallow writes.
    pub fn bus_access(&mut self, tx: RegisterTransaction) -> u32 {
        let decoded = match self.router.decode(tx.addr) {
            Some(d) => d,
            None => {
                log::debug!(
                    "{} {:#06x}: unmapped, {}",
                    if tx.op == BusOp::Read { "read" } else { "write" },
                    tx.addr,
                    if tx.op == BusOp::Read { "fill value" } else { "dropped" },
                );
                return map::UNMAPPED_READ_VALUE;
            }
        };
        match tx.op {
            BusOp::Write => {
                self.block_mut(decoded.owner).write(decoded.offset, tx.data);
                0
            }
            BusOp::Read => {
                let owners: Vec<OwnerId> =
                    self.router.ranges().iter().map(|r| r.owner).collect();
                let mut responses = Vec::with_capacity(owners.len());
                for owner in owners {
                    responses.push(if owner == decoded.owner {
                        self.block_mut(owner).read(decoded.offset)
                    } else {
                        0
                    });
                }
                RegisterBusRouter::merge_responses(responses)
            }
        }
    }

    /// Read one register.
    pub fn register_read(&mut self, addr: u32) -> u32 {
        self.bus_access(RegisterTransaction::read(addr))
    }

    /// Write one register.
    pub fn register_write(&mut self, addr: u32, data: u32) {
        self.bus_access(RegisterTransaction::write(addr, data));
    }

    fn block_mut(&mut self, owner: OwnerId) -> &mut dyn RegisterBlock {
        match owner {
            OwnerId::LinkSync => &mut self.link,
            OwnerId::Timing => &mut self.timing,
        }
    }

    /// Print a status summary to stdout.
    pub fn print_summary(&self) {
        println!("fectrl-sync status @ t={}", self.time);
        println!("-------------------------------");
        for d in &self.domains {
            println!(
                "  {:<10} period {:<3} ticks {:<8} {}",
                d.name,
                d.period,
                d.ticks,
                if self.resets.domain_ready(d.id) { "ready" } else { "in reset" },
            );
        }
        println!(
            "  tdc: {:?}, done={} valid={} timeout={} (ref {}, sample {})",
            self.timing.tdc.state,
            self.timing.tdc.measurement.done,
            self.timing.tdc.measurement.valid,
            self.timing.tdc.timeout_flag,
            self.timing.tdc.measurement.reference_offset,
            self.timing.tdc.measurement.sample_offset,
        );
        println!(
            "  epoch: in {} out {}",
            self.timing.epoch.in_count, self.timing.epoch.out_count,
        );
        println!(
            "  link: {:?}, ready_for_input={} data_valid={}",
            self.link.state, self.link.ready_for_input, self.link.data_valid,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::map::{link as lreg, timing as treg, LINK_SYNC_BASE, TIMING_BASE};

    fn system() -> SyncSystem {
        let mut sys = SyncSystem::new(&Config::default()).unwrap();
        sys.power_on();
        assert!(sys.settle(2000));
        sys
    }

    #[test]
    fn test_power_on_order() {
        let mut sys = SyncSystem::new(&Config::default()).unwrap();
        sys.power_on();
        for _ in 0..2000 {
            sys.step();
            // The link domain never outruns its upstream domains.
            if sys.resets.domain_ready(LINK) {
                assert!(sys.resets.domain_ready(REFERENCE));
                assert!(sys.resets.domain_ready(SAMPLE));
            }
            if sys.resets.domain_ready(SAMPLE) {
                assert!(sys.resets.domain_ready(REFERENCE));
            }
        }
        assert!(sys.resets.all_ready());
    }

    #[test]
    fn test_end_to_end_five_epoch_pulses() {
        let mut sys = system();
        sys.register_write(
            TIMING_BASE + treg::EPOCH_CONTROL,
            treg::EPOCH_CONTROL_IN_ENABLE | treg::EPOCH_CONTROL_OUT_ENABLE,
        );

        for _ in 0..5 {
            sys.inject_reference_epoch();
            sys.run(200);
        }

        assert_eq!(sys.timing.epoch.in_count, 5, "inbound epochs");
        assert_eq!(sys.timing.epoch.out_count, 5, "gated output pulses");
        assert_eq!(
            sys.register_read(TIMING_BASE + treg::EPOCH_OUT_COUNT),
            5
        );
    }

    #[test]
    fn test_tdc_measurement_over_the_bus() {
        let mut sys = system();
        sys.register_write(
            TIMING_BASE + treg::EPOCH_CONTROL,
            treg::EPOCH_CONTROL_IN_ENABLE,
        );
        sys.register_write(TIMING_BASE + treg::TDC_CONTROL, treg::TDC_CONTROL_ENABLE);
        sys.run(20); // let the TDC arm

        sys.inject_reference_epoch();
        sys.run(400);

        let status = sys.register_read(TIMING_BASE + treg::TDC_STATUS);
        assert_ne!(status & treg::TDC_STATUS_DONE, 0, "status {status:#x}");
        assert_ne!(status & treg::TDC_STATUS_VALID, 0);
        assert_eq!(status & treg::TDC_STATUS_TIMEOUT, 0);

        // The sample epoch crosses two extra domains, so it always
        // lands after the reference epoch.
        let ref_off = sys.register_read(TIMING_BASE + treg::TDC_REF_OFFSET) as i32;
        let sample_off = sys.register_read(TIMING_BASE + treg::TDC_SAMPLE_OFFSET) as i32;
        assert!(sample_off > ref_off, "ref {ref_off} sample {sample_off}");
    }

    #[test]
    fn test_tdc_timeout_without_sample_epoch() {
        let mut sys = system();
        // Inbound epoch capture disabled: the reference pulse reaches
        // the TDC but no sample epoch ever will.
        sys.register_write(TIMING_BASE + treg::TDC_CONTROL, treg::TDC_CONTROL_ENABLE);
        sys.run(20);

        sys.inject_reference_epoch();
        sys.run(600);

        let status = sys.register_read(TIMING_BASE + treg::TDC_STATUS);
        assert_ne!(status & treg::TDC_STATUS_TIMEOUT, 0);
        assert_eq!(status & treg::TDC_STATUS_DONE, 0);
        assert_eq!(sys.timing.tdc.state, crate::timing::TdcState::Armed);
    }

    #[test]
    fn test_link_bringup_and_reset_glitch_free() {
        let mut sys = system();
        sys.set_link_sync(true, true);
        sys.register_write(LINK_SYNC_BASE + lreg::CONTROL, 0);
        for _ in 0..100 {
            sys.inject_sysref();
            sys.step();
        }

        let status = sys.register_read(LINK_SYNC_BASE + lreg::STATUS);
        assert_ne!(status & lreg::STATUS_READY_FOR_INPUT, 0, "status {status:#x}");
        assert_ne!(status & lreg::STATUS_DATA_VALID, 0);

        // Software reset: not-ready within one control tick, and never
        // a transient true on the way back up.
        sys.register_write(LINK_SYNC_BASE + lreg::CONTROL, lreg::CONTROL_LINK_RESET);
        sys.run(10);
        let status = sys.register_read(LINK_SYNC_BASE + lreg::STATUS);
        assert_eq!(status & lreg::STATUS_READY_FOR_INPUT, 0);
        assert_eq!(status & lreg::STATUS_DATA_VALID, 0);

        sys.register_write(LINK_SYNC_BASE + lreg::CONTROL, 0);
        for _ in 0..200 {
            sys.inject_sysref();
            sys.step();
            if sys.link.state != crate::link::LinkState::Active {
                assert!(!sys.link.ready_for_input);
                assert!(!sys.link.data_valid);
            }
        }
        assert_eq!(sys.link.state, crate::link::LinkState::Active);
    }

    #[test]
    fn test_unmapped_access_is_benign() {
        let mut sys = system();
        sys.register_write(TIMING_BASE + treg::TDC_CADENCE, 77);

        assert_eq!(sys.register_read(0x8000), map::UNMAPPED_READ_VALUE);
        sys.register_write(0x8000, 0xFFFF_FFFF);

        // No owner state changed.
        assert_eq!(sys.register_read(TIMING_BASE + treg::TDC_CADENCE), 77);
        assert_eq!(
            sys.register_read(LINK_SYNC_BASE + lreg::CONTROL),
            lreg::CONTROL_LINK_RESET
        );
    }

    #[test]
    fn test_response_independent_of_other_owners() {
        let mut sys = system();
        sys.register_write(TIMING_BASE + treg::TDC_CADENCE, 0xABCD);
        let before = sys.register_read(TIMING_BASE + treg::TDC_CADENCE);

        // Churn the other owner's state.
        sys.register_write(LINK_SYNC_BASE + lreg::CONTROL, 0);
        sys.set_link_sync(true, true);
        for _ in 0..100 {
            sys.inject_sysref();
            sys.step();
        }

        assert_eq!(sys.register_read(TIMING_BASE + treg::TDC_CADENCE), before);
        assert_eq!(before, 0xABCD);
    }

    #[test]
    fn test_system_reset_reholds_domains() {
        let mut sys = system();
        sys.system_reset();
        sys.run(5);
        assert!(!sys.resets.domain_ready(CONTROL));
        assert!(!sys.resets.domain_ready(LINK));

        sys.power_on();
        assert!(sys.settle(2000));
    }
}
