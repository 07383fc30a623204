//! Execution domains and the primitives that cross them.
//!
//! A domain is an independently-ticked execution context with its own
//! reset. Signals produced in one domain are only consumed in another
//! through a [`relay::CrossDomainRelay`]; resets are sequenced by
//! [`reset::ResetSequencer`].

pub mod relay;
pub mod reset;

pub use relay::{CrossDomainRelay, SignalKind};
pub use reset::{ResetPhase, ResetSequencer};

use std::fmt;

/// Identifies a domain within the system.
///
/// Ids are dense indices assigned at configuration time; the system
/// never creates or destroys domains while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(pub usize);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain#{}", self.0)
    }
}

/// Reset discipline of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Reset asserts and de-asserts aligned to the domain's own tick.
    Synchronous,
    /// Reset asserts immediately, de-asserts aligned to the tick.
    Asynchronous,
}

/// An independently-ticked execution context.
///
/// `period` and `phase` are in abstract simulation time units. The
/// domain's n-th tick occurs at `phase + (n + 1) * period`, so no
/// domain ticks at time zero.
#[derive(Debug, Clone)]
pub struct Domain {
    /// Domain identity.
    pub id: DomainId,
    /// Human-readable name for logs and status output.
    pub name: String,
    /// Reset discipline.
    pub reset_kind: ResetKind,
    /// Tick period in simulation time units.
    pub period: u64,
    /// Offset of the tick grid from time zero.
    pub phase: u64,
    /// Ticks executed so far.
    pub ticks: u64,
    /// Whether the domain is currently under reset.
    pub in_reset: bool,
}

impl Domain {
    /// Create a domain. Domains come up under reset; the sequencer
    /// releases them.
    pub fn new(id: DomainId, name: impl Into<String>, reset_kind: ResetKind, period: u64) -> Self {
        Self {
            id,
            name: name.into(),
            reset_kind,
            period: period.max(1),
            phase: 0,
            ticks: 0,
            in_reset: true,
        }
    }

    /// Simulation time of this domain's next tick.
    pub fn next_due(&self) -> u64 {
        self.phase + (self.ticks + 1) * self.period
    }

    /// Record that the tick at `next_due()` has been executed.
    pub fn advance(&mut self) {
        self.ticks += 1;
    }
}
