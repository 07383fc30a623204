//! Cross-domain signal relay.
//!
//! The relay is the only legal path for a boolean signal to move
//! between domains. It models the classic N-stage synchronizer: the
//! destination domain samples the source value through a short
//! pipeline, trading N destination cycles of latency for a clean,
//! glitch-free output.
//!
//! Two signal kinds are supported:
//! - `Level`: the steady-state value is delivered after N cycles; no
//!   guarantee is made about how many edges survive the crossing.
//! - `Pulse`: a single-shot event is captured in a latch and cleared
//!   when the pipeline samples it, so each source pulse yields exactly
//!   one destination-cycle-wide output pulse. The caller must keep
//!   pulses spaced further apart than the pipeline depth; the relay
//!   does not detect violations.

use smallvec::SmallVec;

/// Default synchronizer depth (double-latch discipline).
pub const DEFAULT_STAGES: usize = 2;

/// Kind of signal carried by a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Persistent value; delivered with N cycles of latency.
    Level,
    /// Single-shot event; delivered exactly once per source pulse.
    Pulse,
}

/// N-stage synchronizer carrying one boolean across a domain boundary.
///
/// The source domain writes via [`set_level`](Self::set_level) or
/// [`send_pulse`](Self::send_pulse); the destination domain calls
/// [`tick`](Self::tick) once per cycle and reads the returned output.
#[derive(Debug, Clone)]
pub struct CrossDomainRelay {
    /// Signal kind.
    pub kind: SignalKind,
    /// Pipeline stages; `stages[len-1]` is the output.
    stages: SmallVec<[bool; 4]>,
    /// Level input, written by the source domain.
    input: bool,
    /// Pulse capture latch; cleared when sampled into the pipeline.
    pending: bool,
    /// Output value while the destination domain is under reset.
    safe_default: bool,
    /// Output pulses delivered (pulse kind only).
    pub delivered: u64,
}

impl CrossDomainRelay {
    /// Create a relay of the given kind and pipeline depth.
    ///
    /// Depths below 2 are clamped to 2; a single stage would not give
    /// the settling cycle the discipline exists for.
    pub fn new(kind: SignalKind, stages: usize) -> Self {
        let depth = stages.max(2);
        let mut pipeline = SmallVec::new();
        pipeline.resize(depth, false);
        Self {
            kind,
            stages: pipeline,
            input: false,
            pending: false,
            safe_default: false,
            delivered: 0,
        }
    }

    /// Create a level relay.
    pub fn level(stages: usize) -> Self {
        Self::new(SignalKind::Level, stages)
    }

    /// Create a pulse relay.
    pub fn pulse(stages: usize) -> Self {
        Self::new(SignalKind::Pulse, stages)
    }

    /// Set the output value used while the destination is in reset.
    pub fn with_safe_default(mut self, value: bool) -> Self {
        self.safe_default = value;
        self
    }

    /// Pipeline depth.
    pub fn depth(&self) -> usize {
        self.stages.len()
    }

    /// Source-domain write for a level signal.
    pub fn set_level(&mut self, value: bool) {
        debug_assert_eq!(self.kind, SignalKind::Level);
        self.input = value;
    }

    /// Source-domain write for a pulse signal. The event is held until
    /// the destination pipeline samples it.
    pub fn send_pulse(&mut self) {
        debug_assert_eq!(self.kind, SignalKind::Pulse);
        self.pending = true;
    }

    /// Current output, as of the last destination tick.
    pub fn output(&self) -> bool {
        *self.stages.last().unwrap_or(&false)
    }

    /// Advance one destination-domain cycle and return the output.
    ///
    /// While `dest_in_reset` is true the pipeline is flushed to the
    /// safe default and any captured pulse is discarded.
    pub fn tick(&mut self, dest_in_reset: bool) -> bool {
        if dest_in_reset {
            for s in self.stages.iter_mut() {
                *s = self.safe_default;
            }
            self.pending = false;
            return self.safe_default;
        }

        let sample = match self.kind {
            SignalKind::Level => self.input,
            SignalKind::Pulse => {
                let p = self.pending;
                self.pending = false;
                p
            }
        };

        let depth = self.stages.len();
        for i in (1..depth).rev() {
            self.stages[i] = self.stages[i - 1];
        }
        self.stages[0] = sample;

        let out = self.stages[depth - 1];
        if out && self.kind == SignalKind::Pulse {
            self.delivered += 1;
        }
        out
    }
}
