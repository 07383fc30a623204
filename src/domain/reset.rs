//! Per-domain reset sequencing.
//!
//! The sequencer is the sole writer of domain reset state. Each domain
//! walks `Held -> Releasing -> Ready` on its own ticks: a domain only
//! starts releasing once every domain it depends on is `Ready`, and it
//! only reaches `Ready` after a settle delay during which its
//! dependencies stayed `Ready`. A dependency dropping out of `Ready`
//! drags its dependents straight back to `Held`.
//!
//! The dependency table is validated at construction: a cycle would
//! deadlock the release sequence and is a fatal configuration error.

use super::DomainId;
use thiserror::Error;

/// Configuration errors in the reset dependency graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DependencyError {
    /// The dependency graph contains a cycle.
    #[error("reset dependency cycle involving {0}")]
    Cycle(DomainId),
    /// A dependency refers to a domain that does not exist.
    #[error("unknown domain {0} in dependency table")]
    UnknownDomain(DomainId),
}

/// Release progress of one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPhase {
    /// Reset asserted.
    Held,
    /// Reset de-asserted, waiting out the settle delay.
    Releasing {
        /// Ticks spent settling so far.
        settled: u64,
    },
    /// Out of reset and stable; dependents may release.
    Ready,
}

#[derive(Debug)]
struct ResetEntry {
    phase: ResetPhase,
    deps: Vec<DomainId>,
}

/// Sequences resets across all domains.
#[derive(Debug)]
pub struct ResetSequencer {
    entries: Vec<ResetEntry>,
    settle_delay: u64,
    release_requested: bool,
}

impl ResetSequencer {
    /// Build a sequencer for `dependencies.len()` domains, where
    /// `dependencies[i]` lists the domains that `DomainId(i)` requires
    /// to be `Ready` before it may release.
    ///
    /// Fails if the table references an unknown domain or contains a
    /// cycle. All domains start `Held` with no release requested.
    pub fn new(
        dependencies: Vec<Vec<DomainId>>,
        settle_delay: u64,
    ) -> Result<Self, DependencyError> {
        let count = dependencies.len();
        for deps in &dependencies {
            for dep in deps {
                if dep.0 >= count {
                    return Err(DependencyError::UnknownDomain(*dep));
                }
            }
        }
        check_acyclic(&dependencies)?;

        let entries = dependencies
            .into_iter()
            .map(|deps| ResetEntry {
                phase: ResetPhase::Held,
                deps,
            })
            .collect();
        Ok(Self {
            entries,
            settle_delay,
            release_requested: false,
        })
    }

    /// Assert reset everywhere. Takes effect immediately for all
    /// domains; their next ticks see `Held`.
    pub fn request_reset(&mut self) {
        log::debug!("system reset asserted");
        self.release_requested = false;
        for entry in &mut self.entries {
            entry.phase = ResetPhase::Held;
        }
    }

    /// Request system-wide release. Domains release in dependency
    /// order on their own ticks.
    pub fn request_release(&mut self) {
        log::debug!("system reset release requested");
        self.release_requested = true;
    }

    /// Current phase of a domain.
    pub fn phase(&self, id: DomainId) -> ResetPhase {
        self.entries[id.0].phase
    }

    /// True once the domain has completed its release sequence.
    pub fn domain_ready(&self, id: DomainId) -> bool {
        self.entries[id.0].phase == ResetPhase::Ready
    }

    /// True once every domain is `Ready`.
    pub fn all_ready(&self) -> bool {
        self.entries.iter().all(|e| e.phase == ResetPhase::Ready)
    }

    fn deps_ready(&self, id: DomainId) -> bool {
        self.entries[id.0]
            .deps
            .iter()
            .all(|d| self.entries[d.0].phase == ResetPhase::Ready)
    }

    /// Advance one domain by one of its own ticks.
    pub fn tick_domain(&mut self, id: DomainId) {
        if !self.release_requested {
            self.entries[id.0].phase = ResetPhase::Held;
            return;
        }
        let deps_ready = self.deps_ready(id);
        let entry = &mut self.entries[id.0];
        entry.phase = match entry.phase {
            ResetPhase::Held => {
                if deps_ready {
                    ResetPhase::Releasing { settled: 0 }
                } else {
                    ResetPhase::Held
                }
            }
            ResetPhase::Releasing { settled } => {
                if !deps_ready {
                    // Upstream instability: back to square one.
                    ResetPhase::Held
                } else if settled + 1 >= self.settle_delay {
                    log::debug!("{} ready", id);
                    ResetPhase::Ready
                } else {
                    ResetPhase::Releasing {
                        settled: settled + 1,
                    }
                }
            }
            ResetPhase::Ready => {
                if deps_ready {
                    ResetPhase::Ready
                } else {
                    log::warn!("{} lost an upstream domain, re-holding", id);
                    ResetPhase::Held
                }
            }
        };
    }
}

/// Depth-first cycle check over the dependency table.
fn check_acyclic(dependencies: &[Vec<DomainId>]) -> Result<(), DependencyError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        node: usize,
        dependencies: &[Vec<DomainId>],
        marks: &mut [Mark],
    ) -> Result<(), DependencyError> {
        match marks[node] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(DependencyError::Cycle(DomainId(node))),
            Mark::Unvisited => {}
        }
        marks[node] = Mark::InProgress;
        for dep in &dependencies[node] {
            visit(dep.0, dependencies, marks)?;
        }
        marks[node] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; dependencies.len()];
    for node in 0..dependencies.len() {
        visit(node, dependencies, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Chain: 0 <- 1 <- 2 (domain 2 depends on 1, which depends on 0).
    fn chain() -> ResetSequencer {
        ResetSequencer::new(
            vec![vec![], vec![DomainId(0)], vec![DomainId(1)]],
            2,
        )
        .unwrap()
    }

    fn tick_all(seq: &mut ResetSequencer, n: usize) {
        for _ in 0..n {
            for id in 0..3 {
                seq.tick_domain(DomainId(id));
            }
        }
    }

    #[test]
    fn test_release_in_dependency_order() {
        let mut seq = chain();
        seq.request_release();

        // For every intermediate state, a domain is never Ready before
        // its dependency.
        for _ in 0..20 {
            tick_all(&mut seq, 1);
            if seq.domain_ready(DomainId(1)) {
                assert!(seq.domain_ready(DomainId(0)));
            }
            if seq.domain_ready(DomainId(2)) {
                assert!(seq.domain_ready(DomainId(1)));
            }
        }
        assert!(seq.all_ready());
    }

    #[test]
    fn test_held_until_release_requested() {
        let mut seq = chain();
        tick_all(&mut seq, 5);
        assert!(!seq.domain_ready(DomainId(0)));
        assert_eq!(seq.phase(DomainId(0)), ResetPhase::Held);
    }

    #[test]
    fn test_reset_request_drops_everything() {
        let mut seq = chain();
        seq.request_release();
        tick_all(&mut seq, 20);
        assert!(seq.all_ready());

        seq.request_reset();
        assert!(!seq.domain_ready(DomainId(0)));
        assert!(!seq.domain_ready(DomainId(2)));

        // Release again: same ordered bring-up.
        seq.request_release();
        tick_all(&mut seq, 20);
        assert!(seq.all_ready());
    }

    #[test]
    fn test_settle_delay_observed() {
        let mut seq = ResetSequencer::new(vec![vec![]], 3).unwrap();
        seq.request_release();
        seq.tick_domain(DomainId(0)); // Held -> Releasing
        seq.tick_domain(DomainId(0)); // settled 1
        seq.tick_domain(DomainId(0)); // settled 2
        assert!(!seq.domain_ready(DomainId(0)));
        seq.tick_domain(DomainId(0)); // settled 3 -> Ready
        assert!(seq.domain_ready(DomainId(0)));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = ResetSequencer::new(
            vec![vec![DomainId(1)], vec![DomainId(0)]],
            1,
        )
        .unwrap_err();
        assert!(matches!(err, DependencyError::Cycle(_)));
    }

    #[test]
    fn test_self_cycle_rejected() {
        let err = ResetSequencer::new(vec![vec![DomainId(0)]], 1).unwrap_err();
        assert!(matches!(err, DependencyError::Cycle(_)));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = ResetSequencer::new(vec![vec![DomainId(7)]], 1).unwrap_err();
        assert_eq!(err, DependencyError::UnknownDomain(DomainId(7)));
    }
}
