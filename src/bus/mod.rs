//! Configuration bus: transactions, address decode, response merge.
//!
//! The router owns nothing but the decode table. A transaction is
//! dispatched to the single subsystem whose window contains its
//! address; subsystems respond with zero for anything outside their
//! own window, and the unified response is the bitwise OR of all
//! per-owner responses. Addresses outside every window fail closed:
//! reads return [`map::UNMAPPED_READ_VALUE`], writes are dropped.
//!
//! Overlapping windows would corrupt the OR-merge, so the table is
//! validated when the router is built; an overlap is a fatal
//! configuration error, never a runtime one.

pub mod map;

use std::fmt;
use thiserror::Error;

/// Register bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    /// Read one 32-bit word.
    Read,
    /// Write one 32-bit word.
    Write,
}

/// One transaction on the configuration bus.
#[derive(Debug, Clone, Copy)]
pub struct RegisterTransaction {
    /// Byte address into the flat register space.
    pub addr: u32,
    /// Operation.
    pub op: BusOp,
    /// Write payload; ignored for reads.
    pub data: u32,
}

impl RegisterTransaction {
    /// Build a read transaction.
    pub fn read(addr: u32) -> Self {
        Self {
            addr,
            op: BusOp::Read,
            data: 0,
        }
    }

    /// Build a write transaction.
    pub fn write(addr: u32, data: u32) -> Self {
        Self {
            addr,
            op: BusOp::Write,
            data,
        }
    }
}

/// Identifies the subsystem owning a register window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerId {
    /// Link bring-up and ready/valid gating.
    LinkSync,
    /// Offset measurement and epoch distribution.
    Timing,
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerId::LinkSync => write!(f, "link-sync"),
            OwnerId::Timing => write!(f, "timing"),
        }
    }
}

/// One entry in the decode table.
#[derive(Debug, Clone, Copy)]
pub struct AddressRange {
    /// First byte address of the window.
    pub base: u32,
    /// Window size in bytes.
    pub size: u32,
    /// Owning subsystem.
    pub owner: OwnerId,
}

impl AddressRange {
    /// One past the last byte address of the window.
    pub fn end(&self) -> u32 {
        self.base + self.size
    }

    /// Whether the window contains `addr`.
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.end()
    }
}

/// Decode-table configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    /// Two windows overlap.
    #[error("address windows overlap: {a} [{a_base:#06x}..{a_end:#06x}) and {b} [{b_base:#06x}..{b_end:#06x})")]
    Overlap {
        a: OwnerId,
        a_base: u32,
        a_end: u32,
        b: OwnerId,
        b_base: u32,
        b_end: u32,
    },
    /// A window has zero size.
    #[error("address window for {0} has zero size")]
    ZeroSize(OwnerId),
}

/// A subsystem's register interface, addressed by window-relative
/// offset. Implementations must confine all side effects to their own
/// state and return only their own register contents.
pub trait RegisterBlock {
    /// Read the register at `offset` within this block's window.
    fn read(&mut self, offset: u32) -> u32;
    /// Write the register at `offset` within this block's window.
    fn write(&mut self, offset: u32, data: u32);
}

/// Result of decoding an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Owning subsystem.
    pub owner: OwnerId,
    /// Offset relative to the owner's window base.
    pub offset: u32,
}

/// Stateless address decoder and response merger.
#[derive(Debug)]
pub struct RegisterBusRouter {
    ranges: Vec<AddressRange>,
}

impl RegisterBusRouter {
    /// Build a router, rejecting zero-sized or overlapping windows.
    pub fn new(ranges: Vec<AddressRange>) -> Result<Self, MapError> {
        for range in &ranges {
            if range.size == 0 {
                return Err(MapError::ZeroSize(range.owner));
            }
        }
        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                if a.base < b.end() && b.base < a.end() {
                    return Err(MapError::Overlap {
                        a: a.owner,
                        a_base: a.base,
                        a_end: a.end(),
                        b: b.owner,
                        b_base: b.base,
                        b_end: b.end(),
                    });
                }
            }
        }
        Ok(Self { ranges })
    }

    /// Build the router for the standard front-end map.
    pub fn standard() -> Self {
        // The static map is disjoint by construction; new() re-checks.
        Self::new(vec![
            AddressRange {
                base: map::LINK_SYNC_BASE,
                size: map::LINK_SYNC_SIZE,
                owner: OwnerId::LinkSync,
            },
            AddressRange {
                base: map::TIMING_BASE,
                size: map::TIMING_SIZE,
                owner: OwnerId::Timing,
            },
        ])
        .unwrap_or_else(|e| unreachable!("standard map invalid: {e}"))
    }

    /// Decode table entries.
    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    /// Decode an address to its owner and window-relative offset.
    /// Returns `None` for unmapped addresses.
    pub fn decode(&self, addr: u32) -> Option<Decoded> {
        self.ranges.iter().find(|r| r.contains(addr)).map(|r| Decoded {
            owner: r.owner,
            offset: addr - r.base,
        })
    }

    /// OR-combine per-owner response words into the unified response.
    /// Owners contribute zero outside their own window, so the OR is
    /// equivalent to selecting the addressed owner's value.
    pub fn merge_responses<I: IntoIterator<Item = u32>>(responses: I) -> u32 {
        responses.into_iter().fold(0, |acc, r| acc | r)
    }

    /// Human-readable decode of an address, for logs and the CLI.
    pub fn describe_address(&self, addr: u32) -> String {
        match self.decode(addr) {
            Some(d) => format!("{} @ {:#06x} (+{:#05x})", d.owner, addr, d.offset),
            None => format!("unmapped @ {:#06x}", addr),
        }
    }
}
