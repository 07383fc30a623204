//! fectrl-sync library
//!
//! Software model of a radio front-end controller's multi-clock-domain
//! synchronization and configuration-bus core: cross-domain relays,
//! reset sequencing, register bus routing, timing-offset measurement,
//! epoch distribution, and serial-link bring-up.

pub mod bus;
pub mod config;
pub mod domain;
pub mod link;
pub mod system;
pub mod timing;
