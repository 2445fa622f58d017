//! Automatic rediscovery of hosts queued by the discovery check.

pub mod marks;
pub mod rediscovery;

pub use marks::MarkStore;
pub use rediscovery::{Activation, HostRediscovery, MarkedHostsReport, SkipReason};
