//! The discovery check and its crash reports.

pub mod crash;
pub mod health;

pub use crash::CrashReport;
pub use health::CheckOutcome;
