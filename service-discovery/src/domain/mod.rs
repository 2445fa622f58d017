//! Domain types shared by discovery, the health check and the scheduler.

pub mod check_source;
pub mod host;
pub mod mode;
pub mod service;
pub mod state;
pub mod time_window;

pub use check_source::CheckSource;
pub use host::Host;
pub use mode::{DiscoveryMode, RediscoveryMode};
pub use service::{ServiceCandidate, ServiceEntry, ServiceTable};
pub use state::State;
pub use time_window::TimeWindow;
