//! File based implementations of the collaborator ports.

pub mod agent_cache;
pub mod core_control;
pub mod site_config;

pub use agent_cache::AgentCache;
pub use core_control::CommandCore;
pub use site_config::SiteConfig;
