//! Relay lifecycle - start/stop, restart after teardown, boot signals

pub mod boot;
pub mod supervisor;

pub use boot::BootTrigger;
pub use supervisor::{LifecycleSupervisor, SupervisorStatus};
