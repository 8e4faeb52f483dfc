//! Boot and update signals

use anyhow::{anyhow, Result};
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::supervisor::LifecycleSupervisor;

/// System signal that may start the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootTrigger {
    BootCompleted,
    /// Our own app was updated
    MyPackageReplaced,
    /// Some package was updated
    PackageReplaced(String),
}

impl BootTrigger {
    /// Whether this signal should start a relay belonging to `own_package`
    pub fn applies_to(&self, own_package: &str) -> bool {
        match self {
            BootTrigger::BootCompleted | BootTrigger::MyPackageReplaced => true,
            BootTrigger::PackageReplaced(pkg) => pkg == own_package,
        }
    }
}

impl FromStr for BootTrigger {
    type Err = anyhow::Error;

    /// `boot-completed`, `my-package-replaced` or `package-replaced:<package>`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "boot-completed" => Ok(BootTrigger::BootCompleted),
            "my-package-replaced" => Ok(BootTrigger::MyPackageReplaced),
            other => match other.strip_prefix("package-replaced:") {
                Some(pkg) if !pkg.is_empty() => Ok(BootTrigger::PackageReplaced(pkg.to_string())),
                _ => Err(anyhow!("unknown boot trigger: {}", s)),
            },
        }
    }
}

impl LifecycleSupervisor {
    /// Start the relay after the settle delay, on its own task
    ///
    /// Returns `None` when the signal is for some other package.
    pub fn on_boot_signal(self: &Arc<Self>, trigger: BootTrigger) -> Option<JoinHandle<()>> {
        if !trigger.applies_to(&self.own_package) {
            debug!(trigger = ?trigger, "Boot signal for another package, ignoring");
            return None;
        }

        let settle = self.boot_settle;
        info!(trigger = ?trigger, settle_ms = settle.as_millis() as u64, "Boot signal received");

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if let Err(e) = this.start() {
                error!(error = %e, "Failed to start relay after boot signal");
            }
        }))
    }
}
