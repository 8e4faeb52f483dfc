//! Consumer channel trait

use anyhow::Result;

/// A connected consumer that accepts serialized events
///
/// Implementations are called from the delivery loop only, one payload at a
/// time.
pub trait EventChannel: Send + Sync {
    /// Channel name (for logs)
    fn name(&self) -> &str;

    /// Push one serialized event
    fn send(&self, payload: &str) -> Result<()>;
}
