use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::NluResult;

/// An intent-recognition backend.
///
/// Transport failures are reported as errors; the core never retries them.
#[async_trait]
pub trait NluService: Send + Sync {
    /// Stable name used in logs, telemetry and session snapshots.
    fn name(&self) -> &str;

    async fn query(&self, text: &str, cancel: &CancellationToken) -> anyhow::Result<NluResult>;
}
