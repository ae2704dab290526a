use std::sync::Arc;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::service::NluService;
use super::types::NluResult;
use crate::error::{FlowError, FlowResult};

/// Queries every service concurrently and waits for all of them.
///
/// Results line up with `services` by index. The first failure aborts the
/// whole fanout; cancellation aborts it as well.
pub async fn query_all(
    services: &[Arc<dyn NluService>],
    text: &str,
    cancel: &CancellationToken,
) -> FlowResult<Vec<NluResult>> {
    let queries = services.iter().map(|service| async move {
        let result = service.query(text, cancel).await.map_err(|source| {
            warn!("NLU service '{}' failed: {}", service.name(), source);
            FlowError::Nlu {
                service: service.name().to_string(),
                source,
            }
        })?;
        debug!("NLU service '{}' returned {} candidates", service.name(), result.candidates.len());
        Ok::<_, FlowError>(result)
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FlowError::Cancelled),
        results = try_join_all(queries) => results,
    }
}
