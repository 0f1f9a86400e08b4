//! Time bounds on capability calls.
//!
//! Every embedding and generation call made by the pipeline runs under
//! [`bounded`], so a stalled provider surfaces as
//! [`RagError::CapabilityTimeout`] instead of hanging a request.

use std::future::Future;
use std::time::Duration;

use petcare_rag_core::{Capability, RagError, Result};
use tracing::warn;

/// Await `fut` for at most `limit`.
pub async fn bounded<T, F>(capability: Capability, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(%capability, ?limit, "capability call timed out");
            Err(RagError::CapabilityTimeout {
                capability,
                after: limit,
            })
        }
    }
}
