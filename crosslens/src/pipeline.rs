use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::extraction::{
    ArticleExtractor, ExtractionEngine, ExtractionOutcome, ExtractionTarget, UnavailableExtractor,
    MAX_CONCURRENCY_CAP,
};

/// Extract every target through one scoped session, then hand each outcome to
/// `per_target` together with the target's input index, running at most
/// `concurrency` targets at once.
///
/// Results come back in input order. Extraction problems never fail the
/// batch; an error returned by `per_target` does. The session is shut down on
/// both paths.
pub async fn run_batch<R, F, Fut>(
    engine: &dyn ExtractionEngine,
    targets: &[ExtractionTarget],
    concurrency: usize,
    per_target: F,
) -> Result<Vec<R>, ServiceError>
where
    F: Fn(usize, ExtractionTarget, ExtractionOutcome) -> Fut,
    Fut: Future<Output = Result<R, ServiceError>>,
{
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let started = Instant::now();
    let session: Box<dyn ArticleExtractor> = match engine.open().await {
        Ok(session) => session,
        Err(e) => {
            warn!(engine = engine.name(), "pipeline: could not open extraction session: {:#}", e);
            Box::new(UnavailableExtractor::new(format!("extraction unavailable: {:#}", e)))
        }
    };

    let limit = concurrency.clamp(1, MAX_CONCURRENCY_CAP);
    let session_ref = session.as_ref();
    let per_target = &per_target;

    let result = stream::iter(targets.iter().cloned().enumerate())
        .map(|(index, target)| async move {
            let outcome = session_ref.fetch_and_extract(&target.url).await;
            match &outcome {
                ExtractionOutcome::Success { text } => {
                    info!(url = %target.url, chars = text.len(), "pipeline: extracted")
                }
                ExtractionOutcome::Partial { reason, .. } | ExtractionOutcome::Failed { reason } => {
                    warn!(url = %target.url, outcome = outcome.label(), %reason, "pipeline: degraded extraction")
                }
            }
            per_target(index, target, outcome).await.map(|r| (index, r))
        })
        .buffer_unordered(limit)
        .try_collect::<Vec<_>>()
        .await;

    session.shutdown().await;

    let mut indexed = result?;
    indexed.sort_by_key(|(index, _)| *index);
    info!(
        targets = targets.len(),
        concurrency = limit,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline: batch complete"
    );
    Ok(indexed.into_iter().map(|(_, r)| r).collect())
}
