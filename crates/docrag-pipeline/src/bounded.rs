//! Timeout wrapping and error classification for collaborator calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use docrag_core::traits::Embedder;
use docrag_core::Error;

pub(crate) async fn with_timeout<T, F>(operation: &'static str, after: Duration, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout { operation, after }.into()),
    }
}

/// Runs the (blocking) embedder on the blocking pool, bounded by `after`.
pub(crate) async fn embed_texts(
    embedder: &Arc<dyn Embedder>,
    texts: Vec<String>,
    after: Duration,
) -> anyhow::Result<Vec<Vec<f32>>> {
    let embedder = Arc::clone(embedder);
    let expected = texts.len();
    let vectors = with_timeout("embedding", after, async move {
        tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| anyhow!("embedding task failed: {e}"))?
    })
    .await?;
    if vectors.len() != expected {
        return Err(anyhow!("embedder returned {} vectors for {expected} inputs", vectors.len()));
    }
    Ok(vectors)
}

/// Keep timeouts and unavailability as-is, fold everything else into `wrap`.
pub(crate) fn classify(err: anyhow::Error, wrap: fn(String) -> Error) -> Error {
    match err.downcast_ref::<Error>() {
        Some(Error::Timeout { operation, after }) => Error::Timeout { operation: *operation, after: *after },
        Some(Error::ServiceUnavailable(msg)) => Error::ServiceUnavailable(msg.clone()),
        _ => wrap(format!("{err:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_future_becomes_timeout() {
        let err = with_timeout("store query", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(classify(err, Error::Query), Error::Timeout { operation: "store query", .. }));
    }

    #[test]
    fn classify_keeps_unavailability_through_context() {
        let err = anyhow::Error::from(Error::ServiceUnavailable("down".into())).context("querying");
        assert!(matches!(classify(err, Error::Query), Error::ServiceUnavailable(_)));
    }

    #[test]
    fn classify_wraps_other_failures() {
        let err = anyhow!("disk full").context("upserting");
        match classify(err, Error::Build) {
            Error::Build(msg) => assert!(msg.contains("disk full") && msg.contains("upserting")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
