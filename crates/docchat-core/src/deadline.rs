use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::warn;

use crate::error::OrchestratorError;
use crate::orchestrator::EventStream;

/// Cut `inner` off at `deadline`.
///
/// When the deadline passes first, one [`OrchestratorError::DeadlineExceeded`]
/// is yielded and the inner stream is dropped, which abandons any upstream
/// read in progress.
pub fn with_deadline(inner: EventStream, deadline: Instant, limit: Duration) -> EventStream {
    stream::unfold(Some(inner), move |state| async move {
        let mut inner = state?;
        match tokio::time::timeout_at(deadline, inner.next()).await {
            Ok(Some(item)) => Some((item, Some(inner))),
            Ok(None) => None,
            Err(_) => {
                warn!(limit_secs = limit.as_secs_f64(), "response deadline exceeded");
                Some((Err(OrchestratorError::DeadlineExceeded(limit)), None))
            }
        }
    })
    .boxed()
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use docchat_types::StreamEvent;

    fn slow_stream() -> EventStream {
        stream::unfold(0u32, |n| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Some((Ok(StreamEvent::Fragment(format!("tick {n}"))), n + 1))
        })
        .boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn items_before_the_deadline_pass_through() {
        let limit = Duration::from_secs(25);
        let mut s = with_deadline(slow_stream(), Instant::now() + limit, limit);

        assert_eq!(
            s.next().await.unwrap().unwrap(),
            StreamEvent::Fragment("tick 0".into())
        );
        assert_eq!(
            s.next().await.unwrap().unwrap(),
            StreamEvent::Fragment("tick 1".into())
        );
        let err = s.next().await.unwrap().unwrap_err();
        assert!(matches!(err, OrchestratorError::DeadlineExceeded(d) if d == limit));
        assert!(s.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_stream_is_not_extended() {
        let limit = Duration::from_secs(5);
        let inner = stream::iter(vec![Ok(StreamEvent::Done)]).boxed();
        let items: Vec<_> = with_deadline(inner, Instant::now() + limit, limit)
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Ok(StreamEvent::Done)));
    }
}
