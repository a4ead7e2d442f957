use crate::document::Document;
use crate::ids::CorrelationId;
use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("no reply for {correlation_id} within {timeout:?}")]
    Timeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },
    #[error("request {correlation_id} was cancelled")]
    Cancelled { correlation_id: CorrelationId },
    #[error("connector shut down before a reply arrived")]
    Dropped,
}

type ReplySender = oneshot::Sender<Result<Document, ReplyError>>;

struct PendingEntry {
    created_at: Instant,
    timeout: Duration,
    reply_queue: String,
    tx: ReplySender,
    timer: Option<AbortHandle>,
}

/// Outstanding request-reply exchanges, keyed by correlation id.
///
/// Completion paths (reply, timeout, cancel) all start by removing the entry.
/// `DashMap::remove` is atomic per key, so exactly one path gets the entry and
/// completes the future; the others see `None` and do nothing.
#[derive(Default)]
pub struct PendingRequests {
    entries: DashMap<CorrelationId, PendingEntry>,
}

impl PendingRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `id` and arm its timeout on `runtime`.
    pub fn register(
        self: &Arc<Self>,
        id: CorrelationId,
        reply_queue: &str,
        timeout: Duration,
        runtime: &Handle,
    ) -> ReplyFuture {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            id,
            PendingEntry {
                created_at: Instant::now(),
                timeout,
                reply_queue: reply_queue.to_string(),
                tx,
                timer: None,
            },
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        let timer = runtime
            .spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(pending) = weak.upgrade() {
                    pending.expire(id);
                }
            })
            .abort_handle();

        // The reply may already have won; then the timer has nothing to guard.
        match self.entries.get_mut(&id) {
            Some(mut entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }

        debug!(
            correlation_id = %id,
            reply_queue = %reply_queue,
            timeout_ms = timeout.as_millis() as u64,
            outstanding = self.entries.len(),
            "Pending request registered"
        );

        ReplyFuture::waiting(id, rx)
    }

    /// Deliver a reply. Returns `false` if `id` is not outstanding.
    pub fn complete(&self, id: CorrelationId, payload: Document) -> bool {
        let Some((_, entry)) = self.entries.remove(&id) else {
            return false;
        };
        Self::settle_reply(id, entry, payload);
        true
    }

    /// Deliver a reply that arrived on `queue`.
    ///
    /// Only settles the request if `queue` is the reply queue it was sent
    /// with; the outbound request itself carries the same correlation id and
    /// must not be mistaken for its own answer.
    pub fn complete_from(&self, queue: &str, id: CorrelationId, payload: Document) -> bool {
        let Some((_, entry)) = self
            .entries
            .remove_if(&id, |_, entry| entry.reply_queue == queue)
        else {
            return false;
        };
        Self::settle_reply(id, entry, payload);
        true
    }

    fn settle_reply(id: CorrelationId, entry: PendingEntry, payload: Document) {
        if let Some(timer) = &entry.timer {
            timer.abort();
        }
        debug!(
            correlation_id = %id,
            reply_queue = %entry.reply_queue,
            elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
            "Pending request completed"
        );
        // The caller may have dropped the future.
        let _ = entry.tx.send(Ok(payload));
    }

    /// Fail `id` with [`ReplyError::Timeout`]. Returns `false` if already settled.
    pub fn expire(&self, id: CorrelationId) -> bool {
        let Some((_, entry)) = self.entries.remove(&id) else {
            return false;
        };
        warn!(
            correlation_id = %id,
            reply_queue = %entry.reply_queue,
            timeout_ms = entry.timeout.as_millis() as u64,
            "Reply timed out"
        );
        let _ = entry.tx.send(Err(ReplyError::Timeout {
            correlation_id: id,
            timeout: entry.timeout,
        }));
        true
    }

    /// Fail `id` with [`ReplyError::Cancelled`]. Returns `false` if already settled.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        let Some((_, entry)) = self.entries.remove(&id) else {
            return false;
        };
        if let Some(timer) = &entry.timer {
            timer.abort();
        }
        debug!(correlation_id = %id, "Pending request cancelled");
        let _ = entry.tx.send(Err(ReplyError::Cancelled { correlation_id: id }));
        true
    }

    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for PendingRequests {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            if let Some(timer) = &entry.timer {
                timer.abort();
            }
        }
    }
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequests")
            .field("outstanding", &self.entries.len())
            .finish()
    }
}

enum ReplyState {
    Ready(Option<Document>),
    Waiting(oneshot::Receiver<Result<Document, ReplyError>>),
}

/// Result of [`super::MessageConnector::send_message`].
///
/// Await it from async code, or call [`ReplyFuture::wait`] from a plain thread.
/// Fire-and-forget sends return one that is already resolved to `null`.
pub struct ReplyFuture {
    correlation_id: Option<CorrelationId>,
    state: ReplyState,
}

impl ReplyFuture {
    /// Already resolved to `value`.
    #[must_use]
    pub fn ready(value: Document) -> Self {
        Self {
            correlation_id: None,
            state: ReplyState::Ready(Some(value)),
        }
    }

    fn waiting(id: CorrelationId, rx: oneshot::Receiver<Result<Document, ReplyError>>) -> Self {
        Self {
            correlation_id: Some(id),
            state: ReplyState::Waiting(rx),
        }
    }

    /// Correlation id of the request; `None` for fire-and-forget sends.
    #[must_use]
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    /// Block the current thread until the reply, timeout, or cancellation.
    ///
    /// # Errors
    ///
    /// The [`ReplyError`] that settled the request.
    ///
    /// # Panics
    ///
    /// When called from inside an async runtime; `.await` the future there.
    pub fn wait(self) -> Result<Document, ReplyError> {
        match self.state {
            ReplyState::Ready(value) => Ok(value.unwrap_or(Value::Null)),
            ReplyState::Waiting(rx) => rx.blocking_recv().unwrap_or(Err(ReplyError::Dropped)),
        }
    }
}

impl Future for ReplyFuture {
    type Output = Result<Document, ReplyError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            ReplyState::Ready(value) => Poll::Ready(Ok(value.take().unwrap_or(Value::Null))),
            ReplyState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or(Err(ReplyError::Dropped))),
        }
    }
}

impl std::fmt::Debug for ReplyFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyFuture")
            .field("correlation_id", &self.correlation_id)
            .field(
                "ready",
                &matches!(self.state, ReplyState::Ready(_)),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending() -> Arc<PendingRequests> {
        Arc::new(PendingRequests::new())
    }

    #[tokio::test]
    async fn reply_completes_and_removes_entry() {
        let pending = pending();
        let id = CorrelationId::new();
        let fut = pending.register(id, "R1", Duration::from_secs(30), &Handle::current());
        assert!(pending.contains(&id));

        assert!(pending.complete(id, json!({"ok": true})));
        assert!(!pending.contains(&id));
        assert_eq!(fut.await.unwrap(), json!({"ok": true}));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_future_and_removes_entry() {
        let pending = pending();
        let id = CorrelationId::new();
        let fut = pending.register(id, "R1", Duration::from_secs(30), &Handle::current());

        let err = fut.await.unwrap_err();
        assert_eq!(
            err,
            ReplyError::Timeout {
                correlation_id: id,
                timeout: Duration::from_secs(30)
            }
        );
        assert!(!pending.contains(&id));
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_after_timeout_is_ignored() {
        let pending = pending();
        let id = CorrelationId::new();
        let fut = pending.register(id, "R1", Duration::from_millis(10), &Handle::current());
        assert!(fut.await.is_err());
        assert!(!pending.complete(id, json!({"late": true})));
        assert!(!pending.expire(id));
    }

    #[tokio::test(start_paused = true)]
    async fn reply_before_deadline_disarms_timer() {
        let pending = pending();
        let id = CorrelationId::new();
        let fut = pending.register(id, "R1", Duration::from_secs(1), &Handle::current());
        assert!(pending.complete(id, json!(1)));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fut.await.unwrap(), json!(1));
        assert!(!pending.expire(id));
    }

    #[tokio::test]
    async fn reply_on_wrong_queue_does_not_settle() {
        let pending = pending();
        let id = CorrelationId::new();
        let fut = pending.register(id, "R1", Duration::from_secs(30), &Handle::current());
        assert!(!pending.complete_from("Q1", id, json!({"request": true})));
        assert!(pending.contains(&id));
        assert!(pending.complete_from("R1", id, json!({"reply": true})));
        assert_eq!(fut.await.unwrap(), json!({"reply": true}));
    }

    #[tokio::test]
    async fn cancel_settles_once() {
        let pending = pending();
        let id = CorrelationId::new();
        let fut = pending.register(id, "R1", Duration::from_secs(30), &Handle::current());
        assert!(pending.cancel(id));
        assert!(!pending.cancel(id));
        assert!(!pending.complete(id, json!({})));
        assert_eq!(
            fut.await.unwrap_err(),
            ReplyError::Cancelled { correlation_id: id }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_reply_and_timeout_settle_exactly_once() {
        let pending = pending();
        for _ in 0..200 {
            let id = CorrelationId::new();
            let fut = pending.register(id, "R1", Duration::from_millis(1), &Handle::current());
            let p = Arc::clone(&pending);
            let replier = tokio::spawn(async move { p.complete(id, json!("reply")) });
            let replied = replier.await.unwrap();
            let outcome = fut.await;
            match (replied, outcome) {
                (true, Ok(v)) => assert_eq!(v, json!("reply")),
                (false, Err(ReplyError::Timeout { .. })) => {}
                other => panic!("inconsistent outcome: {other:?}"),
            }
            assert!(!pending.contains(&id));
        }
        assert!(pending.is_empty());
    }

    #[test]
    fn ready_future_resolves_immediately() {
        let fut = ReplyFuture::ready(Value::Null);
        assert!(fut.correlation_id().is_none());
        assert_eq!(fut.wait().unwrap(), Value::Null);
    }

    #[test]
    fn dropped_table_reports_dropped() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let pending = pending();
        let fut = pending.register(
            CorrelationId::new(),
            "R1",
            Duration::from_secs(30),
            rt.handle(),
        );
        drop(pending);
        assert_eq!(fut.wait().unwrap_err(), ReplyError::Dropped);
    }
}
