//! Deferred form submissions.
//!
//! Requests that could not be sent while offline are parked under a sync
//! tag. When the host reports connectivity for that tag every parked
//! request is resubmitted independently, oldest first. Successes are
//! removed; failures stay queued for the next trigger.

use serde::{Deserialize, Serialize};

use super::ServiceWorker;
use crate::Error;
use crate::http::Request;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SyncReport {
    pub tag: String,
    /// Queue ids resubmitted successfully and removed.
    pub replayed: Vec<i64>,
    /// Queue ids still parked after this pass.
    pub retained: Vec<i64>,
}

impl ServiceWorker {
    /// Park `request` for replay on the next `sync(tag)`.
    pub async fn enqueue(&self, tag: &str, request: &Request) -> Result<i64, Error> {
        if tag.trim().is_empty() {
            return Err(Error::InvalidInput("sync tag cannot be empty".into()));
        }
        let id = self.db.enqueue_request(tag, request).await?;
        tracing::debug!(tag, id, url = %request.url, "parked request for background sync");
        Ok(id)
    }

    /// Resubmit every request parked under `tag`.
    pub async fn sync(&self, tag: &str) -> Result<SyncReport, Error> {
        let mut report = SyncReport { tag: tag.to_string(), ..Default::default() };

        for parked in self.db.queued_requests(tag).await? {
            let outcome = match parked.to_request() {
                Ok(request) => match self.fetcher.fetch(&request).await {
                    Ok(response) if response.is_success() => Ok(()),
                    Ok(response) => Err(format!("status {}", response.status)),
                    Err(e) => Err(e.to_string()),
                },
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(()) => match self.db.remove_queued(parked.id).await {
                    Ok(_) => {
                        tracing::info!(tag, id = parked.id, url = %parked.url, "replayed parked request");
                        report.replayed.push(parked.id);
                    }
                    Err(e) => {
                        tracing::warn!(
                            tag,
                            id = parked.id,
                            url = %parked.url,
                            error = %e,
                            "request was delivered but could not be dequeued; it will be sent again"
                        );
                        report.retained.push(parked.id);
                    }
                },
                Err(reason) => {
                    tracing::warn!(
                        tag,
                        id = parked.id,
                        url = %parked.url,
                        attempts = parked.attempts + 1,
                        %reason,
                        "resubmission failed; keeping request queued"
                    );
                    if let Err(e) = self.db.record_sync_failure(parked.id, &reason).await {
                        tracing::warn!(tag, id = parked.id, error = %e, "could not record sync failure");
                    }
                    report.retained.push(parked.id);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::http::Response;
    use crate::worker::testing::*;

    fn submission(path: &str, body: &str) -> Request {
        let mut request = get(path);
        request.method = "POST".into();
        request.body = Some(Bytes::from(body.to_string()));
        request
    }

    #[tokio::test]
    async fn test_replay_removes_successes_and_keeps_failures() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&site_url("/api/contact"), Response::new(200, "ok"));
        fetcher.respond(&site_url("/api/careers"), Response::new(503, "busy"));
        let worker = worker(Arc::clone(&fetcher), "v1", &[]).await;

        let sent = worker.enqueue("contact-sync", &submission("/api/contact", "{}")).await.unwrap();
        let busy = worker.enqueue("contact-sync", &submission("/api/careers", "{}")).await.unwrap();

        let report = worker.sync("contact-sync").await.unwrap();
        assert_eq!(report.replayed, vec![sent]);
        assert_eq!(report.retained, vec![busy]);

        let left = worker.db().queued_requests("contact-sync").await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].attempts, 1);
        assert_eq!(left[0].last_error.as_deref(), Some("status 503"));
    }

    #[tokio::test]
    async fn test_entries_for_same_url_are_independent() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&site_url("/api/contact"), Response::new(201, "created"));
        let worker = worker(Arc::clone(&fetcher), "v1", &[]).await;

        worker.enqueue("contact-sync", &submission("/api/contact", "{\"n\":1}")).await.unwrap();
        worker.enqueue("contact-sync", &submission("/api/contact", "{\"n\":2}")).await.unwrap();

        let report = worker.sync("contact-sync").await.unwrap();
        assert_eq!(report.replayed.len(), 2);
        assert_eq!(fetcher.calls(&site_url("/api/contact")), 2);
    }

    #[tokio::test]
    async fn test_failed_entries_retry_until_success() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.fail(&site_url("/api/contact"), "offline");
        let worker = worker(Arc::clone(&fetcher), "v1", &[]).await;
        let id = worker.enqueue("contact-sync", &submission("/api/contact", "{}")).await.unwrap();

        for _ in 0..3 {
            let report = worker.sync("contact-sync").await.unwrap();
            assert_eq!(report.retained, vec![id]);
        }

        fetcher.respond(&site_url("/api/contact"), Response::new(200, "ok"));
        let report = worker.sync("contact-sync").await.unwrap();
        assert_eq!(report.replayed, vec![id]);
        assert!(worker.db().queued_requests("contact-sync").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_ignores_other_tags() {
        let worker = worker(Arc::new(ScriptedFetcher::new()), "v1", &[]).await;
        worker.enqueue("newsletter-sync", &submission("/api/newsletter", "{}")).await.unwrap();

        let report = worker.sync("contact-sync").await.unwrap();
        assert!(report.replayed.is_empty() && report.retained.is_empty());
        assert_eq!(worker.db().queued_requests("newsletter-sync").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dequeue_failure_does_not_abort_pass() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(&site_url("/api/contact"), Response::new(200, "ok"));
        fetcher.respond(&site_url("/api/careers"), Response::new(200, "ok"));
        let worker = worker(Arc::clone(&fetcher), "v1", &[]).await;

        let stuck = worker.enqueue("contact-sync", &submission("/api/contact", "{}")).await.unwrap();
        let sent = worker.enqueue("contact-sync", &submission("/api/careers", "{}")).await.unwrap();
        worker
            .db()
            .conn
            .call(move |conn| {
                conn.execute_batch(&format!(
                    "CREATE TRIGGER hold_{stuck} BEFORE DELETE ON sync_queue WHEN old.id = {stuck}
                     BEGIN SELECT RAISE(ABORT, 'queue row locked'); END;"
                ))
            })
            .await
            .unwrap();

        let report = worker.sync("contact-sync").await.unwrap();
        assert_eq!(report.retained, vec![stuck]);
        assert_eq!(report.replayed, vec![sent]);
        assert_eq!(fetcher.calls(&site_url("/api/careers")), 1);

        let left = worker.db().queued_requests("contact-sync").await.unwrap();
        assert_eq!(left.iter().map(|p| p.id).collect::<Vec<_>>(), vec![stuck]);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_tag() {
        let worker = worker(Arc::new(ScriptedFetcher::new()), "v1", &[]).await;
        let err = worker.enqueue(" ", &submission("/api/contact", "{}")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
