//! Post-write verification: confirm a committed page is retrievable and
//! not archived before the archiver is allowed to touch the source audio
//! (spec §4.9 "Verify before archive").

use crate::core::error::{Classify, RetryClass, StoreError, VerifyError};
use crate::retry::RetryPolicy;
use crate::store::DocumentStoreClient;
use std::time::Duration;
use tracing::{info, warn};

impl Classify for VerifyError {
    fn retry_class(&self) -> RetryClass {
        match self {
            VerifyError::NotFound(_) | VerifyError::Archived(_) => RetryClass::StoreVerificationMiss,
            VerifyError::Timeout => RetryClass::TransientExternal,
            VerifyError::Store(inner) => inner.retry_class(),
        }
    }
}

pub struct Verifier<C: DocumentStoreClient> {
    client: C,
    policy: RetryPolicy,
    per_attempt_timeout: Duration,
}

impl<C: DocumentStoreClient> Verifier<C> {
    pub fn new(client: C, policy: RetryPolicy, per_attempt_timeout: Duration) -> Self {
        Self { client, policy, per_attempt_timeout }
    }

    /// Confirm `page_id` exists and isn't archived. Never archives on a
    /// verification miss or timeout without exhausting the shared retry
    /// policy first (spec §4.9, Testable Property 10).
    pub async fn verify(&self, page_id: &str) -> Result<(), VerifyError> {
        let result = self
            .policy
            .run("verify.retrieve_page", |_attempt| async {
                match tokio::time::timeout(self.per_attempt_timeout, self.client.retrieve_page(page_id)).await {
                    Ok(Ok(page)) => Ok(page),
                    Ok(Err(StoreError::ClientError { status: 404, .. })) => {
                        Err(VerifyError::NotFound(page_id.to_string()))
                    }
                    Ok(Err(store_err)) => Err(VerifyError::Store(store_err)),
                    Err(_) => Err(VerifyError::Timeout),
                }
            })
            .await?;

        if result.get("archived").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            warn!(page_id, "page verified but is archived");
            return Err(VerifyError::Archived(page_id.to_string()));
        }

        info!(page_id, "page verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeClient {
        response: Value,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DocumentStoreClient for FakeClient {
        async fn create_page(&self, _: &str, _: Value, _: Value) -> Result<String, StoreError> {
            unimplemented!()
        }

        async fn retrieve_page(&self, _page_id: &str) -> Result<Value, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }

        async fn query_database(&self, _: &str) -> Result<Vec<Value>, StoreError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_verify_succeeds_for_non_archived_page() {
        let client = FakeClient { response: json!({ "id": "p1", "archived": false }), calls: Arc::new(AtomicUsize::new(0)) };
        let verifier = Verifier::new(client, RetryPolicy::new(2, Duration::from_millis(1)), Duration::from_secs(1));
        assert!(verifier.verify("p1").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_fails_for_archived_page() {
        let client = FakeClient { response: json!({ "id": "p1", "archived": true }), calls: Arc::new(AtomicUsize::new(0)) };
        let verifier = Verifier::new(client, RetryPolicy::new(2, Duration::from_millis(1)), Duration::from_secs(1));
        let result = verifier.verify("p1").await;
        assert!(matches!(result, Err(VerifyError::Archived(_))));
    }

    #[tokio::test]
    async fn test_verify_archived_miss_is_not_retried() {
        let client = FakeClient { response: json!({ "id": "p1", "archived": true }), calls: Arc::new(AtomicUsize::new(0)) };
        let calls = client.calls.clone();
        let verifier = Verifier::new(client, RetryPolicy::new(5, Duration::from_millis(1)), Duration::from_secs(1));
        let _ = verifier.verify("p1").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
