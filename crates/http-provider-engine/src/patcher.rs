//! Secret patcher
//!
//! Copies response fields into secrets. Patching is a side effect of
//! reconciliation, never a condition for it: [`SecretPatcher::apply`] has no
//! error to return, and every failure is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use http_provider_common::crd::HttpResponse;

use crate::model::SecretInjection;
use crate::predicate::{extract_path, response_context};
use crate::secrets::{SecretStore, SecretStoreError};

/// Writes response fields into secrets, best effort
pub struct SecretPatcher {
    store: Arc<dyn SecretStore>,
}

impl SecretPatcher {
    /// Create a patcher writing through `store`
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Apply every injection against `response`
    ///
    /// Entries whose path is absent are skipped. A key already holding the
    /// extracted value is not rewritten.
    pub async fn apply(
        &self,
        response: &HttpResponse,
        injections: &[SecretInjection],
        timeout: Duration,
    ) {
        if injections.is_empty() || response.status_code == 0 {
            return;
        }

        let ctx = response_context(response);
        for injection in injections {
            let value = match extract_path(&injection.response_path, &ctx) {
                Ok(Some(value)) => secret_value(value),
                Ok(None) => {
                    debug!(
                        target_secret = %injection,
                        path = %injection.response_path,
                        "response path not present, skipping secret injection"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        target_secret = %injection,
                        error = %e,
                        "invalid response path for secret injection"
                    );
                    continue;
                }
            };

            if let Err(e) = self.write_if_changed(injection, &value, timeout).await {
                warn!(
                    target_secret = %injection,
                    error = %e,
                    "failed to inject response data into secret"
                );
            }
        }
    }

    async fn write_if_changed(
        &self,
        injection: &SecretInjection,
        value: &str,
        timeout: Duration,
    ) -> Result<(), SecretStoreError> {
        let current = tokio::time::timeout(
            timeout,
            self.store
                .read(&injection.namespace, &injection.name, &injection.key),
        )
        .await
        .map_err(|_| SecretStoreError::Timeout(timeout))??;

        if current.as_deref() == Some(value) {
            debug!(target_secret = %injection, "secret already up to date");
            return Ok(());
        }

        tokio::time::timeout(
            timeout,
            self.store
                .write(&injection.namespace, &injection.name, &injection.key, value),
        )
        .await
        .map_err(|_| SecretStoreError::Timeout(timeout))??;

        debug!(target_secret = %injection, "injected response data into secret");
        Ok(())
    }
}

/// Strings are stored verbatim, everything else as JSON text
fn secret_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::fake::InMemorySecretStore;
    use crate::secrets::MockSecretStore;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn injection(key: &str, path: &str) -> SecretInjection {
        SecretInjection {
            namespace: "default".to_string(),
            name: "api-output".to_string(),
            key: key.to_string(),
            response_path: path.to_string(),
        }
    }

    fn response(body: &str) -> HttpResponse {
        HttpResponse {
            status_code: 200,
            body: body.to_string(),
            headers: Default::default(),
        }
    }

    #[tokio::test]
    async fn story_writes_extracted_fields() {
        let store = Arc::new(InMemorySecretStore::default());
        let patcher = SecretPatcher::new(store.clone());

        patcher
            .apply(
                &response(r#"{"token":"abc","meta":{"id":7}}"#),
                &[injection("token", ".body.token"), injection("meta", ".body.meta")],
                TIMEOUT,
            )
            .await;

        assert_eq!(store.get("default", "api-output", "token").as_deref(), Some("abc"));
        assert_eq!(store.get("default", "api-output", "meta").as_deref(), Some(r#"{"id":7}"#));
    }

    #[tokio::test]
    async fn story_injection_is_idempotent() {
        let store = Arc::new(InMemorySecretStore::default());
        let patcher = SecretPatcher::new(store.clone());
        let resp = response(r#"{"token":"abc"}"#);
        let injections = [injection("token", ".body.token")];

        patcher.apply(&resp, &injections, TIMEOUT).await;
        let after_first = store.get("default", "api-output", "token");
        patcher.apply(&resp, &injections, TIMEOUT).await;

        assert_eq!(store.get("default", "api-output", "token"), after_first);
        assert_eq!(store.write_count(), 1, "unchanged value must not be rewritten");
    }

    #[tokio::test]
    async fn story_changed_value_is_rewritten() {
        let store = Arc::new(
            InMemorySecretStore::default().with_value("default", "api-output", "token", "old"),
        );
        let patcher = SecretPatcher::new(store.clone());

        patcher
            .apply(&response(r#"{"token":"new"}"#), &[injection("token", ".body.token")], TIMEOUT)
            .await;

        assert_eq!(store.get("default", "api-output", "token").as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn missing_path_is_skipped() {
        let store = Arc::new(InMemorySecretStore::default());
        let patcher = SecretPatcher::new(store.clone());

        patcher
            .apply(
                &response(r#"{"other":"x"}"#),
                &[injection("token", ".body.token"), injection("other", ".body.other")],
                TIMEOUT,
            )
            .await;

        assert_eq!(store.get("default", "api-output", "token"), None);
        assert_eq!(store.get("default", "api-output", "other").as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn store_failures_are_swallowed() {
        let mut store = MockSecretStore::new();
        store.expect_read().returning(|_, _, _| {
            Err(SecretStoreError::Timeout(Duration::from_millis(1)))
        });
        store.expect_write().never();
        let patcher = SecretPatcher::new(Arc::new(store));

        patcher
            .apply(&response(r#"{"token":"abc"}"#), &[injection("token", ".body.token")], TIMEOUT)
            .await;
    }

    #[tokio::test]
    async fn nothing_is_written_without_a_response() {
        let mut store = MockSecretStore::new();
        store.expect_read().never();
        store.expect_write().never();
        let patcher = SecretPatcher::new(Arc::new(store));

        patcher
            .apply(&HttpResponse::default(), &[injection("token", ".body.token")], TIMEOUT)
            .await;
    }
}
