//! Secret store collaborator
//!
//! Templates read secret values and secret injection writes them. Both go
//! through [`SecretStore`] so the engine can be exercised without a cluster.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::debug;

use http_provider_common::FIELD_MANAGER;

/// Secret store failures
#[derive(Debug, Error)]
pub enum SecretStoreError {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// A stored value is not valid UTF-8
    #[error("secret {namespace}/{name} key '{key}' is not valid UTF-8")]
    InvalidUtf8 {
        /// Secret namespace
        namespace: String,
        /// Secret name
        name: String,
        /// Key within the secret
        key: String,
    },

    /// The store did not answer before the deadline
    #[error("secret store timed out after {0:?}")]
    Timeout(Duration),
}

/// Read and write individual secret keys
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read one key; `None` when the secret or the key does not exist
    async fn read(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, SecretStoreError>;

    /// Write one key, creating the secret when it does not exist
    async fn write(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SecretStoreError>;
}

/// [`SecretStore`] backed by Kubernetes Secrets
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    /// Create a store using the given kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn read(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, SecretStoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let Some(secret) = api.get_opt(name).await? else {
            return Ok(None);
        };

        match secret.data.as_ref().and_then(|data| data.get(key)) {
            Some(bytes) => String::from_utf8(bytes.0.clone())
                .map(Some)
                .map_err(|_| SecretStoreError::InvalidUtf8 {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    key: key.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn write(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SecretStoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        if api.get_opt(name).await?.is_none() {
            debug!(namespace = %namespace, secret = %name, "creating secret");
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                string_data: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
                ..Default::default()
            };
            api.create(&PostParams::default(), &secret).await?;
            return Ok(());
        }

        // stringData is merged into data server-side, leaving other keys alone.
        let patch = serde_json::json!({
            "stringData": { key: value }
        });
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory secret store for stateful tests

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    type Key = (String, String, String);

    /// Secret store holding values in memory and counting writes
    #[derive(Default)]
    pub(crate) struct InMemorySecretStore {
        values: Mutex<BTreeMap<Key, String>>,
        writes: Mutex<usize>,
    }

    impl InMemorySecretStore {
        pub(crate) fn with_value(self, namespace: &str, name: &str, key: &str, value: &str) -> Self {
            self.values.lock().expect("lock").insert(
                (namespace.to_string(), name.to_string(), key.to_string()),
                value.to_string(),
            );
            self
        }

        pub(crate) fn get(&self, namespace: &str, name: &str, key: &str) -> Option<String> {
            self.values
                .lock()
                .expect("lock")
                .get(&(namespace.to_string(), name.to_string(), key.to_string()))
                .cloned()
        }

        pub(crate) fn write_count(&self) -> usize {
            *self.writes.lock().expect("lock")
        }
    }

    #[async_trait]
    impl SecretStore for InMemorySecretStore {
        async fn read(
            &self,
            namespace: &str,
            name: &str,
            key: &str,
        ) -> Result<Option<String>, SecretStoreError> {
            Ok(self.get(namespace, name, key))
        }

        async fn write(
            &self,
            namespace: &str,
            name: &str,
            key: &str,
            value: &str,
        ) -> Result<(), SecretStoreError> {
            *self.writes.lock().expect("lock") += 1;
            self.values.lock().expect("lock").insert(
                (namespace.to_string(), name.to_string(), key.to_string()),
                value.to_string(),
            );
            Ok(())
        }
    }
}
