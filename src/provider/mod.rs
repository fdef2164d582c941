//! The ZooKeeper provider.
//!
//! [`ZooKeeperProvider`] serves two resources and one data source:
//!
//! - `zookeeper_znode`: a persistent node at a fixed path.
//! - `zookeeper_sequential_znode`: a persistent sequential node; ZooKeeper
//!   appends a counter to `path_prefix` and the resulting `path` is computed.
//! - `zookeeper_znode` (data source): reads an existing node.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_zookeeper::session::memory::InMemoryEnsemble;
//! use hemmer_provider_zookeeper::testing::ProviderTester;
//! use hemmer_provider_zookeeper::ZooKeeperProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let ensemble = InMemoryEnsemble::new();
//! let tester = ProviderTester::new(ZooKeeperProvider::new(ensemble.connector()));
//! tester.configure(json!({"servers": "localhost:2181"})).await.unwrap();
//!
//! let state = tester
//!     .create("zookeeper_znode", json!({"path": "/app/config", "data": "v1"}))
//!     .await
//!     .unwrap();
//! assert_eq!(state["data_base64"], "djE=");
//! assert_eq!(state["stat"]["version"], 0);
//! # });
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::NodeClient;
use crate::config::ProviderConfig;
use crate::error::{ClientError, ProviderError, ServiceError};
use crate::node::ZNode;
use crate::path::remove_sequential_suffix;
use crate::pool::ClientPool;
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::session::remote::ZooKeeperConnector;
use crate::session::Connector;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

mod schema;
mod state;

use state::{data_for_create, data_for_update, node_changed, parse_acl, required_str, znode_state};

/// Resource (and data source) type of a persistent node.
pub const ZNODE: &str = "zookeeper_znode";
/// Resource type of a persistent sequential node.
pub const SEQUENTIAL_ZNODE: &str = "zookeeper_sequential_znode";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Hemmer provider managing ZooKeeper nodes.
///
/// Connections come from an owned [`ClientPool`]; configuring twice with the
/// same settings reuses the pooled session.
pub struct ZooKeeperProvider<C = ZooKeeperConnector> {
    pool: ClientPool<C>,
    client: RwLock<Option<NodeClient>>,
    env: EnvLookup,
}

impl ZooKeeperProvider<ZooKeeperConnector> {
    /// A provider that connects to real ensembles.
    pub fn remote() -> Self {
        Self::new(ZooKeeperConnector::new())
    }
}

impl<C: Connector> ZooKeeperProvider<C> {
    /// Create an unconfigured provider that connects with `connector`.
    ///
    /// Configuration falls back to the process environment.
    pub fn new(connector: C) -> Self {
        Self {
            pool: ClientPool::new(connector),
            client: RwLock::new(None),
            env: Arc::new(|name: &str| std::env::var(name).ok()),
        }
    }

    /// Replace the environment used for configuration fallbacks.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(env);
        self
    }

    /// The connection pool.
    pub fn pool(&self) -> &ClientPool<C> {
        &self.pool
    }

    async fn client(&self) -> Result<NodeClient, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition(
                "provider is not configured; call configure first".to_string(),
            )
        })
    }

    /// Read the node behind `current_state`, `None` when it is gone.
    async fn read_node(&self, current_state: &Value) -> Result<Option<ZNode>, ProviderError> {
        let path = required_str(current_state, "path")?;
        match self.client().await?.read(path).await {
            Ok(node) => Ok(Some(node)),
            Err(e) if e.is_not_found() => {
                warn!(path, "ZNode no longer exists");
                Ok(None)
            },
            Err(e) => Err(e.into()),
        }
    }
}

fn resource_schema(resource_type: &str) -> Result<Schema, ProviderError> {
    match resource_type {
        ZNODE => Ok(schema::znode()),
        SEQUENTIAL_ZNODE => Ok(schema::sequential_znode()),
        other => Err(ProviderError::UnknownResource(other.to_string())),
    }
}

/// Build the state of `resource_type` from a node. Sequential nodes keep
/// `path_prefix` when known and otherwise derive it from the path.
fn resource_state(
    resource_type: &str,
    node: &ZNode,
    path_prefix: Option<&str>,
) -> Result<Value, ProviderError> {
    let mut state: Map<String, Value> = znode_state(node)?;
    if resource_type == SEQUENTIAL_ZNODE {
        let prefix = path_prefix.unwrap_or_else(|| remove_sequential_suffix(&node.path));
        state.insert("path_prefix".to_string(), Value::String(prefix.to_string()));
    }
    Ok(Value::Object(state))
}

fn path_prefix(state: &Value) -> Option<&str> {
    state
        .get("path_prefix")
        .and_then(Value::as_str)
        .filter(|prefix| !prefix.is_empty())
}

#[async_trait::async_trait]
impl<C: Connector + 'static> ProviderService for ZooKeeperProvider<C> {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(schema::provider_config())
            .with_resource(ZNODE, schema::znode())
            .with_resource(SEQUENTIAL_ZNODE, schema::sequential_znode())
            .with_data_source(ZNODE, schema::znode_data_source())
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&schema::provider_config(), &config))
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&schema::provider_config(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let settings = ProviderConfig::from_value_with_env(&config, |name| (*self.env)(name))?;
        debug!(?settings, "Resolved provider configuration");

        let client = self.pool.get_or_create(&settings.connection_params()).await?;
        *self.client.write().await = Some(client);
        info!(servers = %settings.servers, "Provider configured");
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&resource_schema(resource_type)?, &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = resource_schema(resource_type)?;
        Ok(PlanResult::from_schema(
            &schema,
            prior_state.as_ref(),
            &proposed_state,
        ))
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        resource_schema(resource_type)?;
        let data = data_for_create(&planned_state)?;
        let acl = parse_acl(&planned_state)?;
        let client = self.client().await?;

        let node = if resource_type == SEQUENTIAL_ZNODE {
            let prefix = required_str(&planned_state, "path_prefix")?;
            client.create_sequential(prefix, &data, &acl).await?
        } else {
            let path = required_str(&planned_state, "path")?;
            client.create(path, &data, &acl).await?
        };

        info!(path = %node.path, "Created ZNode");
        resource_state(resource_type, &node, path_prefix(&planned_state))
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        resource_schema(resource_type)?;
        match self.read_node(&current_state).await? {
            Some(node) => resource_state(resource_type, &node, path_prefix(&current_state)),
            None => Ok(Value::Null),
        }
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        resource_schema(resource_type)?;
        let path = required_str(&prior_state, "path")?;
        let client = self.client().await?;

        let node = if node_changed(&prior_state, &planned_state) {
            let data = data_for_update(&prior_state, &planned_state)?;
            let acl = parse_acl(&planned_state)?;
            client.update(path, &data, &acl).await?
        } else {
            debug!(path, "ZNode unchanged, skipping update");
            client.read(path).await?
        };

        resource_state(resource_type, &node, path_prefix(&planned_state))
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        resource_schema(resource_type)?;
        let path = required_str(&current_state, "path")?;
        match self.client().await?.delete(path).await {
            Ok(()) => Ok(()),
            Err(ClientError::Operation {
                source: ServiceError::NoNode,
                ..
            }) => {
                debug!(path, "ZNode already deleted");
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        resource_schema(resource_type)?;
        let lookup = serde_json::json!({ "path": id });
        let node = self
            .read_node(&lookup)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("ZNode '{}' does not exist", id)))?;

        let state = resource_state(resource_type, &node, None)?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        match data_source_type {
            ZNODE => Ok(validate(&schema::znode_data_source(), &config)),
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        if data_source_type != ZNODE {
            return Err(ProviderError::UnknownResource(data_source_type.to_string()));
        }
        let path = required_str(&config, "path")?;
        let node = self.client().await?.read(path).await?;
        Ok(Value::Object(znode_state(&node)?))
    }
}

impl<C> fmt::Debug for ZooKeeperProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZooKeeperProvider")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
