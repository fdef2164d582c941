//! Connection pooling.
//!
//! A [`ClientPool`] hands out one [`NodeClient`] per distinct set of
//! connection parameters, connecting on first use. Entries are never
//! evicted. The pool is an ordinary value owned by whoever needs it; there
//! is no process-wide instance.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::NodeClient;
use crate::error::ClientError;
use crate::session::Connector;

/// Default session timeout, in seconds.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30;

/// Parameters identifying a ZooKeeper connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Comma-separated `host:port` list.
    pub servers: String,
    /// Session timeout in seconds.
    pub session_timeout_secs: u64,
    /// Digest username. Empty counts as absent.
    pub username: Option<String>,
    /// Digest password. Empty counts as absent.
    pub password: Option<String>,
}

impl ConnectionParams {
    /// Parameters for an unauthenticated connection with the default timeout.
    pub fn new(servers: impl Into<String>) -> Self {
        Self {
            servers: servers.into(),
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            username: None,
            password: None,
        }
    }

    /// Set the session timeout.
    pub fn with_session_timeout(mut self, secs: u64) -> Self {
        self.session_timeout_secs = secs;
        self
    }

    /// Authenticate with a digest username and password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Validate the parameters and build the pool key.
    ///
    /// Servers are split on `,` and trimmed. Credentials must be given
    /// together or not at all.
    pub fn key(&self) -> Result<ConnectionKey, ClientError> {
        let servers: Vec<String> = self
            .servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if servers.is_empty() {
            return Err(ClientError::MissingServers);
        }

        let present = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let credentials = match (present(&self.username), present(&self.password)) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            _ => return Err(ClientError::IncompleteCredentials),
        };

        Ok(ConnectionKey {
            servers,
            session_timeout_secs: self.session_timeout_secs,
            credentials,
        })
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("servers", &self.servers)
            .field("session_timeout_secs", &self.session_timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct Credentials {
    username: String,
    password: String,
}

/// Validated, structured pool key.
///
/// Compared field by field, so no choice of server list or credentials can
/// make two different parameter sets share a connection.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    servers: Vec<String>,
    session_timeout_secs: u64,
    credentials: Option<Credentials>,
}

impl ConnectionKey {
    /// The individual `host:port` entries.
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// The session timeout.
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// The digest username, if any.
    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }
}

impl fmt::Debug for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionKey")
            .field("servers", &self.servers)
            .field("session_timeout_secs", &self.session_timeout_secs)
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

/// A cache of node clients keyed by connection parameters.
pub struct ClientPool<C> {
    connector: C,
    clients: Mutex<HashMap<ConnectionKey, NodeClient>>,
}

impl<C: Connector> ClientPool<C> {
    /// Create an empty pool that connects with `connector`.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The connector used for new connections.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Return the client for `params`, connecting if this is the first
    /// request with these parameters.
    ///
    /// Parameters are validated before any network activity. The pool lock
    /// is held while a new connection is established, so concurrent first
    /// requests for the same parameters produce a single connection. A
    /// failed connection is not cached; the next request tries again.
    pub async fn get_or_create(
        &self,
        params: &ConnectionParams,
    ) -> Result<NodeClient, ClientError> {
        let key = params.key()?;

        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&key) {
            debug!(servers = ?key.servers, "Reusing pooled ZooKeeper connection");
            return Ok(client.clone());
        }

        let client = self.connect(&key).await.map_err(|source| {
            warn!(servers = ?key.servers, error = %source, "ZooKeeper connection failed");
            ClientError::Connect {
                servers: key.servers.join(","),
                source,
            }
        })?;

        clients.insert(key.clone(), client.clone());
        info!(
            servers = ?key.servers,
            username = ?key.username(),
            pooled = clients.len(),
            "Pooled new ZooKeeper connection"
        );
        Ok(client)
    }

    async fn connect(&self, key: &ConnectionKey) -> Result<NodeClient, crate::error::ServiceError> {
        let session = self
            .connector
            .connect(&key.servers, key.session_timeout())
            .await?;

        if let Some(credentials) = &key.credentials {
            let auth = format!("{}:{}", credentials.username, credentials.password);
            session.add_auth("digest", auth.as_bytes()).await?;
        }

        Ok(NodeClient::new(session))
    }

    /// Number of pooled connections.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Whether no connection has been pooled yet.
    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

impl<C> fmt::Debug for ClientPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool").finish_non_exhaustive()
    }
}
