//! The remote side of the provider: a live session with a ZooKeeper ensemble.
//!
//! [`Session`] exposes the primitives the node client is built on, one call
//! per ZooKeeper request. [`Connector`] establishes sessions.
//!
//! Two implementations ship with the crate:
//!
//! - [`remote::ZooKeeperConnector`]: a real ensemble, through the `zookeeper` crate.
//! - [`memory::InMemoryConnector`]: an in-process ensemble, for tests and local runs.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ServiceError;
use crate::node::{Acl, Stat};

pub mod memory;
pub mod remote;

/// Version argument that matches any node version.
pub const MATCH_ANY_VERSION: Option<i32> = None;

/// How a node is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// A plain node that outlives the session.
    Persistent,
    /// A persistent node whose name gets a server-assigned counter appended.
    PersistentSequential,
}

impl CreateMode {
    /// Whether the server appends a sequence counter to the name.
    pub fn is_sequential(self) -> bool {
        matches!(self, CreateMode::PersistentSequential)
    }
}

/// A live session with a ZooKeeper ensemble.
///
/// Implementations must be safe to share between concurrent callers; a
/// session is cached by the pool and handed to every operation issued with
/// the same connection parameters.
#[async_trait::async_trait]
pub trait Session: Send + Sync {
    /// Create a node and return the path it was created at.
    ///
    /// For sequential modes the returned path differs from `path`.
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<String, ServiceError>;

    /// Fetch a node's data and metadata.
    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), ServiceError>;

    /// Fetch a node's ACL.
    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat), ServiceError>;

    /// Replace a node's data. `None` matches any version.
    async fn set_data(
        &self,
        path: &str,
        data: &[u8],
        version: Option<i32>,
    ) -> Result<Stat, ServiceError>;

    /// Replace a node's ACL. `None` matches any ACL version.
    async fn set_acl(
        &self,
        path: &str,
        acl: &[Acl],
        version: Option<i32>,
    ) -> Result<Stat, ServiceError>;

    /// Delete a childless node. `None` matches any version.
    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), ServiceError>;

    /// Return the node's metadata, or `None` when it does not exist.
    async fn exists(&self, path: &str) -> Result<Option<Stat>, ServiceError>;

    /// List the names (not paths) of a node's immediate children.
    async fn get_children(&self, path: &str) -> Result<Vec<String>, ServiceError>;

    /// Add credentials to the session.
    async fn add_auth(&self, scheme: &str, auth: &[u8]) -> Result<(), ServiceError>;
}

/// Establishes sessions with an ensemble.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `servers` (`host:port` entries) with the given session timeout.
    async fn connect(
        &self,
        servers: &[String],
        session_timeout: Duration,
    ) -> Result<Arc<dyn Session>, ServiceError>;
}
