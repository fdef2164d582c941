//! The parent-aware node client.
//!
//! [`NodeClient`] layers tree semantics over a [`Session`]: creates make any
//! missing ancestors first, sequential creates resolve the server-assigned
//! name, and deletes remove the whole subtree. Every successful write returns
//! the node as read back from the ensemble, so callers always see
//! server-assigned metadata.
//!
//! Updates and deletes use match-any-version semantics: the last writer wins.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{ClientError, ServiceError};
use crate::node::{Acl, ZNode};
use crate::path;
use crate::session::{CreateMode, Session, MATCH_ANY_VERSION};

type DeleteFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>>;

/// Hierarchical CRUD over one ZooKeeper session.
///
/// Cloning is cheap; clones share the session.
#[derive(Clone)]
pub struct NodeClient {
    session: Arc<dyn Session>,
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient").finish_non_exhaustive()
    }
}

impl NodeClient {
    /// Wrap an established session.
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    /// Create a node at `path`, creating missing ancestors as empty nodes.
    ///
    /// Ancestors get the same ACL as the node. An ancestor created
    /// concurrently by someone else is not an error, but the node itself
    /// already existing is reported as a conflict. An empty `acl` means
    /// `world:anyone` with all permissions.
    #[instrument(skip(self, data, acl), fields(data_len = data.len()))]
    pub async fn create(&self, path: &str, data: &[u8], acl: &[Acl]) -> Result<ZNode, ClientError> {
        if path.ends_with(path::SEPARATOR) {
            return Err(ClientError::InvalidPath(path.to_string()));
        }
        self.create_with_mode(path, data, acl, CreateMode::Persistent)
            .await
    }

    /// Create a node named `path_prefix` followed by a server-assigned,
    /// zero-padded 10 digit counter.
    ///
    /// A prefix ending in `/` yields a node named only by the counter. The
    /// returned node carries the assigned path;
    /// [`remove_sequential_suffix`](crate::path::remove_sequential_suffix)
    /// recovers the prefix from it.
    #[instrument(skip(self, data, acl), fields(data_len = data.len()))]
    pub async fn create_sequential(
        &self,
        path_prefix: &str,
        data: &[u8],
        acl: &[Acl],
    ) -> Result<ZNode, ClientError> {
        self.create_with_mode(path_prefix, data, acl, CreateMode::PersistentSequential)
            .await
    }

    async fn create_with_mode(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<ZNode, ClientError> {
        if !path::is_absolute(path) {
            return Err(ClientError::RelativePath(path.to_string()));
        }
        let acl = effective_acl(acl);

        self.ensure_ancestors(path, &acl).await?;

        let created = self
            .session
            .create(path, data, &acl, mode)
            .await
            .map_err(|e| ClientError::operation("create", path, e))?;
        debug!(path = %created, "Created ZNode");

        self.read(&created).await
    }

    async fn ensure_ancestors(&self, path: &str, acl: &[Acl]) -> Result<(), ClientError> {
        for ancestor in path::ancestors(path) {
            if self.exists(&ancestor).await? {
                continue;
            }
            match self
                .session
                .create(&ancestor, &[], acl, CreateMode::Persistent)
                .await
            {
                Ok(_) => debug!(path = %ancestor, "Created parent ZNode"),
                // Lost a race with a concurrent create sharing this ancestor.
                Err(ServiceError::NodeExists) => {
                    debug!(path = %ancestor, "Parent ZNode appeared concurrently")
                },
                Err(e) => return Err(ClientError::operation("create parent", ancestor, e)),
            }
        }
        Ok(())
    }

    /// Read a node's data, metadata and ACL.
    ///
    /// Data and ACL are two separate requests; if the node disappears in
    /// between, the read fails rather than returning a partial node.
    #[instrument(skip(self))]
    pub async fn read(&self, path: &str) -> Result<ZNode, ClientError> {
        let (data, stat) = self
            .session
            .get_data(path)
            .await
            .map_err(|e| ClientError::operation("read", path, e))?;
        let (acl, _) = self
            .session
            .get_acl(path)
            .await
            .map_err(|e| ClientError::operation("fetch ACLs for", path, e))?;

        Ok(ZNode {
            path: path.to_string(),
            data,
            stat,
            acl,
        })
    }

    /// Replace the ACL and data of an existing node.
    ///
    /// Fails with [`ClientError::CannotUpdateNotFound`] when the node does
    /// not exist; nothing is created in that case.
    ///
    /// The ACL is written before the data, as two separate requests. If the
    /// data write fails, the node keeps the new ACL and its old data; the
    /// error is returned and nothing is rolled back.
    #[instrument(skip(self, data, acl), fields(data_len = data.len()))]
    pub async fn update(&self, path: &str, data: &[u8], acl: &[Acl]) -> Result<ZNode, ClientError> {
        if !self.exists(path).await? {
            return Err(ClientError::CannotUpdateNotFound(path.to_string()));
        }
        let acl = effective_acl(acl);

        self.session
            .set_acl(path, &acl, MATCH_ANY_VERSION)
            .await
            .map_err(|e| ClientError::operation("update ACL of", path, e))?;
        self.session
            .set_data(path, data, MATCH_ANY_VERSION)
            .await
            .map_err(|e| ClientError::operation("update", path, e))?;
        debug!("Updated ZNode");

        self.read(path).await
    }

    /// Delete a node and all of its descendants, deepest first.
    ///
    /// On failure, siblings of the failing child are left in place and the
    /// error names the child. Deleting an absent node fails with a
    /// not-found error ([`ClientError::is_not_found`]).
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        if path == path::ROOT {
            return Err(ClientError::operation("delete", path, ServiceError::BadArguments));
        }
        self.delete_tree(path).await
    }

    fn delete_tree<'a>(&'a self, path: &'a str) -> DeleteFuture<'a> {
        Box::pin(async move {
            let children = self
                .session
                .get_children(path)
                .await
                .map_err(|e| ClientError::operation("list children of", path, e))?;

            for name in children {
                let child = path::join_child(path, &name);
                if let Err(e) = self.delete_tree(&child).await {
                    return Err(ClientError::ChildDelete {
                        path: path.to_string(),
                        child,
                        source: Box::new(e),
                    });
                }
            }

            self.session
                .delete(path, MATCH_ANY_VERSION)
                .await
                .map_err(|e| ClientError::operation("delete", path, e))?;
            debug!(path, "Deleted ZNode");
            Ok(())
        })
    }

    /// Whether a node exists at `path`. Errors are never reported as `false`.
    #[instrument(skip(self))]
    pub async fn exists(&self, path: &str) -> Result<bool, ClientError> {
        let stat = self
            .session
            .exists(path)
            .await
            .map_err(|e| ClientError::operation("check existence of", path, e))?;
        Ok(stat.is_some())
    }
}

fn effective_acl(acl: &[Acl]) -> Cow<'_, [Acl]> {
    if acl.is_empty() {
        Cow::Owned(Acl::world_all())
    } else {
        Cow::Borrowed(acl)
    }
}
