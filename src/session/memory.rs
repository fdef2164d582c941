//! An in-process ZooKeeper ensemble.
//!
//! [`InMemoryEnsemble`] keeps a node tree with the server-side rules the
//! provider depends on: parents must exist, deletes require an empty node,
//! sequential names come from the parent's `cversion`, every write bumps the
//! zxid, and ACLs are enforced against `world:anyone` and digest identities.
//! Sessions created from the same ensemble share one tree, so several
//! clients (with different credentials) can observe each other's writes.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_zookeeper::session::memory::InMemoryEnsemble;
//! use hemmer_provider_zookeeper::client::NodeClient;
//! use hemmer_provider_zookeeper::node::Acl;
//!
//! # tokio_test::block_on(async {
//! let ensemble = InMemoryEnsemble::new();
//! let client = NodeClient::new(ensemble.session());
//!
//! let znode = client.create("/a/b/c", b"x", &Acl::world_all()).await.unwrap();
//! assert_eq!(znode.data, b"x");
//! assert!(client.exists("/a").await.unwrap());
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::{Connector, CreateMode, Session};
use crate::error::ServiceError;
use crate::node::{digest_id, perms, Acl, Stat};
use crate::path;

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    acl: Vec<Acl>,
    stat: Stat,
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, Entry>,
    zxid: i64,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            path::ROOT.to_string(),
            Entry {
                data: Vec::new(),
                acl: Acl::world_all(),
                stat: Stat::default(),
            },
        );
        Self { nodes, zxid: 0 }
    }

    fn next_zxid(&mut self) -> i64 {
        self.zxid += 1;
        self.zxid
    }

    fn get(&self, path: &str) -> Result<&Entry, ServiceError> {
        self.nodes.get(path).ok_or(ServiceError::NoNode)
    }

    fn get_mut(&mut self, path: &str) -> Result<&mut Entry, ServiceError> {
        self.nodes.get_mut(path).ok_or(ServiceError::NoNode)
    }

    fn children(&self, path: &str) -> Vec<String> {
        let prefix = if path == path::ROOT {
            path::ROOT.to_string()
        } else {
            format!("{}{}", path, path::SEPARATOR)
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let name = &key[prefix.len()..];
                (!name.is_empty() && !name.contains(path::SEPARATOR)).then(|| name.to_string())
            })
            .collect()
    }
}

#[derive(Debug)]
struct Shared {
    tree: Mutex<Tree>,
    available: AtomicBool,
}

/// An in-memory ZooKeeper ensemble.
///
/// Cloning yields another handle to the same tree.
#[derive(Debug, Clone)]
pub struct InMemoryEnsemble {
    shared: Arc<Shared>,
}

impl Default for InMemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEnsemble {
    /// Create an ensemble holding only the root node.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tree: Mutex::new(Tree::new()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Open an unauthenticated session.
    pub fn session(&self) -> Arc<dyn Session> {
        Arc::new(InMemorySession {
            ensemble: self.clone(),
            identities: Mutex::new(Vec::new()),
        })
    }

    /// A connector handing out sessions on this ensemble.
    pub fn connector(&self) -> InMemoryConnector {
        InMemoryConnector {
            ensemble: self.clone(),
            connects: AtomicUsize::new(0),
            refusals: AtomicUsize::new(0),
        }
    }

    /// Simulate an outage. While unavailable, connects and every session
    /// call fail with [`ServiceError::ConnectionClosed`].
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// All node paths currently in the tree, root included, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.shared
            .tree
            .lock()
            .map(|tree| tree.nodes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn tree(&self) -> Result<MutexGuard<'_, Tree>, ServiceError> {
        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(ServiceError::ConnectionClosed);
        }
        self.shared
            .tree
            .lock()
            .map_err(|_| ServiceError::System("in-memory ensemble lock poisoned".to_string()))
    }
}

/// Connector for an [`InMemoryEnsemble`].
#[derive(Debug)]
pub struct InMemoryConnector {
    ensemble: InMemoryEnsemble,
    connects: AtomicUsize,
    refusals: AtomicUsize,
}

impl InMemoryConnector {
    /// Number of sessions established so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Refuse the next `count` connection attempts with
    /// [`ServiceError::ConnectionClosed`].
    pub fn refuse_next(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    /// The ensemble this connector connects to.
    pub fn ensemble(&self) -> &InMemoryEnsemble {
        &self.ensemble
    }
}

#[async_trait::async_trait]
impl Connector for InMemoryConnector {
    async fn connect(
        &self,
        servers: &[String],
        session_timeout: Duration,
    ) -> Result<Arc<dyn Session>, ServiceError> {
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused || !self.ensemble.shared.available.load(Ordering::SeqCst) {
            return Err(ServiceError::ConnectionClosed);
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        debug!(servers = ?servers, ?session_timeout, "Opened in-memory session");
        Ok(self.ensemble.session())
    }
}

/// A session on an [`InMemoryEnsemble`].
struct InMemorySession {
    ensemble: InMemoryEnsemble,
    identities: Mutex<Vec<(String, String)>>,
}

impl InMemorySession {
    fn check(&self, acl: &[Acl], wanted: i32) -> Result<(), ServiceError> {
        let identities = self
            .identities
            .lock()
            .map_err(|_| ServiceError::System("session identities lock poisoned".to_string()))?;

        let granted = acl.iter().filter(|entry| entry.allows(wanted)).any(|entry| {
            (entry.scheme == "world" && entry.id == "anyone")
                || identities
                    .iter()
                    .any(|(scheme, id)| *scheme == entry.scheme && *id == entry.id)
        });

        if granted {
            Ok(())
        } else {
            Err(ServiceError::NotAuthenticated)
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn check_version(expected: Option<i32>, actual: i32) -> Result<(), ServiceError> {
    match expected {
        Some(version) if version != actual => Err(ServiceError::BadVersion),
        _ => Ok(()),
    }
}

fn validate_create_path(path: &str, mode: CreateMode) -> Result<(), ServiceError> {
    if !path::is_absolute(path) || (path == path::ROOT && !mode.is_sequential()) {
        return Err(ServiceError::BadArguments);
    }
    let body = &path[1..];
    let mut segments: Vec<&str> = body.split(path::SEPARATOR).collect();
    // Sequential names may end with an empty segment: the counter fills it.
    if mode.is_sequential() && segments.last() == Some(&"") {
        segments.pop();
    }
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ServiceError::BadArguments);
    }
    Ok(())
}

#[async_trait::async_trait]
impl Session for InMemorySession {
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<String, ServiceError> {
        validate_create_path(path, mode)?;
        if acl.is_empty() {
            return Err(ServiceError::InvalidAcl);
        }

        let mut tree = self.ensemble.tree()?;
        let parent_path = path::parent(path).to_string();
        let parent = tree.get(&parent_path)?;
        self.check(&parent.acl, perms::CREATE)?;

        let created_path = if mode.is_sequential() {
            format!("{}{:010}", path, parent.stat.cversion)
        } else {
            path.to_string()
        };
        if tree.nodes.contains_key(&created_path) {
            return Err(ServiceError::NodeExists);
        }

        let zxid = tree.next_zxid();
        let now = now_millis();
        tree.nodes.insert(
            created_path.clone(),
            Entry {
                data: data.to_vec(),
                acl: acl.to_vec(),
                stat: Stat {
                    czxid: zxid,
                    mzxid: zxid,
                    pzxid: zxid,
                    ctime: now,
                    mtime: now,
                    data_length: data.len() as i32,
                    ..Stat::default()
                },
            },
        );

        let parent = tree.get_mut(&parent_path)?;
        parent.stat.cversion += 1;
        parent.stat.num_children += 1;
        parent.stat.pzxid = zxid;

        Ok(created_path)
    }

    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), ServiceError> {
        let tree = self.ensemble.tree()?;
        let entry = tree.get(path)?;
        self.check(&entry.acl, perms::READ)?;
        Ok((entry.data.clone(), entry.stat))
    }

    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat), ServiceError> {
        let tree = self.ensemble.tree()?;
        let entry = tree.get(path)?;
        self.check(&entry.acl, perms::READ)
            .or_else(|_| self.check(&entry.acl, perms::ADMIN))?;
        Ok((entry.acl.clone(), entry.stat))
    }

    async fn set_data(
        &self,
        path: &str,
        data: &[u8],
        version: Option<i32>,
    ) -> Result<Stat, ServiceError> {
        let mut tree = self.ensemble.tree()?;
        let entry = tree.get(path)?;
        self.check(&entry.acl, perms::WRITE)?;
        check_version(version, entry.stat.version)?;

        let zxid = tree.next_zxid();
        let entry = tree.get_mut(path)?;
        entry.data = data.to_vec();
        entry.stat.version += 1;
        entry.stat.mzxid = zxid;
        entry.stat.mtime = now_millis();
        entry.stat.data_length = data.len() as i32;
        Ok(entry.stat)
    }

    async fn set_acl(
        &self,
        path: &str,
        acl: &[Acl],
        version: Option<i32>,
    ) -> Result<Stat, ServiceError> {
        if acl.is_empty() {
            return Err(ServiceError::InvalidAcl);
        }

        let mut tree = self.ensemble.tree()?;
        let entry = tree.get(path)?;
        self.check(&entry.acl, perms::ADMIN)?;
        check_version(version, entry.stat.aversion)?;

        tree.next_zxid();
        let entry = tree.get_mut(path)?;
        entry.acl = acl.to_vec();
        entry.stat.aversion += 1;
        Ok(entry.stat)
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), ServiceError> {
        if path == path::ROOT {
            return Err(ServiceError::BadArguments);
        }

        let mut tree = self.ensemble.tree()?;
        let entry = tree.get(path)?;
        let (entry_version, entry_children) = (entry.stat.version, entry.stat.num_children);
        let parent_path = path::parent(path).to_string();
        self.check(&tree.get(&parent_path)?.acl, perms::DELETE)?;
        check_version(version, entry_version)?;
        if entry_children > 0 {
            return Err(ServiceError::NotEmpty);
        }

        let zxid = tree.next_zxid();
        tree.nodes.remove(path);
        let parent = tree.get_mut(&parent_path)?;
        parent.stat.cversion += 1;
        parent.stat.num_children -= 1;
        parent.stat.pzxid = zxid;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, ServiceError> {
        let tree = self.ensemble.tree()?;
        Ok(tree.nodes.get(path).map(|entry| entry.stat))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, ServiceError> {
        let tree = self.ensemble.tree()?;
        let entry = tree.get(path)?;
        self.check(&entry.acl, perms::READ)?;
        Ok(tree.children(path))
    }

    async fn add_auth(&self, scheme: &str, auth: &[u8]) -> Result<(), ServiceError> {
        if !self.ensemble.shared.available.load(Ordering::SeqCst) {
            return Err(ServiceError::ConnectionClosed);
        }
        if scheme != "digest" {
            return Err(ServiceError::AuthFailed);
        }

        let credentials = std::str::from_utf8(auth).map_err(|_| ServiceError::AuthFailed)?;
        let (username, password) = credentials
            .split_once(':')
            .ok_or(ServiceError::AuthFailed)?;

        self.identities
            .lock()
            .map_err(|_| ServiceError::System("session identities lock poisoned".to_string()))?
            .push((scheme.to_string(), digest_id(username, password)));
        Ok(())
    }
}
