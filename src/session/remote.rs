//! Sessions with a real ZooKeeper ensemble.
//!
//! The `zookeeper` crate exposes a blocking client; every request is run on
//! tokio's blocking pool so callers can await it like any other I/O. The
//! client multiplexes concurrent requests over its single connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use zookeeper::{Permission, WatchedEvent, ZkError, ZooKeeper};

use super::{Connector, CreateMode, Session};
use crate::error::ServiceError;
use crate::node::{perms, Acl, Stat};

/// Connects to a ZooKeeper ensemble over the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZooKeeperConnector;

impl ZooKeeperConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Connector for ZooKeeperConnector {
    async fn connect(
        &self,
        servers: &[String],
        session_timeout: Duration,
    ) -> Result<Arc<dyn Session>, ServiceError> {
        let connect_string = servers.join(",");
        debug!(servers = %connect_string, ?session_timeout, "Connecting to ZooKeeper");

        let zk = run_blocking(move || {
            ZooKeeper::connect(&connect_string, session_timeout, |event: WatchedEvent| {
                debug!(path = ?event.path, "ZooKeeper session event");
            })
        })
        .await?;

        info!(servers = ?servers, "Connected to ZooKeeper");
        Ok(Arc::new(RemoteSession { zk: Arc::new(zk) }))
    }
}

/// A session backed by a [`ZooKeeper`] client.
pub struct RemoteSession {
    zk: Arc<ZooKeeper>,
}

impl RemoteSession {
    async fn call<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&ZooKeeper) -> Result<T, ZkError> + Send + 'static,
    {
        let zk = Arc::clone(&self.zk);
        run_blocking(move || f(&zk)).await
    }
}

#[async_trait::async_trait]
impl Session for RemoteSession {
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<String, ServiceError> {
        let path = path.to_string();
        let data = data.to_vec();
        let acl = to_zk_acl(acl);
        let mode = match mode {
            CreateMode::Persistent => zookeeper::CreateMode::Persistent,
            CreateMode::PersistentSequential => zookeeper::CreateMode::PersistentSequential,
        };
        self.call(move |zk| zk.create(&path, data, acl, mode)).await
    }

    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), ServiceError> {
        let path = path.to_string();
        let (data, stat) = self.call(move |zk| zk.get_data(&path, false)).await?;
        Ok((data, from_zk_stat(&stat)))
    }

    async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat), ServiceError> {
        let path = path.to_string();
        let (acl, stat) = self.call(move |zk| zk.get_acl(&path)).await?;
        Ok((from_zk_acl(&acl), from_zk_stat(&stat)))
    }

    async fn set_data(
        &self,
        path: &str,
        data: &[u8],
        version: Option<i32>,
    ) -> Result<Stat, ServiceError> {
        let path = path.to_string();
        let data = data.to_vec();
        let stat = self
            .call(move |zk| zk.set_data(&path, data, version))
            .await?;
        Ok(from_zk_stat(&stat))
    }

    async fn set_acl(
        &self,
        path: &str,
        acl: &[Acl],
        version: Option<i32>,
    ) -> Result<Stat, ServiceError> {
        let path = path.to_string();
        let acl = to_zk_acl(acl);
        let stat = self.call(move |zk| zk.set_acl(&path, acl, version)).await?;
        Ok(from_zk_stat(&stat))
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), ServiceError> {
        let path = path.to_string();
        self.call(move |zk| zk.delete(&path, version)).await
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, ServiceError> {
        let path = path.to_string();
        let stat = self.call(move |zk| zk.exists(&path, false)).await?;
        Ok(stat.as_ref().map(from_zk_stat))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, ServiceError> {
        let path = path.to_string();
        self.call(move |zk| zk.get_children(&path, false)).await
    }

    async fn add_auth(&self, scheme: &str, auth: &[u8]) -> Result<(), ServiceError> {
        let scheme = scheme.to_string();
        let auth = auth.to_vec();
        self.call(move |zk| zk.add_auth(scheme, auth)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ZkError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::System(format!("ZooKeeper request task failed: {}", e)))?
        .map_err(from_zk_error)
}

fn from_zk_error(err: ZkError) -> ServiceError {
    match err {
        ZkError::NodeExists => ServiceError::NodeExists,
        ZkError::NoNode => ServiceError::NoNode,
        ZkError::NotEmpty => ServiceError::NotEmpty,
        ZkError::BadArguments => ServiceError::BadArguments,
        ZkError::BadVersion => ServiceError::BadVersion,
        ZkError::ConnectionLoss => ServiceError::ConnectionClosed,
        ZkError::SessionExpired => ServiceError::SessionExpired,
        ZkError::NoAuth => ServiceError::NotAuthenticated,
        ZkError::AuthFailed => ServiceError::AuthFailed,
        ZkError::InvalidACL => ServiceError::InvalidAcl,
        ZkError::OperationTimeout => ServiceError::Timeout,
        other => ServiceError::System(format!("{:?}", other)),
    }
}

const PERMISSION_BITS: [(i32, Permission); 5] = [
    (perms::READ, Permission::READ),
    (perms::WRITE, Permission::WRITE),
    (perms::CREATE, Permission::CREATE),
    (perms::DELETE, Permission::DELETE),
    (perms::ADMIN, Permission::ADMIN),
];

fn to_zk_acl(acl: &[Acl]) -> Vec<zookeeper::Acl> {
    acl.iter()
        .map(|entry| {
            let permission = PERMISSION_BITS
                .iter()
                .filter(|(bit, _)| entry.permissions & bit != 0)
                .fold(Permission::NONE, |acc, (_, flag)| acc | *flag);
            zookeeper::Acl::new(permission, &entry.scheme, &entry.id)
        })
        .collect()
}

fn from_zk_acl(acl: &[zookeeper::Acl]) -> Vec<Acl> {
    acl.iter()
        .map(|entry| {
            let permissions = PERMISSION_BITS
                .iter()
                .filter(|(_, flag)| entry.perms.can(*flag))
                .fold(0, |acc, (bit, _)| acc | bit);
            Acl::new(entry.scheme.clone(), entry.id.clone(), permissions)
        })
        .collect()
}

fn from_zk_stat(stat: &zookeeper::Stat) -> Stat {
    Stat {
        czxid: stat.czxid,
        mzxid: stat.mzxid,
        pzxid: stat.pzxid,
        ctime: stat.ctime,
        mtime: stat.mtime,
        version: stat.version,
        cversion: stat.cversion,
        aversion: stat.aversion,
        ephemeral_owner: stat.ephemeral_owner,
        data_length: stat.data_length,
        num_children: stat.num_children,
    }
}
