//! ZNode value types.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// ACL permission bits, as defined by ZooKeeper.
pub mod perms {
    /// Read the node's data and list its children.
    pub const READ: i32 = 1;
    /// Set the node's data.
    pub const WRITE: i32 = 1 << 1;
    /// Create children.
    pub const CREATE: i32 = 1 << 2;
    /// Delete children.
    pub const DELETE: i32 = 1 << 3;
    /// Set the node's ACL.
    pub const ADMIN: i32 = 1 << 4;
    /// All of the above.
    pub const ALL: i32 = READ | WRITE | CREATE | DELETE | ADMIN;
}

/// A single access control entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acl {
    /// The scheme, such as `world`, `digest`, `ip`, `x509`.
    pub scheme: String,
    /// The identity within the scheme, e.g. `anyone` or `user:hash`.
    pub id: String,
    /// Bitmask of [`perms`].
    pub permissions: i32,
}

impl Acl {
    /// Create an ACL entry.
    pub fn new(scheme: impl Into<String>, id: impl Into<String>, permissions: i32) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
            permissions,
        }
    }

    /// The `world:anyone` ACL with the given permissions.
    pub fn world(permissions: i32) -> Vec<Acl> {
        vec![Acl::new("world", "anyone", permissions)]
    }

    /// The default ACL used when none is given: anyone may do anything.
    pub fn world_all() -> Vec<Acl> {
        Self::world(perms::ALL)
    }

    /// A `digest` ACL granting `permissions` to `username` authenticated with `password`.
    pub fn digest(permissions: i32, username: &str, password: &str) -> Vec<Acl> {
        vec![Acl::new("digest", digest_id(username, password), permissions)]
    }

    /// Whether this entry grants every bit in `wanted`.
    pub fn allows(&self, wanted: i32) -> bool {
        self.permissions & wanted == wanted
    }
}

/// The identity ZooKeeper derives for digest credentials:
/// `username:base64(sha1("username:password"))`.
pub fn digest_id(username: &str, password: &str) -> String {
    let hash = Sha1::digest(format!("{}:{}", username, password).as_bytes());
    format!("{}:{}", username, BASE64_STANDARD.encode(hash))
}

/// Node metadata maintained by ZooKeeper.
///
/// See the [ZooKeeper Stat Structure](https://zookeeper.apache.org/doc/current/zookeeperProgrammers.html#sc_zkStatStructure).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// The zxid of the change that caused this node to be created.
    pub czxid: i64,
    /// The zxid of the change that last modified this node.
    pub mzxid: i64,
    /// The zxid of the change that last modified children of this node.
    pub pzxid: i64,
    /// Milliseconds from epoch when this node was created.
    pub ctime: i64,
    /// Milliseconds from epoch when this node was last modified.
    pub mtime: i64,
    /// The number of changes to the data of this node.
    pub version: i32,
    /// The number of changes to the children of this node.
    pub cversion: i32,
    /// The number of changes to the ACL of this node.
    pub aversion: i32,
    /// Session id of the owner if this is an ephemeral node, otherwise zero.
    pub ephemeral_owner: i64,
    /// The length of the data field of this node.
    pub data_length: i32,
    /// The number of children of this node.
    pub num_children: i32,
}

/// A ZooKeeper node as read back from the ensemble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZNode {
    /// Absolute path, the node's identity.
    pub path: String,
    /// The node's payload.
    pub data: Vec<u8>,
    /// Server-maintained metadata.
    pub stat: Stat,
    /// Access control list.
    pub acl: Vec<Acl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perms_all() {
        assert_eq!(perms::ALL, 31);
    }

    #[test]
    fn test_world_all() {
        let acl = Acl::world_all();
        assert_eq!(acl, vec![Acl::new("world", "anyone", 31)]);
        assert!(acl[0].allows(perms::READ | perms::ADMIN));
    }

    #[test]
    fn test_allows_requires_every_bit() {
        let acl = Acl::new("world", "anyone", perms::READ);
        assert!(acl.allows(perms::READ));
        assert!(!acl.allows(perms::READ | perms::WRITE));
    }

    #[test]
    fn test_digest_id() {
        // Matches the identity produced by ZooKeeper's DigestAuthenticationProvider.
        assert_eq!(
            digest_id("user", "password"),
            "user:tpUq/4Pn5A64fVZyQ0gOJ8ZWqkY="
        );
        let acl = Acl::digest(perms::ALL, "user", "password");
        assert_eq!(acl[0].scheme, "digest");
        assert!(acl[0].id.starts_with("user:"));
    }
}
