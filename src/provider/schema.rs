//! Schemas of the provider block, its resources and its data source.

use serde_json::json;

use crate::pool::DEFAULT_SESSION_TIMEOUT_SECS;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

const ZNODE_LINK: &str =
    "[ZooKeeper ZNode](https://zookeeper.apache.org/doc/current/zookeeperProgrammers.html#sc_zkDataModel_znodes)";

pub(crate) fn provider_config() -> Schema {
    Schema::v0()
        .with_attribute(
            "servers",
            Attribute::optional_string().with_description(
                "A comma separated list of 'host:port' pairs, pointing at ZooKeeper Server(s). \
                 Can be set via `ZOOKEEPER_SERVERS` environment variable.",
            ),
        )
        .with_attribute(
            "session_timeout",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_SESSION_TIMEOUT_SECS))
                .with_description(
                    "How many seconds a session is considered valid after losing connectivity. \
                     Can be set via `ZOOKEEPER_SESSION` environment variable.",
                ),
        )
        .with_attribute(
            "username",
            Attribute::optional_string().sensitive().with_description(
                "Username for digest authentication. \
                 Can be set via `ZOOKEEPER_USERNAME` environment variable.",
            ),
        )
        .with_attribute(
            "password",
            Attribute::optional_string().sensitive().with_description(
                "Password for digest authentication. \
                 Can be set via `ZOOKEEPER_PASSWORD` environment variable.",
            ),
        )
}

fn data() -> Attribute {
    Attribute::optional_computed_string()
        .with_conflicts_with(&["data_base64"])
        .with_description(
            "Content to store in the ZNode, as a UTF-8 string. Mutually exclusive with `data_base64`.",
        )
}

fn data_base64() -> Attribute {
    Attribute::optional_computed_string()
        .with_conflicts_with(&["data"])
        .with_description(
            "Content to store in the ZNode, as Base64 encoded bytes. Mutually exclusive with `data`.",
        )
}

fn acl_type() -> AttributeType {
    AttributeType::list(AttributeType::object([
        ("scheme", AttributeType::String),
        ("id", AttributeType::String),
        ("permissions", AttributeType::Int64),
    ]))
}

fn acl() -> Attribute {
    Attribute::new(acl_type(), AttributeFlags::optional_computed()).with_description(
        "List of ACL entries for the ZNode, each with a `scheme` ('world', 'digest', 'ip', 'x509'), \
         an `id` (e.g. user:hash for 'digest') and `permissions` as an integer bitmask. \
         Defaults to `world:anyone` with all permissions.",
    )
}

fn stat() -> Attribute {
    let fields = [
        "czxid",
        "mzxid",
        "pzxid",
        "ctime",
        "mtime",
        "version",
        "cversion",
        "aversion",
        "ephemeral_owner",
        "data_length",
        "num_children",
    ];
    Attribute::new(
        AttributeType::object(fields.into_iter().map(|name| (name, AttributeType::Int64))),
        AttributeFlags::computed(),
    )
    .with_description(
        "[ZooKeeper Stat Structure](https://zookeeper.apache.org/doc/current/zookeeperProgrammers.html#sc_zkStatStructure) of the ZNode.",
    )
}

pub(crate) fn znode() -> Schema {
    Schema::v0()
        .with_description(format!(
            "Manages the lifecycle of a {}. This resource manages **Persistent ZNodes**. \
             The data can be provided either as UTF-8 string, or as Base64 encoded bytes. \
             The ability to create ZNodes is determined by ZooKeeper ACL.",
            ZNODE_LINK
        ))
        .with_attribute(
            "path",
            Attribute::required_string()
                .with_force_new()
                .with_description("Absolute path to the ZNode to create."),
        )
        .with_attribute("data", data())
        .with_attribute("data_base64", data_base64())
        .with_attribute("acl", acl())
        .with_attribute("stat", stat())
}

pub(crate) fn sequential_znode() -> Schema {
    Schema::v0()
        .with_description(format!(
            "Manages the lifecycle of a {}. This resource manages **Persistent Sequential ZNodes**. \
             The data can be provided either as UTF-8 string, or as Base64 encoded bytes. \
             The ability to create ZNodes is determined by ZooKeeper ACL.",
            ZNODE_LINK
        ))
        .with_attribute(
            "path_prefix",
            Attribute::required_string().with_force_new().with_description(
                "Absolute path to the Sequential ZNode to create. \
                 ZooKeeper will append a monotonically increasing counter to the end of path. \
                 This counter is unique to the parent znode, and its format is `%010d` \
                 (10 digits with `0` padding).",
            ),
        )
        .with_attribute(
            "path",
            Attribute::computed_string().with_description(
                "Absolute path to the Sequential ZNode, once it is created. \
                 The prefix of this will match `path_prefix`.",
            ),
        )
        .with_attribute("data", data())
        .with_attribute("data_base64", data_base64())
        .with_attribute("acl", acl())
        .with_attribute("stat", stat())
}

pub(crate) fn znode_data_source() -> Schema {
    Schema::v0()
        .with_description(format!("Reads the content of a {}.", ZNODE_LINK))
        .with_attribute(
            "path",
            Attribute::required_string().with_description("Absolute path to the ZNode to read."),
        )
        .with_attribute(
            "data",
            Attribute::computed_string()
                .with_description("Content of the ZNode, as a UTF-8 string."),
        )
        .with_attribute(
            "data_base64",
            Attribute::computed_string()
                .with_description("Content of the ZNode, as Base64 encoded bytes."),
        )
        .with_attribute(
            "acl",
            Attribute::new(acl_type(), AttributeFlags::computed())
                .with_description("List of ACL entries of the ZNode."),
        )
        .with_attribute("stat", stat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    #[test]
    fn test_znode_schema() {
        let schema = znode();
        assert!(schema.attribute("path").unwrap().force_new);
        assert!(schema.attribute("stat").unwrap().flags.is_computed_only());
        assert_eq!(
            schema.attribute("data").unwrap().conflicts_with,
            vec!["data_base64".to_string()]
        );
    }

    #[test]
    fn test_data_conflicts_with_data_base64() {
        let diagnostics = validate(
            &znode(),
            &json!({"path": "/a", "data": "x", "data_base64": "eA=="}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
    }

    #[test]
    fn test_acl_entries_need_every_field() {
        let valid = json!({
            "path": "/a",
            "acl": [{"scheme": "world", "id": "anyone", "permissions": 31}]
        });
        assert!(validate(&znode(), &valid).is_empty());

        let invalid = json!({"path": "/a", "acl": [{"scheme": "world", "permissions": 31}]});
        assert!(!validate(&znode(), &invalid).is_empty());
    }

    #[test]
    fn test_sequential_schema() {
        let schema = sequential_znode();
        assert!(schema.attribute("path_prefix").unwrap().force_new);
        assert!(schema.attribute("path").unwrap().flags.is_computed_only());
        assert!(validate(&schema, &json!({"data": "x"}))
            .iter()
            .any(|d| d.attribute.as_deref() == Some("path_prefix")));
    }

    #[test]
    fn test_provider_config_schema() {
        let schema = provider_config();
        assert!(schema.attribute("password").unwrap().flags.sensitive);
        assert_eq!(
            schema.attribute("session_timeout").unwrap().default,
            Some(json!(30))
        );
        assert!(!validate(&schema, &json!({"servers": "a:2181", "timeout": 5})).is_empty());
    }
}
