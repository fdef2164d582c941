//! Hemmer ZooKeeper Provider
//!
//! This crate implements a Hemmer provider that manages
//! [ZooKeeper](https://zookeeper.apache.org/) ZNodes as infrastructure
//! resources.
//!
//! # Overview
//!
//! The crate is layered bottom-up:
//!
//! - **Sessions** ([`session`]): the ZooKeeper request primitives, backed by a
//!   real ensemble or by an in-memory one for tests
//! - **Node client** ([`client::NodeClient`]): parent-aware create, sequential
//!   create, read, update, recursive delete and existence checks
//! - **Connection pool** ([`pool::ClientPool`]): one client per distinct set
//!   of connection parameters
//! - **Provider** ([`ZooKeeperProvider`]): the `zookeeper_znode` and
//!   `zookeeper_sequential_znode` resources and the `zookeeper_znode` data source
//! - **Host contract** ([`ProviderService`], [`ProviderHandle`]): the calls
//!   Hemmer makes, with errors reported as diagnostics
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```no_run
//! use hemmer_provider_zookeeper::{init_logging, ProviderHandle, ZooKeeperProvider};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_logging();
//!
//!     let handle = ProviderHandle::new(ZooKeeperProvider::remote());
//!     let diagnostics = handle
//!         .configure(json!({"servers": "zk1:2181,zk2:2181", "session_timeout": 10}))
//!         .await;
//!     assert!(diagnostics.is_empty());
//!
//!     let created = handle
//!         .create("zookeeper_znode", json!({"path": "/app/config", "data": "v1"}))
//!         .await;
//!     println!("{:?}", created.value);
//! }
//! ```
//!
//! # Provider Protocol
//!
//! - **GetMetadata**: Returns resource/data source names
//! - **GetSchema**: Returns full schema for provider config, resources, and data sources
//! - **ValidateProviderConfig**: Validates provider configuration
//! - **Configure**: Connects to the ensemble
//! - **Stop**: Releases the provider's client
//! - **ValidateResourceConfig**: Validates resource configuration
//! - **Plan**: Calculates required changes
//! - **Create/Read/Update/Delete**: CRUD operations for resources
//! - **ImportResourceState**: Imports existing ZNodes
//! - **ValidateDataSourceConfig**: Validates data source configuration
//! - **ReadDataSource**: Reads an existing ZNode

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod path;
pub mod pool;
pub mod provider;
pub mod schema;
pub mod service;
pub mod session;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::NodeClient;
pub use config::ProviderConfig;
pub use error::{ClientError, ErrorKind, ProviderError, ServiceError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use node::{Acl, Stat, ZNode};
pub use pool::{ClientPool, ConnectionKey, ConnectionParams};
pub use provider::ZooKeeperProvider;
pub use schema::ProviderSchema;
pub use service::{ProviderHandle, ProviderService, Response};
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
