//! Error types for the ZooKeeper provider.
//!
//! Errors are layered the same way the calls are:
//!
//! - [`ServiceError`]: an error code returned by the ZooKeeper ensemble itself.
//! - [`ClientError`]: a failed [`NodeClient`](crate::client::NodeClient) or
//!   [`ClientPool`](crate::pool::ClientPool) operation, carrying the operation
//!   and path that failed.
//! - [`ProviderError`]: what the provider reports back to Hemmer.

use thiserror::Error;

use crate::schema::Diagnostic;

/// An error code returned by the remote ZooKeeper service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The node being created already exists.
    #[error("node already exists")]
    NodeExists,

    /// The node (or, on create, its parent) does not exist.
    #[error("node does not exist")]
    NoNode,

    /// The node cannot be deleted because it still has children.
    #[error("node has children")]
    NotEmpty,

    /// The request was malformed (invalid path, bad sequence prefix, ...).
    #[error("invalid arguments")]
    BadArguments,

    /// A concrete expected version did not match the node's version.
    #[error("version conflict")]
    BadVersion,

    /// The connection to the ensemble is closed or was lost.
    #[error("connection closed")]
    ConnectionClosed,

    /// The session expired and must be re-established.
    #[error("session has been expired by the server")]
    SessionExpired,

    /// The session lacks the permissions required by the node's ACL.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The supplied credentials were rejected.
    #[error("client authentication failed")]
    AuthFailed,

    /// The ACL supplied with the request is invalid.
    #[error("invalid ACL specified")]
    InvalidAcl,

    /// The request did not complete in time.
    #[error("operation timeout")]
    Timeout,

    /// Any other failure reported by the client library or the server.
    #[error("system error: {0}")]
    System(String),
}

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid local input, detected before any network call.
    Configuration,
    /// The target already exists, or gained children during a delete.
    Conflict,
    /// The target (or an ancestor needed to reach it) is absent.
    NotFound,
    /// The request was refused by an ACL or by authentication.
    Unauthorized,
    /// The connection or session failed.
    Transport,
    /// Anything else reported by the service.
    Other,
}

impl From<&ServiceError> for ErrorKind {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::NodeExists | ServiceError::NotEmpty | ServiceError::BadVersion => {
                ErrorKind::Conflict
            },
            ServiceError::NoNode => ErrorKind::NotFound,
            ServiceError::NotAuthenticated | ServiceError::AuthFailed => ErrorKind::Unauthorized,
            ServiceError::ConnectionClosed
            | ServiceError::SessionExpired
            | ServiceError::Timeout => ErrorKind::Transport,
            ServiceError::BadArguments | ServiceError::InvalidAcl => ErrorKind::Configuration,
            ServiceError::System(_) => ErrorKind::Other,
        }
    }
}

/// Errors returned by the node client and the connection pool.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A non-sequential node path ends with the separator.
    #[error("non-sequential ZNode cannot have path '{0}' because it ends in '/'")]
    InvalidPath(String),

    /// A path does not start at the root.
    #[error("ZNode path '{0}' must be absolute")]
    RelativePath(String),

    /// An update targeted a node that is not there.
    #[error("failed to update ZNode '{0}': does not exist")]
    CannotUpdateNotFound(String),

    /// Only one of username and password was supplied.
    #[error("both username and password must be specified together")]
    IncompleteCredentials,

    /// The server list is empty.
    #[error("at least one ZooKeeper server must be specified")]
    MissingServers,

    /// Establishing the session (or authenticating it) failed.
    #[error("unable to connect to ZooKeeper servers '{servers}': {source}")]
    Connect {
        /// The server list the connection was attempted against.
        servers: String,
        /// The underlying service error.
        #[source]
        source: ServiceError,
    },

    /// A single remote call failed.
    #[error("failed to {op} ZNode '{path}': {source}")]
    Operation {
        /// What was being attempted, e.g. `create` or `fetch ACLs for`.
        op: &'static str,
        /// The node the call was addressed to.
        path: String,
        /// The underlying service error.
        #[source]
        source: ServiceError,
    },

    /// A recursive delete failed while removing one of the node's children.
    #[error("failed to delete child '{child}' of ZNode '{path}': {source}")]
    ChildDelete {
        /// The node whose subtree was being deleted.
        path: String,
        /// The child that could not be deleted.
        child: String,
        /// Why the child could not be deleted.
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    pub(crate) fn operation(
        op: &'static str,
        path: impl Into<String>,
        source: ServiceError,
    ) -> Self {
        Self::Operation {
            op,
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    ///
    /// Recursive-delete failures are classified by the child failure they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath(_)
            | Self::RelativePath(_)
            | Self::IncompleteCredentials
            | Self::MissingServers => ErrorKind::Configuration,
            Self::CannotUpdateNotFound(_) => ErrorKind::NotFound,
            Self::Connect { source, .. } | Self::Operation { source, .. } => source.into(),
            Self::ChildDelete { source, .. } => source.kind(),
        }
    }

    /// The service error at the root of this failure, if any.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Connect { source, .. } | Self::Operation { source, .. } => Some(source),
            Self::ChildDelete { source, .. } => source.service_error(),
            _ => None,
        }
    }

    /// Whether the failure means the node is absent.
    ///
    /// Callers reconciling state can treat this as "already deleted".
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Errors reported by the provider to Hemmer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from Hemmer.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other ZooKeeper failure.
    #[error("ZooKeeper error: {0}")]
    ZooKeeper(String),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::Unavailable(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg)
            | Self::ZooKeeper(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
        }
    }

    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        let msg = err.to_string();
        match err.kind() {
            ErrorKind::Configuration => ProviderError::InvalidRequest(msg),
            ErrorKind::NotFound => ProviderError::NotFound(msg),
            ErrorKind::Unauthorized => ProviderError::PermissionDenied(msg),
            ErrorKind::Transport => ProviderError::Unavailable(msg),
            ErrorKind::Conflict => match err.service_error() {
                Some(ServiceError::NodeExists) => ProviderError::AlreadyExists(msg),
                _ => ProviderError::FailedPrecondition(msg),
            },
            ErrorKind::Other => ProviderError::ZooKeeper(msg),
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::error(err.to_string())
    }
}
