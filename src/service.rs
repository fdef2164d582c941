//! The Hemmer provider contract.
//!
//! [`ProviderService`] is the trait a provider implements: typed, fallible
//! lifecycle calls. [`ProviderHandle`] is what a host drives: it dispatches
//! to a `ProviderService`, logs each call and folds every failure into
//! [`Diagnostic`]s so nothing propagates as an error.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Trait that provider implementations must implement.
///
/// State and configuration travel as JSON values shaped by the provider's
/// [`ProviderSchema`].
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return the resource and data source names.
    /// By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    /// Returns diagnostics (errors and warnings).
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    /// Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. A `null` proposed state plans its destruction.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    ///
    /// Returns `null` when the resource no longer exists, so the host can drop it.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// The outcome of a host call: a value when the call succeeded, plus any
/// diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    /// The result, absent when the call failed.
    pub value: Option<T>,
    /// Errors and warnings raised by the call.
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Response<T> {
    fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            diagnostics: Vec::new(),
        }
    }

    fn failed(err: ProviderError) -> Self {
        Self {
            value: None,
            diagnostics: error_to_diagnostics(err),
        }
    }

    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

fn error_to_diagnostics(err: ProviderError) -> Vec<Diagnostic> {
    vec![err.into()]
}

/// Host-side entry point to a provider.
///
/// Every method logs the call and converts errors into diagnostics.
pub struct ProviderHandle<P: ProviderService> {
    provider: Arc<P>,
}

impl<P: ProviderService> Clone for ProviderHandle<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: ProviderService> ProviderHandle<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Resource and data source names.
    #[instrument(skip(self), name = "host.get_metadata")]
    pub fn get_metadata(&self) -> ProviderMetadata {
        let metadata = self.provider.metadata();
        info!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata completed"
        );
        metadata
    }

    /// The full provider schema.
    #[instrument(skip(self), name = "host.get_schema")]
    pub fn get_schema(&self) -> ProviderSchema {
        let schema = self.provider.schema();
        info!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        schema
    }

    /// Validate provider configuration.
    #[instrument(skip(self, config), name = "host.validate_provider_config")]
    pub async fn validate_provider_config(&self, config: Value) -> Vec<Diagnostic> {
        debug!("ValidateProviderConfig called");
        match self.provider.validate_provider_config(config).await {
            Ok(diagnostics) => {
                log_diagnostics("ValidateProviderConfig", &diagnostics);
                diagnostics
            },
            Err(e) => {
                error!(error = %e, "ValidateProviderConfig failed");
                error_to_diagnostics(e)
            },
        }
    }

    /// Configure the provider.
    #[instrument(skip(self, config), name = "host.configure")]
    pub async fn configure(&self, config: Value) -> Vec<Diagnostic> {
        debug!("Configure called");
        match self.provider.configure(config).await {
            Ok(diagnostics) => {
                log_diagnostics("Configure", &diagnostics);
                diagnostics
            },
            Err(e) => {
                error!(error = %e, "Configure failed");
                error_to_diagnostics(e)
            },
        }
    }

    /// Stop the provider.
    #[instrument(skip(self), name = "host.stop")]
    pub async fn stop(&self) -> Vec<Diagnostic> {
        info!("Stop called");
        match self.provider.stop().await {
            Ok(()) => {
                info!("Stop completed successfully");
                vec![]
            },
            Err(e) => {
                error!(error = %e, "Stop failed");
                error_to_diagnostics(e)
            },
        }
    }

    /// Validate a resource configuration.
    #[instrument(skip(self, config), name = "host.validate_resource_config")]
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Vec<Diagnostic> {
        debug!(resource_type, "ValidateResourceConfig called");
        match self
            .provider
            .validate_resource_config(resource_type, config)
            .await
        {
            Ok(diagnostics) => {
                log_diagnostics("ValidateResourceConfig", &diagnostics);
                diagnostics
            },
            Err(e) => {
                error!(resource_type, error = %e, "ValidateResourceConfig failed");
                error_to_diagnostics(e)
            },
        }
    }

    /// Plan a resource change.
    #[instrument(skip(self, prior_state, proposed_state, config), name = "host.plan")]
    pub async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Response<PlanResult> {
        let is_create = prior_state.is_none();
        debug!(resource_type, is_create, "Plan called");

        match self
            .provider
            .plan(resource_type, prior_state, proposed_state, config)
            .await
        {
            Ok(result) => {
                info!(
                    resource_type,
                    changes = result.changes.len(),
                    requires_replace = result.requires_replace,
                    "Plan completed"
                );
                Response::ok(result)
            },
            Err(e) => {
                error!(resource_type, error = %e, "Plan failed");
                Response::failed(e)
            },
        }
    }

    /// Create a resource.
    #[instrument(skip(self, planned_state), name = "host.create")]
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Response<Value> {
        info!(resource_type, "Create called");
        match self.provider.create(resource_type, planned_state).await {
            Ok(state) => {
                info!(resource_type, "Create completed successfully");
                Response::ok(state)
            },
            Err(e) => {
                error!(resource_type, error = %e, "Create failed");
                Response::failed(e)
            },
        }
    }

    /// Refresh a resource. A `null` value means the resource is gone.
    #[instrument(skip(self, current_state), name = "host.read")]
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Response<Value> {
        debug!(resource_type, "Read called");
        match self.provider.read(resource_type, current_state).await {
            Ok(state) => {
                if state.is_null() {
                    warn!(resource_type, "Resource no longer exists, removing it from state");
                } else {
                    debug!(resource_type, "Read completed successfully");
                }
                Response::ok(state)
            },
            Err(e) => {
                error!(resource_type, error = %e, "Read failed");
                Response::failed(e)
            },
        }
    }

    /// Update a resource in place.
    #[instrument(skip(self, prior_state, planned_state), name = "host.update")]
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Response<Value> {
        info!(resource_type, "Update called");
        match self
            .provider
            .update(resource_type, prior_state, planned_state)
            .await
        {
            Ok(state) => {
                info!(resource_type, "Update completed successfully");
                Response::ok(state)
            },
            Err(e) => {
                error!(resource_type, error = %e, "Update failed");
                Response::failed(e)
            },
        }
    }

    /// Delete a resource.
    #[instrument(skip(self, current_state), name = "host.delete")]
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Vec<Diagnostic> {
        info!(resource_type, "Delete called");
        match self.provider.delete(resource_type, current_state).await {
            Ok(()) => {
                info!(resource_type, "Delete completed successfully");
                vec![]
            },
            Err(e) => {
                error!(resource_type, error = %e, "Delete failed");
                error_to_diagnostics(e)
            },
        }
    }

    /// Import an existing resource by id.
    #[instrument(skip(self), name = "host.import_resource_state")]
    pub async fn import_resource_state(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Response<Vec<ImportedResource>> {
        info!(resource_type, id, "ImportResourceState called");
        match self.provider.import_resource(resource_type, id).await {
            Ok(imported) => {
                info!(
                    resource_type,
                    id,
                    imported_count = imported.len(),
                    "ImportResourceState completed"
                );
                Response::ok(imported)
            },
            Err(e) => {
                error!(resource_type, id, error = %e, "ImportResourceState failed");
                Response::failed(e)
            },
        }
    }

    /// Validate a data source configuration.
    #[instrument(skip(self, config), name = "host.validate_data_source_config")]
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Vec<Diagnostic> {
        debug!(data_source_type, "ValidateDataSourceConfig called");
        match self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await
        {
            Ok(diagnostics) => {
                log_diagnostics("ValidateDataSourceConfig", &diagnostics);
                diagnostics
            },
            Err(e) => {
                error!(data_source_type, error = %e, "ValidateDataSourceConfig failed");
                error_to_diagnostics(e)
            },
        }
    }

    /// Read a data source.
    #[instrument(skip(self, config), name = "host.read_data_source")]
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Response<Value> {
        debug!(data_source_type, "ReadDataSource called");
        match self.provider.read_data_source(data_source_type, config).await {
            Ok(state) => {
                debug!(data_source_type, "ReadDataSource completed successfully");
                Response::ok(state)
            },
            Err(e) => {
                error!(data_source_type, error = %e, "ReadDataSource failed");
                Response::failed(e)
            },
        }
    }
}

fn log_diagnostics(call: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.iter().any(Diagnostic::is_error) {
        warn!(diagnostics = diagnostics.len(), "{} completed with errors", call);
    } else {
        info!("{} completed successfully", call);
    }
}
