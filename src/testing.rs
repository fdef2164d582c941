//! Helpers for driving a provider in tests.
//!
//! [`ProviderTester`] calls a [`ProviderService`] the way Hemmer would.
//! Configuration diagnostics with error severity come back as a
//! [`TestError`], and the `lifecycle_*` helpers chain plan, apply and
//! read-back the same way an apply run does.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_zookeeper::testing::{assert_plan_replaces, ProviderTester};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let (tester, _ensemble) = ProviderTester::in_memory();
//! tester.configure(json!({"servers": "localhost:2181"})).await.unwrap();
//!
//! let state = tester
//!     .lifecycle_create("zookeeper_znode", json!({"path": "/app", "data": "v1"}))
//!     .await
//!     .unwrap();
//!
//! let plan = tester
//!     .plan_update("zookeeper_znode", state, json!({"path": "/other"}))
//!     .await
//!     .unwrap();
//! assert_plan_replaces(&plan);
//! # });
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::ZooKeeperProvider;
use crate::schema::{Diagnostic, DiagnosticSeverity};
use crate::service::ProviderService;
use crate::session::memory::{InMemoryConnector, InMemoryEnsemble};
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider through host calls.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Configure the provider, failing on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        errors_only(diagnostics)
    }

    /// Plan a resource with no prior state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed.clone(), proposed)
            .await
    }

    /// Plan a change from `prior` to `proposed`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior: Value,
        proposed: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), proposed.clone(), proposed)
            .await
    }

    /// Plan the destruction of a resource.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), Value::Null, Value::Null)
            .await
    }

    /// Create a resource from a planned state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned).await
    }

    /// Refresh a resource. `Value::Null` means it no longer exists.
    pub async fn read(&self, resource_type: &str, current: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current).await
    }

    /// Update a resource in place.
    pub async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior, planned).await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current).await
    }

    /// Import a resource by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Plan, create, then read back. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update, then read back. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior: Value,
        proposed: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior.clone(), proposed)
            .await?;
        let updated = self
            .update(resource_type, prior, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Plan the destruction, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current.clone()).await?;
        self.delete(resource_type, current).await
    }
}

impl ProviderTester<ZooKeeperProvider<InMemoryConnector>> {
    /// A tester around a provider backed by a fresh in-memory ensemble.
    ///
    /// Environment fallbacks are disabled so tests see only the
    /// configuration they pass in.
    pub fn in_memory() -> (Self, InMemoryEnsemble) {
        let ensemble = InMemoryEnsemble::new();
        let provider = ZooKeeperProvider::new(ensemble.connector()).with_env(|_| None);
        (Self::new(provider), ensemble)
    }
}

/// A failed tester call.
#[derive(Debug)]
pub enum TestError {
    /// The call returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The call returned an error.
    Provider(ProviderError),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                write!(f, "{} error diagnostic(s)", diags.len())?;
                for diag in diags {
                    write!(f, "; {}", diag.summary)?;
                    if let Some(attr) = &diag.attribute {
                        write!(f, " [{}]", attr)?;
                    }
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn is_error(diagnostic: &Diagnostic) -> bool {
    matches!(diagnostic.severity, DiagnosticSeverity::Error)
}

fn errors_only(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn error_summaries(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics
        .iter()
        .filter(|d| is_error(d))
        .map(|d| d.summary.as_str())
        .collect()
}

/// Panics unless the plan replaces the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "plan updates in place, expected a replacement"
    );
}

/// Panics if the plan replaces the resource.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "plan requires replacement, expected an in-place update"
    );
}

/// Panics unless the plan changes `attribute`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, attribute: &str) {
    let changed: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
    assert!(
        changed.contains(&attribute),
        "plan does not change '{}'; changed: {:?}",
        attribute,
        changed
    );
}

/// Panics if any diagnostic is an error.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors = error_summaries(diagnostics);
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

/// Panics unless some diagnostic is an error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(is_error),
        "expected an error diagnostic, got {:?}",
        diagnostics
    );
}

/// Panics unless an error diagnostic's summary contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let errors = error_summaries(diagnostics);
    assert!(
        errors.iter().any(|summary| summary.contains(substring)),
        "no error mentions '{}'; errors: {:?}",
        substring,
        errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ZNODE: &str = "zookeeper_znode";

    #[tokio::test]
    async fn test_configure_surfaces_diagnostics() {
        let (tester, _) = ProviderTester::in_memory();
        let err = tester
            .configure(json!({"servers": "localhost:2181", "timeout": 5}))
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diags) => assert_error_contains(&diags, "Unsupported attribute"),
            other => panic!("unexpected error: {}", other),
        }

        let err = tester.configure(json!({})).await.unwrap_err();
        assert!(matches!(err, TestError::Provider(ProviderError::Configuration(_))));
        assert!(tester.provider().pool().is_empty().await);
    }

    #[tokio::test]
    async fn test_lifecycle_helpers_round_trip() {
        let (tester, ensemble) = ProviderTester::in_memory();
        tester
            .configure(json!({"servers": "localhost:2181"}))
            .await
            .unwrap();

        let created = tester
            .lifecycle_create(ZNODE, json!({"path": "/crud/node", "data": "initial"}))
            .await
            .unwrap();
        let updated = tester
            .lifecycle_update(ZNODE, created, json!({"path": "/crud/node", "data": "updated"}))
            .await
            .unwrap();
        assert_eq!(updated["stat"]["version"], 1);

        tester.lifecycle_delete(ZNODE, updated).await.unwrap();
        assert_eq!(ensemble.paths(), vec!["/", "/crud"]);
    }

    #[test]
    fn test_warnings_are_not_errors() {
        let diagnostics = vec![Diagnostic::warning("session timeout is low")];
        assert_no_errors(&diagnostics);
        assert!(errors_only(diagnostics).is_ok());
    }

    #[test]
    #[should_panic(expected = "unexpected errors")]
    fn test_assert_no_errors_panics() {
        assert_no_errors(&[Diagnostic::error("connection refused")]);
    }

    #[test]
    fn test_display_lists_each_error() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing required attribute").with_attribute("path"),
            Diagnostic::error("Invalid ACL").with_detail("permissions out of range"),
        ]);

        let display = err.to_string();
        assert!(display.starts_with("2 error diagnostic(s)"));
        assert!(display.contains("Missing required attribute [path]"));
        assert!(display.contains("Invalid ACL: permissions out of range"));
    }
}
