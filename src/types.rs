//! Plan, import and metadata types exchanged with Hemmer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Schema;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if deleting).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Plan `proposed` against `prior` (`None` when creating) using the
    /// attribute flags in `schema`.
    ///
    /// Computed attributes the proposal leaves unset keep their prior value.
    /// A changed `force_new` attribute of an existing resource requires
    /// replacement. A `null` proposal plans the resource's destruction.
    pub fn from_schema(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> Self {
        if proposed.is_null() {
            let mut removed: Vec<(&String, &Value)> = prior
                .and_then(Value::as_object)
                .map(|map| map.iter().filter(|(_, v)| !v.is_null()).collect())
                .unwrap_or_default();
            removed.sort_by_key(|(name, _)| *name);
            let changes = removed
                .into_iter()
                .map(|(name, value)| AttributeChange::removed(name.as_str(), value.clone()))
                .collect();
            return Self::with_changes(Value::Null, changes, false);
        }

        let mut planned = match proposed {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };

        let mut names: Vec<&String> = schema.block.attributes.keys().collect();
        names.sort();

        let mut changes = Vec::new();
        let mut requires_replace = false;
        for name in names {
            let attr = &schema.block.attributes[name];
            let before = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());

            let after = planned.get(name).filter(|v| !v.is_null()).cloned();
            let after = match (after, before) {
                (None, Some(before)) if attr.flags.computed => {
                    planned.insert(name.clone(), before.clone());
                    continue;
                },
                (after, _) => after,
            };

            let change = match (before, after) {
                (None, None) => continue,
                (Some(before), Some(after)) if *before == after => continue,
                (None, Some(after)) => AttributeChange::added(name.as_str(), after),
                (Some(before), None) => AttributeChange::removed(name.as_str(), before.clone()),
                (Some(before), Some(after)) => {
                    AttributeChange::modified(name.as_str(), before.clone(), after)
                },
            };
            if prior.is_some() && attr.force_new {
                requires_replace = true;
            }
            changes.push(change);
        }

        Self::with_changes(Value::Object(planned), changes, requires_replace)
    }

    /// Whether the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// The resource and data source types a provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}
