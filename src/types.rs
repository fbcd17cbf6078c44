//! Request and response types of [`ProviderService`](crate::provider::ProviderService).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::Diagnostic;

/// One top-level attribute whose planned value differs from state.
///
/// `before` is `None` for attributes the prior state lacks or holds as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub path: String,
    /// Value in the prior state.
    pub before: Option<Value>,
    /// Planned value.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// A value replacing another.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

/// Planned state for the host to apply, with the diff that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State handed back to create or update. Null when destroying.
    pub planned_state: Value,
    /// Sorted by path.
    pub changes: Vec<AttributeChange>,
    /// Set when `replace_paths` is non-empty.
    pub requires_replace: bool,
    /// Force-new attributes among `changes`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replace_paths: Vec<String>,
}

impl PlanResult {
    /// Nothing to apply; `state` is carried through unchanged.
    pub fn no_change(state: Value) -> Self {
        Self::with_changes(state, Vec::new(), Vec::new())
    }

    /// A plan that replaces the resource whenever `replace_paths` names anything.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        replace_paths: Vec<String>,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace: !replace_paths.is_empty(),
            replace_paths,
        }
    }
}

/// Top-level attributes of `planned` that differ from `prior`.
///
/// Without a prior state every non-null planned attribute is an addition.
pub fn attribute_changes(prior: Option<&Value>, planned: &Value) -> Vec<AttributeChange> {
    let Some(planned) = planned.as_object() else {
        return Vec::new();
    };
    let mut changes: Vec<AttributeChange> = planned
        .iter()
        .filter_map(|(key, after)| {
            let before = prior.and_then(|p| p.get(key)).filter(|v| !v.is_null());
            if before == Some(after) || (before.is_none() && after.is_null()) {
                return None;
            }
            Some(AttributeChange {
                path: key.clone(),
                before: before.cloned(),
                after: Some(after.clone()),
            })
        })
        .collect();
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// Outcome of create, read and update.
///
/// A `None` state tells the host to drop the resource from state. An error
/// diagnostic next to a `Some` state means the operation failed after the
/// remote entity came into existence; the host records the partial state so
/// that the entity is not orphaned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceResponse {
    /// New state, or `None` to remove the resource from state.
    pub state: Option<Value>,
    /// Warnings and errors.
    pub diagnostics: Vec<Diagnostic>,
}

impl ResourceResponse {
    /// A successful operation.
    pub fn ok(state: Value) -> Self {
        Self {
            state: Some(state),
            diagnostics: Vec::new(),
        }
    }

    /// The remote entity is gone; remove it from state with a warning.
    pub fn removed(warning: Diagnostic) -> Self {
        Self {
            state: None,
            diagnostics: vec![warning],
        }
    }

    /// The operation failed after producing `state`.
    pub fn partial(state: Value, err: &ProviderError) -> Self {
        Self {
            state: Some(state),
            diagnostics: vec![err.to_diagnostic()],
        }
    }

    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(Diagnostic::is_error)
    }
}

/// State recovered by `import_resource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type the state belongs to.
    pub resource_type: String,
    /// Refreshed state of the imported entity.
    pub state: Value,
}

impl ImportedResource {
    /// Pair `state` with its type.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Type names the provider dispatches on, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
}
