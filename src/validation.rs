//! Configuration validation against a [`Schema`].
//!
//! Checks presence and type of every attribute, that nested blocks are
//! objects, and each attribute's [`ValueValidator`]s. Values the host has
//! not resolved yet (the unknown sentinel) pass every check; they are
//! validated once they become known.
//!
//! # Example
//!
//! ```
//! use linode_database_provider::schema::{Attribute, AttributeType, Schema, ValueValidator};
//! use linode_database_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .with_attribute("label", Attribute::required(AttributeType::String))
//!     .with_attribute(
//!         "cluster_size",
//!         Attribute::optional(AttributeType::Int64).with_validator(ValueValidator::IntAtLeast(1)),
//!     );
//!
//! assert!(validate(&schema, &json!({"label": "db", "cluster_size": 3})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"label": "db", "cluster_size": 0}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("cluster_size"));
//! ```

use regex::Regex;
use serde_json::Value;

use crate::attr::is_unknown_value;
use crate::schema::{Attribute, AttributeType, Block, Diagnostic, Schema, Usage, ValueValidator};

/// Validate a configuration object against a schema.
///
/// An empty result means the value is valid. Computed-only attributes are
/// not checked; for any other attribute a known value must have the
/// declared type, and only then are its validators run.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut walk = Walk::default();
    walk.block(&schema.block, value, "");
    walk.diagnostics
}

/// [`validate`], returning `Err` with the diagnostics when any were found.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether `value` passes [`validate`].
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Walk {
    diagnostics: Vec<Diagnostic>,
}

impl Walk {
    fn error(&mut self, path: &str, summary: String, detail: String) {
        let diagnostic = Diagnostic::error(summary).with_detail(detail);
        self.diagnostics.push(if path.is_empty() {
            diagnostic
        } else {
            diagnostic.with_attribute(path)
        });
    }

    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        if is_unknown_value(value) || value.is_null() {
            return;
        }
        let Some(obj) = value.as_object() else {
            let what = if path.is_empty() { "configuration" } else { path };
            self.error(
                path,
                format!("Expected object for {what}"),
                format!("Got {}", kind_of(value)),
            );
            return;
        };

        for (name, attr) in &block.attributes {
            self.attribute(attr, obj.get(name), &child(path, name));
        }
        for (name, nested) in &block.blocks {
            if let Some(v) = obj.get(name) {
                self.block(nested, v, &child(path, name));
            }
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        if attr.usage == Usage::Computed {
            return;
        }
        let value = match value {
            None | Some(Value::Null) => {
                if attr.is_required() {
                    self.error(
                        path,
                        format!("Missing required attribute '{path}'"),
                        "This attribute is required and must be provided".to_string(),
                    );
                }
                return;
            }
            Some(v) if is_unknown_value(v) => return,
            Some(v) => v,
        };

        if !self.value_type(&attr.attr_type, value, path) {
            return;
        }
        for validator in &attr.validators {
            if let Some(detail) = violation(validator, value) {
                self.error(path, format!("Invalid value for attribute '{path}'"), detail);
            }
        }
    }

    /// Check `value` against `ty`, reporting every mismatch. Returns whether
    /// it matched.
    fn value_type(&mut self, ty: &AttributeType, value: &Value, path: &str) -> bool {
        if is_unknown_value(value) {
            return true;
        }
        let before = self.diagnostics.len();
        let expected = match ty {
            AttributeType::String if value.is_string() => None,
            AttributeType::Int64 if is_int64(value) => None,
            AttributeType::Float64 if value.is_number() => None,
            AttributeType::Bool if value.is_boolean() => None,
            AttributeType::List(element) | AttributeType::Set(element) => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.value_type(element, item, &format!("{path}.{i}"));
                    }
                    None
                }
                None if matches!(ty, AttributeType::Set(_)) => Some("set"),
                None => Some("list"),
            },
            AttributeType::Map(element) => match value.as_object() {
                Some(entries) => {
                    for (key, item) in entries {
                        self.value_type(element, item, &child(path, key));
                    }
                    None
                }
                None => Some("map"),
            },
            AttributeType::Object(fields) => match value.as_object() {
                Some(obj) => {
                    for (name, field_type) in fields {
                        if let Some(item) = obj.get(name) {
                            self.value_type(field_type, item, &child(path, name));
                        }
                    }
                    None
                }
                None => Some("object"),
            },
            AttributeType::String => Some("string"),
            AttributeType::Int64 => Some("int64"),
            AttributeType::Float64 => Some("float64"),
            AttributeType::Bool => Some("bool"),
        };
        if let Some(expected) = expected {
            self.error(
                path,
                format!("Invalid type for attribute '{path}'"),
                format!("Expected {expected}, got {}", kind_of(value)),
            );
        }
        self.diagnostics.len() == before
    }
}

/// Describe how `value` violates `validator`, if it does.
fn violation(validator: &ValueValidator, value: &Value) -> Option<String> {
    match validator {
        ValueValidator::IntBetween(min, max) => {
            let n = value.as_f64()?;
            (n < *min as f64 || n > *max as f64)
                .then(|| format!("must be between {min} and {max}, got {value}"))
        }
        ValueValidator::FloatBetween(min, max) => {
            let n = value.as_f64()?;
            (n < *min || n > *max).then(|| format!("must be between {min} and {max}, got {value}"))
        }
        ValueValidator::IntAtLeast(min) => {
            let n = value.as_f64()?;
            (n < *min as f64).then(|| format!("must be at least {min}, got {value}"))
        }
        ValueValidator::OneOf(allowed) => {
            let s = value.as_str()?;
            (!allowed.iter().any(|a| a == s))
                .then(|| format!("must be one of [{}], got {s:?}", allowed.join(", ")))
        }
        ValueValidator::LengthBetween(min, max) => {
            let len = value.as_str()?.chars().count();
            (len < *min || len > *max)
                .then(|| format!("length must be between {min} and {max}, got {len}"))
        }
        ValueValidator::Regex(pattern) => {
            let s = value.as_str()?;
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => None,
                Ok(_) => Some(format!("must match {pattern}, got {s:?}")),
                Err(err) => Some(format!("invalid pattern {pattern}: {err}")),
            }
        }
    }
}

fn child(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integral numbers, including floats such as `3306.0` that the host may
/// produce for whole numbers.
fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::UNKNOWN_VALUE;
    use serde_json::json;

    fn database_schema() -> Schema {
        Schema::new()
            .with_attribute("id", Attribute::computed(AttributeType::String))
            .with_attribute("label", Attribute::required(AttributeType::String))
            .with_attribute(
                "cluster_size",
                Attribute::optional_computed(AttributeType::Int64)
                    .with_validator(ValueValidator::IntAtLeast(1)),
            )
            .with_attribute(
                "allow_list",
                Attribute::optional_computed(AttributeType::set(AttributeType::String)),
            )
            .with_block(
                "updates",
                Block::new()
                    .with_attribute(
                        "hour_of_day",
                        Attribute::required(AttributeType::Int64)
                            .with_validator(ValueValidator::IntBetween(0, 23)),
                    )
                    .with_attribute(
                        "frequency",
                        Attribute::optional(AttributeType::String)
                            .with_validator(ValueValidator::OneOf(vec!["weekly".to_string()])),
                    ),
            )
    }

    fn attributes(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect()
    }

    #[test]
    fn test_valid_configuration() {
        let config = json!({
            "label": "db",
            "cluster_size": 3,
            "allow_list": ["10.0.0.1/32"],
            "updates": {"hour_of_day": 2, "frequency": "weekly"}
        });
        assert!(validate(&database_schema(), &config).is_empty());
        assert!(is_valid(&database_schema(), &json!({"label": "db"})));
    }

    #[test]
    fn test_missing_required_attribute() {
        let diagnostics = validate(&database_schema(), &json!({"label": null}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("label"));
        assert!(diagnostics[0].summary.contains("Missing required attribute"));
        assert_eq!(
            validate_result(&database_schema(), &json!({})).unwrap_err().len(),
            1
        );
    }

    #[test]
    fn test_computed_attributes_are_ignored() {
        let config = json!({"label": "db", "id": 123});
        assert!(validate(&database_schema(), &config).is_empty());
    }

    #[test]
    fn test_unknown_values_are_skipped() {
        let config = json!({
            "label": UNKNOWN_VALUE,
            "cluster_size": UNKNOWN_VALUE,
            "allow_list": ["10.0.0.1/32", UNKNOWN_VALUE],
            "updates": UNKNOWN_VALUE
        });
        assert!(validate(&database_schema(), &config).is_empty());
    }

    #[test]
    fn test_int64_accepts_whole_floats() {
        let schema = Schema::new().with_attribute("port", Attribute::required(AttributeType::Int64));
        assert!(validate(&schema, &json!({"port": 3306})).is_empty());
        assert!(validate(&schema, &json!({"port": 3306.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"port": 3306.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"port": "3306"})).len(), 1);
    }

    #[test]
    fn test_validators_report_attribute_paths() {
        let config = json!({
            "label": "db",
            "cluster_size": 0,
            "updates": {"hour_of_day": 24, "frequency": "daily"}
        });
        let diagnostics = validate(&database_schema(), &config);
        assert_eq!(
            attributes(&diagnostics),
            vec!["cluster_size", "updates.frequency", "updates.hour_of_day"]
        );
        assert!(diagnostics
            .iter()
            .any(|d| d.detail.as_deref() == Some("must be between 0 and 23, got 24")));
    }

    #[test]
    fn test_type_error_suppresses_validators() {
        let config = json!({"label": "db", "updates": {"hour_of_day": "noon"}});
        let diagnostics = validate(&database_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected int64, got string"));
    }

    #[test]
    fn test_set_elements_are_checked() {
        let diagnostics = validate(
            &database_schema(),
            &json!({"label": "db", "allow_list": ["10.0.0.1/32", 7]}),
        );
        assert_eq!(attributes(&diagnostics), vec!["allow_list.1"]);

        let diagnostics = validate(&database_schema(), &json!({"label": "db", "allow_list": "0.0.0.0/0"}));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected set, got string"));
    }

    #[test]
    fn test_map_and_object_types() {
        let schema = Schema::new()
            .with_attribute(
                "members",
                Attribute::optional(AttributeType::map(AttributeType::String)),
            )
            .with_attribute(
                "window",
                Attribute::optional(AttributeType::object([("duration", AttributeType::Int64)])),
            );

        assert!(validate(&schema, &json!({"members": {"10.0.0.1": "primary"}})).is_empty());
        let diagnostics = validate(
            &schema,
            &json!({"members": {"10.0.0.1": 1}, "window": {"duration": "3h"}}),
        );
        assert_eq!(attributes(&diagnostics), vec!["members.10.0.0.1", "window.duration"]);
    }

    #[test]
    fn test_nested_block_must_be_object() {
        let config = json!({"label": "db", "updates": [{"hour_of_day": 1}]});
        let diagnostics = validate(&database_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("updates"));
        assert_eq!(diagnostics[0].summary, "Expected object for updates");

        let diagnostics = validate(&database_schema(), &json!({"label": "db", "updates": {}}));
        assert_eq!(attributes(&diagnostics), vec!["updates.hour_of_day"]);
    }

    #[test]
    fn test_string_validators() {
        let schema = Schema::new().with_attribute(
            "stopword_table",
            Attribute::optional(AttributeType::String)
                .with_validator(ValueValidator::LengthBetween(0, 1024))
                .with_validator(ValueValidator::Regex(r"^.+/.+$".to_string())),
        );
        assert!(validate(&schema, &json!({"stopword_table": "db/table"})).is_empty());

        let diagnostics = validate(&schema, &json!({"stopword_table": "table"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("must match ^.+/.+$, got \"table\"")
        );

        let broken = Schema::new().with_attribute(
            "name",
            Attribute::optional(AttributeType::String)
                .with_validator(ValueValidator::Regex("(".to_string())),
        );
        let diagnostics = validate(&broken, &json!({"name": "x"}));
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .is_some_and(|d| d.starts_with("invalid pattern")));
    }

    #[test]
    fn test_root_must_be_object() {
        let diagnostics = validate(&database_schema(), &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object for configuration");
        assert!(diagnostics[0].attribute.is_none());
    }
}
