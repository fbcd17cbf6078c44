//! Schemas the host renders plans from and validates configuration against.
//!
//! A [`Schema`] is a root [`Block`] of attributes plus single-object nested
//! blocks such as `updates`, `private_network` and `timeouts`. Each
//! [`Attribute`] states its [`Usage`], which decides whether configuration
//! may set it and whether planning fills it in, and carries the
//! [`ValueValidator`]s the Linode API enforces so bad values are rejected
//! before any request is sent.
//!
//! Maps are ordered so schemas and validation diagnostics come out in a
//! stable order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string.
    String,
    /// A 64-bit integer.
    Int64,
    /// A floating point number.
    Float64,
    /// A boolean.
    Bool,
    /// An ordered list.
    List(Box<AttributeType>),
    /// An unordered collection without duplicates, such as an allow list.
    Set(Box<AttributeType>),
    /// String keys to values of one type, such as `members`.
    Map(Box<AttributeType>),
    /// A fixed set of named fields.
    Object(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    /// `List` of `element`.
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    /// `Set` of `element`.
    pub fn set(element: AttributeType) -> Self {
        Self::Set(Box::new(element))
    }

    /// `Map` with `value` values.
    pub fn map(value: AttributeType) -> Self {
        Self::Map(Box::new(value))
    }

    /// `Object` with the given fields.
    pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, AttributeType)>) -> Self {
        Self::Object(
            fields
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        )
    }
}

/// How configuration and planning treat an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usage {
    /// Must be set in configuration.
    Required,
    /// May be set; stays null when unset.
    Optional,
    /// Set by the provider only.
    Computed,
    /// May be set; the provider fills it in when unset.
    OptionalComputed,
}

impl Usage {
    /// Whether configuration may carry a value.
    pub fn accepts_config(self) -> bool {
        !matches!(self, Usage::Computed)
    }

    /// Whether the provider may fill in the value.
    pub fn is_computed(self) -> bool {
        matches!(self, Usage::Computed | Usage::OptionalComputed)
    }
}

/// A constraint on a known attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueValidator {
    /// Integer within an inclusive range.
    IntBetween(i64, i64),
    /// Number within an inclusive range.
    FloatBetween(f64, f64),
    /// Integer no smaller than the bound.
    IntAtLeast(i64),
    /// String from a fixed set.
    OneOf(Vec<String>),
    /// String whose length in characters is within an inclusive range.
    LengthBetween(usize, usize),
    /// String matching a regular expression.
    Regex(String),
}

/// A single attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// How configuration and planning treat the attribute.
    pub usage: Usage,
    /// Hidden from plan output and logs.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    /// User-facing documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change replaces the resource instead of updating it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force_new: bool,
    /// Value planned when configuration leaves the attribute unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Constraints checked once the value is known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValueValidator>,
}

impl Attribute {
    /// An attribute of `attr_type` used as `usage`.
    pub fn new(attr_type: AttributeType, usage: Usage) -> Self {
        Self {
            attr_type,
            usage,
            sensitive: false,
            description: None,
            force_new: false,
            default: None,
            validators: Vec::new(),
        }
    }

    /// A [`Usage::Required`] attribute.
    pub fn required(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Usage::Required)
    }

    /// A [`Usage::Optional`] attribute.
    pub fn optional(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Usage::Optional)
    }

    /// A [`Usage::Computed`] attribute.
    pub fn computed(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Usage::Computed)
    }

    /// A [`Usage::OptionalComputed`] attribute.
    pub fn optional_computed(attr_type: AttributeType) -> Self {
        Self::new(attr_type, Usage::OptionalComputed)
    }

    /// Whether configuration must set the attribute.
    pub fn is_required(&self) -> bool {
        self.usage == Usage::Required
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the resource when the value changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Planned value when configuration leaves it unset.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Hide the value from plan output.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Add a constraint.
    pub fn with_validator(mut self, validator: ValueValidator) -> Self {
        self.validators.push(validator);
        self
    }
}

/// Attributes and nested blocks at one level of a schema.
///
/// A nested block holds at most one object; it is null when the
/// configuration omits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, Block>,
    /// User-facing documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: Block) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Schema of a resource, a data source or the provider block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The root block.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: Block) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Look up a root attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.get(name)
    }
}

/// Everything the provider exposes to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The provider configuration block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Data source schemas by type name.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// An empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration block.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Add a data source schema.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation failed; state is not committed.
    Error,
    /// Reported to the user; state is still committed.
    Warning,
}

/// A message for the host, optionally tied to an attribute path such as
/// `updates.hour_of_day`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One-line summary.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attribute path, e.g. `updates.hour_of_day`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// A warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    /// Add a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Tie the diagnostic to an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
