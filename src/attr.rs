//! Three-valued attributes.
//!
//! Every attribute the host exchanges with the provider is either a known
//! value, unknown (to be computed during apply), or null. [`Attr`] models
//! that directly and [`keep_or_update`] is the single rule used to fold
//! freshly-read remote values into plan-time state.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// The placeholder the host uses for values that are not known until apply.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// A known value, an unknown value, or null.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attr<T> {
    /// The value is known.
    Known(T),
    /// The value will be computed during apply.
    Unknown,
    /// The value is explicitly absent.
    Null,
}

impl<T> Default for Attr<T> {
    fn default() -> Self {
        Self::Null
    }
}

impl<T> Attr<T> {
    /// Build a known-or-null attribute from an optional value.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Null,
        }
    }

    /// Whether the value is known.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The known value, if any.
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Consume the attribute, returning the known value, if any.
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Map the known value, keeping unknown and null as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attr<U> {
        match self {
            Self::Known(v) => Attr::Known(f(v)),
            Self::Unknown => Attr::Unknown,
            Self::Null => Attr::Null,
        }
    }

    /// Borrow the known value.
    pub fn as_ref(&self) -> Attr<&T> {
        match self {
            Self::Known(v) => Attr::Known(v),
            Self::Unknown => Attr::Unknown,
            Self::Null => Attr::Null,
        }
    }

    /// See [`keep_or_update`].
    pub fn keep_or_update(self, new: Attr<T>, preserve_known: bool) -> Attr<T> {
        keep_or_update(self, new, preserve_known)
    }
}

impl<T: Clone> Attr<T> {
    /// The known value, or `default` when unknown or null.
    pub fn known_or(&self, default: T) -> T {
        self.known().cloned().unwrap_or(default)
    }
}

impl<T> From<T> for Attr<T> {
    fn from(value: T) -> Self {
        Self::Known(value)
    }
}

/// Keep `current` when `preserve_known` is set and it is not unknown,
/// otherwise take `new`.
pub fn keep_or_update<T>(current: Attr<T>, new: Attr<T>, preserve_known: bool) -> Attr<T> {
    if preserve_known && !current.is_unknown() {
        current
    } else {
        new
    }
}

impl<T: Serialize> Serialize for Attr<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(v) => v.serialize(serializer),
            Self::Unknown => serializer.serialize_str(UNKNOWN_VALUE),
            Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Attr<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::try_from_value(value).map_err(D::Error::custom)
    }
}

impl<T: DeserializeOwned> Attr<T> {
    /// Decode a host JSON value.
    pub fn try_from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::String(ref s) if s == UNKNOWN_VALUE => Ok(Self::Unknown),
            other => serde_json::from_value(other).map(Self::Known),
        }
    }
}

/// Whether a host JSON value is the unknown placeholder.
pub fn is_unknown_value(value: &Value) -> bool {
    value.as_str() == Some(UNKNOWN_VALUE)
}

/// Replace every unknown placeholder in `value`, at any depth, with null.
///
/// State committed to the host never carries unknowns.
pub fn null_unknowns(value: &mut Value) {
    if is_unknown_value(value) {
        *value = Value::Null;
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(null_unknowns),
        Value::Object(map) => map.values_mut().for_each(null_unknowns),
        _ => {}
    }
}
