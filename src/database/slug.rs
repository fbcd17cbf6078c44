//! Engine slugs (`<engine>/<major-version>`) and suspension status helpers.

use crate::client::types::status;
use crate::error::ProviderError;

/// Build the slug for an engine and a full or major version.
///
/// Only the major component of `version` is kept: `("mysql", "8.0.35")`
/// becomes `mysql/8`.
pub fn format_engine_slug(engine: &str, version: &str) -> String {
    let major = version.split('.').next().unwrap_or(version);
    format!("{engine}/{major}")
}

/// Split a slug into its engine and version parts.
pub fn parse_engine_slug(slug: &str) -> Result<(&str, &str), ProviderError> {
    let components: Vec<&str> = slug.split('/').collect();
    match components.as_slice() {
        [engine, version] if !engine.is_empty() && !version.is_empty() => Ok((engine, version)),
        _ => Err(ProviderError::Validation(format!(
            "invalid engine_id {slug:?}: expected <engine>/<version> with exactly 2 components, got {}",
            components.len()
        ))),
    }
}

/// Whether a status means the database is, or is becoming, suspended.
pub fn status_is_suspended(status: &str) -> bool {
    status == status::SUSPENDED || status == status::SUSPENDING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_keeps_major_version() {
        assert_eq!(format_engine_slug("mysql", "8.0.35"), "mysql/8");
        assert_eq!(format_engine_slug("postgresql", "16"), "postgresql/16");
    }

    #[test]
    fn test_parse_format_round_trip() {
        let slug = format_engine_slug("postgresql", "14.6");
        assert_eq!(parse_engine_slug(&slug).unwrap(), ("postgresql", "14"));
    }

    #[test]
    fn test_parse_rejects_wrong_component_count() {
        assert!(parse_engine_slug("mysql").is_err());
        assert!(parse_engine_slug("mysql/8/0").is_err());
        assert!(parse_engine_slug("/8").is_err());
        assert!(parse_engine_slug("mysql/").is_err());
    }

    #[test]
    fn test_status_is_suspended() {
        assert!(status_is_suspended("suspended"));
        assert!(status_is_suspended("suspending"));
        assert!(!status_is_suspended("resuming"));
        assert!(!status_is_suspended("active"));
    }
}
