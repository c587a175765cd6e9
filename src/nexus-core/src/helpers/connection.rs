//! Connection-string and endpoint helpers.
//!
//! Everything here is pure: no I/O, no clock, no storage.

use serde::Serialize;

use crate::models::SslMode;
use nexus_errors::{NexusError, Result};

const POSTGRESQL_SCHEME: &str = "postgresql://";
const POSTGRES_SCHEME: &str = "postgres://";

/// Outcome of a validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub is_valid: bool,
    pub message: String,
}

impl Validation {
    pub fn valid(message: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }

    /// `Err(NexusError::Validation)` when invalid, the message otherwise.
    pub fn into_result(self) -> Result<String> {
        if self.is_valid {
            Ok(self.message)
        } else {
            Err(NexusError::Validation(self.message))
        }
    }
}

/// Result of checking a PostgreSQL connection string, with the string to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStringCheck {
    pub is_valid: bool,
    pub message: String,
    pub corrected_string: String,
}

impl ConnectionStringCheck {
    pub fn was_corrected(&self, original: &str) -> bool {
        self.is_valid && self.corrected_string != original
    }
}

impl From<ConnectionStringCheck> for Validation {
    fn from(check: ConnectionStringCheck) -> Self {
        Self {
            is_valid: check.is_valid,
            message: check.message,
        }
    }
}

pub fn validate_postgres_connection_string(connection_string: &str) -> ConnectionStringCheck {
    if connection_string.is_empty() {
        return ConnectionStringCheck {
            is_valid: false,
            message: "Connection string is empty".into(),
            corrected_string: String::new(),
        };
    }

    if connection_string.starts_with(POSTGRESQL_SCHEME) {
        return ConnectionStringCheck {
            is_valid: true,
            message: "Valid connection string".into(),
            corrected_string: connection_string.to_string(),
        };
    }

    // Common typo: the short scheme is accepted and rewritten.
    if let Some(rest) = connection_string.strip_prefix(POSTGRES_SCHEME) {
        return ConnectionStringCheck {
            is_valid: true,
            message: "Fixed 'postgres://' to 'postgresql://'".into(),
            corrected_string: format!("{}{}", POSTGRESQL_SCHEME, rest),
        };
    }

    ConnectionStringCheck {
        is_valid: false,
        message: "Connection string should start with postgresql://".into(),
        corrected_string: connection_string.to_string(),
    }
}

/// Individual PostgreSQL connection fields. Empty strings and port 0 count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresParams<'a> {
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub url: &'a str,
    pub port: Option<u16>,
    pub database: &'a str,
    pub ssl_mode: Option<SslMode>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// `postgresql://[user[:password]@]host[:port]/database[?sslmode=mode]`,
/// or an empty string when host or database is missing.
pub fn build_postgres_connection_string(params: &PostgresParams<'_>) -> String {
    if params.url.is_empty() || params.database.is_empty() {
        return String::new();
    }

    let mut out = String::from(POSTGRESQL_SCHEME);
    if let Some(user) = present(params.username) {
        out.push_str(user);
        if let Some(password) = present(params.password) {
            out.push(':');
            out.push_str(password);
        }
        out.push('@');
    }
    out.push_str(params.url);
    if let Some(port) = params.port.filter(|p| *p != 0) {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push('/');
    out.push_str(params.database);
    if let Some(mode) = params.ssl_mode {
        out.push_str("?sslmode=");
        out.push_str(mode.as_str());
    }
    out
}

fn validate_endpoint(endpoint: &str, label: &str, segment: &str) -> Validation {
    if endpoint.is_empty() {
        return Validation::invalid(format!("{} endpoint is empty", label));
    }
    if !endpoint.contains(segment) {
        return Validation::invalid(format!(
            "{} endpoint should include '{}' path",
            label, segment
        ));
    }
    Validation::valid(format!("Valid {} endpoint", label))
}

pub fn validate_rest_api_endpoint(endpoint: &str) -> Validation {
    validate_endpoint(endpoint, "REST API", "/rest")
}

pub fn validate_auth_endpoint(endpoint: &str) -> Validation {
    validate_endpoint(endpoint, "Auth", "/auth")
}

pub fn validate_storage_endpoint(endpoint: &str) -> Validation {
    validate_endpoint(endpoint, "Storage", "/storage")
}

pub fn validate_functions_endpoint(endpoint: &str) -> Validation {
    validate_endpoint(endpoint, "Functions", "/functions")
}

/// Sub-service URLs of a Supabase-style backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSet {
    pub rest_api_endpoint: String,
    pub auth_endpoint: String,
    pub auth_health_endpoint: String,
    pub storage_endpoint: String,
    pub functions_endpoint: String,
}

/// `host[:port]` part of a base URL given with or without `http(s)://`.
pub fn strip_http_scheme(base_url: &str) -> &str {
    base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .unwrap_or(base_url)
}

/// Derive the endpoint set from a base host or URL.
///
/// A leading `http://` or `https://` is stripped and every endpoint is
/// emitted with `http://`, whatever the input scheme was.
pub fn build_supabase_endpoints(base_url: &str) -> Option<EndpointSet> {
    if base_url.is_empty() {
        return None;
    }

    let host = strip_http_scheme(base_url);

    Some(EndpointSet {
        rest_api_endpoint: format!("http://{}/rest/v1", host),
        auth_endpoint: format!("http://{}/auth/v1", host),
        auth_health_endpoint: format!("http://{}/auth/v1/health", host),
        storage_endpoint: format!("http://{}/storage/v1", host),
        functions_endpoint: format!("http://{}/functions/v1", host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn short_scheme_is_corrected() {
        let check = validate_postgres_connection_string("postgres://u:p@h:5432/d");
        assert!(check.is_valid);
        assert_eq!(check.corrected_string, "postgresql://u:p@h:5432/d");
        assert_eq!(check.message, "Fixed 'postgres://' to 'postgresql://'");
        assert!(check.was_corrected("postgres://u:p@h:5432/d"));
    }

    #[test]
    fn foreign_scheme_is_rejected() {
        let check = validate_postgres_connection_string("mysql://h/d");
        assert!(!check.is_valid);
        assert!(check.message.contains("postgresql://"));
        assert_eq!(check.corrected_string, "mysql://h/d");
    }

    #[test]
    fn empty_and_canonical_strings() {
        let empty = validate_postgres_connection_string("");
        assert!(!empty.is_valid);
        assert_eq!(empty.message, "Connection string is empty");

        let ok = validate_postgres_connection_string("postgresql://h/d");
        assert!(ok.is_valid);
        assert!(!ok.was_corrected("postgresql://h/d"));
        assert_eq!(Validation::from(ok).message, "Valid connection string");
    }

    #[rstest]
    #[case(
        Some("u"),
        Some("p"),
        Some(5432),
        Some(SslMode::Require),
        "postgresql://u:p@h:5432/d?sslmode=require"
    )]
    #[case(Some("u"), None, Some(5432), None, "postgresql://u@h:5432/d")]
    #[case(None, Some("p"), None, None, "postgresql://h/d")]
    #[case(
        Some(""),
        Some("p"),
        Some(0),
        Some(SslMode::VerifyFull),
        "postgresql://h/d?sslmode=verify-full"
    )]
    fn builds_connection_string(
        #[case] username: Option<&str>,
        #[case] password: Option<&str>,
        #[case] port: Option<u16>,
        #[case] ssl_mode: Option<SslMode>,
        #[case] expected: &str,
    ) {
        let params = PostgresParams {
            username,
            password,
            url: "h",
            port,
            database: "d",
            ssl_mode,
        };
        assert_eq!(build_postgres_connection_string(&params), expected);
    }

    #[test]
    fn missing_host_or_database_builds_nothing() {
        let no_db = PostgresParams {
            url: "h",
            ..Default::default()
        };
        assert_eq!(build_postgres_connection_string(&no_db), "");

        let no_host = PostgresParams {
            database: "d",
            ..Default::default()
        };
        assert_eq!(build_postgres_connection_string(&no_host), "");
    }

    #[rstest]
    #[case("http://h/rest/v1", true)]
    #[case("http://h/restful", true)]
    #[case("http://h/api", false)]
    #[case("", false)]
    fn rest_endpoint_is_substring_match(#[case] endpoint: &str, #[case] valid: bool) {
        assert_eq!(validate_rest_api_endpoint(endpoint).is_valid, valid);
    }

    #[test]
    fn endpoint_messages_name_the_segment() {
        assert_eq!(
            validate_auth_endpoint("").message,
            "Auth endpoint is empty"
        );
        assert_eq!(
            validate_storage_endpoint("http://h/files").message,
            "Storage endpoint should include '/storage' path"
        );
        assert_eq!(
            validate_functions_endpoint("http://h/functions/v1/hello").message,
            "Valid Functions endpoint"
        );
        assert!(validate_auth_endpoint("http://h/auth/v1").is_valid);
    }

    #[test]
    fn endpoints_force_plain_http() {
        let set = build_supabase_endpoints("https://db.example.com").unwrap();
        assert_eq!(set.rest_api_endpoint, "http://db.example.com/rest/v1");
        assert_eq!(set.auth_endpoint, "http://db.example.com/auth/v1");
        assert_eq!(set.auth_health_endpoint, "http://db.example.com/auth/v1/health");
        assert_eq!(set.storage_endpoint, "http://db.example.com/storage/v1");
        assert_eq!(set.functions_endpoint, "http://db.example.com/functions/v1");

        let bare = build_supabase_endpoints("db.example.com:8000").unwrap();
        assert_eq!(bare.rest_api_endpoint, "http://db.example.com:8000/rest/v1");
    }

    #[rstest]
    #[case("https://db.example.com", "db.example.com")]
    #[case("http://db.example.com:8000", "db.example.com:8000")]
    #[case("db.example.com", "db.example.com")]
    fn scheme_is_stripped_from_base(#[case] base: &str, #[case] host: &str) {
        assert_eq!(strip_http_scheme(base), host);
    }

    #[test]
    fn empty_base_has_no_endpoints() {
        assert_eq!(build_supabase_endpoints(""), None);
    }

    #[test]
    fn invalid_outcome_becomes_validation_error() {
        let err = Validation::invalid("nope").into_result().unwrap_err();
        assert!(matches!(err, NexusError::Validation(m) if m == "nope"));
        assert_eq!(Validation::valid("fine").into_result().unwrap(), "fine");
    }
}
