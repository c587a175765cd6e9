use chrono::{DateTime, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::helpers::PostgresParams;

/// Declared type of a remote service.
///
/// Stored as its display string. Unknown values are kept verbatim in
/// `Other`, so parsing never fails and old collections always load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceKind {
    Postgres,
    Database,
    Authentication,
    Storage,
    Api,
    Hosting,
    /// Legacy free-form value, only produced by older records.
    RestApi,
    /// Legacy free-form value, only produced by older records.
    AuthService,
    Other(String),
}

impl ServiceKind {
    /// Kinds offered when registering a new service.
    pub const SELECTABLE: [&'static str; 7] = [
        "PostgreSQL",
        "Database",
        "Authentication",
        "Storage",
        "API",
        "Hosting",
        "Other",
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::Database => "Database",
            Self::Authentication => "Authentication",
            Self::Storage => "Storage",
            Self::Api => "API",
            Self::Hosting => "Hosting",
            Self::RestApi => "REST API",
            Self::AuthService => "Auth Service",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_postgres(&self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl Default for ServiceKind {
    fn default() -> Self {
        Self::Postgres
    }
}

impl From<&str> for ServiceKind {
    fn from(value: &str) -> Self {
        match value {
            "PostgreSQL" => Self::Postgres,
            "Database" => Self::Database,
            "Authentication" => Self::Authentication,
            "Storage" => Self::Storage,
            "API" => Self::Api,
            "Hosting" => Self::Hosting,
            "REST API" => Self::RestApi,
            "Auth Service" => Self::AuthService,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ServiceKind {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ServiceKind> for String {
    fn from(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for ServiceKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ServiceStatus {
    Active,
    #[default]
    Inactive,
    Maintenance,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::Maintenance => "Maintenance",
        }
    }
}

impl FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" | "active" => Ok(Self::Active),
            "Inactive" | "inactive" => Ok(Self::Inactive),
            "Maintenance" | "maintenance" => Ok(Self::Maintenance),
            other => Err(format!(
                "unknown status `{}` (expected Active, Inactive or Maintenance)",
                other
            )),
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Require,
    Prefer,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Require => "require",
            Self::Prefer => "prefer",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(Self::Disable),
            "require" => Ok(Self::Require),
            "prefer" => Ok(Self::Prefer),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            other => Err(format!(
                "unknown sslmode `{}` (expected disable, require, prefer, verify-ca or verify-full)",
                other
            )),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Older records may carry the port as text ("5432" or "").
fn de_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u64),
        Text(String),
    }

    match Option::<PortRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PortRepr::Number(n)) => u16::try_from(n)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("port {} is out of range", n))),
        Some(PortRepr::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(PortRepr::Text(s)) => s
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("port `{}` is not a number", s))),
    }
}

// Distinguishes a missing key (outer None) from an explicit null (Some(None)).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A persisted description of a remote system and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, deserialize_with = "de_port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<SslMode>,
}

impl Service {
    /// Materialize a draft with its system fields.
    pub fn from_draft(draft: ServiceDraft, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            kind: draft.kind,
            url: draft.url,
            connection_string: draft.connection_string,
            api_key: draft.api_key,
            username: draft.username,
            password: draft.password,
            status: draft.status,
            notes: draft.notes,
            last_tested: draft.last_tested,
            created_at: now,
            updated_at: now,
            database: draft.database,
            port: draft.port,
            ssl_mode: draft.ssl_mode,
        }
    }

    pub fn postgres_params(&self) -> PostgresParams<'_> {
        PostgresParams {
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            url: &self.url,
            port: self.port,
            database: self.database.as_deref().unwrap_or_default(),
            ssl_mode: self.ssl_mode,
        }
    }

    /// The record without its system fields, e.g. to re-validate after a patch.
    pub fn to_draft(&self) -> ServiceDraft {
        ServiceDraft {
            name: self.name.clone(),
            kind: self.kind.clone(),
            url: self.url.clone(),
            connection_string: self.connection_string.clone(),
            api_key: self.api_key.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            status: self.status,
            notes: self.notes.clone(),
            last_tested: self.last_tested,
            database: self.database.clone(),
            port: self.port,
            ssl_mode: self.ssl_mode,
        }
    }
}

/// A service as submitted for creation: no id, no timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, deserialize_with = "de_port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<SslMode>,
}

impl ServiceDraft {
    pub fn new(name: impl Into<String>, kind: ServiceKind, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn postgres_params(&self) -> PostgresParams<'_> {
        PostgresParams {
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            url: &self.url,
            port: self.port,
            database: self.database.as_deref().unwrap_or_default(),
            ssl_mode: self.ssl_mode,
        }
    }
}

/// Fields to change on an existing service.
///
/// Required fields are replaced when `Some`. Optional fields are tri-state:
/// `None` keeps the current value, `Some(None)` clears it and
/// `Some(Some(v))` replaces it. `id`, `createdAt` and `updatedAt` cannot be
/// patched.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ServiceKind>,
    pub url: Option<String>,
    pub status: Option<ServiceStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub connection_string: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub api_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub username: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub password: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_tested: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub database: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub port: Option<Option<u16>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ssl_mode: Option<Option<SslMode>>,
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl ServicePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow merge onto `service`. Does not touch system fields.
    pub fn apply_to(self, service: &mut Service) {
        merge(&mut service.name, self.name);
        merge(&mut service.kind, self.kind);
        merge(&mut service.url, self.url);
        merge(&mut service.status, self.status);
        merge(&mut service.connection_string, self.connection_string);
        merge(&mut service.api_key, self.api_key);
        merge(&mut service.username, self.username);
        merge(&mut service.password, self.password);
        merge(&mut service.notes, self.notes);
        merge(&mut service.last_tested, self.last_tested);
        merge(&mut service.database, self.database);
        merge(&mut service.port, self.port);
        merge(&mut service.ssl_mode, self.ssl_mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Service {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        let mut draft = ServiceDraft::new("Main DB", ServiceKind::Postgres, "db.internal");
        draft.database = Some("app".into());
        draft.port = Some(5432);
        draft.ssl_mode = Some(SslMode::VerifyFull);
        Service::from_draft(draft, "id-1".into(), at)
    }

    #[test]
    fn kind_keeps_legacy_and_unknown_values() {
        assert_eq!(ServiceKind::from("REST API"), ServiceKind::RestApi);
        assert_eq!(ServiceKind::from("Auth Service"), ServiceKind::AuthService);
        assert_eq!(
            ServiceKind::from("Message Queue"),
            ServiceKind::Other("Message Queue".into())
        );
        assert_eq!(String::from(ServiceKind::Api), "API");
        assert_eq!(ServiceKind::Other("Other".into()).to_string(), "Other");
    }

    #[test]
    fn json_uses_camel_case_and_omits_absent_fields() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["type"], "PostgreSQL");
        assert_eq!(value["sslMode"], "verify-full");
        assert_eq!(value["status"], "Inactive");
        assert_eq!(value["createdAt"], value["updatedAt"]);
        assert!(value.get("connectionString").is_none());
        assert!(value.get("lastTested").is_none());
    }

    #[test]
    fn reads_records_written_by_older_versions() {
        let raw = json!({
            "id": "abc",
            "name": "Cache",
            "type": "Redis",
            "url": "redis://cache:6379",
            "createdAt": "2024-01-02T03:04:05.678Z",
            "updatedAt": "2024-01-02T03:04:05.678Z",
            "port": "6379"
        });
        let svc: Service = serde_json::from_value(raw).unwrap();
        assert_eq!(svc.kind, ServiceKind::Other("Redis".into()));
        assert_eq!(svc.status, ServiceStatus::Inactive);
        assert_eq!(svc.port, Some(6379));

        let blank_port = json!({
            "id": "abc", "name": "x1", "type": "API", "url": "u",
            "createdAt": "2024-01-02T03:04:05Z", "updatedAt": "2024-01-02T03:04:05Z",
            "port": ""
        });
        let svc: Service = serde_json::from_value(blank_port).unwrap();
        assert_eq!(svc.port, None);
    }

    #[test]
    fn patch_distinguishes_missing_from_null() {
        let patch: ServicePatch =
            serde_json::from_value(json!({ "name": "Renamed", "database": null })).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Renamed"));
        assert_eq!(patch.database, Some(None));
        assert_eq!(patch.port, None);

        let mut svc = sample();
        patch.apply_to(&mut svc);
        assert_eq!(svc.name, "Renamed");
        assert_eq!(svc.database, None);
        assert_eq!(svc.port, Some(5432));
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let patch = ServicePatch::default();
        assert!(patch.is_empty());
        let mut svc = sample();
        let before = svc.clone();
        patch.apply_to(&mut svc);
        assert_eq!(svc, before);
    }

    #[test]
    fn status_and_ssl_mode_parse_from_cli_text() {
        assert_eq!("maintenance".parse::<ServiceStatus>(), Ok(ServiceStatus::Maintenance));
        assert!("Paused".parse::<ServiceStatus>().is_err());
        assert_eq!("verify-ca".parse::<SslMode>(), Ok(SslMode::VerifyCa));
        assert!("allow".parse::<SslMode>().is_err());
    }
}
