use crate::helpers::{
    validate_auth_endpoint, validate_postgres_connection_string, validate_rest_api_endpoint,
    Validation,
};
use crate::models::{Service, ServiceDraft, ServiceKind};
use nexus_errors::{NexusError, Result};

/// Which check a service kind is subject to before a connectivity test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    /// Connection string if present, otherwise host and database.
    Postgres,
    /// URL required, then checked as a REST endpoint.
    RestEndpoint,
    /// URL required, then checked as an auth endpoint.
    AuthEndpoint,
    /// URL required, nothing else.
    UrlRequired,
}

impl ServiceKind {
    pub fn rule(&self) -> ValidationRule {
        match self {
            ServiceKind::Postgres => ValidationRule::Postgres,
            ServiceKind::RestApi => ValidationRule::RestEndpoint,
            ServiceKind::AuthService => ValidationRule::AuthEndpoint,
            ServiceKind::Database
            | ServiceKind::Authentication
            | ServiceKind::Storage
            | ServiceKind::Api
            | ServiceKind::Hosting
            | ServiceKind::Other(_) => ValidationRule::UrlRequired,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Check that a service carries enough detail to attempt a connection.
pub fn validate_service(service: &Service) -> Validation {
    match service.kind.rule() {
        ValidationRule::Postgres => {
            if let Some(conn) = non_empty(service.connection_string.as_deref()) {
                return validate_postgres_connection_string(conn).into();
            }
            if service.url.is_empty() {
                return Validation::invalid("Server hostname is required for PostgreSQL connection");
            }
            if non_empty(service.database.as_deref()).is_none() {
                return Validation::invalid("Database name is required for PostgreSQL connection");
            }
            Validation::valid("Valid service details")
        }
        ValidationRule::RestEndpoint => {
            if service.url.is_empty() {
                return Validation::invalid("REST API endpoint URL is required");
            }
            validate_rest_api_endpoint(&service.url)
        }
        ValidationRule::AuthEndpoint => {
            if service.url.is_empty() {
                return Validation::invalid("Auth service endpoint URL is required");
            }
            validate_auth_endpoint(&service.url)
        }
        ValidationRule::UrlRequired => {
            if service.url.is_empty() {
                return Validation::invalid(format!("URL is required for {} service", service.kind));
            }
            Validation::valid("Valid service details")
        }
    }
}

/// Registration rules for a new or edited service.
///
/// Returns the draft to store: a PostgreSQL connection string using the
/// short `postgres://` scheme comes back rewritten, and an empty connection
/// string is dropped.
pub fn validate_draft(mut draft: ServiceDraft) -> Result<ServiceDraft> {
    if draft.name.chars().count() < 2 {
        return Err(NexusError::validation("Name must be at least 2 characters"));
    }
    if draft.kind.as_str().is_empty() {
        return Err(NexusError::validation("Service type is required"));
    }
    if draft.url.is_empty() {
        return Err(NexusError::validation("URL/hostname is required"));
    }
    if draft.port == Some(0) {
        return Err(NexusError::validation("Port must be a valid number"));
    }

    if draft.connection_string.as_deref() == Some("") {
        draft.connection_string = None;
    }
    if draft.kind.is_postgres() {
        if let Some(conn) = draft.connection_string.take() {
            let check = validate_postgres_connection_string(&conn);
            if !check.is_valid {
                return Err(NexusError::validation(
                    "Connection string must start with postgresql://",
                ));
            }
            draft.connection_string = Some(check.corrected_string);
        }
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn service(kind: &str, url: &str) -> Service {
        Service::from_draft(
            ServiceDraft::new("svc", ServiceKind::from(kind), url),
            "id".into(),
            Utc::now(),
        )
    }

    #[rstest]
    #[case("PostgreSQL", ValidationRule::Postgres)]
    #[case("REST API", ValidationRule::RestEndpoint)]
    #[case("Auth Service", ValidationRule::AuthEndpoint)]
    #[case("API", ValidationRule::UrlRequired)]
    #[case("Authentication", ValidationRule::UrlRequired)]
    #[case("Whatever", ValidationRule::UrlRequired)]
    fn kinds_map_to_rules(#[case] kind: &str, #[case] rule: ValidationRule) {
        assert_eq!(ServiceKind::from(kind).rule(), rule);
    }

    #[test]
    fn postgres_without_database_fails_until_database_is_set() {
        let mut svc = service("PostgreSQL", "h");
        let outcome = validate_service(&svc);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.message, "Database name is required for PostgreSQL connection");

        svc.database = Some("d".into());
        assert!(validate_service(&svc).is_valid);
    }

    #[test]
    fn postgres_without_host_names_the_hostname() {
        let mut svc = service("PostgreSQL", "");
        svc.database = Some("d".into());
        assert_eq!(
            validate_service(&svc).message,
            "Server hostname is required for PostgreSQL connection"
        );
    }

    #[test]
    fn postgres_connection_string_is_checked_before_fields() {
        let mut svc = service("PostgreSQL", "");
        svc.connection_string = Some("postgres://u@h/d".into());
        let outcome = validate_service(&svc);
        assert!(outcome.is_valid);
        assert_eq!(outcome.message, "Fixed 'postgres://' to 'postgresql://'");

        svc.connection_string = Some("mysql://h/d".into());
        assert!(!validate_service(&svc).is_valid);
    }

    #[test]
    fn legacy_kinds_delegate_to_endpoint_checks() {
        assert_eq!(
            validate_service(&service("REST API", "")).message,
            "REST API endpoint URL is required"
        );
        assert!(!validate_service(&service("REST API", "http://h/api")).is_valid);
        assert!(validate_service(&service("REST API", "http://h/rest/v1")).is_valid);

        assert_eq!(
            validate_service(&service("Auth Service", "")).message,
            "Auth service endpoint URL is required"
        );
        assert!(validate_service(&service("Auth Service", "http://h/auth/v1")).is_valid);
    }

    #[test]
    fn other_kinds_only_need_a_url() {
        assert_eq!(
            validate_service(&service("Hosting", "")).message,
            "URL is required for Hosting service"
        );
        // No endpoint check for the canonical API kind.
        assert!(validate_service(&service("API", "http://h/anything")).is_valid);
    }

    #[test]
    fn draft_name_must_have_two_characters() {
        let err = validate_draft(ServiceDraft::new("x", ServiceKind::Api, "u")).unwrap_err();
        assert_eq!(err.to_string(), "validation failed: Name must be at least 2 characters");
        assert!(validate_draft(ServiceDraft::new("éé", ServiceKind::Api, "u")).is_ok());
    }

    #[test]
    fn draft_requires_url_and_real_port() {
        assert!(validate_draft(ServiceDraft::new("name", ServiceKind::Api, "")).is_err());

        let mut draft = ServiceDraft::new("name", ServiceKind::Postgres, "h");
        draft.port = Some(0);
        assert!(validate_draft(draft).is_err());
    }

    #[test]
    fn draft_connection_string_is_normalized() {
        let mut draft = ServiceDraft::new("pg", ServiceKind::Postgres, "h");
        draft.connection_string = Some("postgres://u@h/d".into());
        let draft = validate_draft(draft).unwrap();
        assert_eq!(draft.connection_string.as_deref(), Some("postgresql://u@h/d"));

        let mut bad = ServiceDraft::new("pg", ServiceKind::Postgres, "h");
        bad.connection_string = Some("jdbc:postgresql://h/d".into());
        assert!(validate_draft(bad).is_err());

        let mut blank = ServiceDraft::new("pg", ServiceKind::Postgres, "h");
        blank.connection_string = Some(String::new());
        assert_eq!(validate_draft(blank).unwrap().connection_string, None);
    }
}
