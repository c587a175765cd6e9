use nexus_core::{
    build_postgres_connection_string, build_supabase_endpoints, strip_http_scheme,
    validate_auth_endpoint, validate_functions_endpoint, validate_postgres_connection_string,
    validate_rest_api_endpoint, validate_service, validate_storage_endpoint, PostgresParams,
    Service, ServiceStorage, Validation, ValidationRule,
};
use nexus_errors::{NexusError, Result};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Simulated result of a connectivity check. No network traffic is involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub outcome: CheckOutcome,
    pub service: Service,
}

pub fn success_rate(rule: ValidationRule) -> f64 {
    match rule {
        ValidationRule::Postgres => 0.8,
        ValidationRule::RestEndpoint => 0.7,
        ValidationRule::AuthEndpoint => 0.75,
        ValidationRule::UrlRequired => 0.6,
    }
}

pub fn simulate<R: Rng>(service: &Service, rng: &mut R) -> CheckOutcome {
    let rule = service.kind.rule();
    let success = rng.random_bool(success_rate(rule));
    let message = match (rule, success) {
        (ValidationRule::Postgres, true) => {
            format!("Successfully connected to {} database", service.name)
        }
        (ValidationRule::Postgres, false) => {
            "Failed to connect: database connection refused".to_string()
        }
        (ValidationRule::RestEndpoint, true) => {
            format!("Successfully connected to {} REST endpoint", service.name)
        }
        (ValidationRule::RestEndpoint, false) => {
            "Failed: REST API returned 403 Forbidden".to_string()
        }
        (ValidationRule::AuthEndpoint, true) => "Auth service health check successful".to_string(),
        (ValidationRule::AuthEndpoint, false) => "Auth service health check failed".to_string(),
        (ValidationRule::UrlRequired, true) => {
            format!("Successfully connected to {}", service.name)
        }
        (ValidationRule::UrlRequired, false) => format!("Failed to connect to {}", service.name),
    };
    CheckOutcome { success, message }
}

/// Validate, wait `delay`, draw an outcome, then stamp `lastTested` whatever the outcome.
pub async fn run_check(storage: &ServiceStorage, id: &str, delay: Duration) -> Result<CheckReport> {
    let service = storage.get_by_id(id).ok_or_else(|| NexusError::not_found(id))?;
    validate_service(&service).into_result()?;

    info!(id, kind = %service.kind, "checking service");
    tokio::time::sleep(delay).await;
    let outcome = simulate(&service, &mut rand::rng());
    info!(id, success = outcome.success, "check finished");

    let service = storage
        .record_test(id)?
        .ok_or_else(|| NexusError::not_found(id))?;
    Ok(CheckReport { outcome, service })
}

pub const REST_SUCCESS_RATE: f64 = 0.7;
pub const STORAGE_WARNING_RATE: f64 = 0.5;

/// Sub-services of a Supabase-style stack, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackComponent {
    Postgres,
    RestApi,
    Auth,
    Storage,
    Functions,
}

impl StackComponent {
    pub fn name(self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL Database",
            Self::RestApi => "REST API (PostgREST)",
            Self::Auth => "Auth Service",
            Self::Storage => "Storage Service",
            Self::Functions => "Edge Functions",
        }
    }

    fn validate(self, endpoint: &str) -> Validation {
        match self {
            Self::Postgres => validate_postgres_connection_string(endpoint).into(),
            Self::RestApi => validate_rest_api_endpoint(endpoint),
            Self::Auth => validate_auth_endpoint(endpoint),
            Self::Storage => validate_storage_endpoint(endpoint),
            Self::Functions => validate_functions_endpoint(endpoint),
        }
    }

    fn draw<R: Rng>(self, rng: &mut R) -> (EndpointStatus, &'static str, &'static str) {
        match self {
            Self::Postgres => (
                EndpointStatus::Success,
                "Successfully connected to PostgreSQL database",
                "Connection established to PostgreSQL server running on port 5432",
            ),
            Self::RestApi if rng.random_bool(REST_SUCCESS_RATE) => (
                EndpointStatus::Success,
                "Successfully connected to REST API",
                "Connected to PostgREST service",
            ),
            Self::RestApi => (
                EndpointStatus::Error,
                "Failed to connect to REST API",
                "Connection failed with status 403. Check API key and permissions.",
            ),
            Self::Auth => (
                EndpointStatus::Success,
                "Auth service is healthy",
                "Health check passed. Service is running normally.",
            ),
            Self::Storage if rng.random_bool(STORAGE_WARNING_RATE) => (
                EndpointStatus::Warning,
                "Storage service connected with warnings",
                "Connection established but disk usage is high (85% capacity)",
            ),
            Self::Storage => (
                EndpointStatus::Success,
                "Successfully connected to Storage service",
                "Storage service is healthy and operating normally.",
            ),
            Self::Functions => (
                EndpointStatus::Success,
                "Edge Functions service is accessible",
                "Successfully connected to Edge Functions service.",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResult {
    pub name: &'static str,
    pub endpoint: String,
    pub status: EndpointStatus,
    pub message: String,
    pub details: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StackSummary {
    pub success: usize,
    pub warning: usize,
    pub error: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackReport {
    pub base_url: String,
    pub results: Vec<EndpointResult>,
    pub summary: StackSummary,
}

/// Endpoint of every stack component derived from `base_url`.
pub fn stack_targets(base_url: &str) -> Result<Vec<(StackComponent, String)>> {
    let base_url = base_url.trim();
    let endpoints = build_supabase_endpoints(base_url)
        .filter(|_| base_url.chars().count() >= 2)
        .ok_or_else(|| NexusError::validation("Please enter a valid Supabase host"))?;

    let database = build_postgres_connection_string(&PostgresParams {
        url: strip_http_scheme(base_url),
        port: Some(5432),
        database: "postgres",
        ..Default::default()
    });

    Ok(vec![
        (StackComponent::Postgres, database),
        (StackComponent::RestApi, endpoints.rest_api_endpoint),
        (StackComponent::Auth, endpoints.auth_health_endpoint),
        (StackComponent::Storage, endpoints.storage_endpoint),
        (StackComponent::Functions, endpoints.functions_endpoint),
    ])
}

/// Validate each endpoint, then draw a simulated status for the valid ones.
pub fn simulate_stack<R: Rng>(
    base_url: &str,
    targets: Vec<(StackComponent, String)>,
    rng: &mut R,
) -> StackReport {
    let mut summary = StackSummary::default();
    let results: Vec<EndpointResult> = targets
        .into_iter()
        .map(|(component, endpoint)| {
            let validation = component.validate(&endpoint);
            let (status, message, details) = if validation.is_valid {
                let (status, message, details) = component.draw(rng);
                (status, message.to_string(), details.to_string())
            } else {
                (EndpointStatus::Error, validation.message, String::new())
            };
            match status {
                EndpointStatus::Success => summary.success += 1,
                EndpointStatus::Warning => summary.warning += 1,
                EndpointStatus::Error => summary.error += 1,
            }
            EndpointResult { name: component.name(), endpoint, status, message, details }
        })
        .collect();

    StackReport { base_url: base_url.trim().to_string(), results, summary }
}

pub async fn run_stack_check(base_url: &str, delay: Duration) -> Result<StackReport> {
    let targets = stack_targets(base_url)?;
    info!(base_url, endpoints = targets.len(), "checking service stack");
    tokio::time::sleep(delay).await;

    let report = simulate_stack(base_url, targets, &mut rand::rng());
    info!(
        success = report.summary.success,
        warning = report.summary.warning,
        error = report.summary.error,
        "stack check finished"
    );
    Ok(report)
}
