use clap::{Args, Subcommand};
use nexus_core::{
    build_postgres_connection_string, build_supabase_endpoints, distinct_kinds, distinct_statuses,
    validate_draft, validate_service, Service, ServiceDraft, ServiceFilter, ServiceKind,
    ServicePatch, ServiceStatus, ServiceStorage, SslMode,
};
use nexus_errors::{NexusError, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use crate::check::{run_check, run_stack_check};

const MASK: &str = "********";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List services, optionally filtered
    List {
        /// Case-insensitive match on name or url
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        kind: Option<ServiceKind>,
        #[arg(long)]
        status: Option<ServiceStatus>,
    },
    /// Show one service
    Show { id: String },
    /// Register a new service
    Add(AddArgs),
    /// Change fields of a service
    Update {
        id: String,
        #[command(flatten)]
        fields: UpdateArgs,
    },
    /// Remove a service permanently
    Delete { id: String },
    /// Check that a service has enough detail to connect
    Validate { id: String },
    /// Run a simulated connectivity check and record the test time
    Check { id: String },
    /// Derive Supabase sub-service endpoints from a base URL
    Endpoints { base_url: String },
    /// Run a simulated check of every endpoint in a Supabase-style stack
    StackCheck { base_url: String },
    /// Service kinds offered for registration and kinds/statuses in use
    Kinds,
}

#[derive(Args, Debug, Default)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long = "type", default_value = "PostgreSQL")]
    pub kind: ServiceKind,
    /// Hostname for PostgreSQL, full URL otherwise
    #[arg(long)]
    pub url: String,
    #[arg(long)]
    pub connection_string: Option<String>,
    /// Fill the connection string from the individual PostgreSQL fields
    #[arg(long, conflicts_with = "connection_string")]
    pub build_connection_string: bool,
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long, default_value = "Inactive")]
    pub status: ServiceStatus,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub database: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub ssl_mode: Option<SslMode>,
}

impl AddArgs {
    fn into_draft(self) -> ServiceDraft {
        let mut draft = ServiceDraft {
            name: self.name,
            kind: self.kind,
            url: self.url,
            connection_string: self.connection_string,
            api_key: self.api_key,
            username: self.username,
            password: self.password,
            status: self.status,
            notes: self.notes,
            last_tested: None,
            database: self.database,
            port: self.port,
            ssl_mode: self.ssl_mode,
        };
        if self.build_connection_string && draft.kind.is_postgres() {
            let built = build_postgres_connection_string(&draft.postgres_params());
            draft.connection_string = Some(built).filter(|s| !s.is_empty());
        }
        draft
    }
}

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "type")]
    pub kind: Option<ServiceKind>,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub status: Option<ServiceStatus>,
    #[arg(long)]
    pub connection_string: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub database: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub ssl_mode: Option<SslMode>,
    /// Clear an optional field (repeatable), e.g. `--clear password`
    #[arg(long, value_name = "FIELD")]
    pub clear: Vec<String>,
}

impl UpdateArgs {
    fn into_patch(self) -> Result<ServicePatch> {
        let mut patch = ServicePatch {
            name: self.name,
            kind: self.kind,
            url: self.url,
            status: self.status,
            connection_string: self.connection_string.map(Some),
            api_key: self.api_key.map(Some),
            username: self.username.map(Some),
            password: self.password.map(Some),
            notes: self.notes.map(Some),
            last_tested: None,
            database: self.database.map(Some),
            port: self.port.map(Some),
            ssl_mode: self.ssl_mode.map(Some),
        };
        for field in &self.clear {
            match field.as_str() {
                "connection-string" | "connectionString" => patch.connection_string = Some(None),
                "api-key" | "apiKey" => patch.api_key = Some(None),
                "username" => patch.username = Some(None),
                "password" => patch.password = Some(None),
                "notes" => patch.notes = Some(None),
                "last-tested" | "lastTested" => patch.last_tested = Some(None),
                "database" => patch.database = Some(None),
                "port" => patch.port = Some(None),
                "ssl-mode" | "sslMode" => patch.ssl_mode = Some(None),
                other => {
                    return Err(NexusError::validation(format!(
                        "`{}` cannot be cleared (name, type, url and status are required)",
                        other
                    )));
                }
            }
        }
        Ok(patch)
    }
}

/// Hide secrets unless asked to reveal them.
fn present(service: Service, reveal: bool) -> Service {
    if reveal {
        return service;
    }
    Service {
        api_key: service.api_key.map(|_| MASK.to_string()),
        password: service.password.map(|_| MASK.to_string()),
        ..service
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

pub async fn execute(
    command: Command,
    storage: &ServiceStorage,
    check_delay: Duration,
    reveal: bool,
) -> Result<Value> {
    match command {
        Command::List { search, kind, status } => {
            let filter = ServiceFilter { search, kind, status };
            let services: Vec<Service> = storage
                .search(&filter)
                .into_iter()
                .map(|s| present(s, reveal))
                .collect();
            to_value(&services)
        }
        Command::Show { id } => {
            let service = storage.get_by_id(&id).ok_or_else(|| NexusError::not_found(&id))?;
            to_value(&present(service, reveal))
        }
        Command::Add(args) => {
            let draft = validate_draft(args.into_draft())?;
            let created = storage.create(draft)?;
            info!(id = %created.id, "service registered");
            to_value(&present(created, reveal))
        }
        Command::Update { id, fields } => {
            let current = storage.get_by_id(&id).ok_or_else(|| NexusError::not_found(&id))?;
            let mut patch = fields.into_patch()?;

            let mut prospective = current.clone();
            patch.clone().apply_to(&mut prospective);
            let checked = validate_draft(prospective.to_draft())?;
            if checked.connection_string != prospective.connection_string {
                patch.connection_string = Some(checked.connection_string);
            }

            let updated = storage
                .update(&id, patch)?
                .ok_or_else(|| NexusError::not_found(&id))?;
            to_value(&present(updated, reveal))
        }
        Command::Delete { id } => {
            if !storage.delete(&id)? {
                return Err(NexusError::not_found(&id));
            }
            Ok(json!({ "deleted": id }))
        }
        Command::Validate { id } => {
            let service = storage.get_by_id(&id).ok_or_else(|| NexusError::not_found(&id))?;
            to_value(&validate_service(&service))
        }
        Command::Check { id } => {
            let mut report = run_check(storage, &id, check_delay).await?;
            report.service = present(report.service, reveal);
            to_value(&report)
        }
        Command::Endpoints { base_url } => match build_supabase_endpoints(&base_url) {
            Some(endpoints) => to_value(&endpoints),
            None => Err(NexusError::validation("Base URL is empty")),
        },
        Command::StackCheck { base_url } => {
            to_value(&run_stack_check(&base_url, check_delay).await?)
        }
        Command::Kinds => {
            let services = storage.list();
            let in_use: Vec<String> =
                distinct_kinds(&services).into_iter().map(String::from).collect();
            Ok(json!({
                "selectable": ServiceKind::SELECTABLE,
                "inUse": in_use,
                "statusesInUse": distinct_statuses(&services),
            }))
        }
    }
}
