use crate::models::{Service, ServiceKind, ServiceStatus};

/// Dashboard-style filter over a service list. Unset criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    /// Case-insensitive substring of the name or url.
    pub search: Option<String>,
    pub kind: Option<ServiceKind>,
    pub status: Option<ServiceStatus>,
}

impl ServiceFilter {
    pub fn matches(&self, service: &Service) -> bool {
        let matches_search = match self.search.as_deref() {
            None | Some("") => true,
            Some(query) => {
                let query = query.to_lowercase();
                service.name.to_lowercase().contains(&query)
                    || service.url.to_lowercase().contains(&query)
            }
        };
        let matches_kind = self.kind.as_ref().is_none_or(|k| *k == service.kind);
        let matches_status = self.status.is_none_or(|s| s == service.status);

        matches_search && matches_kind && matches_status
    }
}

pub fn filter_services(services: &[Service], filter: &ServiceFilter) -> Vec<Service> {
    services
        .iter()
        .filter(|s| filter.matches(s))
        .cloned()
        .collect()
}

/// Kinds present in the list, in first-seen order.
pub fn distinct_kinds(services: &[Service]) -> Vec<ServiceKind> {
    let mut kinds: Vec<ServiceKind> = Vec::new();
    for svc in services {
        if !kinds.contains(&svc.kind) {
            kinds.push(svc.kind.clone());
        }
    }
    kinds
}

/// Statuses present in the list, in first-seen order.
pub fn distinct_statuses(services: &[Service]) -> Vec<ServiceStatus> {
    let mut statuses = Vec::new();
    for svc in services {
        if !statuses.contains(&svc.status) {
            statuses.push(svc.status);
        }
    }
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceDraft;
    use chrono::Utc;

    fn fixture() -> Vec<Service> {
        let now = Utc::now();
        let mut out = Vec::new();
        for (i, (name, kind, url, status)) in [
            ("Orders DB", "PostgreSQL", "orders.db.local", ServiceStatus::Active),
            ("Billing API", "API", "https://billing.example.com", ServiceStatus::Inactive),
            ("Auth", "Auth Service", "https://ORDERS.example.com/auth/v1", ServiceStatus::Active),
        ]
        .into_iter()
        .enumerate()
        {
            let mut draft = ServiceDraft::new(name, ServiceKind::from(kind), url);
            draft.status = status;
            out.push(Service::from_draft(draft, format!("id-{}", i), now));
        }
        out
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let services = fixture();
        assert_eq!(filter_services(&services, &ServiceFilter::default()).len(), 3);
    }

    #[test]
    fn search_matches_name_or_url_ignoring_case() {
        let services = fixture();
        let filter = ServiceFilter {
            search: Some("orders".into()),
            ..Default::default()
        };
        let names: Vec<_> = filter_services(&services, &filter)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Orders DB", "Auth"]);
    }

    #[test]
    fn kind_and_status_must_both_match() {
        let services = fixture();
        let filter = ServiceFilter {
            search: None,
            kind: Some(ServiceKind::AuthService),
            status: Some(ServiceStatus::Active),
        };
        let hits = filter_services(&services, &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "id-2");

        let none = ServiceFilter {
            kind: Some(ServiceKind::Api),
            status: Some(ServiceStatus::Active),
            ..Default::default()
        };
        assert!(filter_services(&services, &none).is_empty());
    }

    #[test]
    fn distinct_values_keep_first_seen_order() {
        let services = fixture();
        assert_eq!(
            distinct_kinds(&services),
            vec![ServiceKind::Postgres, ServiceKind::Api, ServiceKind::AuthService]
        );
        assert_eq!(
            distinct_statuses(&services),
            vec![ServiceStatus::Active, ServiceStatus::Inactive]
        );
    }
}
