use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::query::{filter_services, ServiceFilter};
use crate::models::{Service, ServiceDraft, ServicePatch};
use nexus_errors::{NexusError, Result};
use nexus_memory::KvStore;
use nexus_utils::{Clock, IdGenerator, SystemClock, UuidGenerator};

/// Key the whole collection is stored under.
pub const DEFAULT_COLLECTION_KEY: &str = "service-nexus-services";

const ID_ATTEMPTS: usize = 8;

/// One element of the stored array. Elements that do not decode as a
/// [`Service`] are hidden from readers but written back untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Entry {
    Known(Service),
    Unreadable(Value),
}

impl Entry {
    fn decode(raw: Value, key: &str, position: usize) -> Self {
        match serde_json::from_value::<Service>(raw.clone()) {
            Ok(service) => Entry::Known(service),
            Err(e) => {
                warn!(key, position, error = %e, "skipping unreadable service record");
                Entry::Unreadable(raw)
            }
        }
    }

    fn id(&self) -> Option<&str> {
        match self {
            Entry::Known(service) => Some(&service.id),
            Entry::Unreadable(raw) => raw.get("id").and_then(Value::as_str),
        }
    }

    fn known_mut(&mut self) -> Option<&mut Service> {
        match self {
            Entry::Known(service) => Some(service),
            Entry::Unreadable(_) => None,
        }
    }
}

/// CRUD over the service collection.
///
/// The collection lives as one JSON array under a single key. Every mutation
/// reads the whole array, changes it and writes the whole array back. A
/// handle serializes its own mutations; separate handles over the same store
/// do not coordinate and the last full write wins.
pub struct ServiceStorage {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    key: String,
    write_lock: Mutex<()>,
}

impl ServiceStorage {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_collaborators(store, Arc::new(SystemClock), Arc::new(UuidGenerator))
    }

    pub fn with_collaborators(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            key: DEFAULT_COLLECTION_KEY.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_collection_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn collection_key(&self) -> &str {
        &self.key
    }

    // Missing, unreadable or non-array data reads as no entries.
    fn read_entries(&self) -> Vec<Entry> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(
                    key = %self.key,
                    error = %e,
                    "service collection unreadable, treating as empty"
                );
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(values) => values
                .into_iter()
                .enumerate()
                .map(|(position, value)| Entry::decode(value, &self.key, position))
                .collect(),
            Err(e) => {
                warn!(
                    key = %self.key,
                    error = %e,
                    "service collection malformed, treating as empty"
                );
                Vec::new()
            }
        }
    }

    fn write_entries(&self, entries: &[Entry]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.store.set(&self.key, &json)?;
        debug!(
            key = %self.key,
            count = entries.len(),
            bytes = json.len(),
            "service collection written"
        );
        Ok(())
    }

    /// Read the full collection. Missing or malformed data reads as empty;
    /// individual records that fail to decode are skipped.
    pub fn load_collection(&self) -> Vec<Service> {
        self.read_entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Known(service) => Some(service),
                Entry::Unreadable(_) => None,
            })
            .collect()
    }

    /// Replace the full collection.
    pub fn persist_collection(&self, services: &[Service]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let entries: Vec<Entry> = services.iter().cloned().map(Entry::Known).collect();
        self.write_entries(&entries)
    }

    pub fn list(&self) -> Vec<Service> {
        self.load_collection()
    }

    pub fn search(&self, filter: &ServiceFilter) -> Vec<Service> {
        filter_services(&self.load_collection(), filter)
    }

    pub fn get_by_id(&self, id: &str) -> Option<Service> {
        self.load_collection().into_iter().find(|s| s.id == id)
    }

    pub fn create(&self, draft: ServiceDraft) -> Result<Service> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries();

        let id = self.allocate_id(&entries)?;
        let service = Service::from_draft(draft, id, self.clock.now());

        entries.push(Entry::Known(service.clone()));
        self.write_entries(&entries)?;
        debug!(id = %service.id, name = %service.name, "service created");
        Ok(service)
    }

    fn allocate_id(&self, entries: &[Entry]) -> Result<String> {
        for _ in 0..ID_ATTEMPTS {
            let id = self.ids.next_id();
            if !entries.iter().any(|e| e.id() == Some(id.as_str())) {
                return Ok(id);
            }
        }
        Err(NexusError::IdExhausted(ID_ATTEMPTS))
    }

    /// Merge `patch` onto the record. `Ok(None)` when no record has that id.
    pub fn update(&self, id: &str, patch: ServicePatch) -> Result<Option<Service>> {
        let now = self.clock.now();
        self.update_at(id, patch, now)
    }

    fn update_at(
        &self,
        id: &str,
        patch: ServicePatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Service>> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries();

        let Some(service) = entries
            .iter_mut()
            .filter_map(Entry::known_mut)
            .find(|s| s.id == id)
        else {
            return Ok(None);
        };
        patch.apply_to(service);
        service.updated_at = next_timestamp(service.updated_at, now);
        let updated = service.clone();

        self.write_entries(&entries)?;
        debug!(id = %updated.id, "service updated");
        Ok(Some(updated))
    }

    /// Remove the record, readable or not. `Ok(false)` and no write when it
    /// was not there.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let entries = self.read_entries();
        let before = entries.len();

        let remaining: Vec<Entry> = entries.into_iter().filter(|e| e.id() != Some(id)).collect();
        if remaining.len() == before {
            return Ok(false);
        }

        self.write_entries(&remaining)?;
        debug!(id, "service deleted");
        Ok(true)
    }

    /// Stamp `lastTested` with the current time.
    pub fn record_test(&self, id: &str) -> Result<Option<Service>> {
        let now = self.clock.now();
        let patch = ServicePatch {
            last_tested: Some(Some(now)),
            ..Default::default()
        };
        self.update_at(id, patch, now)
    }
}

// Keeps updatedAt strictly increasing even if the clock stalls or steps back.
fn next_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
