//! In-process collection backend.
//!
//! Default backend for tests and single-node deployments. Rows live in a
//! dashmap keyed by id; tenant filtering happens on select. Uniqueness is
//! enforced on the row id at insert. Tests can inject a failure that the
//! next write operation returns, to exercise the syncer's rollback path.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{RemoteCollection, StoreError, TenantRecord};

pub struct InMemoryCollection<T> {
    name: &'static str,
    rows: DashMap<Uuid, T>,
    injected_failure: Mutex<Option<StoreError>>,
}

impl<T: TenantRecord> InMemoryCollection<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: DashMap::new(),
            injected_failure: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Seed a row directly, bypassing the syncer. Test setup only.
    pub fn seed(&self, row: T) {
        self.rows.insert(row.id(), row);
    }

    /// Arrange for the next write (insert/update/delete) to fail with `err`.
    pub fn fail_next_write(&self, err: StoreError) {
        *self.injected_failure.lock().unwrap() = Some(err);
    }

    fn take_injected_failure(&self) -> Option<StoreError> {
        self.injected_failure.lock().unwrap().take()
    }
}

#[async_trait]
impl<T: TenantRecord> RemoteCollection<T> for InMemoryCollection<T> {
    async fn select(&self, tenant_id: Uuid) -> Result<Vec<T>, StoreError> {
        let mut rows: Vec<T> = self
            .rows
            .iter()
            .filter(|entry| entry.value().tenant_id() == tenant_id)
            .map(|entry| entry.value().clone())
            .collect();
        // Dashmap iteration order is arbitrary; creation order is the
        // closest thing to a backend insertion order.
        rows.sort_by_key(|row| (row.created_at(), row.id()));
        Ok(rows)
    }

    async fn insert(&self, row: T) -> Result<(), StoreError> {
        if let Some(err) = self.take_injected_failure() {
            return Err(err);
        }
        if self.rows.contains_key(&row.id()) {
            return Err(StoreError::UniqueViolation(format!(
                "{}: row {} already exists",
                self.name,
                row.id()
            )));
        }
        self.rows.insert(row.id(), row);
        Ok(())
    }

    async fn update(&self, row: T) -> Result<(), StoreError> {
        if let Some(err) = self.take_injected_failure() {
            return Err(err);
        }
        if !self.rows.contains_key(&row.id()) {
            return Err(StoreError::Rejected(format!(
                "{}: row {} does not exist",
                self.name,
                row.id()
            )));
        }
        self.rows.insert(row.id(), row);
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        if let Some(err) = self.take_injected_failure() {
            return Err(err);
        }
        // Delete is scoped to the tenant: a matching id under another
        // tenant is left untouched.
        let belongs = self
            .rows
            .get(&id)
            .map(|row| row.tenant_id() == tenant_id)
            .unwrap_or(false);
        if belongs {
            self.rows.remove(&id);
        }
        Ok(())
    }
}
