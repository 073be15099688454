//! Remote-store abstraction.
//!
//! One durable collection per entity type, every row tenant-tagged and
//! carrying a creation timestamp. The trait is the full surface the core
//! consumes: tenant-filtered select plus row-level insert/update/delete.
//! Backends must not be assumed transactional across rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::{CoreError, WriteFailureKind};

pub mod memory;

pub use memory::InMemoryCollection;

/// A row stored in a tenant-scoped remote collection.
pub trait TenantRecord: Clone + PartialEq + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn tenant_id(&self) -> Uuid;
    fn set_tenant_id(&mut self, tenant_id: Uuid);
    fn created_at(&self) -> DateTime<Utc>;
}

/// Failures surfaced by a remote collection backend.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Backend unreachable. Maps to [`CoreError::Configuration`].
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write.
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    /// The backend rejected the write for any other reason.
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(detail) => CoreError::Configuration(detail),
            StoreError::UniqueViolation(detail) => CoreError::RemoteWrite {
                kind: WriteFailureKind::UniqueViolation,
                detail,
            },
            StoreError::Rejected(detail) => CoreError::RemoteWrite {
                kind: WriteFailureKind::Rejected,
                detail,
            },
        }
    }
}

/// A durable, tenant-partitioned collection of `T` rows.
#[async_trait]
pub trait RemoteCollection<T: TenantRecord>: Send + Sync {
    /// All rows belonging to `tenant_id`, in insertion order where the
    /// backend has one. Rows of other tenants are never returned.
    async fn select(&self, tenant_id: Uuid) -> Result<Vec<T>, StoreError>;

    async fn insert(&self, row: T) -> Result<(), StoreError>;

    /// Full-row rewrite keyed by the row id.
    async fn update(&self, row: T) -> Result<(), StoreError>;

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<(), StoreError>;
}
