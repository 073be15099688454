//! Active-tenant resolution.
//!
//! The auth/session collaborator supplies the tenant id behind this trait.
//! Resolution failure aborts every write path; read-only reloads are still
//! possible with an explicitly supplied tenant.

use uuid::Uuid;

use crate::errors::CoreError;

pub trait TenantContext: Send + Sync {
    /// The tenant every read and write of the current caller is scoped to.
    fn tenant_id(&self) -> Result<Uuid, CoreError>;
}

/// Context pinned to one tenant. Used by tests and single-tenant embedding.
pub struct FixedTenant(pub Uuid);

impl TenantContext for FixedTenant {
    fn tenant_id(&self) -> Result<Uuid, CoreError> {
        Ok(self.0)
    }
}

/// Context with no resolvable tenant. Every write path hitting it gets a
/// [`CoreError::TenantResolution`].
pub struct NoTenant;

impl TenantContext for NoTenant {
    fn tenant_id(&self) -> Result<Uuid, CoreError> {
        Err(CoreError::TenantResolution(
            "no active tenant in session".into(),
        ))
    }
}
