use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::TenantRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryNoteStatus {
    Created,
    Archived,
}

/// Delivery document tied to a work order. Rendering is a collaborator's
/// concern; the core only tracks the archive cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryNote {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub note_number: String,
    pub work_order_id: Uuid,
    pub status: DeliveryNoteStatus,
    pub created_at: DateTime<Utc>,
}

impl TenantRecord for DeliveryNote {
    fn id(&self) -> Uuid {
        self.id
    }
    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }
    fn set_tenant_id(&mut self, tenant_id: Uuid) {
        self.tenant_id = tenant_id;
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
