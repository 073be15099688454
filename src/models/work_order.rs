use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::TenantRecord;
use crate::models::line_item::LineItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkOrderStatus {
    Draft,
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Archived,
}

impl WorkOrderStatus {
    /// Transition table for work orders. Inventory side effects (issue
    /// deduction, archive restoration) are owned by the work-order service.
    pub fn can_transition(self, to: WorkOrderStatus) -> bool {
        use WorkOrderStatus::*;
        match (self, to) {
            // Issue: the only exits from draft besides cancel/archive.
            (Draft, Pending) => true,
            (Draft, InProgress) => true,
            (Pending, InProgress) => true,
            (Pending, Completed) => true,
            (InProgress, Completed) => true,
            // Anything not yet archived can be cancelled or archived.
            (Archived, Cancelled) => false,
            (_, Cancelled) => true,
            (Archived, Archived) => false,
            (_, Archived) => true,
            _ => false,
        }
    }

    /// True once the order has left draft, meaning its issue-time inventory
    /// deductions exist and archive must compensate them.
    pub fn is_issued(self) -> bool {
        !matches!(self, WorkOrderStatus::Draft)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_number: String,
    /// Source quote when this order came from a conversion.
    pub quote_id: Option<Uuid>,
    pub status: WorkOrderStatus,
    pub items: Vec<LineItem>,
    /// Grand total of the source quote at conversion time, frozen.
    pub original_quote_total: Decimal,
    pub current_total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl WorkOrder {
    /// Quantity and material edits are allowed only before issue.
    pub fn items_editable(&self) -> bool {
        self.status == WorkOrderStatus::Draft
    }
}

impl TenantRecord for WorkOrder {
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
