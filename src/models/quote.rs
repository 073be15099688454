use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::TenantRecord;
use crate::models::line_item::LineItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuoteStatus {
    Created,
    Accepted,
    Rejected,
    Expired,
    Converted,
    Archived,
}

impl QuoteStatus {
    /// Transition table for quotes. Data-dependent guards (expiry, the
    /// converted-order link, reopen confirmation) are checked by the quote
    /// service on top of this.
    pub fn can_transition(self, to: QuoteStatus) -> bool {
        use QuoteStatus::*;
        match (self, to) {
            (Created, Accepted) => true,
            (Created, Rejected) => true,
            (Created, Expired) => true,
            (Created, Converted) => true,
            // Reopen: destructive, deletes the linked draft order.
            (Converted, Created) => true,
            // Archive is allowed from any status, including archived
            // (idempotent no-op at the service level).
            (_, Archived) => true,
            _ => false,
        }
    }
}

/// Recomputed from items on every totals-affecting path; never edited
/// independently. `grand_total = (product + process) × (1 + vat_rate/100)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub product_amount: Decimal,
    pub process_amount: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub grand_total: Decimal,
}

impl QuoteTotals {
    pub fn zero(vat_rate: Decimal) -> Self {
        Self {
            product_amount: Decimal::ZERO,
            process_amount: Decimal::ZERO,
            vat_rate,
            vat_amount: Decimal::ZERO,
            grand_total: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: String,
    pub advance_paid: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub quote_number: String,
    pub client_id: Uuid,
    pub items: Vec<LineItem>,
    pub status: QuoteStatus,
    pub valid_until: DateTime<Utc>,
    /// Set exactly while status is `Converted`; at most one linked order.
    pub converted_to_work_order_id: Option<Uuid>,
    pub totals: QuoteTotals,
    pub payment_info: Option<PaymentInfo>,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until < now
    }

    /// Status as a reader should see it: a stored `Created` past its
    /// validity date reads as `Expired` without requiring a stored
    /// transition on every path.
    pub fn effective_status(&self, now: DateTime<Utc>) -> QuoteStatus {
        if self.status == QuoteStatus::Created && self.is_expired(now) {
            QuoteStatus::Expired
        } else {
            self.status
        }
    }

    /// Items are editable only while the quote sits in `Created` (reopen
    /// puts a converted quote back there).
    pub fn items_editable(&self) -> bool {
        self.status == QuoteStatus::Created
    }
}

impl TenantRecord for Quote {
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
