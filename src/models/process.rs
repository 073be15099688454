use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::TenantRecord;

/// How a process's unit price scales into a line amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceType {
    SquareMeter,
    LinearMeter,
    Piece,
    Hour,
}

/// One pricing tier: the unit price that applies at a given glass thickness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThicknessTier {
    pub thickness_mm: Decimal,
    pub price: Decimal,
}

/// A workshop process (cutting, edging, tempering...).
///
/// A process either prices flat via `base_price` or via `thickness_tiers`,
/// never both: a tiered process has no valid flat fallback, so resolving it
/// without a thickness yields zero. Processes flagged `is_default` are
/// pre-bundled into the product's base price and contribute nothing when
/// they appear as steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub price_type: PriceType,
    pub base_price: Decimal,
    /// Ordered by ascending thickness.
    pub thickness_tiers: Vec<ThicknessTier>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl TenantRecord for Process {
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
