use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::TenantRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemKind {
    Glass,
    Other,
}

/// A stocked material or product.
///
/// `quantity` is a cache: it must always equal the initial quantity plus the
/// sum of ledger deltas for this item. Every mutation of it goes through a
/// service that also appends the matching [`StockTransaction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub code: String,
    pub quantity: Decimal,
    pub min_quantity: Decimal,
    pub unit: String,
    pub price: Decimal,
    pub kind: ItemKind,
    /// Millimeters; present only for glass items.
    pub glass_thickness_mm: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.min_quantity
    }
}

impl TenantRecord for InventoryItem {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StockTransactionType {
    In,
    Out,
    Adjustment,
    Return,
}

/// Append-only inventory ledger row. Never updated or deleted; the cached
/// item quantity is derived from these deltas and audited against them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub inventory_item_id: Uuid,
    pub kind: StockTransactionType,
    /// Magnitude for in/out/return movements; signed delta for adjustments.
    pub quantity: Decimal,
    pub previous_quantity: Decimal,
    pub new_quantity: Decimal,
    /// Issuing or archiving work order, when the movement came from one.
    pub work_order_id: Option<Uuid>,
    /// Human-readable context for operators (order number, reason).
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    pub fn new(
        tenant_id: Uuid,
        inventory_item_id: Uuid,
        kind: StockTransactionType,
        quantity: Decimal,
        previous_quantity: Decimal,
        new_quantity: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            inventory_item_id,
            kind,
            quantity,
            previous_quantity,
            new_quantity,
            work_order_id: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_work_order(mut self, work_order_id: Uuid) -> Self {
        self.work_order_id = Some(work_order_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl TenantRecord for StockTransaction {
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

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // Remote stores and collaborators exchange these rows as JSON; the
    // enum tags on the wire are the snake_case strings.
    #[test]
    fn ledger_row_wire_format_is_snake_case_json() {
        let txn = StockTransaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            StockTransactionType::Out,
            dec!(6),
            dec!(20),
            dec!(14),
        )
        .for_work_order(Uuid::new_v4())
        .with_notes("Issued for WO-0001");

        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["kind"], "out");
        assert_eq!(json["quantity"], "6");
        assert_eq!(json["notes"], "Issued for WO-0001");

        let back: StockTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, txn);
    }

    #[test]
    fn items_below_minimum_are_flagged() {
        let mut item = InventoryItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "float 4mm".into(),
            code: "GL-4".into(),
            quantity: dec!(10),
            min_quantity: dec!(5),
            unit: "m2".into(),
            price: dec!(12),
            kind: ItemKind::Glass,
            glass_thickness_mm: Some(dec!(4)),
            created_at: Utc::now(),
        };
        assert!(!item.is_below_minimum());
        item.quantity = dec!(4);
        assert!(item.is_below_minimum());
    }
}
