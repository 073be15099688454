//! Inventory movements.
//!
//! Every change to a cached item quantity goes through [`record_movement`]:
//! one full-item rewrite plus one appended ledger row, both through the
//! collection syncer. The ledger is the source of truth the cache is
//! audited against.
//!
//! [`record_movement`]: InventoryService::record_movement

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::events::{Event, EventSender};
use crate::models::{InventoryItem, StockTransaction, StockTransactionType};
use crate::sync::CollectionSyncer;
use crate::tenant::TenantContext;

#[derive(Clone)]
pub struct InventoryService {
    ctx: Arc<dyn TenantContext>,
    items: Arc<CollectionSyncer<InventoryItem>>,
    ledger: Arc<CollectionSyncer<StockTransaction>>,
    events: Option<EventSender>,
}

impl InventoryService {
    pub fn new(
        ctx: Arc<dyn TenantContext>,
        items: Arc<CollectionSyncer<InventoryItem>>,
        ledger: Arc<CollectionSyncer<StockTransaction>>,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            ctx,
            items,
            ledger,
            events,
        }
    }

    /// Manual stock correction: `delta` may be negative.
    #[instrument(skip(self, notes))]
    pub async fn adjust_quantity(
        &self,
        item_id: Uuid,
        delta: Decimal,
        notes: Option<String>,
    ) -> Result<InventoryItem, CoreError> {
        let item = self
            .record_movement(item_id, StockTransactionType::Adjustment, delta, None, notes)
            .await?;
        if let Some(events) = &self.events {
            events.emit(Event::InventoryAdjusted {
                inventory_item_id: item.id,
                previous_quantity: item.quantity - delta,
                new_quantity: item.quantity,
            });
        }
        Ok(item)
    }

    /// Goods received: quantity goes up, one `in` ledger row.
    #[instrument(skip(self, notes))]
    pub async fn receive(
        &self,
        item_id: Uuid,
        quantity: Decimal,
        notes: Option<String>,
    ) -> Result<InventoryItem, CoreError> {
        if quantity <= Decimal::ZERO {
            return Err(CoreError::Validation(
                "received quantity must be positive".into(),
            ));
        }
        self.record_movement(item_id, StockTransactionType::In, quantity, None, notes)
            .await
    }

    /// Apply one stock movement: rewrite the cached item quantity and append
    /// the matching ledger row. `in`/`return` add, `out` subtracts,
    /// `adjustment` applies the signed quantity as-is.
    ///
    /// Going negative is permitted (the workshop can cut glass it has not
    /// booked in yet) but logged, and a low-stock event fires when the new
    /// quantity sits below the item's minimum.
    #[instrument(skip(self, notes), fields(kind = %kind))]
    pub async fn record_movement(
        &self,
        item_id: Uuid,
        kind: StockTransactionType,
        quantity: Decimal,
        work_order: Option<(Uuid, &str)>,
        notes: Option<String>,
    ) -> Result<InventoryItem, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut items = self.items.load(tenant_id).await?;
        let item = items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| CoreError::not_found("inventory item", item_id))?;

        let previous = item.quantity;
        let new_quantity = match kind {
            StockTransactionType::In | StockTransactionType::Return => previous + quantity,
            StockTransactionType::Out => previous - quantity,
            StockTransactionType::Adjustment => previous + quantity,
        };
        if new_quantity < Decimal::ZERO {
            warn!(%item_id, %previous, %new_quantity, "inventory quantity went negative");
        }
        item.quantity = new_quantity;
        let updated = item.clone();

        let mut transaction = StockTransaction::new(
            tenant_id,
            item_id,
            kind,
            quantity,
            previous,
            new_quantity,
        );
        if let Some((order_id, order_number)) = work_order {
            transaction = transaction
                .for_work_order(order_id)
                .with_notes(notes.unwrap_or_else(|| order_number.to_string()));
        } else if let Some(notes) = notes {
            transaction = transaction.with_notes(notes);
        }

        // Ledger first: if the movement lands only halfway, the half that
        // exists is the audit row, and the cached quantity still matches
        // the rows that preceded it.
        self.ledger.append(tenant_id, vec![transaction]).await?;
        self.items.reconcile(tenant_id, items).await?;

        if updated.is_below_minimum() {
            if let Some(events) = &self.events {
                events.emit(Event::LowStockDetected {
                    inventory_item_id: updated.id,
                    quantity: updated.quantity,
                    min_quantity: updated.min_quantity,
                });
            }
        }

        Ok(updated)
    }

    /// Ledger rows for one item, oldest first.
    pub async fn item_history(&self, item_id: Uuid) -> Result<Vec<StockTransaction>, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let ledger = self.ledger.load(tenant_id).await?;
        Ok(ledger
            .into_iter()
            .filter(|txn| txn.inventory_item_id == item_id)
            .collect())
    }
}
