//! Work-order lifecycle.
//!
//! Inventory effects happen at exactly two points: issue (draft leaves the
//! drawer, materials are deducted with `out` ledger rows) and archive of a
//! non-draft order (the restoration pass books everything back with
//! `return` rows). All side effects go through the collection syncers;
//! there is no cross-record transaction, so orderings below matter.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::events::{Event, EventSender};
use crate::models::{
    DeliveryNote, DeliveryNoteStatus, LineItem, Quote, QuoteStatus, StockTransaction,
    StockTransactionType, WorkOrder, WorkOrderStatus,
};
use crate::services::inventory::InventoryService;
use crate::services::numbering::next_document_number;
use crate::sync::CollectionSyncer;
use crate::tenant::TenantContext;

/// What an archive pass did besides the anchor write. Cascade failures are
/// surfaced here, not as errors: they never roll back the archive itself.
#[derive(Debug, Default)]
pub struct ArchiveOutcome {
    pub restored_items: usize,
    pub cascade_failures: Vec<String>,
}

#[derive(Clone)]
pub struct WorkOrderService {
    ctx: Arc<dyn TenantContext>,
    orders: Arc<CollectionSyncer<WorkOrder>>,
    quotes: Arc<CollectionSyncer<Quote>>,
    delivery_notes: Arc<CollectionSyncer<DeliveryNote>>,
    ledger: Arc<CollectionSyncer<StockTransaction>>,
    inventory: InventoryService,
    events: Option<EventSender>,
}

impl WorkOrderService {
    pub fn new(
        ctx: Arc<dyn TenantContext>,
        orders: Arc<CollectionSyncer<WorkOrder>>,
        quotes: Arc<CollectionSyncer<Quote>>,
        delivery_notes: Arc<CollectionSyncer<DeliveryNote>>,
        ledger: Arc<CollectionSyncer<StockTransaction>>,
        inventory: InventoryService,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            ctx,
            orders,
            quotes,
            delivery_notes,
            ledger,
            inventory,
            events,
        }
    }

    /// Manual draft order, outside the quote conversion path. No inventory
    /// effect until issue.
    #[instrument(skip(self, items))]
    pub async fn create_draft(
        &self,
        items: Vec<LineItem>,
        current_total: Decimal,
    ) -> Result<WorkOrder, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut orders = self.orders.load(tenant_id).await?;
        let order_number =
            next_document_number("WO", orders.iter().map(|o| o.order_number.as_str()));
        let order = WorkOrder {
            id: Uuid::new_v4(),
            tenant_id,
            order_number,
            quote_id: None,
            status: WorkOrderStatus::Draft,
            items,
            original_quote_total: current_total,
            current_total,
            created_at: Utc::now(),
        };
        orders.push(order.clone());
        self.orders.reconcile(tenant_id, orders).await?;
        Ok(order)
    }

    /// Replace a draft order's items. Issued orders are immutable to
    /// quantity and material edits. `current_total` comes from the caller,
    /// recomputed through `pricing::document_totals` like quote totals.
    #[instrument(skip(self, items))]
    pub async fn update_draft_items(
        &self,
        order_id: Uuid,
        items: Vec<LineItem>,
        current_total: Decimal,
    ) -> Result<WorkOrder, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut orders = self.orders.load(tenant_id).await?;
        let position = orders
            .iter()
            .position(|order| order.id == order_id)
            .ok_or_else(|| CoreError::not_found("work order", order_id))?;
        if !orders[position].items_editable() {
            return Err(CoreError::GuardViolation(format!(
                "{} is {}, items are editable only while draft",
                orders[position].order_number, orders[position].status
            )));
        }
        orders[position].items = items;
        orders[position].current_total = current_total;
        let updated = orders[position].clone();
        self.orders.reconcile(tenant_id, orders).await?;
        Ok(updated)
    }

    pub async fn get(&self, order_id: Uuid) -> Result<WorkOrder, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let orders = self.orders.load(tenant_id).await?;
        orders
            .into_iter()
            .find(|order| order.id == order_id)
            .ok_or_else(|| CoreError::not_found("work order", order_id))
    }

    /// Issue a draft order into `pending` or `in_progress`: deduct every
    /// material and append one `out` ledger row per inventory item, then
    /// write the status. From here on the order is immutable to quantity
    /// and material edits.
    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        order_id: Uuid,
        target: WorkOrderStatus,
    ) -> Result<WorkOrder, CoreError> {
        if !matches!(
            target,
            WorkOrderStatus::Pending | WorkOrderStatus::InProgress
        ) {
            return Err(CoreError::GuardViolation(format!(
                "a draft order is issued into pending or in_progress, not {}",
                target
            )));
        }
        let tenant_id = self.ctx.tenant_id()?;
        let mut orders = self.orders.load(tenant_id).await?;
        let position = orders
            .iter()
            .position(|order| order.id == order_id)
            .ok_or_else(|| CoreError::not_found("work order", order_id))?;
        let order = orders[position].clone();
        if order.status != WorkOrderStatus::Draft {
            return Err(CoreError::GuardViolation(format!(
                "only draft orders can be issued, {} is {}",
                order.order_number, order.status
            )));
        }

        for (item_id, quantity) in material_demand(&order.items) {
            self.inventory
                .record_movement(
                    item_id,
                    StockTransactionType::Out,
                    quantity,
                    Some((order.id, &order.order_number)),
                    Some(format!("Issued for {}", order.order_number)),
                )
                .await?;
        }

        orders[position].status = target;
        let issued = orders[position].clone();
        self.orders.reconcile(tenant_id, orders).await?;

        if let Some(events) = &self.events {
            events.emit(Event::WorkOrderIssued {
                work_order_id: issued.id,
                order_number: issued.order_number.clone(),
            });
        }
        info!(order = %issued.order_number, status = %issued.status, "work order issued");
        Ok(issued)
    }

    #[instrument(skip(self))]
    pub async fn complete(&self, order_id: Uuid) -> Result<WorkOrder, CoreError> {
        let completed = self
            .transition(order_id, WorkOrderStatus::Completed)
            .await?;
        if let Some(events) = &self.events {
            events.emit(Event::WorkOrderCompleted {
                work_order_id: completed.id,
                order_number: completed.order_number.clone(),
                completed_at: Utc::now(),
            });
        }
        Ok(completed)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: Uuid) -> Result<WorkOrder, CoreError> {
        self.transition(order_id, WorkOrderStatus::Cancelled).await
    }

    /// Archive the order. For an issued order the restoration pass first
    /// books the order's unreturned `out` movements back: one `return` row
    /// per inventory item with the netted quantity. The archive status write is
    /// the anchor; the delivery-note and quote cascades after it are
    /// best-effort and reported in the outcome instead of failing the call.
    #[instrument(skip(self))]
    pub async fn archive(&self, order_id: Uuid) -> Result<ArchiveOutcome, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut orders = self.orders.load(tenant_id).await?;
        let position = orders
            .iter()
            .position(|order| order.id == order_id)
            .ok_or_else(|| CoreError::not_found("work order", order_id))?;
        let order = orders[position].clone();
        if !order.status.can_transition(WorkOrderStatus::Archived) {
            return Err(CoreError::GuardViolation(format!(
                "{} is already archived",
                order.order_number
            )));
        }

        let mut outcome = ArchiveOutcome::default();

        if order.status.is_issued() {
            outcome.restored_items = self.restore_issued_materials(tenant_id, &order).await?;
        }

        orders[position].status = WorkOrderStatus::Archived;
        self.orders.reconcile(tenant_id, orders).await?;

        if let Err(err) = self.archive_delivery_notes(tenant_id, order.id).await {
            warn!(order = %order.order_number, error = %err, "delivery note cascade failed");
            outcome
                .cascade_failures
                .push(format!("delivery note: {err}"));
        }
        if let Some(quote_id) = order.quote_id {
            if let Err(err) = self.archive_source_quote(tenant_id, quote_id).await {
                warn!(order = %order.order_number, error = %err, "quote cascade failed");
                outcome.cascade_failures.push(format!("quote: {err}"));
            }
        }

        if let Some(events) = &self.events {
            events.emit(Event::WorkOrderArchived {
                work_order_id: order.id,
                restored_items: outcome.restored_items,
            });
        }
        info!(
            order = %order.order_number,
            restored = outcome.restored_items,
            "work order archived"
        );
        Ok(outcome)
    }

    async fn transition(
        &self,
        order_id: Uuid,
        target: WorkOrderStatus,
    ) -> Result<WorkOrder, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut orders = self.orders.load(tenant_id).await?;
        let position = orders
            .iter()
            .position(|order| order.id == order_id)
            .ok_or_else(|| CoreError::not_found("work order", order_id))?;
        let current = orders[position].status;
        if !current.can_transition(target) {
            return Err(CoreError::GuardViolation(format!(
                "cannot move {} from {} to {}",
                orders[position].order_number, current, target
            )));
        }
        orders[position].status = target;
        let updated = orders[position].clone();
        self.orders.reconcile(tenant_id, orders).await?;
        info!(order = %updated.order_number, status = %target, "work order transitioned");
        Ok(updated)
    }

    /// Net this order's ledger rows per inventory item (`out` minus prior
    /// `return`) and book each positive remainder back with a single
    /// `return` row. Netting makes the pass idempotent: when the anchor
    /// status write after it fails and the caller re-triggers the archive,
    /// already-booked returns are not credited a second time.
    async fn restore_issued_materials(
        &self,
        tenant_id: Uuid,
        order: &WorkOrder,
    ) -> Result<usize, CoreError> {
        let ledger = self.ledger.load(tenant_id).await?;
        let mut per_item: BTreeMap<Uuid, Decimal> = BTreeMap::new();
        for txn in ledger {
            if txn.work_order_id != Some(order.id) {
                continue;
            }
            match txn.kind {
                StockTransactionType::Out => {
                    *per_item.entry(txn.inventory_item_id).or_default() += txn.quantity;
                }
                StockTransactionType::Return => {
                    *per_item.entry(txn.inventory_item_id).or_default() -= txn.quantity;
                }
                _ => {}
            }
        }
        per_item.retain(|_, quantity| *quantity > Decimal::ZERO);

        let restored = per_item.len();
        for (item_id, quantity) in per_item {
            self.inventory
                .record_movement(
                    item_id,
                    StockTransactionType::Return,
                    quantity,
                    Some((order.id, &order.order_number)),
                    Some(format!("Restored on archive of {}", order.order_number)),
                )
                .await?;
        }
        Ok(restored)
    }

    async fn archive_delivery_notes(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), CoreError> {
        let mut notes = self.delivery_notes.load(tenant_id).await?;
        let mut touched = false;
        for note in notes.iter_mut() {
            if note.work_order_id == order_id && note.status != DeliveryNoteStatus::Archived {
                note.status = DeliveryNoteStatus::Archived;
                touched = true;
            }
        }
        if touched {
            self.delivery_notes.reconcile(tenant_id, notes).await?;
        }
        Ok(())
    }

    /// Direct status write on the source quote; deliberately not routed
    /// through the quote service to keep the cascade acyclic.
    async fn archive_source_quote(&self, tenant_id: Uuid, quote_id: Uuid) -> Result<(), CoreError> {
        let mut quotes = self.quotes.load(tenant_id).await?;
        let Some(quote) = quotes.iter_mut().find(|quote| quote.id == quote_id) else {
            return Ok(());
        };
        if quote.status != QuoteStatus::Archived {
            quote.status = QuoteStatus::Archived;
            self.quotes.reconcile(tenant_id, quotes).await?;
        }
        Ok(())
    }

    /// Delivery document for an issued order, for the renderer collaborator.
    #[instrument(skip(self))]
    pub async fn create_delivery_note(&self, order_id: Uuid) -> Result<DeliveryNote, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let order = self.get(order_id).await?;
        if !order.status.is_issued() {
            return Err(CoreError::GuardViolation(format!(
                "{} is a draft, deliver it after issue",
                order.order_number
            )));
        }
        let mut notes = self.delivery_notes.load(tenant_id).await?;
        let note_number = next_document_number("DN", notes.iter().map(|n| n.note_number.as_str()));
        let note = DeliveryNote {
            id: Uuid::new_v4(),
            tenant_id,
            note_number,
            work_order_id: order.id,
            status: DeliveryNoteStatus::Created,
            created_at: Utc::now(),
        };
        notes.push(note.clone());
        self.delivery_notes.reconcile(tenant_id, notes).await?;
        Ok(note)
    }
}

/// Total inventory demand of an order's items: `material.quantity ×
/// item.quantity`, summed per inventory item across lines.
fn material_demand(items: &[LineItem]) -> BTreeMap<Uuid, Decimal> {
    let mut demand: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for item in items {
        for material in &item.materials {
            *demand.entry(material.inventory_item_id).or_default() +=
                material.quantity * item.quantity;
        }
    }
    demand
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaterialUsage;
    use crate::models::Dimensions;
    use rust_decimal_macros::dec;

    fn line(inventory_item_id: Uuid, per_unit: Decimal, quantity: Decimal) -> LineItem {
        LineItem {
            product_id: Some(Uuid::new_v4()),
            service_id: None,
            quantity,
            dimensions: Dimensions {
                width_mm: dec!(1000),
                height_mm: dec!(1000),
                area_m2: per_unit,
            },
            unit_price: dec!(10),
            total_price: dec!(0),
            materials: vec![MaterialUsage {
                inventory_item_id,
                quantity: per_unit,
                process_steps: vec![],
            }],
            process_steps: vec![],
        }
    }

    #[test]
    fn demand_sums_across_lines_per_item() {
        let glass = Uuid::new_v4();
        let items = vec![line(glass, dec!(2), dec!(3)), line(glass, dec!(1), dec!(4))];
        let demand = material_demand(&items);
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[&glass], dec!(10));
    }
}
