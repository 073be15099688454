//! Quote lifecycle.
//!
//! Totals are never edited directly: every totals-affecting path recomputes
//! them from the items through the pricing resolver. Expiry is derived from
//! `valid_until` and enforced uniformly: an expired quote can only be
//! archived.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::events::{Event, EventSender};
use crate::models::{
    InventoryItem, LineItem, Process, Quote, QuoteStatus, QuoteTotals, WorkOrder, WorkOrderStatus,
};
use crate::pricing::document_totals;
use crate::services::numbering::next_document_number;
use crate::services::work_orders::{ArchiveOutcome, WorkOrderService};
use crate::sync::CollectionSyncer;
use crate::tenant::TenantContext;

#[derive(Clone)]
pub struct QuoteService {
    ctx: Arc<dyn TenantContext>,
    quotes: Arc<CollectionSyncer<Quote>>,
    orders: Arc<CollectionSyncer<WorkOrder>>,
    processes: Arc<CollectionSyncer<Process>>,
    inventory_items: Arc<CollectionSyncer<InventoryItem>>,
    work_orders: WorkOrderService,
    events: Option<EventSender>,
    default_vat_rate: Decimal,
}

impl QuoteService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Arc<dyn TenantContext>,
        quotes: Arc<CollectionSyncer<Quote>>,
        orders: Arc<CollectionSyncer<WorkOrder>>,
        processes: Arc<CollectionSyncer<Process>>,
        inventory_items: Arc<CollectionSyncer<InventoryItem>>,
        work_orders: WorkOrderService,
        events: Option<EventSender>,
        default_vat_rate: Decimal,
    ) -> Self {
        Self {
            ctx,
            quotes,
            orders,
            processes,
            inventory_items,
            work_orders,
            events,
            default_vat_rate,
        }
    }

    /// New quote in `created`, numbered and with totals computed from the
    /// items.
    #[instrument(skip(self, items))]
    pub async fn create_quote(
        &self,
        client_id: Uuid,
        items: Vec<LineItem>,
        valid_until: DateTime<Utc>,
    ) -> Result<Quote, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut quotes = self.quotes.load(tenant_id).await?;
        let totals = self.compute_totals(tenant_id, &items, self.default_vat_rate).await?;
        let quote_number =
            next_document_number("QUO", quotes.iter().map(|q| q.quote_number.as_str()));
        let quote = Quote {
            id: Uuid::new_v4(),
            tenant_id,
            quote_number,
            client_id,
            items,
            status: QuoteStatus::Created,
            valid_until,
            converted_to_work_order_id: None,
            totals,
            payment_info: None,
            created_at: Utc::now(),
        };
        quotes.push(quote.clone());
        self.quotes.reconcile(tenant_id, quotes).await?;
        Ok(quote)
    }

    pub async fn get(&self, quote_id: Uuid) -> Result<Quote, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let quotes = self.quotes.load(tenant_id).await?;
        quotes
            .into_iter()
            .find(|quote| quote.id == quote_id)
            .ok_or_else(|| CoreError::not_found("quote", quote_id))
    }

    #[instrument(skip(self))]
    pub async fn accept(&self, quote_id: Uuid) -> Result<Quote, CoreError> {
        self.transition_created(quote_id, QuoteStatus::Accepted).await
    }

    #[instrument(skip(self))]
    pub async fn reject(&self, quote_id: Uuid) -> Result<Quote, CoreError> {
        self.transition_created(quote_id, QuoteStatus::Rejected).await
    }

    /// Replace the quote's items. Allowed only while the quote is still in
    /// `created`; totals are recomputed as part of the write.
    #[instrument(skip(self, items))]
    pub async fn update_items(
        &self,
        quote_id: Uuid,
        items: Vec<LineItem>,
    ) -> Result<Quote, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut quotes = self.quotes.load(tenant_id).await?;
        let position = self.position_of(&quotes, quote_id)?;
        if !quotes[position].items_editable() {
            return Err(CoreError::GuardViolation(format!(
                "{} is {}, items are editable only while created",
                quotes[position].quote_number, quotes[position].status
            )));
        }
        let vat_rate = quotes[position].totals.vat_rate;
        quotes[position].totals = self.compute_totals(tenant_id, &items, vat_rate).await?;
        quotes[position].items = items;
        let updated = quotes[position].clone();
        self.quotes.reconcile(tenant_id, quotes).await?;
        Ok(updated)
    }

    /// Recompute and persist the totals from the stored items. The
    /// grand-total invariant's public entry point for forms.
    #[instrument(skip(self))]
    pub async fn recompute_totals(&self, quote_id: Uuid) -> Result<QuoteTotals, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut quotes = self.quotes.load(tenant_id).await?;
        let position = self.position_of(&quotes, quote_id)?;
        let vat_rate = quotes[position].totals.vat_rate;
        let items = quotes[position].items.clone();
        let totals = self.compute_totals(tenant_id, &items, vat_rate).await?;
        if quotes[position].totals != totals {
            quotes[position].totals = totals.clone();
            self.quotes.reconcile(tenant_id, quotes).await?;
        }
        Ok(totals)
    }

    /// Convert an open quote into a draft work order. The quote moves to
    /// `converted` and remembers the order; the order freezes the quote's
    /// grand total as `original_quote_total`.
    #[instrument(skip(self))]
    pub async fn convert_to_work_order(&self, quote_id: Uuid) -> Result<WorkOrder, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut quotes = self.quotes.load(tenant_id).await?;
        let position = self.position_of(&quotes, quote_id)?;
        self.guard_open(tenant_id, &mut quotes, position, QuoteStatus::Converted)
            .await?;
        if let Some(existing) = quotes[position].converted_to_work_order_id {
            return Err(CoreError::GuardViolation(format!(
                "{} is already converted to work order {}",
                quotes[position].quote_number, existing
            )));
        }

        // Totals are recomputed from items at the moment of conversion, so
        // the frozen original_quote_total cannot inherit a stale edit.
        let vat_rate = quotes[position].totals.vat_rate;
        let items = quotes[position].items.clone();
        let totals = self.compute_totals(tenant_id, &items, vat_rate).await?;

        let mut orders = self.orders.load(tenant_id).await?;
        let order_number =
            next_document_number("WO", orders.iter().map(|o| o.order_number.as_str()));
        let order = WorkOrder {
            id: Uuid::new_v4(),
            tenant_id,
            order_number,
            quote_id: Some(quotes[position].id),
            status: WorkOrderStatus::Draft,
            items,
            original_quote_total: totals.grand_total,
            current_total: totals.grand_total,
            created_at: Utc::now(),
        };
        orders.push(order.clone());
        self.orders.reconcile(tenant_id, orders).await?;

        quotes[position].status = QuoteStatus::Converted;
        quotes[position].converted_to_work_order_id = Some(order.id);
        quotes[position].totals = totals;
        let quote_number = quotes[position].quote_number.clone();
        self.quotes.reconcile(tenant_id, quotes).await?;

        if let Some(events) = &self.events {
            events.emit(Event::QuoteConverted {
                quote_id,
                work_order_id: order.id,
            });
        }
        info!(quote = %quote_number, order = %order.order_number, "quote converted");
        Ok(order)
    }

    /// Put a converted quote back into `created`, deleting the linked draft
    /// order. Destructive, hence the explicit confirmation: callers pass
    /// `confirmed = true` only after the user acknowledged the deletion.
    #[instrument(skip(self))]
    pub async fn reopen(&self, quote_id: Uuid, confirmed: bool) -> Result<Quote, CoreError> {
        if !confirmed {
            return Err(CoreError::GuardViolation(
                "reopening deletes the linked draft order and requires explicit confirmation"
                    .into(),
            ));
        }
        let tenant_id = self.ctx.tenant_id()?;
        let mut quotes = self.quotes.load(tenant_id).await?;
        let position = self.position_of(&quotes, quote_id)?;
        if quotes[position].status != QuoteStatus::Converted {
            return Err(CoreError::GuardViolation(format!(
                "only converted quotes can be reopened, {} is {}",
                quotes[position].quote_number, quotes[position].status
            )));
        }
        let order_id = quotes[position].converted_to_work_order_id.ok_or_else(|| {
            CoreError::GuardViolation(format!(
                "{} has no linked work order",
                quotes[position].quote_number
            ))
        })?;

        let orders = self.orders.load(tenant_id).await?;
        let order = orders
            .iter()
            .find(|order| order.id == order_id)
            .ok_or_else(|| CoreError::not_found("work order", order_id))?;
        if order.status != WorkOrderStatus::Draft {
            return Err(CoreError::GuardViolation(format!(
                "{} is already {}, reopening is only possible while it is a draft",
                order.order_number, order.status
            )));
        }
        self.orders.remove(tenant_id, order_id).await?;

        quotes[position].status = QuoteStatus::Created;
        quotes[position].converted_to_work_order_id = None;
        let reopened = quotes[position].clone();
        self.quotes.reconcile(tenant_id, quotes).await?;
        info!(quote = %reopened.quote_number, "quote reopened, draft order deleted");
        Ok(reopened)
    }

    /// Archive from any status. Cascades to the linked work order (which in
    /// turn restores inventory if issued and archives its delivery note);
    /// the cascade is best-effort and reported, never rolled back into the
    /// quote write.
    #[instrument(skip(self))]
    pub async fn archive(&self, quote_id: Uuid) -> Result<ArchiveOutcome, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut quotes = self.quotes.load(tenant_id).await?;
        let position = self.position_of(&quotes, quote_id)?;
        if quotes[position].status == QuoteStatus::Archived {
            return Ok(ArchiveOutcome::default());
        }
        let linked_order = quotes[position].converted_to_work_order_id;
        let quote_number = quotes[position].quote_number.clone();
        quotes[position].status = QuoteStatus::Archived;
        self.quotes.reconcile(tenant_id, quotes).await?;

        let mut outcome = ArchiveOutcome::default();
        if let Some(order_id) = linked_order {
            match self.work_orders.archive(order_id).await {
                Ok(cascaded) => outcome = cascaded,
                // Already-archived orders are fine; anything else is
                // surfaced without undoing the quote archive.
                Err(CoreError::GuardViolation(_)) => {}
                Err(err) => {
                    warn!(quote = %quote_number, error = %err, "work order cascade failed");
                    outcome.cascade_failures.push(format!("work order: {err}"));
                }
            }
        }
        info!(quote = %quote_number, "quote archived");
        Ok(outcome)
    }

    /// Shared guard and write for the `created → accepted|rejected` moves.
    /// An expired quote fails the guard; the observed expiry is persisted
    /// so list views stop showing the quote as open.
    async fn transition_created(
        &self,
        quote_id: Uuid,
        target: QuoteStatus,
    ) -> Result<Quote, CoreError> {
        let tenant_id = self.ctx.tenant_id()?;
        let mut quotes = self.quotes.load(tenant_id).await?;
        let position = self.position_of(&quotes, quote_id)?;
        self.guard_open(tenant_id, &mut quotes, position, target)
            .await?;
        quotes[position].status = target;
        let updated = quotes[position].clone();
        self.quotes.reconcile(tenant_id, quotes).await?;
        info!(quote = %updated.quote_number, status = %target, "quote transitioned");
        Ok(updated)
    }

    /// Guard: the quote must be in `created`, unexpired, and the table must
    /// allow the move. Observing expiry persists it as a side effect.
    async fn guard_open(
        &self,
        tenant_id: Uuid,
        quotes: &mut [Quote],
        position: usize,
        target: QuoteStatus,
    ) -> Result<(), CoreError> {
        let quote = &quotes[position];
        let now = Utc::now();
        if quote.status == QuoteStatus::Created && quote.is_expired(now) {
            let number = quote.quote_number.clone();
            quotes[position].status = QuoteStatus::Expired;
            self.quotes.reconcile(tenant_id, quotes.to_vec()).await?;
            return Err(CoreError::GuardViolation(format!(
                "{} expired on {}",
                number, quotes[position].valid_until
            )));
        }
        let quote = &quotes[position];
        if quote.status != QuoteStatus::Created || !quote.status.can_transition(target) {
            return Err(CoreError::GuardViolation(format!(
                "cannot move {} from {} to {}",
                quote.quote_number, quote.status, target
            )));
        }
        Ok(())
    }

    async fn compute_totals(
        &self,
        tenant_id: Uuid,
        items: &[LineItem],
        vat_rate: Decimal,
    ) -> Result<QuoteTotals, CoreError> {
        let processes = self.processes.load(tenant_id).await?;
        let inventory = self.inventory_items.load(tenant_id).await?;
        Ok(document_totals(items, &processes, &inventory, vat_rate))
    }

    fn position_of(&self, quotes: &[Quote], quote_id: Uuid) -> Result<usize, CoreError> {
        quotes
            .iter()
            .position(|quote| quote.id == quote_id)
            .ok_or_else(|| CoreError::not_found("quote", quote_id))
    }
}
