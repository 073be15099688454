//! Wiring for an embedding process: build stores, syncers, and services
//! for one backend, and run the event processor's lifecycle.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::InMemoryCollection;
use crate::events::{EventHandler, EventProcessor, EventSender, RunningProcessor};
use crate::models::{
    DeliveryNote, InventoryItem, Process, Quote, StockTransaction, WorkOrder,
};
use crate::services::{InventoryService, QuoteService, WorkOrderService};
use crate::sync::{CollectionSyncer, DeletePolicy};
use crate::tenant::TenantContext;

/// The syncers, one per durable collection. The stock-transaction ledger is
/// the only append-only one.
pub struct Collections {
    pub inventory_items: Arc<CollectionSyncer<InventoryItem>>,
    pub stock_transactions: Arc<CollectionSyncer<StockTransaction>>,
    pub processes: Arc<CollectionSyncer<Process>>,
    pub quotes: Arc<CollectionSyncer<Quote>>,
    pub work_orders: Arc<CollectionSyncer<WorkOrder>>,
    pub delivery_notes: Arc<CollectionSyncer<DeliveryNote>>,
}

impl Collections {
    /// All collections on fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            inventory_items: Arc::new(CollectionSyncer::new(
                "inventory_items",
                Arc::new(InMemoryCollection::new("inventory_items")),
                DeletePolicy::Prune,
            )),
            stock_transactions: Arc::new(CollectionSyncer::new(
                "stock_transactions",
                Arc::new(InMemoryCollection::new("stock_transactions")),
                DeletePolicy::AppendOnly,
            )),
            processes: Arc::new(CollectionSyncer::new(
                "processes",
                Arc::new(InMemoryCollection::new("processes")),
                DeletePolicy::Prune,
            )),
            quotes: Arc::new(CollectionSyncer::new(
                "quotes",
                Arc::new(InMemoryCollection::new("quotes")),
                DeletePolicy::Prune,
            )),
            work_orders: Arc::new(CollectionSyncer::new(
                "work_orders",
                Arc::new(InMemoryCollection::new("work_orders")),
                DeletePolicy::Prune,
            )),
            delivery_notes: Arc::new(CollectionSyncer::new(
                "delivery_notes",
                Arc::new(InMemoryCollection::new("delivery_notes")),
                DeletePolicy::Prune,
            )),
        }
    }
}

pub struct CoreServices {
    pub collections: Collections,
    pub inventory: InventoryService,
    pub work_orders: WorkOrderService,
    pub quotes: QuoteService,
    pub events: EventSender,
    processor: Option<RunningProcessor>,
}

impl CoreServices {
    /// Build the full service graph over the given collections and start
    /// the event processor with the given observers. Call [`shutdown`] on
    /// teardown.
    ///
    /// [`shutdown`]: CoreServices::shutdown
    pub fn start(
        config: &AppConfig,
        ctx: Arc<dyn TenantContext>,
        collections: Collections,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> Self {
        let mut event_processor = EventProcessor::new(config.events.channel_capacity);
        for handler in handlers {
            event_processor.register(handler);
        }
        let (events, processor) = event_processor.start();

        let inventory = InventoryService::new(
            ctx.clone(),
            collections.inventory_items.clone(),
            collections.stock_transactions.clone(),
            Some(events.clone()),
        );
        let work_orders = WorkOrderService::new(
            ctx.clone(),
            collections.work_orders.clone(),
            collections.quotes.clone(),
            collections.delivery_notes.clone(),
            collections.stock_transactions.clone(),
            inventory.clone(),
            Some(events.clone()),
        );
        let quotes = QuoteService::new(
            ctx,
            collections.quotes.clone(),
            collections.work_orders.clone(),
            collections.processes.clone(),
            collections.inventory_items.clone(),
            work_orders.clone(),
            Some(events.clone()),
            config.pricing.default_vat_rate,
        );

        Self {
            collections,
            inventory,
            work_orders,
            quotes,
            events,
            processor: Some(processor),
        }
    }

    /// Stop the event processor. Pending events already in the channel are
    /// not drained; delivery stays best-effort through teardown.
    pub async fn shutdown(mut self) {
        if let Some(processor) = self.processor.take() {
            processor.shutdown().await;
        }
    }
}
