//! Domain events.
//!
//! Lifecycle services emit events through an [`EventSender`]; delivery is
//! best-effort and never blocks or fails the emitting transition. Observers
//! register [`EventHandler`]s on an [`EventProcessor`] with an explicit
//! process-wide lifecycle: start on bootstrap, shut down on teardown.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    QuoteConverted {
        quote_id: Uuid,
        work_order_id: Uuid,
    },
    WorkOrderIssued {
        work_order_id: Uuid,
        order_number: String,
    },
    WorkOrderCompleted {
        work_order_id: Uuid,
        order_number: String,
        completed_at: DateTime<Utc>,
    },
    WorkOrderArchived {
        work_order_id: Uuid,
        restored_items: usize,
    },
    LowStockDetected {
        inventory_item_id: Uuid,
        quantity: Decimal,
        min_quantity: Decimal,
    },
    InventoryAdjusted {
        inventory_item_id: Uuid,
        previous_quantity: Decimal,
        new_quantity: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Fire-and-forget: a full or closed channel is logged and swallowed so
    /// notification can never fail a business transition.
    pub fn emit(&self, event: Event) {
        if let Err(err) = self.sender.try_send(event) {
            warn!(error = %err, "event dropped, channel full or closed");
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Builds the event channel and dispatch loop.
pub struct EventProcessor {
    capacity: usize,
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventProcessor {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Spawn the dispatch loop and hand back the sender plus a shutdown
    /// handle. One handler failing is logged and does not stop dispatch to
    /// the others.
    pub fn start(self) -> (EventSender, RunningProcessor) {
        let (tx, mut rx) = mpsc::channel::<Event>(self.capacity);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handlers = self.handlers;

        let handle = tokio::spawn(async move {
            info!("event processor started");
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    maybe_event = rx.recv() => {
                        let Some(event) = maybe_event else { break };
                        for handler in &handlers {
                            if let Err(err) = handler.handle_event(event.clone()).await {
                                error!(error = %err, ?event, "event handler failed");
                            }
                        }
                    }
                }
            }
            info!("event processor stopped");
        });

        (
            EventSender::new(tx),
            RunningProcessor {
                shutdown: shutdown_tx,
                handle,
            },
        )
    }
}

/// Handle to a started dispatch loop.
pub struct RunningProcessor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningProcessor {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<Event>>);

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle_event(&self, event: Event) -> Result<(), String> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[tokio::test]
    async fn events_reach_registered_handlers() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut processor = EventProcessor::new(16);
        processor.register(recorder.clone());
        let (sender, running) = processor.start();

        sender.emit(Event::WorkOrderCompleted {
            work_order_id: Uuid::new_v4(),
            order_number: "WO-0001".into(),
            completed_at: Utc::now(),
        });

        // Give the dispatch loop a chance to drain before shutdown.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        running.shutdown().await;

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], Event::WorkOrderCompleted { .. }));
    }

    #[tokio::test]
    async fn emit_never_blocks_when_nobody_listens() {
        let (tx, rx) = mpsc::channel::<Event>(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Closed channel: emit logs and returns.
        sender.emit(Event::QuoteConverted {
            quote_id: Uuid::new_v4(),
            work_order_id: Uuid::new_v4(),
        });
    }
}
