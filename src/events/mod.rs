use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{BookingStatus, QuoteStatus, WorkOrderStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes an event after the owning transaction committed. A closed
    /// channel must not fail an operation whose state is already persisted.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping repair event");
        }
    }
}

/// Lifecycle events published once the corresponding change is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Booking events
    BookingCreated {
        booking_id: Uuid,
        customer_id: Uuid,
    },
    BookingStatusChanged {
        booking_id: Uuid,
        old_status: BookingStatus,
        new_status: BookingStatus,
    },
    BookingConverted {
        booking_id: Uuid,
        work_order_id: Uuid,
    },

    // Work order events
    WorkOrderCreated {
        work_order_id: Uuid,
        ticket_number: String,
        customer_id: Uuid,
    },
    WorkOrderStatusChanged {
        work_order_id: Uuid,
        old_status: WorkOrderStatus,
        new_status: WorkOrderStatus,
        actor_id: Uuid,
    },
    AssignmentAccepted {
        work_order_id: Uuid,
        technician_id: Uuid,
    },
    WorkOrderPartAdded {
        work_order_id: Uuid,
        part_id: Uuid,
    },
    WorkOrderPartRemoved {
        work_order_id: Uuid,
        part_id: Uuid,
    },
    WorkOrderNoteAdded {
        work_order_id: Uuid,
        actor_id: Uuid,
    },

    // Quote events
    QuoteCreated {
        quote_id: Uuid,
        work_order_id: Uuid,
        superseded: Option<Uuid>,
    },
    QuoteUpdated {
        quote_id: Uuid,
    },
    QuoteDecided {
        quote_id: Uuid,
        work_order_id: Uuid,
        status: QuoteStatus,
    },
    QuoteExpired {
        quote_id: Uuid,
        work_order_id: Uuid,
    },

    // Technician events
    TechnicianRegistered(Uuid),
    TechnicianAvailabilityChanged {
        technician_id: Uuid,
        is_available: bool,
    },
}

impl Event {
    /// Work order an event belongs to, if any.
    pub fn work_order_id(&self) -> Option<Uuid> {
        match self {
            Event::BookingConverted { work_order_id, .. }
            | Event::WorkOrderCreated { work_order_id, .. }
            | Event::WorkOrderStatusChanged { work_order_id, .. }
            | Event::AssignmentAccepted { work_order_id, .. }
            | Event::WorkOrderPartAdded { work_order_id, .. }
            | Event::WorkOrderPartRemoved { work_order_id, .. }
            | Event::WorkOrderNoteAdded { work_order_id, .. }
            | Event::QuoteCreated { work_order_id, .. }
            | Event::QuoteDecided { work_order_id, .. }
            | Event::QuoteExpired { work_order_id, .. } => Some(*work_order_id),
            Event::BookingCreated { .. }
            | Event::BookingStatusChanged { .. }
            | Event::QuoteUpdated { .. }
            | Event::TechnicianRegistered(_)
            | Event::TechnicianAvailabilityChanged { .. } => None,
        }
    }
}

// Define a trait for handling events. Handlers implementing this trait will process events asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Default subscriber standing in for notification delivery: records which
/// lifecycle changes a customer or technician would be told about.
#[derive(Debug, Default)]
pub struct NotificationLogger;

#[async_trait]
impl EventHandler for NotificationLogger {
    async fn handle_event(&self, event: Event) -> Result<(), String> {
        match &event {
            Event::WorkOrderStatusChanged {
                work_order_id,
                old_status,
                new_status,
                ..
            } => {
                info!(%work_order_id, %old_status, %new_status, "notify: work order status changed");
            }
            Event::QuoteCreated {
                quote_id,
                work_order_id,
                ..
            } => {
                info!(%quote_id, %work_order_id, "notify: quote ready for review");
            }
            Event::QuoteExpired { quote_id, .. } => {
                info!(%quote_id, "notify: quote expired, a new quote is needed");
            }
            Event::BookingConverted {
                booking_id,
                work_order_id,
            } => {
                info!(%booking_id, %work_order_id, "notify: booking accepted");
            }
            other => debug!(event = ?other, "no notification for event"),
        }
        Ok(())
    }
}

// Function to process incoming events and distribute them to registered event handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!(handlers = handlers.len(), "Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!("Received event: {:?}", event);

        let results = join_all(
            handlers
                .iter()
                .map(|handler| handler.handle_event(event.clone())),
        )
        .await;

        for result in results {
            if let Err(e) = result {
                error!("Event handler failed: event={:?}, error={}", event, e);
            }
        }
    }

    warn!("Event processing loop has ended");
}
