use crate::models::{InstallationStatus, TransportStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

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

    /// Sends without failing the caller; a closed channel is only logged.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

/// Domain events emitted after a successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i32,
        order_number: String,
    },
    OrderUpdated(i32),
    OrderDeleted(i32),
    InstallationStatusChanged {
        order_id: i32,
        from: InstallationStatus,
        to: InstallationStatus,
        actor_id: i32,
    },
    TransportStatusChanged {
        order_id: i32,
        from: Option<TransportStatus>,
        to: TransportStatus,
        actor_id: i32,
    },
    InstallerAssigned {
        order_id: i32,
        installer_id: i32,
        installation_date: Option<NaiveDate>,
    },
    TransporterAssigned {
        order_id: i32,
        transporter_id: i32,
        transport_date: Option<NaiveDate>,
    },
    CompanyAssigned {
        order_id: i32,
        company_id: i32,
    },
    FinancialFlagsUpdated(i32),
    ComplaintRecorded {
        order_id: i32,
        photo_count: usize,
    },
    ComplaintPhotoRemoved {
        order_id: i32,
        photo: String,
    },
    ScheduleEntryCreated {
        entry_id: i32,
        installer_id: i32,
        date: NaiveDate,
    },
    ScheduleEntryCompleted(i32),
    ScheduleConflict {
        installer_id: i32,
        date: NaiveDate,
        time_slot: String,
        existing_entry_id: i32,
    },
    SettingChanged {
        category: String,
        key: String,
        at: DateTime<Utc>,
    },
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::InstallationStatusChanged {
                order_id, from, to, ..
            } => {
                info!(order_id, %from, %to, "installation status changed");
            }
            Event::TransportStatusChanged { order_id, to, .. } => {
                info!(order_id, %to, "transport status changed");
            }
            Event::ComplaintRecorded {
                order_id,
                photo_count,
            } => {
                warn!(order_id, photo_count, "complaint recorded");
            }
            Event::ScheduleConflict {
                installer_id,
                date,
                time_slot,
                existing_entry_id,
            } => {
                warn!(
                    installer_id,
                    %date,
                    time_slot = %time_slot,
                    existing_entry_id,
                    "installer double-booked"
                );
            }
            other => {
                info!(event = ?other, "event processed");
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        drop(rx);
        assert!(sender.send(Event::OrderUpdated(1)).await.is_err());
        // must not panic
        sender.send_or_log(Event::OrderUpdated(1)).await;
    }

    #[tokio::test]
    async fn processor_drains_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(process_events(rx));
        let sender = EventSender::new(tx);
        sender.send(Event::OrderDeleted(3)).await.unwrap();
        drop(sender);
        handle.await.unwrap();
    }
}
