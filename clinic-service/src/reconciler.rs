use std::sync::Arc;
use std::time::Duration;

use shared::{appointment_message, AppointmentStatus, NotificationData, NOTIFIABLE_APPOINTMENT};
use tokio::time;
use tracing::{error, info, warn};

use crate::models::NewNotification;
use crate::store::{AppointmentStore, NotificationStore, StoreResult};

/// Derives missing notifications from appointment state. Runs both from
/// the periodic ticker and on demand via the status_changes endpoint;
/// overlapping passes are safe because the notification store inserts
/// under a uniqueness constraint.
pub struct Reconciler {
    appointments: Arc<dyn AppointmentStore>,
    notifications: Arc<dyn NotificationStore>,
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub notification_ids: Vec<i32>,
    /// Appointments another pass already notified for.
    pub skipped: usize,
    /// Per-row insert failures; logged, never fatal to the batch.
    pub failed: usize,
}

impl Reconciler {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            appointments,
            notifications,
        }
    }

    pub async fn run(self: Arc<Self>, period: Duration) {
        let mut interval = time::interval(period);

        loop {
            interval.tick().await;

            if let Err(e) = self.reconcile_all().await {
                error!("Reconciliation pass failed: {}", e);
            }
        }
    }

    /// Global pass: every user with a confirmed appointment lacking a
    /// notification gets reconciled.
    pub async fn reconcile_all(&self) -> StoreResult<usize> {
        let user_ids = self.appointments.users_with_missing_notifications().await?;
        let mut created = 0;

        for user_id in user_ids {
            match self.reconcile_user(user_id).await {
                Ok(outcome) => created += outcome.notification_ids.len(),
                Err(e) => error!("Reconciliation failed for user {}: {}", user_id, e),
            }
        }

        Ok(created)
    }

    /// Ensures every confirmed, non-deleted appointment of the user has
    /// exactly one "appointment_confirmed" notification. The initial
    /// query failing aborts the call; a single row failing does not.
    pub async fn reconcile_user(&self, user_id: i32) -> StoreResult<ReconcileOutcome> {
        let candidates = self
            .appointments
            .confirmed_without_notification(user_id)
            .await?;

        let mut outcome = ReconcileOutcome::default();

        for appointment in candidates {
            let status = match appointment.status.parse::<AppointmentStatus>() {
                Ok(status) => status,
                Err(e) => {
                    warn!("Skipping appointment {}: {}", appointment.id, e);
                    outcome.failed += 1;
                    continue;
                }
            };

            let pet_name = appointment.pet_name.as_deref().unwrap_or("your pet");
            let message = appointment_message(
                pet_name,
                status,
                appointment.appointment_date,
                appointment.appointment_time,
            );
            let data = NotificationData {
                message,
                appointment_id: appointment.id,
            };
            let data = match serde_json::to_value(&data) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Skipping appointment {}: {}", appointment.id, e);
                    outcome.failed += 1;
                    continue;
                }
            };

            let notification = NewNotification {
                user_id,
                type_: status.notification_type(),
                notifiable_type: NOTIFIABLE_APPOINTMENT.to_string(),
                notifiable_id: appointment.id,
                data,
            };

            match self.notifications.insert_unique(notification).await {
                Ok(Some(id)) => {
                    info!(
                        "Created notification {} for appointment {}",
                        id, appointment.id
                    );
                    outcome.notification_ids.push(id);
                }
                Ok(None) => outcome.skipped += 1,
                Err(e) => {
                    warn!(
                        "Failed to create notification for appointment {}: {}",
                        appointment.id, e
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }
}
