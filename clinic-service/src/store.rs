use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use shared::AppointmentStatus;
use thiserror::Error;

use crate::models::{
    Appointment, Conversation, NewAppointment, NewConversation, NewNotification, Notification,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Covers both "nonexistent id" and "zero rows affected"; the two are
    /// deliberately not distinguished (see DESIGN.md).
    #[error("record not found")]
    NotFound,
    #[error("store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => StoreError::NotFound,
            other => StoreError::Unavailable(other.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable record of appointments. All reads exclude soft-deleted rows.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// All appointments for a user, most recent date/time first.
    async fn list_for_user(&self, user_id: i32) -> StoreResult<Vec<Appointment>>;

    /// Up to 10 pending/confirmed appointments at or after the given
    /// instant, soonest first.
    async fn upcoming_for_user(
        &self,
        user_id: i32,
        today: NaiveDate,
        now: NaiveTime,
    ) -> StoreResult<Vec<Appointment>>;

    async fn create(&self, appointment: NewAppointment) -> StoreResult<i32>;

    /// Moves an existing appointment in place; no new row is created.
    async fn reschedule(
        &self,
        id: i32,
        pet_id: Option<i32>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<()>;

    async fn current_status(&self, id: i32) -> StoreResult<AppointmentStatus>;

    /// Compare-and-set on the previously observed status, so a concurrent
    /// update between read and write surfaces as `NotFound` instead of
    /// silently overwriting.
    async fn update_status(
        &self,
        id: i32,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> StoreResult<()>;

    /// Anti-join: confirmed appointments with no "appointment_confirmed"
    /// notification yet for their owner.
    async fn confirmed_without_notification(&self, user_id: i32)
        -> StoreResult<Vec<Appointment>>;

    /// Distinct owners of appointments the anti-join would return, for
    /// the periodic global pass.
    async fn users_with_missing_notifications(&self) -> StoreResult<Vec<i32>>;

    async fn count_on_date(&self, date: NaiveDate) -> StoreResult<i64>;
}

/// Durable record of delivered notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert guarded by the (user_id, type, notifiable_id) uniqueness
    /// constraint. `None` means a concurrent pass already inserted the
    /// same key; callers treat that as "already exists, no-op".
    async fn insert_unique(&self, notification: NewNotification) -> StoreResult<Option<i32>>;

    /// Newest first.
    async fn list_for_user(&self, user_id: i32) -> StoreResult<Vec<Notification>>;

    async fn count_unread(&self, user_id: i32) -> StoreResult<i64>;

    /// Ownership-checked: `NotFound` covers both a missing id and a
    /// notification belonging to someone else.
    async fn mark_read(&self, id: i32, user_id: i32) -> StoreResult<()>;
}

/// Conversation rows plus the admin-selection subset of users.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The non-deleted admin or sub_admin with the most recent activity.
    async fn most_recent_admin(&self) -> StoreResult<Option<i32>>;

    /// Most recently updated conversation between owner and admin.
    async fn latest_between(
        &self,
        pet_owner_id: i32,
        admin_id: i32,
    ) -> StoreResult<Option<Conversation>>;

    /// Conditional insert under the (pet_owner_id, admin_id) uniqueness
    /// constraint; concurrent callers all observe the same row.
    async fn create_if_absent(&self, conversation: NewConversation) -> StoreResult<Conversation>;
}
