use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use shared::AppointmentStatus;

use crate::models::{
    Appointment, Conversation, NewAppointment, NewConversation, NewNotification, Notification,
};
use crate::store::{
    AppointmentStore, ConversationStore, NotificationStore, StoreError, StoreResult,
};

struct AdminRow {
    id: i32,
    role: String,
    last_activity: Option<DateTime<Utc>>,
    deleted: bool,
}

#[derive(Default)]
struct Inner {
    appointments: Vec<Appointment>,
    notifications: Vec<Notification>,
    conversations: Vec<Conversation>,
    admins: Vec<AdminRow>,
    failing_appointments: HashSet<i32>,
    next_id: i32,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn has_notification(&self, user_id: i32, type_: &str, notifiable_id: i32) -> bool {
        self.notifications.iter().any(|n| {
            n.user_id == user_id && n.type_ == type_ && n.notifiable_id == notifiable_id
        })
    }
}

/// In-memory stand-in for `PgStore`. The single mutex makes each store
/// call atomic, so `insert_unique` and `create_if_absent` behave like
/// their constraint-backed Postgres counterparts under concurrency.
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn add_admin(&self, id: i32, role: &str, last_activity_secs: Option<i64>) {
        let mut inner = self.inner.lock().unwrap();
        inner.admins.push(AdminRow {
            id,
            role: role.to_string(),
            last_activity: last_activity_secs
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            deleted: false,
        });
    }

    pub fn delete_admin(&self, id: i32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(admin) = inner.admins.iter_mut().find(|a| a.id == id) {
            admin.deleted = true;
        }
    }

    pub fn add_appointment(
        &self,
        user_id: i32,
        pet_name: Option<&str>,
        status: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.appointments.push(Appointment {
            id,
            user_id,
            pet_id: None,
            pet_name: pet_name.map(str::to_string),
            owner_name: "Owner".to_string(),
            reason_for_visit: "checkup".to_string(),
            appointment_date: date,
            appointment_time: time,
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        });
        id
    }

    pub fn soft_delete(&self, appointment_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(a) = inner
            .appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
        {
            a.deleted_at = Some(Utc::now());
        }
    }

    pub fn appointment_status(&self, appointment_id: i32) -> String {
        let inner = self.inner.lock().unwrap();
        inner
            .appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .map(|a| a.status.clone())
            .unwrap()
    }

    /// Makes notification inserts for the given appointment fail with a
    /// transient store error.
    pub fn fail_inserts_for(&self, appointment_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing_appointments.insert(appointment_id);
    }

    pub fn add_notification(&self, user_id: i32, type_: &str, notifiable_id: i32) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.notifications.push(Notification {
            id,
            user_id,
            type_: type_.to_string(),
            notifiable_type: shared::NOTIFIABLE_APPOINTMENT.to_string(),
            notifiable_id,
            data: serde_json::json!({}),
            read_at: None,
            created_at: Utc::now(),
        });
        id
    }

    pub fn notifications_for(&self, user_id: i32) -> Vec<Notification> {
        let inner = self.inner.lock().unwrap();
        inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn notification_read_at(&self, notification_id: i32) -> Option<DateTime<Utc>> {
        let inner = self.inner.lock().unwrap();
        inner
            .notifications
            .iter()
            .find(|n| n.id == notification_id)
            .and_then(|n| n.read_at)
    }

    pub fn conversation_count(&self) -> usize {
        self.inner.lock().unwrap().conversations.len()
    }
}

#[async_trait]
impl AppointmentStore for MemStore {
    async fn list_for_user(&self, user_id: i32) -> StoreResult<Vec<Appointment>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Appointment> = inner
            .appointments
            .iter()
            .filter(|a| a.user_id == user_id && a.deleted_at.is_none())
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (b.appointment_date, b.appointment_time).cmp(&(a.appointment_date, a.appointment_time))
        });
        Ok(rows)
    }

    async fn upcoming_for_user(
        &self,
        user_id: i32,
        today: NaiveDate,
        now: NaiveTime,
    ) -> StoreResult<Vec<Appointment>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Appointment> = inner
            .appointments
            .iter()
            .filter(|a| {
                a.user_id == user_id
                    && a.deleted_at.is_none()
                    && matches!(a.status.as_str(), "pending" | "confirmed")
                    && (a.appointment_date > today
                        || (a.appointment_date == today && a.appointment_time >= now))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.appointment_date, a.appointment_time).cmp(&(b.appointment_date, b.appointment_time))
        });
        rows.truncate(10);
        Ok(rows)
    }

    async fn create(&self, appointment: NewAppointment) -> StoreResult<i32> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.appointments.push(Appointment {
            id,
            user_id: appointment.user_id,
            pet_id: appointment.pet_id,
            pet_name: appointment.pet_name,
            owner_name: appointment.owner_name,
            reason_for_visit: appointment.reason_for_visit,
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
            status: appointment.status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        });
        Ok(id)
    }

    async fn reschedule(
        &self,
        id: i32,
        pet_id: Option<i32>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let appointment = inner
            .appointments
            .iter_mut()
            .find(|a| a.id == id && a.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        appointment.pet_id = pet_id;
        appointment.appointment_date = date;
        appointment.appointment_time = time;
        appointment.updated_at = Utc::now();
        Ok(())
    }

    async fn current_status(&self, id: i32) -> StoreResult<AppointmentStatus> {
        let inner = self.inner.lock().unwrap();
        let appointment = inner
            .appointments
            .iter()
            .find(|a| a.id == id && a.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        appointment
            .status
            .parse::<AppointmentStatus>()
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!(e)))
    }

    async fn update_status(
        &self,
        id: i32,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let appointment = inner
            .appointments
            .iter_mut()
            .find(|a| a.id == id && a.deleted_at.is_none() && a.status == from.as_str())
            .ok_or(StoreError::NotFound)?;
        appointment.status = to.as_str().to_string();
        appointment.updated_at = Utc::now();
        Ok(())
    }

    async fn confirmed_without_notification(
        &self,
        user_id: i32,
    ) -> StoreResult<Vec<Appointment>> {
        let inner = self.inner.lock().unwrap();
        let rows = inner
            .appointments
            .iter()
            .filter(|a| {
                a.user_id == user_id
                    && a.status == "confirmed"
                    && a.deleted_at.is_none()
                    && !inner.has_notification(a.user_id, "appointment_confirmed", a.id)
            })
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn users_with_missing_notifications(&self) -> StoreResult<Vec<i32>> {
        let inner = self.inner.lock().unwrap();
        let mut user_ids: Vec<i32> = inner
            .appointments
            .iter()
            .filter(|a| {
                a.status == "confirmed"
                    && a.deleted_at.is_none()
                    && !inner.has_notification(a.user_id, "appointment_confirmed", a.id)
            })
            .map(|a| a.user_id)
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        Ok(user_ids)
    }

    async fn count_on_date(&self, date: NaiveDate) -> StoreResult<i64> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .appointments
            .iter()
            .filter(|a| a.appointment_date == date && a.deleted_at.is_none())
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl NotificationStore for MemStore {
    async fn insert_unique(&self, notification: NewNotification) -> StoreResult<Option<i32>> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .failing_appointments
            .contains(&notification.notifiable_id)
        {
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "injected insert failure"
            )));
        }
        if inner.has_notification(
            notification.user_id,
            &notification.type_,
            notification.notifiable_id,
        ) {
            return Ok(None);
        }
        let id = inner.next_id();
        inner.notifications.push(Notification {
            id,
            user_id: notification.user_id,
            type_: notification.type_,
            notifiable_type: notification.notifiable_type,
            notifiable_id: notification.notifiable_id,
            data: notification.data,
            read_at: None,
            created_at: Utc::now(),
        });
        Ok(Some(id))
    }

    async fn list_for_user(&self, user_id: i32) -> StoreResult<Vec<Notification>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn count_unread(&self, user_id: i32) -> StoreResult<i64> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && n.read_at.is_none())
            .count();
        Ok(count as i64)
    }

    async fn mark_read(&self, id: i32, user_id: i32) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let notification = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        notification.read_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemStore {
    async fn most_recent_admin(&self) -> StoreResult<Option<i32>> {
        let inner = self.inner.lock().unwrap();
        let admin = inner
            .admins
            .iter()
            .filter(|a| !a.deleted && matches!(a.role.as_str(), "admin" | "sub_admin"))
            .max_by_key(|a| a.last_activity)
            .map(|a| a.id);
        Ok(admin)
    }

    async fn latest_between(
        &self,
        pet_owner_id: i32,
        admin_id: i32,
    ) -> StoreResult<Option<Conversation>> {
        let inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .iter()
            .filter(|c| c.pet_owner_id == pet_owner_id && c.admin_id == admin_id)
            .max_by_key(|c| c.updated_at)
            .cloned();
        Ok(conversation)
    }

    async fn create_if_absent(&self, conversation: NewConversation) -> StoreResult<Conversation> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .conversations
            .iter()
            .filter(|c| {
                c.pet_owner_id == conversation.pet_owner_id && c.admin_id == conversation.admin_id
            })
            .max_by_key(|c| c.updated_at)
            .cloned()
        {
            return Ok(existing);
        }
        let id = inner.next_id();
        let row = Conversation {
            id,
            pet_owner_id: conversation.pet_owner_id,
            admin_id: conversation.admin_id,
            unique_key: conversation.unique_key,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        inner.conversations.push(row.clone());
        Ok(row)
    }
}
