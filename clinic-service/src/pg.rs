use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use diesel::dsl::{exists, not};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::bb8::{Pool, PooledConnection},
    AsyncPgConnection, RunQueryDsl,
};
use shared::{AppointmentStatus, NOTIFIABLE_APPOINTMENT};

use crate::models::*;
use crate::schema::{appointments, conversations, notifications, users};
use crate::store::{
    AppointmentStore, ConversationStore, NotificationStore, StoreError, StoreResult,
};

pub type DbPool = Pool<AsyncPgConnection>;

/// Postgres-backed implementation of all three store ports, sharing one
/// bb8 pool acquired at process start.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<PooledConnection<'_, AsyncPgConnection>> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!(e)))
    }
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn list_for_user(&self, user_id: i32) -> StoreResult<Vec<Appointment>> {
        let mut conn = self.conn().await?;
        let rows = appointments::table
            .filter(appointments::user_id.eq(user_id))
            .filter(appointments::deleted_at.is_null())
            .order((
                appointments::appointment_date.desc(),
                appointments::appointment_time.desc(),
            ))
            .load::<Appointment>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn upcoming_for_user(
        &self,
        user_id: i32,
        today: NaiveDate,
        now: NaiveTime,
    ) -> StoreResult<Vec<Appointment>> {
        let mut conn = self.conn().await?;
        let rows = appointments::table
            .filter(appointments::user_id.eq(user_id))
            .filter(appointments::deleted_at.is_null())
            .filter(appointments::status.eq_any(["pending", "confirmed"]))
            .filter(
                appointments::appointment_date.gt(today).or(appointments::appointment_date
                    .eq(today)
                    .and(appointments::appointment_time.ge(now))),
            )
            .order((
                appointments::appointment_date.asc(),
                appointments::appointment_time.asc(),
            ))
            .limit(10)
            .load::<Appointment>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn create(&self, appointment: NewAppointment) -> StoreResult<i32> {
        let mut conn = self.conn().await?;
        let id = diesel::insert_into(appointments::table)
            .values(&appointment)
            .returning(appointments::id)
            .get_result::<i32>(&mut conn)
            .await?;
        Ok(id)
    }

    async fn reschedule(
        &self,
        id: i32,
        pet_id: Option<i32>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let affected = diesel::update(
            appointments::table
                .filter(appointments::id.eq(id))
                .filter(appointments::deleted_at.is_null()),
        )
        .set((
            appointments::pet_id.eq(pet_id),
            appointments::appointment_date.eq(date),
            appointments::appointment_time.eq(time),
            appointments::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)
        .await?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn current_status(&self, id: i32) -> StoreResult<AppointmentStatus> {
        let mut conn = self.conn().await?;
        let status = appointments::table
            .filter(appointments::id.eq(id))
            .filter(appointments::deleted_at.is_null())
            .select(appointments::status)
            .first::<String>(&mut conn)
            .await?;
        status
            .parse::<AppointmentStatus>()
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!(e)))
    }

    async fn update_status(
        &self,
        id: i32,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let affected = diesel::update(
            appointments::table
                .filter(appointments::id.eq(id))
                .filter(appointments::status.eq(from.as_str()))
                .filter(appointments::deleted_at.is_null()),
        )
        .set((
            appointments::status.eq(to.as_str()),
            appointments::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)
        .await?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn confirmed_without_notification(
        &self,
        user_id: i32,
    ) -> StoreResult<Vec<Appointment>> {
        let mut conn = self.conn().await?;
        let rows = appointments::table
            .filter(appointments::user_id.eq(user_id))
            .filter(appointments::status.eq(AppointmentStatus::Confirmed.as_str()))
            .filter(appointments::deleted_at.is_null())
            .filter(not(exists(
                notifications::table
                    .filter(notifications::user_id.eq(appointments::user_id))
                    .filter(notifications::type_.eq(AppointmentStatus::Confirmed.notification_type()))
                    .filter(notifications::notifiable_type.eq(NOTIFIABLE_APPOINTMENT))
                    .filter(notifications::notifiable_id.eq(appointments::id)),
            )))
            .load::<Appointment>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn users_with_missing_notifications(&self) -> StoreResult<Vec<i32>> {
        let mut conn = self.conn().await?;
        let user_ids = appointments::table
            .filter(appointments::status.eq(AppointmentStatus::Confirmed.as_str()))
            .filter(appointments::deleted_at.is_null())
            .filter(not(exists(
                notifications::table
                    .filter(notifications::user_id.eq(appointments::user_id))
                    .filter(notifications::type_.eq(AppointmentStatus::Confirmed.notification_type()))
                    .filter(notifications::notifiable_type.eq(NOTIFIABLE_APPOINTMENT))
                    .filter(notifications::notifiable_id.eq(appointments::id)),
            )))
            .select(appointments::user_id)
            .distinct()
            .load::<i32>(&mut conn)
            .await?;
        Ok(user_ids)
    }

    async fn count_on_date(&self, date: NaiveDate) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        let count = appointments::table
            .filter(appointments::appointment_date.eq(date))
            .filter(appointments::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_unique(&self, notification: NewNotification) -> StoreResult<Option<i32>> {
        let mut conn = self.conn().await?;
        // ON CONFLICT DO NOTHING returns no row when the dedup key is
        // already present, which surfaces here as None.
        let id = diesel::insert_into(notifications::table)
            .values(&notification)
            .on_conflict((
                notifications::user_id,
                notifications::type_,
                notifications::notifiable_id,
            ))
            .do_nothing()
            .returning(notifications::id)
            .get_result::<i32>(&mut conn)
            .await
            .optional()?;
        Ok(id)
    }

    async fn list_for_user(&self, user_id: i32) -> StoreResult<Vec<Notification>> {
        let mut conn = self.conn().await?;
        let rows = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order(notifications::created_at.desc())
            .load::<Notification>(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn count_unread(&self, user_id: i32) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        let count = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::read_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)
            .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: i32, user_id: i32) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let affected = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::read_at.eq(diesel::dsl::now))
        .execute(&mut conn)
        .await?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn most_recent_admin(&self) -> StoreResult<Option<i32>> {
        let mut conn = self.conn().await?;
        let admin_id = users::table
            .filter(users::role.eq_any(["admin", "sub_admin"]))
            .filter(users::deleted_at.is_null())
            .order(users::last_activity.desc().nulls_last())
            .select(users::id)
            .first::<i32>(&mut conn)
            .await
            .optional()?;
        Ok(admin_id)
    }

    async fn latest_between(
        &self,
        pet_owner_id: i32,
        admin_id: i32,
    ) -> StoreResult<Option<Conversation>> {
        let mut conn = self.conn().await?;
        let conversation = conversations::table
            .filter(conversations::pet_owner_id.eq(pet_owner_id))
            .filter(conversations::admin_id.eq(admin_id))
            .order(conversations::updated_at.desc())
            .first::<Conversation>(&mut conn)
            .await
            .optional()?;
        Ok(conversation)
    }

    async fn create_if_absent(&self, conversation: NewConversation) -> StoreResult<Conversation> {
        let mut conn = self.conn().await?;
        let pet_owner_id = conversation.pet_owner_id;
        let admin_id = conversation.admin_id;

        let inserted = diesel::insert_into(conversations::table)
            .values(&conversation)
            .on_conflict((conversations::pet_owner_id, conversations::admin_id))
            .do_nothing()
            .get_result::<Conversation>(&mut conn)
            .await
            .optional()?;

        match inserted {
            Some(row) => Ok(row),
            // A concurrent caller won the insert; return its row.
            None => {
                let existing = conversations::table
                    .filter(conversations::pet_owner_id.eq(pet_owner_id))
                    .filter(conversations::admin_id.eq(admin_id))
                    .order(conversations::updated_at.desc())
                    .first::<Conversation>(&mut conn)
                    .await?;
                Ok(existing)
            }
        }
    }
}
