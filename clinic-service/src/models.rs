use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = crate::schema::appointments)]
pub struct Appointment {
    pub id: i32,
    pub user_id: i32,
    pub pet_id: Option<i32>,
    pub pet_name: Option<String>,
    pub owner_name: String,
    pub reason_for_visit: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::appointments)]
pub struct NewAppointment {
    pub user_id: i32,
    pub pet_id: Option<i32>,
    pub pet_name: Option<String>,
    pub owner_name: String,
    pub reason_for_visit: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = crate::schema::notifications)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    #[serde(rename = "type")]
    pub type_: String,
    pub notifiable_type: String,
    pub notifiable_id: i32,
    pub data: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub user_id: i32,
    pub type_: String,
    pub notifiable_type: String,
    pub notifiable_id: i32,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = crate::schema::conversations)]
pub struct Conversation {
    pub id: i32,
    pub pet_owner_id: i32,
    pub admin_id: i32,
    pub unique_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::conversations)]
pub struct NewConversation {
    pub pet_owner_id: i32,
    pub admin_id: i32,
    pub unique_key: String,
}
