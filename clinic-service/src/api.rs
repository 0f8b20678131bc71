use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request, State},
    http::request::Parts,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{AppointmentStatus, TransitionPolicy, DAILY_CAPACITY};

use crate::conversations::ConversationRouter;
use crate::error::Error;
use crate::models::{Appointment, NewAppointment, Notification};
use crate::reconciler::Reconciler;
use crate::store::{AppointmentStore, NotificationStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub appointments: Arc<dyn AppointmentStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub reconciler: Arc<Reconciler>,
    pub conversations: Arc<ConversationRouter>,
    pub transition_policy: TransitionPolicy,
}

/// Query extractor whose rejection keeps the `{success, error}` response
/// envelope instead of axum's plain-text default.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|e| Error::Validation(e.body_text()))
    }
}

/// JSON body extractor with the same enveloped rejection.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| ApiJson(value))
            .map_err(|e| Error::Validation(e.body_text()))
    }
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub user_id: i32,
    pub pet_id: Option<i32>,
    pub pet_name: Option<String>,
    pub owner_name: String,
    pub reason_for_visit: String,
    pub appointment_date: String,
    pub appointment_time: String,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub original_appointment_id: i32,
    pub pet_id: Option<i32>,
    pub appointment_date: String,
    pub appointment_time: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub appointment_id: i32,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub notification_id: i32,
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub user_id: i32,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsResponse {
    pub success: bool,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Serialize)]
pub struct CreateAppointmentResponse {
    pub success: bool,
    pub appointment_id: i32,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub success: bool,
    pub available_slots: i64,
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub success: bool,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub success: bool,
    #[serde(rename = "hasUnread")]
    pub has_unread: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusChangesResponse {
    pub success: bool,
    pub new_notifications: usize,
    pub notification_ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct StartConversationResponse {
    pub success: bool,
    pub conversation_id: i32,
    pub admin_id: i32,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/appointments",
            get(list_appointments).post(create_appointment),
        )
        .route("/appointments/upcoming", get(upcoming_appointments))
        .route("/appointments/reschedule", post(reschedule_appointment))
        .route("/appointments/status", post(update_status))
        .route("/appointments/check_availability", get(check_availability))
        .route("/appointments/status_changes", get(status_changes))
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread", get(unread_notifications))
        .route("/notifications/mark_read", post(mark_read))
        .route("/conversations/start", post(start_conversation))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

fn parse_date(value: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::Validation(format!("invalid date: {}", value)))
}

fn parse_time(value: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| Error::Validation(format!("invalid time: {}", value)))
}

fn parse_status(value: &str) -> Result<AppointmentStatus, Error> {
    value.parse::<AppointmentStatus>().map_err(Error::Validation)
}

pub async fn list_appointments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<AppointmentsResponse>, Error> {
    let appointments = state
        .appointments
        .list_for_user(query.user_id)
        .await
        .map_err(|e| Error::from_store(e, "appointment"))?;

    Ok(Json(AppointmentsResponse {
        success: true,
        appointments,
    }))
}

pub async fn upcoming_appointments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<AppointmentsResponse>, Error> {
    let now = Local::now();
    let appointments = state
        .appointments
        .upcoming_for_user(query.user_id, now.date_naive(), now.time())
        .await
        .map_err(|e| Error::from_store(e, "appointment"))?;

    Ok(Json(AppointmentsResponse {
        success: true,
        appointments,
    }))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateAppointmentRequest>,
) -> Result<Json<CreateAppointmentResponse>, Error> {
    if request.owner_name.trim().is_empty() {
        return Err(Error::Validation("owner_name must not be empty".to_string()));
    }
    let date = parse_date(&request.appointment_date)?;
    let time = parse_time(&request.appointment_time)?;

    let appointment_id = state
        .appointments
        .create(NewAppointment {
            user_id: request.user_id,
            pet_id: request.pet_id,
            pet_name: request.pet_name,
            owner_name: request.owner_name,
            reason_for_visit: request.reason_for_visit,
            appointment_date: date,
            appointment_time: time,
            status: AppointmentStatus::Pending.as_str().to_string(),
        })
        .await
        .map_err(|e| Error::from_store(e, "appointment"))?;

    Ok(Json(CreateAppointmentResponse {
        success: true,
        appointment_id,
    }))
}

pub async fn reschedule_appointment(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RescheduleRequest>,
) -> Result<Json<OkResponse>, Error> {
    let date = parse_date(&request.appointment_date)?;
    let time = parse_time(&request.appointment_time)?;

    state
        .appointments
        .reschedule(request.original_appointment_id, request.pet_id, date, time)
        .await
        .map_err(|e| Error::from_store(e, "appointment"))?;

    Ok(Json(OkResponse { success: true }))
}

pub async fn update_status(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<Json<OkResponse>, Error> {
    let next = parse_status(&request.status)?;

    let current = state
        .appointments
        .current_status(request.appointment_id)
        .await
        .map_err(|e| Error::from_store(e, "appointment"))?;

    if !state.transition_policy.allows(current, next) {
        return Err(Error::Validation(format!(
            "cannot change status from {} to {}",
            current, next
        )));
    }

    state
        .appointments
        .update_status(request.appointment_id, current, next)
        .await
        .map_err(|e| Error::from_store(e, "appointment"))?;

    Ok(Json(OkResponse { success: true }))
}

pub async fn check_availability(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<Json<AvailabilityResponse>, Error> {
    let date = parse_date(&query.date)?;
    let count = state
        .appointments
        .count_on_date(date)
        .await
        .map_err(|e| Error::from_store(e, "appointment"))?;

    // Capacity is not enforced at booking time, so over-booked days
    // report a negative slot count.
    let available_slots = DAILY_CAPACITY - count;

    Ok(Json(AvailabilityResponse {
        success: true,
        available_slots,
        is_available: available_slots > 0,
    }))
}

pub async fn status_changes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<StatusChangesResponse>, Error> {
    let outcome = state
        .reconciler
        .reconcile_user(query.user_id)
        .await
        .map_err(|e| Error::from_store(e, "appointment"))?;

    Ok(Json(StatusChangesResponse {
        success: true,
        new_notifications: outcome.notification_ids.len(),
        notification_ids: outcome.notification_ids,
    }))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<NotificationsResponse>, Error> {
    let notifications = state
        .notifications
        .list_for_user(query.user_id)
        .await
        .map_err(|e| Error::from_store(e, "notification"))?;

    Ok(Json(NotificationsResponse {
        success: true,
        notifications,
    }))
}

pub async fn unread_notifications(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<UnreadResponse>, Error> {
    let unread = state
        .notifications
        .count_unread(query.user_id)
        .await
        .map_err(|e| Error::from_store(e, "notification"))?;

    Ok(Json(UnreadResponse {
        success: true,
        has_unread: unread > 0,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MarkReadRequest>,
) -> Result<Json<OkResponse>, Error> {
    state
        .notifications
        .mark_read(request.notification_id, request.user_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => Error::Unauthorized,
            StoreError::Unavailable(source) => Error::Transient(source),
        })?;

    Ok(Json(OkResponse { success: true }))
}

pub async fn start_conversation(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<StartConversationRequest>,
) -> Result<Json<StartConversationResponse>, Error> {
    let (conversation_id, admin_id) = state
        .conversations
        .start_conversation(request.user_id)
        .await?;

    Ok(Json(StartConversationResponse {
        success: true,
        conversation_id,
        admin_id,
    }))
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemStore;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(store: Arc<MemStore>, policy: TransitionPolicy) -> Router {
        let state = AppState {
            appointments: store.clone(),
            notifications: store.clone(),
            reconciler: Arc::new(Reconciler::new(store.clone(), store.clone())),
            conversations: Arc::new(ConversationRouter::new(store)),
            transition_policy: policy,
        };
        create_router(state)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn booking_then_listing_round_trips() {
        let store = Arc::new(MemStore::new());
        let app = app(store, TransitionPolicy::Strict);

        let (status, body) = post(
            &app,
            "/appointments",
            json!({
                "user_id": 7,
                "pet_id": 3,
                "pet_name": "Bella",
                "owner_name": "Sam Field",
                "reason_for_visit": "checkup",
                "appointment_date": "2026-09-01",
                "appointment_time": "10:30"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let id = body["appointment_id"].as_i64().unwrap();

        let (status, body) = get(&app, "/appointments?user_id=7").await;
        assert_eq!(status, StatusCode::OK);
        let appointments = body["appointments"].as_array().unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0]["id"].as_i64().unwrap(), id);
        assert_eq!(appointments[0]["status"], "pending");
    }

    #[tokio::test]
    async fn soft_deleted_appointments_are_absent_from_listing() {
        let store = Arc::new(MemStore::new());
        let kept = store.add_appointment(7, Some("Bella"), "confirmed", date(2026, 9, 1), time(9, 0));
        let gone = store.add_appointment(7, Some("Milo"), "confirmed", date(2026, 9, 2), time(9, 0));
        store.soft_delete(gone);

        let app = app(store, TransitionPolicy::Strict);
        let (_, body) = get(&app, "/appointments?user_id=7").await;

        let appointments = body["appointments"].as_array().unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0]["id"].as_i64().unwrap(), i64::from(kept));
    }

    #[tokio::test]
    async fn reschedule_updates_the_same_row() {
        let store = Arc::new(MemStore::new());
        let id = store.add_appointment(7, Some("Bella"), "pending", date(2026, 9, 1), time(9, 0));

        let app = app(store, TransitionPolicy::Strict);
        let (status, body) = post(
            &app,
            "/appointments/reschedule",
            json!({
                "original_appointment_id": id,
                "pet_id": 3,
                "appointment_date": "2026-09-15",
                "appointment_time": "14:00"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = get(&app, "/appointments?user_id=7").await;
        let appointments = body["appointments"].as_array().unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0]["id"].as_i64().unwrap(), i64::from(id));
        assert_eq!(appointments[0]["appointment_date"], "2026-09-15");
    }

    #[tokio::test]
    async fn reschedule_of_missing_appointment_is_not_found() {
        let app = app(Arc::new(MemStore::new()), TransitionPolicy::Strict);
        let (status, body) = post(
            &app,
            "/appointments/reschedule",
            json!({
                "original_appointment_id": 999,
                "appointment_date": "2026-09-15",
                "appointment_time": "14:00"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn unknown_status_value_is_rejected_without_side_effects() {
        let store = Arc::new(MemStore::new());
        let id = store.add_appointment(7, Some("Bella"), "pending", date(2026, 9, 1), time(9, 0));

        let app = app(store.clone(), TransitionPolicy::Strict);
        let (status, body) = post(
            &app,
            "/appointments/status",
            json!({ "appointment_id": id, "status": "archived" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(store.appointment_status(id), "pending");
    }

    #[tokio::test]
    async fn strict_policy_blocks_reopening_a_completed_appointment() {
        let store = Arc::new(MemStore::new());
        let id = store.add_appointment(7, Some("Bella"), "completed", date(2026, 9, 1), time(9, 0));

        let app = app(store.clone(), TransitionPolicy::Strict);
        let (status, _) = post(
            &app,
            "/appointments/status",
            json!({ "appointment_id": id, "status": "pending" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(store.appointment_status(id), "completed");
    }

    #[tokio::test]
    async fn permissive_policy_accepts_any_overwrite() {
        let store = Arc::new(MemStore::new());
        let id = store.add_appointment(7, Some("Bella"), "completed", date(2026, 9, 1), time(9, 0));

        let app = app(store.clone(), TransitionPolicy::Permissive);
        let (status, body) = post(
            &app,
            "/appointments/status",
            json!({ "appointment_id": id, "status": "pending" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(store.appointment_status(id), "pending");
    }

    #[tokio::test]
    async fn confirming_a_pending_appointment_succeeds() {
        let store = Arc::new(MemStore::new());
        let id = store.add_appointment(7, Some("Bella"), "pending", date(2026, 9, 1), time(9, 0));

        let app = app(store.clone(), TransitionPolicy::Strict);
        let (status, _) = post(
            &app,
            "/appointments/status",
            json!({ "appointment_id": id, "status": "confirmed" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.appointment_status(id), "confirmed");
    }

    #[tokio::test]
    async fn upcoming_skips_past_and_settled_appointments() {
        let store = Arc::new(MemStore::new());
        store.add_appointment(7, Some("Bella"), "confirmed", date(2020, 1, 1), time(9, 0));
        store.add_appointment(7, Some("Milo"), "cancelled", date(2030, 6, 1), time(9, 0));
        let later = store.add_appointment(7, Some("Rex"), "pending", date(2030, 6, 2), time(9, 0));
        let sooner =
            store.add_appointment(7, Some("Rex"), "confirmed", date(2030, 6, 1), time(10, 0));

        let app = app(store, TransitionPolicy::Strict);
        let (status, body) = get(&app, "/appointments/upcoming?user_id=7").await;

        assert_eq!(status, StatusCode::OK);
        let appointments = body["appointments"].as_array().unwrap();
        assert_eq!(appointments.len(), 2);
        assert_eq!(appointments[0]["id"].as_i64().unwrap(), i64::from(sooner));
        assert_eq!(appointments[1]["id"].as_i64().unwrap(), i64::from(later));
    }

    #[tokio::test]
    async fn availability_reflects_the_fixed_daily_capacity() {
        let store = Arc::new(MemStore::new());
        for _ in 0..7 {
            store.add_appointment(7, None, "pending", date(2026, 9, 1), time(9, 0));
        }

        let app = app(store.clone(), TransitionPolicy::Strict);
        let (_, body) = get(&app, "/appointments/check_availability?date=2026-09-01").await;
        assert_eq!(body["available_slots"], 3);
        assert_eq!(body["is_available"], true);

        for _ in 0..3 {
            store.add_appointment(7, None, "pending", date(2026, 9, 1), time(9, 0));
        }
        let (_, body) = get(&app, "/appointments/check_availability?date=2026-09-01").await;
        assert_eq!(body["available_slots"], 0);
        assert_eq!(body["is_available"], false);

        // Over-capacity days were never rejected at booking time, so the
        // count goes negative.
        store.add_appointment(7, None, "pending", date(2026, 9, 1), time(9, 0));
        let (_, body) = get(&app, "/appointments/check_availability?date=2026-09-01").await;
        assert_eq!(body["available_slots"], -1);
        assert_eq!(body["is_available"], false);
    }

    #[tokio::test]
    async fn status_changes_reports_new_notifications_once() {
        let store = Arc::new(MemStore::new());
        store.add_appointment(7, Some("Bella"), "confirmed", date(2026, 9, 1), time(10, 30));

        let app = app(store, TransitionPolicy::Strict);

        let (status, body) = get(&app, "/appointments/status_changes?user_id=7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["new_notifications"], 1);
        assert_eq!(body["notification_ids"].as_array().unwrap().len(), 1);

        let (_, body) = get(&app, "/appointments/status_changes?user_id=7").await;
        assert_eq!(body["new_notifications"], 0);
        assert_eq!(body["notification_ids"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unread_flag_clears_after_mark_read() {
        let store = Arc::new(MemStore::new());
        let notification_id = store.add_notification(7, "appointment_confirmed", 1);

        let app = app(store, TransitionPolicy::Strict);

        let (_, body) = get(&app, "/notifications/unread?user_id=7").await;
        assert_eq!(body["hasUnread"], true);

        let (status, _) = post(
            &app,
            "/notifications/mark_read",
            json!({ "notification_id": notification_id, "user_id": 7 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&app, "/notifications/unread?user_id=7").await;
        assert_eq!(body["hasUnread"], false);
    }

    #[tokio::test]
    async fn mark_read_rejects_a_foreign_notification() {
        let store = Arc::new(MemStore::new());
        let notification_id = store.add_notification(1, "appointment_confirmed", 1);

        let app = app(store.clone(), TransitionPolicy::Strict);
        let (status, body) = post(
            &app,
            "/notifications/mark_read",
            json!({ "notification_id": notification_id, "user_id": 2 }),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
        assert!(store.notification_read_at(notification_id).is_none());
    }

    #[tokio::test]
    async fn notification_listing_is_scoped_to_the_user() {
        let store = Arc::new(MemStore::new());
        store.add_notification(1, "appointment_confirmed", 1);
        store.add_notification(2, "appointment_confirmed", 2);

        let app = app(store, TransitionPolicy::Strict);
        let (_, body) = get(&app, "/notifications?user_id=1").await;

        let notifications = body["notifications"].as_array().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["user_id"], 1);
        assert_eq!(notifications[0]["type"], "appointment_confirmed");
    }

    #[tokio::test]
    async fn starting_a_conversation_returns_the_assigned_admin() {
        let store = Arc::new(MemStore::new());
        store.add_admin(10, "admin", Some(100));

        let app = app(store, TransitionPolicy::Strict);
        let (status, body) = post(&app, "/conversations/start", json!({ "user_id": 7 })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["admin_id"], 10);
        assert!(body["conversation_id"].as_i64().is_some());
    }

    #[tokio::test]
    async fn starting_a_conversation_without_admins_is_a_conflict() {
        let app = app(Arc::new(MemStore::new()), TransitionPolicy::Strict);
        let (status, body) = post(&app, "/conversations/start", json!({ "user_id": 7 })).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn missing_user_id_keeps_the_response_envelope() {
        let app = app(Arc::new(MemStore::new()), TransitionPolicy::Strict);
        let (status, body) = get(&app, "/appointments").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn malformed_json_body_keeps_the_response_envelope() {
        let app = app(Arc::new(MemStore::new()), TransitionPolicy::Strict);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/appointments/status")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn invalid_date_is_a_validation_error() {
        let app = app(Arc::new(MemStore::new()), TransitionPolicy::Strict);
        let (status, body) = get(&app, "/appointments/check_availability?date=tomorrow").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
