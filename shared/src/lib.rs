use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed number of appointment slots per calendar day.
pub const DAILY_CAPACITY: i64 = 10;

/// `notifiable_type` discriminator for appointment-sourced notifications.
pub const NOTIFIABLE_APPOINTMENT: &str = "appointment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Completed, cancelled and no_show accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
        )
    }

    /// Transition table for the appointment lifecycle:
    /// pending -> {confirmed, cancelled}, confirmed -> {completed,
    /// cancelled, no_show}. Setting the current status again is a no-op
    /// and always allowed.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            AppointmentStatus::Pending => matches!(
                next,
                AppointmentStatus::Confirmed | AppointmentStatus::Cancelled
            ),
            AppointmentStatus::Confirmed => matches!(
                next,
                AppointmentStatus::Completed
                    | AppointmentStatus::Cancelled
                    | AppointmentStatus::NoShow
            ),
            _ => false,
        }
    }

    /// Tag used for the notification `type` column, e.g.
    /// "appointment_confirmed".
    pub fn notification_type(&self) -> String {
        format!("appointment_{}", self.as_str())
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(format!("invalid appointment status: {}", other)),
        }
    }
}

/// Whether status updates honor the lifecycle table or accept any
/// overwrite. Legacy clients depended on unrestricted overwrites;
/// permissive mode keeps that available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicy {
    Strict,
    Permissive,
}

impl TransitionPolicy {
    pub fn allows(&self, from: AppointmentStatus, to: AppointmentStatus) -> bool {
        match self {
            TransitionPolicy::Strict => from.can_transition_to(to),
            TransitionPolicy::Permissive => true,
        }
    }
}

/// Opaque payload stored in the notification `data` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationData {
    pub message: String,
    pub appointment_id: i32,
}

/// "Mon DD, YYYY", e.g. "Aug 30, 2026".
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

/// 12-hour clock with AM/PM and no leading zero, e.g. "9:05 AM".
pub fn format_time_12h(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    let meridiem = if is_pm { "PM" } else { "AM" };
    format!("{}:{:02} {}", hour, time.minute(), meridiem)
}

/// Human-readable text for a status-change notification.
pub fn appointment_message(
    pet_name: &str,
    status: AppointmentStatus,
    date: NaiveDate,
    time: NaiveTime,
) -> String {
    format!(
        "Your appointment for {} on {} at {} has been {}.",
        pet_name,
        format_date(date),
        format_time_12h(time),
        status.as_str().replace('_', " "),
    )
}
