use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Veterinarian,
    Receptionist,
    Assistant,
    Client,
}

impl Role {
    pub const STAFF: [Role; 4] = [
        Role::Admin,
        Role::Veterinarian,
        Role::Receptionist,
        Role::Assistant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Veterinarian => "veterinarian",
            Role::Receptionist => "receptionist",
            Role::Assistant => "assistant",
            Role::Client => "client",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "admin" => Some(Role::Admin),
            "veterinarian" => Some(Role::Veterinarian),
            "receptionist" => Some(Role::Receptionist),
            "assistant" => Some(Role::Assistant),
            "client" => Some(Role::Client),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[serde(rename = "scheduled")]
    Scheduled,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "no-show")]
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "no-show" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub specialization: Option<String>,
    pub is_active: bool,
}

impl StaffMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    #[serde(default)]
    pub client_id: Option<i64>,
    pub veterinarian_id: i64,
    pub pet_id: i64,
    pub appointment_date: String,
    pub appointment_time: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSchedule {
    #[serde(default)]
    pub id: Option<i64>,
    pub staff_id: i64,
    pub day_of_week: u8,
    pub is_available: bool,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub break_start: Option<String>,
    #[serde(default)]
    pub break_end: Option<String>,
    #[serde(default)]
    pub appointment_duration: Option<u32>,
    #[serde(default)]
    pub max_appointments: Option<u32>,
}

impl StaffSchedule {
    /// Both ends of the break must be present for the break to count.
    pub fn break_window(&self) -> Option<(&str, &str)> {
        match (self.break_start.as_deref(), self.break_end.as_deref()) {
            (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSettings(pub BTreeMap<String, Value>);

impl SystemSettings {
    /// Missing keys and falsy values (null, "", false, 0) fall back to `default`.
    pub fn get(&self, key: &str, default: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) => default.to_string(),
            Some(Value::Bool(false)) => default.to_string(),
            Some(Value::Bool(true)) => "true".to_string(),
            Some(Value::String(value)) if value.is_empty() => default.to_string(),
            Some(Value::String(value)) => value.clone(),
            Some(Value::Number(number)) if number.as_f64() == Some(0.0) => default.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientStats {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub active: i64,
    #[serde(default)]
    pub total_pets: i64,
    #[serde(default)]
    pub avg_pets_per_client: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffStats {
    #[serde(default)]
    pub veterinarians: i64,
    #[serde(default)]
    pub receptionists: i64,
    #[serde(default)]
    pub assistants: i64,
    #[serde(default)]
    pub clients: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentStats {
    #[serde(default)]
    pub today: i64,
    #[serde(default)]
    pub scheduled: i64,
    #[serde(default)]
    pub completed: i64,
    #[serde(default)]
    pub cancelled: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyScheduleResult {
    #[serde(default)]
    pub success_count: i64,
    #[serde(default)]
    pub error_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl SessionUser {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Veterinarian {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub specialization: Option<String>,
}
