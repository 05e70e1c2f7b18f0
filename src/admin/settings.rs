use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{format::format_time_for_input, models::SystemSettings};

pub const DEFAULT_CLINIC_NAME: &str = "Clínica Veterinaria";
pub const DEFAULT_EMAIL_TEMPLATE: &str = "Estimado(a) {{nombre}},\n\nLe recordamos su cita programada para el {{fecha}} a las {{hora}}.\n\nSaludos cordiales,\nClínica Veterinaria";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralSettings {
    pub clinic_name: String,
    pub business_hours_start: String,
    pub business_hours_end: String,
    pub appointment_duration: Option<i64>,
    pub max_appointments_per_day: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationSettings {
    pub email_notifications: String,
    pub reminder_hours: Option<i64>,
    pub email_template: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralSettingsForm {
    #[serde(default)]
    pub clinic_name: String,
    #[serde(default)]
    pub business_hours_start: String,
    #[serde(default)]
    pub business_hours_end: String,
    #[serde(default)]
    pub appointment_duration: String,
    #[serde(default)]
    pub max_appointments_per_day: String,
}

impl GeneralSettingsForm {
    /// Numeric fields that do not parse go out as null.
    pub fn payload(&self) -> GeneralSettings {
        GeneralSettings {
            clinic_name: self.clinic_name.clone(),
            business_hours_start: self.business_hours_start.clone(),
            business_hours_end: self.business_hours_end.clone(),
            appointment_duration: self.appointment_duration.trim().parse().ok(),
            max_appointments_per_day: self.max_appointments_per_day.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationSettingsForm {
    #[serde(default)]
    pub email_notifications: String,
    #[serde(default)]
    pub reminder_hours: String,
    #[serde(default)]
    pub email_template: String,
}

impl NotificationSettingsForm {
    pub fn payload(&self) -> NotificationSettings {
        NotificationSettings {
            email_notifications: self.email_notifications.clone(),
            reminder_hours: self.reminder_hours.trim().parse().ok(),
            email_template: self.email_template.clone(),
        }
    }
}

/// Field values of the settings tab after applying defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsView {
    pub clinic_name: String,
    pub business_hours_start: String,
    pub business_hours_end: String,
    pub appointment_duration: String,
    pub max_appointments_per_day: String,
    pub email_notifications: String,
    pub reminder_hours: String,
    pub email_template: String,
}

impl SettingsView {
    pub fn from_settings(settings: &SystemSettings) -> Self {
        Self {
            clinic_name: settings.get("clinic_name", DEFAULT_CLINIC_NAME),
            business_hours_start: format_time_for_input(&settings.get("business_hours_start", "09:00")),
            business_hours_end: format_time_for_input(&settings.get("business_hours_end", "18:00")),
            appointment_duration: settings.get("appointment_duration", "30"),
            max_appointments_per_day: settings.get("max_appointments_per_day", "20"),
            email_notifications: settings.get("email_notifications", "true"),
            reminder_hours: settings.get("reminder_hours", "24"),
            email_template: settings.get("email_template", DEFAULT_EMAIL_TEMPLATE),
        }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.email_notifications == "true"
    }
}

pub fn backup_filename(date: NaiveDate) -> String {
    format!("veterinary_backup_{}.sql", date.format("%Y-%m-%d"))
}
