use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{admin::PetsEnvelope, ApiClient, ApiError};
use crate::models::{Appointment, AppointmentStatus, Notification, Pet, SessionUser, Veterinarian};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: SessionUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: String,
    pub specialization: String,
}

#[derive(Debug, Clone, Copy)]
pub enum AppointmentFilter {
    Client(i64),
    Veterinarian(i64),
}

impl AppointmentFilter {
    fn param(&self) -> (&'static str, String) {
        match self {
            AppointmentFilter::Client(id) => ("client_id", id.to_string()),
            AppointmentFilter::Veterinarian(id) => ("veterinarian_id", id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub client_id: i64,
    pub veterinarian_id: i64,
    pub pet_id: i64,
    pub appointment_date: String,
    pub appointment_time: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPet {
    pub owner_id: i64,
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub recipient_email: String,
    pub appointment_details: Value,
}

impl EmailRequest {
    pub fn appointment_confirmation(
        user: &SessionUser,
        appointment: &Appointment,
        veterinarian_name: &str,
        pet_name: &str,
    ) -> Self {
        Self {
            kind: "appointment_confirmation",
            recipient_email: user.email.clone(),
            appointment_details: json!({
                "user_id": user.id,
                "appointment_id": appointment.id,
                "client_name": user.display_name(),
                "date": appointment.appointment_date,
                "time": appointment.appointment_time,
                "veterinarian_name": veterinarian_name,
                "pet_name": pet_name,
                "reason": appointment.reason,
            }),
        }
    }
}

#[derive(Deserialize)]
struct VeterinariansEnvelope {
    #[serde(default)]
    veterinarians: Vec<Veterinarian>,
}

#[derive(Deserialize)]
struct AppointmentsEnvelope {
    #[serde(default)]
    appointments: Vec<Appointment>,
}

#[derive(Deserialize)]
struct AppointmentEnvelope {
    appointment: Appointment,
}

#[derive(Deserialize)]
struct NotificationsEnvelope {
    #[serde(default)]
    notifications: Vec<Notification>,
}

#[derive(Deserialize)]
struct SlotsEnvelope {
    #[serde(default)]
    available_slots: Vec<String>,
}

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.send(
            self.request(Method::POST, "/api/auth/login")
                .json(&json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn register(&self, payload: &RegisterPayload) -> Result<LoginResponse, ApiError> {
        self.send(self.request(Method::POST, "/api/auth/register").json(payload))
            .await
    }

    pub async fn veterinarians(&self) -> Result<Vec<Veterinarian>, ApiError> {
        let envelope: VeterinariansEnvelope = self
            .send(self.request(Method::GET, "/api/auth/veterinarians"))
            .await?;
        Ok(envelope.veterinarians)
    }

    pub async fn appointments(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, ApiError> {
        let builder = self
            .request(Method::GET, "/api/appointments/appointments")
            .query(&[filter.param()]);
        let envelope: AppointmentsEnvelope = self.send(builder).await?;
        Ok(envelope.appointments)
    }

    pub async fn create_appointment(&self, appointment: &NewAppointment) -> Result<Appointment, ApiError> {
        let envelope: AppointmentEnvelope = self
            .send(
                self.request(Method::POST, "/api/appointments/appointments")
                    .json(appointment),
            )
            .await?;
        Ok(envelope.appointment)
    }

    pub async fn cancel_appointment(&self, id: i64) -> Result<(), ApiError> {
        let path = format!("/api/appointments/appointments/{id}");
        self.send_unit(self.request(Method::DELETE, &path)).await
    }

    pub async fn update_appointment_status(
        &self,
        id: i64,
        status: AppointmentStatus,
    ) -> Result<(), ApiError> {
        let path = format!("/api/appointments/{id}");
        self.send_unit(
            self.request(Method::PUT, &path)
                .json(&json!({ "status": status })),
        )
        .await
    }

    pub async fn pets_for_owner(&self, owner_id: i64) -> Result<Vec<Pet>, ApiError> {
        let path = format!("/api/appointments/pets/{owner_id}");
        let envelope: PetsEnvelope = self.send(self.request(Method::GET, &path)).await?;
        Ok(envelope.pets)
    }

    pub async fn create_pet(&self, pet: &NewPet) -> Result<Value, ApiError> {
        self.send(self.request(Method::POST, "/api/appointments/pets").json(pet))
            .await
    }

    pub async fn available_slots(&self, veterinarian_id: i64, date: &str) -> Result<Vec<String>, ApiError> {
        let path = format!("/api/appointments/available-slots/{veterinarian_id}");
        let envelope: SlotsEnvelope = self
            .send(self.request(Method::GET, &path).query(&[("date", date)]))
            .await?;
        Ok(envelope.available_slots)
    }

    pub async fn pending_notifications(&self, user_id: i64) -> Result<Vec<Notification>, ApiError> {
        let path = format!("/api/notifications/notifications/{user_id}");
        let envelope: NotificationsEnvelope = self
            .send(self.request(Method::GET, &path).query(&[("status", "pending")]))
            .await?;
        Ok(envelope.notifications)
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<(), ApiError> {
        let path = format!("/api/notifications/{id}/mark-read");
        self.send_unit(self.request(Method::PUT, &path)).await
    }

    pub async fn send_email(&self, request: &EmailRequest) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::POST, "/api/notifications/send-email")
                .json(request),
        )
        .await
    }
}
