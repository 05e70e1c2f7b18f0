use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{
    multipart::{Form, Part},
    Method,
};
use serde::Deserialize;
use serde_json::json;

use super::{decode, ApiClient, ApiError, AppointmentFilter};
use crate::{
    admin::{
        schedule::{CopyScheduleRequest, SchedulePayload},
        settings::{GeneralSettings, NotificationSettings},
        staff::{StaffPayload, StaffQuery},
    },
    models::{
        Appointment, AppointmentStats, Client, ClientStats, CopyScheduleResult, Pet,
        StaffMember, StaffSchedule, StaffStats, SystemSettings,
    },
};

/// Backend calls issued by the admin panel.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn staff_stats(&self) -> Result<StaffStats, ApiError>;
    async fn appointment_stats(&self, date: NaiveDate) -> Result<AppointmentStats, ApiError>;

    async fn list_staff(&self, query: &StaffQuery) -> Result<Vec<StaffMember>, ApiError>;
    async fn create_staff(&self, payload: &StaffPayload) -> Result<(), ApiError>;
    async fn update_staff(&self, id: i64, payload: &StaffPayload) -> Result<(), ApiError>;
    async fn set_staff_active(&self, id: i64, active: bool) -> Result<(), ApiError>;

    async fn list_clients(&self, is_active: Option<bool>) -> Result<Vec<Client>, ApiError>;
    async fn client_stats(&self) -> Result<ClientStats, ApiError>;
    async fn set_client_active(&self, id: i64, active: bool) -> Result<(), ApiError>;
    async fn client_pets(&self, client_id: i64) -> Result<Vec<Pet>, ApiError>;
    async fn client_appointments(&self, client_id: i64) -> Result<Vec<Appointment>, ApiError>;

    async fn staff_schedules(&self, staff_id: i64) -> Result<Vec<StaffSchedule>, ApiError>;
    async fn save_schedule(
        &self,
        schedule_id: Option<i64>,
        payload: &SchedulePayload,
    ) -> Result<(), ApiError>;
    async fn copy_schedules(
        &self,
        request: &CopyScheduleRequest,
    ) -> Result<CopyScheduleResult, ApiError>;

    /// `None` when the backend answered without a `settings` object.
    async fn settings(&self) -> Result<Option<SystemSettings>, ApiError>;
    async fn save_general_settings(&self, settings: &GeneralSettings) -> Result<(), ApiError>;
    async fn save_notification_settings(
        &self,
        settings: &NotificationSettings,
    ) -> Result<(), ApiError>;
    async fn download_backup(&self) -> Result<Vec<u8>, ApiError>;
    async fn restore_backup(&self, filename: &str, body: Vec<u8>) -> Result<(), ApiError>;
}

#[derive(Deserialize)]
struct StaffEnvelope {
    #[serde(default)]
    staff: Vec<StaffMember>,
}

#[derive(Deserialize)]
struct ClientsEnvelope {
    #[serde(default)]
    clients: Vec<Client>,
}

#[derive(Deserialize)]
struct ClientStatsEnvelope {
    #[serde(default)]
    stats: ClientStats,
}

#[derive(Deserialize)]
struct StaffStatsEnvelope {
    #[serde(default)]
    staff_stats: StaffStats,
}

#[derive(Deserialize)]
struct AppointmentStatsEnvelope {
    #[serde(default)]
    appointment_stats: AppointmentStats,
}

#[derive(Deserialize)]
struct SchedulesEnvelope {
    #[serde(default)]
    schedules: Vec<StaffSchedule>,
}

#[derive(Deserialize)]
struct SettingsEnvelope {
    settings: Option<SystemSettings>,
}

#[derive(Deserialize)]
pub(super) struct PetsEnvelope {
    #[serde(default)]
    pub(super) pets: Vec<Pet>,
}

#[async_trait]
impl AdminApi for ApiClient {
    async fn staff_stats(&self) -> Result<StaffStats, ApiError> {
        let envelope: StaffStatsEnvelope = self
            .send(self.request(Method::GET, "/api/admin/dashboard/stats"))
            .await?;
        Ok(envelope.staff_stats)
    }

    async fn appointment_stats(&self, date: NaiveDate) -> Result<AppointmentStats, ApiError> {
        let builder = self
            .request(Method::GET, "/api/appointments/appointments/stats")
            .query(&[("date", date.format("%Y-%m-%d").to_string())]);
        let envelope: AppointmentStatsEnvelope = self.send(builder).await?;
        Ok(envelope.appointment_stats)
    }

    async fn list_staff(&self, query: &StaffQuery) -> Result<Vec<StaffMember>, ApiError> {
        let builder = self
            .request(Method::GET, "/api/admin/staff")
            .query(&query.to_params());
        let envelope: StaffEnvelope = self.send(builder).await?;
        Ok(envelope.staff)
    }

    async fn create_staff(&self, payload: &StaffPayload) -> Result<(), ApiError> {
        self.send_unit(self.request(Method::POST, "/api/admin/staff").json(payload))
            .await
    }

    async fn update_staff(&self, id: i64, payload: &StaffPayload) -> Result<(), ApiError> {
        let path = format!("/api/admin/staff/{id}");
        self.send_unit(self.request(Method::PUT, &path).json(payload))
            .await
    }

    async fn set_staff_active(&self, id: i64, active: bool) -> Result<(), ApiError> {
        let path = format!("/api/admin/staff/{id}");
        self.send_unit(
            self.request(Method::PUT, &path)
                .json(&json!({ "is_active": active })),
        )
        .await
    }

    async fn list_clients(&self, is_active: Option<bool>) -> Result<Vec<Client>, ApiError> {
        let mut builder = self.request(Method::GET, "/api/admin/clients");
        if let Some(active) = is_active {
            builder = builder.query(&[("is_active", active.to_string())]);
        }
        let envelope: ClientsEnvelope = self.send(builder).await?;
        Ok(envelope.clients)
    }

    async fn client_stats(&self) -> Result<ClientStats, ApiError> {
        let envelope: ClientStatsEnvelope = self
            .send(self.request(Method::GET, "/api/admin/clients/stats"))
            .await?;
        Ok(envelope.stats)
    }

    async fn set_client_active(&self, id: i64, active: bool) -> Result<(), ApiError> {
        let path = format!("/api/admin/clients/{id}");
        self.send_unit(
            self.request(Method::PUT, &path)
                .json(&json!({ "is_active": active })),
        )
        .await
    }

    async fn client_pets(&self, client_id: i64) -> Result<Vec<Pet>, ApiError> {
        self.pets_for_owner(client_id).await
    }

    async fn client_appointments(&self, client_id: i64) -> Result<Vec<Appointment>, ApiError> {
        self.appointments(AppointmentFilter::Client(client_id)).await
    }

    async fn staff_schedules(&self, staff_id: i64) -> Result<Vec<StaffSchedule>, ApiError> {
        let path = format!("/api/schedules/staff-schedules/{staff_id}");
        let envelope: SchedulesEnvelope = self.send(self.request(Method::GET, &path)).await?;
        Ok(envelope.schedules)
    }

    async fn save_schedule(
        &self,
        schedule_id: Option<i64>,
        payload: &SchedulePayload,
    ) -> Result<(), ApiError> {
        let builder = match schedule_id {
            Some(id) => self.request(Method::PUT, &format!("/api/schedules/staff-schedules/{id}")),
            None => self.request(Method::POST, "/api/schedules/staff-schedules"),
        };
        self.send_unit(builder.json(payload)).await
    }

    async fn copy_schedules(
        &self,
        request: &CopyScheduleRequest,
    ) -> Result<CopyScheduleResult, ApiError> {
        self.send(
            self.request(Method::POST, "/api/schedules/staff-schedules/copy")
                .json(request),
        )
        .await
    }

    async fn settings(&self) -> Result<Option<SystemSettings>, ApiError> {
        let envelope: SettingsEnvelope = self
            .send(self.request(Method::GET, "/api/admin/settings"))
            .await?;
        Ok(envelope.settings)
    }

    async fn save_general_settings(&self, settings: &GeneralSettings) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::PUT, "/api/admin/settings/general")
                .json(settings),
        )
        .await
    }

    async fn save_notification_settings(
        &self,
        settings: &NotificationSettings,
    ) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::PUT, "/api/admin/settings/notifications")
                .json(settings),
        )
        .await
    }

    async fn download_backup(&self) -> Result<Vec<u8>, ApiError> {
        let response = self
            .request(Method::GET, "/api/admin/settings/backup")
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            // Surfaces an `error` message when the body carries one.
            let _: serde_json::Value = decode(status, &body)?;
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(body.to_vec())
    }

    async fn restore_backup(&self, filename: &str, body: Vec<u8>) -> Result<(), ApiError> {
        let form = Form::new().part("backup_file", Part::bytes(body).file_name(filename.to_string()));
        self.send_unit(
            self.request(Method::POST, "/api/admin/settings/restore")
                .multipart(form),
        )
        .await
    }
}
