//! Admin panel view-model.
//!
//! One [`AdminState`] lives in each signed-in admin's session. [`AdminPanel`]
//! runs the panel's operations against an [`AdminApi`] and writes the results
//! back into that state, which the templates then render.

pub mod schedule;
pub mod settings;
pub mod staff;

use std::{collections::BTreeMap, sync::Arc};

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    api::{AdminApi, ApiError},
    format::parse_date,
    models::{
        Appointment, AppointmentStats, Client, ClientStats, Pet, StaffMember, StaffSchedule,
        StaffStats, SystemSettings,
    },
};

use schedule::{CopyScheduleForm, CopyScheduleRequest, CopyTarget, DayView, ScheduleDayForm};
use settings::{GeneralSettings, NotificationSettings, SettingsView};
use staff::{filter_records, Searchable, StaffForm, StaffQuery};

pub type SharedAdminState = Arc<Mutex<AdminState>>;

pub const SELECT_STAFF: &str = "Por favor seleccione un miembro del personal";
pub const INVALID_DAY: &str = "Día de la semana no válido";
pub const RESTORE_PROMPT: &str =
    "¿Está seguro de restaurar la base de datos? Esta acción sobrescribirá todos los datos actuales.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Dashboard,
    Staff,
    Clients,
    Schedules,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Dashboard,
        Tab::Staff,
        Tab::Clients,
        Tab::Schedules,
        Tab::Settings,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dashboard" => Some(Tab::Dashboard),
            "staff" => Some(Tab::Staff),
            "clients" => Some(Tab::Clients),
            "schedules" => Some(Tab::Schedules),
            "settings" => Some(Tab::Settings),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Dashboard => "dashboard",
            Tab::Staff => "staff",
            Tab::Clients => "clients",
            Tab::Schedules => "schedules",
            Tab::Settings => "settings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Staff => "Personal",
            Tab::Clients => "Clientes",
            Tab::Schedules => "Horarios",
            Tab::Settings => "Configuración",
        }
    }
}

/// Flash message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice::Success(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice::Error(message.into())
    }

    /// `Error: <backend message>` for backend rejections, `fallback` otherwise.
    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        Notice::Error(err.user_message(fallback))
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Success(message) | Notice::Error(message) => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

/// Independently reloadable parts of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadKind {
    Dashboard,
    Staff,
    Clients,
    ClientStats,
    ClientDetails,
    ScheduleStaff,
    Schedules,
    Settings,
}

/// Taken before a load starts; the result is applied only while it is still
/// the newest ticket of its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    kind: LoadKind,
    generation: u64,
}

#[derive(Debug, Default)]
struct Generations(BTreeMap<LoadKind, u64>);

impl Generations {
    fn begin(&mut self, kind: LoadKind) -> Ticket {
        let generation = self.0.entry(kind).or_insert(0);
        *generation += 1;
        Ticket {
            kind,
            generation: *generation,
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.0.get(&ticket.kind) == Some(&ticket.generation)
    }
}

#[derive(Debug, Clone)]
pub struct ClientRow {
    pub client: Client,
    pub pet_count: usize,
    pub appointment_count: usize,
}

impl Searchable for ClientRow {
    fn full_name(&self) -> String {
        self.client.full_name()
    }

    fn email(&self) -> &str {
        &self.client.email
    }
}

#[derive(Debug, Clone)]
pub struct ClientDetails {
    pub client: Client,
    pub pets: Vec<Pet>,
    pub pets_error: bool,
    pub appointments: Vec<Appointment>,
    pub appointments_error: bool,
}

/// Appointment history is shown most recent first.
pub fn sort_most_recent_first(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| {
        parse_date(&b.appointment_date).cmp(&parse_date(&a.appointment_date))
    });
}

#[derive(Debug, Clone)]
pub enum Modal {
    Staff(StaffForm),
    ClientDetails(Box<ClientDetails>),
    ScheduleDay(ScheduleDayForm),
    CopySchedule(CopyScheduleForm),
    ConfirmRestore,
}

/// The chosen backup file, kept until the admin confirms.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreUpload {
    pub filename: String,
    pub body: Vec<u8>,
}

pub struct BackupFile {
    pub filename: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct AdminState {
    pub tab: Tab,
    pub staff_stats: StaffStats,
    pub appointment_stats: AppointmentStats,

    pub staff: Vec<StaffMember>,
    pub staff_query: StaffQuery,
    pub staff_search: String,

    pub clients: Vec<ClientRow>,
    pub client_status: Option<bool>,
    pub client_search: String,
    pub client_stats: ClientStats,
    pub current_client_id: Option<i64>,

    pub schedule_staff: Vec<StaffMember>,
    pub current_staff_id: Option<i64>,
    pub current_staff_schedules: BTreeMap<u8, StaffSchedule>,

    pub settings: SystemSettings,
    pub modal: Option<Modal>,
    pending_restore: Option<RestoreUpload>,
    generations: Generations,
}

impl AdminState {
    pub fn shared() -> SharedAdminState {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn begin(&mut self, kind: LoadKind) -> Ticket {
        self.generations.begin(kind)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generations.is_current(ticket)
    }

    /// False until the first load of any kind has started.
    pub fn has_loaded(&self) -> bool {
        !self.generations.0.is_empty()
    }

    pub fn staged_restore(&self) -> Option<&RestoreUpload> {
        self.pending_restore.as_ref()
    }

    pub fn filtered_staff(&self) -> Vec<&StaffMember> {
        filter_records(&self.staff, &self.staff_search)
    }

    pub fn filtered_clients(&self) -> Vec<&ClientRow> {
        filter_records(&self.clients, &self.client_search)
    }

    pub fn week(&self) -> Vec<DayView> {
        schedule::week_view(&self.current_staff_schedules)
    }

    pub fn settings_view(&self) -> SettingsView {
        SettingsView::from_settings(&self.settings)
    }

    pub fn current_staff_label(&self) -> Option<String> {
        let id = self.current_staff_id?;
        self.schedule_staff
            .iter()
            .find(|member| member.id == id)
            .map(schedule_option_label)
    }

    pub fn close_modal(&mut self) {
        if matches!(self.modal, Some(Modal::ClientDetails(_))) {
            self.current_client_id = None;
        }
        if matches!(self.modal, Some(Modal::ConfirmRestore)) {
            self.pending_restore = None;
        }
        self.modal = None;
    }
}

/// Text of an entry in the schedule staff selector.
pub fn schedule_option_label(member: &StaffMember) -> String {
    format!(
        "{} - {}",
        member.full_name(),
        member.specialization.as_deref().unwrap_or("Sin especialidad")
    )
}

fn activation_word(activate: bool) -> &'static str {
    if activate {
        "activado"
    } else {
        "desactivado"
    }
}

pub struct AdminPanel<A> {
    api: A,
    state: SharedAdminState,
}

impl<A: AdminApi> AdminPanel<A> {
    pub fn new(api: A, state: SharedAdminState) -> Self {
        Self { api, state }
    }

    pub fn state(&self) -> &SharedAdminState {
        &self.state
    }

    pub async fn switch_tab(&self, tab: Tab, today: NaiveDate) -> Option<Notice> {
        {
            let mut state = self.state.lock();
            state.tab = tab;
            state.close_modal();
        }
        match tab {
            Tab::Dashboard => {
                self.load_dashboard(today).await;
                None
            }
            Tab::Staff => {
                self.load_staff().await;
                None
            }
            Tab::Clients => {
                self.load_clients().await;
                self.load_client_stats().await;
                None
            }
            Tab::Schedules => {
                self.load_staff_for_schedules().await;
                None
            }
            Tab::Settings => self.load_settings().await,
        }
    }

    pub async fn load_dashboard(&self, today: NaiveDate) {
        let ticket = self.state.lock().begin(LoadKind::Dashboard);
        let (staff_stats, appointment_stats) =
            tokio::join!(self.api.staff_stats(), self.api.appointment_stats(today));

        let mut state = self.state.lock();
        if !state.is_current(ticket) {
            return;
        }
        match staff_stats {
            Ok(stats) => state.staff_stats = stats,
            Err(err) => log::warn!("Error loading dashboard stats: {err}"),
        }
        match appointment_stats {
            Ok(stats) => state.appointment_stats = stats,
            Err(err) => log::warn!("Error loading appointment stats: {err}"),
        }
    }

    // ----- staff -----

    pub async fn load_staff(&self) {
        let (ticket, query) = {
            let mut state = self.state.lock();
            (state.begin(LoadKind::Staff), state.staff_query.clone())
        };
        match self.api.list_staff(&query).await {
            Ok(staff) => {
                let mut state = self.state.lock();
                if state.is_current(ticket) {
                    state.staff = staff;
                }
            }
            Err(err) => log::warn!("Error loading staff list: {err}"),
        }
    }

    /// Role / status selectors query the backend again.
    pub async fn filter_staff(&self, query: StaffQuery) {
        self.state.lock().staff_query = query;
        self.load_staff().await;
    }

    /// Search text only narrows the cached list.
    pub fn search_staff(&self, search: &str) {
        self.state.lock().staff_search = search.to_string();
    }

    pub fn open_add_staff(&self) {
        self.state.lock().modal = Some(Modal::Staff(StaffForm::blank()));
    }

    pub fn edit_staff(&self, id: i64) {
        let mut state = self.state.lock();
        let form = state
            .staff
            .iter()
            .find(|member| member.id == id)
            .map(StaffForm::from_member);
        if let Some(form) = form {
            state.modal = Some(Modal::Staff(form));
        }
    }

    pub async fn save_staff(&self, form: StaffForm) -> Notice {
        let payload = form.payload();
        let result = match form.staff_id() {
            Some(id) => self.api.update_staff(id, &payload).await,
            None => self.api.create_staff(&payload).await,
        };

        match result {
            Ok(()) => {
                self.state.lock().close_modal();
                self.load_staff().await;
                Notice::success(if form.is_new() {
                    "Personal agregado con éxito"
                } else {
                    "Personal actualizado con éxito"
                })
            }
            Err(err) => {
                log::warn!("Error saving staff: {err}");
                self.state.lock().modal = Some(Modal::Staff(form));
                Notice::from_api(&err, "Error al guardar. Por favor intente nuevamente.")
            }
        }
    }

    /// Returns `None` without touching the backend when `confirm` declines.
    pub async fn toggle_staff_status(
        &self,
        id: i64,
        activate: bool,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Option<Notice> {
        if !confirm(&staff::toggle_staff_prompt(activate)) {
            return None;
        }
        match self.api.set_staff_active(id, activate).await {
            Ok(()) => {
                self.load_staff().await;
                Some(Notice::success(format!(
                    "El estado del personal ha sido {} exitosamente",
                    activation_word(activate)
                )))
            }
            Err(err) => {
                log::warn!("Error toggling staff status: {err}");
                Some(Notice::from_api(
                    &err,
                    "Error al cambiar el estado. Por favor intente nuevamente.",
                ))
            }
        }
    }

    // ----- clients -----

    /// Pet and appointment counts are fetched per listed client; a failed
    /// count shows as zero.
    pub async fn load_clients(&self) {
        let (ticket, status) = {
            let mut state = self.state.lock();
            (state.begin(LoadKind::Clients), state.client_status)
        };
        let clients = match self.api.list_clients(status).await {
            Ok(clients) => clients,
            Err(err) => {
                log::warn!("Error loading clients list: {err}");
                return;
            }
        };

        let mut rows = Vec::with_capacity(clients.len());
        for client in clients {
            let (pets, appointments) = tokio::join!(
                self.api.client_pets(client.id),
                self.api.client_appointments(client.id)
            );
            rows.push(ClientRow {
                pet_count: pets.map(|pets| pets.len()).unwrap_or(0),
                appointment_count: appointments.map(|list| list.len()).unwrap_or(0),
                client,
            });
        }

        let mut state = self.state.lock();
        if state.is_current(ticket) {
            state.clients = rows;
        }
    }

    pub async fn filter_clients(&self, status: Option<bool>) {
        self.state.lock().client_status = status;
        self.load_clients().await;
    }

    pub fn search_clients(&self, search: &str) {
        self.state.lock().client_search = search.to_string();
    }

    pub async fn load_client_stats(&self) {
        let ticket = self.state.lock().begin(LoadKind::ClientStats);
        match self.api.client_stats().await {
            Ok(stats) => {
                let mut state = self.state.lock();
                if state.is_current(ticket) {
                    state.client_stats = stats;
                }
            }
            Err(err) => log::warn!("Error loading client stats: {err}"),
        }
    }

    pub async fn view_client_details(&self, client_id: i64) {
        let (ticket, client) = {
            let mut state = self.state.lock();
            let Some(client) = state
                .clients
                .iter()
                .find(|row| row.client.id == client_id)
                .map(|row| row.client.clone())
            else {
                return;
            };
            state.current_client_id = Some(client_id);
            (state.begin(LoadKind::ClientDetails), client)
        };

        let (pets, appointments) = tokio::join!(
            self.api.client_pets(client_id),
            self.api.client_appointments(client_id)
        );

        let pets_error = pets.is_err();
        if let Err(err) = &pets {
            log::warn!("Error loading client pets: {err}");
        }
        let appointments_error = appointments.is_err();
        if let Err(err) = &appointments {
            log::warn!("Error loading client appointments: {err}");
        }
        let mut appointments = appointments.unwrap_or_default();
        sort_most_recent_first(&mut appointments);

        let details = ClientDetails {
            client,
            pets: pets.unwrap_or_default(),
            pets_error,
            appointments,
            appointments_error,
        };

        let mut state = self.state.lock();
        if state.is_current(ticket) && state.current_client_id == Some(client_id) {
            state.modal = Some(Modal::ClientDetails(Box::new(details)));
        }
    }

    pub fn close_modal(&self) {
        self.state.lock().close_modal();
    }

    /// Flips the client shown in the details modal.
    pub async fn toggle_client_status(&self, confirm: impl FnOnce(&str) -> bool) -> Option<Notice> {
        let (client_id, activate) = {
            let state = self.state.lock();
            let client_id = state.current_client_id?;
            let row = state.clients.iter().find(|row| row.client.id == client_id)?;
            (client_id, !row.client.is_active)
        };

        if !confirm(&staff::toggle_client_prompt(activate)) {
            return None;
        }

        match self.api.set_client_active(client_id, activate).await {
            Ok(()) => {
                self.state.lock().close_modal();
                self.load_clients().await;
                self.load_client_stats().await;
                Some(Notice::success(format!(
                    "El cliente ha sido {} exitosamente",
                    activation_word(activate)
                )))
            }
            Err(err) => {
                log::warn!("Error toggling client status: {err}");
                Some(Notice::from_api(
                    &err,
                    "Error al cambiar el estado del cliente. Por favor intente nuevamente.",
                ))
            }
        }
    }

    // ----- schedules -----

    pub async fn load_staff_for_schedules(&self) {
        let ticket = self.state.lock().begin(LoadKind::ScheduleStaff);
        match self.api.list_staff(&StaffQuery::active_veterinarians()).await {
            Ok(staff) => {
                let mut state = self.state.lock();
                if state.is_current(ticket) {
                    state.schedule_staff = staff;
                }
            }
            Err(err) => log::warn!("Error loading staff for schedules: {err}"),
        }
    }

    /// Replaces the week view with the server's copy; nothing is merged locally.
    pub async fn load_staff_schedules(&self, staff_id: Option<i64>) -> Option<Notice> {
        let Some(staff_id) = staff_id else {
            return Some(Notice::error(SELECT_STAFF));
        };
        let ticket = {
            let mut state = self.state.lock();
            if state.current_staff_id != Some(staff_id) {
                state.current_staff_schedules.clear();
            }
            state.current_staff_id = Some(staff_id);
            state.begin(LoadKind::Schedules)
        };

        match self.api.staff_schedules(staff_id).await {
            Ok(schedules) => {
                let mut state = self.state.lock();
                if state.is_current(ticket) {
                    state.current_staff_schedules = schedules
                        .into_iter()
                        .map(|schedule| (schedule.day_of_week, schedule))
                        .collect();
                }
                None
            }
            Err(err) => {
                log::warn!("Error loading staff schedules: {err}");
                Some(Notice::error(
                    "Error al cargar los horarios. Por favor intente nuevamente.",
                ))
            }
        }
    }

    pub fn edit_day_schedule(&self, day_of_week: u8) -> Option<Notice> {
        if day_of_week > 6 {
            return Some(Notice::error(INVALID_DAY));
        }
        let mut state = self.state.lock();
        let Some(staff_id) = state.current_staff_id else {
            return Some(Notice::error(SELECT_STAFF));
        };
        let form = ScheduleDayForm::for_day(
            staff_id,
            day_of_week,
            state.current_staff_schedules.get(&day_of_week),
        );
        state.modal = Some(Modal::ScheduleDay(form));
        None
    }

    pub async fn save_schedule_day(&self, form: ScheduleDayForm) -> Notice {
        if form.day_of_week > 6 {
            return Notice::error(INVALID_DAY);
        }
        let payload = form.payload();
        match self.api.save_schedule(form.schedule_id(), &payload).await {
            Ok(()) => {
                self.state.lock().close_modal();
                // A failed reload leaves the previous week view in place.
                if let Some(failed) = self.load_staff_schedules(Some(form.staff_id)).await {
                    log::warn!(
                        "Schedule for staff {} saved but the reload failed: {}",
                        form.staff_id,
                        failed.message()
                    );
                }
                Notice::success("Horario guardado exitosamente")
            }
            Err(err) => {
                log::warn!("Error saving schedule: {err}");
                self.state.lock().modal = Some(Modal::ScheduleDay(form));
                Notice::from_api(
                    &err,
                    "Error al guardar el horario. Por favor intente nuevamente.",
                )
            }
        }
    }

    pub async fn open_copy_schedule(&self) -> Option<Notice> {
        let (source_id, source_name) = {
            let state = self.state.lock();
            let Some(source_id) = state.current_staff_id else {
                return Some(Notice::error(SELECT_STAFF));
            };
            if state.current_staff_schedules.is_empty() {
                return Some(Notice::error("No hay horarios configurados para copiar"));
            }
            (source_id, state.current_staff_label().unwrap_or_default())
        };

        let targets = match self.api.list_staff(&StaffQuery::active()).await {
            Ok(staff) => staff,
            Err(err) => {
                log::warn!("Error loading staff for copy: {err}");
                Vec::new()
            }
        };

        self.state.lock().modal = Some(Modal::CopySchedule(CopyScheduleForm::new(
            source_id,
            source_name,
            targets,
        )));
        None
    }

    pub async fn execute_copy(&self, source_staff_id: i64, target: CopyTarget) -> Notice {
        let request = match CopyScheduleRequest::new(source_staff_id, target) {
            Ok(request) => request,
            Err(message) => return Notice::error(message),
        };

        match self.api.copy_schedules(&request).await {
            Ok(result) => {
                self.state.lock().close_modal();
                Notice::success(format!(
                    "Horarios copiados: {} exitosos, {} fallidos",
                    result.success_count, result.error_count
                ))
            }
            Err(err) => {
                log::warn!("Error copying schedules: {err}");
                Notice::from_api(&err, "Error al copiar horarios. Por favor intente nuevamente.")
            }
        }
    }

    // ----- settings -----

    pub async fn load_settings(&self) -> Option<Notice> {
        let ticket = self.state.lock().begin(LoadKind::Settings);
        match self.api.settings().await {
            Ok(Some(settings)) => {
                let mut state = self.state.lock();
                if state.is_current(ticket) {
                    state.settings = settings;
                }
                None
            }
            Ok(None) => {
                log::warn!("Settings response carried no settings; keeping the cached values");
                None
            }
            Err(err) => {
                log::warn!("Error loading system settings: {err}");
                Some(Notice::error(
                    "Error al cargar la configuración del sistema. Por favor intente nuevamente.",
                ))
            }
        }
    }

    pub async fn save_general(&self, settings: &GeneralSettings) -> Notice {
        match self.api.save_general_settings(settings).await {
            Ok(()) => {
                self.reload_settings_after("general").await;
                Notice::success("Configuración general guardada exitosamente")
            }
            Err(err) => {
                log::warn!("Error saving general settings: {err}");
                Notice::from_api(
                    &err,
                    "Error al guardar la configuración general. Por favor intente nuevamente.",
                )
            }
        }
    }

    pub async fn save_notifications(&self, settings: &NotificationSettings) -> Notice {
        match self.api.save_notification_settings(settings).await {
            Ok(()) => {
                self.reload_settings_after("notification").await;
                Notice::success("Configuración de notificaciones guardada exitosamente")
            }
            Err(err) => {
                log::warn!("Error saving notification settings: {err}");
                Notice::from_api(
                    &err,
                    "Error al guardar la configuración de notificaciones. Por favor intente nuevamente.",
                )
            }
        }
    }

    async fn reload_settings_after(&self, section: &str) {
        if let Some(failed) = self.load_settings().await {
            log::warn!("{section} settings saved but the reload failed: {}", failed.message());
        }
    }

    pub async fn backup(&self, today: NaiveDate) -> Result<BackupFile, Notice> {
        match self.api.download_backup().await {
            Ok(body) => Ok(BackupFile {
                filename: settings::backup_filename(today),
                body,
            }),
            Err(err) => {
                log::warn!("Error generating backup: {err}");
                Err(Notice::error(
                    "Error al generar el respaldo. Por favor intente nuevamente.",
                ))
            }
        }
    }

    /// Holds the upload and asks for confirmation before anything is sent.
    pub fn stage_restore(&self, upload: Option<RestoreUpload>) -> Option<Notice> {
        let Some(upload) = upload else {
            return Some(Notice::error("Por favor seleccione un archivo de respaldo"));
        };
        let mut state = self.state.lock();
        state.pending_restore = Some(upload);
        state.modal = Some(Modal::ConfirmRestore);
        None
    }

    pub async fn restore(&self, confirm: impl FnOnce(&str) -> bool) -> Option<Notice> {
        let upload = {
            let mut state = self.state.lock();
            state.modal = None;
            state.pending_restore.take()
        };
        let Some(upload) = upload else {
            return Some(Notice::error("Por favor seleccione un archivo de respaldo"));
        };
        if !confirm(RESTORE_PROMPT) {
            return None;
        }

        match self
            .api
            .restore_backup(&upload.filename, upload.body)
            .await
        {
            Ok(()) => Some(Notice::success(
                "Restauración completada exitosamente. La página se recargará.",
            )),
            Err(err) => {
                log::warn!("Error restoring from backup: {err}");
                Some(Notice::from_api(
                    &err,
                    "Error al restaurar desde el respaldo. Por favor intente nuevamente.",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, CopyScheduleResult, Role};
    use async_trait::async_trait;
    use schedule::SchedulePayload;
    use staff::StaffPayload;

    #[derive(Default)]
    struct FakeApi {
        calls: Mutex<Vec<String>>,
        staff: Vec<StaffMember>,
        clients: Vec<Client>,
        schedules: Vec<StaffSchedule>,
        fail_with: Option<String>,
        // Fails only the calls whose record starts with this prefix.
        fail_prefix: Option<&'static str>,
        // Answer to `settings`; `None` mimics a body without a `settings` key.
        settings: Option<SystemSettings>,
        // Simulates a newer staff load that finishes while the first is in flight.
        overtaken_by: Option<(SharedAdminState, Vec<StaffMember>)>,
    }

    impl FakeApi {
        fn record(&self, call: impl Into<String>) -> Result<(), ApiError> {
            let call = call.into();
            let failing = self.fail_prefix.is_some_and(|prefix| call.starts_with(prefix));
            self.calls.lock().push(call);
            match &self.fail_with {
                Some(message) => Err(ApiError::Backend(message.clone())),
                None if failing => Err(ApiError::Status(502)),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl AdminApi for FakeApi {
        async fn staff_stats(&self) -> Result<StaffStats, ApiError> {
            self.record("staff_stats")?;
            Ok(StaffStats {
                veterinarians: 3,
                ..StaffStats::default()
            })
        }

        async fn appointment_stats(&self, date: NaiveDate) -> Result<AppointmentStats, ApiError> {
            self.record(format!("appointment_stats {date}"))?;
            Ok(AppointmentStats {
                today: 5,
                ..AppointmentStats::default()
            })
        }

        async fn list_staff(&self, query: &StaffQuery) -> Result<Vec<StaffMember>, ApiError> {
            self.record(format!("list_staff {:?}", query.to_params()))?;
            if let Some((state, fresh)) = &self.overtaken_by {
                let mut state = state.lock();
                state.begin(LoadKind::Staff);
                state.staff = fresh.clone();
            }
            Ok(self.staff.clone())
        }

        async fn create_staff(&self, payload: &StaffPayload) -> Result<(), ApiError> {
            self.record(format!("create_staff {}", payload.email))
        }

        async fn update_staff(&self, id: i64, _payload: &StaffPayload) -> Result<(), ApiError> {
            self.record(format!("update_staff {id}"))
        }

        async fn set_staff_active(&self, id: i64, active: bool) -> Result<(), ApiError> {
            self.record(format!("set_staff_active {id} {active}"))
        }

        async fn list_clients(&self, is_active: Option<bool>) -> Result<Vec<Client>, ApiError> {
            self.record(format!("list_clients {is_active:?}"))?;
            Ok(self.clients.clone())
        }

        async fn client_stats(&self) -> Result<ClientStats, ApiError> {
            self.record("client_stats")?;
            Ok(ClientStats::default())
        }

        async fn set_client_active(&self, id: i64, active: bool) -> Result<(), ApiError> {
            self.record(format!("set_client_active {id} {active}"))
        }

        async fn client_pets(&self, client_id: i64) -> Result<Vec<Pet>, ApiError> {
            self.record(format!("client_pets {client_id}"))?;
            Ok(vec![Pet {
                id: 1,
                owner_id: client_id,
                name: "Luna".to_string(),
                species: "Gato".to_string(),
                breed: None,
                age: Some(3),
                weight: None,
            }])
        }

        async fn client_appointments(&self, client_id: i64) -> Result<Vec<Appointment>, ApiError> {
            self.record(format!("client_appointments {client_id}"))?;
            let appointment = |id, date: &str| Appointment {
                id,
                client_id: Some(client_id),
                veterinarian_id: 2,
                pet_id: 1,
                appointment_date: date.to_string(),
                appointment_time: "10:00".to_string(),
                status: AppointmentStatus::Completed,
                reason: None,
                notes: None,
            };
            Ok(vec![
                appointment(1, "2024-01-10"),
                appointment(2, "2024-06-01"),
                appointment(3, "2023-12-24"),
            ])
        }

        async fn staff_schedules(&self, staff_id: i64) -> Result<Vec<StaffSchedule>, ApiError> {
            self.record(format!("staff_schedules {staff_id}"))?;
            Ok(self.schedules.clone())
        }

        async fn save_schedule(
            &self,
            schedule_id: Option<i64>,
            payload: &SchedulePayload,
        ) -> Result<(), ApiError> {
            self.record(format!("save_schedule {schedule_id:?} day {}", payload.day_of_week))
        }

        async fn copy_schedules(
            &self,
            request: &CopyScheduleRequest,
        ) -> Result<CopyScheduleResult, ApiError> {
            self.record(format!("copy_schedules {}", request.source_staff_id))?;
            Ok(CopyScheduleResult {
                success_count: 4,
                error_count: 1,
            })
        }

        async fn settings(&self) -> Result<Option<SystemSettings>, ApiError> {
            self.record("settings")?;
            Ok(self.settings.clone())
        }

        async fn save_general_settings(&self, _settings: &GeneralSettings) -> Result<(), ApiError> {
            self.record("save_general_settings")
        }

        async fn save_notification_settings(
            &self,
            _settings: &NotificationSettings,
        ) -> Result<(), ApiError> {
            self.record("save_notification_settings")
        }

        async fn download_backup(&self) -> Result<Vec<u8>, ApiError> {
            self.record("download_backup")?;
            Ok(b"-- dump".to_vec())
        }

        async fn restore_backup(&self, filename: &str, body: Vec<u8>) -> Result<(), ApiError> {
            self.record(format!("restore_backup {filename} {} bytes", body.len()))
        }
    }

    fn member(id: i64, first: &str) -> StaffMember {
        StaffMember {
            id,
            email: format!("{}@clinica.es", first.to_lowercase()),
            first_name: first.to_string(),
            last_name: "Ruiz".to_string(),
            phone: None,
            role: Role::Veterinarian,
            specialization: None,
            is_active: true,
        }
    }

    fn client(id: i64, active: bool) -> Client {
        Client {
            id,
            first_name: "Eva".to_string(),
            last_name: "Soto".to_string(),
            email: "eva@correo.es".to_string(),
            phone: None,
            is_active: active,
            created_at: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[actix_web::test]
    async fn declined_staff_toggle_issues_no_request() {
        let panel = AdminPanel::new(FakeApi::default(), AdminState::shared());

        let mut prompt = String::new();
        let notice = panel
            .toggle_staff_status(7, false, |text| {
                prompt = text.to_string();
                false
            })
            .await;

        assert!(notice.is_none());
        assert_eq!(prompt, "¿Está seguro de desactivar a este miembro del personal?");
        assert!(panel.api.calls().is_empty());
    }

    #[actix_web::test]
    async fn confirmed_staff_toggle_reloads_list() {
        let panel = AdminPanel::new(FakeApi::default(), AdminState::shared());

        let notice = panel.toggle_staff_status(7, true, |_| true).await;

        assert_eq!(
            notice,
            Some(Notice::success("El estado del personal ha sido activado exitosamente"))
        );
        assert_eq!(
            panel.api.calls(),
            vec!["set_staff_active 7 true".to_string(), "list_staff []".to_string()]
        );
    }

    #[actix_web::test]
    async fn declined_client_toggle_issues_no_request() {
        let api = FakeApi {
            clients: vec![client(9, true)],
            ..FakeApi::default()
        };
        let panel = AdminPanel::new(api, AdminState::shared());
        panel.load_clients().await;
        panel.view_client_details(9).await;
        let before = panel.api.calls().len();

        let notice = panel.toggle_client_status(|_| false).await;

        assert!(notice.is_none());
        assert_eq!(panel.api.calls().len(), before);
        assert!(matches!(panel.state.lock().modal, Some(Modal::ClientDetails(_))));
    }

    #[actix_web::test]
    async fn stale_staff_load_is_discarded() {
        let state = AdminState::shared();
        let api = FakeApi {
            staff: vec![member(1, "Viejo")],
            overtaken_by: Some((state.clone(), vec![member(2, "Nuevo")])),
            ..FakeApi::default()
        };
        let panel = AdminPanel::new(api, state.clone());

        panel.load_staff().await;

        let ids: Vec<i64> = state.lock().staff.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[actix_web::test]
    async fn backend_error_is_shown_verbatim_and_form_kept() {
        let api = FakeApi {
            fail_with: Some("El email ya está registrado".to_string()),
            ..FakeApi::default()
        };
        let panel = AdminPanel::new(api, AdminState::shared());
        let form = StaffForm {
            email: "ana@clinica.es".to_string(),
            ..StaffForm::blank()
        };

        let notice = panel.save_staff(form).await;

        assert_eq!(notice, Notice::error("Error: El email ya está registrado"));
        assert!(matches!(panel.state.lock().modal, Some(Modal::Staff(_))));
    }

    #[actix_web::test]
    async fn clients_carry_counts_and_details_sort_recent_first() {
        let api = FakeApi {
            clients: vec![client(9, true)],
            ..FakeApi::default()
        };
        let panel = AdminPanel::new(api, AdminState::shared());
        panel.load_clients().await;
        panel.view_client_details(9).await;

        let state = panel.state.lock();
        assert_eq!(state.clients[0].pet_count, 1);
        assert_eq!(state.clients[0].appointment_count, 3);
        let Some(Modal::ClientDetails(details)) = &state.modal else {
            panic!("client details modal not open");
        };
        let order: Vec<i64> = details.appointments.iter().map(|a| a.id).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(state.current_client_id, Some(9));
    }

    #[actix_web::test]
    async fn copy_requires_configured_days_and_reports_counts() {
        let api = FakeApi {
            staff: vec![member(1, "Ana"), member(2, "Luis")],
            ..FakeApi::default()
        };
        let panel = AdminPanel::new(api, AdminState::shared());

        assert_eq!(
            panel.open_copy_schedule().await,
            Some(Notice::error(SELECT_STAFF))
        );
        panel.load_staff_schedules(Some(1)).await;
        assert_eq!(
            panel.open_copy_schedule().await,
            Some(Notice::error("No hay horarios configurados para copiar"))
        );

        let notice = panel
            .execute_copy(1, CopyTarget::Staff(vec![2]))
            .await;
        assert_eq!(
            notice,
            Notice::success("Horarios copiados: 4 exitosos, 1 fallidos")
        );
    }

    #[actix_web::test]
    async fn editing_a_day_requires_selected_staff() {
        let panel = AdminPanel::new(FakeApi::default(), AdminState::shared());
        assert_eq!(panel.edit_day_schedule(2), Some(Notice::error(SELECT_STAFF)));

        panel.load_staff_schedules(Some(4)).await;
        assert!(panel.edit_day_schedule(2).is_none());
        let state = panel.state.lock();
        let Some(Modal::ScheduleDay(form)) = &state.modal else {
            panic!("schedule modal not open");
        };
        assert_eq!(form.staff_id, 4);
        assert_eq!(form.start_time, "09:00");
    }

    #[actix_web::test]
    async fn restore_needs_file_then_confirmation() {
        let panel = AdminPanel::new(FakeApi::default(), AdminState::shared());

        assert_eq!(
            panel.stage_restore(None),
            Some(Notice::error("Por favor seleccione un archivo de respaldo"))
        );

        let upload = RestoreUpload {
            filename: "respaldo.sql".to_string(),
            body: b"data".to_vec(),
        };
        assert!(panel.stage_restore(Some(upload.clone())).is_none());
        assert!(panel.restore(|_| false).await.is_none());
        assert!(panel.api.calls().is_empty());

        panel.stage_restore(Some(upload));
        let notice = panel.restore(|prompt| prompt == RESTORE_PROMPT).await;
        assert_eq!(
            notice,
            Some(Notice::success(
                "Restauración completada exitosamente. La página se recargará."
            ))
        );
        assert_eq!(
            panel.api.calls(),
            vec!["restore_backup respaldo.sql 4 bytes".to_string()]
        );
    }

    #[actix_web::test]
    async fn dashboard_tab_loads_both_stats() {
        let panel = AdminPanel::new(FakeApi::default(), AdminState::shared());
        panel.switch_tab(Tab::Dashboard, today()).await;

        let state = panel.state.lock();
        assert_eq!(state.staff_stats.veterinarians, 3);
        assert_eq!(state.appointment_stats.today, 5);
        assert!(panel
            .api
            .calls()
            .contains(&"appointment_stats 2024-03-15".to_string()));
    }

    fn schedule(id: i64, day: u8) -> StaffSchedule {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "staff_id": 4,
            "day_of_week": day,
            "is_available": true,
            "start_time": "08:00:00",
            "end_time": "16:00:00",
        }))
        .unwrap()
    }

    #[actix_web::test]
    async fn saving_a_day_updates_existing_and_creates_new() {
        let api = FakeApi {
            schedules: vec![schedule(31, 1)],
            ..FakeApi::default()
        };
        let panel = AdminPanel::new(api, AdminState::shared());
        panel.load_staff_schedules(Some(4)).await;

        panel.edit_day_schedule(1);
        let existing = match panel.state.lock().modal.clone() {
            Some(Modal::ScheduleDay(form)) => form,
            other => panic!("unexpected modal {other:?}"),
        };
        assert_eq!(existing.schedule_id(), Some(31));
        assert_eq!(
            panel.save_schedule_day(existing).await,
            Notice::success("Horario guardado exitosamente")
        );

        panel.edit_day_schedule(5);
        let fresh = match panel.state.lock().modal.clone() {
            Some(Modal::ScheduleDay(form)) => form,
            other => panic!("unexpected modal {other:?}"),
        };
        assert_eq!(fresh.schedule_id(), None);
        panel.save_schedule_day(fresh).await;

        let saves: Vec<String> = panel
            .api
            .calls()
            .into_iter()
            .filter(|call| call.starts_with("save_schedule"))
            .collect();
        assert_eq!(
            saves,
            vec![
                "save_schedule Some(31) day 1".to_string(),
                "save_schedule None day 5".to_string(),
            ]
        );
    }

    #[actix_web::test]
    async fn days_outside_the_week_are_refused() {
        let panel = AdminPanel::new(FakeApi::default(), AdminState::shared());
        panel.load_staff_schedules(Some(4)).await;

        assert_eq!(panel.edit_day_schedule(7), Some(Notice::error(INVALID_DAY)));
        assert!(panel.state.lock().modal.is_none());

        let notice = panel
            .save_schedule_day(ScheduleDayForm::for_day(4, 9, None))
            .await;
        assert_eq!(notice, Notice::error(INVALID_DAY));
        assert_eq!(panel.api.calls(), vec!["staff_schedules 4".to_string()]);
    }

    #[actix_web::test]
    async fn failed_reload_after_save_keeps_success_and_old_view() {
        let api = FakeApi {
            schedules: vec![schedule(31, 1)],
            ..FakeApi::default()
        };
        let panel = AdminPanel::new(api, AdminState::shared());
        panel.load_staff_schedules(Some(4)).await;

        let failing = FakeApi {
            fail_prefix: Some("staff_schedules"),
            ..FakeApi::default()
        };
        let panel = AdminPanel::new(failing, panel.state.clone());
        let notice = panel
            .save_schedule_day(ScheduleDayForm::for_day(4, 1, None))
            .await;

        assert_eq!(notice, Notice::success("Horario guardado exitosamente"));
        assert!(panel.state.lock().current_staff_schedules.contains_key(&1));
    }

    #[actix_web::test]
    async fn settings_response_without_settings_keeps_cache() {
        let state = AdminState::shared();
        state.lock().settings =
            serde_json::from_value(serde_json::json!({ "clinic_name": "Huellitas" })).unwrap();

        let panel = AdminPanel::new(FakeApi::default(), state);
        assert!(panel.load_settings().await.is_none());
        assert_eq!(panel.state.lock().settings.get("clinic_name", ""), "Huellitas");

        let form = settings::GeneralSettingsForm {
            clinic_name: "Huellitas".to_string(),
            ..Default::default()
        };
        let notice = panel.save_general(&form.payload()).await;
        assert_eq!(notice, Notice::success("Configuración general guardada exitosamente"));
        assert_eq!(panel.state.lock().settings.get("clinic_name", ""), "Huellitas");
    }
}
