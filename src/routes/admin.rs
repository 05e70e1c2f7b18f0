use actix_multipart::{Multipart, MultipartError};
use actix_web::{http::header, middleware::from_fn, web, HttpRequest, HttpResponse, Result};
use askama::Template;
use chrono::{Local, NaiveDate};
use futures::TryStreamExt;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    admin::{
        schedule::{CopyScheduleForm, CopyTarget, DayView, ScheduleDayForm},
        schedule_option_label,
        settings::{GeneralSettingsForm, NotificationSettingsForm, SettingsView},
        staff::{parse_status_filter, toggle_client_prompt, toggle_staff_prompt, StaffForm, StaffQuery},
        AdminPanel, AdminState, ClientDetails, ClientRow, Modal, Notice, RestoreUpload, Tab,
        RESTORE_PROMPT,
    },
    api::ApiClient,
    auth::{admin_guard, redirect, redirect_with_notice, SignedIn},
    filters,
    models::{Role, StaffMember},
    state::AppState,
    templates::{render, ConfirmTemplate, PageContext, SelectOption},
};

const RESTORE_LIMIT: usize = 64 * 1024 * 1024;
const BACKUP_FIELD: &str = "backup_file";

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate<'a> {
    ctx: PageContext,
    tab: &'static str,
    tabs: Vec<SelectOption>,
    admin: &'a AdminState,
    staff: Vec<&'a StaffMember>,
    role_filter: Vec<SelectOption>,
    staff_status_filter: Vec<SelectOption>,
    clients: Vec<&'a ClientRow>,
    client_status_filter: Vec<SelectOption>,
    schedule_staff: Vec<SelectOption>,
    current_staff: Option<String>,
    week: Vec<DayView>,
    settings: SettingsView,
    staff_form: Option<&'a StaffForm>,
    staff_roles: Vec<SelectOption>,
    client_details: Option<&'a ClientDetails>,
    day_form: Option<&'a ScheduleDayForm>,
    copy_form: Option<&'a CopyScheduleForm>,
    copy_roles: Vec<SelectOption>,
    confirm_restore: bool,
    restore_prompt: &'static str,
}

fn status_options(selected: Option<bool>) -> Vec<SelectOption> {
    vec![
        SelectOption::new("", "Todos", selected.is_none()),
        SelectOption::new("true", "Activos", selected == Some(true)),
        SelectOption::new("false", "Inactivos", selected == Some(false)),
    ]
}

fn role_options(selected: Option<Role>, include_all: bool) -> Vec<SelectOption> {
    let mut options = Vec::new();
    if include_all {
        options.push(SelectOption::new("", "Todos los roles", selected.is_none()));
    }
    options.extend(Role::STAFF.into_iter().map(|role| {
        SelectOption::new(
            role.as_str(),
            crate::format::translate_role(role.as_str()),
            Some(role) == selected,
        )
    }));
    options
}

fn admin_page(state: &AppState, auth: &SignedIn, notice: Option<Notice>) -> HttpResponse {
    let guard = auth.admin.lock();
    let admin: &AdminState = &guard;

    let (staff_form, client_details, day_form, copy_form) = match &admin.modal {
        Some(Modal::Staff(form)) => (Some(form), None, None, None),
        Some(Modal::ClientDetails(details)) => (None, Some(details.as_ref()), None, None),
        Some(Modal::ScheduleDay(form)) => (None, None, Some(form), None),
        Some(Modal::CopySchedule(form)) => (None, None, None, Some(form)),
        Some(Modal::ConfirmRestore) | None => (None, None, None, None),
    };
    let staff_roles = staff_form
        .map(|form| role_options(Role::parse(&form.role), false))
        .unwrap_or_default();

    render(AdminTemplate {
        ctx: PageContext::signed_in(state, auth).with_notice(notice),
        tab: admin.tab.as_str(),
        tabs: Tab::ALL
            .iter()
            .map(|tab| SelectOption::new(tab.as_str(), tab.label(), *tab == admin.tab))
            .collect(),
        admin,
        staff: admin.filtered_staff(),
        role_filter: role_options(admin.staff_query.role, true),
        staff_status_filter: status_options(admin.staff_query.is_active),
        clients: admin.filtered_clients(),
        client_status_filter: status_options(admin.client_status),
        schedule_staff: admin
            .schedule_staff
            .iter()
            .map(|member| {
                SelectOption::new(
                    member.id.to_string(),
                    schedule_option_label(member),
                    Some(member.id) == admin.current_staff_id,
                )
            })
            .collect(),
        current_staff: admin.current_staff_label(),
        week: admin.week(),
        settings: admin.settings_view(),
        staff_form,
        staff_roles,
        client_details,
        day_form,
        copy_form,
        copy_roles: role_options(None, false),
        confirm_restore: matches!(admin.modal, Some(Modal::ConfirmRestore)),
        restore_prompt: RESTORE_PROMPT,
    })
}

fn panel(state: &AppState, auth: &SignedIn) -> AdminPanel<ApiClient> {
    AdminPanel::new(auth.api(state), auth.admin.clone())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Post-action redirect back to the panel, carrying the outcome if any.
fn back(req: &HttpRequest, state: &AppState, notice: Option<Notice>) -> HttpResponse {
    match notice {
        Some(notice) => redirect_with_notice(req, state, "/admin", notice),
        None => redirect("/admin"),
    }
}

#[derive(Deserialize)]
struct AdminQuery {
    tab: Option<String>,
}

#[derive(Deserialize)]
struct StaffFilterQuery {
    role: Option<String>,
    is_active: Option<String>,
}

#[derive(Deserialize)]
struct ClientFilterQuery {
    is_active: Option<String>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    list: String,
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
struct ToggleQuery {
    #[serde(default)]
    activate: String,
}

#[derive(Deserialize)]
struct ToggleForm {
    #[serde(default)]
    activate: String,
    #[serde(default)]
    confirmed: String,
}

#[derive(Deserialize)]
struct ConfirmForm {
    #[serde(default)]
    confirmed: String,
}

impl ConfirmForm {
    fn confirmed(&self) -> bool {
        self.confirmed == "yes"
    }
}

#[derive(Deserialize)]
struct ScheduleStaffQuery {
    staff_id: Option<String>,
}

/// Multi-select friendly view of the copy-schedule form.
struct CopyForm {
    source_staff_id: Option<i64>,
    copy_type: String,
    target_staff_ids: Vec<i64>,
    target_role: String,
}

impl CopyForm {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = CopyForm {
            source_staff_id: None,
            copy_type: String::new(),
            target_staff_ids: Vec::new(),
            target_role: String::new(),
        };
        for (key, value) in pairs {
            match key.as_str() {
                "source_staff_id" => form.source_staff_id = value.trim().parse().ok(),
                "copy_type" => form.copy_type = value,
                "target_staff_ids" => form.target_staff_ids.extend(value.trim().parse::<i64>().ok()),
                "target_role" => form.target_role = value,
                _ => {}
            }
        }
        form
    }

    fn target(self) -> CopyTarget {
        if self.copy_type == "role" {
            CopyTarget::Role(self.target_role)
        } else {
            CopyTarget::Staff(self.target_staff_ids)
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(from_fn(admin_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/search").route(web::get().to(search)))
            .service(web::resource("/close").route(web::get().to(close_modal)))
            .service(web::resource("/staff").route(web::post().to(save_staff)))
            .service(web::resource("/staff/filter").route(web::get().to(filter_staff)))
            .service(web::resource("/staff/new").route(web::get().to(add_staff)))
            .service(web::resource("/staff/{id}/edit").route(web::get().to(edit_staff)))
            .service(
                web::resource("/staff/{id}/toggle")
                    .route(web::get().to(confirm_toggle_staff))
                    .route(web::post().to(toggle_staff)),
            )
            .service(web::resource("/clients/filter").route(web::get().to(filter_clients)))
            .service(
                web::resource("/clients/toggle")
                    .route(web::get().to(confirm_toggle_client))
                    .route(web::post().to(toggle_client)),
            )
            .service(web::resource("/clients/{id}").route(web::get().to(client_details)))
            .service(web::resource("/schedules/staff").route(web::get().to(select_schedule_staff)))
            .service(web::resource("/schedules/day").route(web::post().to(save_schedule_day)))
            .service(web::resource("/schedules/day/{day}").route(web::get().to(edit_schedule_day)))
            .service(
                web::resource("/schedules/copy")
                    .route(web::get().to(open_copy_schedule))
                    .route(web::post().to(copy_schedules)),
            )
            .service(web::resource("/settings/general").route(web::post().to(save_general_settings)))
            .service(
                web::resource("/settings/notifications")
                    .route(web::post().to(save_notification_settings)),
            )
            .service(web::resource("/settings/backup").route(web::get().to(backup)))
            .service(web::resource("/settings/restore").route(web::post().to(stage_restore)))
            .service(web::resource("/settings/restore/confirm").route(web::post().to(restore))),
    );
}

/// `?tab=` switches tabs and reloads that tab; a bare `/admin` re-renders the
/// current state, loading the default tab on the first visit.
async fn index(
    state: web::Data<AppState>,
    auth: web::ReqData<SignedIn>,
    query: web::Query<AdminQuery>,
) -> Result<HttpResponse> {
    let requested = query.tab.as_deref().and_then(Tab::parse);
    let (tab, first_visit) = {
        let admin = auth.admin.lock();
        (admin.tab, !admin.has_loaded())
    };

    let notice = match requested {
        Some(tab) => panel(&state, &auth).switch_tab(tab, today()).await,
        None if first_visit => panel(&state, &auth).switch_tab(tab, today()).await,
        None => None,
    };
    Ok(admin_page(&state, &auth, notice))
}

async fn search(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let panel = panel(&state, &auth);
    match query.list.as_str() {
        "clients" => panel.search_clients(&query.q),
        _ => panel.search_staff(&query.q),
    }
    Ok(back(&req, &state, None))
}

async fn close_modal(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
) -> Result<HttpResponse> {
    panel(&state, &auth).close_modal();
    Ok(back(&req, &state, None))
}

async fn filter_staff(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    query: web::Query<StaffFilterQuery>,
) -> Result<HttpResponse> {
    let query = StaffQuery {
        role: query.role.as_deref().and_then(Role::parse),
        is_active: parse_status_filter(query.is_active.as_deref()),
    };
    panel(&state, &auth).filter_staff(query).await;
    Ok(back(&req, &state, None))
}

async fn add_staff(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
) -> Result<HttpResponse> {
    panel(&state, &auth).open_add_staff();
    Ok(back(&req, &state, None))
}

async fn edit_staff(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    panel(&state, &auth).edit_staff(path.into_inner());
    Ok(back(&req, &state, None))
}

async fn save_staff(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<StaffForm>,
) -> Result<HttpResponse> {
    let notice = panel(&state, &auth).save_staff(form.into_inner()).await;
    Ok(back(&req, &state, Some(notice)))
}

async fn confirm_toggle_staff(
    state: web::Data<AppState>,
    auth: web::ReqData<SignedIn>,
    path: web::Path<i64>,
    query: web::Query<ToggleQuery>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let activate = query.activate == "true";
    Ok(render(ConfirmTemplate {
        ctx: PageContext::signed_in(&state, &auth),
        message: toggle_staff_prompt(activate),
        action: format!("/admin/staff/{id}/toggle"),
        fields: vec![("activate".to_string(), activate.to_string())],
        cancel_href: "/admin".to_string(),
    }))
}

async fn toggle_staff(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    path: web::Path<i64>,
    form: web::Form<ToggleForm>,
) -> Result<HttpResponse> {
    let confirmed = form.confirmed == "yes";
    let notice = panel(&state, &auth)
        .toggle_staff_status(path.into_inner(), form.activate == "true", |_| confirmed)
        .await;
    Ok(back(&req, &state, notice))
}

async fn filter_clients(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    query: web::Query<ClientFilterQuery>,
) -> Result<HttpResponse> {
    panel(&state, &auth)
        .filter_clients(parse_status_filter(query.is_active.as_deref()))
        .await;
    Ok(back(&req, &state, None))
}

async fn client_details(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    panel(&state, &auth).view_client_details(path.into_inner()).await;
    Ok(back(&req, &state, None))
}

async fn confirm_toggle_client(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
) -> Result<HttpResponse> {
    let activate = {
        let admin = auth.admin.lock();
        admin.current_client_id.and_then(|id| {
            admin
                .clients
                .iter()
                .find(|row| row.client.id == id)
                .map(|row| !row.client.is_active)
        })
    };
    let Some(activate) = activate else {
        return Ok(back(&req, &state, None));
    };
    Ok(render(ConfirmTemplate {
        ctx: PageContext::signed_in(&state, &auth),
        message: toggle_client_prompt(activate),
        action: "/admin/clients/toggle".to_string(),
        fields: Vec::new(),
        cancel_href: "/admin".to_string(),
    }))
}

async fn toggle_client(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<ConfirmForm>,
) -> Result<HttpResponse> {
    let confirmed = form.confirmed();
    let notice = panel(&state, &auth)
        .toggle_client_status(|_| confirmed)
        .await;
    Ok(back(&req, &state, notice))
}

async fn select_schedule_staff(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    query: web::Query<ScheduleStaffQuery>,
) -> Result<HttpResponse> {
    let staff_id = query.staff_id.as_deref().and_then(|id| id.trim().parse().ok());
    let notice = panel(&state, &auth).load_staff_schedules(staff_id).await;
    Ok(back(&req, &state, notice))
}

async fn edit_schedule_day(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    path: web::Path<u8>,
) -> Result<HttpResponse> {
    let notice = panel(&state, &auth).edit_day_schedule(path.into_inner());
    Ok(back(&req, &state, notice))
}

async fn save_schedule_day(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<ScheduleDayForm>,
) -> Result<HttpResponse> {
    let notice = panel(&state, &auth).save_schedule_day(form.into_inner()).await;
    Ok(back(&req, &state, Some(notice)))
}

async fn open_copy_schedule(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
) -> Result<HttpResponse> {
    let notice = panel(&state, &auth).open_copy_schedule().await;
    Ok(back(&req, &state, notice))
}

async fn copy_schedules(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse> {
    let form = CopyForm::from_pairs(form.into_inner());
    let Some(source) = form.source_staff_id else {
        return Ok(back(&req, &state, Some(Notice::error(crate::admin::SELECT_STAFF))));
    };
    let notice = panel(&state, &auth).execute_copy(source, form.target()).await;
    Ok(back(&req, &state, Some(notice)))
}

async fn save_general_settings(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<GeneralSettingsForm>,
) -> Result<HttpResponse> {
    let notice = panel(&state, &auth).save_general(&form.payload()).await;
    Ok(back(&req, &state, Some(notice)))
}

async fn save_notification_settings(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<NotificationSettingsForm>,
) -> Result<HttpResponse> {
    let notice = panel(&state, &auth).save_notifications(&form.payload()).await;
    Ok(back(&req, &state, Some(notice)))
}

async fn backup(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
) -> Result<HttpResponse> {
    match panel(&state, &auth).backup(today()).await {
        Ok(file) => {
            state
                .sessions
                .push_flash(&auth.session_id, Notice::success("Respaldo generado exitosamente"));
            Ok(HttpResponse::Ok()
                .content_type("application/sql")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file.filename),
                ))
                .body(file.body))
        }
        Err(notice) => Ok(back(&req, &state, Some(notice))),
    }
}

#[derive(Debug, Error)]
enum UploadError {
    #[error("backup file exceeds the upload limit")]
    TooLarge,
    #[error(transparent)]
    Multipart(#[from] MultipartError),
}

/// The `backup_file` part, when it names a file. Other parts are skipped.
async fn read_backup_file(mut payload: Multipart) -> Result<Option<RestoreUpload>, UploadError> {
    while let Some(mut field) = payload.try_next().await? {
        let filename = match (
            field.name(),
            field.content_disposition().and_then(|cd| cd.get_filename()),
        ) {
            (Some(BACKUP_FIELD), Some(filename)) if !filename.is_empty() => filename.to_string(),
            _ => continue,
        };

        let mut body = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if body.len() + chunk.len() > RESTORE_LIMIT {
                return Err(UploadError::TooLarge);
            }
            body.extend_from_slice(&chunk);
        }
        return Ok(Some(RestoreUpload { filename, body }));
    }
    Ok(None)
}

async fn stage_restore(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let upload = match read_backup_file(payload).await {
        Ok(upload) => upload,
        Err(UploadError::TooLarge) => {
            let notice = Notice::error("El archivo de respaldo es demasiado grande");
            return Ok(back(&req, &state, Some(notice)));
        }
        Err(err) => {
            log::warn!("Unreadable restore upload: {err}");
            None
        }
    };
    let notice = panel(&state, &auth).stage_restore(upload);
    Ok(back(&req, &state, notice))
}

async fn restore(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<ConfirmForm>,
) -> Result<HttpResponse> {
    let confirmed = form.confirmed();
    let notice = panel(&state, &auth).restore(|_| confirmed).await;
    Ok(back(&req, &state, notice))
}
