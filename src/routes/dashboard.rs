use actix_web::{middleware::from_fn, web, HttpRequest, HttpResponse, Result};
use askama::Template;
use serde::Deserialize;

use crate::{
    admin::Notice,
    api::{AppointmentFilter, EmailRequest, NewAppointment, NewPet},
    auth::{redirect, redirect_with_notice, session_guard, SignedIn},
    filters,
    format,
    models::{Appointment, AppointmentStatus, Notification, Pet, Role, Veterinarian},
    state::AppState,
    templates::{render, ConfirmTemplate, PageContext, SelectOption},
};

const MISSING_FIELDS: &str = "Por favor complete todos los campos requeridos";
const CLIENTS_ONLY: &str = "Solo los clientes pueden agendar citas";

/// One rendered appointment card. `search_text` is what the card search matches.
#[derive(Clone, Debug)]
struct AppointmentCard {
    appointment: Appointment,
    veterinarian: String,
    pet: String,
    search_text: String,
}

impl AppointmentCard {
    fn new(appointment: Appointment, veterinarians: &[Veterinarian], pets: &[Pet]) -> Self {
        let veterinarian = veterinarians
            .iter()
            .find(|vet| vet.id == appointment.veterinarian_id)
            .map(veterinarian_name)
            .unwrap_or_default();
        let pet = pets
            .iter()
            .find(|pet| pet.id == appointment.pet_id)
            .map(|pet| pet.name.clone())
            .unwrap_or_default();
        let search_text = [
            format::format_date_long(&appointment.appointment_date),
            format::format_time(&appointment.appointment_time),
            format::translate_status(appointment.status.as_str()),
            veterinarian.clone(),
            pet.clone(),
            appointment.reason.clone().unwrap_or_default(),
            appointment.notes.clone().unwrap_or_default(),
        ]
        .join(" ")
        .to_lowercase();

        Self {
            appointment,
            veterinarian,
            pet,
            search_text,
        }
    }

    fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty() || self.search_text.contains(&query)
    }

    fn is_scheduled(&self) -> bool {
        self.appointment.status == AppointmentStatus::Scheduled
    }
}

fn veterinarian_name(vet: &Veterinarian) -> String {
    format!("Dr. {} {}", vet.first_name, vet.last_name)
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    ctx: PageContext,
    is_client: bool,
    query: String,
    cards: Vec<AppointmentCard>,
    notifications: Vec<Notification>,
    pets: Vec<Pet>,
    pet_form: PetForm,
}

#[derive(Template)]
#[template(path = "appointment_new.html")]
struct NewAppointmentTemplate {
    ctx: PageContext,
    veterinarians: Vec<SelectOption>,
    pets: Vec<SelectOption>,
    slots: Vec<SelectOption>,
    form: AppointmentForm,
}

#[derive(Deserialize)]
struct DashboardQuery {
    #[serde(default)]
    q: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct AppointmentForm {
    #[serde(default)]
    veterinarian_id: String,
    #[serde(default)]
    pet_id: String,
    #[serde(default)]
    appointment_date: String,
    #[serde(default)]
    appointment_time: String,
    #[serde(default)]
    reason: String,
}

impl AppointmentForm {
    fn appointment(&self, client_id: i64) -> Option<NewAppointment> {
        let veterinarian_id = self.veterinarian_id.trim().parse().ok()?;
        let pet_id = self.pet_id.trim().parse().ok()?;
        let date = self.appointment_date.trim();
        let time = self.appointment_time.trim();
        if date.is_empty() || time.is_empty() {
            return None;
        }
        Some(NewAppointment {
            client_id,
            veterinarian_id,
            pet_id,
            appointment_date: date.to_string(),
            appointment_time: time.to_string(),
            reason: self.reason.trim().to_string(),
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
struct PetForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    species: String,
    #[serde(default)]
    breed: String,
    #[serde(default)]
    age: String,
    #[serde(default)]
    weight: String,
}

impl PetForm {
    /// Age and weight are read leniently; blank, zero or garbage becomes `None`.
    fn pet(&self, owner_id: i64) -> Option<NewPet> {
        let name = self.name.trim();
        let species = self.species.trim();
        if name.is_empty() || species.is_empty() {
            return None;
        }
        Some(NewPet {
            owner_id,
            name: name.to_string(),
            species: species.to_string(),
            breed: self.breed.trim().to_string(),
            age: format::leading_number(&self.age).filter(|age| *age > 0),
            weight: format::leading_decimal(&self.weight).filter(|weight| *weight > 0.0),
        })
    }
}

#[derive(Deserialize)]
struct StatusQuery {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct StatusForm {
    #[serde(default)]
    status: String,
    #[serde(default)]
    confirmed: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/dashboard")
            .wrap(from_fn(session_guard))
            .service(web::resource("").route(web::get().to(dashboard))),
    )
    .service(
        web::scope("/appointment")
            .wrap(from_fn(session_guard))
            .service(
                web::resource("/new")
                    .route(web::get().to(new_appointment))
                    .route(web::post().to(create_appointment)),
            )
            .service(web::resource("/{id}/cancel").route(web::post().to(cancel_appointment)))
            .service(
                web::resource("/{id}/status")
                    .route(web::get().to(confirm_status))
                    .route(web::post().to(update_status)),
            ),
    )
    .service(
        web::scope("/pets")
            .wrap(from_fn(session_guard))
            .service(web::resource("").route(web::post().to(add_pet))),
    );
}

async fn dashboard(
    state: web::Data<AppState>,
    auth: web::ReqData<SignedIn>,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse> {
    let api = auth.api(&state);
    let user = &auth.user;
    let is_client = user.role == Role::Client;
    let filter = if is_client {
        AppointmentFilter::Client(user.id)
    } else {
        AppointmentFilter::Veterinarian(user.id)
    };

    let (appointments, notifications, veterinarians, pets) = tokio::join!(
        api.appointments(filter),
        api.pending_notifications(user.id),
        api.veterinarians(),
        async {
            if is_client {
                api.pets_for_owner(user.id).await
            } else {
                Ok(Vec::new())
            }
        }
    );

    let appointments = appointments.unwrap_or_else(|err| {
        log::warn!("Loading appointments for user {} failed: {err}", user.id);
        Vec::new()
    });
    let notifications = notifications.unwrap_or_else(|err| {
        log::warn!("Loading notifications for user {} failed: {err}", user.id);
        Vec::new()
    });
    let veterinarians = veterinarians.unwrap_or_default();
    let pets = pets.unwrap_or_else(|err| {
        log::warn!("Loading pets for user {} failed: {err}", user.id);
        Vec::new()
    });

    let cards = appointments
        .into_iter()
        .map(|appointment| AppointmentCard::new(appointment, &veterinarians, &pets))
        .filter(|card| card.matches(&query.q))
        .collect();

    Ok(render(DashboardTemplate {
        ctx: PageContext::signed_in(&state, &auth),
        is_client,
        query: query.into_inner().q,
        cards,
        notifications,
        pets,
        pet_form: PetForm::default(),
    }))
}

async fn appointment_page(
    state: &AppState,
    auth: &SignedIn,
    form: AppointmentForm,
    notice: Option<Notice>,
) -> HttpResponse {
    let api = auth.api(state);
    let veterinarian_id = form.veterinarian_id.trim().parse::<i64>().ok();
    let date = form.appointment_date.trim().to_string();

    let (veterinarians, pets, slots) = tokio::join!(
        api.veterinarians(),
        api.pets_for_owner(auth.user.id),
        async {
            match veterinarian_id {
                Some(vet) if !date.is_empty() => api.available_slots(vet, &date).await,
                _ => Ok(Vec::new()),
            }
        }
    );

    let veterinarians = veterinarians
        .unwrap_or_else(|err| {
            log::warn!("Loading veterinarians failed: {err}");
            Vec::new()
        })
        .iter()
        .map(|vet| {
            let label = match vet.specialization.as_deref() {
                Some(spec) if !spec.is_empty() => format!("{} - {spec}", veterinarian_name(vet)),
                _ => veterinarian_name(vet),
            };
            SelectOption::new(vet.id.to_string(), label, Some(vet.id) == veterinarian_id)
        })
        .collect();
    let pets = pets
        .unwrap_or_else(|err| {
            log::warn!("Loading pets for user {} failed: {err}", auth.user.id);
            Vec::new()
        })
        .iter()
        .map(|pet| {
            let value = pet.id.to_string();
            let selected = value == form.pet_id.trim();
            SelectOption::new(value, format!("{} ({})", pet.name, pet.species), selected)
        })
        .collect();
    let slots = slots
        .unwrap_or_else(|err| {
            log::warn!("Loading available slots failed: {err}");
            Vec::new()
        })
        .into_iter()
        .map(|slot| {
            let selected = slot == form.appointment_time.trim();
            SelectOption::new(slot.clone(), format::format_time(&slot), selected)
        })
        .collect();

    render(NewAppointmentTemplate {
        ctx: PageContext::signed_in(state, auth).with_notice(notice),
        veterinarians,
        pets,
        slots,
        form,
    })
}

async fn new_appointment(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    query: web::Query<AppointmentForm>,
) -> Result<HttpResponse> {
    if auth.user.role != Role::Client {
        return Ok(redirect_with_notice(&req, &state, "/dashboard", Notice::error(CLIENTS_ONLY)));
    }
    Ok(appointment_page(&state, &auth, query.into_inner(), None).await)
}

async fn create_appointment(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<AppointmentForm>,
) -> Result<HttpResponse> {
    if auth.user.role != Role::Client {
        return Ok(redirect_with_notice(&req, &state, "/dashboard", Notice::error(CLIENTS_ONLY)));
    }
    let form = form.into_inner();
    let Some(payload) = form.appointment(auth.user.id) else {
        let notice = Notice::error(MISSING_FIELDS);
        return Ok(appointment_page(&state, &auth, form, Some(notice)).await);
    };

    let api = auth.api(&state);
    let appointment = match api.create_appointment(&payload).await {
        Ok(appointment) => appointment,
        Err(err) => {
            log::warn!("Creating appointment for user {} failed: {err}", auth.user.id);
            let notice = Notice::error("Error al agendar la cita");
            return Ok(appointment_page(&state, &auth, form, Some(notice)).await);
        }
    };

    let (veterinarians, pets) = tokio::join!(api.veterinarians(), api.pets_for_owner(auth.user.id));
    let veterinarian = veterinarians
        .ok()
        .and_then(|vets| vets.iter().find(|vet| vet.id == payload.veterinarian_id).map(veterinarian_name))
        .unwrap_or_else(|| "Dr. Veterinario".to_string());
    let pet = pets
        .ok()
        .and_then(|pets| pets.into_iter().find(|pet| pet.id == payload.pet_id).map(|pet| pet.name))
        .unwrap_or_else(|| "Mascota".to_string());

    let email = EmailRequest::appointment_confirmation(&auth.user, &appointment, &veterinarian, &pet);
    if let Err(err) = api.send_email(&email).await {
        log::warn!("Confirmation e-mail for appointment {} failed: {err}", appointment.id);
    }

    Ok(redirect_with_notice(
        &req,
        &state,
        "/dashboard",
        Notice::success("Cita agendada exitosamente"),
    ))
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let notice = match auth.api(&state).cancel_appointment(id).await {
        Ok(()) => Notice::success("Cita cancelada exitosamente"),
        Err(err) => {
            log::warn!("Cancelling appointment {id} failed: {err}");
            Notice::error("Error al cancelar la cita")
        }
    };
    Ok(redirect_with_notice(&req, &state, "/dashboard", notice))
}

async fn confirm_status(
    state: web::Data<AppState>,
    auth: web::ReqData<SignedIn>,
    path: web::Path<i64>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let status = query.into_inner().status;
    Ok(render(ConfirmTemplate {
        ctx: PageContext::signed_in(&state, &auth),
        message: format!("¿Está seguro de cambiar el estado de la cita a {status}?"),
        action: format!("/appointment/{id}/status"),
        fields: vec![("status".to_string(), status)],
        cancel_href: "/dashboard".to_string(),
    }))
}

async fn update_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    path: web::Path<i64>,
    form: web::Form<StatusForm>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if form.confirmed != "yes" {
        return Ok(redirect("/dashboard"));
    }
    let Some(status) = AppointmentStatus::parse(&form.status) else {
        return Ok(redirect_with_notice(
            &req,
            &state,
            "/dashboard",
            Notice::error("Error al actualizar el estado de la cita"),
        ));
    };

    let notice = match auth.api(&state).update_appointment_status(id, status).await {
        Ok(()) => Notice::success("Estado actualizado exitosamente"),
        Err(err) => {
            log::warn!("Updating status of appointment {id} failed: {err}");
            Notice::error("Error al actualizar el estado de la cita")
        }
    };
    Ok(redirect_with_notice(&req, &state, "/dashboard", notice))
}

async fn add_pet(
    state: web::Data<AppState>,
    req: HttpRequest,
    auth: web::ReqData<SignedIn>,
    form: web::Form<PetForm>,
) -> Result<HttpResponse> {
    let Some(pet) = form.pet(auth.user.id) else {
        return Ok(redirect_with_notice(&req, &state, "/dashboard", Notice::error(MISSING_FIELDS)));
    };
    let notice = match auth.api(&state).create_pet(&pet).await {
        Ok(_) => Notice::success("Mascota agregada exitosamente"),
        Err(err) => {
            log::warn!("Adding pet for user {} failed: {err}", auth.user.id);
            Notice::error("Error al agregar la mascota. Por favor intente nuevamente.")
        }
    };
    Ok(redirect_with_notice(&req, &state, "/dashboard", notice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::SESSION_COOKIE, models::SessionUser};
    use actix_web::{
        cookie::Cookie,
        http::{header, StatusCode},
        test as atest, App,
    };

    fn appointment(status: AppointmentStatus, reason: &str) -> Appointment {
        Appointment {
            id: 11,
            client_id: Some(3),
            veterinarian_id: 7,
            pet_id: 21,
            appointment_date: "2024-03-15".to_string(),
            appointment_time: "13:30".to_string(),
            status,
            reason: Some(reason.to_string()),
            notes: None,
        }
    }

    fn vets() -> Vec<Veterinarian> {
        vec![Veterinarian {
            id: 7,
            first_name: "Luis".to_string(),
            last_name: "Mora".to_string(),
            specialization: Some("Felinos".to_string()),
        }]
    }

    #[test]
    fn card_search_covers_rendered_text() {
        let card = AppointmentCard::new(appointment(AppointmentStatus::Cancelled, "Vacuna anual"), &vets(), &[]);
        assert_eq!(card.veterinarian, "Dr. Luis Mora");
        assert!(card.matches("VACUNA"));
        assert!(card.matches("cancelada"));
        assert!(card.matches("marzo"));
        assert!(card.matches("1:30 pm"));
        assert!(card.matches("  "));
        assert!(!card.matches("desparasitación"));
        assert!(!card.is_scheduled());
    }

    #[test]
    fn pet_form_parses_numbers_leniently() {
        let form = PetForm {
            name: " Michi ".to_string(),
            species: "Gato".to_string(),
            breed: String::new(),
            age: "3 años".to_string(),
            weight: "0".to_string(),
        };
        let pet = form.pet(3).unwrap();
        assert_eq!(pet.name, "Michi");
        assert_eq!(pet.age, Some(3));
        assert_eq!(pet.weight, None);

        let nameless = PetForm {
            name: String::new(),
            ..form
        };
        assert!(nameless.pet(3).is_none());
    }

    #[test]
    fn appointment_form_requires_every_key_field() {
        let mut form = AppointmentForm {
            veterinarian_id: "7".to_string(),
            pet_id: "21".to_string(),
            appointment_date: "2024-03-15".to_string(),
            appointment_time: "10:00".to_string(),
            reason: " Revisión ".to_string(),
        };
        let payload = form.appointment(3).unwrap();
        assert_eq!(payload.reason, "Revisión");
        assert_eq!(payload.client_id, 3);

        form.pet_id = String::new();
        assert!(form.appointment(3).is_none());
    }

    #[actix_web::test]
    async fn unconfirmed_status_change_is_not_sent() {
        let state = AppState::for_tests();
        let id = state.sessions.sign_in(
            "tok".to_string(),
            SessionUser {
                id: 7,
                email: "luis@clinica.es".to_string(),
                first_name: "Luis".to_string(),
                last_name: "Mora".to_string(),
                role: Role::Veterinarian,
            },
        );
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let req = atest::TestRequest::get()
            .uri("/appointment/11/status?status=completed")
            .cookie(Cookie::new(SESSION_COOKIE, id.clone()))
            .to_request();
        let html = String::from_utf8(atest::call_and_read_body(&app, req).await.to_vec()).unwrap();
        assert!(html.contains("¿Está seguro de cambiar el estado de la cita a completed?"));
        assert!(html.contains("action=\"/appointment/11/status\""));

        let req = atest::TestRequest::post()
            .uri("/appointment/11/status")
            .cookie(Cookie::new(SESSION_COOKIE, id.clone()))
            .set_form([("status", "completed"), ("confirmed", "no")])
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/dashboard");
        assert!(state.sessions.take_flash(&id).is_empty());
    }

    #[actix_web::test]
    async fn veterinarians_cannot_book() {
        let state = AppState::for_tests();
        let id = state.sessions.sign_in(
            "tok".to_string(),
            SessionUser {
                id: 7,
                email: "luis@clinica.es".to_string(),
                first_name: "Luis".to_string(),
                last_name: "Mora".to_string(),
                role: Role::Veterinarian,
            },
        );
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let req = atest::TestRequest::get()
            .uri("/appointment/new")
            .cookie(Cookie::new(SESSION_COOKIE, id.clone()))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/dashboard");
        assert_eq!(state.sessions.take_flash(&id), vec![Notice::error(CLIENTS_ONLY)]);
    }
}
