//! JSON endpoints used by `app.js`. They authenticate with an
//! `Authorization: Bearer` header or, failing that, the session cookie.

use actix_web::{web, HttpRequest, HttpResponse, Result};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde::Deserialize;
use serde_json::json;

use crate::{
    api::{ApiClient, ApiError, NewPet},
    auth::api_token,
    state::AppState,
};

#[derive(Deserialize)]
struct SlotsQuery {
    #[serde(default)]
    date: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/appointments/available-slots/{vet_id}")
                    .route(web::get().to(available_slots)),
            )
            .service(web::resource("/appointments/pets").route(web::post().to(create_pet)))
            .service(
                web::resource("/notifications/{id}/mark-read").route(web::put().to(mark_read)),
            ),
    );
}

fn authorized(req: &HttpRequest, state: &AppState, bearer: Option<&BearerAuth>) -> Option<ApiClient> {
    api_token(req, state, bearer).map(|token| state.api.with_token(&token))
}

fn no_session() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({ "error": "No hay sesión activa" }))
}

/// Backend rejections are relayed as-is; anything else is a generic 500.
fn relay_error(operation: &str, err: ApiError) -> HttpResponse {
    match err {
        ApiError::Backend(message) => HttpResponse::BadRequest().json(json!({ "error": message })),
        other => {
            log::error!("{operation} failed: {other}");
            HttpResponse::InternalServerError()
                .json(json!({ "error": "Error al comunicarse con el servicio" }))
        }
    }
}

async fn available_slots(
    state: web::Data<AppState>,
    req: HttpRequest,
    bearer: Option<BearerAuth>,
    path: web::Path<i64>,
    query: web::Query<SlotsQuery>,
) -> Result<HttpResponse> {
    let Some(api) = authorized(&req, &state, bearer.as_ref()) else {
        return Ok(no_session());
    };
    let vet_id = path.into_inner();
    if query.date.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "error": "Fecha requerida" })));
    }
    match api.available_slots(vet_id, query.date.trim()).await {
        Ok(slots) => Ok(HttpResponse::Ok().json(json!({ "available_slots": slots }))),
        Err(err) => Ok(relay_error("Loading available slots", err)),
    }
}

async fn mark_read(
    state: web::Data<AppState>,
    req: HttpRequest,
    bearer: Option<BearerAuth>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let Some(api) = authorized(&req, &state, bearer.as_ref()) else {
        return Ok(no_session());
    };
    let id = path.into_inner();
    match api.mark_notification_read(id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "message": "Notificación marcada como leída" }))),
        Err(err) => Ok(relay_error("Marking notification read", err)),
    }
}

async fn create_pet(
    state: web::Data<AppState>,
    req: HttpRequest,
    bearer: Option<BearerAuth>,
    pet: web::Json<NewPet>,
) -> Result<HttpResponse> {
    let Some(api) = authorized(&req, &state, bearer.as_ref()) else {
        return Ok(no_session());
    };
    log::info!("Creating pet {} for owner {}", pet.name, pet.owner_id);
    match api.create_pet(&pet).await {
        Ok(created) => Ok(HttpResponse::Created().json(created)),
        Err(err) => Ok(relay_error("Creating pet", err)),
    }
}
