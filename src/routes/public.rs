use actix_files::NamedFile;
use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use askama::Template;
use serde::Deserialize;
use serde_json::json;

use crate::{
    admin::Notice,
    api::RegisterPayload,
    auth::{redirect_with_public_notice, session_cookie, session_id, PublicNotice},
    models::SessionUser,
    state::AppState,
    templates::{render, PageContext, SelectOption},
    validation::{FieldKind, FormCheck},
};

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    ctx: PageContext,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    ctx: PageContext,
    email: String,
    check: FormCheck,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    ctx: PageContext,
    form: RegisterForm,
    roles: Vec<SelectOption>,
    check: FormCheck,
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RegisterForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    specialization: String,
}

impl RegisterForm {
    fn check(&self) -> FormCheck {
        FormCheck::new()
            .field("email", FieldKind::Email, true, &self.email)
            .field("password", FieldKind::Password, true, &self.password)
            .field("first_name", FieldKind::Text, true, &self.first_name)
            .field("last_name", FieldKind::Text, true, &self.last_name)
            .field("phone", FieldKind::Tel, false, &self.phone)
    }

    fn payload(&self) -> RegisterPayload {
        RegisterPayload {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            role: if self.role.is_empty() {
                "client".to_string()
            } else {
                self.role.clone()
            },
            specialization: self.specialization.trim().to_string(),
        }
    }
}

fn role_options(selected: &str) -> Vec<SelectOption> {
    [("client", "Cliente"), ("veterinarian", "Veterinario")]
        .into_iter()
        .map(|(value, label)| SelectOption::new(value, label, value == selected))
        .collect()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/login").route(web::get().to(show_login)).route(web::post().to(login)))
        .service(web::resource("/register").route(web::get().to(show_register)).route(web::post().to(register)))
        .service(web::resource("/logout").route(web::get().to(logout)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/sw.js").route(web::get().to(service_worker)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy", "service": "frontend" }))
}

async fn service_worker(state: web::Data<AppState>) -> Result<NamedFile> {
    let path = format!("{}/sw.js", state.config.static_dir.trim_end_matches('/'));
    Ok(NamedFile::open(path)?)
}

async fn index(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    Ok(render(IndexTemplate {
        ctx: PageContext::from_request(&req, &state),
    }))
}

async fn show_login(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    Ok(render(LoginTemplate {
        ctx: PageContext::from_request(&req, &state),
        email: String::new(),
        check: FormCheck::new(),
    }))
}

fn signed_in_redirect(
    req: &HttpRequest,
    state: &AppState,
    token: String,
    user: SessionUser,
    message: &str,
) -> HttpResponse {
    if let Some(previous) = session_id(req) {
        state.sessions.sign_out(&previous);
    }
    let id = state.sessions.sign_in(token, user);
    state.sessions.push_flash(&id, Notice::success(message));
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/dashboard"))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .cookie(session_cookie(req, state, &id))
        .finish()
}

async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let check = FormCheck::new()
        .field("email", FieldKind::Email, true, &form.email)
        .field("password", FieldKind::Password, true, &form.password);
    if check.blocks_submit() {
        return Ok(render(LoginTemplate {
            ctx: PageContext::from_request(&req, &state),
            email: form.email,
            check,
        }));
    }

    match state.api.login(form.email.trim(), &form.password).await {
        Ok(session) => Ok(signed_in_redirect(
            &req,
            &state,
            session.access_token,
            session.user,
            "Inicio de sesión exitoso",
        )),
        Err(err) => {
            log::warn!("Login failed for {}: {err}", form.email.trim());
            Ok(render(LoginTemplate {
                ctx: PageContext::from_request(&req, &state)
                    .with_notice(Some(Notice::error("Credenciales inválidas"))),
                email: form.email,
                check,
            }))
        }
    }
}

async fn show_register(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    Ok(render(RegisterTemplate {
        ctx: PageContext::from_request(&req, &state),
        form: RegisterForm::default(),
        roles: role_options("client"),
        check: FormCheck::new(),
    }))
}

async fn register(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let check = form.check();
    let mut notice = None;
    if !check.blocks_submit() {
        match state.api.register(&form.payload()).await {
            Ok(session) => {
                return Ok(signed_in_redirect(
                    &req,
                    &state,
                    session.access_token,
                    session.user,
                    "Registro exitoso",
                ))
            }
            Err(err) => {
                log::warn!("Registration failed for {}: {err}", form.email.trim());
                notice = Some(Notice::error("Error en el registro"));
            }
        }
    }

    Ok(render(RegisterTemplate {
        ctx: PageContext::from_request(&req, &state).with_notice(notice),
        roles: role_options(&form.role),
        form: RegisterForm {
            password: String::new(),
            ..form
        },
        check,
    }))
}

async fn logout(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Some(id) = session_id(&req) {
        state.sessions.sign_out(&id);
    }
    redirect_with_public_notice("/", PublicNotice::SignedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::SESSION_COOKIE, models::Role};
    use actix_web::{cookie::Cookie, http::StatusCode, test as atest, App};

    fn client_user() -> SessionUser {
        SessionUser {
            id: 5,
            email: "eva@correo.es".to_string(),
            first_name: "Eva".to_string(),
            last_name: "Soto".to_string(),
            role: Role::Client,
        }
    }

    #[actix_web::test]
    async fn health_reports_frontend() {
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(AppState::for_tests()))
                .configure(configure),
        )
        .await;

        let resp = atest::call_service(&app, atest::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = atest::read_body_json(resp).await;
        assert_eq!(body, json!({ "status": "healthy", "service": "frontend" }));
    }

    #[actix_web::test]
    async fn missing_required_login_field_is_not_submitted() {
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(AppState::for_tests()))
                .configure(configure),
        )
        .await;

        let req = atest::TestRequest::post()
            .uri("/login")
            .set_form([("email", "ana@clinica.es"), ("password", "")])
            .to_request();
        let body = atest::call_and_read_body(&app, req).await;
        let html = String::from_utf8(body.to_vec()).unwrap();

        assert!(html.contains("is-invalid"));
        assert!(!html.contains("Credenciales inválidas"));
    }

    #[actix_web::test]
    async fn logout_leaves_notice_for_landing_page() {
        let state = AppState::for_tests();
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let id = state.sessions.sign_in("tok".to_string(), client_user());
        let req = atest::TestRequest::get()
            .uri("/logout")
            .cookie(Cookie::new(SESSION_COOKIE, id.clone()))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string();
        assert_eq!(location, "/?notice=signed_out");
        assert!(state.sessions.signed_in(&id).is_none());

        let req = atest::TestRequest::get().uri(&location).to_request();
        let html = String::from_utf8(atest::call_and_read_body(&app, req).await.to_vec()).unwrap();
        assert!(html.contains("Sesión cerrada exitosamente"));
        assert_eq!(state.sessions.session_count(), 0);
    }

    #[actix_web::test]
    async fn login_page_shows_only_known_notice_codes() {
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(AppState::for_tests()))
                .configure(configure),
        )
        .await;

        let req = atest::TestRequest::get().uri("/login?notice=login_required").to_request();
        let html = String::from_utf8(atest::call_and_read_body(&app, req).await.to_vec()).unwrap();
        assert!(html.contains(crate::auth::LOGIN_REQUIRED));

        let req = atest::TestRequest::get().uri("/login?notice=%3Cscript%3E").to_request();
        let html = String::from_utf8(atest::call_and_read_body(&app, req).await.to_vec()).unwrap();
        assert!(!html.contains(crate::auth::LOGIN_REQUIRED));
        assert!(!html.contains("<script>"));
    }
}
