//! Server-side sessions keyed by a random cookie.
//!
//! A session holds the backend bearer token and user returned at login, the
//! admin panel state, and pending flash notices. Sessions expire with their
//! cookie. Anonymous visitors never get one; the few notices they see travel
//! as a `notice` query code instead.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{self as std_time, Instant},
};

use actix_web::{
    body::{BoxBody, MessageBody},
    cookie::{time::Duration, Cookie, SameSite},
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web, Error, HttpMessage, HttpRequest, HttpResponse,
};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use parking_lot::Mutex;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    admin::{AdminState, Notice, SharedAdminState},
    api::ApiClient,
    models::{Role, SessionUser},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "vet_session";
pub const LOGIN_REQUIRED: &str = "Por favor inicia sesión primero";
pub const ADMIN_REQUIRED: &str = "Acceso restringido a administradores";

/// Matches the cookie's one-day max-age.
const SESSION_TTL: std_time::Duration = std_time::Duration::from_secs(24 * 60 * 60);
const SWEEP_INTERVAL: std_time::Duration = std_time::Duration::from_secs(300);

/// Request extension inserted by the guards for signed-in users.
#[derive(Clone)]
pub struct SignedIn {
    pub session_id: String,
    pub token: String,
    pub user: SessionUser,
    pub admin: SharedAdminState,
}

impl SignedIn {
    pub fn api(&self, state: &AppState) -> ApiClient {
        state.api.with_token(&self.token)
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

struct SessionData {
    token: String,
    user: SessionUser,
    admin: SharedAdminState,
    flash: Vec<Notice>,
    expires_at: Instant,
}

impl SessionData {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Expired entries count as absent. [`SessionStore::prune_expired`] drops
/// them on sign-in and from [`sweep_expired`].
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, SessionData>>>,
    ttl: std_time::Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

fn live<'a>(sessions: &'a mut HashMap<String, SessionData>, id: &str) -> Option<&'a mut SessionData> {
    if sessions.get(id)?.is_expired(Instant::now()) {
        sessions.remove(id);
        return None;
    }
    sessions.get_mut(id)
}

impl SessionStore {
    pub fn with_ttl(ttl: std_time::Duration) -> Self {
        Self {
            inner: Arc::default(),
            ttl,
        }
    }

    pub fn signed_in(&self, id: &str) -> Option<SignedIn> {
        let mut sessions = self.inner.lock();
        let session = live(&mut sessions, id)?;
        Some(SignedIn {
            session_id: id.to_string(),
            token: session.token.clone(),
            user: session.user.clone(),
            admin: session.admin.clone(),
        })
    }

    /// Starts a fresh session; any id the browser held before is not reused.
    pub fn sign_in(&self, token: String, user: SessionUser) -> String {
        self.prune_expired();
        let id = new_id();
        self.inner.lock().insert(
            id.clone(),
            SessionData {
                token,
                user,
                admin: AdminState::shared(),
                flash: Vec::new(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        id
    }

    pub fn sign_out(&self, id: &str) {
        self.inner.lock().remove(id);
    }

    /// Returns false when no live session has this id.
    pub fn push_flash(&self, id: &str, notice: Notice) -> bool {
        match live(&mut self.inner.lock(), id) {
            Some(session) => {
                session.flash.push(notice);
                true
            }
            None => false,
        }
    }

    pub fn take_flash(&self, id: &str) -> Vec<Notice> {
        live(&mut self.inner.lock(), id)
            .map(|session| std::mem::take(&mut session.flash))
            .unwrap_or_default()
    }

    /// Drops every expired session and returns how many went.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.inner.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Background task that keeps idle sessions from piling up between sign-ins.
pub async fn sweep_expired(store: SessionStore) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let removed = store.prune_expired();
        if removed > 0 {
            log::info!("Dropped {removed} expired sessions");
        }
    }
}

/// Notices shown to visitors without a session, carried as `?notice=<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicNotice {
    LoginRequired,
    SignedOut,
}

impl PublicNotice {
    pub fn code(self) -> &'static str {
        match self {
            PublicNotice::LoginRequired => "login_required",
            PublicNotice::SignedOut => "signed_out",
        }
    }

    pub fn notice(self) -> Notice {
        match self {
            PublicNotice::LoginRequired => Notice::error(LOGIN_REQUIRED),
            PublicNotice::SignedOut => Notice::success("Sesión cerrada exitosamente"),
        }
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn session_id(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub fn session_cookie(req: &HttpRequest, state: &AppState, id: &str) -> Cookie<'static> {
    let mut builder = Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(1));
    if state.config.cookie_secure || req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

/// Redirects and leaves `notice` for the next page. Without a live session
/// the notice is dropped; anonymous pages use [`redirect_with_public_notice`].
pub fn redirect_with_notice(
    req: &HttpRequest,
    state: &AppState,
    location: &str,
    notice: Notice,
) -> HttpResponse {
    let delivered = session_id(req).is_some_and(|id| state.sessions.push_flash(&id, notice));
    if !delivered {
        log::debug!("No live session for notice on redirect to {location}");
    }
    redirect(location)
}

pub fn redirect_with_public_notice(location: &str, notice: PublicNotice) -> HttpResponse {
    redirect(&format!("{location}?notice={}", notice.code()))
}

/// Token for the JSON endpoints: an `Authorization: Bearer` header wins over
/// the session cookie.
pub fn api_token(req: &HttpRequest, state: &AppState, bearer: Option<&BearerAuth>) -> Option<String> {
    if let Some(bearer) = bearer {
        return Some(bearer.token().to_string());
    }
    let id = session_id(req)?;
    state.sessions.signed_in(&id).map(|signed_in| signed_in.token)
}

fn lookup(req: &ServiceRequest) -> (Option<web::Data<AppState>>, Option<SignedIn>) {
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let signed_in = state.as_ref().and_then(|state| {
        let id = session_id(req.request())?;
        state.sessions.signed_in(&id)
    });
    (state, signed_in)
}

fn login_redirect() -> HttpResponse {
    redirect_with_public_notice("/login", PublicNotice::LoginRequired)
}

pub async fn session_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    let (_, signed_in) = lookup(&req);
    let Some(signed_in) = signed_in else {
        return Ok(req.into_response(login_redirect()));
    };

    req.extensions_mut().insert(signed_in);
    let res = next.call(req).await?;
    Ok(res.map_into_boxed_body())
}

pub async fn admin_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: MessageBody + 'static,
{
    let (state, signed_in) = lookup(&req);
    let signed_in = match (signed_in, state) {
        (Some(signed_in), _) if signed_in.is_admin() => signed_in,
        (Some(_), Some(state)) => {
            let response = redirect_with_notice(
                req.request(),
                &state,
                "/dashboard",
                Notice::error(ADMIN_REQUIRED),
            );
            return Ok(req.into_response(response));
        }
        _ => return Ok(req.into_response(login_redirect())),
    };

    req.extensions_mut().insert(signed_in);
    let res = next.call(req).await?;
    Ok(res.map_into_boxed_body())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{middleware::from_fn, test as atest, App};

    fn user(role: Role) -> SessionUser {
        SessionUser {
            id: 3,
            email: "ana@clinica.es".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Ruiz".to_string(),
            role,
        }
    }

    async fn whoami(signed_in: web::ReqData<SignedIn>) -> HttpResponse {
        HttpResponse::Ok().body(signed_in.user.display_name())
    }

    #[test]
    fn flash_is_taken_once() {
        let store = SessionStore::default();
        let id = store.sign_in("tok".to_string(), user(Role::Client));
        assert!(store.push_flash(&id, Notice::success("Inicio de sesión exitoso")));
        assert_eq!(store.take_flash(&id).len(), 1);
        assert!(store.take_flash(&id).is_empty());

        store.sign_out(&id);
        assert!(store.signed_in(&id).is_none());
        assert!(!store.push_flash(&id, Notice::error("x")));
    }

    #[test]
    fn expired_sessions_are_absent_and_pruned() {
        let store = SessionStore::with_ttl(std_time::Duration::ZERO);
        let first = store.sign_in("tok".to_string(), user(Role::Client));
        let second = store.sign_in("tok".to_string(), user(Role::Client));
        // Signing in the second user swept the first.
        assert_eq!(store.session_count(), 1);

        assert!(store.signed_in(&second).is_none());
        assert!(!store.push_flash(&first, Notice::error("x")));
        assert_eq!(store.session_count(), 0);

        let store = SessionStore::default();
        let id = store.sign_in("tok".to_string(), user(Role::Client));
        assert_eq!(store.prune_expired(), 0);
        assert!(store.signed_in(&id).is_some());
    }

    #[actix_web::test]
    async fn guard_redirects_anonymous_with_notice() {
        let state = AppState::for_tests();
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(
                    web::scope("/dashboard")
                        .wrap(from_fn(session_guard))
                        .route("", web::get().to(whoami)),
                ),
        )
        .await;

        for _ in 0..500 {
            let resp = atest::call_service(&app, atest::TestRequest::get().uri("/dashboard").to_request()).await;
            assert_eq!(resp.status(), actix_web::http::StatusCode::SEE_OTHER);
            assert_eq!(
                resp.headers().get(header::LOCATION).unwrap(),
                "/login?notice=login_required"
            );
            assert_eq!(resp.response().cookies().count(), 0);
        }
        assert_eq!(state.sessions.session_count(), 0);

        // A stale cookie is no better than none.
        let req = atest::TestRequest::get()
            .uri("/dashboard")
            .cookie(Cookie::new(SESSION_COOKIE, "gone"))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/login?notice=login_required"
        );
        assert_eq!(state.sessions.session_count(), 0);
    }

    #[actix_web::test]
    async fn guards_let_the_right_roles_through() {
        let state = AppState::for_tests();
        let client_id = state.sessions.sign_in("tok".to_string(), user(Role::Client));
        let admin_id = state.sessions.sign_in("tok".to_string(), user(Role::Admin));
        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(
                    web::scope("/dashboard")
                        .wrap(from_fn(session_guard))
                        .route("", web::get().to(whoami)),
                )
                .service(
                    web::scope("/admin")
                        .wrap(from_fn(admin_guard))
                        .route("", web::get().to(whoami)),
                ),
        )
        .await;

        let req = atest::TestRequest::get()
            .uri("/dashboard")
            .cookie(Cookie::new(SESSION_COOKIE, client_id.clone()))
            .to_request();
        let body = atest::call_and_read_body(&app, req).await;
        assert_eq!(body, "Ana Ruiz");

        let req = atest::TestRequest::get()
            .uri("/admin")
            .cookie(Cookie::new(SESSION_COOKIE, client_id.clone()))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/dashboard");
        assert_eq!(
            state.sessions.take_flash(&client_id),
            vec![Notice::error(ADMIN_REQUIRED)]
        );

        let req = atest::TestRequest::get()
            .uri("/admin")
            .cookie(Cookie::new(SESSION_COOKIE, admin_id))
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
