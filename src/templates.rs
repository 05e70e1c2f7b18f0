use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use serde::Deserialize;

use crate::{
    admin::Notice,
    auth::{session_id, PublicNotice, SignedIn},
    models::{Role, SessionUser},
    state::AppState,
};

pub fn render<T: Template>(template: T) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(err) => {
            log::error!("Template render error: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// What `base.html` needs on every page: the navigation user and the flash
/// notices queued for this session or named by the `notice` query code.
#[derive(Clone, Debug, Default)]
pub struct PageContext {
    pub user: Option<SessionUser>,
    pub notices: Vec<Notice>,
}

impl PageContext {
    pub fn from_request(req: &HttpRequest, state: &AppState) -> Self {
        let public = web::Query::<NoticeQuery>::from_query(req.query_string())
            .ok()
            .and_then(|query| query.into_inner().notice)
            .map(PublicNotice::notice);
        let context = match session_id(req) {
            Some(id) => Self {
                user: state.sessions.signed_in(&id).map(|signed_in| signed_in.user),
                notices: state.sessions.take_flash(&id),
            },
            None => Self::default(),
        };
        context.with_notice(public)
    }

    pub fn signed_in(state: &AppState, signed_in: &SignedIn) -> Self {
        Self {
            user: Some(signed_in.user.clone()),
            notices: state.sessions.take_flash(&signed_in.session_id),
        }
    }

    pub fn with_notice(mut self, notice: Option<Notice>) -> Self {
        self.notices.extend(notice);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.role == Role::Admin)
    }

    pub fn user_name(&self) -> String {
        self.user
            .as_ref()
            .map(SessionUser::display_name)
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct NoticeQuery {
    notice: Option<PublicNotice>,
}

/// One `<option>` of a select box.
#[derive(Clone, Debug)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            selected,
        }
    }
}

/// Stands in for a blocking `confirm()` dialog: posts `fields` plus
/// `confirmed=yes` to `action`, or goes back to `cancel_href`.
#[derive(Template)]
#[template(path = "confirm.html")]
pub struct ConfirmTemplate {
    pub ctx: PageContext,
    pub message: String,
    pub action: String,
    pub fields: Vec<(String, String)>,
    pub cancel_href: String,
}
