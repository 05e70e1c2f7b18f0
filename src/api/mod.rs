//! Typed client for the clinic's backend REST gateway.
//!
//! Every call carries the signed-in user's bearer token. Responses whose JSON
//! body holds an `error` field are failures no matter the HTTP status.

mod admin;
mod clinic;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use admin::AdminApi;
pub use clinic::{AppointmentFilter, EmailRequest, NewAppointment, NewPet, RegisterPayload};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Backend(String),
    #[error("backend responded with status {0}")]
    Status(u16),
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Backend messages are shown verbatim; anything else collapses to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Backend(message) => format!("Error: {message}"),
            _ => fallback.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: None,
        }
    }

    pub fn with_token(&self, token: &str) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: Some(Arc::from(token)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        decode(status, &body)
    }

    /// For writes whose response body only matters when it reports an error.
    async fn send_unit(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        let _: Value = self.send(builder).await?;
        Ok(())
    }
}

pub(crate) fn decode<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, ApiError> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) if !status.is_success() => return Err(ApiError::Status(status.as_u16())),
        Err(err) => return Err(ApiError::Decode(err.to_string())),
    };

    if let Some(message) = backend_error(&value) {
        return Err(ApiError::Backend(message));
    }
    if !status.is_success() {
        return Err(ApiError::Status(status.as_u16()));
    }

    serde_json::from_value(value).map_err(|err| ApiError::Decode(err.to_string()))
}

fn backend_error(value: &Value) -> Option<String> {
    match value.get("error") {
        Some(Value::String(message)) => return Some(message.clone()),
        Some(Value::Null) | None => {}
        Some(other) => return Some(other.to_string()),
    }

    // Schema validation failures come back as `{"errors": {"field": ["msg"]}}`.
    match value.get("errors")? {
        Value::Object(fields) if !fields.is_empty() => Some(
            fields
                .iter()
                .map(|(field, messages)| format!("{field}: {}", flatten_messages(messages)))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        Value::Array(items) if !items.is_empty() => Some(
            items.iter().map(flatten_messages).collect::<Vec<_>>().join(", "),
        ),
        Value::String(message) => Some(message.clone()),
        _ => None,
    }
}

fn flatten_messages(value: &Value) -> String {
    match value {
        Value::String(message) => message.clone(),
        Value::Array(items) => items.iter().map(flatten_messages).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Envelope {
        staff: Vec<i64>,
    }

    #[test]
    fn error_field_wins_over_success_status() {
        let err = decode::<Envelope>(StatusCode::OK, br#"{"error":"Email already in use"}"#).unwrap_err();
        assert!(matches!(&err, ApiError::Backend(message) if message == "Email already in use"));
        assert_eq!(err.user_message("fallback"), "Error: Email already in use");
    }

    #[test]
    fn validation_errors_are_flattened() {
        let err = decode::<Envelope>(
            StatusCode::BAD_REQUEST,
            br#"{"errors":{"email":["Not a valid email address."]}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.user_message("fallback"),
            "Error: email: Not a valid email address."
        );
    }

    #[test]
    fn non_json_failure_collapses_to_fallback() {
        let err = decode::<Envelope>(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ApiError::Status(502)));
        assert_eq!(
            err.user_message("Error al guardar. Por favor intente nuevamente."),
            "Error al guardar. Por favor intente nuevamente."
        );
    }

    #[test]
    fn decodes_success_body() {
        let envelope = decode::<Envelope>(StatusCode::OK, br#"{"staff":[1,2,3]}"#).unwrap();
        assert_eq!(envelope.staff, vec![1, 2, 3]);
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = ApiClient::new(reqwest::Client::new(), "http://gateway:5000/");
        assert_eq!(client.url("/api/admin/staff"), "http://gateway:5000/api/admin/staff");
    }
}
