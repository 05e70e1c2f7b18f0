use std::sync::Arc;

use crate::{api::ApiClient, auth::SessionStore, config::Config};

#[derive(Clone)]
pub struct AppState {
    /// Unauthenticated client; requests on behalf of a user go through
    /// [`ApiClient::with_token`].
    pub api: ApiClient,
    pub sessions: SessionStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(api: ApiClient, config: Config) -> Self {
        Self {
            api,
            sessions: SessionStore::default(),
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// Points at a closed local port; nothing in these tests reaches the backend.
    pub fn for_tests() -> Self {
        Self::new(
            ApiClient::new(reqwest::Client::new(), "http://127.0.0.1:9"),
            Config::default(),
        )
    }
}
