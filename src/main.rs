mod admin;
mod api;
mod auth;
mod config;
mod filters;
mod format;
mod models;
mod routes;
mod state;
mod templates;
mod validation;

use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};

use crate::{api::ApiClient, config::Config, state::AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env();
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let api = ApiClient::new(http, &config.api_base_url);

    let address = format!("0.0.0.0:{}", config.port);
    let static_dir = config.static_dir.clone();
    log::info!("Backend gateway at {}", config.api_base_url);
    log::info!("Starting VetClinic frontend on http://{address}");

    let state = AppState::new(api, config);
    actix_web::rt::spawn(auth::sweep_expired(state.sessions.clone()));

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", &static_dir).prefer_utf8(true))
            .configure(routes::public::configure)
            .configure(routes::dashboard::configure)
            .configure(routes::admin::configure)
            .configure(routes::api::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
