use actix_cors::Cors;
use actix_files::Files;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod error;
mod services;
mod state;
#[cfg(test)]
mod test_support;

fn cors(config: &config::CorsConfig) -> Cors {
    if config.allowed_origin == "*" {
        return Cors::permissive();
    }
    Cors::default()
        .allowed_origin(&config.allowed_origin)
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if it exists
    dotenv().ok();

    env_logger::init();

    let config = config::AppConfig::new().expect("Failed to load configuration");
    let config = Arc::new(config);

    log::info!(
        "Starting server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Upload root plus the spool directory for multipart bodies
    tokio::fs::create_dir_all(config.storage.temp_dir())
        .await
        .expect("Failed to create upload directory");

    let pool = db::create_pool(&config.database.url, config.database.max_connections)
        .expect("Failed to create database pool");
    let state = web::Data::new(state::AppState::postgres(pool, config.clone()));

    let c = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors(&c.cors))
            // Spooled multipart bodies are never served
            .service(
                Files::new("/uploads", &c.storage.upload_path)
                    .path_filter(|path, _| !path.starts_with("tmp")),
            )
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run()
    .await
}
