use actix_web::{web, HttpResponse};

use crate::api::shared::ApiResponse;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)));
}

async fn health_check() -> HttpResponse {
    ApiResponse::ok(
        serde_json::json!({
            "status": "ok",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }),
        "Service is healthy",
    )
}
