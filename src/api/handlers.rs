use std::sync::Arc;

use actix_web::{get, http::StatusCode, web, HttpResponse, Responder};
use serde_json::json;

use super::AppState;
use crate::storage::StoreError;

pub(crate) const GET_ORDER: &str = "get_order";

#[get("/api/order/{order_uid}")]
pub async fn get_order(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let timer = state
        .metrics
        .http_request_duration
        .with_label_values(&[GET_ORDER])
        .start_timer();

    let order_uid = path.into_inner();
    let response = lookup_order(&state, order_uid.trim()).await;

    state
        .metrics
        .record_http_request(GET_ORDER, response.status().as_u16());
    timer.observe_duration();
    response
}

/// Cache first, then storage. A storage hit is written back to the cache.
async fn lookup_order(state: &AppState, order_uid: &str) -> HttpResponse {
    if order_uid.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "order uid is required", order_uid);
    }

    let order = match state.cache.get(order_uid) {
        Some(order) => {
            tracing::debug!(order_uid = %order_uid, "Cache hit");
            order
        }
        None => {
            tracing::debug!(order_uid = %order_uid, "Cache miss, reading storage");
            match state.store.get_by_key(order_uid).await {
                Ok(order) => {
                    let order = Arc::new(order);
                    state.cache.set(order_uid.to_string(), order.clone());
                    order
                }
                // Storage failures surface as not-found; 5xx is for serialization only.
                Err(StoreError::NotFound(_)) => {
                    return error_response(StatusCode::NOT_FOUND, "order not found", order_uid);
                }
                Err(e) => {
                    state.metrics.record_db_error(GET_ORDER);
                    tracing::error!(order_uid = %order_uid, error = %e, "Failed to read order");
                    return error_response(StatusCode::NOT_FOUND, "order not found", order_uid);
                }
            }
        }
    };

    match serde_json::to_vec(order.as_ref()) {
        Ok(body) => HttpResponse::Ok().content_type("application/json").body(body),
        Err(e) => {
            tracing::error!(order_uid = %order_uid, error = %e, "Failed to serialize order");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error", order_uid)
        }
    }
}

fn error_response(status: StatusCode, message: &str, order_uid: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "error": message, "order_uid": order_uid }))
}

#[get("/metrics")]
pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    match state.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
