use std::sync::Arc;

use actix_web::{dev::Server, web, App, HttpServer};

use crate::cache::OrderCache;
use crate::metrics::Metrics;
use crate::storage::OrderStore;

pub mod handlers;

// ============================================================================
// HTTP Read Path
// ============================================================================
//
// GET /api/order/{order_uid}  cache, then storage (hit written back to cache)
// GET /metrics                Prometheus text format
// GET /health                 liveness
//
// Runs on actix workers, independent of the ingestion task. The cache is the
// only state it shares with the pipeline.
//
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub cache: Arc<dyn OrderCache>,
    pub metrics: Arc<Metrics>,
}

pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(state))
            .service(handlers::get_order)
            .service(handlers::metrics)
            .service(handlers::health);
    }
}

pub fn build_server(state: AppState, port: u16) -> std::io::Result<Server> {
    tracing::info!(port = port, "🌐 Starting HTTP server on http://0.0.0.0:{}", port);

    let server = HttpServer::new(move || App::new().configure(configure(state.clone())))
        .bind(("0.0.0.0", port))?
        .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};

    use crate::cache::LruCache;
    use crate::domain::order::fixtures::sample_order;
    use crate::domain::order::Order;
    use crate::storage::InMemoryOrderStore;

    const UID: &str = "b563feb7-b2b8-4b6e-9f2a-3c1d5e7f9a0b";

    fn state(store: Arc<InMemoryOrderStore>, cache: Arc<LruCache<String, Arc<Order>>>) -> AppState {
        AppState {
            store,
            cache,
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    #[actix_web::test]
    async fn test_get_order_from_storage_fills_cache() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.save(&sample_order(UID)).await.unwrap();
        let cache = Arc::new(LruCache::new(10));
        let app = test::init_service(App::new().configure(configure(state(store.clone(), cache.clone())))).await;

        let req = test::TestRequest::get().uri(&format!("/api/order/{}", UID)).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Order = serde_json::from_slice(&test::read_body(res).await).unwrap();
        assert_eq!(body, sample_order(UID));
        assert_eq!(store.read_calls(), 1);

        // Second lookup is served from the cache.
        let req = test::TestRequest::get().uri(&format!("/api/order/{}", UID)).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(store.read_calls(), 1);
        assert!(cache.get(UID).is_some());
    }

    #[actix_web::test]
    async fn test_missing_order_is_404() {
        let store = Arc::new(InMemoryOrderStore::new());
        let app = test::init_service(
            App::new().configure(configure(state(store, Arc::new(LruCache::new(10))))),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/order/unknown").to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "order not found");
    }

    #[actix_web::test]
    async fn test_storage_failure_is_404() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.close().await;
        let state = state(store, Arc::new(LruCache::new(10)));
        let metrics = state.metrics.clone();
        let app = test::init_service(App::new().configure(configure(state))).await;

        let req = test::TestRequest::get().uri(&format!("/api/order/{}", UID)).to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "order not found");
        assert_eq!(metrics.db_errors.with_label_values(&[handlers::GET_ORDER]).get(), 1);
    }

    #[actix_web::test]
    async fn test_metrics_and_health() {
        let store = Arc::new(InMemoryOrderStore::new());
        let app = test::init_service(
            App::new().configure(configure(state(store, Arc::new(LruCache::new(10))))),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/order/unknown").to_request();
        let _ = test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let res = test::call_service(&app, req).await;
        assert!(res.status().is_success());
        let text = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
        assert!(text.contains("http_requests_total{handler=\"get_order\",status=\"404\"} 1"));

        let req = test::TestRequest::get().uri("/health").to_request();
        let res = test::call_service(&app, req).await;
        assert!(res.status().is_success());
    }
}
