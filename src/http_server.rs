use actix_web::{get, middleware, App, HttpResponse, HttpServer, Responder};
use nglbot::observability::METRICS;

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    tracing::info!("Starting HTTP server on port {}", port);

    HttpServer::new(|| {
        App::new()
            .wrap(middleware::Logger::default())
            .service(health)
            .service(metrics)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

#[get("/health")]
async fn health() -> impl Responder {
    tracing::debug!("Health check");
    "I'm ok"
}

#[get("/metrics")]
async fn metrics() -> impl Responder {
    HttpResponse::Ok().json(METRICS.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_answers_ok() {
        let app = test::init_service(App::new().service(health)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "I'm ok");
    }

    #[actix_web::test]
    async fn test_metrics_are_json() {
        let app = test::init_service(App::new().service(metrics)).await;
        let req = test::TestRequest::get().uri("/metrics").to_request();
        let json: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(json.get("messages_delivered").is_some());
        assert!(json.get("uptime_secs").is_some());
    }
}
