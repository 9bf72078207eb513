use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::cli::ServeArgs;
use crate::rfv::{self, JobConfig, RfvStats};
use crate::storage::{self, RfvStore};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn RfvStore>,
    job: JobConfig,
    // Delete-then-upsert is not atomic; one run at a time.
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn RfvStore>, job: JobConfig) -> Self {
        Self {
            store,
            job,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub async fn run(opts: ServeArgs) -> anyhow::Result<()> {
    let store = storage::open(&opts.store)?;
    let state = AppState::new(store, opts.job.config());
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", opts.host, opts.port)
        .parse()
        .context("parse host:port")?;

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api_health))
        .route(
            "/calculate-rfv",
            post(api_calculate_rfv).options(api_preflight),
        )
        .route(
            "/functions/v1/calculate-rfv",
            post(api_calculate_rfv).options(api_preflight),
        )
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub stats: RfvStats,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

async fn api_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_preflight() -> StatusCode {
    StatusCode::OK
}

async fn api_calculate_rfv(State(st): State<AppState>) -> Response {
    let Ok(_guard) = st.run_lock.try_lock() else {
        return error_response(
            StatusCode::CONFLICT,
            "An RFV calculation is already running".to_string(),
        );
    };

    match rfv::run(st.store.as_ref(), &st.job, Utc::now()).await {
        Ok(stats) => Json(SuccessResponse {
            success: true,
            stats,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("RFV calculation failed: {e:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::model::RevenueRecord;
    use crate::storage::memory::MemoryStore;

    fn app(store: MemoryStore) -> (AppState, Router) {
        let state = AppState::new(Arc::new(store), JobConfig::default());
        (state.clone(), router(state))
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::ORIGIN, "https://crm.example.com")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn calculate_returns_stats() {
        let store = MemoryStore::with_revenue(vec![RevenueRecord {
            amount: 120.0,
            date: Some("2024-01-01".into()),
            patient_name: Some("Ana".into()),
            ..Default::default()
        }]);
        let (_, app) = app(store);

        let resp = app.oneshot(post("/calculate-rfv")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["stats"]["totalCustomers"], 1);
        assert_eq!(json["stats"]["inserted"], 1);
        assert_eq!(json["stats"]["errors"], 0);
        assert_eq!(json["stats"]["missingCpf"], 1);
    }

    #[tokio::test]
    async fn revenue_failure_is_500_with_error() {
        let store = MemoryStore {
            fail_revenue_at_offset: Some(0),
            ..Default::default()
        };
        let (_, app) = app(store);

        let resp = app
            .oneshot(post("/functions/v1/calculate-rfv"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("load revenue records"));
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let (state, app) = app(MemoryStore::default());
        let _held = state.run_lock.lock().await;

        let resp = app.oneshot(post("/calculate-rfv")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("already running"));
    }

    #[tokio::test]
    async fn options_returns_empty_ok() {
        let (_, app) = app(MemoryStore::default());
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/calculate-rfv")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn health() {
        let (_, app) = app(MemoryStore::default());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }
}
