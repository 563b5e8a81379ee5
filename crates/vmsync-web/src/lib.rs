//! Axum read surface over the make store.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};
use vmsync_storage::MakeStore;

pub mod query;

pub const CRATE_NAME: &str = "vmsync-web";
pub const DEFAULT_WEB_PORT: u16 = 8000;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MakeStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn MakeStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/makes", get(makes_handler))
        .route("/graphql", post(query_handler))
        .with_state(Arc::new(state))
}

pub fn port_from_env() -> u16 {
    std::env::var("VMSYNC_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_WEB_PORT)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "serving make read api");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn makes_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.find_all().await {
        Ok(makes) => Json(makes).into_response(),
        Err(err) => server_error(err),
    }
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    let fields = match query::parse_query(&request.query) {
        Ok(fields) => fields,
        Err(message) => return query_error(message),
    };
    let selection = match query::makes_selection(&fields) {
        Ok(selection) => selection,
        Err(message) => return query_error(message),
    };
    let makes = match state.store.find_all().await {
        Ok(makes) => makes,
        Err(err) => return server_error(err),
    };
    match query::project_makes(&makes, selection) {
        Ok(projected) => Json(json!({ "data": { "makes": projected } })).into_response(),
        Err(err) => server_error(err),
    }
}

fn query_error(message: String) -> Response {
    Json(json!({ "errors": [{ "message": message }] })).into_response()
}

fn server_error(err: impl std::fmt::Display) -> Response {
    warn!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Server error: {err}"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use serde_json::Value as JsonValue;
    use tower::ServiceExt;
    use vmsync_core::{Make, MakeWrite, VehicleType};
    use vmsync_storage::{MemoryMakeStore, StoreError};

    fn seeded_state() -> AppState {
        AppState::new(Arc::new(MemoryMakeStore::with_records([
            Make::shell("440", "ASTON MARTIN")
                .with_types(vec![VehicleType::new("2", "Passenger Car")]),
            Make::shell("441", "TESLA"),
        ])))
    }

    async fn body_json(resp: Response) -> JsonValue {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn query_request(query: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/graphql")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap()
    }

    struct DownStore;

    #[async_trait]
    impl MakeStore for DownStore {
        async fn find_all(&self) -> Result<Vec<Make>, StoreError> {
            Err(StoreError::Unavailable("store offline".into()))
        }

        async fn count(&self) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("store offline".into()))
        }

        async fn upsert_one(&self, _write: MakeWrite) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("store offline".into()))
        }

        async fn upsert_many(&self, _writes: Vec<MakeWrite>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("store offline".into()))
        }

        async fn delete_one(&self, _make_id: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("store offline".into()))
        }

        async fn apply_shells(
            &self,
            _to_delete: &[String],
            _writes: Vec<MakeWrite>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("store offline".into()))
        }
    }

    #[tokio::test]
    async fn handler_smoke_healthz() {
        let resp = app(seeded_state())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn handler_lists_makes_in_external_shape() {
        let resp = app(seeded_state())
            .oneshot(Request::builder().uri("/api/makes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "application/json"
        );
        let value = body_json(resp).await;
        assert_eq!(value[0]["makeId"], "440");
        assert_eq!(value[0]["vehicleTypes"][0]["typeName"], "Passenger Car");
        assert_eq!(value[1]["vehicleTypes"], json!([]));
    }

    #[tokio::test]
    async fn handler_query_projects_selected_fields() {
        let resp = app(seeded_state())
            .oneshot(query_request("{ makes { makeId vehicleTypes { typeId } } }"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({"data": {"makes": [
                {"makeId": "440", "vehicleTypes": [{"typeId": "2"}]},
                {"makeId": "441", "vehicleTypes": []}
            ]}})
        );
    }

    #[tokio::test]
    async fn handler_query_reports_errors_in_body() {
        let resp = app(seeded_state())
            .oneshot(query_request("{ makes { engine } }"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let value = body_json(resp).await;
        assert!(value["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("engine"));
        assert!(value.get("data").is_none());
    }

    #[tokio::test]
    async fn handler_store_failure_is_server_error() {
        let resp = app(AppState::new(Arc::new(DownStore)))
            .oneshot(Request::builder().uri("/api/makes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
