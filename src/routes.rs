//! HTTP surface: `POST /api/predict` and `GET /health`.

use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::collector;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::types::{PredictResponse, RawVehicleRecord};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

#[derive(Deserialize, Debug, Default)]
pub struct PredictParams {
    /// Per-request override of the oracle timeout.
    pub timeout_ms: Option<u64>,
}

pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/predict", post(predict).fallback(method_not_allowed))
        .with_state(AppState { dispatcher })
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind().as_str(),
        }));
        let mut resp = (status, body).into_response();
        if let DispatchError::MethodNotSupported(_) = self {
            resp.headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        resp
    }
}

/// POST /api/predict
pub async fn predict(
    State(state): State<AppState>,
    params: Result<Query<PredictParams>, QueryRejection>,
    payload: Result<Json<Vec<RawVehicleRecord>>, JsonRejection>,
) -> Result<Json<PredictResponse>, DispatchError> {
    let result = handle_predict(&state, params, payload).await;
    match &result {
        Ok(resp) => info!(winner = resp.winning_vehicle_id, "predict ok"),
        Err(e) => warn!(kind = e.kind().as_str(), error = %e, "predict failed"),
    }
    result
}

async fn handle_predict(
    state: &AppState,
    params: Result<Query<PredictParams>, QueryRejection>,
    payload: Result<Json<Vec<RawVehicleRecord>>, JsonRejection>,
) -> Result<Json<PredictResponse>, DispatchError> {
    let Query(params) = params.map_err(|e| DispatchError::MalformedInput(e.body_text()))?;
    let Json(records) = payload.map_err(|e| DispatchError::MalformedInput(e.body_text()))?;

    let timeout = match params.timeout_ms {
        Some(0) => {
            return Err(DispatchError::MalformedInput(
                "timeout_ms must be greater than zero".into(),
            ))
        }
        Some(ms) => Duration::from_millis(ms),
        None => state.dispatcher.default_timeout(),
    };

    let batch = collector::collect(&records)?;
    let outcome = state.dispatcher.dispatch_with_timeout(&batch, timeout).await?;
    Ok(Json(outcome.into()))
}

async fn method_not_allowed(method: Method) -> DispatchError {
    DispatchError::MethodNotSupported(method.to_string())
}
