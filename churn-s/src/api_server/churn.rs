use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use common::PredictionResponse;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api_server::ApiServer;
use crate::handler::{MODEL_PARAMS, USER_ID};

type ChurnReply = (StatusCode, Json<PredictionResponse>);

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// user_id comes from the query string, model_params is the JSON body
pub async fn predict_churn(
    State(app_state): State<Arc<ApiServer>>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> ChurnReply {
    let mut params = Map::new();
    if let Some(raw) = query.get(USER_ID) {
        // unparsable ids are forwarded as strings so the handler reports the bad type
        let user_id = raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.clone()));
        params.insert(USER_ID.to_string(), user_id);
    }
    if !body.is_empty() {
        match serde_json::from_slice::<Value>(&body) {
            Ok(model_params) => {
                params.insert(MODEL_PARAMS.to_string(), model_params);
            }
            Err(e) => {
                debug!("Unparsable model_params body: {}", e);
                return rejected(format!("model_params body is not valid JSON: {}", e));
            }
        }
    }

    dispatch(&app_state, Value::Object(params))
}

/// Whole `{user_id, model_params}` envelope as the JSON body.
///
/// The body is parsed here rather than with the `Json` extractor so that a
/// malformed body or a missing content type still gets the error envelope.
pub async fn predict_churn_envelope(
    State(app_state): State<Arc<ApiServer>>,
    body: Bytes,
) -> ChurnReply {
    match serde_json::from_slice::<Value>(&body) {
        Ok(params) => dispatch(&app_state, params),
        Err(e) => {
            debug!("Unparsable request body: {}", e);
            rejected(format!("request body is not valid JSON: {}", e))
        }
    }
}

fn rejected(detail: String) -> ChurnReply {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(PredictionResponse::validation_error(vec![detail])),
    )
}

fn dispatch(app_state: &ApiServer, params: Value) -> ChurnReply {
    let response = app_state.handler.handle(&params);
    let status = status_for(&response, app_state.handler.gateway().is_loaded());
    if let PredictionResponse::Success {
        user_id,
        probability,
        is_churn,
    } = &response
    {
        info!(
            "Churn prediction user_id={} probability={:.4} is_churn={}",
            user_id, probability, is_churn
        );
    }
    (status, Json(response))
}

pub fn status_for(response: &PredictionResponse, model_loaded: bool) -> StatusCode {
    match response {
        PredictionResponse::Success { .. } => StatusCode::OK,
        r if r.is_validation_error() => StatusCode::UNPROCESSABLE_ENTITY,
        _ if !model_loaded => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
