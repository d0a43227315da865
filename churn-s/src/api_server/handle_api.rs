use super::*;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};

use crate::api_server::churn;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

impl ApiServer {
    pub async fn run_api_server(self: Arc<Self>, addr: &str) -> Result<()> {
        let app = self.create_api_router().await;
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("API server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(crate::util::shutdown_signal())
            .await
            .map_err(Into::into)
    }

    // Create API Router
    pub async fn create_api_router(self: Arc<Self>) -> Router {
        let state = Arc::clone(&self);
        Router::new()
            .route("/health", get(churn::health))
            //user_id in the query string, model_params as body
            .route("/api/churn", post(churn::predict_churn))
            .route("/api/churn/", post(churn::predict_churn))
            //full request envelope as body
            .route("/api/v1/churn/predict", post(churn::predict_churn_envelope))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::PredictionHandler;
    use crate::model::{tests::fixture_path, ModelGateway};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use common::{FeatureSchema, PredictionResponse};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn model_params() -> Value {
        json!({
            "gender": 1, "SeniorCitizen": 0, "Partner": 0, "Dependents": 0,
            "Type": 0.55, "PaperlessBilling": 1, "PaymentMethod": 0.22,
            "MonthlyCharges": 50.8, "TotalCharges": 288.05, "MultipleLines": 0,
            "InternetService": 0.34, "OnlineSecurity": 0, "OnlineBackup": 0,
            "DeviceProtection": 0, "TechSupport": 1, "StreamingTV": 0,
            "StreamingMovies": 0, "days": 245, "services": 2
        })
    }

    async fn router(model_path: std::path::PathBuf) -> Router {
        let schema = FeatureSchema::churn();
        let gateway = ModelGateway::from_path(model_path, &schema);
        let server = ApiServer::with_handler(PredictionHandler::new(Arc::new(gateway), schema));
        Arc::new(server).create_api_router().await
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router("/nonexistent/churn.json".into()).await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_predict_with_query_user_id() {
        let app = router(fixture_path()).await;
        let (status, body) = send(app, post_json("/api/churn/?user_id=123", &model_params())).await;
        assert_eq!(status, StatusCode::OK);

        let response: PredictionResponse = serde_json::from_value(body).unwrap();
        match response {
            PredictionResponse::Success {
                user_id,
                probability,
                is_churn,
            } => {
                assert_eq!(user_id, 123);
                assert!((0.0..=1.0).contains(&probability));
                assert_eq!(is_churn, u8::from(probability > 0.5));
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_predict_envelope() {
        let app = router(fixture_path()).await;
        let request = json!({ "user_id": 7, "model_params": model_params() });
        let (status, body) = send(app, post_json("/api/v1/churn/predict", &request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], 7);
        assert!(body["probability"].is_f64());
    }

    #[tokio::test]
    async fn test_bad_query_user_id() {
        let app = router(fixture_path()).await;
        let (status, body) = send(app, post_json("/api/churn?user_id=abc", &model_params())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validate_params_errors");
        assert_eq!(body["details"], json!(["bad type of user_id"]));
    }

    #[tokio::test]
    async fn test_missing_body() {
        let app = router(fixture_path()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/churn?user_id=123")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"], json!(["unset user_id or model_params dict keys"]));
    }

    #[tokio::test]
    async fn test_query_route_invalid_json_body() {
        let app = router(fixture_path()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/churn?user_id=123")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{bad"))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validate_params_errors");
        let details = body["details"].as_array().unwrap();
        assert_eq!(details.len(), 1);
        assert!(details[0]
            .as_str()
            .unwrap()
            .starts_with("model_params body is not valid JSON"));
    }

    #[tokio::test]
    async fn test_envelope_invalid_json_body() {
        let app = router(fixture_path()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/churn/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validate_params_errors");
        assert!(body["details"][0]
            .as_str()
            .unwrap()
            .starts_with("request body is not valid JSON"));
    }

    #[tokio::test]
    async fn test_envelope_empty_body() {
        let app = router(fixture_path()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/churn/predict")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validate_params_errors");
    }

    #[tokio::test]
    async fn test_envelope_without_content_type() {
        let app = router(fixture_path()).await;
        let payload = json!({ "user_id": 9, "model_params": model_params() });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/churn/predict")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], 9);
        assert!(body["probability"].is_f64());
    }

    #[tokio::test]
    async fn test_empty_model_params() {
        let app = router(fixture_path()).await;
        let request = json!({ "user_id": 123, "model_params": {} });
        let (status, body) = send(app, post_json("/api/v1/churn/predict", &request)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validate_params_errors");
        assert!(body.get("probability").is_none());
    }

    #[tokio::test]
    async fn test_model_unavailable() {
        let app = router("/nonexistent/churn.json".into()).await;
        let request = json!({ "user_id": 123, "model_params": model_params() });
        let (status, body) = send(app, post_json("/api/v1/churn/predict", &request)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Error while handling request"));
        assert!(body["details"][0]
            .as_str()
            .unwrap()
            .starts_with("Failed to load model:"));
    }

    #[test]
    fn test_status_mapping() {
        use crate::api_server::churn::status_for;

        let ok = PredictionResponse::success(1, 0.2);
        assert_eq!(status_for(&ok, true), StatusCode::OK);

        let invalid = PredictionResponse::validation_error(vec![]);
        assert_eq!(status_for(&invalid, false), StatusCode::UNPROCESSABLE_ENTITY);

        let failed = PredictionResponse::error("Error while handling request: boom", vec![]);
        assert_eq!(status_for(&failed, true), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(&failed, false), StatusCode::SERVICE_UNAVAILABLE);
    }
}
