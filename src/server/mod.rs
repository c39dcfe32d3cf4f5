//! HTTP surface: one JSON endpoint for the frontend plus a health probe.

use crate::portfolio::{PortfolioService, PortfolioSnapshot};
use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PortfolioService>,
}

/// Hard failure while building a snapshot.
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Portfolio request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:#}", self.0) })),
        )
            .into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);

    Router::new()
        .route("/api/portfolio", get(get_portfolio))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn get_portfolio(State(state): State<AppState>) -> Result<Json<PortfolioSnapshot>, ApiError> {
    let snapshot = state.service.snapshot().await?;
    Ok(Json(snapshot))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortfolioConfig;
    use crate::exchange::{ExchangeError, MockFuturesGateway, OrderPage};
    use tokio::net::TcpListener;

    async fn spawn(gateway: MockFuturesGateway) -> String {
        let service = PortfolioService::new(Arc::new(gateway), PortfolioConfig::default());
        let app = create_router(AppState {
            service: Arc::new(service),
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn empty_account() -> MockFuturesGateway {
        let mut gateway = MockFuturesGateway::new();
        gateway.expect_open_positions().returning(|| Ok(Vec::new()));
        gateway.expect_tickers().returning(|| Ok(Vec::new()));
        gateway.expect_contracts().returning(|| Ok(Vec::new()));
        gateway
            .expect_history_orders()
            .returning(|_| Ok(OrderPage::default()));
        gateway
    }

    #[tokio::test]
    async fn test_portfolio_endpoint_returns_snapshot() {
        let mut gateway = empty_account();
        gateway.expect_account_assets().returning(|| {
            Ok(serde_json::from_value(json!([{"currency": "USDT", "cashBalance": "250.5"}])).unwrap())
        });
        let base = spawn(gateway).await;

        let response = reqwest::get(format!("{}/api/portfolio", base)).await.unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["currency"], "USDT");
        assert_eq!(body["equity"], "250.5");
        assert_eq!(body["pnlSource"], "computed");
        assert_eq!(body["trades"]["count"], 0);
    }

    #[tokio::test]
    async fn test_portfolio_endpoint_reports_failure_as_500() {
        let mut gateway = empty_account();
        gateway.expect_account_assets().returning(|| {
            Err(ExchangeError::Api {
                code: 401,
                message: "Not logged in".to_string(),
            })
        });
        let base = spawn(gateway).await;

        let response = reqwest::get(format!("{}/api/portfolio", base)).await.unwrap();
        assert_eq!(response.status(), 500);

        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Not logged in"));
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(MockFuturesGateway::new()).await;

        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }
}
