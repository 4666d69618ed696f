// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub mod accounts;
pub mod health;
pub mod wallets;

pub fn router(state: AppState) -> Router {
    let wallet_routes = Router::new()
        .route("/wallets", get(wallets::list_wallets))
        .route(
            "/wallets/{name}",
            get(wallets::get_wallet)
                .post(wallets::create_wallet)
                .put(wallets::import_wallet),
        )
        .route("/wallets/{name}/locks/LOCKED", put(wallets::lock_wallet))
        .route("/wallets/{name}/locks/UNLOCKED", put(wallets::unlock_wallet))
        .route(
            "/wallets/{name}/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        );

    let account_routes = Router::new()
        .route("/wallets/accounts/entries", post(accounts::search_entries))
        .route("/wallets/accounts/{address}", get(accounts::get_account))
        .route(
            "/wallets/accounts/{address}/details",
            get(accounts::get_account_details),
        )
        .route(
            "/wallets/accounts/{address}/states/DISABLED",
            post(accounts::disable_account),
        )
        .route(
            "/wallets/accounts/{address}/states/ENABLED",
            post(accounts::enable_account),
        )
        .route(
            "/wallets/accounts/{address}/transactions/SEND",
            post(accounts::send),
        )
        .route(
            "/wallets/accounts/{address}/transactions/CHANGE",
            post(accounts::change),
        );

    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(wallet_routes)
        .merge(account_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApp;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = router(app.state.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = TestApp::new().await;
        let _ = router(app.state.clone()).into_make_service();
    }

    #[tokio::test]
    async fn wallet_and_account_flow_over_http() {
        let app = TestApp::new().await;

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, issued) = call(&app, "POST", "/wallets/main", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let key = issued["encryption_key"].as_str().unwrap().to_string();

        let (status, account) = call(&app, "POST", "/wallets/main/accounts", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let address = account["address"].as_str().unwrap().to_string();

        let (status, fetched) = call(&app, "GET", &format!("/wallets/accounts/{address}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["wallet_name"], "main");
        assert_eq!(fetched["state"], "ENABLED");

        let (status, _) = call(&app, "PUT", "/wallets/main/locks/LOCKED", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, wallet) = call(&app, "GET", "/wallets/main", None).await;
        assert_eq!(wallet["lock"], "LOCKED");

        let (status, wallet) = call(
            &app,
            "PUT",
            "/wallets/main/locks/UNLOCKED",
            Some(json!({ "encryption_key": key })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wallet["lock"], "UNLOCKED");

        let (status, disabled) = call(
            &app,
            "POST",
            &format!("/wallets/accounts/{address}/states/DISABLED"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(disabled["state"], "DISABLED");

        let (status, entries) = call(&app, "POST", "/wallets/accounts/entries", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entries["entries"], json!([]));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = TestApp::new().await;
        let address = app.funded_account("main", 10).await;

        let (status, body) = call(&app, "GET", "/wallets/accounts/not-an-address", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = call(&app, "POST", "/wallets/main", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/wallets/accounts/{address}/transactions/SEND"),
            Some(json!({ "receiver_address": address.to_string(), "amount": 11 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, sent) = call(
            &app,
            "POST",
            &format!("/wallets/accounts/{address}/transactions/SEND"),
            Some(json!({ "receiver_address": address.to_string(), "amount": 4, "last_height": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sent["height"], 2);
        assert_eq!(sent["block_type"], "SEND");

        let (status, details) =
            call(&app, "GET", &format!("/wallets/accounts/{address}/details"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["balance"], 6);

        let (status, _) = call(&app, "GET", "/wallets/ghost/accounts", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
