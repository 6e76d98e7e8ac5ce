//! Info API server for the enclave custody service
//!
//! Read-only HTTP surface built with Axum:
//! - Key enumeration (getAllKeysInfo, getLastCreatedKey, isKeyExist)
//! - Effective server configuration (getServerConfiguration)
//! - Liveness probe
//!
//! Every method answers with the uniform `{status, errorMessage, ...}`
//! envelope. Secret material is never reachable from here; the DKG surface
//! lives behind the dispatcher, not this server.

use std::future::Future;
use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{AppState, ServerConfiguration};

/// Create and configure the info API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let info = Router::new()
        .route("/keys", get(routes::keys::get_all_keys_info))
        .route("/keys/last", get(routes::keys::get_last_created_key))
        .route("/keys/:name/exists", get(routes::keys::is_key_exist))
        .route(
            "/configuration",
            get(routes::config::get_server_configuration),
        );

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/info", info)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Bind the info API listener. Kept separate from [`start_server`] so the
/// caller sees a bind failure synchronously, before anything is spawned.
pub async fn bind(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind(addr).await
}

/// Serve the info API on an already-bound listener; resolves once
/// `shutdown` fires and in-flight requests have drained.
pub async fn start_server(
    state: AppState,
    listener: tokio::net::TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!("starting info API server on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("info API server stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use custody_storage::{KeyStore, MemoryKeyStore};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let keys = Arc::new(MemoryKeyStore::new());
        keys.put("bls_key:alpha", "sealed-a").unwrap();
        keys.put("bls_key:beta", "sealed-b").unwrap();
        AppState::new(keys, ServerConfiguration::default())
    }

    async fn get_json(router: Router, uri: &str) -> Value {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn all_keys_info_lists_every_identifier() {
        let body = get_json(create_router(test_state()), "/info/keys").await;
        assert_eq!(body["status"], 0);
        assert_eq!(body["errorMessage"], "");
        assert_eq!(body["keyCount"], 2);
        assert_eq!(body["allKeys"][0], "bls_key:alpha");
        assert_eq!(body["allKeys"][1], "bls_key:beta");

        // Fingerprints are digests, never the sealed values themselves.
        let print = body["fingerprints"]["bls_key:alpha"].as_str().unwrap();
        assert_eq!(print.len(), 16);
        assert!(!print.contains("sealed"));
    }

    #[tokio::test]
    async fn last_created_key_reports_the_newest() {
        let body = get_json(create_router(test_state()), "/info/keys/last").await;
        assert_eq!(body["status"], 0);
        assert_eq!(body["keyName"], "bls_key:beta");
        assert!(body["creationTime"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn last_created_key_on_empty_store_is_an_envelope_failure() {
        let state = AppState::new(
            Arc::new(MemoryKeyStore::new()),
            ServerConfiguration::default(),
        );
        let body = get_json(create_router(state), "/info/keys/last").await;
        assert_eq!(body["status"], 1);
        assert!(body["errorMessage"]
            .as_str()
            .unwrap()
            .contains("no keys"));
        assert!(body.get("keyName").is_none());
    }

    #[tokio::test]
    async fn key_existence_is_per_identifier() {
        let router = create_router(test_state());
        let body = get_json(router.clone(), "/info/keys/bls_key:alpha/exists").await;
        assert_eq!(body["isExists"], true);

        let body = get_json(router, "/info/keys/bls_key:missing/exists").await;
        assert_eq!(body["status"], 0);
        assert_eq!(body["isExists"], false);
    }

    #[tokio::test]
    async fn configuration_snapshot_is_disclosed() {
        let keys = Arc::new(MemoryKeyStore::new());
        let state = AppState::new(
            keys,
            ServerConfiguration {
                log_level: "debug".to_string(),
                auto_sign: true,
                ..ServerConfiguration::default()
            },
        );
        let body = get_json(create_router(state), "/info/configuration").await;
        assert_eq!(body["status"], 0);
        assert_eq!(body["logLevel"], "debug");
        assert_eq!(body["autoSign"], true);
        assert_eq!(body["checkZmqSig"], true);
    }

    #[tokio::test]
    async fn health_check_answers() {
        let body = get_json(create_router(test_state()), "/health").await;
        assert_eq!(body["status"], "ok");
    }
}
