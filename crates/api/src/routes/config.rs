//! Server configuration endpoint

use axum::{extract::State, Json};
use custody_types::Envelope;

use crate::state::{AppState, ServerConfiguration};

/// GET /info/configuration - getServerConfiguration
///
/// Returns the effective startup options so operators can confirm what the
/// running server was actually configured with.
pub async fn get_server_configuration(
    State(state): State<AppState>,
) -> Json<Envelope<ServerConfiguration>> {
    Json(Envelope::success(state.config.as_ref().clone()))
}
