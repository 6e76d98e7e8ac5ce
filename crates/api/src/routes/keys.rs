//! Key-enumeration endpoints
//!
//! These disclose identifiers and timestamps only; key material itself is
//! never reachable through the info surface.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use custody_storage::value_fingerprint;
use custody_types::Envelope;
use serde::{Deserialize, Serialize};

use crate::{state::AppState, ApiResult};

/// Response payload for `getAllKeysInfo`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllKeysInfo {
    /// Every stored key identifier, sorted
    pub all_keys: Vec<String>,
    /// Number of stored keys
    pub key_count: usize,
    /// Value digest per key, for comparing stores without disclosure
    pub fingerprints: BTreeMap<String, String>,
}

/// Response payload for `getLastCreatedKey`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCreatedKey {
    pub key_name: String,
    /// Unix timestamp of key creation
    pub creation_time: u64,
}

/// Response payload for `isKeyExist`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExists {
    pub is_exists: bool,
}

/// GET /info/keys - getAllKeysInfo
pub async fn get_all_keys_info(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<AllKeysInfo>>> {
    let all_keys = state.keys.list_keys()?;
    let key_count = all_keys.len();
    let mut fingerprints = BTreeMap::new();
    for name in &all_keys {
        if let Some(value) = state.keys.get(name)? {
            fingerprints.insert(name.clone(), value_fingerprint(&value));
        }
    }
    Ok(Json(Envelope::success(AllKeysInfo {
        all_keys,
        key_count,
        fingerprints,
    })))
}

/// GET /info/keys/last - getLastCreatedKey
///
/// An empty store is a caller-visible failure, not an empty payload.
pub async fn get_last_created_key(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<LastCreatedKey>>> {
    match state.keys.last_created()? {
        Some((key_name, creation_time)) => Ok(Json(Envelope::success(LastCreatedKey {
            key_name,
            creation_time,
        }))),
        None => Ok(Json(Envelope::failure(1, "no keys have been created"))),
    }
}

/// GET /info/keys/:name/exists - isKeyExist
pub async fn is_key_exist(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Envelope<KeyExists>>> {
    let is_exists = state.keys.exists(&name)?;
    Ok(Json(Envelope::success(KeyExists { is_exists })))
}
