//! Dispatcher wire messages and the uniform response envelope.
//!
//! Scalars and curve points travel as hex strings so this crate stays free
//! of curve dependencies; decoding happens inside the crypto crate at the
//! trusted boundary.

use crate::{CustodyError, SessionId};
use serde::{Deserialize, Serialize};

/// A multi-party protocol request pulled off the untrusted transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DkgRequest {
    /// Generate a fresh secret polynomial inside the enclave.
    StartDkg { t: u32, n: u32 },
    /// Commitments `coeff_k * G2` for every coefficient of a session's
    /// polynomial.
    GetPublicShares { session: SessionId, t: u32 },
    /// Secret share for one participant, sealed for transport.
    GetSecretShare {
        session: SessionId,
        t: u32,
        n: u32,
        index: u32,
    },
    /// Verify a claimed share against published commitments.
    VerifyShare {
        /// Compressed G2 commitments, hex-encoded.
        commitments: Vec<String>,
        /// Claimed share scalar, hex-encoded.
        share: String,
        t: u32,
        index: u32,
    },
    /// Derive the BLS public key for a secret scalar.
    DeriveBlsPublicKey { share: String },
    /// Re-encode a secret scalar into the G2 group.
    ConvertToG2 { share: String },
    /// Drop a session's polynomial from the enclave.
    DiscardSession { session: SessionId },
}

/// Response published back through the owning agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgResponse {
    pub status: i64,
    pub error_message: String,
    /// Operation-specific payload; absent on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl DkgResponse {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            status: 0,
            error_message: String::new(),
            result: Some(result),
        }
    }

    pub fn failure(err: &CustodyError) -> Self {
        Self {
            status: 1,
            error_message: err.to_string(),
            result: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Uniform success/error envelope for info API methods.
///
/// Every method returns `{"status": 0, "errorMessage": "", ...fields}` on
/// success and a non-zero status with a message on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status: i64,
    pub error_message: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: 0,
            error_message: String::new(),
            data: Some(data),
        }
    }

    pub fn failure(status: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            error_message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trips_through_json() {
        let req = DkgRequest::GetSecretShare {
            session: SessionId(7),
            t: 3,
            n: 5,
            index: 2,
        };
        let encoded = serde_json::to_string(&req).unwrap();
        assert!(encoded.contains("\"op\":\"getSecretShare\""));
        let decoded: DkgRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn envelope_flattens_payload_fields() {
        #[derive(Serialize, Deserialize)]
        struct Keys {
            #[serde(rename = "allKeys")]
            all_keys: Vec<String>,
        }

        let body = serde_json::to_value(Envelope::success(Keys {
            all_keys: vec!["bls_key:1".to_string()],
        }))
        .unwrap();
        assert_eq!(body["status"], json!(0));
        assert_eq!(body["errorMessage"], json!(""));
        assert_eq!(body["allKeys"][0], json!("bls_key:1"));
    }

    #[test]
    fn failure_response_carries_the_error_text() {
        let resp =
            DkgResponse::failure(&CustodyError::InvalidDkgParameters("t=0".to_string()));
        assert!(!resp.is_success());
        assert!(resp.error_message.contains("t=0"));
        assert!(resp.result.is_none());
    }
}
