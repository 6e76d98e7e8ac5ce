//! Mapping from wire requests to supervisor-mediated kernel operations.

use custody_crypto::{Commitment, SecretShare};
use custody_enclave::EnclaveSupervisor;
use custody_types::{DkgParams, DkgRequest, DkgResponse, Result};
use serde_json::json;
use tracing::error;

/// Execute one request against the enclave and build the response.
///
/// Caller-facing failures (parameter validation, unknown sessions, failed
/// verification) become structured error responses; they never kill the
/// serving worker. A runtime failure of the trusted context itself is
/// logged at error level for the orchestrator's watchdog, then reported
/// like any other failure.
pub fn handle_request(supervisor: &EnclaveSupervisor, request: DkgRequest) -> DkgResponse {
    match execute(supervisor, request) {
        Ok(result) => DkgResponse::success(result),
        Err(err) => {
            if err.is_fatal() {
                error!(error = %err, "enclave call failed fatally");
            }
            DkgResponse::failure(&err)
        }
    }
}

fn execute(supervisor: &EnclaveSupervisor, request: DkgRequest) -> Result<serde_json::Value> {
    match request {
        DkgRequest::StartDkg { t, n } => {
            DkgParams::new(t, n).validate()?;
            let session = supervisor.start_dkg(t)?;
            Ok(json!({ "session": session }))
        }
        DkgRequest::GetPublicShares { session, t } => {
            let commitments = supervisor.compute_public_shares(session, t)?;
            let encoded: Vec<String> = commitments.iter().map(Commitment::to_hex).collect();
            Ok(json!({ "publicShares": encoded }))
        }
        DkgRequest::GetSecretShare {
            session,
            t,
            n,
            index,
        } => {
            let share = supervisor.compute_secret_share(session, t, n, index)?;
            // Hex here is the sealed transport form; participant-key
            // encryption is the transport collaborator's job.
            Ok(json!({ "secretShare": share.to_hex(), "index": index }))
        }
        DkgRequest::VerifyShare {
            commitments,
            share,
            t,
            index,
        } => {
            let commitments = commitments
                .iter()
                .map(|encoded| Commitment::from_hex(encoded))
                .collect::<Result<Vec<_>>>()?;
            let share = SecretShare::from_hex(&share)?;
            let verified = supervisor.verify_share(&commitments, &share, t, index)?;
            Ok(json!({ "verified": verified }))
        }
        DkgRequest::DeriveBlsPublicKey { share } => {
            let share = SecretShare::from_hex(&share)?;
            let public_key = supervisor.derive_bls_public_key(&share)?;
            Ok(json!({ "publicKey": public_key.to_hex() }))
        }
        DkgRequest::ConvertToG2 { share } => {
            let share = SecretShare::from_hex(&share)?;
            let encoding = supervisor.convert_to_g2(&share)?;
            Ok(json!({ "shareG2": encoding.to_hex() }))
        }
        DkgRequest::DiscardSession { session } => {
            supervisor.discard_session(session)?;
            Ok(json!({ "discarded": true }))
        }
    }
}
