//! Puzzle issuance and proof verification endpoints.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use toll_common::{Challenge, TollError};

use crate::state::AppState;

use super::error_response;

#[derive(Deserialize)]
pub struct ProblemQuery {
    api_key: String,
}

#[derive(Serialize)]
struct ProblemResponse {
    code: i32,
    data: ProblemData,
}

#[derive(Serialize)]
struct ProblemData {
    question: Challenge,
}

/// Issue a puzzle for a site, rotating its RSA epoch first when due.
pub async fn get_problem(
    State(state): State<AppState>,
    params: Result<Query<ProblemQuery>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return error_response(-1, rejection.body_text()),
    };

    let mut site = match state.registry.lookup_by_api_key(&params.api_key).await {
        Ok(site) => site,
        Err(TollError::NotFound(_)) => return error_response(-2, "Site not exists"),
        Err(e) => {
            tracing::error!(api_key = %params.api_key, error = %e, "Site load failed");
            return error_response(-2, "Site not exists");
        }
    };

    match state.generator.issue(&mut site).await {
        Ok(question) => Json(ProblemResponse {
            code: 0,
            data: ProblemData { question },
        })
        .into_response(),
        Err(e) => {
            tracing::error!(api_key = %params.api_key, error = %e, "Unable to rotate site key");
            error_response(-10, "Unable to update key")
        }
    }
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    prove: String,
    api_key: String,
}

#[derive(Serialize)]
struct VerifyResponse {
    code: i32,
    message: String,
    data: VerifyData,
}

#[derive(Serialize)]
struct VerifyData {
    prove: String,
    is_correct: bool,
    verify_time_ms: f64,
}

/// Check a submitted proof `x.y.h` against the site's key epochs.
///
/// `code` is zero on any well-formed verification, even an incorrect
/// solution; negative codes mean the request never reached the puzzle.
pub async fn verify_proof(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return error_response(-10, rejection.body_text()),
    };

    let parts: Vec<&str> = req.prove.split('.').collect();
    if parts.len() != 3 {
        return error_response(-20, "Invalid parameter prove");
    }
    let (x_raw, y_raw, h_raw) = (parts[0], parts[1], parts[2]);

    match state.verifier.verify(&req.api_key, x_raw, y_raw, h_raw).await {
        Ok(outcome) => {
            let message = if outcome.is_correct {
                format!(
                    "Proof is correct. Verification took {:.3}ms",
                    outcome.verify_time_ms
                )
            } else {
                "Proof is INVALID".to_string()
            };
            Json(VerifyResponse {
                code: 0,
                message,
                data: VerifyData {
                    prove: req.prove,
                    is_correct: outcome.is_correct,
                    verify_time_ms: outcome.verify_time_ms,
                },
            })
            .into_response()
        }
        Err(e) => verify_error(e),
    }
}

fn verify_error(e: TollError) -> Response {
    match e {
        TollError::MalformedProof("x") => error_response(-24, "Invalid parameter x"),
        TollError::MalformedProof(_) => error_response(-30, "Invalid x or y"),
        TollError::NotFound(_) => error_response(-25, "No such site. Invalid api_key?"),
        TollError::InvalidSignature => error_response(-30, "Invalid signature for x"),
        TollError::AlreadyUsed => error_response(-40, "This proof is already used"),
        other => {
            tracing::error!(error = %other, "Proof verification failed internally");
            error_response(-25, "No such site. Invalid api_key?")
        }
    }
}
