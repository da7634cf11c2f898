//! Site lifecycle endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use toll_common::{Site, TollError};

use crate::state::AppState;

use super::error_response;

#[derive(Serialize)]
struct CreateSiteResponse {
    code: i32,
    site: CreatedSite,
}

#[derive(Serialize)]
struct CreatedSite {
    api_key: String,
    api_secret: String,
}

/// Create a site: generates its secret, api_key, first RSA epoch, and MAC
/// key. The api_secret is returned exactly once; it is the only ownership
/// credential.
pub async fn create_site(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match state.registry.create(user_agent).await {
        Ok(site) => Json(CreateSiteResponse {
            code: 0,
            site: CreatedSite {
                api_key: site.api_key,
                api_secret: site.secret_key,
            },
        })
        .into_response(),
        Err(TollError::KeyGeneration(e)) => {
            tracing::error!(error = %e, "Site creation failed generating keys");
            error_response(-1, "Unable to create site")
        }
        Err(e) => {
            tracing::error!(error = %e, "Unable to save site data");
            error_response(-2, "Unable to save site data")
        }
    }
}

#[derive(Deserialize)]
pub struct ReadSiteRequest {
    api_secret: String,
}

#[derive(Serialize)]
struct SiteEnvelope {
    code: i32,
    data: SiteData,
}

#[derive(Serialize)]
struct SiteData {
    site: SiteInfo,
}

#[derive(Serialize)]
struct SiteInfo {
    api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_secret: Option<String>,
    hardness: u64,
    create_time: i64,
    rsa_key_regenerate_count: u32,
    rsa_key_create_time: i64,
}

impl SiteInfo {
    fn from_site(site: &Site, include_secret: bool) -> Self {
        Self {
            api_key: site.api_key.clone(),
            api_secret: include_secret.then(|| site.secret_key.clone()),
            hardness: site.hardness,
            create_time: site.create_time,
            rsa_key_regenerate_count: site.rsa_key_regenerate_count,
            rsa_key_create_time: site.rsa_key.create_time,
        }
    }
}

fn lookup_error(e: TollError) -> Response {
    match e {
        TollError::InvalidSecret(msg) => error_response(-2, format!("Invalid API Secret: {msg}")),
        TollError::NotFound(_) => error_response(-10, "Can't find site"),
        other => {
            tracing::error!(error = %other, "Site lookup failed");
            error_response(-10, "Can't find site")
        }
    }
}

/// Read a site's record, authenticating by recomputing the api_key from
/// the presented secret.
pub async fn read_site(
    State(state): State<AppState>,
    payload: Result<Json<ReadSiteRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return error_response(-1, rejection.body_text()),
    };

    match state.registry.lookup_by_secret(&req.api_secret).await {
        Ok(site) => Json(SiteEnvelope {
            code: 0,
            data: SiteData {
                site: SiteInfo::from_site(&site, true),
            },
        })
        .into_response(),
        Err(e) => lookup_error(e),
    }
}

#[derive(Deserialize)]
pub struct UpdateSiteRequest {
    api_secret: String,
    hardness: u64,
}

/// Update a site's hardness. The secret lookup is the authentication.
pub async fn update_site(
    State(state): State<AppState>,
    payload: Result<Json<UpdateSiteRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return error_response(-1, rejection.body_text()),
    };
    if req.hardness == 0 {
        return error_response(-1, "hardness must be a positive integer");
    }

    let mut site = match state.registry.lookup_by_secret(&req.api_secret).await {
        Ok(site) => site,
        Err(e) => return lookup_error(e),
    };

    if let Err(e) = state.registry.update_hardness(&mut site, req.hardness).await {
        tracing::error!(api_key = %site.api_key, error = %e, "Unable to save site info");
        return error_response(-20, "Can't save site info");
    }

    Json(SiteEnvelope {
        code: 0,
        data: SiteData {
            site: SiteInfo::from_site(&site, false),
        },
    })
    .into_response()
}
