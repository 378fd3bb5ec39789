use std::collections::HashMap;

use chrono::Duration;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spotx_common::security::verify_token;
use spotx_common::slot_calendar::overview;
use spotx_common::types::{
    CampaignInput, CampaignStatus, MerchantStatus, NewMerchantRequest, NewUserRequest,
};
use spotx_db::queries::NotificationQueries;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::app::AppState;
use crate::notification_manager::PushRequest;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Transport-independent request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (path_and_query, HashMap::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = serde_json::to_vec(body).map(Bytes::from).unwrap_or_default();
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        Self::with_status(StatusCode::OK, value)
    }

    fn created<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        Self::with_status(StatusCode::CREATED, value)
    }

    fn with_status<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_value(value).map_err(|e| {
            warn!("Failed to serialize response: {}", e);
            ApiError::Internal
        })?;
        Ok(Self { status, body })
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        Self { status: err.status(), body: err.body() }
    }
}

pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", raw)))
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    match (token, state.config.auth.admin_token_hash.as_deref()) {
        (Some(token), Some(hash)) if verify_token(token, hash) => Ok(()),
        _ => {
            warn!("Rejected admin request without a valid token");
            Err(ApiError::Unauthorized)
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartSessionBody {
    user_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct PayoutBody {
    amount_cents: i64,
}

#[derive(Debug, Deserialize)]
struct PreferencesBody {
    preferred_slots: Vec<u8>,
    #[serde(default)]
    push_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewCampaignBody {
    merchant_id: Uuid,
    #[serde(flatten)]
    campaign: CampaignInput,
}

#[derive(Debug, Deserialize)]
struct MerchantStatusBody {
    status: MerchantStatus,
}

#[derive(Debug, Deserialize)]
struct CampaignStatusBody {
    status: CampaignStatus,
}

/// Route one request and render errors as JSON
pub async fn dispatch(state: &AppState, request: ApiRequest) -> ApiResponse {
    debug!("{} {}", request.method, request.path);
    match route(state, &request).await {
        Ok(response) => response,
        Err(err) => {
            debug!("{} {} failed: {}", request.method, request.path, err);
            err.into()
        }
    }
}

async fn route(state: &AppState, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();
    let body = &request.body;

    match (&request.method, segments.as_slice()) {
        (&Method::GET, ["api", "health"]) => ApiResponse::ok(&json!({ "status": "ok" })),

        (&Method::GET, ["api", "slots"]) => ApiResponse::ok(&overview(state.clock.time_of_day())),

        // Users
        (&Method::POST, ["api", "users"]) => {
            let new_user: NewUserRequest = parse_body(body)?;
            ApiResponse::created(&state.users.register(new_user).await?)
        }
        (&Method::GET, ["api", "users", id]) => {
            ApiResponse::ok(&state.users.get(parse_id(id)?).await?)
        }
        (&Method::GET, ["api", "users", id, "daily-status"]) => {
            let user = state.users.get(parse_id(id)?).await?;
            let status = state.daily_status.get_daily_status(user.id, state.clock.today()).await?;
            ApiResponse::ok(&status)
        }
        (&Method::GET, ["api", "users", id, "ad"]) => {
            let slot_id = request
                .query
                .get("slot")
                .and_then(|s| s.parse::<u8>().ok())
                .ok_or_else(|| {
                    ApiError::BadRequest("Query parameter 'slot' is required".to_string())
                })?;
            let user = state.users.get(parse_id(id)?).await?;
            let campaign = state.selector.get_ad_for_slot(&user, slot_id).await?;
            ApiResponse::ok(&json!({ "slot_id": slot_id, "campaign": campaign }))
        }
        (&Method::GET, ["api", "users", id, "rewards", "summary"]) => {
            ApiResponse::ok(&state.rewards.summary(parse_id(id)?).await?)
        }
        (&Method::GET, ["api", "users", id, "payouts"]) => {
            ApiResponse::ok(&state.rewards.payouts(parse_id(id)?).await?)
        }
        (&Method::POST, ["api", "users", id, "payouts"]) => {
            let payout: PayoutBody = parse_body(body)?;
            let payout = state.rewards.request_payout(parse_id(id)?, payout.amount_cents).await?;
            ApiResponse::created(&payout)
        }
        (&Method::PUT, ["api", "users", id, "notification-preferences"]) => {
            let id = parse_id(id)?;
            let prefs: PreferencesBody = parse_body(body)?;
            let mut user = state.users.set_preferred_slots(id, &prefs.preferred_slots).await?;
            if prefs.push_token.is_some() {
                user = state.users.set_push_token(id, prefs.push_token.as_deref()).await?;
            }
            ApiResponse::ok(&user)
        }

        // View sessions
        (&Method::POST, ["api", "sessions"]) => {
            let start: StartSessionBody = parse_body(body)?;
            let user = state.users.get(start.user_id).await?;
            ApiResponse::created(&state.sessions.start(&user).await?)
        }
        (&Method::GET, ["api", "sessions", id]) => {
            ApiResponse::ok(&state.sessions.snapshot(parse_id(id)?).await?)
        }
        (&Method::DELETE, ["api", "sessions", id]) => {
            state.sessions.cancel(parse_id(id)?).await?;
            ApiResponse::ok(&json!({ "cancelled": true }))
        }
        (&Method::POST, ["api", "sessions", id, "close"]) => {
            ApiResponse::ok(&state.sessions.close(parse_id(id)?).await?)
        }
        (&Method::POST, ["api", "sessions", id, "acknowledge"]) => {
            ApiResponse::ok(&state.sessions.acknowledge(parse_id(id)?).await?)
        }

        // Merchants and campaigns
        (&Method::POST, ["api", "merchants"]) => {
            let new_merchant: NewMerchantRequest = parse_body(body)?;
            ApiResponse::created(&state.campaigns.register_merchant(new_merchant).await?)
        }
        (&Method::GET, ["api", "merchants", id]) => {
            ApiResponse::ok(&state.campaigns.merchant(parse_id(id)?).await?)
        }
        (&Method::GET, ["api", "campaigns"]) => {
            let merchant_id = request.query.get("merchant_id").map(|id| parse_id(id)).transpose()?;
            ApiResponse::ok(&state.campaigns.list_campaigns(merchant_id).await?)
        }
        (&Method::POST, ["api", "campaigns"]) => {
            let new: NewCampaignBody = parse_body(body)?;
            let campaign = state.campaigns.create_campaign(new.merchant_id, new.campaign).await?;
            ApiResponse::created(&campaign)
        }
        (&Method::GET, ["api", "campaigns", id]) => {
            ApiResponse::ok(&state.campaigns.campaign(parse_id(id)?).await?)
        }
        (&Method::PUT, ["api", "campaigns", id]) => {
            let input: CampaignInput = parse_body(body)?;
            ApiResponse::ok(&state.campaigns.update_campaign(parse_id(id)?, input).await?)
        }
        (&Method::DELETE, ["api", "campaigns", id]) => {
            state.campaigns.delete_campaign(parse_id(id)?).await?;
            ApiResponse::ok(&json!({ "deleted": true }))
        }
        (&Method::GET, ["api", "campaigns", id, "stats"]) => {
            let to = state.clock.today();
            let from = to - Duration::days(29);
            ApiResponse::ok(&state.campaigns.stats(parse_id(id)?, from, to).await?)
        }

        // Admin
        (_, ["api", "admin", ..]) => {
            require_admin(state, &request.headers)?;
            admin_route(state, request, &segments[2..]).await
        }

        _ => Err(ApiError::NotFound(format!("No route for {} {}", request.method, request.path))),
    }
}

async fn admin_route(
    state: &AppState,
    request: &ApiRequest,
    segments: &[&str],
) -> Result<ApiResponse, ApiError> {
    let body = &request.body;

    match (&request.method, segments) {
        (&Method::PUT, ["merchants", id, "status"]) => {
            let update: MerchantStatusBody = parse_body(body)?;
            let merchant = state.campaigns.set_merchant_status(parse_id(id)?, update.status).await?;
            ApiResponse::ok(&merchant)
        }
        (&Method::PUT, ["campaigns", id, "status"]) => {
            let update: CampaignStatusBody = parse_body(body)?;
            let campaign = state.campaigns.set_campaign_status(parse_id(id)?, update.status).await?;
            ApiResponse::ok(&campaign)
        }
        (&Method::PUT, ["payouts", id, "paid"]) => {
            ApiResponse::ok(&state.rewards.mark_paid(parse_id(id)?).await?)
        }
        (&Method::POST, ["notifications"]) => {
            let push: PushRequest = parse_body(body)?;
            let queued = state.notifications.dispatch(push).await?;
            ApiResponse::ok(&json!({ "queued": queued }))
        }
        (&Method::GET, ["notifications"]) => {
            let recent = NotificationQueries::list_recent(&state.db, 50).await?;
            ApiResponse::ok(&recent)
        }
        (&Method::GET, ["dashboard"]) => ApiResponse::ok(&state.admin.dashboard().await?),
        (&Method::POST, ["outbox", "flush"]) => {
            ApiResponse::ok(&state.recorder.flush_outbox().await?)
        }
        _ => Err(ApiError::NotFound(format!("No route for {} {}", request.method, request.path))),
    }
}
