//! HTTP surface: router, handlers, and the session-cookie extractor.
//!
//! Every response uses the `{"success": true, "data": ...}` envelope;
//! failures go through [`Error`]'s `IntoResponse` impl. Reads are public,
//! writes require an authenticated session cookie.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{self, SessionStore};
use crate::config::Config;
use crate::error::{AppResult, Error};
use crate::model::NewScore;
use crate::qr;
use crate::DbPool;

const SESSION_COOKIE: &str = "zoomoot_session";

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_lifetime_secs));
        Self {
            pool,
            sessions,
            config: Arc::new(config),
        }
    }
}

/// Pull the session id out of the Cookie header, if any.
fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

fn session_cookie(id: &str, max_age: i64) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Strict")
}

fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict")
}

/// Extractor that rejects the request with a 401 unless the caller holds a
/// live session. Handlers for gated endpoints take this as an argument.
pub struct AuthSession {
    pub session_id: String,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session_id =
            session_id_from_headers(&parts.headers).ok_or(Error::Unauthorized)?;
        if !state.sessions.is_authenticated(&session_id) {
            return Err(Error::Unauthorized);
        }
        Ok(AuthSession { session_id })
    }
}

/// Run a store closure on a pooled connection without blocking the async
/// executor. Diesel is synchronous, so every store call goes through here.
async fn blocking<T, F>(pool: &DbPool, f: F) -> AppResult<T>
where
    F: FnOnce(&mut SqliteConnection) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| Error::Internal(format!("blocking task panicked: {e}")))?
}

fn ok_data<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}

fn ok_list<T: Serialize>(data: Vec<T>) -> Json<serde_json::Value> {
    let count = data.len();
    Json(json!({ "success": true, "data": data, "count": count }))
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub activity_name: String,
}

#[derive(Debug, Deserialize)]
pub struct TeamRequest {
    pub team_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateScoreRequest {
    pub activity_id: i32,
    pub team_id: i32,
    pub creative_score: i32,
    pub participation_score: i32,
    pub bribe_score: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateScoreRequest {
    pub creative_score: Option<i32>,
    pub participation_score: Option<i32>,
    pub bribe_score: Option<i32>,
}

fn default_expires_in_hours() -> i64 {
    24
}

fn default_qr_description() -> String {
    "Activity Leader QR Code".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateQrTokenRequest {
    #[serde(default = "default_expires_in_hours")]
    pub expires_in_hours: i64,
    #[serde(default = "default_qr_description")]
    pub description: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    #[serde(default)]
    pub stats: bool,
    pub activity_id: Option<i32>,
    pub team_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct QrLoginParams {
    #[serde(default)]
    pub token: String,
}

// ---------------------------------------------------------------------------
// Auth handlers
// ---------------------------------------------------------------------------

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    if !auth::verify_password(
        &req.password,
        &state.config.admin_password,
        &state.config.password_salt,
    ) {
        tracing::warn!("rejected password login attempt");
        return Err(Error::InvalidCredentials);
    }

    let session_id = state.sessions.create();
    tracing::info!("password login established a session");

    let cookie = session_cookie(&session_id, state.config.session_lifetime_secs);
    Ok((
        [(header::SET_COOKIE, cookie)],
        ok_data(json!({
            "authenticated": true,
            "expires_in": state.config.session_lifetime_secs,
        })),
    ))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(session_id) = session_id_from_headers(&headers) {
        state.sessions.destroy(&session_id);
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        ok_data(json!({ "authenticated": false })),
    )
}

async fn session_info(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let (authenticated, expires_in) = match session_id_from_headers(&headers) {
        Some(id) if state.sessions.is_authenticated(&id) => {
            (true, state.sessions.remaining_seconds(&id))
        }
        _ => (false, 0),
    };
    ok_data(json!({ "authenticated": authenticated, "expires_in": expires_in }))
}

async fn refresh_session(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<impl IntoResponse> {
    if !state.sessions.refresh(&session.session_id) {
        return Err(Error::Unauthorized);
    }
    Ok(ok_data(json!({
        "authenticated": true,
        "expires_in": state.config.session_lifetime_secs,
    })))
}

/// The landing point of a scanned QR code. A live token buys a session just
/// like a password login, then the browser is bounced to the scoreboard.
async fn qr_login(
    State(state): State<AppState>,
    Query(params): Query<QrLoginParams>,
) -> AppResult<impl IntoResponse> {
    let token = params.token.clone();
    let max_uses = state.config.qr_max_uses;
    let valid = blocking(&state.pool, move |conn| {
        qr::validate_qr_token(conn, &token, max_uses)
    })
    .await?;

    if !valid {
        tracing::warn!("rejected QR login attempt");
        return Err(Error::InvalidOrExpiredToken);
    }

    let session_id = state.sessions.create();
    tracing::info!("QR login established a session");

    // Piggyback housekeeping on successful logins.
    let removed = blocking(&state.pool, qr::cleanup_expired_tokens).await?;
    if removed > 0 {
        tracing::info!(removed, "removed expired QR tokens");
    }

    let cookie = session_cookie(&session_id, state.config.session_lifetime_secs);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")))
}

// ---------------------------------------------------------------------------
// QR token handlers (all gated)
// ---------------------------------------------------------------------------

async fn create_qr_token(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(req): Json<CreateQrTokenRequest>,
) -> AppResult<impl IntoResponse> {
    let base_url = state.config.base_url.clone();
    let issued = blocking(&state.pool, move |conn| {
        qr::issue_qr_token(conn, req.expires_in_hours, &req.description, &base_url)
    })
    .await?;
    tracing::info!(hours = issued.expires_in_hours, "issued QR token");
    Ok(ok_data(issued))
}

async fn list_qr_tokens(
    State(state): State<AppState>,
    _session: AuthSession,
) -> AppResult<impl IntoResponse> {
    let tokens = blocking(&state.pool, qr::list_active_tokens).await?;
    Ok(ok_list(tokens))
}

async fn cleanup_qr_tokens(
    State(state): State<AppState>,
    _session: AuthSession,
) -> AppResult<impl IntoResponse> {
    let removed = blocking(&state.pool, qr::cleanup_expired_tokens).await?;
    Ok(ok_data(json!({ "deleted_count": removed })))
}

// ---------------------------------------------------------------------------
// Activity handlers
// ---------------------------------------------------------------------------

async fn list_activities(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    if params.stats {
        let rows = blocking(&state.pool, crate::list_activities_with_stats).await?;
        Ok(ok_list(rows))
    } else {
        let rows = blocking(&state.pool, crate::list_activities).await?;
        Ok(ok_list(rows))
    }
}

async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let row = blocking(&state.pool, move |conn| crate::get_activity(conn, id)).await?;
    Ok(ok_data(row))
}

async fn create_activity(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(req): Json<ActivityRequest>,
) -> AppResult<impl IntoResponse> {
    let row = blocking(&state.pool, move |conn| {
        crate::create_activity(conn, &req.activity_name)
    })
    .await?;
    Ok(ok_data(row))
}

async fn update_activity(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: AuthSession,
    Json(req): Json<ActivityRequest>,
) -> AppResult<impl IntoResponse> {
    let row = blocking(&state.pool, move |conn| {
        crate::update_activity(conn, id, &req.activity_name)
    })
    .await?;
    Ok(ok_data(row))
}

async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: AuthSession,
) -> AppResult<impl IntoResponse> {
    blocking(&state.pool, move |conn| crate::delete_activity(conn, id)).await?;
    Ok(ok_data(json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Team handlers
// ---------------------------------------------------------------------------

async fn list_teams(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    if params.stats {
        let rows = blocking(&state.pool, crate::list_teams_with_stats).await?;
        Ok(ok_list(rows))
    } else {
        let rows = blocking(&state.pool, crate::list_teams).await?;
        Ok(ok_list(rows))
    }
}

async fn get_team(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let row = blocking(&state.pool, move |conn| crate::get_team(conn, id)).await?;
    Ok(ok_data(row))
}

async fn create_team(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(req): Json<TeamRequest>,
) -> AppResult<impl IntoResponse> {
    let row = blocking(&state.pool, move |conn| {
        crate::create_team(conn, &req.team_name)
    })
    .await?;
    Ok(ok_data(row))
}

async fn update_team(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: AuthSession,
    Json(req): Json<TeamRequest>,
) -> AppResult<impl IntoResponse> {
    let row = blocking(&state.pool, move |conn| {
        crate::update_team(conn, id, &req.team_name)
    })
    .await?;
    Ok(ok_data(row))
}

async fn delete_team(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: AuthSession,
) -> AppResult<impl IntoResponse> {
    blocking(&state.pool, move |conn| crate::delete_team(conn, id)).await?;
    Ok(ok_data(json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Score handlers
// ---------------------------------------------------------------------------

async fn list_scores(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let rows = match (params.activity_id, params.team_id) {
        (Some(activity_id), _) => {
            blocking(&state.pool, move |conn| {
                crate::list_scores_for_activity(conn, activity_id)
            })
            .await?
        }
        (None, Some(team_id)) => {
            blocking(&state.pool, move |conn| {
                crate::list_scores_for_team(conn, team_id)
            })
            .await?
        }
        (None, None) => blocking(&state.pool, crate::list_scores).await?,
    };
    Ok(ok_list(rows))
}

async fn get_score(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let row = blocking(&state.pool, move |conn| crate::get_score(conn, id)).await?;
    Ok(ok_data(row))
}

async fn create_score(
    State(state): State<AppState>,
    _session: AuthSession,
    Json(req): Json<CreateScoreRequest>,
) -> AppResult<impl IntoResponse> {
    let new = NewScore {
        activity_id: req.activity_id,
        team_id: req.team_id,
        creative_score: req.creative_score,
        participation_score: req.participation_score,
        bribe_score: req.bribe_score,
    };
    let row = blocking(&state.pool, move |conn| crate::create_score(conn, &new)).await?;
    Ok(ok_data(row))
}

async fn update_score(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: AuthSession,
    Json(req): Json<UpdateScoreRequest>,
) -> AppResult<impl IntoResponse> {
    let row = blocking(&state.pool, move |conn| {
        crate::update_score(
            conn,
            id,
            req.creative_score,
            req.participation_score,
            req.bribe_score,
        )
    })
    .await?;
    Ok(ok_data(row))
}

async fn delete_score(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _session: AuthSession,
) -> AppResult<impl IntoResponse> {
    blocking(&state.pool, move |conn| crate::delete_score(conn, id)).await?;
    Ok(ok_data(json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

async fn standings(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rows = blocking(&state.pool, crate::team_standings).await?;
    Ok(ok_list(rows))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/session", get(session_info))
        .route("/api/session/refresh", post(refresh_session))
        .route("/qr-login", get(qr_login))
        .route("/api/qr-tokens", get(list_qr_tokens).post(create_qr_token))
        .route("/api/qr-tokens/expired", delete(cleanup_qr_tokens))
        .route(
            "/api/activities",
            get(list_activities).post(create_activity),
        )
        .route(
            "/api/activities/{id}",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
        .route("/api/teams", get(list_teams).post(create_team))
        .route(
            "/api/teams/{id}",
            get(get_team).put(update_team).delete(delete_team),
        )
        .route("/api/scores", get(list_scores).post(create_score))
        .route(
            "/api/scores/{id}",
            get(get_score).put(update_score).delete(delete_score),
        )
        .route("/api/standings", get(standings))
        .with_state(state)
}
