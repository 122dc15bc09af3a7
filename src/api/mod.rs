// HTTP API routes (team admin, fragment reveal, verification, leaderboard).

use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::metrics;
use crate::password::{generate_password, GENERATED_PASSWORD_LEN};
use crate::store::{parse_fragment_index, NameResolution, StoreError, TeamStore, Verification};

// ── Request types ─────────────────────────────────────────────────────

/// Admin create request. Every field is optional; malformed values fall
/// back to defaults rather than failing the request.
#[derive(Deserialize, Default)]
pub struct CreateTeamRequest {
    pub password: Option<Value>,
    pub fragments: Option<Value>,
    pub name: Option<Value>,
}

#[derive(Deserialize)]
pub struct ResolveParams {
    pub name: Option<String>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TeamStore>,
    /// Base for fragment links, without trailing slash.
    pub public_url: String,
    pub default_fragments: usize,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn internal_error(e: &StoreError) -> Response {
    tracing::error!("Store error: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

fn store_error(e: StoreError) -> Response {
    match &e {
        StoreError::NotFound(_) => json_error(StatusCode::NOT_FOUND, &e.to_string()).into_response(),
        StoreError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, msg).into_response(),
        StoreError::AlreadyCompleted { .. } => {
            json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        StoreError::Io(_) | StoreError::Serialization(_) => internal_error(&e),
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(store: Arc<TeamStore>, public_url: String, default_fragments: usize) -> Router {
    let state = AppState {
        store,
        public_url: public_url.trim_end_matches('/').to_string(),
        default_fragments: default_fragments.max(1),
    };

    Router::new()
        .route("/api/health", get(health))
        .route("/metrics", get(get_metrics))
        // Admin
        .route("/api/admin/teams", post(create_team))
        // Teams
        .route("/api/teams/resolve", get(resolve_team))
        .route("/api/teams/latest", get(latest_team))
        .route("/api/getLatestTeam", get(latest_team))
        .route("/api/teams/{id}", get(get_team))
        // Fragments
        .route("/api/teams/{id}/fragments", get(list_fragments))
        .route("/api/teams/{id}/fragments/{index}", get(get_fragment))
        .route(
            "/api/teams/{id}/runestone/{fragment_index}",
            post(complete_runestone),
        )
        // Verification and ranking
        .route("/api/verify", post(verify_password))
        .route("/api/leaderboard", get(leaderboard))
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Count and time every request, labelled by normalized path.
async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = metrics::normalize_path(req.uri().path());
    let timer = metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .start_timer();

    let response = next.run(req).await;

    timer.observe_duration();
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    response
}

async fn health() -> impl IntoResponse {
    Json(json!({ "message": "ok" }))
}

async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Admin handlers ────────────────────────────────────────────────────

async fn create_team(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    // A missing, null or non-object body means "all defaults".
    let req = match body {
        Ok(Json(fields @ Value::Object(_))) => {
            serde_json::from_value::<CreateTeamRequest>(fields).unwrap_or_default()
        }
        Ok(Json(_)) | Err(JsonRejection::MissingJsonContentType(_)) => {
            CreateTeamRequest::default()
        }
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.body_text()).into_response(),
    };

    let fragment_count = req
        .fragments
        .as_ref()
        .and_then(Value::as_f64)
        .filter(|n| n.fract() == 0.0 && *n >= 1.0)
        .map(|n| n as usize)
        .unwrap_or(state.default_fragments);
    let password = match req.password.as_ref().and_then(Value::as_str) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => generate_password(&mut rand::thread_rng(), GENERATED_PASSWORD_LEN),
    };
    let name = req.name.as_ref().and_then(Value::as_str);

    match state.store.create(&password, fragment_count, name).await {
        Ok(team) => {
            let fragment_urls: Vec<String> = team
                .fragments
                .keys()
                .map(|k| format!("{}/api/teams/{}/fragments/{k}", state.public_url, team.id))
                .collect();
            (
                StatusCode::OK,
                Json(json!({
                    "teamId": team.id,
                    "name": team.name,
                    "password": team.password,
                    "fragments": team.fragments,
                    "fragmentUrls": fragment_urls,
                })),
            )
                .into_response()
        }
        Err(e) => store_error(e),
    }
}

// ── Team handlers ─────────────────────────────────────────────────────

async fn get_team(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get(&id) {
        Some(team) => (StatusCode::OK, Json(json!(team.summary()))).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Team not found").into_response(),
    }
}

async fn latest_team(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.latest() {
        Some(team) => (StatusCode::OK, Json(json!(team.summary()))).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Team not found").into_response(),
    }
}

async fn resolve_team(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> impl IntoResponse {
    let name = params.name.unwrap_or_default();
    if name.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "name query parameter required")
            .into_response();
    }

    match state.store.resolve_by_name(&name) {
        NameResolution::NotFound => {
            json_error(StatusCode::NOT_FOUND, "Team not found").into_response()
        }
        NameResolution::Unique(team) => (StatusCode::OK, Json(json!(team))).into_response(),
        NameResolution::Ambiguous(teams) => (
            StatusCode::OK,
            Json(json!({ "multiple": true, "teams": teams })),
        )
            .into_response(),
    }
}

// ── Fragment handlers ─────────────────────────────────────────────────

async fn list_fragments(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.fragments(&id) {
        Some(fragments) => {
            (StatusCode::OK, Json(json!({ "fragments": fragments }))).into_response()
        }
        None => json_error(StatusCode::NOT_FOUND, "Team not found").into_response(),
    }
}

async fn get_fragment(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.fragment(&id, &index) {
        Ok((index, fragment)) => (
            StatusCode::OK,
            Json(json!({ "index": index.to_string(), "fragment": fragment })),
        )
            .into_response(),
        Err(e) => store_error(e),
    }
}

fn completion_rejected(message: &str, fragment: Option<&crate::store::Fragment>) -> Response {
    let mut body = json!({ "success": false, "message": message });
    if let Some(fragment) = fragment {
        body["fragment"] = json!(fragment);
    }
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Mark a fragment solved. Any request body (such as a device-reported
/// `completedAt`) is ignored: the server clock decides the score.
async fn complete_runestone(
    State(state): State<AppState>,
    Path((id, fragment_index)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(index) = parse_fragment_index(&fragment_index) else {
        return completion_rejected("Fragment not found", None);
    };

    match state.store.complete_fragment(&id, index).await {
        Ok(done) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "fragment": done.fragment,
                "team": { "id": done.team.id, "solved": done.team.solved },
            })),
        )
            .into_response(),
        Err(StoreError::AlreadyCompleted { ref fragment, .. }) => {
            completion_rejected("Fragment already solved", Some(fragment))
        }
        Err(e @ StoreError::NotFound(_)) => completion_rejected(&e.to_string(), None),
        Err(e) => store_error(e),
    }
}

// ── Verification and leaderboard ──────────────────────────────────────

async fn verify_password(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let team_id = body
        .get("teamId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty());
    let password = body.get("password").and_then(Value::as_str);

    let (Some(team_id), Some(password)) = (team_id, password) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "teamId and password required" })),
        )
            .into_response();
    };

    match state.store.verify_password(team_id, password).await {
        Ok(Verification::Accepted) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Correct, congratulations!" })),
        )
            .into_response(),
        Ok(Verification::Rejected { message }) => (
            StatusCode::OK,
            Json(json!({ "success": false, "message": message })),
        )
            .into_response(),
        Err(e @ StoreError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": e.to_string() })),
        )
            .into_response(),
        Err(e) => store_error(e),
    }
}

async fn leaderboard(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!(state.store.leaderboard())))
}
