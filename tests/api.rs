// Integration tests for the HTTP API: team creation, fragment reveal and
// completion, password verification and the leaderboard.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use runestone::api;
use runestone::store::TeamStore;

struct TestApp {
    _dir: TempDir,
    store: Arc<TeamStore>,
    router: Router,
}

async fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = TeamStore::open(dir.path().join("data.json"))
        .await
        .unwrap()
        .with_name_pool(["Harald"]);
    let store = Arc::new(store);
    let router = api::router(store.clone(), "http://museum.test/".into(), 2);
    TestApp {
        _dir: dir,
        store,
        router,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        router,
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn create_team(router: &Router, body: Value) -> Value {
    let (status, team) = post_json(router, "/api/admin/teams", body).await;
    assert_eq!(status, StatusCode::OK, "{team}");
    team
}

// ── Admin ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_team_response() {
    let app = test_app().await;
    let team = create_team(
        &app.router,
        json!({ "password": "Gorm the Old", "fragments": 3, "name": "  Jelling  " }),
    )
    .await;

    let id = team["teamId"].as_str().unwrap();
    assert_eq!(team["name"], "Jelling");
    assert_eq!(team["password"], "Gorm the Old");
    assert_eq!(team["fragments"]["0"]["pass_fragment"], "Gorm");
    assert_eq!(team["fragments"]["2"]["pass_fragment"], "Old");
    assert_eq!(team["fragments"]["1"]["solved"], false);
    assert_eq!(team["fragments"]["1"]["solvedAt"], "");
    assert!(team["fragments"]["1"].get("score").is_none());
    assert_eq!(
        team["fragmentUrls"],
        json!([
            format!("http://museum.test/api/teams/{id}/fragments/0"),
            format!("http://museum.test/api/teams/{id}/fragments/1"),
            format!("http://museum.test/api/teams/{id}/fragments/2"),
        ])
    );
}

#[tokio::test]
async fn test_create_team_defaults() {
    let app = test_app().await;
    let team = create_team(&app.router, json!({ "fragments": "many", "password": 12 })).await;

    assert_eq!(team["name"], "Harald");
    let password = team["password"].as_str().unwrap();
    assert_eq!(password.len(), 8);
    assert_eq!(team["fragments"].as_object().unwrap().len(), 2);

    let second = create_team(&app.router, json!({})).await;
    assert_eq!(second["name"], "Harald-2");

    // No body at all.
    let (status, third) = send(
        &app.router,
        Request::post("/api/admin/teams").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(third["name"], "Harald-3");

    // JSON null and non-object bodies also mean defaults.
    let fourth = create_team(&app.router, Value::Null).await;
    assert_eq!(fourth["name"], "Harald-4");
    let fifth = create_team(&app.router, json!(["Gorm"])).await;
    assert_eq!(fifth["fragments"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_team_fragment_count_forms() {
    let app = test_app().await;
    let whole_float = create_team(
        &app.router,
        json!({ "password": "Harald Gorm Thyra", "fragments": 3.0 }),
    )
    .await;
    assert_eq!(whole_float["fragments"].as_object().unwrap().len(), 3);

    for fragments in [json!(2.5), json!(0), json!(-1)] {
        let team = create_team(
            &app.router,
            json!({ "password": "Harald Gorm Thyra", "fragments": fragments }),
        )
        .await;
        assert_eq!(team["fragments"].as_object().unwrap().len(), 2, "{fragments}");
    }
}

#[tokio::test]
async fn test_create_team_rejects_short_password() {
    let app = test_app().await;
    let (status, body) = post_json(
        &app.router,
        "/api/admin/teams",
        json!({ "password": "AB", "fragments": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("too short"));
    assert!(app.store.snapshot().teams.is_empty());
}

// ── Team lookup ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_team_hides_password() {
    let app = test_app().await;
    let team = create_team(&app.router, json!({ "password": "Gorm the Old" })).await;
    let id = team["teamId"].as_str().unwrap();

    let (status, body) = get(&app.router, &format!("/api/teams/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["solved"], false);
    assert!(body["createdAt"].is_string());
    assert!(body.get("password").is_none());
    assert!(body.get("fragments").is_none());

    let (status, body) = get(&app.router, "/api/teams/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_latest_team_routes() {
    let app = test_app().await;
    let (status, _) = get(&app.router, "/api/getLatestTeam").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    create_team(&app.router, json!({ "name": "First" })).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = create_team(&app.router, json!({ "name": "Second" })).await;

    for uri in ["/api/getLatestTeam", "/api/teams/latest"] {
        let (status, body) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], second["teamId"]);
        assert_eq!(body["name"], "Second");
    }
}

#[tokio::test]
async fn test_resolve_team_by_name() {
    let app = test_app().await;
    let team = create_team(&app.router, json!({ "name": "Gorm" })).await;

    let (status, body) = get(&app.router, "/api/teams/resolve?name=%20gORM%20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": team["teamId"], "name": "Gorm" }));

    let (status, _) = get(&app.router, "/api/teams/resolve?name=Sweyn").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app.router, "/api/teams/resolve?name=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(&app.router, "/api/teams/resolve").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Fragments ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fragment_routes() {
    let app = test_app().await;
    let team = create_team(&app.router, json!({ "password": "Gorm the Old", "fragments": 3 })).await;
    let id = team["teamId"].as_str().unwrap();

    let (status, body) = get(&app.router, &format!("/api/teams/{id}/fragments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fragments"].as_object().unwrap().len(), 3);

    let (status, body) = get(&app.router, &format!("/api/teams/{id}/fragments/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"], "1");
    assert_eq!(body["fragment"]["pass_fragment"], "the");

    let (status, body) = get(&app.router, &format!("/api/teams/{id}/fragments/7")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid fragment index");

    let (status, _) = get(&app.router, "/api/teams/unknown/fragments/0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app.router, "/api/teams/unknown/fragments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_runestone() {
    let app = test_app().await;
    let team = create_team(&app.router, json!({ "password": "Gorm the Old", "fragments": 2 })).await;
    let id = team["teamId"].as_str().unwrap();

    // A device-supplied timestamp is ignored.
    let (status, body) = post_json(
        &app.router,
        &format!("/api/teams/{id}/runestone/0"),
        json!({ "completedAt": "2000-01-01T00:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["fragment"]["solved"], true);
    assert_eq!(body["fragment"]["score"], 100);
    assert_eq!(body["team"], json!({ "id": id, "solved": false }));

    let (status, again) = post_json(&app.router, &format!("/api/teams/{id}/runestone/0"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["success"], false);
    assert_eq!(again["message"], "Fragment already solved");
    assert_eq!(again["fragment"]["solvedAt"], body["fragment"]["solvedAt"]);

    let (status, last) = post_json(&app.router, &format!("/api/teams/{id}/runestone/1"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(last["team"]["solved"], true);
}

#[tokio::test]
async fn test_complete_runestone_not_found() {
    let app = test_app().await;
    let team = create_team(&app.router, json!({})).await;
    let id = team["teamId"].as_str().unwrap();

    for uri in [
        format!("/api/teams/{id}/runestone/5"),
        format!("/api/teams/{id}/runestone/abc"),
        "/api/teams/unknown/runestone/0".to_string(),
    ] {
        let (status, body) = post_json(&app.router, &uri, json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], false);
        assert!(body.get("fragment").is_none());
    }
}

// ── Verification and leaderboard ──────────────────────────────────────

#[tokio::test]
async fn test_verify_password() {
    let app = test_app().await;
    let team = create_team(&app.router, json!({ "password": "Gorm the Old" })).await;
    let id = team["teamId"].as_str().unwrap();

    let (status, body) = post_json(
        &app.router,
        "/api/verify",
        json!({ "teamId": id, "password": "gorm the old" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": false, "message": "Incorrect password" }));

    let (status, body) = post_json(
        &app.router,
        "/api/verify",
        json!({ "teamId": id, "password": "Gorm the Old" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(app.store.get(id).unwrap().solved);
}

#[tokio::test]
async fn test_verify_requires_fields() {
    let app = test_app().await;
    for body in [json!({}), json!({ "teamId": "x" }), json!({ "password": "x" }), json!({ "teamId": "x", "password": 5 })] {
        let (status, response) = post_json(&app.router, "/api/verify", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);
    }

    let (status, response) = post_json(
        &app.router,
        "/api/verify",
        json!({ "teamId": "missing", "password": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["message"], "Team not found");
}

#[tokio::test]
async fn test_leaderboard() {
    let app = test_app().await;
    let unsolved = create_team(&app.router, json!({ "name": "Busy", "password": "Gorm the", "fragments": 2 })).await;
    let solved = create_team(&app.router, json!({ "name": "Done", "password": "Gorm the", "fragments": 2 })).await;

    let busy_id = unsolved["teamId"].as_str().unwrap();
    let done_id = solved["teamId"].as_str().unwrap();
    post_json(&app.router, &format!("/api/teams/{busy_id}/runestone/0"), json!({})).await;
    post_json(
        &app.router,
        "/api/verify",
        json!({ "teamId": done_id, "password": "Gorm the" }),
    )
    .await;

    let (status, body) = get(&app.router, "/api/leaderboard").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "Done");
    assert_eq!(rows[0]["score"], 0);
    assert_eq!(rows[0]["solved"], true);
    assert_eq!(rows[1]["name"], "Busy");
    assert_eq!(rows[1]["score"], 100);
    assert!(rows[1]["createdAt"].is_string());
}

// ── Health and metrics ────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_metrics() {
    runestone::metrics::register_metrics();
    let app = test_app().await;

    let (status, body) = get(&app.router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "ok" }));

    create_team(&app.router, json!({})).await;
    let (status, body) = get(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("runestone_teams_created_total"));
    assert!(text.contains("runestone_api_requests_total"));
}
