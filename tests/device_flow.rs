// End-to-end device runs against a live backend on a local port.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use runestone::api;
use runestone::device::{
    run_hunt, ArtifactDetector, ClientError, CompletionOutcome, HuntError, HuntSettings,
    ScanSession, SimulatedScanSource, TeamClient, ARTIFACTS, QUIZ,
};
use runestone::store::TeamStore;

async fn start_backend() -> (TempDir, Arc<TeamStore>, String) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TeamStore::open(dir.path().join("data.json")).await.unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = api::router(store.clone(), base.clone(), 2);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (dir, store, base)
}

fn simulated_session() -> ScanSession {
    ScanSession::new(Box::new(SimulatedScanSource::new(
        ARTIFACTS.clone(),
        Duration::from_millis(5),
    )))
}

#[tokio::test]
async fn test_hunt_reveals_and_completes_fragment() {
    let (_dir, store, base) = start_backend().await;
    let team = store
        .create("Gorm the Old", 3, Some("Jelling"))
        .await
        .unwrap();

    let client = TeamClient::new(base);
    let mut session = simulated_session();
    let mut detector = ArtifactDetector::new(ARTIFACTS.clone());
    let answers: Vec<String> = QUIZ.iter().map(|q| q.correct_answer_id.to_string()).collect();
    let settings = HuntSettings {
        runestone_index: 1,
        poll_interval: Duration::from_millis(20),
        questions: QUIZ,
        answers: &answers,
    };

    let outcome = run_hunt(
        &client,
        &mut session,
        &mut detector,
        &settings,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.team.id, team.id);
    assert_eq!(outcome.index, 1);
    assert_eq!(outcome.fragment.pass_fragment, "the");
    assert!(outcome.newly_solved);
    assert_eq!(outcome.fragment.score, Some(100));
    assert_eq!(outcome.quiz_correct, 3);
    assert!(detector.is_complete());
    assert!(store.get(&team.id).unwrap().fragments[&1].solved);

    // A second device run on the same fragment finds it already solved.
    let mut session = simulated_session();
    let again = run_hunt(
        &client,
        &mut session,
        &mut detector,
        &settings,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(!again.newly_solved);
    assert_eq!(again.fragment.solved_at, outcome.fragment.solved_at);
}

#[tokio::test]
async fn test_hunt_waits_for_first_team() {
    let (_dir, store, base) = start_backend().await;

    let creator = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        creator.create("Harald Bluetooth", 2, Some("Late")).await.unwrap();
    });

    let client = TeamClient::new(base);
    let mut session = simulated_session();
    let mut detector = ArtifactDetector::new(ARTIFACTS.clone());
    let settings = HuntSettings {
        runestone_index: 0,
        poll_interval: Duration::from_millis(20),
        questions: QUIZ,
        answers: &[],
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        run_hunt(&client, &mut session, &mut detector, &settings, &CancellationToken::new()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(outcome.team.name, "Late");
    assert_eq!(outcome.fragment.pass_fragment, "Harald");
}

#[tokio::test]
async fn test_hunt_unknown_fragment_surfaces_server_message() {
    let (_dir, store, base) = start_backend().await;
    store.create("Gorm the Old", 2, None).await.unwrap();

    let client = TeamClient::new(base);
    let mut session = simulated_session();
    let mut detector = ArtifactDetector::new(ARTIFACTS.clone());
    let settings = HuntSettings {
        runestone_index: 9,
        poll_interval: Duration::from_millis(20),
        questions: QUIZ,
        answers: &[],
    };

    let result = run_hunt(
        &client,
        &mut session,
        &mut detector,
        &settings,
        &CancellationToken::new(),
    )
    .await;
    match result {
        Err(HuntError::Client(ClientError::Api { status, message })) => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid fragment index");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_completion_outcomes() {
    let (_dir, store, base) = start_backend().await;
    let team = store.create("Gorm the Old", 2, None).await.unwrap();
    let client = TeamClient::new(base);

    let latest = client.latest_team().await.unwrap().unwrap();
    assert_eq!(latest.id, team.id);

    match client.complete_fragment(&team.id, 0).await.unwrap() {
        CompletionOutcome::Completed {
            fragment,
            team_solved,
        } => {
            assert!(fragment.solved);
            assert!(!team_solved);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(matches!(
        client.complete_fragment(&team.id, 0).await.unwrap(),
        CompletionOutcome::AlreadySolved(_)
    ));
    match client.complete_fragment("nope", 0).await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Team not found");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_no_team_yet() {
    let (_dir, _store, base) = start_backend().await;
    let client = TeamClient::new(base);
    assert!(client.latest_team().await.unwrap().is_none());
}
