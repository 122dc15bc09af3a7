// Headless runestone device: finds the artifacts, sits the quiz and prints
// the revealed password fragment.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use runestone::config::{DeviceConfig, ScanMode};
use runestone::device::{
    run_hunt, select_scan_source, ArtifactDetector, DetectionEvent, HuntSettings,
    RadioScanSource, ScanSession, SimulatedScanSource, TeamClient, ARTIFACTS, QUIZ,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = DeviceConfig::load();

    let simulated = SimulatedScanSource::new(ARTIFACTS.clone(), Duration::from_millis(800));
    let selected = select_scan_source(config.scan_mode, RadioScanSource::open_stdin, simulated);
    if let Some(notice) = &selected.notice {
        tracing::warn!("{notice}");
    }
    let mut session = ScanSession::new(selected.source);

    let mut detector = ArtifactDetector::new(ARTIFACTS.clone());
    let mut events = detector.subscribe();
    let total = ARTIFACTS.len();
    tokio::spawn(async move {
        let mut found = 0;
        while let Ok(event) = events.recv().await {
            match event {
                DetectionEvent::Detected(artifact) => {
                    found += 1;
                    println!("Found {} ({found}/{total})", artifact.name);
                }
                DetectionEvent::Completed => println!("All artifacts found"),
            }
        }
    });

    // Without explicit answers a simulated run answers correctly.
    let answers: Vec<String> = if !config.answers.is_empty() {
        config.answers.clone()
    } else if config.scan_mode == ScanMode::Simulated || selected.notice.is_some() {
        QUIZ.iter().map(|q| q.correct_answer_id.to_string()).collect()
    } else {
        Vec::new()
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let client = TeamClient::new(config.api_base.clone());
    let settings = HuntSettings {
        runestone_index: config.runestone_index,
        poll_interval: config.poll_interval,
        questions: QUIZ,
        answers: &answers,
    };

    tracing::info!(
        "Runestone device {} polling {}",
        config.runestone_index,
        config.api_base
    );
    match run_hunt(&client, &mut session, &mut detector, &settings, &cancel).await {
        Ok(outcome) => {
            println!(
                "Team {}: fragment {} is \"{}\"{}",
                outcome.team.name,
                outcome.index,
                outcome.fragment.pass_fragment,
                match outcome.fragment.score {
                    Some(score) => format!(" ({score} points)"),
                    None => String::new(),
                }
            );
        }
        Err(e) => {
            tracing::error!("Hunt failed: {e}");
            std::process::exit(1);
        }
    }
}
