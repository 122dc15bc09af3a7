// One device run: wait for a team, find every artifact, sit the quiz, then
// reveal and report this device's fragment.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::client::{ClientError, CompletionOutcome, TeamClient};
use super::detector::ArtifactDetector;
use super::quiz::{Question, QuizError, QuizRun};
use super::scanner::ScanSession;
use crate::store::{Fragment, TeamSummary};

#[derive(Error, Debug)]
pub enum HuntError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error("scan source stopped before all artifacts were found")]
    ScanEnded,
    #[error("hunt cancelled")]
    Cancelled,
}

pub struct HuntSettings<'a> {
    /// Fragment this device reveals.
    pub runestone_index: usize,
    pub poll_interval: Duration,
    pub questions: &'a [Question],
    /// Answer ids in question order. A missing or unknown answer falls back
    /// to the question's first option.
    pub answers: &'a [String],
}

#[derive(Debug, Clone)]
pub struct HuntOutcome {
    pub team: TeamSummary,
    pub index: usize,
    pub fragment: Fragment,
    /// False when the fragment had already been solved by another run.
    pub newly_solved: bool,
    pub quiz_correct: usize,
    pub quiz_total: usize,
}

pub async fn run_hunt(
    client: &TeamClient,
    session: &mut ScanSession,
    detector: &mut ArtifactDetector,
    settings: &HuntSettings<'_>,
    cancel: &CancellationToken,
) -> Result<HuntOutcome, HuntError> {
    let team = client
        .poll_active_team(settings.poll_interval, cancel)
        .await
        .ok_or(HuntError::Cancelled)?;

    find_artifacts(session, detector, cancel).await?;

    let (quiz_correct, quiz_total) = sit_quiz(settings.questions, settings.answers)?;
    tracing::info!("Quiz finished: {quiz_correct}/{quiz_total} correct");

    let index = settings.runestone_index;
    let mut fragment = client.fetch_fragment(&team.id, index).await?;
    let mut newly_solved = false;

    if !fragment.solved {
        match client.complete_fragment(&team.id, index).await? {
            CompletionOutcome::Completed {
                fragment: solved,
                team_solved,
            } => {
                tracing::info!(
                    "Fragment {index} solved for {} points{}",
                    solved.score.unwrap_or(0),
                    if team_solved { ", team finished" } else { "" }
                );
                fragment = solved;
                newly_solved = true;
            }
            CompletionOutcome::AlreadySolved(stored) => {
                tracing::info!("Fragment {index} was already solved");
                fragment = stored;
            }
        }
    }

    Ok(HuntOutcome {
        team,
        index,
        fragment,
        newly_solved,
        quiz_correct,
        quiz_total,
    })
}

/// Scan until the detector reports every artifact found.
async fn find_artifacts(
    session: &mut ScanSession,
    detector: &mut ArtifactDetector,
    cancel: &CancellationToken,
) -> Result<(), HuntError> {
    detector.reset();
    if detector.is_complete() {
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(64);
    session.start(tx).await;

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Err(HuntError::Cancelled),
            peer = rx.recv() => match peer {
                Some(peer) => {
                    detector.observe(&peer);
                    if detector.is_complete() {
                        break Ok(());
                    }
                }
                None => break Err(HuntError::ScanEnded),
            },
        }
    };

    drop(rx);
    session.stop().await;
    result
}

fn sit_quiz(questions: &[Question], answers: &[String]) -> Result<(usize, usize), QuizError> {
    let mut run = QuizRun::new(questions);
    let mut given = answers.iter();
    while let Some(question) = run.current() {
        let choice = given
            .next()
            .map(String::as_str)
            .filter(|a| question.has_answer(a))
            .or_else(|| question.answers.first().map(|a| a.id))
            .unwrap_or_default();
        run.answer(choice)?;
    }
    Ok((run.correct(), run.total()))
}
