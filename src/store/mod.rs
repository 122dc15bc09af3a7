// Team fragment store: teams, their password fragments and scores, persisted
// as a single JSON document.
//
// Mutations run one at a time through a FIFO-fair async lock. Each one works
// on a copy of the committed state, persists the whole document, and only
// then publishes the copy. Reads clone the committed snapshot and never wait
// on writers.

pub mod error;
pub mod model;
pub mod persist;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, SecondsFormat, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::metrics;
use crate::password::{normalized_len, split_password};
use crate::scoring::{self, LeaderboardEntry};

pub use error::StoreError;
pub use model::{parse_fragment_index, Fragment, Fragments, StoreData, Team, TeamSummary};

/// Names handed out to teams created without one.
pub const DEFAULT_NAME_POOL: &[&str] = &["Harald", "Gorm"];

/// Result of resolving a friendly team name.
#[derive(Debug, Clone, PartialEq)]
pub enum NameResolution {
    NotFound,
    Unique(TeamRef),
    /// Several teams share the name; the caller picks.
    Ambiguous(Vec<TeamRef>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
}

/// A freshly solved fragment and the team state after the update.
#[derive(Debug, Clone)]
pub struct Completion {
    pub team: Team,
    pub index: usize,
    pub fragment: Fragment,
}

/// Outcome of a password guess. A wrong guess is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Accepted,
    Rejected { message: String },
}

pub struct TeamStore {
    path: PathBuf,
    committed: RwLock<Arc<StoreData>>,
    write_lock: Mutex<()>,
    name_pool: Vec<String>,
}

impl TeamStore {
    /// Open the store at `path`, creating an empty document if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = persist::load(&path).await?;
        metrics::TEAMS.set(data.teams.len() as i64);
        tracing::info!("Loaded {} teams from {}", data.teams.len(), path.display());
        Ok(Self {
            path,
            committed: RwLock::new(Arc::new(data)),
            write_lock: Mutex::new(()),
            name_pool: DEFAULT_NAME_POOL.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the pool that default team names are drawn from.
    pub fn with_name_pool<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_pool = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last fully persisted state.
    pub fn snapshot(&self) -> Arc<StoreData> {
        self.committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one read-modify-persist transaction. Transactions are serialized
    /// in arrival order; an error from `apply` discards the draft.
    async fn transact<T, F>(&self, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut StoreData) -> Result<T, StoreError>,
    {
        let _guard = self.write_lock.lock().await;

        let mut draft = (*self.snapshot()).clone();
        let out = apply(&mut draft)?;

        let timer = metrics::STORE_WRITE_DURATION_SECONDS.start_timer();
        if let Err(e) = persist::save(&self.path, &draft).await {
            tracing::error!("Failed to persist store to {}: {e}", self.path.display());
            return Err(e);
        }
        timer.observe_duration();

        metrics::TEAMS.set(draft.teams.len() as i64);
        *self
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(draft);
        Ok(out)
    }

    // ── Mutations ─────────────────────────────────────────────────────

    /// Create a team whose password is split into `fragment_count` fragments.
    pub async fn create(
        &self,
        password: &str,
        fragment_count: usize,
        desired_name: Option<&str>,
    ) -> Result<Team, StoreError> {
        validate_new_team(password, fragment_count)?;

        let pieces = split_password(password, fragment_count);
        let base_name = desired_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.draw_name());

        let team = self
            .transact(|data| {
                let name = unique_name(&base_name, data.teams.iter().map(|t| t.name.as_str()));
                let team = Team {
                    id: Uuid::new_v4().to_string(),
                    name,
                    password: password.to_string(),
                    fragments: pieces.into_iter().map(Fragment::new).enumerate().collect(),
                    created_at: timestamp(Utc::now()),
                    solved: false,
                };
                data.teams.push(team.clone());
                Ok(team)
            })
            .await?;

        metrics::TEAMS_CREATED_TOTAL.inc();
        tracing::info!(
            "Created team {} ({}) with {} fragments",
            team.name,
            team.id,
            team.fragments.len()
        );
        Ok(team)
    }

    /// Mark a fragment solved now and score it.
    pub async fn complete_fragment(
        &self,
        team_id: &str,
        index: usize,
    ) -> Result<Completion, StoreError> {
        self.complete_fragment_at(team_id, index, Utc::now()).await
    }

    /// Mark a fragment solved at `solved_at` and score it against the team's
    /// creation time. A fragment is only ever scored once.
    pub async fn complete_fragment_at(
        &self,
        team_id: &str,
        index: usize,
        solved_at: DateTime<Utc>,
    ) -> Result<Completion, StoreError> {
        let result = self
            .transact(|data| {
                let team = data.team_mut(team_id).ok_or(StoreError::NotFound("Team"))?;
                let team_solved = team.solved;
                let created_at = team.created_at.clone();
                let fragment = team
                    .fragments
                    .get_mut(&index)
                    .ok_or(StoreError::NotFound("Fragment"))?;

                if fragment.solved {
                    return Err(StoreError::AlreadyCompleted {
                        team_id: team_id.to_string(),
                        team_solved,
                        index,
                        fragment: fragment.clone(),
                    });
                }

                fragment.solved = true;
                fragment.solved_at = timestamp(solved_at);
                let minutes = scoring::minutes_between(&created_at, &fragment.solved_at);
                fragment.score = Some(scoring::fragment_score(minutes));
                let fragment = fragment.clone();

                if team.all_fragments_solved() {
                    team.solved = true;
                }

                Ok(Completion {
                    team: team.clone(),
                    index,
                    fragment,
                })
            })
            .await;

        match &result {
            Ok(done) => {
                metrics::FRAGMENTS_COMPLETED_TOTAL.inc();
                tracing::info!(
                    "Team {} solved fragment {} for {} points",
                    done.team.id,
                    index,
                    done.fragment.score.unwrap_or(0)
                );
            }
            Err(StoreError::AlreadyCompleted { .. }) => {
                tracing::debug!("Team {team_id} resubmitted solved fragment {index}");
            }
            Err(_) => {}
        }
        result
    }

    /// Compare a guess against the team password, byte for byte. A correct
    /// guess marks the team solved.
    pub async fn verify_password(
        &self,
        team_id: &str,
        supplied: &str,
    ) -> Result<Verification, StoreError> {
        let verdict = self
            .transact(|data| {
                let team = data.team_mut(team_id).ok_or(StoreError::NotFound("Team"))?;
                if team.password == supplied {
                    team.solved = true;
                    Ok(Verification::Accepted)
                } else {
                    Ok(Verification::Rejected {
                        message: "Incorrect password".to_string(),
                    })
                }
            })
            .await?;

        let label = match verdict {
            Verification::Accepted => {
                tracing::info!("Team {team_id} verified the full password");
                "accepted"
            }
            Verification::Rejected { .. } => {
                tracing::debug!("Team {team_id} submitted a wrong password");
                "rejected"
            }
        };
        metrics::VERIFY_ATTEMPTS_TOTAL
            .with_label_values(&[label])
            .inc();
        Ok(verdict)
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn get(&self, team_id: &str) -> Option<Team> {
        self.snapshot().team(team_id).cloned()
    }

    /// The team with the most recent valid creation time. Invalid timestamps
    /// never win over valid ones; ties keep the first team in storage order.
    pub fn latest(&self) -> Option<Team> {
        let data = self.snapshot();
        let mut latest: Option<(&Team, Option<DateTime<Utc>>)> = None;

        for team in &data.teams {
            let created = scoring::parse_timestamp(&team.created_at);
            latest = match latest {
                None => Some((team, created)),
                Some((_, None)) if created.is_some() => Some((team, created)),
                Some((_, Some(current))) if created.is_some_and(|c| c > current) => {
                    Some((team, created))
                }
                keep => keep,
            };
        }

        latest.map(|(team, _)| team.clone())
    }

    /// Case-insensitive exact match on team names.
    pub fn resolve_by_name(&self, name: &str) -> NameResolution {
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return NameResolution::NotFound;
        }

        let mut matches: Vec<TeamRef> = self
            .snapshot()
            .teams
            .iter()
            .filter(|t| t.name.to_lowercase() == query)
            .map(|t| TeamRef {
                id: t.id.clone(),
                name: t.name.clone(),
            })
            .collect();

        match matches.len() {
            0 => NameResolution::NotFound,
            1 => NameResolution::Unique(matches.remove(0)),
            _ => NameResolution::Ambiguous(matches),
        }
    }

    pub fn fragments(&self, team_id: &str) -> Option<Fragments> {
        self.snapshot().team(team_id).map(|t| t.fragments.clone())
    }

    /// One fragment by its URL index. Unknown indexes are invalid input
    /// rather than not-found: the team exists, the request is wrong.
    pub fn fragment(&self, team_id: &str, raw_index: &str) -> Result<(usize, Fragment), StoreError> {
        let data = self.snapshot();
        let team = data.team(team_id).ok_or(StoreError::NotFound("Team"))?;
        parse_fragment_index(raw_index)
            .and_then(|index| team.fragments.get(&index).map(|f| (index, f.clone())))
            .ok_or_else(|| StoreError::InvalidInput("invalid fragment index".to_string()))
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .snapshot()
            .teams
            .iter()
            .map(|t| LeaderboardEntry {
                id: t.id.clone(),
                name: t.name.clone(),
                created_at: t.created_at.clone(),
                solved: t.solved,
                score: t.total_score(),
            })
            .collect();
        scoring::rank(&mut entries);
        entries
    }

    fn draw_name(&self) -> String {
        self.name_pool
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "Team".to_string())
    }
}

/// Reject team parameters that cannot produce a usable split. A password
/// shorter than the fragment count would leave some devices with nothing.
pub fn validate_new_team(password: &str, fragment_count: usize) -> Result<(), StoreError> {
    if password.is_empty() {
        return Err(StoreError::InvalidInput("password is required".to_string()));
    }
    if fragment_count == 0 {
        return Err(StoreError::InvalidInput(
            "fragments must be at least 1".to_string(),
        ));
    }
    if fragment_count > 1 && normalized_len(password) < fragment_count {
        return Err(StoreError::InvalidInput(format!(
            "password is too short to split into {fragment_count} fragments"
        )));
    }
    Ok(())
}

/// `base`, or `base-2`, `base-3`, ... whichever is first unused. Comparison
/// is case-insensitive.
pub fn unique_name<'a>(base: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let taken: std::collections::HashSet<String> = existing.map(str::to_lowercase).collect();
    if !taken.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    (2..)
        .map(|i| format!("{base}-{i}"))
        .find(|candidate| !taken.contains(&candidate.to_lowercase()))
        .unwrap_or_else(|| base.to_string())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
