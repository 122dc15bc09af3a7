// Persisted team/fragment records and the on-disk document shape.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Error as _, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One piece of a team's password, revealed by one runestone device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(rename = "pass_fragment", alias = "passFragment")]
    pub pass_fragment: String,
    #[serde(default)]
    pub solved: bool,
    /// RFC 3339 time of completion, empty until solved.
    #[serde(rename = "solvedAt", default)]
    pub solved_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

impl Fragment {
    pub fn new(pass_fragment: impl Into<String>) -> Self {
        Self {
            pass_fragment: pass_fragment.into(),
            solved: false,
            solved_at: String::new(),
            score: None,
        }
    }
}

/// Fragments keyed by their 0-based position. Serialized as `{"0": ..., "1": ...}`.
pub type Fragments = BTreeMap<usize, Fragment>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_fragments")]
    pub fragments: Fragments,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub solved: bool,
}

impl Team {
    pub fn summary(&self) -> TeamSummary {
        TeamSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at.clone(),
            solved: self.solved,
        }
    }

    pub fn all_fragments_solved(&self) -> bool {
        self.fragments.values().all(|f| f.solved)
    }

    pub fn total_score(&self) -> u32 {
        self.fragments.values().filter_map(|f| f.score).sum()
    }
}

/// Public view of a team: no password, no fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub solved: bool,
}

/// The whole store document: `{ "teams": { "<id>": Team, ... } }`.
///
/// Teams are held in document order (creation order), which is what
/// "first encountered" means for latest-team tie breaking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(
        default,
        serialize_with = "serialize_teams",
        deserialize_with = "deserialize_teams"
    )]
    pub teams: Vec<Team>,
}

impl StoreData {
    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn team_mut(&mut self, id: &str) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.id == id)
    }
}

/// Parse a fragment index from a URL segment. Only canonical decimal forms
/// are accepted, so `"01"` or `"+1"` never alias fragment 1.
pub fn parse_fragment_index(raw: &str) -> Option<usize> {
    let index: usize = raw.parse().ok()?;
    (index.to_string() == raw).then_some(index)
}

// ── Serde helpers ─────────────────────────────────────────────────────

fn serialize_teams<S: Serializer>(teams: &[Team], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(teams.iter().map(|t| (&t.id, t)))
}

fn deserialize_teams<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Team>, D::Error> {
    struct TeamsVisitor;

    impl<'de> Visitor<'de> for TeamsVisitor {
        type Value = Vec<Team>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of team id to team")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Vec<Team>, A::Error> {
            let mut teams = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, mut team)) = map.next_entry::<String, Team>()? {
                if team.id.is_empty() {
                    team.id = key;
                }
                teams.push(team);
            }
            Ok(teams)
        }
    }

    deserializer.deserialize_map(TeamsVisitor)
}

/// Earlier documents stored fragments as a plain list, either of strings or
/// of fragment records. Both load into the keyed shape.
#[derive(Deserialize)]
#[serde(untagged)]
enum FragmentsRepr {
    Keyed(BTreeMap<String, Fragment>),
    Records(Vec<Fragment>),
    Plain(Vec<String>),
}

fn deserialize_fragments<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fragments, D::Error> {
    Ok(match FragmentsRepr::deserialize(deserializer)? {
        FragmentsRepr::Keyed(map) => map
            .into_iter()
            .map(|(key, fragment)| {
                parse_fragment_index(&key)
                    .map(|index| (index, fragment))
                    .ok_or_else(|| D::Error::custom(format!("invalid fragment index {key:?}")))
            })
            .collect::<Result<_, _>>()?,
        FragmentsRepr::Records(list) => list.into_iter().enumerate().collect(),
        FragmentsRepr::Plain(list) => list
            .into_iter()
            .map(Fragment::new)
            .enumerate()
            .collect(),
    })
}
