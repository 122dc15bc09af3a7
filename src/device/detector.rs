// Artifact detector: matches discovered BLE peers against the catalog and
// tracks which artifacts have been found in the current scanning session.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use super::catalog::Artifact;

/// One discovered peer as reported by the radio. Every field is read
/// leniently: a malformed value becomes the field's default and never costs
/// the rest of the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_name")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_rssi")]
    pub rssi: Option<i32>,
    /// Advertised service identifiers. Missing lists and non-string entries
    /// are dropped on load.
    #[serde(
        default,
        alias = "serviceUUIDs",
        deserialize_with = "deserialize_service_uuids"
    )]
    pub service_uuids: Vec<String>,
}

impl Peer {
    pub fn advertising(id: impl Into<String>, service_uuids: &[&str]) -> Self {
        Self {
            id: id.into(),
            service_uuids: service_uuids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Parse one line of a radio feed. Unparsable lines become a peer with no
    /// advertisements, which matches nothing.
    pub fn from_line(line: &str) -> Self {
        serde_json::from_str(line).unwrap_or_else(|e| {
            tracing::debug!("Ignoring malformed peer record ({e}): {line}");
            Self::default()
        })
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn deserialize_name<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Signal strength in dBm. Fractional readings are rounded.
fn deserialize_rssi<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    Ok(Value::deserialize(deserializer)?
        .as_f64()
        .filter(|n| n.is_finite() && (i32::MIN as f64..=i32::MAX as f64).contains(n))
        .map(|n| n.round() as i32))
}

fn deserialize_service_uuids<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    /// Sent once per artifact per session.
    Detected(Artifact),
    /// Sent once each time the session goes from incomplete to complete.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub detected: usize,
    pub total: usize,
    pub percent: u32,
}

pub struct ArtifactDetector {
    catalog: Vec<Artifact>,
    catalog_ids: HashSet<String>,
    /// In detection order; never holds two entries with the same id.
    detected: Vec<Artifact>,
    completion_sent: bool,
    events: broadcast::Sender<DetectionEvent>,
}

impl ArtifactDetector {
    pub fn new(catalog: Vec<Artifact>) -> Self {
        let catalog_ids = catalog.iter().map(|a| a.id.clone()).collect();
        let (events, _) = broadcast::channel(64);
        Self {
            catalog,
            catalog_ids,
            detected: Vec::new(),
            completion_sent: false,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DetectionEvent> {
        self.events.subscribe()
    }

    pub fn catalog(&self) -> &[Artifact] {
        &self.catalog
    }

    pub fn detected(&self) -> &[Artifact] {
        &self.detected
    }

    fn is_detected(&self, id: &str) -> bool {
        self.detected.iter().any(|a| a.id == id)
    }

    /// Record every not-yet-detected catalog artifact the peer advertises.
    /// Returns the artifacts detected by this observation.
    pub fn observe(&mut self, peer: &Peer) -> Vec<Artifact> {
        let mut newly: Vec<Artifact> = Vec::new();
        for artifact in &self.catalog {
            if self.is_detected(&artifact.id) || newly.iter().any(|a| a.id == artifact.id) {
                continue;
            }
            if peer.service_uuids.iter().any(|uuid| artifact.matches(uuid)) {
                newly.push(artifact.clone());
            }
        }

        for artifact in &newly {
            tracing::info!(
                "Detected {} via peer {} ({}/{})",
                artifact.name,
                peer.id,
                self.detected.len() + 1,
                self.catalog_ids.len()
            );
            self.detected.push(artifact.clone());
            // No subscribers is fine.
            let _ = self.events.send(DetectionEvent::Detected(artifact.clone()));
        }

        if !newly.is_empty() && !self.completion_sent && self.is_complete() {
            self.completion_sent = true;
            tracing::info!("All {} artifacts detected", self.catalog_ids.len());
            let _ = self.events.send(DetectionEvent::Completed);
        }

        newly
    }

    /// True iff the detected ids are exactly the catalog ids.
    pub fn is_complete(&self) -> bool {
        let detected: HashSet<&str> = self.detected.iter().map(|a| a.id.as_str()).collect();
        detected.len() == self.catalog_ids.len()
            && self.catalog_ids.iter().all(|id| detected.contains(id.as_str()))
    }

    pub fn progress(&self) -> Progress {
        let total = self.catalog_ids.len();
        let detected = self.detected.len();
        let percent = if total == 0 {
            100
        } else {
            ((detected as f64 / total as f64) * 100.0).round() as u32
        };
        Progress {
            detected,
            total,
            percent,
        }
    }

    /// Forget everything detected; the next session starts from zero.
    pub fn reset(&mut self) {
        self.detected.clear();
        self.completion_sent = false;
    }
}
