// Artifact catalog: the physical beacons a device has to find.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub name: String,
    pub description: String,
    /// BLE service UUID the artifact's beacon advertises.
    pub service_identifier: String,
}

impl Artifact {
    pub fn new(id: &str, name: &str, description: &str, service_identifier: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            service_identifier: service_identifier.to_string(),
        }
    }

    /// Case-insensitive match against an advertised service identifier.
    pub fn matches(&self, advertised: &str) -> bool {
        self.service_identifier.eq_ignore_ascii_case(advertised.trim())
    }
}

lazy_static! {
    /// The exhibit's artifacts. Each beacon advertises its own service UUID.
    pub static ref ARTIFACTS: Vec<Artifact> = vec![
        Artifact::new(
            "artifact-1",
            "Artifact Sword",
            "A blade like this was never meant for common hands. Its edge carried honor, \
             its hilt the weight of generations who fought for glory and name",
            "4fafc201-1fb5-459e-8fcc-c5c9c331914b",
        ),
        Artifact::new(
            "artifact-2",
            "Artifact Axe",
            "The roar still hums with whispers of old battles. Symbols etched into its steel \
             once carried the faith and fury of a Viking's soul",
            "4fafc202-1fb5-459e-8fcc-c5c9c331914b",
        ),
        Artifact::new(
            "artifact-3",
            "Artifact Cross",
            "A symbol of faith born in a time of doubt. It carried the promise of new \
             beginnings, when old gods faded and new light touched the North",
            "4fafc203-1fb5-459e-8fcc-c5c9c331914b",
        ),
    ];
}
