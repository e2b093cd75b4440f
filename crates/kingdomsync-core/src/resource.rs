//! Server-backed resources mirrored by the client
//!
//! Every piece of game state the client displays comes from one of a fixed
//! set of REST endpoints. `ResourceKey` names them; the mapping to endpoint
//! paths and to the pre-load placeholder value lives here so nothing else
//! has to spell an endpoint string.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Identifier of a server-backed resource
///
/// Ordering follows declaration order, which is also the order used for
/// `Selection::All` and for dependency-triggered refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKey {
    /// Core kingdom stats, including `next_resolve`
    Kingdom,
    /// Kingdom identity and whether it has been created yet
    KingdomId,
    Settle,
    Structures,
    Mobis,
    Generals,
    Missiles,
    Engineers,
    Projects,
    Revealed,
    Shared,
    Pinned,
    SpyHistory,
    AttackHistory,
    News,
    GalaxyNews,
    UniverseNews,
    Empires,
    Kingdoms,
    GalaxyInfo,
    GalaxyPolitics,
    EmpirePolitics,
    Schedule,
    AutoSpending,
    Messages,
}

impl ResourceKey {
    /// Every known resource, in declaration order
    pub const ALL: [ResourceKey; 25] = [
        ResourceKey::Kingdom,
        ResourceKey::KingdomId,
        ResourceKey::Settle,
        ResourceKey::Structures,
        ResourceKey::Mobis,
        ResourceKey::Generals,
        ResourceKey::Missiles,
        ResourceKey::Engineers,
        ResourceKey::Projects,
        ResourceKey::Revealed,
        ResourceKey::Shared,
        ResourceKey::Pinned,
        ResourceKey::SpyHistory,
        ResourceKey::AttackHistory,
        ResourceKey::News,
        ResourceKey::GalaxyNews,
        ResourceKey::UniverseNews,
        ResourceKey::Empires,
        ResourceKey::Kingdoms,
        ResourceKey::GalaxyInfo,
        ResourceKey::GalaxyPolitics,
        ResourceKey::EmpirePolitics,
        ResourceKey::Schedule,
        ResourceKey::AutoSpending,
        ResourceKey::Messages,
    ];

    /// Wire name of the resource (`"galaxypolitics"`)
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKey::Kingdom => "kingdom",
            ResourceKey::KingdomId => "kingdomid",
            ResourceKey::Settle => "settle",
            ResourceKey::Structures => "structures",
            ResourceKey::Mobis => "mobis",
            ResourceKey::Generals => "generals",
            ResourceKey::Missiles => "missiles",
            ResourceKey::Engineers => "engineers",
            ResourceKey::Projects => "projects",
            ResourceKey::Revealed => "revealed",
            ResourceKey::Shared => "shared",
            ResourceKey::Pinned => "pinned",
            ResourceKey::SpyHistory => "spyhistory",
            ResourceKey::AttackHistory => "attackhistory",
            ResourceKey::News => "news",
            ResourceKey::GalaxyNews => "galaxynews",
            ResourceKey::UniverseNews => "universenews",
            ResourceKey::Empires => "empires",
            ResourceKey::Kingdoms => "kingdoms",
            ResourceKey::GalaxyInfo => "galaxyinfo",
            ResourceKey::GalaxyPolitics => "galaxypolitics",
            ResourceKey::EmpirePolitics => "empirepolitics",
            ResourceKey::Schedule => "schedule",
            ResourceKey::AutoSpending => "autospending",
            ResourceKey::Messages => "messages",
        }
    }

    /// Endpoint path relative to the API base (`"api/kingdom"`)
    pub fn endpoint(self) -> String {
        format!("api/{}", self.as_str())
    }

    /// Whether the server returns a JSON array for this resource
    pub const fn is_list(self) -> bool {
        matches!(
            self,
            ResourceKey::Generals
                | ResourceKey::Engineers
                | ResourceKey::SpyHistory
                | ResourceKey::AttackHistory
                | ResourceKey::News
                | ResourceKey::GalaxyNews
                | ResourceKey::UniverseNews
                | ResourceKey::Schedule
                | ResourceKey::Messages
        )
    }

    /// Value stored before the first successful fetch
    pub fn placeholder(self) -> Value {
        if self.is_list() {
            Value::Array(Vec::new())
        } else {
            Value::Object(serde_json::Map::new())
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        ResourceKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == name)
            .ok_or_else(|| SyncError::UnknownResource(s.to_string()))
    }
}

/// Which resources a refresh targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every known resource
    All,
    /// An explicit list; order is fetch order
    Keys(Vec<ResourceKey>),
}

impl Selection {
    /// Resolve into the ordered list of keys to fetch.
    ///
    /// Duplicates collapse to their first occurrence so each key is fetched
    /// exactly once per call.
    pub fn resolve(&self) -> Vec<ResourceKey> {
        match self {
            Selection::All => ResourceKey::ALL.to_vec(),
            Selection::Keys(keys) => {
                let mut seen = BTreeSet::new();
                keys.iter().copied().filter(|k| seen.insert(*k)).collect()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Keys(keys) if keys.is_empty())
    }
}

impl From<ResourceKey> for Selection {
    fn from(key: ResourceKey) -> Self {
        Selection::Keys(vec![key])
    }
}

impl From<Vec<ResourceKey>> for Selection {
    fn from(keys: Vec<ResourceKey>) -> Self {
        Selection::Keys(keys)
    }
}

impl From<&[ResourceKey]> for Selection {
    fn from(keys: &[ResourceKey]) -> Self {
        Selection::Keys(keys.to_vec())
    }
}

impl<const N: usize> From<[ResourceKey; N]> for Selection {
    fn from(keys: [ResourceKey; N]) -> Self {
        Selection::Keys(keys.to_vec())
    }
}

impl From<BTreeSet<ResourceKey>> for Selection {
    fn from(keys: BTreeSet<ResourceKey>) -> Self {
        Selection::Keys(keys.into_iter().collect())
    }
}
