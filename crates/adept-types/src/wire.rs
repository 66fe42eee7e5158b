//! Decoding of portal state payloads.
//!
//! The `HeroBag` snapshot and the `updateData` block of every successful
//! action share the same repository shapes:
//!
//! ```text
//! { "progresses": [...], "missions": [...], "followers": [...],
//!   "wallet": { "<currency id>": <amount> },
//!   "finishProgressOperationLink": "...", "fuseOperationLink": "..." }
//! ```
//!
//! A snapshot replaces every repository, so absent lists decode as empty. A
//! delta only replaces the repositories it mentions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::enums::{MissionCategory, ProgressKind};
use crate::ids::{CurrencyId, FollowerId, MissionId, ProfessionId, ProgressId};
use crate::structs::{CurrencyAmount, Follower, Mission, MissionCost, Progress, ResourceWallet};

/// Errors raised while decoding a state payload.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The JSON does not match the expected repository shapes.
    #[error("unexpected payload shape: {source}")]
    Shape {
        /// The underlying deserialization error.
        #[from]
        source: serde_json::Error,
    },

    /// A progress timestamp is outside the representable range.
    #[error("progress {progress_id} has an invalid timestamp {millis}")]
    InvalidTimestamp {
        /// The offending progress.
        progress_id: ProgressId,
        /// The raw epoch milliseconds.
        millis: i64,
    },

}

// ---------------------------------------------------------------------------
// Raw wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    #[serde(default)]
    progresses: Option<Vec<RawProgress>>,
    #[serde(default)]
    missions: Option<Vec<RawMission>>,
    #[serde(default)]
    followers: Option<Vec<RawFollower>>,
    #[serde(default)]
    wallet: Option<BTreeMap<CurrencyId, u64>>,
    #[serde(default)]
    finish_progress_operation_link: Option<String>,
    #[serde(default)]
    fuse_operation_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProgress {
    id: ProgressId,
    finished: bool,
    start_time: i64,
    end_time: i64,
    #[serde(default)]
    fuse_data: Option<RawFuseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFuseData {
    mission_id: MissionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMission {
    id: MissionId,
    #[serde(default)]
    name: String,
    in_progress: bool,
    #[serde(default)]
    difficulty: Option<u32>,
    duration: u64,
    #[serde(default)]
    experience: Option<u64>,
    #[serde(default)]
    price: RawPrice,
    #[serde(default)]
    professions: Vec<RawRef<ProfessionId>>,
    slot_count: u32,
    #[serde(default, rename = "type")]
    mission_type: Option<String>,
    #[serde(default)]
    success: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPrice {
    #[serde(default)]
    currencies: Vec<CurrencyAmount>,
    #[serde(default)]
    resources: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFollower {
    id: FollowerId,
    efficiency: f64,
    in_progress: bool,
    profession: RawRef<ProfessionId>,
}

#[derive(Debug, Deserialize)]
struct RawRef<T> {
    id: T,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn timestamp(progress_id: ProgressId, millis: i64) -> Result<DateTime<Utc>, WireError> {
    DateTime::from_timestamp_millis(millis).ok_or(WireError::InvalidTimestamp {
        progress_id,
        millis,
    })
}

impl TryFrom<RawProgress> for Progress {
    type Error = WireError;

    fn try_from(raw: RawProgress) -> Result<Self, Self::Error> {
        let start_time = timestamp(raw.id, raw.start_time)?;
        let mut end_time = timestamp(raw.id, raw.end_time)?;
        if end_time < start_time {
            warn!(
                progress_id = %raw.id,
                start_ms = raw.start_time,
                end_ms = raw.end_time,
                "progress ends before it starts, clamping end to start"
            );
            end_time = start_time;
        }
        let mission_id = raw.fuse_data.map(|fuse| fuse.mission_id);
        let kind = if mission_id.is_some() {
            ProgressKind::Mission
        } else {
            ProgressKind::Other
        };
        Ok(Self {
            id: raw.id,
            kind,
            mission_id,
            start_time,
            end_time,
            finished: raw.finished,
        })
    }
}

impl From<RawMission> for Mission {
    fn from(raw: RawMission) -> Self {
        let cost = MissionCost {
            currencies: raw.price.currencies,
            resources: raw.price.resources,
        };
        let category = MissionCategory::classify(raw.mission_type.as_deref(), cost.is_free());
        Self {
            id: raw.id,
            name: raw.name,
            capacity: raw.slot_count,
            duration: raw.duration,
            required_professions: raw.professions.into_iter().map(|p| p.id).collect(),
            cost,
            category,
            in_progress: raw.in_progress,
            success: raw.success,
            difficulty: raw.difficulty,
            experience: raw.experience,
        }
    }
}

impl From<RawFollower> for Follower {
    fn from(raw: RawFollower) -> Self {
        Self {
            id: raw.id,
            efficiency: raw.efficiency,
            profession: raw.profession.id,
            in_progress: raw.in_progress,
        }
    }
}

/// Convert record by record. A progress that cannot be represented is
/// dropped on its own; the rest of the payload still decodes.
fn convert_progresses(raw: Vec<RawProgress>) -> Vec<Progress> {
    raw.into_iter()
        .filter_map(|raw| match Progress::try_from(raw) {
            Ok(progress) => Some(progress),
            Err(e) => {
                warn!(error = %e, "dropping undecodable progress");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public payloads
// ---------------------------------------------------------------------------

/// The two action endpoints the portal hands out with every snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLinks {
    /// URL of the complete-progress action (`finishProgressOperationLink`).
    pub finish_progress: String,
    /// URL of the start-mission action (`fuseOperationLink`).
    pub start_mission: String,
}

impl ActionLinks {
    /// Pair up both links; `None` if either one is missing or blank.
    pub fn from_parts(finish_progress: Option<String>, start_mission: Option<String>) -> Option<Self> {
        let finish_progress = finish_progress.filter(|link| !link.trim().is_empty())?;
        let start_mission = start_mission.filter(|link| !link.trim().is_empty())?;
        Some(Self {
            finish_progress,
            start_mission,
        })
    }
}

/// A full-state payload replacing every local repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    /// All in-flight progresses.
    pub progresses: Vec<Progress>,
    /// All missions, in portal order.
    pub missions: Vec<Mission>,
    /// All followers, in portal order.
    pub followers: Vec<Follower>,
    /// Currency balances.
    pub wallet: ResourceWallet,
    /// Action endpoints, when the portal supplied both.
    pub links: Option<ActionLinks>,
}

impl StateSnapshot {
    /// Decode the `spec` object of a `HeroBag` response.
    pub fn from_value(spec: &serde_json::Value) -> Result<Self, WireError> {
        let raw = RawState::deserialize(spec)?;
        Ok(Self {
            progresses: convert_progresses(raw.progresses.unwrap_or_default()),
            missions: raw
                .missions
                .unwrap_or_default()
                .into_iter()
                .map(Mission::from)
                .collect(),
            followers: raw
                .followers
                .unwrap_or_default()
                .into_iter()
                .map(Follower::from)
                .collect(),
            wallet: ResourceWallet::new(raw.wallet.unwrap_or_default()),
            links: ActionLinks::from_parts(
                raw.finish_progress_operation_link,
                raw.fuse_operation_link,
            ),
        })
    }
}

/// A partial state payload returned by a successful action.
///
/// Each present repository replaces its local counterpart wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    /// Replacement progresses, if sent.
    pub progresses: Option<Vec<Progress>>,
    /// Replacement missions, if sent.
    pub missions: Option<Vec<Mission>>,
    /// Replacement followers, if sent.
    pub followers: Option<Vec<Follower>>,
    /// Replacement wallet, if sent.
    pub wallet: Option<ResourceWallet>,
}

impl StateDelta {
    /// Decode an `updateData` object.
    pub fn from_value(update: &serde_json::Value) -> Result<Self, WireError> {
        let raw = RawState::deserialize(update)?;
        Ok(Self {
            progresses: raw.progresses.map(convert_progresses),
            missions: raw
                .missions
                .map(|missions| missions.into_iter().map(Mission::from).collect()),
            followers: raw
                .followers
                .map(|followers| followers.into_iter().map(Follower::from).collect()),
            wallet: raw.wallet.map(ResourceWallet::new),
        })
    }

    /// Whether the delta replaces nothing.
    pub const fn is_empty(&self) -> bool {
        self.progresses.is_none()
            && self.missions.is_none()
            && self.followers.is_none()
            && self.wallet.is_none()
    }
}
