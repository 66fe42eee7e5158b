//! Core entity structs for the Adept follower bot.
//!
//! These are the decoded, validated forms of the portal's JSON records. The
//! raw wire shapes live in [`crate::wire`] and never leave this crate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::enums::{MissionCategory, ProgressKind};
use crate::ids::{CurrencyId, FollowerId, MissionId, ProfessionId, ProgressId};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// A remote record of an in-flight task.
///
/// `finished` is authoritative. The timestamps only feed the advisory
/// "time remaining" log line and are never used to decide completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Unique progress id.
    pub id: ProgressId,
    /// Mission execution or other timed operation.
    pub kind: ProgressKind,
    /// The mission this progress executes. Present only for mission kind.
    pub mission_id: Option<MissionId>,
    /// When the task started.
    pub start_time: DateTime<Utc>,
    /// When the task is due to end. Never earlier than `start_time`.
    pub end_time: DateTime<Utc>,
    /// Whether the portal reports the task as finished.
    pub finished: bool,
}

impl Progress {
    /// Whether this progress tracks a mission execution.
    pub fn is_mission(&self) -> bool {
        self.kind == ProgressKind::Mission
    }

    /// Seconds until `end_time`, clamped at zero.
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> u64 {
        let remaining = self.end_time.signed_duration_since(now).num_seconds();
        u64::try_from(remaining).unwrap_or(0)
    }

    /// Time remaining formatted as `H:MM:SS`.
    pub fn format_remaining(&self, now: DateTime<Utc>) -> String {
        let secs = self.seconds_remaining(now);
        format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}

// ---------------------------------------------------------------------------
// Mission
// ---------------------------------------------------------------------------

/// One currency-amount pair of a mission price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct CurrencyAmount {
    /// Currency to be paid.
    pub id: CurrencyId,
    /// Amount required.
    pub amount: u64,
}

/// The full price of starting a mission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionCost {
    /// Wallet currencies consumed on start.
    pub currencies: Vec<CurrencyAmount>,
    /// Inventory resource requirements. Opaque to the bot: only their
    /// presence matters, for cost-free classification.
    pub resources: Vec<serde_json::Value>,
}

impl MissionCost {
    /// A mission is free when it needs neither currency nor resources.
    ///
    /// Zero-amount currency entries still count as a cost entry.
    pub fn is_free(&self) -> bool {
        self.currencies.is_empty() && self.resources.is_empty()
    }

    /// Required amount per currency, summing duplicate entries.
    pub fn totals(&self) -> BTreeMap<CurrencyId, u64> {
        let mut totals: BTreeMap<CurrencyId, u64> = BTreeMap::new();
        for entry in &self.currencies {
            let total = totals.entry(entry.id).or_insert(0);
            *total = total.saturating_add(entry.amount);
        }
        totals
    }
}

/// A schedulable unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Mission {
    /// Unique mission id.
    pub id: MissionId,
    /// Display name (may be empty).
    pub name: String,
    /// Number of followers the mission needs.
    pub capacity: u32,
    /// Mission duration in seconds.
    pub duration: u64,
    /// Preferred professions. Empty means no preference.
    pub required_professions: Vec<ProfessionId>,
    /// Price of starting the mission.
    pub cost: MissionCost,
    /// Category tag deciding scheduling priority.
    pub category: MissionCategory,
    /// Whether the mission is currently running.
    pub in_progress: bool,
    /// Outcome of the last run. Only meaningful after completion.
    pub success: Option<bool>,
    /// Portal difficulty rating, logged only.
    pub difficulty: Option<u32>,
    /// Experience reward, logged only.
    pub experience: Option<u64>,
}

impl Mission {
    /// Whether the mission can be started right now.
    pub const fn is_idle(&self) -> bool {
        !self.in_progress
    }

    /// Whether `profession` is one of the preferred professions.
    pub fn prefers(&self, profession: ProfessionId) -> bool {
        self.required_professions.contains(&profession)
    }
}

// ---------------------------------------------------------------------------
// Follower
// ---------------------------------------------------------------------------

/// A worker unit assignable to missions.
#[derive(Debug, Clone, PartialEq)]
pub struct Follower {
    /// Unique follower id.
    pub id: FollowerId,
    /// Numeric rank; higher is preferred.
    pub efficiency: f64,
    /// The follower's profession.
    pub profession: ProfessionId,
    /// Whether the follower is busy on a mission.
    pub in_progress: bool,
}

impl Follower {
    /// Whether the follower is free to be assigned.
    pub const fn is_idle(&self) -> bool {
        !self.in_progress
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// The first currency a wallet cannot cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyShortfall {
    /// The lacking currency.
    pub currency: CurrencyId,
    /// Total amount the cost asks for.
    pub required: u64,
    /// Amount held.
    pub available: u64,
}

/// Mapping from currency id to available amount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceWallet {
    balances: BTreeMap<CurrencyId, u64>,
}

impl ResourceWallet {
    /// Build a wallet from explicit balances.
    pub const fn new(balances: BTreeMap<CurrencyId, u64>) -> Self {
        Self { balances }
    }

    /// Amount held of `currency`; unknown currencies hold zero.
    pub fn balance(&self, currency: CurrencyId) -> u64 {
        self.balances.get(&currency).copied().unwrap_or(0)
    }

    /// Iterate over all balances in currency order.
    pub fn iter(&self) -> impl Iterator<Item = (CurrencyId, u64)> + '_ {
        self.balances.iter().map(|(id, amount)| (*id, *amount))
    }

    /// Return the first currency of `cost` this wallet cannot cover, if any.
    pub fn shortfall(&self, cost: &MissionCost) -> Option<CurrencyShortfall> {
        cost.totals().into_iter().find_map(|(currency, required)| {
            let available = self.balance(currency);
            (available < required).then_some(CurrencyShortfall {
                currency,
                required,
                available,
            })
        })
    }
}

impl FromIterator<(CurrencyId, u64)> for ResourceWallet {
    fn from_iter<T: IntoIterator<Item = (CurrencyId, u64)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
