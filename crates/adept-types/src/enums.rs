//! Enumeration types for the Adept follower bot.

// ---------------------------------------------------------------------------
// Progress kinds
// ---------------------------------------------------------------------------

/// What an in-flight progress record is tracking.
///
/// Only mission progresses are completed automatically. Other timed
/// operations (crafting, upgrades) are carried for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressKind {
    /// A follower mission in execution; carries a linked mission id.
    Mission,
    /// Any other timed operation.
    Other,
}

// ---------------------------------------------------------------------------
// Mission categories
// ---------------------------------------------------------------------------

/// The category tag of a mission.
///
/// The category decides whether and in which order the engine attempts a
/// mission. Battle and cult missions are recognised but left for manual play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MissionCategory {
    /// Cost-free resource gathering missions.
    Mining,
    /// Combat missions.
    Battle,
    /// Cult (sanctuary) missions.
    Cult,
    /// Invasion missions.
    Invasion,
    /// Case and limited-time event missions.
    Case,
    /// Anything the bot does not recognise.
    Other,
}

impl MissionCategory {
    /// Classify a mission from its optional wire tag and whether it costs
    /// anything to start.
    ///
    /// A mission with any cost never classifies as [`Self::Mining`], whether
    /// the tag says so or the tag is missing.
    pub fn classify(tag: Option<&str>, cost_free: bool) -> Self {
        let Some(tag) = tag else {
            return if cost_free { Self::Mining } else { Self::Other };
        };
        match tag.trim().to_ascii_lowercase().as_str() {
            "mining" if cost_free => Self::Mining,
            "battle" => Self::Battle,
            "cult" => Self::Cult,
            "invasion" => Self::Invasion,
            "case" | "event" => Self::Case,
            _ => Self::Other,
        }
    }

    /// Short lowercase name for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mining => "mining",
            Self::Battle => "battle",
            Self::Cult => "cult",
            Self::Invasion => "invasion",
            Self::Case => "case",
            Self::Other => "other",
        }
    }
}

impl core::fmt::Display for MissionCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
