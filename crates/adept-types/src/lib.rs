//! Shared type definitions for the Adept follower bot.
//!
//! This crate is the single source of truth for the game state the bot
//! reasons about. Everything the remote portal sends is decoded here, so the
//! rest of the workspace only ever sees typed values.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe numeric wrappers for all game identifiers
//! - [`enums`] -- Progress kinds and mission categories
//! - [`structs`] -- Core entities (progresses, missions, followers, wallet)
//! - [`wire`] -- Snapshot and delta payload decoding from portal JSON

pub mod enums;
pub mod ids;
pub mod structs;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use enums::{MissionCategory, ProgressKind};
pub use ids::{CurrencyId, FollowerId, MissionId, ProfessionId, ProgressId};
pub use structs::{
    CurrencyAmount, CurrencyShortfall, Follower, Mission, MissionCost, Progress, ResourceWallet,
};
pub use wire::{ActionLinks, StateDelta, StateSnapshot, WireError};
