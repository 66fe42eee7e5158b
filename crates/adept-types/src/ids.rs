//! Type-safe identifier wrappers around the portal's numeric ids.
//!
//! The portal identifies every entity with a plain JSON integer. Wrapping
//! each kind in its own newtype keeps a follower id from ever being passed
//! where a mission id is expected.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw portal id.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the inner numeric value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an in-flight progress record.
    ProgressId
}

define_id! {
    /// Unique identifier for a mission (quest).
    MissionId
}

define_id! {
    /// Unique identifier for a follower (adept).
    FollowerId
}

define_id! {
    /// Identifier of a follower profession.
    ProfessionId
}

define_id! {
    /// Identifier of an in-game currency held in the wallet.
    CurrencyId
}
