//! The state store: exclusive owner of every local repository.
//!
//! Four independent repositories (progresses, missions, followers, wallet)
//! are replaced wholesale from each snapshot. Between snapshots the only
//! mutation paths are [`StateStore::merge_delta`] and
//! [`StateStore::acknowledge_progress`]; readers get shared references only.
//!
//! Repositories keep portal order, which is the encounter order used to
//! break efficiency ties during follower selection.

use adept_types::{
    ActionLinks, Follower, FollowerId, Mission, MissionId, Progress, ProgressId, ResourceWallet,
    StateDelta, StateSnapshot,
};

/// An entity addressable by a unique key.
pub trait Keyed {
    /// The key type.
    type Key: Copy + Eq;

    /// Return this entity's key.
    fn key(&self) -> Self::Key;
}

impl Keyed for Progress {
    type Key = ProgressId;

    fn key(&self) -> ProgressId {
        self.id
    }
}

impl Keyed for Mission {
    type Key = MissionId;

    fn key(&self) -> MissionId {
        self.id
    }
}

impl Keyed for Follower {
    type Key = FollowerId;

    fn key(&self) -> FollowerId {
        self.id
    }
}

/// An ordered collection of keyed entities, replaced as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct Repository<T> {
    items: Vec<T>,
}

impl<T> Default for Repository<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Keyed> Repository<T> {
    /// Iterate in portal order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Look up an entity by key.
    pub fn get(&self, key: T::Key) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }

    /// Number of entities held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn replace(&mut self, items: Vec<T>) {
        self.items = items;
    }

    fn remove(&mut self, key: T::Key) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.key() != key);
        self.items.len() != before
    }
}

impl<'a, T: Keyed> IntoIterator for &'a Repository<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Local mirror of the remote game state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    progresses: Repository<Progress>,
    missions: Repository<Mission>,
    followers: Repository<Follower>,
    wallet: ResourceWallet,
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every repository from a snapshot.
    ///
    /// Returns the snapshot's action links so the caller can decide whether
    /// to capture them.
    pub fn replace(&mut self, snapshot: StateSnapshot) -> Option<ActionLinks> {
        let StateSnapshot {
            progresses,
            missions,
            followers,
            wallet,
            links,
        } = snapshot;
        self.progresses.replace(progresses);
        self.missions.replace(missions);
        self.followers.replace(followers);
        self.wallet = wallet;
        links
    }

    /// Merge an action's delta: each repository it carries replaces the
    /// local one; the rest stay untouched.
    pub fn merge_delta(&mut self, delta: StateDelta) {
        if let Some(progresses) = delta.progresses {
            self.progresses.replace(progresses);
        }
        if let Some(missions) = delta.missions {
            self.missions.replace(missions);
        }
        if let Some(followers) = delta.followers {
            self.followers.replace(followers);
        }
        if let Some(wallet) = delta.wallet {
            self.wallet = wallet;
        }
    }

    /// Drop a progress whose completion the portal acknowledged.
    ///
    /// Returns whether the progress was present.
    pub fn acknowledge_progress(&mut self, id: ProgressId) -> bool {
        self.progresses.remove(id)
    }

    /// In-flight progresses.
    pub const fn progresses(&self) -> &Repository<Progress> {
        &self.progresses
    }

    /// Known missions.
    pub const fn missions(&self) -> &Repository<Mission> {
        &self.missions
    }

    /// Known followers.
    pub const fn followers(&self) -> &Repository<Follower> {
        &self.followers
    }

    /// Current currency balances.
    pub const fn wallet(&self) -> &ResourceWallet {
        &self.wallet
    }
}
