use std::ops::{Deref, DerefMut};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// States in the election lifecycle.
///
/// The only permitted transitions are `Draft -> Running` (launch) and
/// `Running -> Ended` (end); `Ended` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionState {
    /// Under construction: questions, options, and voters may change.
    Draft,
    /// Launched: the structure is frozen, ballots may be cast.
    Running,
    /// Over: nothing may change ever again.
    Ended,
}

impl ElectionState {
    /// Is the election currently accepting ballots?
    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    /// Has the election finished for good?
    pub fn is_ended(self) -> bool {
        self == Self::Ended
    }

    /// Are structural changes (questions, options, voters) forbidden?
    /// Everything outside `Draft` is locked.
    pub fn is_locked(self) -> bool {
        self != Self::Draft
    }
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// URL slug, unique among this admin's elections.
    pub url_slug: String,
    /// The admin who owns this election.
    pub admin_id: Id,
    /// Lifecycle state.
    pub state: ElectionState,
}

impl ElectionCore {
    /// Create a new election in the initial state.
    pub fn new(name: String, url_slug: String, admin_id: Id) -> Self {
        Self {
            name,
            url_slug,
            admin_id,
            state: ElectionState::Draft,
        }
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_is_the_only_unlocked_state() {
        assert!(!ElectionState::Draft.is_locked());
        assert!(ElectionState::Running.is_locked());
        assert!(ElectionState::Ended.is_locked());
    }

    #[test]
    fn running_and_ended_are_disjoint() {
        for state in [
            ElectionState::Draft,
            ElectionState::Running,
            ElectionState::Ended,
        ] {
            assert!(!(state.is_running() && state.is_ended()));
        }
    }

    #[test]
    fn new_elections_start_as_drafts() {
        let election = ElectionCore::new("Test".to_string(), "test".to_string(), Id::new());
        assert_eq!(election.state, ElectionState::Draft);
    }
}
