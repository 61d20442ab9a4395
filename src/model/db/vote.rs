use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A single recorded answer: one voter picking one option on one question.
///
/// Votes are only ever written while the election is running, and only ever
/// read back for integrity checks; tallying is out of scope.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub election_id: Id,
    pub question_id: Id,
    pub option_id: Id,
    /// Database ID of the voter, not their public voter identifier.
    pub voter_id: Id,
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
