use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

use super::election::{ElectionDescription, QuestionDetail};

/// Raw voter credentials, received at voter sign-in. Never stored directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterCredentials {
    /// Voter identifier, unique within the election.
    pub voter_id: String,
    pub password: String,
}

/// The ballot paper shown to a signed-in voter: every question with its
/// options, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPaper {
    pub election: ElectionDescription,
    pub questions: Vec<QuestionDetail>,
}

/// One answered question on a submitted ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSelection {
    pub question: Id,
    pub option: Id,
}

/// A submitted ballot: exactly one selection per question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotSpec {
    pub selections: Vec<BallotSelection>,
}

/// Acknowledgement of a recorded ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    pub election_id: Id,
    pub answers_recorded: usize,
}
