use serde::{Deserialize, Serialize};

use crate::model::{
    db::{
        election::{Election, NewElection},
        option::PollOption,
        question::{NewQuestion, Question},
        voter::{NewVoter, Voter},
    },
    mongodb::Id,
};

use super::admin::{hash_password, MIN_PASSWORD_LENGTH};

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election name.
    pub name: String,
    /// URL slug, unique among this admin's elections.
    pub url_slug: String,
}

impl ElectionSpec {
    /// Convert this spec into a storable election owned by the given admin.
    /// Fails if the name or slug is empty.
    pub fn into_election(self, admin_id: Id) -> Result<NewElection, ()> {
        if self.name.trim().is_empty() || self.url_slug.trim().is_empty() {
            return Err(());
        }
        Ok(NewElection::new(self.name, self.url_slug, admin_id))
    }
}

/// A question specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// Question text.
    pub text: String,
    /// Longer description shown below the question.
    pub description: String,
}

impl QuestionSpec {
    /// Convert this spec into a storable question at the given position.
    /// Fails if the question text is empty.
    pub fn into_question(self, election_id: Id, display_order: u32) -> Result<NewQuestion, ()> {
        if self.text.trim().is_empty() {
            return Err(());
        }
        Ok(NewQuestion {
            election_id,
            text: self.text,
            description: self.description,
            display_order,
        })
    }
}

/// An option specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Option text.
    pub text: String,
}

/// A voter specification, as submitted by an admin. Never stored directly,
/// since the password is plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterSpec {
    /// Voter identifier, unique within the election.
    pub voter_id: String,
    /// Password the voter will sign in with.
    pub password: String,
}

impl VoterSpec {
    /// Convert this spec into a storable voter by hashing the password.
    /// Fails if the voter ID is empty or the password is too short.
    pub fn into_voter(self, election_id: Id) -> Result<NewVoter, ()> {
        if self.voter_id.trim().is_empty() || self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(());
        }
        Ok(NewVoter {
            election_id,
            voter_id: self.voter_id,
            password_hash: hash_password(&self.password),
            has_voted: false,
        })
    }
}

/// An API-friendly election view. The lifecycle state is flattened into the
/// `running`/`ended` booleans the frontend consumes; the state enum itself
/// never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    /// Election unique ID.
    pub id: Id,
    /// Election name.
    pub name: String,
    /// URL slug.
    pub url_slug: String,
    /// Is the election currently accepting ballots?
    pub running: bool,
    /// Has the election finished for good?
    pub ended: bool,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            running: election.state.is_running(),
            ended: election.state.is_ended(),
            name: election.election.name,
            url_slug: election.election.url_slug,
        }
    }
}

/// An API-friendly question view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescription {
    /// Question unique ID.
    pub id: Id,
    /// Question text.
    pub text: String,
    /// Longer description shown below the question.
    pub description: String,
    /// Position within the election's ordered question sequence.
    pub display_order: u32,
}

impl From<Question> for QuestionDescription {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            text: question.question.text,
            description: question.question.description,
            display_order: question.question.display_order,
        }
    }
}

/// A question together with its options, as shown on previews and ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: QuestionDescription,
    /// The question's options, in creation order.
    pub options: Vec<OptionDescription>,
}

/// An API-friendly option view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescription {
    /// Option unique ID.
    pub id: Id,
    /// Option text.
    pub text: String,
}

impl From<PollOption> for OptionDescription {
    fn from(option: PollOption) -> Self {
        Self {
            id: option.id,
            text: option.option.text,
        }
    }
}

/// An API-friendly voter view; the password hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    /// Voter unique database ID.
    pub id: Id,
    /// Voter identifier, unique within the election.
    pub voter_id: String,
    /// Whether the voter has cast their ballot.
    pub has_voted: bool,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id,
            voter_id: voter.voter.voter_id,
            has_voted: voter.voter.has_voted,
        }
    }
}

/// The uniform response of every delete endpoint.
///
/// Deletes are idempotent: the first deletion of an existing resource
/// acknowledges `true`, anything else (already gone, or the election is
/// locked) acknowledges `false` rather than raising an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
}

/// Everything an admin sees on the pre-launch preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPreview {
    pub election: ElectionDescription,
    pub questions: Vec<QuestionDetail>,
    pub voter_count: u64,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionSpec {
        pub fn example() -> Self {
            Self {
                name: "Test election".to_string(),
                url_slug: "test11".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                name: "Club committee 2026".to_string(),
                url_slug: "committee-2026".to_string(),
            }
        }
    }

    impl QuestionSpec {
        pub fn example() -> Self {
            Self {
                text: "Who should be president?".to_string(),
                description: "Pick exactly one candidate.".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                text: "Should meetings move to Thursdays?".to_string(),
                description: "".to_string(),
            }
        }
    }

    impl OptionSpec {
        pub fn example() -> Self {
            Self {
                text: "Jane Doe".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                text: "John Smith".to_string(),
            }
        }
    }

    impl VoterSpec {
        pub fn example() -> Self {
            Self {
                voter_id: "voter1".to_string(),
                password: "correct horse".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                voter_id: "voter2".to_string(),
                password: "battery staple".to_string(),
            }
        }
    }
}
