use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core option data, as stored in the database.
///
/// Named `PollOption` to avoid a clash with [`std::option::Option`].
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptionCore {
    /// The question this option belongs to.
    pub question_id: Id,
    /// Option text.
    pub text: String,
}

/// An option without an ID.
pub type NewPollOption = PollOptionCore;

/// An option from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct PollOption {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub option: PollOptionCore,
}

impl Deref for PollOption {
    type Target = PollOptionCore;

    fn deref(&self) -> &Self::Target {
        &self.option
    }
}

impl DerefMut for PollOption {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.option
    }
}
