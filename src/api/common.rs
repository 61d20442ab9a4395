use mongodb::bson::doc;
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        election::QuestionDetail,
    },
    db::{admin::Admin, election::Election, option::PollOption, question::Question},
    mongodb::{Coll, Id},
};

/// Look up an election owned by the authenticated admin.
///
/// Someone else's election is indistinguishable from a missing one.
pub async fn election_for_admin(
    token: &AuthToken<Admin>,
    election_id: Id,
    elections: &Coll<Election>,
) -> Result<Election> {
    let filter = doc! {
        "_id": election_id,
        "admin_id": token.id,
    };
    elections
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))
}


/// All of an election's questions in display order, each with its options.
pub async fn question_details(
    election_id: Id,
    questions: &Coll<Question>,
    options: &Coll<PollOption>,
) -> Result<Vec<QuestionDetail>> {
    let find = FindOptions::builder()
        .sort(doc! { "display_order": 1 })
        .build();
    let question_list: Vec<Question> = questions
        .find(doc! { "election_id": election_id }, find)
        .await?
        .try_collect()
        .await?;

    let mut details = Vec::with_capacity(question_list.len());
    for question in question_list {
        let find = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let option_list: Vec<PollOption> = options
            .find(doc! { "question_id": question.id }, find)
            .await?
            .try_collect()
            .await?;
        details.push(QuestionDetail {
            question: question.into(),
            options: option_list.into_iter().map(Into::into).collect(),
        });
    }
    Ok(details)
}
