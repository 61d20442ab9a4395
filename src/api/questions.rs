use mongodb::{bson::doc, options::FindOptions, Client};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    api::common::election_for_admin,
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, XsrfToken},
            election::{
                DeleteResult, OptionDescription, OptionSpec, QuestionDescription, QuestionDetail,
                QuestionSpec,
            },
        },
        db::{
            admin::Admin,
            election::Election,
            option::{NewPollOption, PollOption},
            question::{NewQuestion, Question},
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        questions,
        create_question,
        question,
        edit_question,
        delete_question,
        create_option,
        delete_option,
    ]
}

/// The election's questions in display order.
#[get("/elections/<election_id>/questions")]
pub async fn questions(
    token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    questions: Coll<Question>,
) -> Result<Json<Vec<QuestionDescription>>> {
    election_for_admin(&token, election_id, &elections).await?;

    let find = FindOptions::builder()
        .sort(doc! { "display_order": 1 })
        .build();
    let list: Vec<Question> = questions
        .find(doc! { "election_id": election_id }, find)
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

/// Append a question to the election. Only possible while the election is a
/// draft.
#[post("/elections/<election_id>/questions", data = "<spec>", format = "json")]
pub async fn create_question(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    spec: Json<QuestionSpec>,
    elections: Coll<Election>,
    new_questions: Coll<NewQuestion>,
    questions: Coll<Question>,
) -> Result<Json<QuestionDescription>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    if election.state.is_locked() {
        return Err(Error::Locked(format!(
            "Election {} is no longer a draft; questions cannot be added",
            election_id
        )));
    }

    // Append at the end of the ordered sequence.
    let position = questions
        .count_documents(doc! { "election_id": election_id }, None)
        .await?;
    let question: NewQuestion = spec
        .0
        .into_question(election_id, position as u32 + 1)
        .map_err(|_| Error::Validation("Question text must be non-empty".to_string()))?;

    let new_id: Id = new_questions
        .insert_one(&question, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();
    let question = questions.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(question.into()))
}

/// A single question with its options, as shown on the option-management page.
#[get("/elections/<election_id>/questions/<question_id>")]
pub async fn question(
    token: AuthToken<Admin>,
    election_id: Id,
    question_id: Id,
    elections: Coll<Election>,
    questions: Coll<Question>,
    options: Coll<PollOption>,
) -> Result<Json<QuestionDetail>> {
    election_for_admin(&token, election_id, &elections).await?;
    let question = find_question(election_id, question_id, &questions).await?;

    let find = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let option_list: Vec<PollOption> = options
        .find(doc! { "question_id": question_id }, find)
        .await?
        .try_collect()
        .await?;
    Ok(Json(QuestionDetail {
        question: question.into(),
        options: option_list.into_iter().map(Into::into).collect(),
    }))
}

/// Rewrite a question's text and description. Only possible while the
/// election is a draft; the position in the sequence never changes.
#[put("/elections/<election_id>/questions/<question_id>", data = "<spec>", format = "json")]
pub async fn edit_question(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    question_id: Id,
    spec: Json<QuestionSpec>,
    elections: Coll<Election>,
    questions: Coll<Question>,
) -> Result<Json<QuestionDescription>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    if election.state.is_locked() {
        return Err(Error::Locked(format!(
            "Election {} is no longer a draft; questions cannot be edited",
            election_id
        )));
    }
    if spec.text.trim().is_empty() {
        return Err(Error::Validation("Question text must be non-empty".to_string()));
    }

    let filter = doc! {
        "_id": question_id,
        "election_id": election_id,
    };
    let update = doc! {
        "$set": {
            "text": &spec.text,
            "description": &spec.description,
        }
    };
    let result = questions.update_one(filter, update, None).await?;
    if result.matched_count != 1 {
        return Err(Error::not_found(format!("Question {}", question_id)));
    }

    let question = find_question(election_id, question_id, &questions).await?;
    Ok(Json(question.into()))
}

/// Delete a question and its options.
///
/// Idempotent: `true` only on the deleting call; an already-deleted question
/// or a locked election acknowledges `false`.
#[delete("/elections/<election_id>/questions/<question_id>")]
pub async fn delete_question(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    question_id: Id,
    elections: Coll<Election>,
    questions: Coll<Question>,
    options: Coll<PollOption>,
    db_client: &State<Client>,
) -> Result<Json<DeleteResult>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    if election.state.is_locked() {
        return Ok(Json(DeleteResult { success: false }));
    }

    // Atomically delete the question and its options.
    let deleted = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        options
            .delete_many_with_session(doc! { "question_id": question_id }, None, &mut session)
            .await?;
        let filter = doc! {
            "_id": question_id,
            "election_id": election_id,
        };
        let result = questions
            .delete_one_with_session(filter, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        result.deleted_count == 1
    };

    Ok(Json(DeleteResult { success: deleted }))
}

/// Append an option to a question. Only possible while the election is a
/// draft.
#[post(
    "/elections/<election_id>/questions/<question_id>/options",
    data = "<spec>",
    format = "json"
)]
pub async fn create_option(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    question_id: Id,
    spec: Json<OptionSpec>,
    elections: Coll<Election>,
    questions: Coll<Question>,
    new_options: Coll<NewPollOption>,
    options: Coll<PollOption>,
) -> Result<Json<OptionDescription>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    if election.state.is_locked() {
        return Err(Error::Locked(format!(
            "Election {} is no longer a draft; options cannot be added",
            election_id
        )));
    }
    find_question(election_id, question_id, &questions).await?;
    if spec.text.trim().is_empty() {
        return Err(Error::Validation("Option text must be non-empty".to_string()));
    }

    let option = NewPollOption {
        question_id,
        text: spec.0.text,
    };
    let new_id: Id = new_options
        .insert_one(&option, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();
    let option = options.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(option.into()))
}

/// Delete an option, under the same idempotent contract as questions.
#[delete("/elections/<election_id>/questions/<question_id>/options/<option_id>")]
pub async fn delete_option(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    question_id: Id,
    option_id: Id,
    elections: Coll<Election>,
    options: Coll<PollOption>,
) -> Result<Json<DeleteResult>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    if election.state.is_locked() {
        return Ok(Json(DeleteResult { success: false }));
    }

    let filter = doc! {
        "_id": option_id,
        "question_id": question_id,
    };
    let result = options.delete_one(filter, None).await?;
    Ok(Json(DeleteResult { success: result.deleted_count == 1 }))
}

/// Look up a question within an election.
async fn find_question(
    election_id: Id,
    question_id: Id,
    questions: &Coll<Question>,
) -> Result<Question> {
    let filter = doc! {
        "_id": question_id,
        "election_id": election_id,
    };
    questions
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))
}
