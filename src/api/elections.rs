use mongodb::{
    bson::{doc, Bson},
    options::FindOptions,
    Client,
};
use rocket::{futures::TryStreamExt, response::Redirect, serde::json::Json, Route, State};

use crate::{
    api::common::{election_for_admin, question_details},
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, XsrfToken},
            election::{DeleteResult, ElectionDescription, ElectionPreview, ElectionSpec},
        },
        db::{
            admin::Admin,
            election::{Election, ElectionState, NewElection},
            option::PollOption,
            question::Question,
            vote::Vote,
            voter::Voter,
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        elections,
        create_election,
        election,
        delete_election,
        preview_election,
        launch_election,
        end_election,
    ]
}

/// The caller's elections, oldest first. The last element is always the most
/// recently created one.
#[get("/elections")]
pub async fn elections(
    token: AuthToken<Admin>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let filter = doc! { "admin_id": token.id };
    let find = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let list: Vec<Election> = elections.find(filter, find).await?.try_collect().await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[post("/elections", data = "<spec>", format = "json")]
pub async fn create_election(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    // Check slug uniqueness among this admin's elections.
    let filter = doc! {
        "admin_id": token.id,
        "url_slug": &spec.url_slug,
    };
    let existing = elections.find_one(filter, None).await?;
    if existing.is_some() {
        return Err(Error::Duplicate(format!(
            "URL slug already in use: {}",
            spec.url_slug
        )));
    }

    // Create and insert the election.
    let election: NewElection = spec
        .0
        .into_election(token.id)
        .map_err(|_| Error::Validation("Election name and slug must be non-empty".to_string()))?;
    let new_id: Id = new_elections
        .insert_one(&election, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();

    // Retrieve the full election information including ID.
    let election = elections.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>")]
pub async fn election(
    token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    Ok(Json(election.into()))
}

/// Delete an election and everything it owns.
///
/// Follows the idempotent delete contract: `success` is true only when this
/// call actually removed the election; a missing election or one that is
/// currently running acknowledges false instead of erroring.
#[delete("/elections/<election_id>")]
pub async fn delete_election(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    elections: Coll<Election>,
    questions: Coll<Question>,
    options: Coll<PollOption>,
    voters: Coll<Voter>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
) -> Result<Json<DeleteResult>> {
    let filter = doc! {
        "_id": election_id,
        "admin_id": token.id,
    };
    let election = match elections.find_one(filter, None).await? {
        Some(election) => election,
        None => return Ok(Json(DeleteResult { success: false })),
    };
    if election.state.is_running() {
        return Ok(Json(DeleteResult { success: false }));
    }

    // Collect the question IDs so their options can be removed as well.
    let question_list: Vec<Question> = questions
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;
    let question_ids: Vec<Bson> = question_list
        .iter()
        .map(|question| question.id.into())
        .collect();

    // Atomically delete the election and all associated data.
    let deleted = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        options
            .delete_many_with_session(
                doc! { "question_id": { "$in": question_ids } },
                None,
                &mut session,
            )
            .await?;
        let children = doc! {
            "election_id": election_id,
        };
        questions
            .delete_many_with_session(children.clone(), None, &mut session)
            .await?;
        voters
            .delete_many_with_session(children.clone(), None, &mut session)
            .await?;
        votes
            .delete_many_with_session(children, None, &mut session)
            .await?;
        let result = elections
            .delete_one_with_session(election_id.as_doc(), None, &mut session)
            .await?;

        session.commit_transaction().await?;
        result.deleted_count == 1
    };

    Ok(Json(DeleteResult { success: deleted }))
}

/// Read-only launch rehearsal: shows the full election as voters will see it,
/// or redirects back to the election while the launch preconditions are
/// still unmet.
#[get("/elections/<election_id>/preview")]
pub async fn preview_election(
    token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    questions: Coll<Question>,
    options: Coll<PollOption>,
    voters: Coll<Voter>,
) -> Result<PreviewResponse> {
    let election = election_for_admin(&token, election_id, &elections).await?;

    if launch_blocker(election_id, &questions, &options, &voters)
        .await?
        .is_some()
    {
        return Ok(PreviewResponse::NotReady(Redirect::to(uri!(election(
            election_id
        )))));
    }

    let question_list = question_details(election_id, &questions, &options).await?;
    let voter_count = voters
        .count_documents(doc! { "election_id": election_id }, None)
        .await?;
    Ok(PreviewResponse::Ready(Json(ElectionPreview {
        election: election.into(),
        questions: question_list,
        voter_count,
    })))
}

#[derive(Responder)]
pub enum PreviewResponse {
    Ready(Json<ElectionPreview>),
    NotReady(Redirect),
}

/// The only way into the `Running` state.
///
/// Responds with `[modified_count, [election]]`, mirroring the update
/// acknowledgement the frontend consumes: after a successful launch the
/// second element's first item has `running: true`. A repeated or concurrent
/// launch finds the election already running and acknowledges `[0,
/// [election]]` instead of double-transitioning.
#[put("/elections/<election_id>/launch")]
pub async fn launch_election(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    elections: Coll<Election>,
    questions: Coll<Question>,
    options: Coll<PollOption>,
    voters: Coll<Voter>,
) -> Result<Json<(u64, Vec<ElectionDescription>)>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    match election.state {
        ElectionState::Running => {
            return Ok(Json((0, vec![election.into()])));
        }
        ElectionState::Ended => {
            return Err(Error::Locked(format!(
                "Election {} has ended and cannot be launched",
                election_id
            )));
        }
        ElectionState::Draft => {}
    }

    if let Some(reason) = launch_blocker(election_id, &questions, &options, &voters).await? {
        return Err(Error::NotReady(reason));
    }

    // Filtering on the state as well as the ID serialises concurrent
    // launches: exactly one caller performs the transition.
    let filter = doc! {
        "_id": election_id,
        "state": ElectionState::Draft,
    };
    let update = doc! {
        "$set": { "state": ElectionState::Running },
    };
    let result = elections.update_one(filter, update, None).await?;

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    Ok(Json((result.modified_count, vec![election.into()])))
}

/// The only way into the terminal `Ended` state; permitted only while running.
#[post("/elections/<election_id>/end")]
pub async fn end_election(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    election_for_admin(&token, election_id, &elections).await?;

    let filter = doc! {
        "_id": election_id,
        "state": ElectionState::Running,
    };
    let update = doc! {
        "$set": { "state": ElectionState::Ended },
    };
    let result = elections.update_one(filter, update, None).await?;
    if result.modified_count != 1 {
        return Err(Error::Locked(format!(
            "Election {} is not running; only running elections can be ended",
            election_id
        )));
    }

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    Ok(Json(election.into()))
}

/// Check the launch preconditions: at least one question, at least two
/// options on every question, and at least one registered voter. Returns the
/// first unmet requirement, or `None` when ready.
async fn launch_blocker(
    election_id: Id,
    questions: &Coll<Question>,
    options: &Coll<PollOption>,
    voters: &Coll<Voter>,
) -> Result<Option<String>> {
    let question_list: Vec<Question> = questions
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;
    if question_list.is_empty() {
        return Ok(Some("the election has no questions".to_string()));
    }
    for question in &question_list {
        let option_count = options
            .count_documents(doc! { "question_id": question.id }, None)
            .await?;
        if option_count < 2 {
            return Ok(Some(format!(
                "question {} has fewer than two options",
                question.id
            )));
        }
    }
    let voter_count = voters
        .count_documents(doc! { "election_id": election_id }, None)
        .await?;
    if voter_count == 0 {
        return Ok(Some("the election has no registered voters".to_string()));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use mongodb::{bson::Document, Database};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client as LocalClient,
        serde::json::serde_json::{self, json},
    };

    use crate::{
        api::common::testing::{
            add_option, add_question, add_voter, create_election, launch, ready_election,
            xsrf_header,
        },
        model::{
            api::election::{OptionSpec, QuestionSpec, VoterSpec},
            mongodb::MongoCollection,
        },
    };

    use super::*;

    #[backend_test(admin)]
    async fn create_and_list(client: LocalClient, elections: Coll<Election>) {
        // No elections yet.
        let response = client.get(uri!(super::elections)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<ElectionDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(listed.is_empty());

        // Create two elections.
        let first = create_election(&client, &ElectionSpec::example()).await;
        let second = create_election(&client, &ElectionSpec::example2()).await;
        assert_eq!(first.name, ElectionSpec::example().name);
        assert_eq!(first.url_slug, ElectionSpec::example().url_slug);
        assert!(!first.running);
        assert!(!first.ended);

        // They are listed oldest-first, so the most recent is last.
        let response = client.get(uri!(super::elections)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<ElectionDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(listed, vec![first, second.clone()]);

        // The stored election is a draft.
        let stored = elections
            .find_one(second.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.state, ElectionState::Draft);
    }

    #[backend_test(admin)]
    async fn duplicate_slug_rejected(client: LocalClient, elections: Coll<Election>) {
        create_election(&client, &ElectionSpec::example()).await;

        // The same slug again is a conflict.
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .header(xsrf_header(&client).await)
            .body(json!(ElectionSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        let count = elections.count_documents(None, None).await.unwrap();
        assert_eq!(count, 1);

        // A different slug is fine.
        create_election(&client, &ElectionSpec::example2()).await;
    }

    #[backend_test(admin)]
    async fn empty_spec_rejected(client: LocalClient, elections: Coll<Election>) {
        for spec in [
            ElectionSpec {
                name: "".to_string(),
                url_slug: "slug".to_string(),
            },
            ElectionSpec {
                name: "Name".to_string(),
                url_slug: " ".to_string(),
            },
        ] {
            let response = client
                .post(uri!(create_election))
                .header(ContentType::JSON)
                .header(xsrf_header(&client).await)
                .body(json!(spec).to_string())
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status());
        }
        let count = elections.count_documents(None, None).await.unwrap();
        assert_eq!(count, 0);
    }

    #[backend_test(admin)]
    async fn launch_needs_preconditions(client: LocalClient, db: Database) {
        // A fresh election has no questions: preview redirects, launch fails.
        let election = create_election(&client, &ElectionSpec::example()).await;
        preview_expect_status(&client, election.id, Status::SeeOther).await;
        launch_expect_status(&client, election.id, Status::UnprocessableEntity).await;

        // One question with a single option is still not enough.
        let question = add_question(&client, election.id, &QuestionSpec::example()).await;
        add_option(&client, election.id, question.id, &OptionSpec::example()).await;
        preview_expect_status(&client, election.id, Status::SeeOther).await;
        launch_expect_status(&client, election.id, Status::UnprocessableEntity).await;

        // Two options but no voters: still not enough.
        add_option(&client, election.id, question.id, &OptionSpec::example2()).await;
        preview_expect_status(&client, election.id, Status::SeeOther).await;
        launch_expect_status(&client, election.id, Status::UnprocessableEntity).await;

        // None of the failed attempts may have mutated the state.
        let stored = get_election_by_id(&db, election.id).await;
        assert_eq!(stored.state, ElectionState::Draft);

        // With a voter as well, the preview opens and the launch succeeds.
        add_voter(&client, election.id, &VoterSpec::example()).await;
        let response = preview_expect_status(&client, election.id, Status::Ok).await;
        let preview: ElectionPreview = serde_json::from_str(&response).unwrap();
        assert_eq!(preview.election.id, election.id);
        assert_eq!(preview.questions.len(), 1);
        assert_eq!(preview.questions[0].options.len(), 2);
        assert_eq!(preview.voter_count, 1);

        let (modified, descriptions) = launch(&client, election.id).await;
        assert_eq!(modified, 1);
        assert!(descriptions[0].running);
    }

    #[backend_test(admin)]
    async fn launch_scenario(client: LocalClient, db: Database) {
        // Create the election and make it launchable.
        let election = create_election(&client, &ElectionSpec::example()).await;
        assert!(!election.running);
        let election = ready_election_from(&client, election).await;

        // Launch: the second element's first item is the running election.
        let (modified, descriptions) = launch(&client, election.id).await;
        assert_eq!(modified, 1);
        assert!(descriptions[0].running);
        assert!(!descriptions[0].ended);
        let stored = get_election_by_id(&db, election.id).await;
        assert_eq!(stored.state, ElectionState::Running);

        // Launching again is an idempotent no-op, not a second transition.
        let (modified, descriptions) = launch(&client, election.id).await;
        assert_eq!(modified, 0);
        assert!(descriptions[0].running);
    }

    #[backend_test(admin)]
    async fn end_is_terminal(client: LocalClient, db: Database) {
        let election = ready_election(&client).await;

        // A draft cannot be ended.
        end_expect_status(&client, election.id, Status::Conflict).await;

        launch(&client, election.id).await;
        end_expect_status(&client, election.id, Status::Ok).await;
        let stored = get_election_by_id(&db, election.id).await;
        assert_eq!(stored.state, ElectionState::Ended);

        // No transition leaves the ended state.
        end_expect_status(&client, election.id, Status::Conflict).await;
        launch_expect_status(&client, election.id, Status::Conflict).await;
        let stored = get_election_by_id(&db, election.id).await;
        assert_eq!(stored.state, ElectionState::Ended);
    }

    #[backend_test(admin)]
    async fn delete_cascades(client: LocalClient, db: Database) {
        let election = ready_election(&client).await;

        // Delete it: the election and everything it owns disappears.
        let success = delete(&client, election.id).await;
        assert!(success);
        assert_no_matches::<Election>(&db, election.id.as_doc()).await;
        let children = doc! { "election_id": election.id };
        assert_no_matches::<Question>(&db, children.clone()).await;
        assert_no_matches::<Voter>(&db, children).await;
        assert_eq!(
            count_matches::<PollOption>(&db, doc! {}).await,
            0,
            "options must be cascade-deleted with their questions"
        );

        // Deleting it again acknowledges false.
        let success = delete(&client, election.id).await;
        assert!(!success);
    }

    #[backend_test(admin)]
    async fn delete_running_election_refused(client: LocalClient, db: Database) {
        let election = ready_election(&client).await;
        launch(&client, election.id).await;

        // Running elections cannot be deleted...
        let success = delete(&client, election.id).await;
        assert!(!success);
        get_election_by_id(&db, election.id).await;

        // ...but ended ones can.
        end_expect_status(&client, election.id, Status::Ok).await;
        let success = delete(&client, election.id).await;
        assert!(success);
        assert_no_matches::<Election>(&db, election.id.as_doc()).await;
    }

    async fn ready_election_from(
        client: &LocalClient,
        election: ElectionDescription,
    ) -> ElectionDescription {
        let question = add_question(client, election.id, &QuestionSpec::example()).await;
        add_option(client, election.id, question.id, &OptionSpec::example()).await;
        add_option(client, election.id, question.id, &OptionSpec::example2()).await;
        add_voter(client, election.id, &VoterSpec::example()).await;
        election
    }

    async fn get_election_by_id(db: &Database, id: Id) -> Election {
        Coll::<Election>::from_db(db)
            .find_one(id.as_doc(), None)
            .await
            .unwrap()
            .unwrap()
    }

    async fn count_matches<T: MongoCollection>(db: &Database, filter: Document) -> u64 {
        Coll::<T>::from_db(db)
            .count_documents(filter, None)
            .await
            .unwrap()
    }

    async fn assert_no_matches<T: MongoCollection>(db: &Database, filter: Document) {
        let matches = count_matches::<T>(db, filter).await;
        assert_eq!(matches, 0);
    }

    async fn preview_expect_status(client: &LocalClient, id: Id, status: Status) -> String {
        let response = client.get(uri!(preview_election(id))).dispatch().await;
        assert_eq!(response.status(), status);
        response.into_string().await.unwrap_or_default()
    }

    async fn launch_expect_status(client: &LocalClient, id: Id, status: Status) {
        let response = client
            .put(uri!(launch_election(id)))
            .header(xsrf_header(client).await)
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
    }

    async fn end_expect_status(client: &LocalClient, id: Id, status: Status) {
        let response = client
            .post(uri!(end_election(id)))
            .header(xsrf_header(client).await)
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
    }

    async fn delete(client: &LocalClient, id: Id) -> bool {
        let response = client
            .delete(uri!(delete_election(id)))
            .header(xsrf_header(client).await)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let result: DeleteResult =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        result.success
    }
}
