use std::collections::HashSet;

use mongodb::{bson::doc, Client};
use rocket::{
    futures::TryStreamExt, http::CookieJar, serde::json::Json, Route, State,
};

use crate::{
    api::common::question_details,
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, XsrfToken},
            ballot::{BallotPaper, BallotReceipt, BallotSpec, VoterCredentials},
        },
        db::{
            election::{Election, ElectionState},
            option::PollOption,
            question::Question,
            vote::NewVote,
            voter::Voter,
        },
        mongodb::{Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![voter_login, ballot_paper, cast_ballot]
}

/// Voter sign-in for a running election: issue the session cookie.
///
/// Draft elections are invisible to voters, and ended elections no longer
/// accept sign-ins.
#[post("/vote/<election_id>/auth", data = "<credentials>", format = "json")]
pub async fn voter_login(
    _xsrf: XsrfToken,
    cookies: &CookieJar<'_>,
    election_id: Id,
    credentials: Json<VoterCredentials>,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    config: &State<Config>,
) -> Result<()> {
    let election = open_election(election_id, &elections).await?;

    let filter = doc! {
        "election_id": election.id,
        "voter_id": &credentials.voter_id,
    };
    let voter = voters
        .find_one(filter, None)
        .await?
        .filter(|voter| voter.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Unauthorized(
                "No voter found with the provided ID and password combination".to_string(),
            )
        })?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config));

    Ok(())
}

/// The ballot paper for the signed-in voter: every question with its options.
#[get("/vote/<election_id>")]
pub async fn ballot_paper(
    token: AuthToken<Voter>,
    election_id: Id,
    elections: Coll<Election>,
    questions: Coll<Question>,
    options: Coll<PollOption>,
    voters: Coll<Voter>,
) -> Result<Json<BallotPaper>> {
    voter_for_election(&token, election_id, &voters).await?;
    let election = open_election(election_id, &elections).await?;

    let question_list = question_details(election_id, &questions, &options).await?;
    Ok(Json(BallotPaper {
        election: election.into(),
        questions: question_list,
    }))
}

/// Record the voter's ballot: exactly one selection per question, each
/// option belonging to its question. The votes and the `has_voted` flag are
/// written in one transaction, so a ballot is either fully recorded or not
/// at all.
#[post("/vote/<election_id>", data = "<ballot>", format = "json")]
pub async fn cast_ballot(
    token: AuthToken<Voter>,
    _xsrf: XsrfToken,
    election_id: Id,
    ballot: Json<BallotSpec>,
    elections: Coll<Election>,
    questions: Coll<Question>,
    options: Coll<PollOption>,
    voters: Coll<Voter>,
    new_votes: Coll<NewVote>,
    db_client: &State<Client>,
) -> Result<Json<BallotReceipt>> {
    let voter = voter_for_election(&token, election_id, &voters).await?;
    open_election(election_id, &elections).await?;

    if voter.has_voted {
        return Err(Error::Forbidden(
            "This voter has already cast their ballot".to_string(),
        ));
    }

    // The ballot must answer every question of the election exactly once.
    let question_list: Vec<Question> = questions
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;
    if ballot.selections.len() != question_list.len() {
        return Err(Error::Validation(format!(
            "Ballot must answer all {} questions",
            question_list.len()
        )));
    }
    let mut answered = HashSet::new();
    for selection in &ballot.selections {
        if !answered.insert(selection.question) {
            return Err(Error::Validation(format!(
                "Question {} answered more than once",
                selection.question
            )));
        }
        if !question_list.iter().any(|q| q.id == selection.question) {
            return Err(Error::Validation(format!(
                "Question {} is not part of this election",
                selection.question
            )));
        }
        let option_filter = doc! {
            "_id": selection.option,
            "question_id": selection.question,
        };
        if options.find_one(option_filter, None).await?.is_none() {
            return Err(Error::Validation(format!(
                "Option {} does not belong to question {}",
                selection.option, selection.question
            )));
        }
    }

    let votes: Vec<NewVote> = ballot
        .selections
        .iter()
        .map(|selection| NewVote {
            election_id,
            question_id: selection.question,
            option_id: selection.option,
            voter_id: voter.id,
        })
        .collect();

    // Atomically record the ballot and mark the voter as having voted.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        new_votes
            .insert_many_with_session(&votes, None, &mut session)
            .await?;
        // Filtering on `has_voted` closes the race between two concurrent
        // casts from the same voter: only one can flip the flag.
        let filter = doc! {
            "_id": voter.id,
            "has_voted": false,
        };
        let update = doc! {
            "$set": { "has_voted": true },
        };
        let result = voters
            .update_one_with_session(filter, update, None, &mut session)
            .await?;
        if result.modified_count != 1 {
            session.abort_transaction().await?;
            return Err(Error::Forbidden(
                "This voter has already cast their ballot".to_string(),
            ));
        }

        session.commit_transaction().await?;
    }

    Ok(Json(BallotReceipt {
        election_id,
        answers_recorded: votes.len(),
    }))
}

/// Look up a running election. Drafts are invisible here; ended elections
/// are closed.
async fn open_election(election_id: Id, elections: &Coll<Election>) -> Result<Election> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .filter(|election| election.state != ElectionState::Draft)
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    if !election.state.is_running() {
        return Err(Error::Locked(format!(
            "Election {} has ended; voting is closed",
            election_id
        )));
    }
    Ok(election)
}

/// Check the signed-in voter belongs to the given election.
async fn voter_for_election(
    token: &AuthToken<Voter>,
    election_id: Id,
    voters: &Coll<Voter>,
) -> Result<Voter> {
    voters
        .find_one(token.id.as_doc(), None)
        .await?
        .filter(|voter| voter.election_id == election_id)
        .ok_or_else(|| {
            Error::Unauthorized("Voter is not registered for this election".to_string())
        })
}
