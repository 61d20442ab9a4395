use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::{
    api::common::election_for_admin,
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, XsrfToken},
            election::{DeleteResult, VoterDescription, VoterSpec},
        },
        db::{
            admin::Admin,
            election::Election,
            voter::{NewVoter, Voter},
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![voters, create_voter, delete_voter]
}

/// The election's voter roster. Password hashes stay on the server.
#[get("/elections/<election_id>/voters")]
pub async fn voters(
    token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    voters: Coll<Voter>,
) -> Result<Json<Vec<VoterDescription>>> {
    election_for_admin(&token, election_id, &elections).await?;

    let find = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let list: Vec<Voter> = voters
        .find(doc! { "election_id": election_id }, find)
        .await?
        .try_collect()
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

/// Register a voter. Only possible while the election is a draft; the voter
/// ID must be unique within this election (other elections may reuse it).
#[post("/elections/<election_id>/voters", data = "<spec>", format = "json")]
pub async fn create_voter(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    spec: Json<VoterSpec>,
    elections: Coll<Election>,
    new_voters: Coll<NewVoter>,
    voters: Coll<Voter>,
) -> Result<Json<VoterDescription>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    if election.state.is_locked() {
        return Err(Error::Locked(format!(
            "Election {} is no longer a draft; voters cannot be added",
            election_id
        )));
    }

    // Check voter ID uniqueness within this election.
    let filter = doc! {
        "election_id": election_id,
        "voter_id": &spec.voter_id,
    };
    let existing = voters.find_one(filter, None).await?;
    if existing.is_some() {
        return Err(Error::Duplicate(format!(
            "Voter ID already registered for this election: {}",
            spec.voter_id
        )));
    }

    let voter: NewVoter = spec
        .0
        .into_voter(election_id)
        .map_err(|_| {
            Error::Validation(
                "Voter ID must be non-empty and the password long enough".to_string(),
            )
        })?;
    let new_id: Id = new_voters
        .insert_one(&voter, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();
    let voter = voters.find_one(new_id.as_doc(), None).await?.unwrap();
    Ok(Json(voter.into()))
}

/// Remove a voter from the roster, under the idempotent delete contract.
#[delete("/elections/<election_id>/voters/<voter_id>")]
pub async fn delete_voter(
    token: AuthToken<Admin>,
    _xsrf: XsrfToken,
    election_id: Id,
    voter_id: Id,
    elections: Coll<Election>,
    voters: Coll<Voter>,
) -> Result<Json<DeleteResult>> {
    let election = election_for_admin(&token, election_id, &elections).await?;
    if election.state.is_locked() {
        return Ok(Json(DeleteResult { success: false }));
    }

    let filter = doc! {
        "_id": voter_id,
        "election_id": election_id,
    };
    let result = voters.delete_one(filter, None).await?;
    Ok(Json(DeleteResult { success: result.deleted_count == 1 }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::{self, json},
    };

    use crate::{
        api::common::testing::{add_voter, create_election, ready_election, launch, xsrf_header},
        model::api::election::ElectionSpec,
    };

    use super::*;

    #[backend_test(admin)]
    async fn register_and_list(client: Client, voters: Coll<Voter>) {
        let election = create_election(&client, &ElectionSpec::example()).await;

        let first = add_voter(&client, election.id, &VoterSpec::example()).await;
        let second = add_voter(&client, election.id, &VoterSpec::example2()).await;
        assert_eq!(first.voter_id, VoterSpec::example().voter_id);
        assert!(!first.has_voted);

        // Listed oldest-first; the most recent is last.
        let response = client
            .get(uri!(super::voters(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<VoterDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(listed, vec![first, second.clone()]);

        // The password is stored hashed, never in the clear.
        let stored = voters
            .find_one(second.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, VoterSpec::example2().password);
        assert!(stored.verify_password(&VoterSpec::example2().password));
    }

    #[backend_test(admin)]
    async fn voter_ids_unique_per_election(client: Client) {
        let election = create_election(&client, &ElectionSpec::example()).await;
        add_voter(&client, election.id, &VoterSpec::example()).await;

        // The same voter ID in the same election is a conflict.
        let response = client
            .post(uri!(create_voter(election.id)))
            .header(ContentType::JSON)
            .header(xsrf_header(&client).await)
            .body(json!(VoterSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        // The same voter ID in a different election is fine.
        let other = create_election(&client, &ElectionSpec::example2()).await;
        add_voter(&client, other.id, &VoterSpec::example()).await;
    }

    #[backend_test(admin)]
    async fn double_delete_yields_true_then_false(client: Client) {
        let election = create_election(&client, &ElectionSpec::example()).await;
        let voter = add_voter(&client, election.id, &VoterSpec::example()).await;

        let success = delete_voter_request(&client, election.id, voter.id).await;
        assert!(success);
        let success = delete_voter_request(&client, election.id, voter.id).await;
        assert!(!success);
    }

    #[backend_test(admin)]
    async fn roster_is_frozen_after_launch(client: Client) {
        let election = ready_election(&client).await;
        let voter = add_voter(&client, election.id, &VoterSpec::example2()).await;
        launch(&client, election.id).await;

        // Adding a voter is refused outright.
        let response = client
            .post(uri!(create_voter(election.id)))
            .header(ContentType::JSON)
            .header(xsrf_header(&client).await)
            .body(
                json!(VoterSpec {
                    voter_id: "latecomer".to_string(),
                    password: "some password".to_string(),
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        // Deletes acknowledge false instead of deleting.
        let success = delete_voter_request(&client, election.id, voter.id).await;
        assert!(!success);
    }

    async fn delete_voter_request(client: &Client, election_id: Id, voter_id: Id) -> bool {
        let response = client
            .delete(uri!(delete_voter(election_id, voter_id)))
            .header(xsrf_header(client).await)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let result: DeleteResult =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        result.success
    }
}
