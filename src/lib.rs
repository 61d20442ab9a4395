#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

/// Assemble the server: routes, catchers, and the fairings that load the
/// config and bring the database online.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(logging::RequestLogger)
}

/// Test setup: connect to the database server configured in `Rocket.toml`.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::build()
        .figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to the test database")
}

/// Test setup: a random database name, so parallel tests never collide.
#[cfg(test)]
pub(crate) fn test_database_name() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Test setup: a server instance bound to the given throwaway database,
/// skipping the database fairing that would otherwise pick the name itself.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db)
        .await
        .expect("Failed to create indexes");
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(config::ConfigFairing)
        .attach(logging::RequestLogger)
        .manage(client)
        .manage(db)
}
