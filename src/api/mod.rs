use rocket::{response::Redirect, Catcher, Route};

mod auth;
mod common;
mod elections;
mod questions;
mod voters;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(elections::routes());
    routes.extend(questions::routes());
    routes.extend(voters::routes());
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![unauthorized]
}

/// Unauthenticated callers are redirected to the sign-in route instead of
/// being shown a raw error.
#[catch(401)]
fn unauthorized() -> Redirect {
    Redirect::to(uri!(auth::login_required))
}
