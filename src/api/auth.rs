use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::{AdminCredentials, AdminSignup},
            auth::{AuthToken, XsrfToken, AUTH_TOKEN_COOKIE},
        },
        db::admin::{Admin, NewAdmin},
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![signup, authenticate, xsrf, logout, login_required]
}

/// Public admin signup.
#[post("/admins", data = "<new_admin>", format = "json")]
pub async fn signup(
    _xsrf: XsrfToken,
    new_admin: Json<AdminSignup>,
    admins: Coll<NewAdmin>,
) -> Result<()> {
    // Check email uniqueness.
    let filter = doc! {
        "email": &new_admin.email,
    };
    let existing = admins.find_one(filter, None).await?;
    if existing.is_some() {
        return Err(Error::Duplicate(format!(
            "Email already in use: {}",
            new_admin.email
        )));
    }

    // Create and insert the admin.
    let admin: NewAdmin = new_admin
        .0
        .try_into()
        .map_err(|_| Error::Validation("Illegal signup credentials".to_string()))?;
    admins.insert_one(admin, None).await?;
    Ok(())
}

/// Admin sign-in: issue the session cookie.
#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    _xsrf: XsrfToken,
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let with_email = doc! {
        "email": &credentials.email,
    };

    let admin = admins
        .find_one(with_email, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Unauthorized(
                "No admin found with the provided email and password combination".to_string(),
            )
        })?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config));

    Ok(())
}

/// Issue the anti-forgery token for the current session. Every state-changing
/// request must echo it back in the `X-XSRF-TOKEN` header.
#[get("/auth/xsrf")]
pub fn xsrf(cookies: &CookieJar<'_>, config: &State<Config>) -> Json<String> {
    Json(XsrfToken::issue(cookies, config).value().to_string())
}

/// Sign out: the session cookie is removed, so nothing can authenticate
/// with it any more.
#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

/// Where unauthenticated callers end up (see the 401 catcher).
#[get("/auth/login")]
pub fn login_required() -> Json<&'static str> {
    Json("Authentication required")
}
