use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use rand::Rng;
use rocket::{
    http::{Cookie, CookieJar, SameSite, Status},
    request::{FromRequest, Outcome},
    Request, State,
};
use sha2::Sha256;

use crate::config::Config;
use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// Private cookie holding the random per-session anti-forgery seed.
pub const XSRF_COOKIE: &str = "xsrf_session";

/// Header carrying the anti-forgery token on every state-changing request.
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

/// An anti-forgery token: the keyed HMAC of a per-session random seed.
///
/// The seed lives in a private cookie, so a forged cross-site request can
/// neither read it nor fabricate a matching token. As a request guard this
/// type only succeeds if the presented header matches the session's seed;
/// any mismatch is rejected with 403 before the handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsrfToken(String);

impl XsrfToken {
    /// Issue the token for the current session, minting a session seed if
    /// there isn't one yet.
    pub fn issue(cookies: &CookieJar<'_>, config: &Config) -> Self {
        let seed = match cookies.get_private(XSRF_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => {
                let seed = Self::random_seed();
                let cookie = Cookie::build(XSRF_COOKIE, seed.clone())
                    .http_only(true)
                    .same_site(SameSite::Strict)
                    .finish();
                cookies.add_private(cookie);
                seed
            }
        };
        Self::derive(&seed, config)
    }

    /// Derive the token for a given session seed.
    pub fn derive(seed: &str, config: &Config) -> Self {
        // Unwrap safe because HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(config.hmac_secret()).unwrap();
        mac.update(seed.as_bytes());
        Self(BASE64URL_NOPAD.encode(&mac.finalize().into_bytes()))
    }

    fn random_seed() -> String {
        let mut seed = [0_u8; 16];
        rand::thread_rng().fill(&mut seed);
        BASE64URL_NOPAD.encode(&seed)
    }

    /// The encoded token value, as sent to and expected from the client.
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for XsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for XsrfToken {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let seed = match req.cookies().get_private(XSRF_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => {
                return Outcome::Failure((
                    Status::Forbidden,
                    Error::Forbidden("No anti-forgery session".to_string()),
                ));
            }
        };

        let presented = match req.headers().get_one(XSRF_HEADER) {
            Some(header) => header.to_string(),
            None => {
                return Outcome::Failure((
                    Status::Forbidden,
                    Error::Forbidden(format!("Missing {XSRF_HEADER} header")),
                ));
            }
        };

        // Constant-time comparison via HMAC verification.
        let mut mac = HmacSha256::new_from_slice(config.hmac_secret()).unwrap();
        mac.update(seed.as_bytes());
        let presented_bytes = match BASE64URL_NOPAD.decode(presented.as_bytes()) {
            Ok(bytes) => bytes,
            Err(_) => {
                return Outcome::Failure((
                    Status::Forbidden,
                    Error::Forbidden("Malformed anti-forgery token".to_string()),
                ));
            }
        };
        match mac.verify_slice(&presented_bytes) {
            Ok(()) => Outcome::Success(Self(presented)),
            Err(_) => Outcome::Failure((
                Status::Forbidden,
                Error::Forbidden("Anti-forgery token mismatch".to_string()),
            )),
        }
    }
}

/// Test helper: obtain a valid token for a local client's session.
#[cfg(test)]
impl XsrfToken {
    pub async fn fetch(client: &rocket::local::asynchronous::Client) -> String {
        let response = client.get("/auth/xsrf").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        rocket::serde::json::serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }
}
