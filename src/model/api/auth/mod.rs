mod token;
mod user;
mod xsrf;

pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Rights, User};
pub use xsrf::{XsrfToken, XSRF_COOKIE, XSRF_HEADER};
