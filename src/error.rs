use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while handling a request.
///
/// Note that a failed delete is *not* an error: delete endpoints swallow
/// not-found into a `{success: false}` body to stay idempotent.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unacceptable input.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// Uniqueness violation: slug or voter ID already taken.
    #[error("Already exists: {0}")]
    Duplicate(String),
    /// Structural mutation attempted while the election is not a draft.
    #[error("Election locked: {0}")]
    Locked(String),
    /// Launch requirements unmet.
    #[error("Not ready to launch: {0}")]
    NotReady(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    OidParse(#[from] mongodb::bson::oid::Error),
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        warn!("{self}");
        Err(match self {
            Self::Validation(_) | Self::OidParse(_) => Status::BadRequest,
            Self::Duplicate(_) | Self::Locked(_) => Status::Conflict,
            Self::NotReady(_) => Status::UnprocessableEntity,
            Self::NotFound(_) => Status::NotFound,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.into_kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
                | jsonwebtoken::errors::ErrorKind::ImmatureSignature => Status::Unauthorized,
                _ => Status::BadRequest,
            },
        })
    }
}
