//! Domain error taxonomy.
//!
//! Rejected operations are recoverable for the caller: a missing record or
//! an action against a battle in the wrong state comes back as a structured
//! rejection, never a panic. Catalog validation failures are different:
//! fatal at startup, and live in [`crate::catalog::CatalogError`].

use either::{Either, Left, Right};
use rocket::response::status::{BadRequest, NotFound};
use rocket::serde::json::Json;

use crate::status_messages::{new_status, Status};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Battle, card, or player absent. Callers should check before acting.
    #[error("{0}")]
    NotFound(String),
    /// Acting on a non-Active battle, placing into a full faction, blank
    /// player names and similar rejected actions.
    #[error("{0}")]
    InvalidState(String),
    /// A store record that cannot be decoded, or a state write that failed.
    #[error("{0}")]
    Storage(String),
}

impl GameError {
    pub fn not_found(what: impl Into<String>) -> Self {
        GameError::NotFound(what.into())
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        GameError::InvalidState(reason.into())
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        GameError::Storage(reason.into())
    }
}

impl From<String> for GameError {
    fn from(msg: String) -> Self {
        GameError::Storage(msg)
    }
}

/// The rejection shape every endpoint returns: 404 for NotFound,
/// everything else 400, both carrying a `Status` JSON body.
pub type ApiRejection = Either<NotFound<Json<Status>>, BadRequest<Json<Status>>>;

pub fn to_rejection(err: GameError) -> ApiRejection {
    match err {
        GameError::NotFound(msg) => Left(NotFound(new_status(msg))),
        GameError::InvalidState(msg) | GameError::Storage(msg) => {
            Right(BadRequest(new_status(msg)))
        }
    }
}
