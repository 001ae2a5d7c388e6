use harvest_auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("vendor not found: {0}")]
    NotFound(String),

    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// The caller's role flags do not allow this action.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("cannot move vendor {id} from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("vendor store request failed: {0}")]
    Backend(String),

    #[error("vendor store error: {0}")]
    Storage(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
