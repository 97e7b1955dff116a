pub mod auth;
pub mod cards;
pub mod collections;

use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Parse a path segment as a UUID, naming the segment in the error.
pub(crate) fn parse_id(name: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} '{}'", name, raw)))
}
