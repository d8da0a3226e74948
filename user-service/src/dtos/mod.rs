pub mod auth;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shape of every error body (see `service_core::error::ErrorBody`).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = false)]
    pub success: bool,
    #[schema(example = "Invalid credentials")]
    pub message: String,
}
