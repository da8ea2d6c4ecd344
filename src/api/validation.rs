use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::passes::PassResponse;
use crate::api::AppState;
use crate::error::Result;
use crate::models::visitor_event::ValidationResult;
use crate::services::pass_validator;

#[derive(Debug, Deserialize)]
pub struct ValidateCodeBody {
    pub code: String,
    pub validated_by: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ValidateCodeResponse {
    pub result: ValidationResult,
    pub access_granted: bool,
    pub message: String,
    /// Absent when the code matched no pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<PassResponse>,
}

fn display_message(result: ValidationResult) -> String {
    if result.is_success() {
        "Access granted!".to_string()
    } else {
        format!("Access denied: {}", result.as_str().replace('_', " "))
    }
}

/// Validates a code typed by a security operator and redeems one use when
/// the pass permits it. Denials are 200 responses carrying the result;
/// only store failures surface as errors.
async fn validate_code(
    State(state): State<AppState>,
    Json(body): Json<ValidateCodeBody>,
) -> Result<Json<ValidateCodeResponse>> {
    let now = Utc::now();
    let code = body.code.trim().to_uppercase();

    let outcome =
        pass_validator::validate_and_redeem(&state.pool, &code, body.validated_by, now).await?;

    Ok(Json(ValidateCodeResponse {
        result: outcome.result,
        access_granted: outcome.result.is_success(),
        message: display_message(outcome.result),
        pass: outcome.pass.map(|p| PassResponse::new(p, now)),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/validate", post(validate_code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_render_underscores_as_spaces() {
        assert_eq!(
            display_message(ValidationResult::Success),
            "Access granted!"
        );
        assert_eq!(
            display_message(ValidationResult::MaxUsesExceeded),
            "Access denied: max uses exceeded"
        );
        assert_eq!(
            display_message(ValidationResult::OutsideTimeWindow),
            "Access denied: outside time window"
        );
        assert_eq!(
            display_message(ValidationResult::Invalid),
            "Access denied: invalid"
        );
    }
}
