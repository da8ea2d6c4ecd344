use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    property::Property,
    unit::Unit,
    visitor_pass::{CreatePassData, VisitorPass},
};
use crate::services::code_generator::CodeGenerator;

/// Codes are drawn from a large space, so colliding with an existing pass
/// is rare; a handful of retries is plenty before giving up.
const MAX_CODE_ATTEMPTS: u32 = 5;

#[derive(thiserror::Error, Debug)]
pub enum IssuanceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("max_uses must be at least 1")]
    InvalidMaxUses,

    #[error("starts_at must be before ends_at")]
    InvalidWindow,

    #[error("Property not found")]
    PropertyNotFound,

    #[error("Unit not found on this property")]
    UnitNotFound,

    #[error("Could not generate a unique code after {MAX_CODE_ATTEMPTS} attempts")]
    CodeSpaceExhausted,
}

/// Request to issue a new visitor pass
#[derive(Debug, Clone)]
pub struct IssuePassRequest {
    pub property_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_uses: i32,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

impl IssuePassRequest {
    /// Field-level checks that need no database access.
    pub fn validate(&self) -> Result<(), IssuanceError> {
        if self.max_uses < 1 {
            return Err(IssuanceError::InvalidMaxUses);
        }
        if self.starts_at >= self.ends_at {
            return Err(IssuanceError::InvalidWindow);
        }
        Ok(())
    }
}

/// Issues a new visitor pass.
///
/// 1. Validates the request fields
/// 2. Resolves the property (and unit, when given) the pass is scoped to
/// 3. Generates a code and persists the pass, retrying generation when the
///    code collides with an existing pass
#[tracing::instrument(skip(pool, generator, request), fields(property_id = %request.property_id))]
pub async fn issue_pass(
    pool: &PgPool,
    generator: &dyn CodeGenerator,
    request: IssuePassRequest,
) -> Result<VisitorPass, IssuanceError> {
    request.validate()?;

    let property = Property::find_by_id(pool, request.property_id)
        .await?
        .ok_or(IssuanceError::PropertyNotFound)?;

    if let Some(unit_id) = request.unit_id {
        let unit = Unit::find_by_id(pool, unit_id)
            .await?
            .ok_or(IssuanceError::UnitNotFound)?;
        if unit.property_id != property.id {
            tracing::warn!(
                unit_id = %unit_id,
                unit_property_id = %unit.property_id,
                "Unit belongs to a different property"
            );
            return Err(IssuanceError::UnitNotFound);
        }
    }

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = generator.generate();

        let result = VisitorPass::create(
            pool,
            CreatePassData {
                property_id: request.property_id,
                unit_id: request.unit_id,
                code,
                starts_at: request.starts_at,
                ends_at: request.ends_at,
                max_uses: request.max_uses,
                purpose: request.purpose.clone(),
                notes: request.notes.clone(),
                created_by: request.created_by,
            },
        )
        .await;

        match result {
            Ok(pass) => {
                tracing::info!(pass_id = %pass.id, code = %pass.code, "Visitor pass issued");
                return Ok(pass);
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!(attempt, "Code collision, regenerating");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(IssuanceError::CodeSpaceExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(max_uses: i32, window: Duration) -> IssuePassRequest {
        let now = Utc::now();
        IssuePassRequest {
            property_id: Uuid::new_v4(),
            unit_id: None,
            starts_at: now,
            ends_at: now + window,
            max_uses,
            purpose: Some("Delivery".to_string()),
            notes: None,
            created_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn rejects_non_positive_max_uses() {
        assert!(matches!(
            request(0, Duration::hours(4)).validate(),
            Err(IssuanceError::InvalidMaxUses)
        ));
        assert!(matches!(
            request(-3, Duration::hours(4)).validate(),
            Err(IssuanceError::InvalidMaxUses)
        ));
    }

    #[test]
    fn rejects_inverted_or_empty_window() {
        assert!(matches!(
            request(1, Duration::hours(-1)).validate(),
            Err(IssuanceError::InvalidWindow)
        ));
        assert!(matches!(
            request(1, Duration::zero()).validate(),
            Err(IssuanceError::InvalidWindow)
        ));
    }

    #[test]
    fn accepts_valid_request() {
        assert!(request(1, Duration::hours(4)).validate().is_ok());
    }
}
