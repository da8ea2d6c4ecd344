use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    visitor_event::{CreateVisitorEventData, ValidationResult, VisitorEvent},
    visitor_pass::{PassStatus, VisitorPass},
};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Pure decision over a found pass, first matching rule wins. Takes the
/// clock as a parameter; nothing in here reads system time or the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub result: ValidationResult,
    pub can_redeem: bool,
}

pub fn decide(pass: &VisitorPass, now: DateTime<Utc>) -> Decision {
    if pass.status == PassStatus::Revoked {
        Decision {
            result: ValidationResult::Invalid,
            can_redeem: false,
        }
    } else if now < pass.starts_at || now > pass.ends_at {
        Decision {
            result: ValidationResult::OutsideTimeWindow,
            can_redeem: false,
        }
    } else if pass.used_count >= pass.max_uses {
        Decision {
            result: ValidationResult::MaxUsesExceeded,
            can_redeem: false,
        }
    } else {
        Decision {
            result: ValidationResult::Success,
            can_redeem: true,
        }
    }
}

/// Maps the outcome of the guarded update onto the final result. The
/// update matching no row means a concurrent attempt consumed the
/// remaining budget between our read and write, so the original pass is
/// kept and the result downgrades to `max_uses_exceeded`.
fn finalize_redemption(
    pass: VisitorPass,
    redeemed: Option<VisitorPass>,
) -> (ValidationResult, VisitorPass) {
    match redeemed {
        Some(updated) => (ValidationResult::Success, updated),
        None => (ValidationResult::MaxUsesExceeded, pass),
    }
}

/// What a validation attempt produced. `pass` is `None` only when the code
/// matched nothing; every found-pass attempt carries the (possibly updated)
/// pass and leaves exactly one audit event behind.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub result: ValidationResult,
    pub pass: Option<VisitorPass>,
}

/// Validates a visitor code and redeems one use when permitted.
///
/// This function:
/// 1. Looks up the pass by code
/// 2. Runs the pure decision against the supplied clock
/// 3. On a positive decision, consumes one use via the guarded update in
///    [`VisitorPass::redeem`]; if that update matched no row, another
///    validation won the last use and the result downgrades to
///    `max_uses_exceeded`
/// 4. Records one audit event carrying the final result
///
/// Unknown codes return `invalid` with no audit event: the event row
/// references a pass, so mistyped codes leave no trail. Operators who want
/// that trail need a separate log; the decision result alone does not
/// distinguish "no such code" from "revoked".
#[tracing::instrument(skip(pool, code), fields(validated_by = %validated_by))]
pub async fn validate_and_redeem(
    pool: &PgPool,
    code: &str,
    validated_by: Uuid,
    now: DateTime<Utc>,
) -> Result<ValidationOutcome, ValidationError> {
    let pass = match VisitorPass::find_by_code(pool, code).await? {
        Some(p) => p,
        None => {
            tracing::info!("No pass matches the entered code");
            return Ok(ValidationOutcome {
                result: ValidationResult::Invalid,
                pass: None,
            });
        }
    };

    tracing::debug!(
        pass_id = %pass.id,
        status = ?pass.status,
        used_count = pass.used_count,
        max_uses = pass.max_uses,
        "Found pass for code"
    );

    let decision = decide(&pass, now);

    let (result, pass) = if decision.can_redeem {
        let redeemed = VisitorPass::redeem(pool, pass.id, now).await?;
        let (result, pass) = finalize_redemption(pass, redeemed);
        match result {
            ValidationResult::Success => tracing::info!(
                pass_id = %pass.id,
                used_count = pass.used_count,
                status = ?pass.status,
                "Pass redeemed"
            ),
            _ => tracing::info!(pass_id = %pass.id, "Lost redemption race"),
        }
        (result, pass)
    } else {
        tracing::info!(pass_id = %pass.id, result = decision.result.as_str(), "Validation denied");
        (decision.result, pass)
    };

    // The event is written after the redemption attempt so its result always
    // matches what the caller is told. If this insert fails the attempt has
    // already taken effect; surface the error rather than unwinding it.
    if let Err(e) = VisitorEvent::create(
        pool,
        CreateVisitorEventData {
            visitor_pass_id: pass.id,
            validated_by,
            result,
            created_at: now,
        },
    )
    .await
    {
        tracing::error!(
            pass_id = %pass.id,
            result = result.as_str(),
            error = %e,
            "Audit event insert failed after validation attempt"
        );
        return Err(e.into());
    }

    Ok(ValidationOutcome {
        result,
        pass: Some(pass),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pass(status: PassStatus, used_count: i32, max_uses: i32) -> VisitorPass {
        let now = Utc::now();
        VisitorPass {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            unit_id: None,
            code: "XK42PM".to_string(),
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            max_uses,
            used_count,
            purpose: None,
            notes: None,
            status,
            revoked_by: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn grants_active_pass_within_window_and_budget() {
        let p = pass(PassStatus::Active, 0, 1);
        let d = decide(&p, Utc::now());
        assert_eq!(d.result, ValidationResult::Success);
        assert!(d.can_redeem);
    }

    #[test]
    fn revoked_pass_is_invalid_regardless_of_window_and_budget() {
        let p = pass(PassStatus::Revoked, 0, 5);
        let d = decide(&p, Utc::now());
        assert_eq!(d.result, ValidationResult::Invalid);
        assert!(!d.can_redeem);
    }

    #[test]
    fn pass_before_window_is_outside_time_window() {
        let mut p = pass(PassStatus::Active, 0, 5);
        p.starts_at = Utc::now() + Duration::days(1);
        p.ends_at = Utc::now() + Duration::days(2);
        let d = decide(&p, Utc::now());
        assert_eq!(d.result, ValidationResult::OutsideTimeWindow);
        assert!(!d.can_redeem);
    }

    #[test]
    fn pass_after_window_is_outside_time_window_even_with_budget_left() {
        let mut p = pass(PassStatus::Active, 0, 5);
        p.starts_at = Utc::now() - Duration::days(2);
        p.ends_at = Utc::now() - Duration::days(1);
        let d = decide(&p, Utc::now());
        assert_eq!(d.result, ValidationResult::OutsideTimeWindow);
        assert!(!d.can_redeem);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let p = pass(PassStatus::Active, 0, 1);
        assert_eq!(decide(&p, p.starts_at).result, ValidationResult::Success);
        assert_eq!(decide(&p, p.ends_at).result, ValidationResult::Success);
    }

    #[test]
    fn exhausted_pass_is_max_uses_exceeded() {
        let p = pass(PassStatus::Active, 1, 1);
        let d = decide(&p, Utc::now());
        assert_eq!(d.result, ValidationResult::MaxUsesExceeded);
        assert!(!d.can_redeem);
    }

    #[test]
    fn over_counted_pass_still_denies() {
        // used_count above max_uses cannot happen through the guarded
        // update, but the decision must hold even for hand-edited rows.
        let p = pass(PassStatus::Active, 3, 1);
        assert_eq!(
            decide(&p, Utc::now()).result,
            ValidationResult::MaxUsesExceeded
        );
    }

    #[test]
    fn window_check_outranks_budget_check() {
        let mut p = pass(PassStatus::Active, 1, 1);
        p.starts_at = Utc::now() + Duration::hours(1);
        p.ends_at = Utc::now() + Duration::hours(2);
        assert_eq!(
            decide(&p, Utc::now()).result,
            ValidationResult::OutsideTimeWindow
        );
    }

    #[test]
    fn revocation_outranks_window_check() {
        let mut p = pass(PassStatus::Revoked, 0, 1);
        p.starts_at = Utc::now() + Duration::hours(1);
        p.ends_at = Utc::now() + Duration::hours(2);
        assert_eq!(decide(&p, Utc::now()).result, ValidationResult::Invalid);
    }

    #[test]
    fn redemption_that_exhausts_the_budget_flips_status_in_the_same_update() {
        let before = pass(PassStatus::Active, 0, 1);
        let mut after = before.clone();
        after.used_count = 1;
        after.status = PassStatus::Used;

        let (result, returned) = finalize_redemption(before, Some(after));
        assert_eq!(result, ValidationResult::Success);
        assert_eq!(returned.used_count, 1);
        assert_eq!(returned.status, PassStatus::Used);
    }

    #[test]
    fn lost_race_downgrades_to_max_uses_exceeded_without_mutation() {
        // Two validations read the same pass with one use left; only one
        // guarded update takes effect. The loser sees no updated row.
        let before = pass(PassStatus::Active, 0, 1);
        let id = before.id;

        let (result, returned) = finalize_redemption(before, None);
        assert_eq!(result, ValidationResult::MaxUsesExceeded);
        assert_eq!(returned.id, id);
        assert_eq!(returned.used_count, 0);
        assert_eq!(returned.status, PassStatus::Active);
    }

    #[tokio::test]
    #[ignore = "needs a running Postgres; set DATABASE_URL and run the migrations"]
    async fn unknown_code_returns_invalid_with_no_pass() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let pool = sqlx::PgPool::connect(&url).await.unwrap();

        // A UUID string can never collide with a generated 6-char code.
        let code = Uuid::new_v4().to_string();
        let outcome = validate_and_redeem(&pool, &code, Uuid::new_v4(), Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.result, ValidationResult::Invalid);
        // No pass means nothing to hang an audit event off: mistyped codes
        // leave no trail. Arguably a defect inherited from the observed
        // behavior; kept as-is and documented on validate_and_redeem.
        assert!(outcome.pass.is_none());
    }
}
