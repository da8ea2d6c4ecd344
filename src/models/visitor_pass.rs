use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Persisted pass status. `expired` only ever appears through explicit
/// writes by operators; the redemption path never stores it (expiry is
/// derived at read time, see [`VisitorPass::effective_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pass_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Active,
    Used,
    Expired,
    Revoked,
}

/// Display-time state of a pass, computed from the persisted row and a
/// caller-supplied clock. Precedence: revoked > used > expired > active.
/// The persisted `status` column can lag behind this (a pass past its
/// window keeps `status = active` until something writes to it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Active,
    Used,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VisitorPass {
    pub id: Uuid,
    pub property_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub code: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_uses: i32,
    pub used_count: i32,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub status: PassStatus,
    pub revoked_by: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePassData {
    pub property_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub code: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_uses: i32,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

impl VisitorPass {
    /// Creates a new pass with `used_count = 0` and `status = active`.
    /// Fails with a unique violation if the code is already taken.
    pub async fn create(pool: &PgPool, data: CreatePassData) -> Result<Self, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO visitor_passes (
                property_id, unit_id, code, starts_at, ends_at,
                max_uses, used_count, purpose, notes, status, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, 'active', $9)
            RETURNING *
            "#,
        )
        .bind(data.property_id)
        .bind(data.unit_id)
        .bind(&data.code)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(data.max_uses)
        .bind(&data.purpose)
        .bind(&data.notes)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        Ok(pass)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM visitor_passes WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM visitor_passes WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Lists passes for a property, newest first.
    pub async fn list_by_property(
        pool: &PgPool,
        property_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let passes = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM visitor_passes
            WHERE property_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(property_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(passes)
    }

    /// Consumes one use of the pass in a single guarded statement.
    ///
    /// The WHERE clause re-checks status, budget, and time window at the
    /// database, so two concurrent redemptions of a pass with one remaining
    /// use cannot both take effect: the second update matches no row and
    /// returns `None`. A redemption that exhausts the budget flips the
    /// status to `used` in the same statement.
    pub async fn redeem(
        pool: &PgPool,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            UPDATE visitor_passes
            SET used_count = used_count + 1,
                status = CASE WHEN used_count + 1 >= max_uses THEN 'used'::pass_status
                              ELSE status END,
                updated_at = now()
            WHERE id = $1
              AND status = 'active'
              AND used_count < max_uses
              AND $2 >= starts_at
              AND $2 <= ends_at
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Marks a pass as revoked, recording who revoked it. Returns `None`
    /// if the pass was already revoked (or does not exist).
    pub async fn revoke(
        pool: &PgPool,
        id: Uuid,
        revoked_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let pass = sqlx::query_as::<_, Self>(
            r#"
            UPDATE visitor_passes
            SET status = 'revoked', revoked_by = $2, updated_at = now()
            WHERE id = $1 AND status != 'revoked'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(revoked_by)
        .fetch_optional(pool)
        .await?;

        Ok(pass)
    }

    /// Computes the display-time state from the persisted row. Revocation
    /// wins over everything; an exhausted budget wins over the time window.
    pub fn effective_status(&self, now: DateTime<Utc>) -> EffectiveStatus {
        if self.status == PassStatus::Revoked {
            EffectiveStatus::Revoked
        } else if self.used_count >= self.max_uses || self.status == PassStatus::Used {
            EffectiveStatus::Used
        } else if now > self.ends_at {
            EffectiveStatus::Expired
        } else {
            EffectiveStatus::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pass(status: PassStatus, used_count: i32, max_uses: i32, ends_in: Duration) -> VisitorPass {
        let now = Utc::now();
        VisitorPass {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            unit_id: None,
            code: "ABC123".to_string(),
            starts_at: now - Duration::hours(1),
            ends_at: now + ends_in,
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
    fn effective_status_revoked_wins_over_everything() {
        let p = pass(PassStatus::Revoked, 5, 5, Duration::hours(-2));
        assert_eq!(p.effective_status(Utc::now()), EffectiveStatus::Revoked);
    }

    #[test]
    fn effective_status_exhausted_wins_over_expired() {
        let p = pass(PassStatus::Active, 3, 3, Duration::hours(-2));
        assert_eq!(p.effective_status(Utc::now()), EffectiveStatus::Used);
    }

    #[test]
    fn effective_status_expired_despite_persisted_active() {
        // A pass past its window keeps status = active in the database
        // until something writes to it; the display state must not trust it.
        let p = pass(PassStatus::Active, 0, 3, Duration::hours(-2));
        assert_eq!(p.status, PassStatus::Active);
        assert_eq!(p.effective_status(Utc::now()), EffectiveStatus::Expired);
    }

    #[test]
    fn effective_status_active_within_window_and_budget() {
        let p = pass(PassStatus::Active, 2, 3, Duration::hours(2));
        assert_eq!(p.effective_status(Utc::now()), EffectiveStatus::Active);
    }
}
