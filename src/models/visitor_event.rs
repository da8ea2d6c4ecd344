use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Outcome of a validation attempt. Negative outcomes are normal results
/// of the decision, not errors; they are persisted verbatim on the audit
/// event and returned to the caller for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "validation_result", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValidationResult {
    Success,
    Invalid,
    OutsideTimeWindow,
    MaxUsesExceeded,
}

impl ValidationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationResult::Success => "success",
            ValidationResult::Invalid => "invalid",
            ValidationResult::OutsideTimeWindow => "outside_time_window",
            ValidationResult::MaxUsesExceeded => "max_uses_exceeded",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Success)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VisitorEvent {
    pub id: Uuid,
    pub visitor_pass_id: Uuid,
    pub validated_by: Uuid,
    pub result: ValidationResult,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateVisitorEventData {
    pub visitor_pass_id: Uuid,
    pub validated_by: Uuid,
    pub result: ValidationResult,
    pub created_at: DateTime<Utc>,
}

impl VisitorEvent {
    /// Appends an audit event. Events are insert-only; nothing in the
    /// service ever updates or deletes them.
    pub async fn create(
        pool: &PgPool,
        data: CreateVisitorEventData,
    ) -> Result<Self, sqlx::Error> {
        let event = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO visitor_events (visitor_pass_id, validated_by, result, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.visitor_pass_id)
        .bind(data.validated_by)
        .bind(data.result)
        .bind(data.created_at)
        .fetch_one(pool)
        .await?;

        Ok(event)
    }

    /// Lists validation attempts for a pass, newest first.
    pub async fn list_by_pass(
        pool: &PgPool,
        visitor_pass_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM visitor_events
            WHERE visitor_pass_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(visitor_pass_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }

    /// Counts validation attempts for a pass, optionally filtered by result.
    pub async fn count_by_pass_and_result(
        pool: &PgPool,
        visitor_pass_id: Uuid,
        result: Option<ValidationResult>,
    ) -> Result<i64, sqlx::Error> {
        let count = if let Some(result) = result {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM visitor_events
                WHERE visitor_pass_id = $1 AND result = $2
                "#,
            )
            .bind(visitor_pass_id)
            .bind(result)
            .fetch_one(pool)
            .await?
        } else {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM visitor_events
                WHERE visitor_pass_id = $1
                "#,
            )
            .bind(visitor_pass_id)
            .fetch_one(pool)
            .await?
        };

        Ok(count)
    }
}
