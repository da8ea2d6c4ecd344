use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Units belong to the wider management application; read-only here, used
/// to check that an optional `unit_id` on a pass belongs to the pass's
/// property.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub property_id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl Unit {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let unit = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM units WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(unit)
    }
}
