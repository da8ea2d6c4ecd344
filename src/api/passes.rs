use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{
    visitor_event::{ValidationResult, VisitorEvent},
    visitor_pass::{EffectiveStatus, VisitorPass},
};
use crate::services::{
    code_generator::ShortCodeGenerator,
    pass_issuer::{self, IssuePassRequest},
    qr_generator,
};

#[derive(Debug, Deserialize)]
pub struct IssuePassBody {
    pub property_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_uses: i32,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

/// A pass as returned to callers: the persisted row plus the display state
/// computed against the request clock. The two disagree for passes past
/// their window that nothing has written to yet.
#[derive(Debug, Serialize)]
pub struct PassResponse {
    #[serde(flatten)]
    pub pass: VisitorPass,
    pub display_status: EffectiveStatus,
}

impl PassResponse {
    pub fn new(pass: VisitorPass, now: DateTime<Utc>) -> Self {
        let display_status = pass.effective_status(now);
        Self {
            pass,
            display_status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokePassBody {
    /// Identity of the actor revoking the pass, persisted on the row.
    pub revoked_by: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListPassesParams {
    pub property_id: Uuid,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PassEventsResponse {
    pub events: Vec<VisitorEvent>,
    pub total: i64,
    pub success_count: i64,
    pub denied_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// Handlers

async fn issue_pass(
    State(state): State<AppState>,
    Json(body): Json<IssuePassBody>,
) -> Result<(StatusCode, Json<PassResponse>)> {
    let pass = pass_issuer::issue_pass(
        &state.pool,
        &ShortCodeGenerator,
        IssuePassRequest {
            property_id: body.property_id,
            unit_id: body.unit_id,
            starts_at: body.starts_at,
            ends_at: body.ends_at,
            max_uses: body.max_uses,
            purpose: body.purpose,
            notes: body.notes,
            created_by: body.created_by,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(PassResponse::new(pass, Utc::now())),
    ))
}

async fn list_passes(
    State(state): State<AppState>,
    Query(params): Query<ListPassesParams>,
) -> Result<Json<Vec<PassResponse>>> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(50).clamp(1, 200);
    let offset = (page - 1) * per_page;

    let passes =
        VisitorPass::list_by_property(&state.pool, params.property_id, per_page, offset).await?;

    let now = Utc::now();
    let passes = passes
        .into_iter()
        .map(|p| PassResponse::new(p, now))
        .collect();

    Ok(Json(passes))
}

async fn show_pass(
    State(state): State<AppState>,
    Path(pass_id): Path<Uuid>,
) -> Result<Json<PassResponse>> {
    let pass = VisitorPass::find_by_id(&state.pool, pass_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pass not found".to_string()))?;

    Ok(Json(PassResponse::new(pass, Utc::now())))
}

async fn pass_qr(State(state): State<AppState>, Path(pass_id): Path<Uuid>) -> Result<Response> {
    let pass = VisitorPass::find_by_id(&state.pool, pass_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pass not found".to_string()))?;

    let svg = qr_generator::generate_code_svg(&pass.code)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml")],
        svg,
    )
        .into_response())
}

async fn revoke_pass(
    State(state): State<AppState>,
    Path(pass_id): Path<Uuid>,
    Json(body): Json<RevokePassBody>,
) -> Result<Json<PassResponse>> {
    match VisitorPass::revoke(&state.pool, pass_id, body.revoked_by).await? {
        Some(pass) => {
            tracing::info!(pass_id = %pass.id, revoked_by = %body.revoked_by, "Pass revoked");
            Ok(Json(PassResponse::new(pass, Utc::now())))
        }
        None => {
            // Revocation is a no-op on already revoked passes; figure out
            // which case this was for the caller.
            if VisitorPass::find_by_id(&state.pool, pass_id).await?.is_some() {
                Err(AppError::Conflict("Pass already revoked".to_string()))
            } else {
                Err(AppError::NotFound("Pass not found".to_string()))
            }
        }
    }
}

async fn pass_events(
    State(state): State<AppState>,
    Path(pass_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PassEventsResponse>> {
    if VisitorPass::find_by_id(&state.pool, pass_id).await?.is_none() {
        return Err(AppError::NotFound("Pass not found".to_string()));
    }

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(50).clamp(1, 200);
    let offset = (page - 1) * per_page;

    let events = VisitorEvent::list_by_pass(&state.pool, pass_id, per_page, offset).await?;
    let total = VisitorEvent::count_by_pass_and_result(&state.pool, pass_id, None).await?;
    let success_count =
        VisitorEvent::count_by_pass_and_result(&state.pool, pass_id, Some(ValidationResult::Success))
            .await?;

    Ok(Json(PassEventsResponse {
        events,
        total,
        success_count,
        denied_count: total - success_count,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/passes", post(issue_pass).get(list_passes))
        .route("/api/passes/:id", get(show_pass))
        .route("/api/passes/:id/qr", get(pass_qr))
        .route("/api/passes/:id/revoke", post(revoke_pass))
        .route("/api/passes/:id/events", get(pass_events))
}
