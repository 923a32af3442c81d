//! Document numbering endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use sequence::DocumentType;
use serde::Serialize;

use super::AppState;
use crate::error::ApiError;
use crate::extract::Tenant;

#[derive(Serialize)]
pub struct NextNumberResponse {
    pub tenant_id: String,
    pub document_type: String,
    pub number: i64,
}

/// POST /api/v1/sequences/{document_type}/next
#[tracing::instrument(skip(state, ctx))]
pub async fn next(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Path(document_type): Path<String>,
) -> Result<Json<NextNumberResponse>, ApiError> {
    let document_type = DocumentType::new(document_type)?;
    let number = state
        .sequences
        .next_number(ctx.tenant_id(), &document_type)
        .await?;

    Ok(Json(NextNumberResponse {
        tenant_id: ctx.tenant_id().to_string(),
        document_type: document_type.to_string(),
        number,
    }))
}
