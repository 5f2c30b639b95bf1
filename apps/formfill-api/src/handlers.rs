//! HTTP handlers for the FormFill API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use formfill_core::{
    begin_turn, detect_form_fields, lock_session, DetectedField, FieldEdit, FormSession,
    InstructionMapper, KeywordMapper, SharedSession, TurnRequest,
};

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

fn decode_pdf(pdf_base64: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(pdf_base64)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF base64: {}", e)))
}

fn session_or_404(state: &AppState, id: &str) -> Result<SharedSession, ApiError> {
    state
        .registry
        .get(id)
        .ok_or_else(|| ApiError::SessionNotFound(id.to_string()))
}

/// Map instructions to edits with the configured mapper. `use_llm=false`
/// falls back to deterministic keyword matching.
async fn map_instructions(
    state: &AppState,
    instructions: &str,
    fields: &[DetectedField],
    use_llm: bool,
) -> Result<Vec<FieldEdit>, ApiError> {
    if use_llm {
        match &state.mapper {
            Some(mapper) => Ok(mapper.map(instructions, fields).await?),
            None => Err(ApiError::MapperUnavailable(
                "ANTHROPIC_API_KEY not set".to_string(),
            )),
        }
    } else {
        Ok(KeywordMapper::new().map(instructions, fields)?)
    }
}

const NO_FIELDS_MESSAGE: &str = "No fillable form fields found in this PDF. \
    This endpoint only works with PDFs that have native AcroForm fields.";

/// Analyze a PDF to detect fillable form fields.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let pdf = decode_pdf(&req.pdf_base64)?;
    let document_hash = hex::encode(Sha256::digest(&pdf));

    let fields = detect_form_fields(state.engine.as_ref(), &pdf)?;

    // Zero fields is a valid outcome, not a failure.
    let message = if fields.is_empty() {
        NO_FIELDS_MESSAGE.to_string()
    } else {
        format!("Found {} fillable form fields", fields.len())
    };

    tracing::info!("analyzed document {}: {} fields", document_hash, fields.len());

    Ok(Json(AnalyzeResponse {
        success: true,
        message,
        document_hash,
        field_count: fields.len(),
        fields: fields.iter().map(FieldInfo::from_field).collect(),
    }))
}

/// Fill a PDF form in one shot from natural-language instructions.
pub async fn fill(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FillRequest>,
) -> Result<Json<FillResponse>, ApiError> {
    let pdf = decode_pdf(&req.pdf_base64)?;

    let mut session = FormSession::new();
    let field_count = session.load_bytes(state.engine.as_ref(), &pdf)?;
    if field_count == 0 {
        return Err(ApiError::NoFields(NO_FIELDS_MESSAGE.to_string()));
    }

    let fields = session.fields().to_vec();
    let edits = map_instructions(&state, &req.instructions, &fields, req.use_llm).await?;
    if edits.is_empty() {
        return Err(ApiError::MappingEmpty);
    }

    let destination = req
        .output_path
        .unwrap_or_else(|| state.session_path(&Uuid::new_v4().to_string(), "_filled"));
    let outcomes = session.stage_batch(edits);
    let mut commit = session.commit(Some(&destination))?;

    // Edits the mapper proposed for ids that do not exist never reach the
    // commit loop; fold their staging errors into the reported outcome.
    for outcome in outcomes {
        if !outcome.staged {
            if let Some(error) = outcome.error {
                commit.errors.push(error);
            }
        }
    }
    commit.success = commit.errors.is_empty();

    let filled_pdf_base64 = session
        .saved_bytes()
        .map(|bytes| BASE64.encode(bytes))
        .unwrap_or_default();

    Ok(Json(FillResponse {
        success: commit.success,
        message: format!(
            "Filled {} of {} fields",
            commit.applied_count, field_count
        ),
        commit,
        filled_pdf_base64,
    }))
}

/// Preview which fields the instructions would fill, without committing.
pub async fn fill_preview(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FillRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let pdf = decode_pdf(&req.pdf_base64)?;
    let fields = detect_form_fields(state.engine.as_ref(), &pdf)?;

    if fields.is_empty() {
        return Ok(Json(PreviewResponse {
            success: false,
            message: "No fillable form fields found".to_string(),
            fields: vec![],
            edits: vec![],
        }));
    }

    let edits = map_instructions(&state, &req.instructions, &fields, req.use_llm).await?;

    Ok(Json(PreviewResponse {
        success: true,
        message: format!("Would fill {} of {} fields", edits.len(), fields.len()),
        fields: fields.iter().map(FieldInfo::from_field).collect(),
        edits,
    }))
}

/// Create a multi-turn form-filling session from an uploaded PDF.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let pdf = decode_pdf(&req.pdf_base64)?;
    let document_hash = hex::encode(Sha256::digest(&pdf));

    let (session_id, session) = state.registry.create();

    // Persist the upload so later turns can reopen it by path.
    let upload_path = state.session_path(&session_id, "");
    std::fs::write(&upload_path, &pdf)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to store upload: {}", e)))?;

    let mut guard = lock_session(&session);
    let field_count = guard.load_path(state.engine.as_ref(), &upload_path)?;
    let fields: Vec<FieldInfo> = guard.fields().iter().map(FieldInfo::from_field).collect();
    tracing::debug!("{}", guard.summary());
    drop(guard);

    tracing::info!(
        "created session {} ({}, {} fields)",
        session_id,
        req.document_name.as_deref().unwrap_or("unnamed"),
        field_count
    );

    Ok(Json(CreateSessionResponse {
        session_id,
        document_hash,
        field_count,
        fields,
    }))
}

/// Current fields of a session, with committed edits folded in.
pub async fn session_fields(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<FieldInfo>>, ApiError> {
    let session = session_or_404(&state, &id)?;
    let guard = lock_session(&session);
    let fields = guard
        .fields()
        .iter()
        .map(|f| FieldInfo::with_value(f, guard.effective_value(f)))
        .collect();
    Ok(Json(fields))
}

/// Run one turn: reconcile session state, then (when instructions are
/// given) map, stage and commit in one go.
pub async fn session_turn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TurnBody>,
) -> Result<Json<TurnResponse>, ApiError> {
    let session = session_or_404(&state, &id)?;
    let default_output = state.session_path(&id, "_filled");

    // Phase 1: reconcile the session for this turn.
    let (summary, fields) = {
        let mut guard = lock_session(&session);
        let document_path = match body.document_path.clone() {
            Some(path) => path,
            None if body.continuation => guard
                .last_output()
                .map(|p| p.to_path_buf())
                .ok_or_else(|| {
                    ApiError::InvalidRequest(
                        "continuation turn without document_path or a prior commit".to_string(),
                    )
                })?,
            None => state.session_path(&id, ""),
        };
        let summary = begin_turn(
            &mut guard,
            state.engine.as_ref(),
            TurnRequest {
                document_path,
                output_path: Some(body.output_path.clone().unwrap_or(default_output)),
                continuation: body.continuation,
                previous_edits: body.previous_edits.clone(),
            },
        )?;
        (summary, guard.fields().to_vec())
    };

    let Some(instructions) = body.instructions.as_deref().filter(|i| !i.trim().is_empty())
    else {
        return Ok(Json(TurnResponse {
            success: true,
            summary,
            mapped_count: None,
            stage_outcomes: None,
            commit: None,
        }));
    };

    // Phase 2: map outside the session lock.
    let edits = map_instructions(&state, instructions, &fields, body.use_llm).await?;
    if edits.is_empty() {
        return Err(ApiError::MappingEmpty);
    }
    let mapped_count = edits.len();

    // Phase 3: stage and commit.
    let mut guard = lock_session(&session);
    let stage_outcomes = guard.stage_batch(edits);
    let commit = guard.commit(None)?;

    Ok(Json(TurnResponse {
        success: commit.success,
        summary,
        mapped_count: Some(mapped_count),
        stage_outcomes: Some(stage_outcomes),
        commit: Some(commit),
    }))
}

/// Stage a batch of edits; per-edit outcomes, never all-or-nothing.
pub async fn session_stage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StageRequest>,
) -> Result<Json<StageResponse>, ApiError> {
    let session = session_or_404(&state, &id)?;
    let mut guard = lock_session(&session);
    let outcomes = guard.stage_batch(req.edits);
    let pending_count = guard.pending_count();
    Ok(Json(StageResponse {
        outcomes,
        pending_count,
    }))
}

/// Review staged edits before committing.
pub async fn session_pending(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PendingResponse>, ApiError> {
    let session = session_or_404(&state, &id)?;
    let guard = lock_session(&session);
    let pending_edits = guard.pending_review();
    Ok(Json(PendingResponse {
        count: pending_edits.len(),
        pending_edits,
    }))
}

/// Apply all staged edits and save.
pub async fn session_commit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<formfill_core::CommitOutcome>, ApiError> {
    let session = session_or_404(&state, &id)?;
    let mut guard = lock_session(&session);
    let destination = req
        .output_path
        .unwrap_or_else(|| state.session_path(&id, "_filled"));
    let outcome = guard.commit(Some(&destination))?;
    Ok(Json(outcome))
}

/// Download the most recently committed document.
pub async fn session_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, [(String, String); 2], Vec<u8>), ApiError> {
    let session = session_or_404(&state, &id)?;
    let guard = lock_session(&session);
    let bytes = guard
        .saved_bytes()
        .ok_or_else(|| {
            ApiError::InvalidRequest("No committed document for this session yet".to_string())
        })?
        .to_vec();

    Ok((
        StatusCode::OK,
        [
            ("Content-Type".to_string(), "application/pdf".to_string()),
            (
                "Content-Disposition".to_string(),
                format!("inline; filename=\"{}_filled.pdf\"", id),
            ),
        ],
        bytes,
    ))
}

/// End a session: the document handle is released with the session.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .registry
        .remove(&id)
        .ok_or_else(|| ApiError::SessionNotFound(id.clone()))?;
    lock_session(&session).hard_reset();

    tracing::info!("deleted session {}", id);
    Ok(Json(serde_json::json!({ "success": true })))
}
