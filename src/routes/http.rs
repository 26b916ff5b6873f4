//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; every response body is an `AppResponse` envelope.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::QuestionCriteria;
use crate::logic::*;
use crate::messages::MSG_BAD_INPUT;
use crate::protocol::*;
use crate::state::AppState;

/// A body that does not parse never reaches the service.
fn bad_request(rejection: JsonRejection) -> Response {
    warn!(target: "paper", error = %rejection.body_text(), "Rejected request body");
    (StatusCode::BAD_REQUEST, Json(AppResponse::<()>::error(MSG_BAD_INPUT))).into_response()
}

fn envelope<T: Serialize>(res: AppResponse<T>) -> Response {
    (StatusCode::OK, Json(res)).into_response()
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_generate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QuestionCriteria>, JsonRejection>,
) -> Response {
    let Json(criteria) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_request(rejection),
    };
    let res = generate_question_paper(&state, &criteria).await;
    info!(target: "paper", success = res.success, status = ?res.status, "HTTP generate served");
    envelope(res)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_save(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SaveTestIn>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_request(rejection),
    };
    let res = save_test_details(&state, body.template, body.test_paper, body.save_as_draft).await;
    envelope(res)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_drafts(
    State(state): State<Arc<AppState>>,
    Path((group_code, teacher_id)): Path<(String, String)>,
) -> Response {
    envelope(fetch_all_drafts(&state, &group_code, &teacher_id).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_paper(
    State(state): State<Arc<AppState>>,
    Path((group_code, test_id)): Path<(String, String)>,
) -> Response {
    envelope(fetch_single_paper(&state, &group_code, &test_id).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_templates(
    State(state): State<Arc<AppState>>,
    Path((group_code, teacher_id)): Path<(String, String)>,
) -> Response {
    envelope(fetch_all_templates(&state, &group_code, &teacher_id).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_template(
    State(state): State<Arc<AppState>>,
    Path((group_code, template_id)): Path<(String, String)>,
) -> Response {
    envelope(fetch_single_template(&state, &group_code, &template_id).await)
}
