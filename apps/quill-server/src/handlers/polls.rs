//! Poll endpoints.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::forms::VoteForm;
use quill_shared::dto::PollIndexResponse;

use super::views;
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// GET /polls/
pub async fn index(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let questions = state.polls.index().await?;

    Ok(HttpResponse::Ok().json(PollIndexResponse {
        latest_question_list: questions.iter().map(views::question).collect(),
    }))
}

/// GET /polls/{question_id}/
pub async fn detail(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let detail = state.polls.detail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(views::question_detail(&detail)))
}

/// GET /polls/{question_id}/results/
pub async fn results(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let detail = state.polls.results(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(views::question_detail(&detail)))
}

/// POST /polls/{question_id}/vote/
pub async fn vote(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    form: web::Form<VoteForm>,
) -> AppResult<HttpResponse> {
    let detail = state
        .polls
        .vote(path.into_inner(), form.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(views::question_detail(&detail)))
}
