use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use tracing::info;

use super::{collection, json_body, AppState, StatusId, EVALUATIONS_COLLECTION};
use crate::error::Result;
use crate::models::{Evaluation, NewEvaluation};
use crate::store::{Filter, Sort};

/// POST /addEvaluation
pub async fn add_evaluation(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewEvaluation>, JsonRejection>,
) -> Result<Json<StatusId>> {
    let evaluation = Evaluation::from_input(json_body(payload)?, Utc::now())?;
    let id = collection::<Evaluation>(&state, EVALUATIONS_COLLECTION)
        .insert(&evaluation)
        .await?;

    info!(
        "POST /addEvaluation - student {} evaluation {}",
        evaluation.student_id, id
    );
    Ok(Json(StatusId::ok(id)))
}

/// GET /evaluations
pub async fn list_evaluations(State(state): State<AppState>) -> Result<Json<Vec<Evaluation>>> {
    find(&state, Filter::All).await.map(Json)
}

/// GET /evaluations/{studentId}
pub async fn student_evaluations(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<Vec<Evaluation>>> {
    find(&state, Filter::eq("studentId", student_id)).await.map(Json)
}

async fn find(state: &AppState, filter: Filter) -> Result<Vec<Evaluation>> {
    let evaluations = collection::<Evaluation>(state, EVALUATIONS_COLLECTION)
        .find(&filter, Some(&Sort::ascending("createdAt")))
        .await?;
    Ok(evaluations)
}
