use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use tracing::info;

use super::{collection, json_body, AppState, StatusId, MODULES_COLLECTION};
use crate::error::{Error, Result};
use crate::models::{Module, NewModule};
use crate::store::{Filter, Sort};

/// GET /modules
pub async fn list_modules(State(state): State<AppState>) -> Result<Json<Vec<Module>>> {
    let modules = collection::<Module>(&state, MODULES_COLLECTION)
        .find(&Filter::All, Some(&Sort::descending("createdAt")))
        .await?;
    Ok(Json(modules))
}

/// POST /uploadModule
///
/// `fileUrl` is normally the `url` returned by `POST /upload`.
pub async fn upload_module(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewModule>, JsonRejection>,
) -> Result<Json<StatusId>> {
    let module = Module::from_input(json_body(payload)?, Utc::now());
    let id = collection::<Module>(&state, MODULES_COLLECTION)
        .insert(&module)
        .await?;

    info!("POST /uploadModule - created module {} ({})", id, module.title);
    Ok(Json(StatusId::ok(id)))
}

/// DELETE /modules/{id}
pub async fn delete_module(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusId>> {
    if !collection::<Module>(&state, MODULES_COLLECTION).delete(&id).await? {
        return Err(Error::NotFound(format!("module {}", id)));
    }
    info!("DELETE /modules/{}", id);
    Ok(Json(StatusId::ok(id)))
}
