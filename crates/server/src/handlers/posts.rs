use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use tracing::info;

use super::{collection, json_body, AppState, StatusId, POSTS_COLLECTION};
use crate::error::{Error, Result};
use crate::models::{NewPost, Post};
use crate::store::{Filter, Sort};

/// GET /posts
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>> {
    let posts = collection::<Post>(&state, POSTS_COLLECTION)
        .find(&Filter::All, Some(&Sort::descending("createdAt")))
        .await?;
    Ok(Json(posts))
}

/// POST /uploadPost
pub async fn upload_post(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewPost>, JsonRejection>,
) -> Result<Json<StatusId>> {
    let post = Post::from_input(json_body(payload)?, Utc::now());
    let id = collection::<Post>(&state, POSTS_COLLECTION).insert(&post).await?;

    info!("POST /uploadPost - created post {}", id);
    Ok(Json(StatusId::ok(id)))
}

/// DELETE /posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusId>> {
    if !collection::<Post>(&state, POSTS_COLLECTION).delete(&id).await? {
        return Err(Error::NotFound(format!("post {}", id)));
    }
    info!("DELETE /posts/{}", id);
    Ok(Json(StatusId::ok(id)))
}
