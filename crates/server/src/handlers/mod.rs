//! HTTP and WebSocket handlers
//!
//! REST endpoints are thin wrappers over typed store collections; chat
//! submission and presence go through the shared [`DeliveryRouter`].
//!
//! [`DeliveryRouter`]: crate::presence::DeliveryRouter

pub mod evaluations;
pub mod files;
pub mod messages;
pub mod modules;
pub mod posts;
pub mod realtime;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use crate::config::AppState;
use crate::error::{Error, Result};
use crate::store::Collection;

pub use evaluations::{add_evaluation, list_evaluations, student_evaluations};
pub use files::{download_file, upload_file};
pub use messages::{list_messages, send_message};
pub use modules::{delete_module, list_modules, upload_module};
pub use posts::{delete_post, list_posts, upload_post};
pub use realtime::{online_users, ws_upgrade};

pub const POSTS_COLLECTION: &str = "posts";
pub const MODULES_COLLECTION: &str = "modules";
pub const EVALUATIONS_COLLECTION: &str = "evaluations";

/// `{status, id}` body returned by write endpoints
#[derive(Debug, Serialize)]
pub struct StatusId {
    pub status: &'static str,
    pub id: String,
}

impl StatusId {
    pub fn ok(id: String) -> Self {
        Self { status: "ok", id }
    }

    pub fn sent(id: String) -> Self {
        Self { status: "sent", id }
    }
}

/// Typed collection bounded by the configured store timeout
pub(crate) fn collection<T>(state: &AppState, name: &'static str) -> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    Collection::new(state.store.clone(), name).with_timeout(state.config.store_timeout)
}

/// Unwrap a JSON body, turning extractor rejections into 400s
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| Error::BadRequest(rejection.body_text()))
}
