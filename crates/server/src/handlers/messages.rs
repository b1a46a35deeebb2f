use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{json_body, AppState, StatusId};
use crate::error::{Error, Result};
use crate::models::{ChatMessage, NewMessage};
use crate::store::{Filter, Sort};

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    /// Messages sent or received by this user
    pub user: Option<String>,
    /// With `user`, only the conversation between the two
    pub with: Option<String>,
}

impl MessageQuery {
    fn filter(&self) -> Result<Filter> {
        let user = self.user.as_deref().map(str::trim).filter(|u| !u.is_empty());
        let with = self.with.as_deref().map(str::trim).filter(|w| !w.is_empty());

        match (user, with) {
            (None, None) => Ok(Filter::All),
            (None, Some(_)) => Err(Error::BadRequest("`with` requires `user`".into())),
            (Some(user), None) => Ok(Filter::Or(vec![
                Filter::eq("sender", user),
                Filter::eq("receiver", user),
            ])),
            (Some(user), Some(with)) => Ok(Filter::Or(vec![
                Filter::And(vec![Filter::eq("sender", user), Filter::eq("receiver", with)]),
                Filter::And(vec![Filter::eq("sender", with), Filter::eq("receiver", user)]),
            ])),
        }
    }
}

/// GET /messages
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<Vec<ChatMessage>>> {
    let messages = state
        .router
        .messages()
        .find(&query.filter()?, Some(&Sort::ascending("timestamp")))
        .await?;
    Ok(Json(messages))
}

/// POST /sendMessage
///
/// Stores the message without pushing it to live connections; realtime
/// delivery only happens for messages submitted over `/ws`.
pub async fn send_message(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewMessage>, JsonRejection>,
) -> Result<Json<StatusId>> {
    let message = state.router.persist_message(json_body(payload)?).await?;
    let id = message.id.unwrap_or_default();

    info!(
        "POST /sendMessage - {} -> {} stored as {}",
        message.sender, message.receiver, id
    );
    Ok(Json(StatusId::sent(id)))
}
