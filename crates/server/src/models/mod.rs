use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A payload field that was missing or blank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing or empty field `{field}`")]
pub struct ValidationError {
    pub field: &'static str,
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self { field }
    }
}

/// Take a required string field, rejecting absent or whitespace-only values.
fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::missing(field)),
    }
}

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Stamp a validated draft with the server-side creation time.
    pub fn from_draft(draft: MessageDraft, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            sender: draft.sender,
            receiver: draft.receiver,
            content: draft.content,
            timestamp,
        }
    }
}

/// Message fields as submitted by a client, before validation.
///
/// Every field is optional so that a missing field surfaces as a
/// [`ValidationError`] rather than a deserialization failure. A
/// client-supplied timestamp is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default, alias = "body")]
    pub content: Option<String>,
}

impl NewMessage {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: Some(sender.into()),
            receiver: Some(receiver.into()),
            content: Some(content.into()),
        }
    }

    pub fn validate(self) -> Result<MessageDraft, ValidationError> {
        let sender = required(self.sender, "sender")?;
        let receiver = required(self.receiver, "receiver")?;
        let content = required(self.content, "content")?;
        Ok(MessageDraft {
            sender: sender.trim().to_string(),
            receiver: receiver.trim().to_string(),
            content,
        })
    }
}

/// A message that passed validation but has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

/// Timeline post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image_url: String,
}

impl Post {
    pub fn from_input(input: NewPost, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: input.title,
            content: input.content,
            image_url: input.image_url,
            created_at,
        }
    }
}

/// Learning module with an attached file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a module
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewModule {
    pub title: String,
    pub description: String,
    pub file_url: String,
}

impl Module {
    pub fn from_input(input: NewModule, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: input.title,
            description: input.description,
            file_url: input.file_url,
            created_at,
        }
    }
}

/// Developmental evaluation of a student.
///
/// Scores come in baseline (`*B`) and end-of-term (`*E`) pairs for gross
/// motor, fine motor and social skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub student_id: String,
    pub age: String,
    #[serde(rename = "grossB")]
    pub gross_b: i32,
    #[serde(rename = "grossE")]
    pub gross_e: i32,
    #[serde(rename = "fineB")]
    pub fine_b: i32,
    #[serde(rename = "fineE")]
    pub fine_e: i32,
    #[serde(rename = "socialB")]
    pub social_b: i32,
    #[serde(rename = "socialE")]
    pub social_e: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for recording an evaluation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewEvaluation {
    pub student_id: Option<String>,
    pub age: String,
    #[serde(rename = "grossB")]
    pub gross_b: i32,
    #[serde(rename = "grossE")]
    pub gross_e: i32,
    #[serde(rename = "fineB")]
    pub fine_b: i32,
    #[serde(rename = "fineE")]
    pub fine_e: i32,
    #[serde(rename = "socialB")]
    pub social_b: i32,
    #[serde(rename = "socialE")]
    pub social_e: i32,
}

impl Evaluation {
    pub fn from_input(
        input: NewEvaluation,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let student_id = required(input.student_id, "studentId")?;
        Ok(Self {
            id: None,
            student_id: student_id.trim().to_string(),
            age: input.age,
            gross_b: input.gross_b,
            gross_e: input.gross_e,
            fine_b: input.fine_b,
            fine_e: input.fine_e,
            social_b: input.social_b,
            social_e: input.social_e,
            created_at,
        })
    }
}

/// Blob saved in the file store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
    pub name: String,
    pub size: u64,
    pub sha256: String,
    /// Type given by the uploader, else guessed from the name
    pub content_type: String,
}
