//! Comment thread: append-only remarks per field and request version.

use mudgate_core::clock::Clock;
use mudgate_core::error::DomainError;
use mudgate_core::model::Comment;
use mudgate_core::repository::RequestTransaction;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::support::{ensure_reviewing, find_request, load_request};
use crate::domain::commands::CreateComment;
use crate::domain::registry::Registry;
use crate::domain::validators::COMMENT_TEXT;

/// A top-level comment with its replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentWithReplies {
    /// The top-level comment.
    pub comment: Comment,
    /// Replies, oldest first.
    pub replies: Vec<Comment>,
}

/// Comments on one field of a request.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    /// Request version the current comments belong to.
    pub version: i64,
    /// Comments made against the live version.
    pub current: Vec<CommentWithReplies>,
    /// Read-only comments from earlier versions, oldest first.
    pub history: Vec<Comment>,
}

/// Handles the `CreateComment` command: adds a remark (or a reply to one)
/// on a field, against the request's live version.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request, field type or parent
/// comment is unknown, `DomainError::Forbidden` unless the actor is the
/// assigned, non-owner reviewer of an `InReview` request, and
/// `DomainError::InvalidInput` if the text fails validation or the parent
/// is a reply, belongs to another field or to an earlier version.
#[instrument(skip_all, fields(request_id = %command.request_id, field_type = %command.field_type))]
pub async fn handle_create_comment(
    command: &CreateComment,
    registry: &Registry,
    clock: &dyn Clock,
    tx: &mut dyn RequestTransaction,
) -> Result<Comment, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling create_comment command");

    let request = load_request(tx, command.request_id).await?;
    let definition = registry.field_definition_by_token(request.request_type, &command.field_type)?;
    ensure_reviewing(command.actor_id, &request, "comment on")?;
    let text = COMMENT_TEXT.clean("comment text", &command.text)?;

    if let Some(parent_id) = command.parent_id {
        let parent = tx
            .load_comment(parent_id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment", parent_id))?;
        if parent.request_id != request.id || parent.field_type != definition.field_type {
            return Err(DomainError::InvalidInput(
                "parent comment belongs to another field".into(),
            ));
        }
        if parent.parent_id.is_some() {
            return Err(DomainError::InvalidInput("replies cannot be nested".into()));
        }
        if parent.version != request.version {
            return Err(DomainError::InvalidInput(
                "comments from earlier versions are read-only".into(),
            ));
        }
    }

    let comment = Comment {
        id: Uuid::new_v4(),
        request_id: request.id,
        field_type: definition.field_type,
        version: request.version,
        parent_id: command.parent_id,
        author_id: command.actor_id,
        text,
        created_at: clock.now(),
    };
    tx.insert_comment(&comment).await?;

    Ok(comment)
}

/// Returns the comment thread of one field: live-version comments grouped
/// with their replies, and older comments as history.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request or field type is unknown.
pub async fn get_comment_thread(
    request_id: Uuid,
    field_type: &str,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<CommentThread, DomainError> {
    let request = find_request(tx, request_id).await?;
    let definition = registry.field_definition_by_token(request.request_type, field_type)?;
    let comments = tx.list_comments(request.id, definition.field_type).await?;

    let (current, history): (Vec<Comment>, Vec<Comment>) = comments
        .into_iter()
        .partition(|c| c.version == request.version);
    let (replies, top_level): (Vec<Comment>, Vec<Comment>) =
        current.into_iter().partition(|c| c.parent_id.is_some());
    let current = top_level
        .into_iter()
        .map(|comment| {
            let replies = replies
                .iter()
                .filter(|r| r.parent_id == Some(comment.id))
                .cloned()
                .collect();
            CommentWithReplies { comment, replies }
        })
        .collect();

    Ok(CommentThread {
        version: request.version,
        current,
        history,
    })
}
