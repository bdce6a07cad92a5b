//! Commands for the Request Review context.
//!
//! Field types arrive as raw string tokens and are resolved against the
//! registry by the handlers.

use mudgate_core::command::Command;
use mudgate_core::model::RequestType;
use uuid::Uuid;

macro_rules! impl_command {
    ($($command:ident => $name:literal),+ $(,)?) => {
        $(
            impl Command for $command {
                fn command_type(&self) -> &'static str {
                    $name
                }

                fn correlation_id(&self) -> Uuid {
                    self.correlation_id
                }

                fn actor_id(&self) -> Uuid {
                    self.actor_id
                }
            }
        )+
    };
}

/// Command to open a new request.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player, who becomes the owner.
    pub actor_id: Uuid,
    /// Kind of request to open.
    pub request_type: RequestType,
}

/// Command to set a scalar field's value.
#[derive(Debug, Clone)]
pub struct UpdateField {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// Field type token.
    pub field_type: String,
    /// New value.
    pub value: String,
}

/// Command to add an item to a list-valued field.
#[derive(Debug, Clone)]
pub struct CreateSubfield {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// Field type token.
    pub field_type: String,
    /// Item value.
    pub value: String,
}

/// Command to change one list item.
#[derive(Debug, Clone)]
pub struct UpdateSubfield {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// The subfield identifier.
    pub subfield_id: Uuid,
    /// New item value.
    pub value: String,
}

/// Command to remove one list item.
#[derive(Debug, Clone)]
pub struct DeleteSubfield {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// The subfield identifier.
    pub subfield_id: Uuid,
}

/// Command to record a reviewer's decision on a field without objections.
#[derive(Debug, Clone)]
pub struct ReviewField {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting reviewer.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// Field type token.
    pub field_type: String,
}

/// Command to object to a field's value.
#[derive(Debug, Clone)]
pub struct CreateChangeRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting reviewer.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// Field type token.
    pub field_type: String,
    /// Rationale.
    pub text: String,
}

/// Command to reword an open change request.
#[derive(Debug, Clone)]
pub struct EditChangeRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting reviewer.
    pub actor_id: Uuid,
    /// The change request identifier.
    pub change_request_id: Uuid,
    /// New rationale.
    pub text: String,
}

/// Command to withdraw an open change request.
#[derive(Debug, Clone)]
pub struct DeleteChangeRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting reviewer.
    pub actor_id: Uuid,
    /// The change request identifier.
    pub change_request_id: Uuid,
}

/// Command to comment on a field, or to reply to a comment.
#[derive(Debug, Clone)]
pub struct CreateComment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting reviewer.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// Field type token.
    pub field_type: String,
    /// Comment text.
    pub text: String,
    /// Comment being replied to.
    pub parent_id: Option<Uuid>,
}

/// Command to move a request along its forward path.
#[derive(Debug, Clone)]
pub struct AdvanceStatus {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
}

/// Command for an owner to withdraw a request.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
}

/// Command for a reviewer to turn a request down.
#[derive(Debug, Clone)]
pub struct RejectRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting reviewer.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
}

/// Command to file away a rejected request.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
}

/// Command to materialize an approved request.
#[derive(Debug, Clone)]
pub struct FulfillRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The acting player.
    pub actor_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
}

impl_command! {
    CreateRequest => "requests.create_request",
    UpdateField => "requests.update_field",
    CreateSubfield => "requests.create_subfield",
    UpdateSubfield => "requests.update_subfield",
    DeleteSubfield => "requests.delete_subfield",
    ReviewField => "requests.review_field",
    CreateChangeRequest => "requests.create_change_request",
    EditChangeRequest => "requests.edit_change_request",
    DeleteChangeRequest => "requests.delete_change_request",
    CreateComment => "requests.create_comment",
    AdvanceStatus => "requests.advance_status",
    CancelRequest => "requests.cancel_request",
    RejectRequest => "requests.reject_request",
    ArchiveRequest => "requests.archive_request",
    FulfillRequest => "requests.fulfill_request",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exposes_actor_and_correlation() {
        let command = AdvanceStatus {
            correlation_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
        };

        assert_eq!(command.command_type(), "requests.advance_status");
        assert_eq!(Command::actor_id(&command), command.actor_id);
        assert_eq!(Command::correlation_id(&command), command.correlation_id);
    }
}
