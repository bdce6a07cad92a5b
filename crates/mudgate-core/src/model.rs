//! Persisted request model.
//!
//! Every entity here is owned by exactly one [`Request`] and is only ever
//! reached through it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Kind of multi-field submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// Application for a new player character.
    CharacterApplication,
}

impl RequestType {
    /// Every request type, in display order.
    pub const ALL: [Self; 1] = [Self::CharacterApplication];

    /// Returns the persisted token for this type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CharacterApplication => "CharacterApplication",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown request type: {s}")))
    }
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Being drafted; at least one field may still be empty.
    Incomplete,
    /// Every field has a value; waiting for the owner to submit.
    Ready,
    /// Waiting for a reviewer to pick it up.
    Submitted,
    /// Picked up by the assigned reviewer.
    InReview,
    /// Review finished with every field approved.
    Approved,
    /// Review finished with outstanding change requests.
    Reviewed,
    /// Turned down by a reviewer.
    Rejected,
    /// Rejected and filed away.
    Archived,
    /// Withdrawn by its owner.
    Canceled,
    /// Approved and its effect materialized.
    Fulfilled,
}

impl RequestStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 10] = [
        Self::Incomplete,
        Self::Ready,
        Self::Submitted,
        Self::InReview,
        Self::Approved,
        Self::Reviewed,
        Self::Rejected,
        Self::Archived,
        Self::Canceled,
        Self::Fulfilled,
    ];

    /// Returns the persisted token for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incomplete => "Incomplete",
            Self::Ready => "Ready",
            Self::Submitted => "Submitted",
            Self::InReview => "InReview",
            Self::Approved => "Approved",
            Self::Reviewed => "Reviewed",
            Self::Rejected => "Rejected",
            Self::Archived => "Archived",
            Self::Canceled => "Canceled",
            Self::Fulfilled => "Fulfilled",
        }
    }

    /// Whether the owner may currently edit field values.
    #[must_use]
    pub fn is_drafting(self) -> bool {
        matches!(self, Self::Incomplete | Self::Ready | Self::Reviewed)
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Archived | Self::Canceled | Self::Fulfilled)
    }

    /// Whether the request still counts against its owner's open limit.
    #[must_use]
    pub fn is_open(self) -> bool {
        !matches!(
            self,
            Self::Rejected | Self::Archived | Self::Canceled | Self::Fulfilled
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::Internal(format!("unknown request status: {s}")))
    }
}

/// Typed field token. Which tokens a request carries, and in what order, is
/// decided by the field definition registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Character name.
    Name,
    /// Character gender.
    Gender,
    /// Third-person short description.
    ShortDescription,
    /// Description shown on examine.
    Description,
    /// Private backstory.
    Backstory,
    /// Keywords the character can be targeted by.
    Keywords,
}

impl FieldType {
    /// Every field type.
    pub const ALL: [Self; 6] = [
        Self::Name,
        Self::Gender,
        Self::ShortDescription,
        Self::Description,
        Self::Backstory,
        Self::Keywords,
    ];

    /// Returns the token used in paths and storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Gender => "gender",
            Self::ShortDescription => "sdesc",
            Self::Description => "desc",
            Self::Backstory => "backstory",
            Self::Keywords => "keywords",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::not_found("field type", s))
    }
}

/// Review status of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldStatus {
    /// Not reviewed since its value last changed.
    Unset,
    /// Accepted by the reviewer.
    Approved,
    /// Reviewed with an outstanding change request.
    Reviewed,
}

impl FieldStatus {
    /// Returns the persisted token for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "Unset",
            Self::Approved => "Approved",
            Self::Reviewed => "Reviewed",
        }
    }
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unset" => Ok(Self::Unset),
            "Approved" => Ok(Self::Approved),
            "Reviewed" => Ok(Self::Reviewed),
            other => Err(DomainError::Internal(format!(
                "unknown field status: {other}"
            ))),
        }
    }
}

/// A submitter-owned, multi-field workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Request identifier.
    pub id: Uuid,
    /// Kind of request.
    pub request_type: RequestType,
    /// Player who created the request.
    pub owner_id: Uuid,
    /// Assigned reviewer, if any.
    pub reviewer_id: Option<Uuid>,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Revision counter; scopes current vs. historical comments.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Request {
    /// Creates a new, incomplete request at version 1.
    #[must_use]
    pub fn new(id: Uuid, request_type: RequestType, owner_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            request_type,
            owner_id,
            reviewer_id: None,
            status: RequestStatus::Incomplete,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `actor_id` owns this request.
    #[must_use]
    pub fn is_owner(&self, actor_id: Uuid) -> bool {
        self.owner_id == actor_id
    }

    /// Whether `actor_id` is the assigned reviewer.
    #[must_use]
    pub fn is_reviewer(&self, actor_id: Uuid) -> bool {
        self.reviewer_id == Some(actor_id)
    }
}

/// One typed unit of data within a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field identifier.
    pub id: Uuid,
    /// Owning request.
    pub request_id: Uuid,
    /// Field type token.
    pub field_type: FieldType,
    /// Raw value; empty until the owner fills it in.
    pub value: String,
    /// Review status.
    pub status: FieldStatus,
}

impl Field {
    /// Creates an empty, unreviewed field.
    #[must_use]
    pub fn new(id: Uuid, request_id: Uuid, field_type: FieldType) -> Self {
        Self {
            id,
            request_id,
            field_type,
            value: String::new(),
            status: FieldStatus::Unset,
        }
    }

    /// Whether the field still lacks a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// A list item attached to a list-valued field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield identifier.
    pub id: Uuid,
    /// Owning field.
    pub field_id: Uuid,
    /// Raw value.
    pub value: String,
    /// Insertion order within the owning field.
    pub position: i64,
}

/// Lifecycle shape of a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeRequestShape {
    /// Authored during the current review round.
    Open,
    /// Outstanding after its review round closed.
    Active,
    /// Resolved by a later approval of its field.
    Past,
}

impl ChangeRequestShape {
    /// Returns the lowercase name of this shape.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Active => "active",
            Self::Past => "past",
        }
    }
}

impl fmt::Display for ChangeRequestShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer-authored objection to a field's value. The same identifier is
/// kept as the record moves from open to active to past.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Lineage identifier.
    pub id: Uuid,
    /// Request the field belongs to.
    pub request_id: Uuid,
    /// Field the objection is about.
    pub field_id: Uuid,
    /// Authoring reviewer.
    pub reviewer_id: Uuid,
    /// Field value when the change request was authored.
    pub value: String,
    /// Free-text rationale.
    pub text: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
}

/// A remark attached to a field at a specific request version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment identifier.
    pub id: Uuid,
    /// Owning request.
    pub request_id: Uuid,
    /// Field the remark is about.
    pub field_type: FieldType,
    /// Request version the remark was made against.
    pub version: i64,
    /// Comment being replied to, if this is a reply.
    pub parent_id: Option<Uuid>,
    /// Author.
    pub author_id: Uuid,
    /// Remark text.
    pub text: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
