//! Field navigators: walk a request's fields in registry order and pick the
//! one the owner or reviewer should look at next.

use mudgate_core::error::DomainError;
use mudgate_core::model::{ChangeRequest, Field, FieldStatus};

use crate::domain::field_map::FieldMap;
use crate::domain::registry::RequestDefinition;

/// The field to present next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextField<'a> {
    /// The selected field.
    pub field: &'a Field,
    /// Whether it is the last field in registry order.
    pub is_last: bool,
}

fn find_next<'a>(
    definition: &RequestDefinition,
    fields: &'a FieldMap,
    mut predicate: impl FnMut(&Field) -> bool,
) -> Option<NextField<'a>> {
    let order = definition.fields();
    order.iter().enumerate().find_map(|(index, d)| {
        fields
            .get(d.field_type)
            .filter(|f| predicate(*f))
            .map(|field| NextField {
                field,
                is_last: index + 1 == order.len(),
            })
    })
}

/// First field without a value.
///
/// # Errors
///
/// Returns `DomainError::NoIncompleteFields` if every field has a value.
pub fn next_incomplete_field<'a>(
    definition: &RequestDefinition,
    fields: &'a FieldMap,
) -> Result<NextField<'a>, DomainError> {
    find_next(definition, fields, Field::is_empty).ok_or(DomainError::NoIncompleteFields)
}

/// First field still awaiting a review decision.
///
/// # Errors
///
/// Returns `DomainError::NoUnreviewedFields` if every field is approved or
/// reviewed.
pub fn next_unreviewed_field<'a>(
    definition: &RequestDefinition,
    fields: &'a FieldMap,
) -> Result<NextField<'a>, DomainError> {
    find_next(definition, fields, |f| f.status == FieldStatus::Unset)
        .ok_or(DomainError::NoUnreviewedFields)
}

/// First field with an active change request the owner has not yet acted on.
/// A change request counts as addressed once the field's value differs from
/// the value it was written against.
#[must_use]
pub fn next_field_with_active_change_request<'a>(
    definition: &RequestDefinition,
    fields: &'a FieldMap,
    active: &[ChangeRequest],
) -> Option<NextField<'a>> {
    find_next(definition, fields, |f| {
        active
            .iter()
            .any(|cr| cr.field_id == f.id && cr.value == f.value)
    })
}
