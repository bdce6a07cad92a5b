//! Command handlers for field values, list items and field review.

use mudgate_core::error::DomainError;
use mudgate_core::model::{ChangeRequestShape, Field, FieldStatus, Request, Subfield};
use mudgate_core::repository::RequestTransaction;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::change_requests::resolve_to_past;
use crate::application::support::{ensure_editable, ensure_reviewing, load_field, load_request};
use crate::domain::commands::{
    CreateSubfield, DeleteSubfield, ReviewField, UpdateField, UpdateSubfield,
};
use crate::domain::registry::{FieldDefinition, Registry, SubfieldConfig};

fn list_config(definition: &FieldDefinition) -> Result<SubfieldConfig, DomainError> {
    definition.subfields.ok_or_else(|| {
        DomainError::InvalidInput(format!("{} is not list-valued", definition.field_type))
    })
}

/// Recomputes a list-valued field's value from its items. Writes the field
/// (and resets its review status) only if the value changed.
async fn refresh_list_value(
    tx: &mut dyn RequestTransaction,
    field: &mut Field,
    config: SubfieldConfig,
    items: &[Subfield],
) -> Result<(), DomainError> {
    let value = if items.len() >= config.threshold() {
        items
            .iter()
            .map(|s| s.value.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        String::new()
    };
    if value != field.value {
        field.value = value;
        field.status = FieldStatus::Unset;
        tx.update_field(field).await?;
    }
    Ok(())
}

/// Loads a subfield and its parent field, and checks both belong to
/// `request`.
async fn load_subfield_for(
    tx: &mut dyn RequestTransaction,
    request: &Request,
    subfield_id: Uuid,
) -> Result<(Subfield, Field), DomainError> {
    let subfield = tx
        .load_subfield(subfield_id)
        .await?
        .ok_or_else(|| DomainError::not_found("subfield", subfield_id))?;
    let field = tx.load_field(subfield.field_id).await?.ok_or_else(|| {
        DomainError::Internal(format!(
            "subfield {subfield_id} references missing field {}",
            subfield.field_id
        ))
    })?;
    if field.request_id != request.id {
        return Err(DomainError::not_found("subfield", subfield_id));
    }
    Ok((subfield, field))
}

/// Handles the `UpdateField` command: validates the value against the
/// registry and stores it. A changed value sends the field back to review.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request or field type is unknown,
/// `DomainError::Forbidden` if the actor may not edit the request,
/// `DomainError::InvalidInput` if the value fails validation or the field is
/// list-valued, and `DomainError::Conflict` if the value is unchanged.
#[instrument(skip_all, fields(request_id = %command.request_id, field_type = %command.field_type))]
pub async fn handle_update_field(
    command: &UpdateField,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<Field, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling update_field command");

    let request = load_request(tx, command.request_id).await?;
    let definition = registry.field_definition_by_token(request.request_type, &command.field_type)?;
    ensure_editable(command.actor_id, &request)?;
    if definition.is_list() {
        return Err(DomainError::InvalidInput(format!(
            "{} is list-valued; edit its items instead",
            definition.field_type
        )));
    }
    let value = definition.validator.clean(definition.label, &command.value)?;

    let mut field = load_field(tx, request.id, definition.field_type).await?;
    if field.value == value {
        return Err(DomainError::Conflict(format!(
            "{} already has that value",
            definition.field_type
        )));
    }
    field.value = value;
    field.status = FieldStatus::Unset;
    tx.update_field(&field).await?;

    Ok(field)
}

/// Handles the `CreateSubfield` command: appends an item to a list-valued
/// field.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request or field type is unknown,
/// `DomainError::InvalidInput` if the field is not list-valued or the value
/// fails validation, and `DomainError::Forbidden` if the actor may not edit
/// the request, the field is full, or the value duplicates an item of a
/// unique list.
#[instrument(skip_all, fields(request_id = %command.request_id, field_type = %command.field_type))]
pub async fn handle_create_subfield(
    command: &CreateSubfield,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<Subfield, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling create_subfield command");

    let request = load_request(tx, command.request_id).await?;
    let definition = registry.field_definition_by_token(request.request_type, &command.field_type)?;
    let config = list_config(definition)?;
    ensure_editable(command.actor_id, &request)?;
    let value = definition.validator.clean(definition.label, &command.value)?;

    let mut field = load_field(tx, request.id, definition.field_type).await?;
    let mut items = tx.list_subfields(field.id).await?;
    if items.len() >= config.max_values {
        return Err(DomainError::Forbidden(format!(
            "{} already has {} items",
            definition.field_type, config.max_values
        )));
    }
    if config.unique && items.iter().any(|s| s.value == value) {
        return Err(DomainError::Forbidden(format!(
            "{} already contains that item",
            definition.field_type
        )));
    }

    let subfield = Subfield {
        id: Uuid::new_v4(),
        field_id: field.id,
        value,
        position: items.iter().map(|s| s.position).max().map_or(0, |p| p + 1),
    };
    tx.insert_subfield(&subfield).await?;
    items.push(subfield.clone());
    refresh_list_value(tx, &mut field, config, &items).await?;

    Ok(subfield)
}

/// Handles the `UpdateSubfield` command: changes one item of a list-valued
/// field.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request or subfield is unknown,
/// `DomainError::Forbidden` if the actor may not edit the request,
/// `DomainError::InvalidInput` if the value fails validation,
/// `DomainError::Conflict` if the value is unchanged or duplicates a sibling
/// of a unique list, and `DomainError::Internal` if the subfield's parent
/// field is missing.
#[instrument(
    skip_all,
    fields(request_id = %command.request_id, subfield_id = %command.subfield_id)
)]
pub async fn handle_update_subfield(
    command: &UpdateSubfield,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<Subfield, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling update_subfield command");

    let request = load_request(tx, command.request_id).await?;
    let (mut subfield, mut field) = load_subfield_for(tx, &request, command.subfield_id).await?;
    let definition = registry.field_definition(request.request_type, field.field_type)?;
    let config = list_config(definition)?;
    ensure_editable(command.actor_id, &request)?;
    let value = definition.validator.clean(definition.label, &command.value)?;

    if subfield.value == value {
        return Err(DomainError::Conflict("item already has that value".into()));
    }
    let mut items = tx.list_subfields(field.id).await?;
    if config.unique
        && items
            .iter()
            .any(|s| s.id != subfield.id && s.value == value)
    {
        return Err(DomainError::Conflict(format!(
            "{} already contains that item",
            definition.field_type
        )));
    }

    subfield.value = value;
    tx.update_subfield(&subfield).await?;
    if let Some(item) = items.iter_mut().find(|s| s.id == subfield.id) {
        item.value.clone_from(&subfield.value);
    }
    refresh_list_value(tx, &mut field, config, &items).await?;

    Ok(subfield)
}

/// Handles the `DeleteSubfield` command: removes one item of a list-valued
/// field.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request or subfield is unknown,
/// `DomainError::Forbidden` if the actor may not edit the request or the
/// removal would leave fewer items than the field's minimum, and
/// `DomainError::Internal` if the subfield's parent field is missing.
#[instrument(
    skip_all,
    fields(request_id = %command.request_id, subfield_id = %command.subfield_id)
)]
pub async fn handle_delete_subfield(
    command: &DeleteSubfield,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<(), DomainError> {
    info!(correlation_id = %command.correlation_id, "handling delete_subfield command");

    let request = load_request(tx, command.request_id).await?;
    let (subfield, mut field) = load_subfield_for(tx, &request, command.subfield_id).await?;
    let definition = registry.field_definition(request.request_type, field.field_type)?;
    let config = list_config(definition)?;
    ensure_editable(command.actor_id, &request)?;

    let mut items = tx.list_subfields(field.id).await?;
    if items.len() <= config.min_values {
        return Err(DomainError::Forbidden(format!(
            "{} needs at least {} items",
            definition.field_type, config.min_values
        )));
    }

    tx.delete_subfield(subfield.id).await?;
    items.retain(|s| s.id != subfield.id);
    refresh_list_value(tx, &mut field, config, &items).await?;

    Ok(())
}

/// Handles the `ReviewField` command: the assigned reviewer's decision on a
/// field. With an open change request outstanding the field is `Reviewed`;
/// otherwise it is `Approved` and any active change request for it is
/// resolved.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the request or field type is unknown
/// and `DomainError::Forbidden` unless the actor is the assigned, non-owner
/// reviewer of an `InReview` request.
#[instrument(skip_all, fields(request_id = %command.request_id, field_type = %command.field_type))]
pub async fn handle_review_field(
    command: &ReviewField,
    registry: &Registry,
    tx: &mut dyn RequestTransaction,
) -> Result<Field, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling review_field command");

    let request = load_request(tx, command.request_id).await?;
    let definition = registry.field_definition_by_token(request.request_type, &command.field_type)?;
    ensure_reviewing(command.actor_id, &request, "review fields of")?;

    let mut field = load_field(tx, request.id, definition.field_type).await?;
    let open = tx
        .list_change_requests_for_field(ChangeRequestShape::Open, field.id)
        .await?;
    if open.is_empty() {
        field.status = FieldStatus::Approved;
        tx.update_field(&field).await?;
        resolve_to_past(tx, field.id).await?;
    } else {
        field.status = FieldStatus::Reviewed;
        tx.update_field(&field).await?;
    }
    info!(field_id = %field.id, status = %field.status, "field reviewed");

    Ok(field)
}
