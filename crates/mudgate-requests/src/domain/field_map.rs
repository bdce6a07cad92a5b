//! A request's fields, keyed by type.

use std::collections::BTreeMap;

use mudgate_core::error::DomainError;
use mudgate_core::model::{Field, FieldStatus, FieldType};

use crate::domain::registry::RequestDefinition;

/// Every field of one request, exactly one per registered field type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    fields: BTreeMap<FieldType, Field>,
}

impl FieldMap {
    /// Indexes `fields` and checks them against `definition`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Internal` if a field type is duplicated,
    /// unregistered, or missing.
    pub fn new(definition: &RequestDefinition, fields: Vec<Field>) -> Result<Self, DomainError> {
        let mut map = BTreeMap::new();
        for field in fields {
            if definition.field(field.field_type).is_none() {
                return Err(DomainError::Internal(format!(
                    "field {} has unregistered type {}",
                    field.id, field.field_type
                )));
            }
            let field_type = field.field_type;
            if map.insert(field_type, field).is_some() {
                return Err(DomainError::Internal(format!(
                    "duplicate {field_type} field"
                )));
            }
        }
        if let Some(missing) = definition
            .fields()
            .iter()
            .find(|d| !map.contains_key(&d.field_type))
        {
            return Err(DomainError::Internal(format!(
                "missing {} field",
                missing.field_type
            )));
        }
        Ok(Self { fields: map })
    }

    /// Looks up one field.
    #[must_use]
    pub fn get(&self, field_type: FieldType) -> Option<&Field> {
        self.fields.get(&field_type)
    }

    /// Iterates fields in field type order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the map holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether any field still lacks a value.
    #[must_use]
    pub fn has_incomplete(&self) -> bool {
        self.fields.values().any(Field::is_empty)
    }

    /// Whether any field is still awaiting a review decision.
    #[must_use]
    pub fn has_unreviewed(&self) -> bool {
        self.fields.values().any(|f| f.status == FieldStatus::Unset)
    }

    /// Whether every field has been approved.
    #[must_use]
    pub fn all_approved(&self) -> bool {
        self.fields
            .values()
            .all(|f| f.status == FieldStatus::Approved)
    }
}
