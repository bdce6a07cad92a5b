//! Field definition registry.
//!
//! Static description of every request type: which field types it carries,
//! in what order, how each value is validated, and which fields are
//! list-valued. Built once and read-only afterwards.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use mudgate_core::error::DomainError;
use mudgate_core::model::{FieldType, RequestType};

use crate::domain::field_map::FieldMap;
use crate::domain::validators::{GENDERS, Validator};

/// Permission required to pick up and review character applications.
pub const REVIEW_CHARACTER_APPLICATIONS: &str = "ReviewCharacterApplications";

/// Title placeholder for a request whose naming field is still empty.
pub const UNNAMED: &str = "Unnamed";

/// Default cap on a player's non-terminal requests of one type.
pub const DEFAULT_MAX_OPEN_PER_OWNER: usize = 20;

static STANDARD: LazyLock<Registry> =
    LazyLock::new(|| Registry::new(vec![character_application()]));

/// Cardinality rules for a list-valued field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubfieldConfig {
    /// Whether the field needs at least `min_values` items to count as set.
    pub require: bool,
    /// Minimum number of items.
    pub min_values: usize,
    /// Maximum number of items.
    pub max_values: usize,
    /// Whether items must be pairwise distinct.
    pub unique: bool,
}

impl SubfieldConfig {
    /// A required, unique list of `min_values..=max_values` items.
    #[must_use]
    pub fn new(min_values: usize, max_values: usize) -> Self {
        Self {
            require: true,
            min_values,
            max_values,
            unique: true,
        }
    }

    /// Number of items after which the derived field value is populated.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.min_values.max(1)
    }
}

/// Definition of one field within a request type.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Field type token.
    pub field_type: FieldType,
    /// Human-readable label.
    pub label: &'static str,
    /// Guidance shown to the owner.
    pub description: &'static str,
    /// Rule for the field's value, or for each item of a list-valued field.
    pub validator: Validator,
    /// Present when the field is list-valued.
    pub subfields: Option<SubfieldConfig>,
}

impl FieldDefinition {
    /// Creates a scalar field definition.
    #[must_use]
    pub fn new(
        field_type: FieldType,
        label: &'static str,
        description: &'static str,
        validator: Validator,
    ) -> Self {
        Self {
            field_type,
            label,
            description,
            validator,
            subfields: None,
        }
    }

    /// Makes this definition list-valued.
    #[must_use]
    pub fn with_subfields(mut self, config: SubfieldConfig) -> Self {
        self.subfields = Some(config);
        self
    }

    /// Whether values are managed as subfields.
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.subfields.is_some()
    }

    /// Whether `value` is acceptable for this field (or for one item of it).
    #[must_use]
    pub fn is_valid(&self, value: &str) -> bool {
        self.validator.is_valid(value)
    }
}

/// Definition of a request type.
#[derive(Debug, Clone)]
pub struct RequestDefinition {
    /// Request type token.
    pub request_type: RequestType,
    /// Human-readable label, used in titles.
    pub label: &'static str,
    /// Permission a reviewer must hold.
    pub review_permission: &'static str,
    /// Cap on an owner's non-terminal requests of this type.
    pub max_open_per_owner: usize,
    /// Field whose value names the request in its title.
    pub title_field: Option<FieldType>,
    fields: Vec<FieldDefinition>,
}

impl RequestDefinition {
    /// Creates a definition with `fields` in presentation order.
    #[must_use]
    pub fn new(
        request_type: RequestType,
        label: &'static str,
        review_permission: &'static str,
        fields: Vec<FieldDefinition>,
    ) -> Self {
        Self {
            request_type,
            label,
            review_permission,
            max_open_per_owner: DEFAULT_MAX_OPEN_PER_OWNER,
            title_field: None,
            fields,
        }
    }

    /// Overrides the per-owner cap.
    #[must_use]
    pub fn with_max_open_per_owner(mut self, max: usize) -> Self {
        self.max_open_per_owner = max;
        self
    }

    /// Sets the field that names the request in its title.
    #[must_use]
    pub fn with_title_field(mut self, field_type: FieldType) -> Self {
        self.title_field = Some(field_type);
        self
    }

    /// Field definitions in presentation order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Looks up one field definition.
    #[must_use]
    pub fn field(&self, field_type: FieldType) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.field_type == field_type)
    }

    /// Display title of a request, e.g. `Character Application (Testify)`.
    #[must_use]
    pub fn title(&self, fields: &FieldMap) -> String {
        let name = self
            .title_field
            .and_then(|ft| fields.get(ft))
            .map(|f| f.value.as_str())
            .filter(|v| !v.is_empty())
            .unwrap_or(UNNAMED);
        format!("{} ({name})", self.label)
    }
}

/// Every known request definition, keyed by type.
#[derive(Debug, Clone)]
pub struct Registry {
    definitions: BTreeMap<RequestType, RequestDefinition>,
}

impl Registry {
    /// Builds a registry. A later definition for the same type replaces an
    /// earlier one.
    #[must_use]
    pub fn new(definitions: Vec<RequestDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|d| (d.request_type, d))
                .collect(),
        }
    }

    /// The registry of built-in request types.
    #[must_use]
    pub fn standard() -> &'static Registry {
        &STANDARD
    }

    /// Every registered definition, in request type order.
    pub fn definitions(&self) -> impl Iterator<Item = &RequestDefinition> {
        self.definitions.values()
    }

    /// Looks up a request definition.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the type is not registered.
    pub fn definition(&self, request_type: RequestType) -> Result<&RequestDefinition, DomainError> {
        self.definitions
            .get(&request_type)
            .ok_or_else(|| DomainError::not_found("request definition", request_type))
    }

    /// Whether `token` names a field of `request_type`.
    #[must_use]
    pub fn is_field_type_valid(&self, request_type: RequestType, token: &str) -> bool {
        self.field_definition_by_token(request_type, token).is_ok()
    }

    /// Looks up a field definition.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if either the request type or the
    /// field type is not registered.
    pub fn field_definition(
        &self,
        request_type: RequestType,
        field_type: FieldType,
    ) -> Result<&FieldDefinition, DomainError> {
        self.definition(request_type)?
            .field(field_type)
            .ok_or_else(|| DomainError::not_found("field type", field_type))
    }

    /// Looks up a field definition by its string token.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the token is unknown or not
    /// registered for `request_type`.
    pub fn field_definition_by_token(
        &self,
        request_type: RequestType,
        token: &str,
    ) -> Result<&FieldDefinition, DomainError> {
        let field_type: FieldType = token.parse()?;
        self.field_definition(request_type, field_type)
    }

    /// Returns the subfield rules of a field, if it is list-valued.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the field is not registered.
    pub fn subfield_config(
        &self,
        request_type: RequestType,
        field_type: FieldType,
    ) -> Result<Option<SubfieldConfig>, DomainError> {
        Ok(self.field_definition(request_type, field_type)?.subfields)
    }
}

/// The character application: six fields, keywords list-valued.
#[must_use]
pub fn character_application() -> RequestDefinition {
    RequestDefinition::new(
        RequestType::CharacterApplication,
        "Character Application",
        REVIEW_CHARACTER_APPLICATIONS,
        vec![
            FieldDefinition::new(
                FieldType::Name,
                "Name",
                "Your character's name",
                Validator::text(4, 16, r"[^a-zA-Z'-]"),
            ),
            FieldDefinition::new(
                FieldType::Gender,
                "Gender",
                "Your character's gender determines the pronouns used by third-person descriptions in the game",
                Validator::one_of(GENDERS),
            ),
            FieldDefinition::new(
                FieldType::ShortDescription,
                "Short Description",
                "This is how your character will appear in third-person descriptions during the game",
                Validator::text(8, 300, r"[^a-zA-Z, -]"),
            ),
            FieldDefinition::new(
                FieldType::Description,
                "Description",
                "This is how your character will appear when examined",
                Validator::text(32, 2000, r"[^a-zA-Z, '\-.!()]"),
            ),
            FieldDefinition::new(
                FieldType::Backstory,
                "Backstory",
                "This is your character's private backstory",
                Validator::text(500, 10000, r#"[^a-zA-Z, "'\-.?!()\r\n]"#),
            ),
            FieldDefinition::new(
                FieldType::Keywords,
                "Keywords",
                "Words other players can use to refer to your character",
                Validator::text(2, 300, r"[^a-zA-Z]"),
            )
            .with_subfields(SubfieldConfig::new(2, 10)),
        ],
    )
    .with_title_field(FieldType::Name)
}
