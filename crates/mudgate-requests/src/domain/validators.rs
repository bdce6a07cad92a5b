//! String validators for field values and free-text inputs.

use std::sync::LazyLock;

use mudgate_core::error::DomainError;
use regex::Regex;

/// Accepted gender tokens.
pub const GENDERS: &[&str] = &["NonBinary", "Female", "Male"];

/// Minimum length of a change request's text.
pub const MIN_CHANGE_REQUEST_TEXT_LEN: usize = 10;
/// Maximum length of a change request's text.
pub const MAX_CHANGE_REQUEST_TEXT_LEN: usize = 1000;
/// Minimum length of a comment's text.
pub const MIN_COMMENT_TEXT_LEN: usize = 1;
/// Maximum length of a comment's text.
pub const MAX_COMMENT_TEXT_LEN: usize = 500;

/// Characters accepted in change request and comment text.
const FREE_TEXT_DISALLOWED: &str = r#"[^a-zA-Z, "'\-.?!()\r\n]"#;

/// Validates a change request's text.
pub static CHANGE_REQUEST_TEXT: LazyLock<Validator> = LazyLock::new(|| {
    Validator::text(
        MIN_CHANGE_REQUEST_TEXT_LEN,
        MAX_CHANGE_REQUEST_TEXT_LEN,
        FREE_TEXT_DISALLOWED,
    )
});

/// Validates a comment's text.
pub static COMMENT_TEXT: LazyLock<Validator> = LazyLock::new(|| {
    Validator::text(
        MIN_COMMENT_TEXT_LEN,
        MAX_COMMENT_TEXT_LEN,
        FREE_TEXT_DISALLOWED,
    )
});

/// A rule a raw string value must satisfy.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Length within `[min_len, max_len]` and no character matched by
    /// `disallowed`.
    Text {
        /// Minimum length in bytes.
        min_len: usize,
        /// Maximum length in bytes.
        max_len: usize,
        /// Matches any character that may not appear in the value.
        disallowed: Regex,
    },
    /// Exactly one of a fixed set of tokens.
    OneOf(&'static [&'static str]),
}

impl Validator {
    /// Builds a [`Validator::Text`] from a disallowed-character pattern.
    ///
    /// # Panics
    ///
    /// Panics if `disallowed` is not a valid regular expression. Patterns
    /// are compile-time literals.
    #[must_use]
    pub fn text(min_len: usize, max_len: usize, disallowed: &str) -> Self {
        Self::Text {
            min_len,
            max_len,
            disallowed: Regex::new(disallowed).expect("disallowed pattern is a valid regex"),
        }
    }

    /// Builds a [`Validator::OneOf`].
    #[must_use]
    pub fn one_of(values: &'static [&'static str]) -> Self {
        Self::OneOf(values)
    }

    /// Whether `value` satisfies this rule.
    #[must_use]
    pub fn is_valid(&self, value: &str) -> bool {
        match self {
            Self::Text {
                min_len,
                max_len,
                disallowed,
            } => {
                (*min_len..=*max_len).contains(&value.len()) && !disallowed.is_match(value)
            }
            Self::OneOf(values) => values.contains(&value),
        }
    }

    /// Strips every disallowed character from `value`. Tokens of a
    /// [`Validator::OneOf`] pass through unchanged.
    #[must_use]
    pub fn sanitize(&self, value: &str) -> String {
        match self {
            Self::Text { disallowed, .. } => disallowed.replace_all(value, "").into_owned(),
            Self::OneOf(_) => value.to_owned(),
        }
    }

    /// Sanitizes `value` and checks what remains, returning the cleaned
    /// value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the cleaned value fails the
    /// rule.
    pub fn clean(&self, what: &str, value: &str) -> Result<String, DomainError> {
        let cleaned = self.sanitize(value);
        self.check(what, &cleaned)?;
        Ok(cleaned)
    }

    /// Checks `value`, naming `what` in the error.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the value fails the rule.
    pub fn check(&self, what: &str, value: &str) -> Result<(), DomainError> {
        if self.is_valid(value) {
            Ok(())
        } else {
            Err(DomainError::InvalidInput(format!("{what} is invalid")))
        }
    }
}
