use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}

impl ValidationError {
    pub(crate) fn must_be_positive(field: &str) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.to_string(),
            constraint: "must be greater than 0".to_string(),
        }
    }

    pub(crate) fn must_be_at_most(field: &str, max: usize) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.to_string(),
            constraint: format!("must be at most {max}"),
        }
    }
}
