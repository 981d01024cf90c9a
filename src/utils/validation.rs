use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

pub fn validate<T: Validate>(val: &T) -> Result<(), ValidationErrors> {
    val.validate()
}

/// Field-level error for a collection longer than the configured maximum.
pub fn ensure_max_len(
    field: &'static str,
    len: usize,
    max: usize,
) -> Result<(), ValidationErrors> {
    if len <= max {
        return Ok(());
    }
    let mut error = ValidationError::new("too_many");
    error.message = Some(Cow::from(format!(
        "at most {} entries are accepted, got {}",
        max, len
    )));
    let mut errors = ValidationErrors::new();
    errors.add(field, error);
    Err(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_collection_length() {
        assert!(ensure_max_len("questions", 3, 3).is_ok());
        let err = ensure_max_len("questions", 4, 3).unwrap_err();
        assert!(err.field_errors().contains_key("questions"));
    }
}
