use std::collections::HashMap;

use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// Field name to the messages that field failed with.
pub type FieldErrors = HashMap<String, Vec<String>>;

pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut error_map = HashMap::new();

    for (field, field_errors) in errors.field_errors() {
        let error_messages: Vec<String> = field_errors
            .iter()
            .map(|error| {
                error
                    .message
                    .clone()
                    .unwrap_or_else(|| "Invalid value".into())
                    .to_string()
            })
            .collect();

        error_map.insert(field.to_string(), error_messages);
    }

    error_map
}

pub fn with_error(field: &str, message: &str) -> FieldErrors {
    let mut errors = HashMap::new();
    errors.insert(field.to_string(), vec![message.to_string()]);
    errors
}

pub fn validate_form<T: Validate>(form: &T) -> Result<(), AppError> {
    form.validate()
        .map_err(|errors| AppError::IncompleteStep(field_errors(&errors)))
}

pub(crate) fn describe_field_errors(errors: &FieldErrors) -> String {
    let mut fields: Vec<&str> = errors.keys().map(String::as_str).collect();
    fields.sort_unstable();
    fields.join(", ")
}
