/// Request validation
///
/// Declarative rules live on the request structs (`validator` derive); this module
/// turns rule failures into the `{field: [messages]}` map returned to clients and
/// provides the custom rules the derive attributes reference.
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError, ValidationErrors};

/// Field name -> list of human readable messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Rust field name to the camelCase key clients send
fn wire_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Flatten `validator` errors into the client-facing field map
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();

    for (field, errs) in errors.field_errors() {
        let field = wire_name(field.as_ref());
        let messages = errs
            .iter()
            .map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("The {} field is invalid", field),
            })
            .collect::<Vec<_>>();
        fields.entry(field).or_default().extend(messages);
    }

    fields
}

/// Run a struct's declared rules and merge in extra (e.g. file) failures
pub fn validate_with<T: Validate>(value: &T, mut extra: FieldErrors) -> Result<(), ApiError> {
    if let Err(errors) = value.validate() {
        for (field, messages) in field_errors(&errors) {
            extra.entry(field).or_default().extend(messages);
        }
    }

    if extra.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(extra))
    }
}

/// JSON body extractor that runs the payload's validation rules
///
/// Malformed JSON and rule failures both surface as `ApiError::Validation`
/// before any handler code runs.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                let mut fields = FieldErrors::new();
                fields.insert("body".to_string(), vec![rejection.body_text()]);
                ApiError::Validation(fields)
            })?;

        validate_with(&value, FieldErrors::new())?;

        Ok(ValidatedJson(value))
    }
}

/// `alpha_num`: ASCII letters and digits only
pub fn validate_alpha_num(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("alpha_num")
            .with_message("The field may only contain letters and numbers".into()))
    }
}

/// Indonesian telephone number (`0…`, `62…` or `+62…` prefix)
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let invalid = || {
        ValidationError::new("phone")
            .with_message("The phone field must be an Indonesian Telephone Number".into())
    };

    let national = value
        .strip_prefix("+62")
        .or_else(|| value.strip_prefix("62"))
        .or_else(|| value.strip_prefix('0'))
        .ok_or_else(invalid)?;

    if national.is_empty() || !national.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    // National significant numbers never start with 0. Mobile numbers (8xx) carry
    // 9-12 digits, fixed lines 7-11 digits including the area code.
    let len = national.len();
    let valid = match national.as_bytes()[0] {
        b'0' => false,
        b'8' => (9..=12).contains(&len),
        _ => (7..=11).contains(&len),
    };

    if valid {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Rules for an uploaded file part
#[derive(Debug, Clone, Copy)]
pub struct FileRule {
    pub extensions: &'static [&'static str],
    pub mime_types: &'static [&'static str],
}

pub const MP4_RULE: FileRule = FileRule {
    extensions: &["mp4"],
    mime_types: &["video/mp4"],
};

pub const IMAGE_RULE: FileRule = FileRule {
    extensions: &["jpg", "jpeg", "png"],
    mime_types: &["image/jpg", "image/jpeg", "image/png"],
};

/// Check a (possibly missing) file part against a rule
///
/// `detected_mime` is the type sniffed from the content, not the one the client
/// declared.
pub fn check_file(
    errors: &mut FieldErrors,
    field: &str,
    file_name: Option<&str>,
    detected_mime: Option<&str>,
    rule: FileRule,
) {
    let Some(file_name) = file_name else {
        errors
            .entry(field.to_string())
            .or_default()
            .push(format!("The {} field is required", field));
        return;
    };

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !rule.extensions.contains(&extension.as_str()) {
        errors.entry(field.to_string()).or_default().push(format!(
            "The {} field file extension {} is invalid",
            field,
            if extension.is_empty() { "(none)" } else { extension.as_str() }
        ));
    }

    match detected_mime {
        Some(mime) if rule.mime_types.contains(&mime) => {}
        _ => errors.entry(field.to_string()).or_default().push(format!(
            "The {} field file mime type is invalid",
            field
        )),
    }
}
