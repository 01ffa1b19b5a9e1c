/// Multipart form collection for upload endpoints
use crate::{
    error::ApiError,
    media::UploadedFile,
    transcode,
    validation::{check_file, FieldErrors, FileRule},
};
use axum::extract::{multipart::MultipartError, Multipart};
use std::collections::HashMap;
use tracing::debug;

/// A file part as received, before validation
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Sniffed from the content; the client's declared type is ignored
    pub detected_mime: Option<&'static str>,
}

/// Text fields and file parts of a multipart body
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, FilePart>,
}

fn malformed(e: MultipartError) -> ApiError {
    let mut fields = FieldErrors::new();
    fields.insert("body".to_string(), vec![e.body_text()]);
    ApiError::Validation(fields)
}

impl FormData {
    /// Drain a multipart body; parts with a file name are files, the rest text
    ///
    /// Repeated names keep the first occurrence.
    pub async fn collect(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);

            match file_name {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(malformed)?.to_vec();
                    let detected_mime = transcode::sniff_mime(&bytes);
                    debug!(
                        "Form file {}: {} ({} bytes, {:?})",
                        name,
                        file_name,
                        bytes.len(),
                        detected_mime
                    );
                    form.files.entry(name).or_insert(FilePart {
                        file_name,
                        bytes,
                        detected_mime,
                    });
                }
                None => {
                    let value = field.text().await.map_err(malformed)?;
                    form.fields.entry(name).or_insert(value);
                }
            }
        }

        Ok(form)
    }

    /// Text field value, empty when absent
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Check the file part `name` against `rule`, recording failures in `errors`
    pub fn check_file(&self, errors: &mut FieldErrors, name: &str, rule: FileRule) {
        let part = self.files.get(name);
        check_file(
            errors,
            name,
            part.map(|p| p.file_name.as_str()),
            part.and_then(|p| p.detected_mime),
            rule,
        );
    }

    /// Take a file part that already passed [`FormData::check_file`]
    pub fn take_file(&mut self, name: &str) -> Result<UploadedFile, ApiError> {
        let part = self
            .files
            .remove(name)
            .ok_or_else(|| ApiError::Internal(format!("file part {} missing after validation", name)))?;

        Ok(UploadedFile {
            file_name: part.file_name,
            mime_type: part.detected_mime.unwrap_or("application/octet-stream").to_string(),
            bytes: part.bytes,
        })
    }
}
