/// Public contestant submission endpoints
use crate::{
    api::{forms::FormData, response::Envelope},
    context::AppContext,
    db::models::Contestant,
    error::{ApiError, ApiResult},
    media::ContestantSubmission,
    validation::{validate_phone, validate_with, FieldErrors, MP4_RULE},
};
use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Router,
};
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/contest/uploadVideo", post(upload_video))
        .route("/contest/video/:id", get(get_video))
}

#[derive(Debug, Validate)]
struct SubmissionForm {
    #[validate(length(min = 3, message = "The name field must be minimum 3 char"))]
    name: String,
    #[validate(email(message = "The email field must be a valid email address"))]
    email: String,
    #[validate(length(min = 8, message = "The school field must be minimum 8 char"))]
    school: String,
    #[validate(length(min = 1, message = "The title field is required"))]
    title: String,
    #[validate(custom(function = "validate_phone"))]
    phone: String,
}

impl From<SubmissionForm> for ContestantSubmission {
    fn from(form: SubmissionForm) -> Self {
        Self {
            name: form.name,
            email: form.email,
            phone: form.phone,
            school: form.school,
            title: form.title,
        }
    }
}

async fn upload_video(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> ApiResult<Envelope<Contestant>> {
    let mut form = FormData::collect(multipart).await?;
    let fields = SubmissionForm {
        name: form.text("name"),
        email: form.text("email"),
        school: form.text("school"),
        title: form.text("title"),
        phone: form.text("phone"),
    };

    let mut errors = FieldErrors::new();
    form.check_file(&mut errors, "video", MP4_RULE);
    validate_with(&fields, errors)?;

    let video = form.take_file("video")?;
    let contestant = ctx.media.submit_contestant(fields.into(), video).await?;

    Ok(Envelope::ok(contestant))
}

fn data_not_found() -> ApiError {
    ApiError::NotFound("Data Not Found".to_string())
}

async fn get_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Contestant>> {
    let id = Uuid::parse_str(&id).map_err(|_| data_not_found())?;

    let contestant = ctx
        .media
        .get_contestant(&id.to_string())
        .await?
        .ok_or_else(data_not_found)?;

    Ok(Envelope::ok(contestant))
}
