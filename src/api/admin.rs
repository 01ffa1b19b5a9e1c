/// Admin endpoints: account lifecycle, sessions and media management
use crate::{
    account::{
        ChangePasswordRequest, CreateAdminRequest, LoginRequest, LoginResponse,
        RefreshTokenRequest,
    },
    api::{forms::FormData, response::Envelope},
    auth::AuthenticatedAdmin,
    context::AppContext,
    db::models::{Admin, Carousel, Contestant, Gallery},
    error::{ApiError, ApiResult},
    media::{ContestantListing, ContestantPage, ListQuery},
    token::TokenPair,
    validation::{validate_with, FieldErrors, ValidatedJson, IMAGE_RULE, MP4_RULE},
};
use axum::{
    extract::{Multipart, Query, State},
    routing::{get, post, put},
    Router,
};
use tracing::{info, warn};
use validator::Validate;

/// Routes that need no token
pub fn public_routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/create", post(create_admin))
        .route("/admin/login", post(login))
        .route("/admin/refresh-token", post(refresh_token))
}

/// Routes behind the access-token gate
pub fn protected_routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/logout", get(logout))
        .route("/admin/profile/change-password", put(change_password))
        .route("/admin/manage/carousel", post(create_carousel))
        .route("/admin/manage/gallery", post(create_gallery))
        .route("/admin/contestant/list", get(list_contestants))
}

async fn create_admin(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<CreateAdminRequest>,
) -> ApiResult<Envelope<Admin>> {
    let admin = ctx.accounts.create_admin(req).await?;
    Ok(Envelope::ok(admin))
}

async fn login(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Envelope<LoginResponse>> {
    let admin = ctx.accounts.login(&req.username, &req.password).await?;
    let tokens = ctx.tokens.issue_pair(&admin.username).await?;

    info!("Admin {} logged in", admin.username);
    Ok(Envelope::ok(LoginResponse::new(&admin, tokens)))
}

async fn refresh_token(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> ApiResult<Envelope<TokenPair>> {
    let tokens = ctx.tokens.rotate(&req.refresh_token).await.map_err(|e| {
        warn!("Refresh rejected: {}", e);
        ApiError::from(e)
    })?;

    Ok(Envelope::ok(tokens))
}

/// Revoke the presented access token's session
///
/// The paired refresh token stays valid until it is used or expires.
async fn logout(
    State(ctx): State<AppContext>,
    admin: AuthenticatedAdmin,
) -> ApiResult<Envelope> {
    let deleted = ctx.tokens.revoke_session(&admin.token_id).await?;
    if deleted == 0 {
        return Err(ApiError::Unauthorized("unauthorized".to_string()));
    }

    info!("Admin {} logged out", admin.username);
    Ok(Envelope::empty())
}

async fn change_password(
    State(ctx): State<AppContext>,
    admin: AuthenticatedAdmin,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<Envelope> {
    if req.password != req.verify {
        let mut fields = FieldErrors::new();
        fields.insert(
            "verify".to_string(),
            vec!["Password and Verify Password not equal".to_string()],
        );
        return Err(ApiError::Validation(fields));
    }

    ctx.accounts.change_password(&admin.username, req.password).await?;

    info!("Admin {} changed password", admin.username);
    Ok(Envelope::empty())
}

/// Text fields shared by carousel and gallery uploads
#[derive(Debug, Validate)]
struct MediaForm {
    #[validate(length(min = 3, message = "The title field must be minimum 3 char"))]
    title: String,
    description: String,
}

impl MediaForm {
    fn from_form(form: &FormData) -> Self {
        Self {
            title: form.text("title"),
            description: form.text("description"),
        }
    }
}

async fn create_carousel(
    State(ctx): State<AppContext>,
    admin: AuthenticatedAdmin,
    multipart: Multipart,
) -> ApiResult<Envelope<Carousel>> {
    let mut form = FormData::collect(multipart).await?;
    let fields = MediaForm::from_form(&form);

    let mut errors = FieldErrors::new();
    form.check_file(&mut errors, "content", MP4_RULE);
    validate_with(&fields, errors)?;

    let uploader = ctx.accounts.get_active(&admin.username).await?;
    let file = form.take_file("content")?;

    let carousel = ctx
        .media
        .create_carousel(&uploader, fields.title, fields.description, file)
        .await?;

    Ok(Envelope::ok(carousel))
}

async fn create_gallery(
    State(ctx): State<AppContext>,
    admin: AuthenticatedAdmin,
    multipart: Multipart,
) -> ApiResult<Envelope<Gallery>> {
    let mut form = FormData::collect(multipart).await?;
    let fields = MediaForm::from_form(&form);

    let mut errors = FieldErrors::new();
    form.check_file(&mut errors, "content", IMAGE_RULE);
    validate_with(&fields, errors)?;

    let uploader = ctx.accounts.get_active(&admin.username).await?;
    let file = form.take_file("content")?;

    let gallery = ctx
        .media
        .create_gallery(&uploader, fields.title, fields.description, file)
        .await?;

    Ok(Envelope::ok(gallery))
}

async fn list_contestants(
    State(ctx): State<AppContext>,
    _admin: AuthenticatedAdmin,
    Query(query): Query<ListQuery>,
) -> ApiResult<Envelope<ContestantPage<Contestant>>> {
    let listing = ContestantListing::from(&query);
    let page = ctx.media.list_contestants(&listing).await?;

    Ok(Envelope::ok(page))
}
