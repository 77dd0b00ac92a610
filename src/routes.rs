use std::sync::Arc;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt as _;
use metrics::increment_counter;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use validator::Validate;

use crate::accounts::{import_users_csv, policy_for, AccountPolicy, ImportError, ImportReport};
use crate::auth::{create_jwt, Auth, Claims, Role};
use crate::config::AppConfig;
use crate::enhance::{build_captioners, build_stylizers};
use crate::error::ApiError;
use crate::ingest::{IngestPipeline, MEDIA_DIR};
use crate::models::*;
use crate::oauth::{GoogleOAuth, OAuthStateStore};
use crate::rate_limit::{InMemoryRateLimiter, PostKind, RateLimiterFacade};
use crate::repo::{CodeLinkRepo, MediaPostRepo, OfficialLinkRepo, Repo, TextPostRepo, UserRepo};
use crate::require_role;
use crate::storage::{available_key, content_type_for, MediaStore, StorageError};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/home").route(web::get().to(home)))
            .service(web::resource("/media").route(web::post().to(create_media_post)))
            .service(web::resource("/media/{id}").route(web::get().to(get_media_post)))
            .service(web::resource("/text-posts").route(web::post().to(create_text_post)))
            .service(web::resource("/code-links").route(web::post().to(create_code_link)))
            .service(web::resource("/auth/google/login").route(web::get().to(google_login)))
            .service(web::resource("/auth/google/callback").route(web::get().to(google_callback)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            // Admin endpoints
            .service(web::resource("/admin/media").route(web::get().to(admin_list_media)))
            .service(
                web::resource("/admin/media/{id}")
                    .route(web::patch().to(admin_update_media))
                    .route(web::delete().to(admin_delete_media)),
            )
            .service(web::resource("/admin/text-posts/{id}").route(web::delete().to(admin_delete_text_post)))
            .service(web::resource("/admin/code-links/{id}").route(web::delete().to(admin_delete_code_link)))
            .service(web::resource("/admin/official-links").route(web::post().to(admin_create_official_link)))
            .service(
                web::resource("/admin/official-links/{id}")
                    .route(web::patch().to(admin_update_official_link))
                    .route(web::delete().to(admin_delete_official_link)),
            )
            .service(web::resource("/admin/users").route(web::get().to(admin_list_users)))
            .service(web::resource("/admin/users/upload-csv").route(web::post().to(admin_upload_users_csv)))
            .service(web::resource("/admin/users/{id}/activate").route(web::post().to(admin_activate_user)))
            .service(web::resource("/admin/users/{id}/deactivate").route(web::post().to(admin_deactivate_user))),
    );
    // public fetch route (no /api/v1 prefix so stored URLs work in <img src>)
    cfg.route("/media/{key:.*}", web::get().to(serve_media));
}

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Arc<dyn Repo>,
    pub media_store: Arc<dyn MediaStore>,
    pub ingest: Arc<IngestPipeline>,
    pub accounts: Arc<dyn AccountPolicy>,
    pub oauth: Option<GoogleOAuth>,
    pub oauth_states: OAuthStateStore,
    pub rate_limiter: RateLimiterFacade,
}

impl AppState {
    pub fn new(config: AppConfig, repo: Arc<dyn Repo>, media_store: Arc<dyn MediaStore>) -> Self {
        let ingest = IngestPipeline::new(
            media_store.clone(),
            build_stylizers(&config.ai),
            build_captioners(&config.ai),
        );
        let rate_limiter = RateLimiterFacade::new(InMemoryRateLimiter::new(true), config.rate_limits.clone());
        Self {
            accounts: policy_for(config.account_policy),
            oauth: config.oauth.clone().map(GoogleOAuth::new),
            oauth_states: OAuthStateStore::default(),
            ingest: Arc::new(ingest),
            rate_limiter,
            repo,
            media_store,
            config: Arc::new(config),
        }
    }

    pub fn with_ingest(mut self, ingest: IngestPipeline) -> Self {
        self.ingest = Arc::new(ingest);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiterFacade) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

fn enforce_rate_limit(data: &AppState, req: &HttpRequest, kind: PostKind) -> Result<(), ApiError> {
    let client = req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string();
    if data.rate_limiter.allow(kind, &client) {
        Ok(())
    } else {
        warn!(client = %client, ?kind, "rate limit exceeded");
        Err(ApiError::TooManyRequests)
    }
}

// ---------------- Views ----------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MediaPostView {
    #[serde(flatten)]
    pub post: MediaPost,
    pub file_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file_url: Option<String>,
}

impl MediaPostView {
    fn public(store: &dyn MediaStore, post: MediaPost) -> Self {
        Self { file_url: store.url(&post.file), original_file_url: None, post }
    }

    fn admin(store: &dyn MediaStore, post: MediaPost) -> Self {
        let original_file_url = post.original_file.as_deref().map(|k| store.url(k));
        Self { file_url: store.url(&post.file), original_file_url, post }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HomeResponse {
    pub media_posts: Vec<MediaPostView>,
    pub text_posts: Vec<TextPost>,
    pub code_links: Vec<CodeLink>,
    pub official_links: Vec<OfficialLink>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/home",
    params(SearchQuery),
    responses(
        (status = 200, description = "Everything shown on the home page, newest first", body = HomeResponse)
    )
)]
pub async fn home(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse, ApiError> {
    let filter = PostFilter::search(query.q.as_deref());
    let store = data.media_store.as_ref();
    let media_posts = data
        .repo
        .list_media_posts(&filter)
        .await?
        .into_iter()
        .map(|p| MediaPostView::public(store, p))
        .collect();
    let body = HomeResponse {
        media_posts,
        text_posts: data.repo.list_text_posts(&filter).await?,
        code_links: data.repo.list_code_links(&filter).await?,
        official_links: data.repo.list_official_links().await?,
    };
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/v1/media/{id}",
    params(("id" = Id, Path, description = "Media post id")),
    responses(
        (status = 200, description = "Media post", body = MediaPostView),
        (status = 404, description = "Unknown or private post")
    )
)]
pub async fn get_media_post(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let post = data.repo.get_media_post(path.into_inner()).await?;
    if !post.is_public { return Err(ApiError::NotFound); }
    Ok(HttpResponse::Ok().json(MediaPostView::public(data.media_store.as_ref(), post)))
}

const MEDIA_SIZE_LIMIT: usize = 50 * 1024 * 1024; // 50 MiB
const CSV_SIZE_LIMIT: usize = 5 * 1024 * 1024;
const TEXT_FIELD_LIMIT: usize = 64 * 1024;

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(|e| {
        error!("multipart stream read error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        if bytes.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn read_text(field: &mut Field) -> Result<String, ApiError> {
    let bytes = read_field(field, TEXT_FIELD_LIMIT).await?;
    String::from_utf8(bytes).map_err(|_| ApiError::BadRequest("form fields must be UTF-8".into()))
}

fn is_checked(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "on" | "1" | "yes")
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// Multipart body of `POST /api/v1/media`.
#[derive(utoipa::ToSchema)]
pub struct MediaUploadForm {
    pub title: String,
    pub description: Option<String>,
    /// `true`, `on`, `1` or `yes` requests the webtoon filter.
    pub apply_filter: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Multipart body of `POST /api/v1/admin/users/upload-csv`.
#[derive(utoipa::ToSchema)]
pub struct UsersCsvForm {
    /// CSV with an `email,name` header.
    #[schema(value_type = String, format = Binary)]
    pub csv_file: Vec<u8>,
}

async fn discard_objects(store: &dyn MediaStore, keys: &[&str]) {
    for key in keys {
        if let Err(e) = store.delete(key).await {
            warn!(key, "failed to delete stored object: {e}");
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/media",
    request_body(content = MediaUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Post created", body = MediaPostView),
        (status = 400, description = "Invalid form", body = crate::error::ApiErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported media type"),
        (status = 429, description = "Too many submissions")
    )
)]
pub async fn create_media_post(
    _auth: Auth,
    req: HttpRequest,
    data: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&data, &req, PostKind::Media)?;

    let mut form = MediaPostForm::default();
    let mut upload: Option<Upload> = None;
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        error!("multipart error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        let cd = field.content_disposition();
        let name = cd.get_name().unwrap_or_default().to_string();
        let filename = cd.get_filename().map(str::to_string);
        match name.as_str() {
            "title" => form.title = read_text(&mut field).await?.trim().to_string(),
            "description" => form.description = read_text(&mut field).await?,
            "apply_filter" => form.apply_filter = is_checked(&read_text(&mut field).await?),
            "file" => {
                let bytes = read_field(&mut field, MEDIA_SIZE_LIMIT).await?;
                upload = Some(Upload { filename: filename.unwrap_or_else(|| "upload".into()), bytes });
            }
            _ => continue,
        }
    }
    form.validate()?;
    let upload = upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("file is required".into()))?;

    let mime = infer::get(&upload.bytes).map(|t| t.mime_type()).unwrap_or("application/octet-stream");
    if !(mime.starts_with("image/") || mime.starts_with("video/")) {
        return Err(ApiError::UnsupportedMediaType);
    }

    let store = data.media_store.as_ref();
    let key = available_key(store, MEDIA_DIR, &upload.filename).await.map_err(|e| {
        error!("storage key allocation failed: {e}");
        ApiError::Internal
    })?;
    store.put(&key, &upload.bytes).await.map_err(|e| {
        error!(key = %key, "media store put error: {e}");
        ApiError::Internal
    })?;

    let mut new = NewMediaPost {
        title: form.title,
        description: form.description,
        file: key,
        original_file: None,
        ai_caption: None,
        is_public: true,
        apply_filter: form.apply_filter,
    };
    data.ingest.before_save(&mut new).await;
    let keys: Vec<String> = std::iter::once(new.file.clone()).chain(new.original_file.clone()).collect();
    let mut post = match data.repo.create_media_post(new).await {
        Ok(post) => post,
        Err(e) => {
            error!("media post insert failed, discarding stored files: {e}");
            discard_objects(store, &keys.iter().map(String::as_str).collect::<Vec<_>>()).await;
            return Err(e.into());
        }
    };
    data.ingest.after_save(data.repo.as_ref(), &mut post).await;

    increment_counter!("media_posts_created_total");
    info!(id = post.id, title = %post.title, "media post created");
    Ok(HttpResponse::Created().json(MediaPostView::public(store, post)))
}

#[utoipa::path(
    post,
    path = "/api/v1/text-posts",
    request_body = NewTextPost,
    responses(
        (status = 201, description = "Post created", body = TextPost),
        (status = 400, description = "Invalid form", body = crate::error::ApiErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 429, description = "Too many submissions")
    )
)]
pub async fn create_text_post(
    _auth: Auth,
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<NewTextPost>,
) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&data, &req, PostKind::Text)?;
    let new = payload.into_inner();
    new.validate()?;
    let post = data.repo.create_text_post(new).await?;
    Ok(HttpResponse::Created().json(post))
}

#[utoipa::path(
    post,
    path = "/api/v1/code-links",
    request_body = NewCodeLink,
    responses(
        (status = 201, description = "Link created", body = CodeLink),
        (status = 400, description = "Invalid form", body = crate::error::ApiErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 429, description = "Too many submissions")
    )
)]
pub async fn create_code_link(
    _auth: Auth,
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<NewCodeLink>,
) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&data, &req, PostKind::Code)?;
    let new = payload.into_inner();
    new.validate()?;
    let link = data.repo.create_code_link(new).await?;
    Ok(HttpResponse::Created().json(link))
}

// serve stored image / video by key
pub async fn serve_media(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let key = path.into_inner();
    match data.media_store.get(&key).await {
        Ok(bytes) => Ok(HttpResponse::Ok()
            .insert_header(("Content-Type", content_type_for(&key, &bytes)))
            .body(bytes)),
        Err(StorageError::NotFound) | Err(StorageError::InvalidKey(_)) => Err(ApiError::NotFound),
        Err(e) => { error!("media store get error: {e}"); Err(ApiError::Internal) }
    }
}

// ---------------- Google login ----------------

fn oauth_not_configured() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(serde_json::json!({
        "error": "google_oauth_not_configured",
        "messages": ["Set GOOGLE_CLIENT_ID / GOOGLE_SECRET_KEY to enable Google login"]
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/google/login",
    responses(
        (status = 302, description = "Redirect to the provider"),
        (status = 503, description = "Google login not configured")
    )
)]
pub async fn google_login(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let Some(oauth) = data.oauth.as_ref() else { return Ok(oauth_not_configured()) };
    let state = data.oauth_states.issue();
    Ok(HttpResponse::Found()
        .insert_header(("Location", oauth.authorize_url(&state)))
        .finish())
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/google/callback",
    params(OAuthCallback),
    responses(
        (status = 302, description = "Signed in; redirect to the frontend with a token"),
        (status = 400, description = "Unknown state or missing code"),
        (status = 403, description = "Account awaiting approval"),
        (status = 503, description = "Google login not configured")
    )
)]
pub async fn google_callback(
    query: web::Query<OAuthCallback>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let Some(oauth) = data.oauth.as_ref() else { return Ok(oauth_not_configured()) };
    let query = query.into_inner();
    if !query.state.as_deref().map(|s| data.oauth_states.consume(s)).unwrap_or(false) {
        return Err(ApiError::BadRequest("invalid or expired login state".into()));
    }
    if let Some(err) = query.error {
        warn!("google login cancelled: {err}");
        return Err(ApiError::BadRequest(format!("login was not completed: {err}")));
    }
    let code = query.code.ok_or_else(|| ApiError::BadRequest("missing authorization code".into()))?;

    let (email, name) = oauth.exchange_code(&code).await.map_err(|e| {
        error!("google code exchange failed: {e}");
        ApiError::Internal
    })?;

    let user = match data.repo.find_user_by_email(&email).await? {
        Some(u) => u,
        None => {
            let new = if data.config.is_bootstrap_admin(&email) {
                NewUser::superuser(&email, &name)
            } else {
                NewUser::passwordless(&email, &name)
            };
            let new = data.accounts.on_user_created(new);
            let user = data.repo.create_user(new).await?;
            info!(email = %user.email, active = user.is_active, policy = data.accounts.name(), "account created from google login");
            user
        }
    };
    if !user.is_active {
        return Ok(data.accounts.on_inactive_login(&user));
    }

    let jwt = create_jwt(&data.config.secret_key, &user).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Found()
        .insert_header(("Location", format!("{}/?token={}", data.config.frontend_url, jwt)))
        .finish())
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Claims of the current token", body = Claims),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(auth.0))
}

// ---------------- Admin handlers ----------------

#[utoipa::path(
    get,
    path = "/api/v1/admin/media",
    params(SearchQuery),
    responses(
        (status = 200, description = "All media posts including private ones", body = [MediaPostView]),
        (status = 403, description = "Forbidden - Admin only")
    )
)]
pub async fn admin_list_media(auth: Auth, data: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let filter = PostFilter::search(query.q.as_deref()).with_private();
    let store = data.media_store.as_ref();
    let posts: Vec<_> = data
        .repo
        .list_media_posts(&filter)
        .await?
        .into_iter()
        .map(|p| MediaPostView::admin(store, p))
        .collect();
    Ok(HttpResponse::Ok().json(posts))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/media/{id}",
    request_body = UpdateMediaPost,
    params(("id" = Id, Path, description = "Media post id")),
    responses(
        (status = 200, description = "Post updated", body = MediaPostView),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn admin_update_media(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateMediaPost>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let upd = payload.into_inner();
    upd.validate()?;
    let mut post = data.repo.get_media_post(path.into_inner()).await?;
    if let Some(title) = upd.title { post.title = title; }
    if let Some(description) = upd.description { post.description = description; }
    if let Some(is_public) = upd.is_public { post.is_public = is_public; }

    data.ingest.before_save(&mut post).await;
    let mut post = data.repo.save_media_post(&post).await?;
    data.ingest.after_save(data.repo.as_ref(), &mut post).await;
    Ok(HttpResponse::Ok().json(MediaPostView::admin(data.media_store.as_ref(), post)))
}

pub async fn admin_delete_media(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let post = data.repo.delete_media_post(path.into_inner()).await?;
    let keys: Vec<&str> = std::iter::once(post.file.as_str()).chain(post.original_file.as_deref()).collect();
    discard_objects(data.media_store.as_ref(), &keys).await;
    info!(id = post.id, "media post deleted");
    Ok(HttpResponse::NoContent().finish())
}

pub async fn admin_delete_text_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> { require_role!(auth, Role::Admin); data.repo.delete_text_post(path.into_inner()).await?; Ok(HttpResponse::NoContent().finish()) }
pub async fn admin_delete_code_link(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> { require_role!(auth, Role::Admin); data.repo.delete_code_link(path.into_inner()).await?; Ok(HttpResponse::NoContent().finish()) }
pub async fn admin_delete_official_link(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> { require_role!(auth, Role::Admin); data.repo.delete_official_link(path.into_inner()).await?; Ok(HttpResponse::NoContent().finish()) }

#[utoipa::path(
    post,
    path = "/api/v1/admin/official-links",
    request_body = NewOfficialLink,
    responses(
        (status = 201, description = "Link created", body = OfficialLink),
        (status = 400, description = "Invalid form", body = crate::error::ApiErrorBody),
        (status = 403, description = "Forbidden - Admin only")
    )
)]
pub async fn admin_create_official_link(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewOfficialLink>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let new = payload.into_inner();
    new.validate()?;
    let link = data.repo.create_official_link(new).await?;
    Ok(HttpResponse::Created().json(link))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/official-links/{id}",
    request_body = UpdateOfficialLink,
    params(("id" = Id, Path, description = "Official link id")),
    responses(
        (status = 200, description = "Link updated", body = OfficialLink),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 404, description = "Link not found")
    )
)]
pub async fn admin_update_official_link(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateOfficialLink>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let upd = payload.into_inner();
    upd.validate()?;
    let link = data.repo.update_official_link(path.into_inner(), upd).await?;
    Ok(HttpResponse::Ok().json(link))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    responses(
        (status = 200, description = "All accounts", body = [User]),
        (status = 403, description = "Forbidden - Admin only")
    )
)]
pub async fn admin_list_users(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    Ok(HttpResponse::Ok().json(data.repo.list_users().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/activate",
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "Account approved", body = User),
        (status = 403, description = "Forbidden - Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn admin_activate_user(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let user = data.repo.set_user_active(path.into_inner(), true).await?;
    info!(email = %user.email, "account activated");
    Ok(HttpResponse::Ok().json(user))
}

pub async fn admin_deactivate_user(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let user = data.repo.set_user_active(path.into_inner(), false).await?;
    info!(email = %user.email, "account deactivated");
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/upload-csv",
    request_body(content = UsersCsvForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import summary", body = ImportReport),
        (status = 400, description = "Not a CSV file or header incomplete", body = crate::error::ApiErrorBody),
        (status = 403, description = "Forbidden - Admin only")
    )
)]
pub async fn admin_upload_users_csv(auth: Auth, data: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        error!("multipart error: {e}");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        let cd = field.content_disposition();
        if cd.get_name() != Some("csv_file") { continue; }
        let filename = cd.get_filename().unwrap_or_default().to_string();
        if !filename.to_ascii_lowercase().ends_with(".csv") {
            return Err(ApiError::BadRequest("only .csv files can be uploaded".into()));
        }
        let bytes = read_field(&mut field, CSV_SIZE_LIMIT).await?;
        let report = import_users_csv(data.repo.as_ref(), &bytes).await.map_err(|e| match e {
            ImportError::Repo(r) => ApiError::from(r),
            other => ApiError::BadRequest(other.to_string()),
        })?;
        return Ok(HttpResponse::Ok().json(report));
    }
    Err(ApiError::BadRequest("csv_file is required".into()))
}
