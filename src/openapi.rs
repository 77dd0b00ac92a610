use crate::models::{CodeCategory, CodeLink, IconKind, NewCodeLink, NewOfficialLink, NewTextPost, OfficialLink, TextPost, UpdateMediaPost, UpdateOfficialLink, User, MediaPost};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::home,
        crate::routes::get_media_post,
        crate::routes::create_media_post,
        crate::routes::create_text_post,
        crate::routes::create_code_link,
        crate::routes::google_login,
        crate::routes::google_callback,
        crate::routes::auth_me,
        crate::routes::admin_list_media,
        crate::routes::admin_update_media,
        crate::routes::admin_create_official_link,
        crate::routes::admin_update_official_link,
        crate::routes::admin_list_users,
        crate::routes::admin_activate_user,
        crate::routes::admin_upload_users_csv,
    ),
    components(schemas(
        MediaPost, TextPost, NewTextPost, CodeLink, NewCodeLink, CodeCategory,
        OfficialLink, NewOfficialLink, UpdateOfficialLink, IconKind, UpdateMediaPost, User,
        crate::routes::MediaPostView, crate::routes::HomeResponse,
        crate::routes::MediaUploadForm, crate::routes::UsersCsvForm,
        crate::auth::Claims, crate::auth::Role,
        crate::accounts::ImportReport, crate::error::ApiErrorBody
    )),
    tags(
        (name = "posts", description = "Media, text and code submissions"),
        (name = "auth", description = "Google sign-in"),
        (name = "admin", description = "Moderation and account approval"),
    )
)]
pub struct ApiDoc;
