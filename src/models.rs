use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

pub type Id = i64;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct MediaPost {
    pub id: Id,
    pub title: String,
    pub file: String,                  // storage key, possibly the stylized copy
    pub original_file: Option<String>, // storage key of the untouched upload
    pub ai_caption: Option<String>,
    pub description: String,
    pub like_count: i32,
    pub is_public: bool,
    pub apply_filter: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewMediaPost {
    pub title: String,
    pub description: String,
    pub file: String,
    pub original_file: Option<String>,
    pub ai_caption: Option<String>,
    pub is_public: bool,
    pub apply_filter: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateMediaPost {
    #[validate(length(min = 1, max = 100, message = "title must be 1-100 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// Text fields of the media submission form (the file travels separately).
#[derive(Debug, Clone, Default, Validate)]
pub struct MediaPostForm {
    #[validate(length(min = 1, max = 100, message = "title must be 1-100 characters"))]
    pub title: String,
    pub description: String,
    pub apply_filter: bool,
}

/// The two file slots of a post as seen by the ingestion pipeline.
pub trait MediaFiles {
    fn title(&self) -> &str;
    fn apply_filter(&self) -> bool;
    fn file(&self) -> &str;
    fn set_file(&mut self, key: String);
    fn original_file(&self) -> Option<&str>;
    fn set_original_file(&mut self, key: String);
}

macro_rules! impl_media_files {
    ($t:ty) => {
        impl MediaFiles for $t {
            fn title(&self) -> &str { &self.title }
            fn apply_filter(&self) -> bool { self.apply_filter }
            fn file(&self) -> &str { &self.file }
            fn set_file(&mut self, key: String) { self.file = key; }
            fn original_file(&self) -> Option<&str> { self.original_file.as_deref() }
            fn set_original_file(&mut self, key: String) { self.original_file = Some(key); }
        }
    };
}

impl_media_files!(MediaPost);
impl_media_files!(NewMediaPost);

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct TextPost {
    pub id: Id,
    pub title: String,
    pub content: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewTextPost {
    #[validate(length(min = 1, max = 100, message = "title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    #[validate(length(min = 1, max = 50, message = "author_name must be 1-50 characters"))]
    pub author_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeCategory {
    Game,
    Colab,
    Github,
    #[default]
    Other,
}

impl CodeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CodeCategory::Game => "GAME",
            CodeCategory::Colab => "COLAB",
            CodeCategory::Github => "GITHUB",
            CodeCategory::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum IconKind {
    Youtube,
    Instagram,
    Blog,
    Homepage,
}

impl IconKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IconKind::Youtube => "YOUTUBE",
            IconKind::Instagram => "INSTAGRAM",
            IconKind::Blog => "BLOG",
            IconKind::Homepage => "HOMEPAGE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for CodeCategory {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GAME" => Ok(CodeCategory::Game),
            "COLAB" => Ok(CodeCategory::Colab),
            "GITHUB" => Ok(CodeCategory::Github),
            "OTHER" => Ok(CodeCategory::Other),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for IconKind {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YOUTUBE" => Ok(IconKind::Youtube),
            "INSTAGRAM" => Ok(IconKind::Instagram),
            "BLOG" => Ok(IconKind::Blog),
            "HOMEPAGE" => Ok(IconKind::Homepage),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for CodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for IconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CodeLink {
    pub id: Id,
    pub title: String,
    pub category: CodeCategory,
    pub url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewCodeLink {
    #[validate(length(min = 1, max = 100, message = "title must be 1-100 characters"))]
    pub title: String,
    #[serde(default)]
    pub category: CodeCategory,
    #[validate(custom = "validate_http_url")]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OfficialLink {
    pub id: Id,
    pub title: String,
    pub icon: IconKind,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewOfficialLink {
    #[validate(length(min = 1, max = 50, message = "title must be 1-50 characters"))]
    pub title: String,
    pub icon: IconKind,
    #[validate(custom = "validate_http_url")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateOfficialLink {
    #[validate(length(min = 1, max = 50, message = "title must be 1-50 characters"))]
    pub title: Option<String>,
    pub icon: Option<IconKind>,
    #[validate(custom = "validate_http_url")]
    pub url: Option<String>,
}

/// Accepts only absolute http(s) URLs.
pub fn validate_http_url(value: &str) -> Result<(), validator::ValidationError> {
    match url::Url::parse(value) {
        Ok(u) if (u.scheme() == "http" || u.scheme() == "https") && u.host_str().is_some() => Ok(()),
        _ => {
            let mut err = validator::ValidationError::new("url");
            err.message = Some("url must be an absolute http(s) address".into());
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub name: String,
    #[serde(skip_serializing)]
    #[schema(skip)]
    pub password_hash: Option<String>, // None: no usable password
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    /// Active account without a usable password; the username mirrors the email.
    pub fn passwordless(email: &str, name: &str) -> Self {
        Self {
            email: email.to_string(),
            username: email.to_string(),
            name: name.to_string(),
            password_hash: None,
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }

    pub fn superuser(email: &str, name: &str) -> Self {
        Self { is_staff: true, is_superuser: true, ..Self::passwordless(email, name) }
    }
}

/// Search input shared by the listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub query: Option<String>,
    pub include_private: bool,
}

impl PostFilter {
    pub fn search(query: Option<&str>) -> Self {
        Self {
            query: query.map(str::trim).filter(|q| !q.is_empty()).map(str::to_string),
            include_private: false,
        }
    }

    pub fn with_private(mut self) -> Self {
        self.include_private = true;
        self
    }
}
