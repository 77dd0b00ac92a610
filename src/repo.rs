use chrono::Utc;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait MediaPostRepo: Send + Sync {
    async fn list_media_posts(&self, filter: &PostFilter) -> RepoResult<Vec<MediaPost>>;
    async fn get_media_post(&self, id: Id) -> RepoResult<MediaPost>;
    async fn create_media_post(&self, new: NewMediaPost) -> RepoResult<MediaPost>;
    /// Writes every mutable column, file slots included.
    async fn save_media_post(&self, post: &MediaPost) -> RepoResult<MediaPost>;
    /// Partial update touching only the caption column.
    async fn set_media_caption(&self, id: Id, caption: &str) -> RepoResult<()>;
    async fn delete_media_post(&self, id: Id) -> RepoResult<MediaPost>;
}

#[async_trait]
pub trait TextPostRepo: Send + Sync {
    async fn list_text_posts(&self, filter: &PostFilter) -> RepoResult<Vec<TextPost>>;
    async fn create_text_post(&self, new: NewTextPost) -> RepoResult<TextPost>;
    async fn delete_text_post(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait CodeLinkRepo: Send + Sync {
    async fn list_code_links(&self, filter: &PostFilter) -> RepoResult<Vec<CodeLink>>;
    async fn create_code_link(&self, new: NewCodeLink) -> RepoResult<CodeLink>;
    async fn delete_code_link(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait OfficialLinkRepo: Send + Sync {
    async fn list_official_links(&self) -> RepoResult<Vec<OfficialLink>>;
    async fn create_official_link(&self, new: NewOfficialLink) -> RepoResult<OfficialLink>;
    async fn update_official_link(&self, id: Id, upd: UpdateOfficialLink) -> RepoResult<OfficialLink>;
    async fn delete_official_link(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn set_user_active(&self, id: Id, active: bool) -> RepoResult<User>;
}

pub trait Repo: MediaPostRepo + TextPostRepo + CodeLinkRepo + OfficialLinkRepo + UserRepo {}

impl<T> Repo for T where T: MediaPostRepo + TextPostRepo + CodeLinkRepo + OfficialLinkRepo + UserRepo {}

/// Case-insensitive substring test used by the in-memory backend.
fn icontains(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

pub mod inmem {
    use super::*;
    use serde::{Serialize, Deserialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        media_posts: HashMap<Id, MediaPost>,
        text_posts: HashMap<Id, TextPost>,
        code_links: HashMap<Id, CodeLink>,
        official_links: HashMap<Id, OfficialLink>,
        users: HashMap<Id, User>,
        next_id: Id,
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>, // None: nothing written to disk
        // held across encode and write so snapshots land in mutation order
        persist_lock: Arc<Mutex<()>>,
    }

    impl InMemRepo {
        /// Fresh repository that never touches the filesystem.
        pub fn ephemeral() -> Self {
            Self { state: Arc::new(RwLock::new(State::default())), snapshot_path: None, persist_lock: Arc::default() }
        }

        /// Repository persisted as `<data_dir>/state.json`, loaded if present.
        pub fn open(data_dir: &Path) -> Self {
            let path = data_dir.join("state.json");
            let state = Self::load_state_from(&path);
            Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)), persist_lock: Arc::default() }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        log::info!("loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        log::warn!("failed to parse snapshot '{}': {e}; starting empty", path.display());
                        State::default()
                    }
                },
                Err(e) => {
                    log::info!("no snapshot at '{}' ({e}); starting empty", path.display());
                    State::default()
                }
            }
        }

        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_ref() else { return };
            let Ok(_guard) = self.persist_lock.lock() else {
                log::error!("snapshot lock poisoned; '{}' not written", path.display());
                return;
            };
            let encoded = match self.read() {
                Ok(s) => serde_json::to_vec_pretty(&*s),
                Err(_) => return,
            };
            match encoded {
                Ok(bytes) => {
                    if let Some(dir) = path.parent() {
                        let _ = std::fs::create_dir_all(dir);
                    }
                    if let Err(e) = std::fs::write(path.as_ref(), bytes) {
                        log::error!("failed to write snapshot '{}': {e}", path.display());
                    }
                }
                Err(e) => log::error!("failed to encode snapshot: {e}"),
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn next_id(state: &mut State) -> Id {
            state.next_id += 1;
            state.next_id
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self { Self::ephemeral() }
    }

    fn needle(filter: &PostFilter) -> Option<String> {
        filter.query.as_ref().map(|q| q.to_lowercase())
    }

    #[async_trait]
    impl MediaPostRepo for InMemRepo {
        async fn list_media_posts(&self, filter: &PostFilter) -> RepoResult<Vec<MediaPost>> {
            let s = self.read()?;
            let q = needle(filter);
            let mut v: Vec<_> = s.media_posts.values()
                .filter(|p| filter.include_private || p.is_public)
                .filter(|p| match &q {
                    None => true,
                    Some(q) => icontains(&p.title, q)
                        || icontains(&p.description, q)
                        || p.ai_caption.as_deref().map(|c| icontains(c, q)).unwrap_or(false),
                })
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(v)
        }
        async fn get_media_post(&self, id: Id) -> RepoResult<MediaPost> {
            let s = self.read()?;
            s.media_posts.get(&id).cloned().ok_or(RepoError::NotFound)
        }
        async fn create_media_post(&self, new: NewMediaPost) -> RepoResult<MediaPost> {
            let mut s = self.write()?;
            let id = Self::next_id(&mut s);
            let post = MediaPost {
                id,
                title: new.title,
                file: new.file,
                original_file: new.original_file,
                ai_caption: new.ai_caption,
                description: new.description,
                like_count: 0,
                is_public: new.is_public,
                apply_filter: new.apply_filter,
                created_at: Utc::now(),
            };
            s.media_posts.insert(id, post.clone());
            drop(s);                       // release lock before persisting
            self.persist();
            Ok(post)
        }
        async fn save_media_post(&self, post: &MediaPost) -> RepoResult<MediaPost> {
            let mut s = self.write()?;
            let stored = s.media_posts.get_mut(&post.id).ok_or(RepoError::NotFound)?;
            stored.title = post.title.clone();
            stored.file = post.file.clone();
            stored.original_file = post.original_file.clone();
            stored.ai_caption = post.ai_caption.clone();
            stored.description = post.description.clone();
            stored.is_public = post.is_public;
            stored.apply_filter = post.apply_filter;
            let saved = stored.clone();
            drop(s);
            self.persist();
            Ok(saved)
        }
        async fn set_media_caption(&self, id: Id, caption: &str) -> RepoResult<()> {
            let mut s = self.write()?;
            let post = s.media_posts.get_mut(&id).ok_or(RepoError::NotFound)?;
            post.ai_caption = Some(caption.to_string());
            drop(s);
            self.persist();
            Ok(())
        }
        async fn delete_media_post(&self, id: Id) -> RepoResult<MediaPost> {
            let mut s = self.write()?;
            let removed = s.media_posts.remove(&id).ok_or(RepoError::NotFound)?;
            drop(s);
            self.persist();
            Ok(removed)
        }
    }

    #[async_trait]
    impl TextPostRepo for InMemRepo {
        async fn list_text_posts(&self, filter: &PostFilter) -> RepoResult<Vec<TextPost>> {
            let s = self.read()?;
            let q = needle(filter);
            let mut v: Vec<_> = s.text_posts.values()
                .filter(|p| q.as_ref().map(|q| icontains(&p.title, q)).unwrap_or(true))
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(v)
        }
        async fn create_text_post(&self, new: NewTextPost) -> RepoResult<TextPost> {
            let mut s = self.write()?;
            let id = Self::next_id(&mut s);
            let post = TextPost {
                id,
                title: new.title,
                content: new.content,
                author_name: new.author_name,
                created_at: Utc::now(),
            };
            s.text_posts.insert(id, post.clone());
            drop(s);
            self.persist();
            Ok(post)
        }
        async fn delete_text_post(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.text_posts.remove(&id).ok_or(RepoError::NotFound)?;
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl CodeLinkRepo for InMemRepo {
        async fn list_code_links(&self, filter: &PostFilter) -> RepoResult<Vec<CodeLink>> {
            let s = self.read()?;
            let q = needle(filter);
            let mut v: Vec<_> = s.code_links.values()
                .filter(|l| q.as_ref().map(|q| icontains(&l.title, q)).unwrap_or(true))
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(v)
        }
        async fn create_code_link(&self, new: NewCodeLink) -> RepoResult<CodeLink> {
            let mut s = self.write()?;
            let id = Self::next_id(&mut s);
            let link = CodeLink {
                id,
                title: new.title,
                category: new.category,
                url: new.url,
                description: new.description,
                created_at: Utc::now(),
            };
            s.code_links.insert(id, link.clone());
            drop(s);
            self.persist();
            Ok(link)
        }
        async fn delete_code_link(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.code_links.remove(&id).ok_or(RepoError::NotFound)?;
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl OfficialLinkRepo for InMemRepo {
        async fn list_official_links(&self) -> RepoResult<Vec<OfficialLink>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.official_links.values().cloned().collect();
            v.sort_by_key(|l| l.id);
            Ok(v)
        }
        async fn create_official_link(&self, new: NewOfficialLink) -> RepoResult<OfficialLink> {
            let mut s = self.write()?;
            let id = Self::next_id(&mut s);
            let link = OfficialLink { id, title: new.title, icon: new.icon, url: new.url };
            s.official_links.insert(id, link.clone());
            drop(s);
            self.persist();
            Ok(link)
        }
        async fn update_official_link(&self, id: Id, upd: UpdateOfficialLink) -> RepoResult<OfficialLink> {
            let mut s = self.write()?;
            let link = s.official_links.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(title) = upd.title { link.title = title; }
            if let Some(icon) = upd.icon { link.icon = icon; }
            if let Some(url) = upd.url { link.url = url; }
            let updated = link.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
        async fn delete_official_link(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.official_links.remove(&id).ok_or(RepoError::NotFound)?;
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
            let s = self.read()?;
            Ok(s.users.values().find(|u| u.email == email).cloned())
        }
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            let s = self.read()?;
            s.users.get(&id).cloned().ok_or(RepoError::NotFound)
        }
        async fn list_users(&self) -> RepoResult<Vec<User>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.users.values().cloned().collect();
            v.sort_by_key(|u| u.id);
            Ok(v)
        }
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let mut s = self.write()?;
            if s.users.values().any(|u| u.email == new.email || u.username == new.username) {
                return Err(RepoError::Conflict);
            }
            let id = Self::next_id(&mut s);
            let user = User {
                id,
                email: new.email,
                username: new.username,
                name: new.name,
                password_hash: new.password_hash,
                is_active: new.is_active,
                is_staff: new.is_staff,
                is_superuser: new.is_superuser,
                date_joined: Utc::now(),
            };
            s.users.insert(id, user.clone());
            drop(s);
            self.persist();
            Ok(user)
        }
        async fn set_user_active(&self, id: Id, active: bool) -> RepoResult<User> {
            let mut s = self.write()?;
            let user = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
            user.is_active = active;
            let updated = user.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
    }
}

pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    fn map_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => RepoError::Conflict,
            other => {
                log::error!("postgres error: {other}");
                RepoError::Internal(other.to_string())
            }
        }
    }

    /// `ILIKE` pattern with the wildcard characters of the user query escaped.
    fn like_pattern(query: &str) -> String {
        let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        format!("%{escaped}%")
    }

    const MEDIA_COLUMNS: &str = "id, title, file, original_file, ai_caption, description, like_count, is_public, apply_filter, created_at";

    #[async_trait]
    impl MediaPostRepo for PgRepo {
        async fn list_media_posts(&self, filter: &PostFilter) -> RepoResult<Vec<MediaPost>> {
            let sql = format!(
                "SELECT {MEDIA_COLUMNS} FROM media_posts \
                 WHERE ($1 OR is_public) \
                   AND ($2::text IS NULL OR title ILIKE $2 ESCAPE '\\' OR description ILIKE $2 ESCAPE '\\' OR ai_caption ILIKE $2 ESCAPE '\\') \
                 ORDER BY created_at DESC, id DESC"
            );
            sqlx::query_as::<_, MediaPost>(&sql)
                .bind(filter.include_private)
                .bind(filter.query.as_deref().map(like_pattern))
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn get_media_post(&self, id: Id) -> RepoResult<MediaPost> {
            let sql = format!("SELECT {MEDIA_COLUMNS} FROM media_posts WHERE id = $1");
            sqlx::query_as::<_, MediaPost>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn create_media_post(&self, new: NewMediaPost) -> RepoResult<MediaPost> {
            let sql = format!(
                "INSERT INTO media_posts (title, file, original_file, ai_caption, description, is_public, apply_filter) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {MEDIA_COLUMNS}"
            );
            sqlx::query_as::<_, MediaPost>(&sql)
                .bind(&new.title)
                .bind(&new.file)
                .bind(new.original_file.as_ref())
                .bind(new.ai_caption.as_ref())
                .bind(&new.description)
                .bind(new.is_public)
                .bind(new.apply_filter)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn save_media_post(&self, post: &MediaPost) -> RepoResult<MediaPost> {
            let sql = format!(
                "UPDATE media_posts SET title=$2, file=$3, original_file=$4, ai_caption=$5, description=$6, is_public=$7, apply_filter=$8 \
                 WHERE id=$1 RETURNING {MEDIA_COLUMNS}"
            );
            sqlx::query_as::<_, MediaPost>(&sql)
                .bind(post.id)
                .bind(&post.title)
                .bind(&post.file)
                .bind(post.original_file.as_ref())
                .bind(post.ai_caption.as_ref())
                .bind(&post.description)
                .bind(post.is_public)
                .bind(post.apply_filter)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn set_media_caption(&self, id: Id, caption: &str) -> RepoResult<()> {
            let res = sqlx::query("UPDATE media_posts SET ai_caption = $2 WHERE id = $1")
                .bind(id).bind(caption)
                .execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
        async fn delete_media_post(&self, id: Id) -> RepoResult<MediaPost> {
            let sql = format!("DELETE FROM media_posts WHERE id = $1 RETURNING {MEDIA_COLUMNS}");
            sqlx::query_as::<_, MediaPost>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
        }
    }

    #[async_trait]
    impl TextPostRepo for PgRepo {
        async fn list_text_posts(&self, filter: &PostFilter) -> RepoResult<Vec<TextPost>> {
            sqlx::query_as::<_, TextPost>(
                "SELECT id, title, content, author_name, created_at FROM text_posts \
                 WHERE ($1::text IS NULL OR title ILIKE $1 ESCAPE '\\') ORDER BY created_at DESC, id DESC"
            )
                .bind(filter.query.as_deref().map(like_pattern))
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn create_text_post(&self, new: NewTextPost) -> RepoResult<TextPost> {
            sqlx::query_as::<_, TextPost>(
                "INSERT INTO text_posts (title, content, author_name) VALUES ($1,$2,$3) \
                 RETURNING id, title, content, author_name, created_at"
            )
                .bind(&new.title).bind(&new.content).bind(&new.author_name)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn delete_text_post(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM text_posts WHERE id = $1")
                .bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[derive(sqlx::FromRow)]
    struct CodeLinkRow {
        id: Id,
        title: String,
        category: String,
        url: String,
        description: String,
        created_at: chrono::DateTime<Utc>,
    }

    impl TryFrom<CodeLinkRow> for CodeLink {
        type Error = RepoError;
        fn try_from(r: CodeLinkRow) -> Result<Self, Self::Error> {
            Ok(CodeLink {
                id: r.id,
                title: r.title,
                category: r.category.parse().map_err(|e: UnknownVariant| RepoError::Internal(e.to_string()))?,
                url: r.url,
                description: r.description,
                created_at: r.created_at,
            })
        }
    }

    #[derive(sqlx::FromRow)]
    struct OfficialLinkRow {
        id: Id,
        title: String,
        icon: String,
        url: String,
    }

    impl TryFrom<OfficialLinkRow> for OfficialLink {
        type Error = RepoError;
        fn try_from(r: OfficialLinkRow) -> Result<Self, Self::Error> {
            Ok(OfficialLink {
                id: r.id,
                title: r.title,
                icon: r.icon.parse().map_err(|e: UnknownVariant| RepoError::Internal(e.to_string()))?,
                url: r.url,
            })
        }
    }

    #[async_trait]
    impl CodeLinkRepo for PgRepo {
        async fn list_code_links(&self, filter: &PostFilter) -> RepoResult<Vec<CodeLink>> {
            let rows = sqlx::query_as::<_, CodeLinkRow>(
                "SELECT id, title, category, url, description, created_at FROM code_links \
                 WHERE ($1::text IS NULL OR title ILIKE $1 ESCAPE '\\') ORDER BY created_at DESC, id DESC"
            )
                .bind(filter.query.as_deref().map(like_pattern))
                .fetch_all(&self.pool).await.map_err(map_err)?;
            rows.into_iter().map(CodeLink::try_from).collect()
        }
        async fn create_code_link(&self, new: NewCodeLink) -> RepoResult<CodeLink> {
            sqlx::query_as::<_, CodeLinkRow>(
                "INSERT INTO code_links (title, category, url, description) VALUES ($1,$2,$3,$4) \
                 RETURNING id, title, category, url, description, created_at"
            )
                .bind(&new.title).bind(new.category.as_str()).bind(&new.url).bind(&new.description)
                .fetch_one(&self.pool).await.map_err(map_err)?
                .try_into()
        }
        async fn delete_code_link(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM code_links WHERE id = $1")
                .bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl OfficialLinkRepo for PgRepo {
        async fn list_official_links(&self) -> RepoResult<Vec<OfficialLink>> {
            let rows = sqlx::query_as::<_, OfficialLinkRow>("SELECT id, title, icon, url FROM official_links ORDER BY id")
                .fetch_all(&self.pool).await.map_err(map_err)?;
            rows.into_iter().map(OfficialLink::try_from).collect()
        }
        async fn create_official_link(&self, new: NewOfficialLink) -> RepoResult<OfficialLink> {
            sqlx::query_as::<_, OfficialLinkRow>(
                "INSERT INTO official_links (title, icon, url) VALUES ($1,$2,$3) RETURNING id, title, icon, url"
            )
                .bind(&new.title).bind(new.icon.as_str()).bind(&new.url)
                .fetch_one(&self.pool).await.map_err(map_err)?
                .try_into()
        }
        async fn update_official_link(&self, id: Id, upd: UpdateOfficialLink) -> RepoResult<OfficialLink> {
            sqlx::query_as::<_, OfficialLinkRow>(
                "UPDATE official_links SET title = COALESCE($2, title), icon = COALESCE($3, icon), url = COALESCE($4, url) \
                 WHERE id = $1 RETURNING id, title, icon, url"
            )
                .bind(id)
                .bind(upd.title.as_ref())
                .bind(upd.icon.map(IconKind::as_str))
                .bind(upd.url.as_ref())
                .fetch_one(&self.pool).await.map_err(map_err)?
                .try_into()
        }
        async fn delete_official_link(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM official_links WHERE id = $1")
                .bind(id).execute(&self.pool).await.map_err(map_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    const USER_COLUMNS: &str = "id, email, username, name, password_hash, is_active, is_staff, is_superuser, date_joined";

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
            sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(&self.pool).await.map_err(map_err)
        }
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
            sqlx::query_as::<_, User>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn list_users(&self) -> RepoResult<Vec<User>> {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
            sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let sql = format!(
                "INSERT INTO users (email, username, name, password_hash, is_active, is_staff, is_superuser) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {USER_COLUMNS}"
            );
            sqlx::query_as::<_, User>(&sql)
                .bind(&new.email)
                .bind(&new.username)
                .bind(&new.name)
                .bind(new.password_hash.as_ref())
                .bind(new.is_active)
                .bind(new.is_staff)
                .bind(new.is_superuser)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn set_user_active(&self, id: Id, active: bool) -> RepoResult<User> {
            let sql = format!("UPDATE users SET is_active = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
            sqlx::query_as::<_, User>(&sql).bind(id).bind(active).fetch_one(&self.pool).await.map_err(map_err)
        }
    }

}

/// Postgres when a database URL is configured (migrations applied),
/// otherwise the in-memory store snapshotted under `data_dir`.
pub async fn open_repo(database_url: Option<&str>, data_dir: &std::path::Path) -> RepoResult<std::sync::Arc<dyn Repo>> {
    match database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .map_err(|e| RepoError::Internal(format!("cannot connect to postgres: {e}")))?;
            let repo = pg::PgRepo::new(pool);
            repo.migrate().await.map_err(|e| RepoError::Internal(format!("migration failed: {e}")))?;
            log::info!("Using Postgres repository backend");
            Ok(std::sync::Arc::new(repo))
        }
        None => {
            log::info!("Using in-memory repository backend (snapshot dir {})", data_dir.display());
            Ok(std::sync::Arc::new(inmem::InMemRepo::open(data_dir)))
        }
    }
}
