mod common;

use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;

use common::{multipart, pipeline, sample_png, seed_accounts, test_config, MockMediaStore, Part};
use school_archive::models::*;
use school_archive::rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use school_archive::repo::inmem::InMemRepo;
use school_archive::repo::{CodeLinkRepo, MediaPostRepo, OfficialLinkRepo, RepoError, RepoResult, TextPostRepo, UserRepo};
use school_archive::{config, AppState};

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

fn state(repo: Arc<InMemRepo>, store: Arc<MockMediaStore>) -> AppState {
    let (ingest, _) = pipeline(store.clone(), Some(b"webtoon"), Some("아이들이 웃고 있어요."));
    AppState::new(test_config(&[]), repo, store).with_ingest(ingest)
}

fn media(title: &str, file: &str, is_public: bool) -> NewMediaPost {
    NewMediaPost {
        title: title.into(),
        description: String::new(),
        file: file.into(),
        original_file: None,
        ai_caption: None,
        is_public,
        apply_filter: false,
    }
}

#[actix_web::test]
async fn home_lists_public_content_and_searches() {
    let repo = Arc::new(InMemRepo::ephemeral());
    repo.create_media_post(media("운동회 사진", "media_posts/a.png", true)).await.unwrap();
    repo.create_media_post(media("비공개 사진", "media_posts/b.png", false)).await.unwrap();
    let store = Arc::new(MockMediaStore::default());
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo, store))).configure(config)).await;

    let req = test::TestRequest::get().uri("/api/v1/home").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let posts = body["media_posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "운동회 사진");
    assert_eq!(posts[0]["file_url"], "https://cdn.test/media_posts/a.png");
    assert!(posts[0].get("original_file_url").is_none());
    assert!(body["text_posts"].as_array().unwrap().is_empty());
    assert!(body["official_links"].as_array().unwrap().is_empty());

    let req = test::TestRequest::get().uri("/api/v1/home?q=%EC%97%86%EC%9D%8C").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert!(body["media_posts"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn private_media_detail_is_not_found() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let public = repo.create_media_post(media("공개", "media_posts/a.png", true)).await.unwrap();
    let private = repo.create_media_post(media("비공개", "media_posts/b.png", false)).await.unwrap();
    let store = Arc::new(MockMediaStore::default());
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo, store))).configure(config)).await;

    let req = test::TestRequest::get().uri(&format!("/api/v1/media/{}", public.id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let req = test::TestRequest::get().uri(&format!("/api/v1/media/{}", private.id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    let req = test::TestRequest::get().uri("/api/v1/media/9999").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn text_and_code_submissions() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let acc = seed_accounts(&repo).await;
    let store = Arc::new(MockMediaStore::default());
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo, store))).configure(config)).await;

    let post = json!({"title": "가을 소풍", "content": "즐거웠어요", "author_name": "3학년 2반"});
    let req = test::TestRequest::post().uri("/api/v1/text-posts").set_json(&post).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/v1/text-posts")
        .insert_header(bearer(&acc.user))
        .set_json(&post)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["author_name"], "3학년 2반");

    let req = test::TestRequest::post()
        .uri("/api/v1/text-posts")
        .insert_header(bearer(&acc.user))
        .set_json(&json!({"title": "", "content": "", "author_name": "x"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["error"], "invalid");
    assert_eq!(err["messages"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::post()
        .uri("/api/v1/code-links")
        .insert_header(bearer(&acc.user))
        .set_json(&json!({"title": "뱀 게임", "category": "GAME", "url": "https://example.com/snake"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let link: Value = test::read_body_json(resp).await;
    assert_eq!(link["category"], "GAME");
    assert_eq!(link["description"], "");

    let req = test::TestRequest::post()
        .uri("/api/v1/code-links")
        .insert_header(bearer(&acc.user))
        .set_json(&json!({"title": "bad", "url": "javascript:alert(1)"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri("/api/v1/home").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["text_posts"].as_array().unwrap().len(), 1);
    assert_eq!(body["code_links"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn media_upload_runs_the_ingest_pipeline() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let acc = seed_accounts(&repo).await;
    let store = Arc::new(MockMediaStore::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(state(repo.clone(), store.clone()))).configure(config),
    )
    .await;

    let png = sample_png();
    let (ct, body) = multipart(&[
        Part::Text("title", "  체육대회  "),
        Part::Text("description", "우리 반 계주"),
        Part::Text("apply_filter", "on"),
        Part::File("file", "a.png", &png),
    ]);
    let req = test::TestRequest::post()
        .uri("/api/v1/media")
        .insert_header(bearer(&acc.user))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let post: Value = test::read_body_json(resp).await;
    assert_eq!(post["title"], "체육대회");
    assert_eq!(post["file"], "media_posts/webtoon_a.png");
    assert_eq!(post["original_file"], "media_posts/originals/original_a.png");
    assert_eq!(post["ai_caption"], "아이들이 웃고 있어요.");
    assert_eq!(post["file_url"], "https://cdn.test/media_posts/webtoon_a.png");

    assert_eq!(store.bytes("media_posts/webtoon_a.png").unwrap(), b"webtoon");
    assert_eq!(store.bytes("media_posts/originals/original_a.png").unwrap(), png);
    let stored = repo.get_media_post(post["id"].as_i64().unwrap()).await.unwrap();
    assert_eq!(stored.ai_caption.as_deref(), Some("아이들이 웃고 있어요."));
}

#[actix_web::test]
async fn media_upload_rejections() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let acc = seed_accounts(&repo).await;
    let store = Arc::new(MockMediaStore::default());
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo, store.clone()))).configure(config)).await;

    let (ct, body) = multipart(&[Part::Text("title", "파일 없음")]);
    let req = test::TestRequest::post()
        .uri("/api/v1/media")
        .insert_header(bearer(&acc.user))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["messages"][0], "file is required");

    let (ct, body) = multipart(&[Part::Text("title", "문서"), Part::File("file", "notes.png", b"just some text")]);
    let req = test::TestRequest::post()
        .uri("/api/v1/media")
        .insert_header(bearer(&acc.user))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 415);

    let (ct, body) = multipart(&[Part::Text("title", "익명"), Part::File("file", "a.png", &sample_png())]);
    let req = test::TestRequest::post()
        .uri("/api/v1/media")
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
    assert!(store.keys().is_empty());
}

#[actix_web::test]
async fn admin_moderates_media() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let acc = seed_accounts(&repo).await;
    let store = Arc::new(MockMediaStore::default());
    store.insert("media_posts/a.png", &sample_png());
    store.insert("media_posts/originals/original_a.png", &sample_png());
    let mut new = media("원본", "media_posts/a.png", true);
    new.original_file = Some("media_posts/originals/original_a.png".into());
    new.ai_caption = Some("이미 있어요".into());
    let post = repo.create_media_post(new).await.unwrap();
    let app = test::init_service(
        App::new().app_data(web::Data::new(state(repo.clone(), store.clone()))).configure(config),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/admin/media").insert_header(bearer(&acc.user)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/admin/media/{}", post.id))
        .insert_header(bearer(&acc.admin))
        .set_json(&json!({"title": "수정됨", "is_public": false}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["title"], "수정됨");
    assert_eq!(updated["is_public"], false);
    assert_eq!(updated["ai_caption"], "이미 있어요");
    assert_eq!(updated["original_file_url"], "https://cdn.test/media_posts/originals/original_a.png");

    let req = test::TestRequest::get().uri(&format!("/api/v1/media/{}", post.id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::get().uri("/api/v1/admin/media").insert_header(bearer(&acc.admin)).to_request();
    let listed: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/admin/media/{}", post.id))
        .insert_header(bearer(&acc.admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    assert!(store.keys().is_empty());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/admin/media/{}", post.id))
        .insert_header(bearer(&acc.admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn admin_manages_official_links() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let acc = seed_accounts(&repo).await;
    let store = Arc::new(MockMediaStore::default());
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo, store))).configure(config)).await;

    let link = json!({"title": "학교 유튜브", "icon": "YOUTUBE", "url": "https://youtube.com/@school"});
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/official-links")
        .insert_header(bearer(&acc.user))
        .set_json(&link)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/official-links")
        .insert_header(bearer(&acc.admin))
        .set_json(&link)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: Value = test::read_body_json(resp).await;
    let id = created["id"].as_i64().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/admin/official-links/{id}"))
        .insert_header(bearer(&acc.admin))
        .set_json(&json!({"icon": "BLOG"}))
        .to_request();
    let updated: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(updated["icon"], "BLOG");
    assert_eq!(updated["title"], "학교 유튜브");

    let req = test::TestRequest::get().uri("/api/v1/home").to_request();
    let home: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(home["official_links"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/admin/official-links/{id}"))
        .insert_header(bearer(&acc.admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
}

#[actix_web::test]
async fn admin_imports_and_approves_users() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let acc = seed_accounts(&repo).await;
    repo.create_user(NewUser::passwordless("kim@school.kr", "Kim")).await.unwrap();
    let store = Arc::new(MockMediaStore::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(state(repo.clone(), store))).configure(config),
    )
    .await;

    let (ct, body) = multipart(&[Part::File("csv_file", "users.txt", b"email,name\n")]);
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/users/upload-csv")
        .insert_header(bearer(&acc.admin))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["messages"][0], "only .csv files can be uploaded");

    let csv = "email,name\nkim@school.kr,Kim\nlee@school.kr,Lee\nnot-an-email,Park\n";
    let (ct, body) = multipart(&[Part::File("csv_file", "Users.CSV", csv.as_bytes())]);
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/users/upload-csv")
        .insert_header(bearer(&acc.admin))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let report: Value = test::read_body_json(resp).await;
    assert_eq!(report["created"], 1);
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["failed"], 1);

    let lee = repo.find_user_by_email("lee@school.kr").await.unwrap().unwrap();
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/users/{}/deactivate", lee.id))
        .insert_header(bearer(&acc.admin))
        .to_request();
    let user: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(user["is_active"], false);
    assert!(user.get("password_hash").is_none());

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/users/{}/activate", lee.id))
        .insert_header(bearer(&acc.admin))
        .to_request();
    let user: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(user["is_active"], true);

    let req = test::TestRequest::get().uri("/api/v1/admin/users").insert_header(bearer(&acc.admin)).to_request();
    let users: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(users.as_array().unwrap().len(), 4);
}

#[actix_web::test]
async fn stored_media_is_served_by_key() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let store = Arc::new(MockMediaStore::default());
    store.insert("media_posts/originals/original_a.png", &sample_png());
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo, store))).configure(config)).await;

    let req = test::TestRequest::get().uri("/media/media_posts/originals/original_a.png").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(test::read_body(resp).await.to_vec(), sample_png());

    let req = test::TestRequest::get().uri("/media/media_posts/missing.png").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn submissions_are_rate_limited_per_kind() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let acc = seed_accounts(&repo).await;
    let store = Arc::new(MockMediaStore::default());
    let cfg = RateLimitConfig { text_limit: 1, ..RateLimitConfig::default() };
    let state = state(repo, store).with_rate_limiter(RateLimiterFacade::new(InMemoryRateLimiter::new(true), cfg));
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    let post = json!({"title": "t", "content": "c", "author_name": "a"});
    let send = || {
        test::TestRequest::post()
            .uri("/api/v1/text-posts")
            .insert_header(bearer(&acc.user))
            .set_json(&post)
            .to_request()
    };
    assert_eq!(test::call_service(&app, send()).await.status(), 201);
    let resp = test::call_service(&app, send()).await;
    assert_eq!(resp.status(), 429);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["error"], "too_many_requests");

    let req = test::TestRequest::post()
        .uri("/api/v1/code-links")
        .insert_header(bearer(&acc.user))
        .set_json(&json!({"title": "c", "url": "https://example.com"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);
}

#[actix_web::test]
async fn deactivated_account_cannot_submit() {
    let repo = Arc::new(InMemRepo::ephemeral());
    let acc = seed_accounts(&repo).await;
    let store = Arc::new(MockMediaStore::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(state(repo.clone(), store.clone()))).configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/users/{}/deactivate", acc.user_id))
        .insert_header(bearer(&acc.admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let post = json!({"title": "t", "content": "c", "author_name": "a"});
    let req = test::TestRequest::post()
        .uri("/api/v1/text-posts")
        .insert_header(bearer(&acc.user))
        .set_json(&post)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post()
        .uri("/api/v1/code-links")
        .insert_header(bearer(&acc.user))
        .set_json(&json!({"title": "c", "url": "https://example.com"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let (ct, body) = multipart(&[Part::Text("title", "사진"), Part::File("file", "a.png", &sample_png())]);
    let req = test::TestRequest::post()
        .uri("/api/v1/media")
        .insert_header(bearer(&acc.user))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    assert!(store.keys().is_empty());

    let req = test::TestRequest::get().uri("/api/v1/auth/me").insert_header(bearer(&acc.user)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    repo.set_user_active(acc.user_id, true).await.unwrap();
    let req = test::TestRequest::post()
        .uri("/api/v1/text-posts")
        .insert_header(bearer(&acc.user))
        .set_json(&post)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);
    assert_eq!(repo.list_text_posts(&PostFilter::default()).await.unwrap().len(), 1);
}

/// Delegates to an in-memory repo but refuses to insert media posts.
struct RejectingMediaRepo(InMemRepo);

#[async_trait::async_trait]
impl MediaPostRepo for RejectingMediaRepo {
    async fn list_media_posts(&self, filter: &PostFilter) -> RepoResult<Vec<MediaPost>> { self.0.list_media_posts(filter).await }
    async fn get_media_post(&self, id: Id) -> RepoResult<MediaPost> { self.0.get_media_post(id).await }
    async fn create_media_post(&self, _new: NewMediaPost) -> RepoResult<MediaPost> {
        Err(RepoError::Internal("disk full".into()))
    }
    async fn save_media_post(&self, post: &MediaPost) -> RepoResult<MediaPost> { self.0.save_media_post(post).await }
    async fn set_media_caption(&self, id: Id, caption: &str) -> RepoResult<()> { self.0.set_media_caption(id, caption).await }
    async fn delete_media_post(&self, id: Id) -> RepoResult<MediaPost> { self.0.delete_media_post(id).await }
}

#[async_trait::async_trait]
impl TextPostRepo for RejectingMediaRepo {
    async fn list_text_posts(&self, filter: &PostFilter) -> RepoResult<Vec<TextPost>> { self.0.list_text_posts(filter).await }
    async fn create_text_post(&self, new: NewTextPost) -> RepoResult<TextPost> { self.0.create_text_post(new).await }
    async fn delete_text_post(&self, id: Id) -> RepoResult<()> { self.0.delete_text_post(id).await }
}

#[async_trait::async_trait]
impl CodeLinkRepo for RejectingMediaRepo {
    async fn list_code_links(&self, filter: &PostFilter) -> RepoResult<Vec<CodeLink>> { self.0.list_code_links(filter).await }
    async fn create_code_link(&self, new: NewCodeLink) -> RepoResult<CodeLink> { self.0.create_code_link(new).await }
    async fn delete_code_link(&self, id: Id) -> RepoResult<()> { self.0.delete_code_link(id).await }
}

#[async_trait::async_trait]
impl OfficialLinkRepo for RejectingMediaRepo {
    async fn list_official_links(&self) -> RepoResult<Vec<OfficialLink>> { self.0.list_official_links().await }
    async fn create_official_link(&self, new: NewOfficialLink) -> RepoResult<OfficialLink> { self.0.create_official_link(new).await }
    async fn update_official_link(&self, id: Id, upd: UpdateOfficialLink) -> RepoResult<OfficialLink> {
        self.0.update_official_link(id, upd).await
    }
    async fn delete_official_link(&self, id: Id) -> RepoResult<()> { self.0.delete_official_link(id).await }
}

#[async_trait::async_trait]
impl UserRepo for RejectingMediaRepo {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> { self.0.find_user_by_email(email).await }
    async fn get_user(&self, id: Id) -> RepoResult<User> { self.0.get_user(id).await }
    async fn list_users(&self) -> RepoResult<Vec<User>> { self.0.list_users().await }
    async fn create_user(&self, new: NewUser) -> RepoResult<User> { self.0.create_user(new).await }
    async fn set_user_active(&self, id: Id, active: bool) -> RepoResult<User> { self.0.set_user_active(id, active).await }
}

#[actix_web::test]
async fn failed_insert_discards_stored_files() {
    let inner = InMemRepo::ephemeral();
    let acc = seed_accounts(&inner).await;
    let store = Arc::new(MockMediaStore::default());
    let (ingest, counters) = pipeline(store.clone(), Some(b"webtoon"), Some("캡션"));
    let state = AppState::new(test_config(&[]), Arc::new(RejectingMediaRepo(inner)), store.clone()).with_ingest(ingest);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    let (ct, body) = multipart(&[
        Part::Text("title", "체육대회"),
        Part::Text("apply_filter", "on"),
        Part::File("file", "a.png", &sample_png()),
    ]);
    let req = test::TestRequest::post()
        .uri("/api/v1/media")
        .insert_header(bearer(&acc.user))
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 500);
    assert_eq!(counters.stylized(), 1);
    assert_eq!(counters.captioned(), 0);
    assert!(store.keys().is_empty(), "left behind: {:?}", store.keys());
}
