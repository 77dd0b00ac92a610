#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use school_archive::auth::create_jwt;
use school_archive::config::AppConfig;
use school_archive::enhance::{Captioners, EnhanceError, EnhancementStrategy, Stylizers};
use school_archive::ingest::IngestPipeline;
use school_archive::models::{NewUser, User};
use school_archive::repo::inmem::InMemRepo;
use school_archive::repo::UserRepo;
use school_archive::storage::{MediaStore, StorageError};

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

// ---------------- In-memory Mock MediaStore (tests only) ----------------
#[derive(Default)]
pub struct MockMediaStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockMediaStore {
    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.inner.lock().unwrap().insert(key.to_string(), bytes.to_vec());
    }
    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().get(key).cloned()
    }
    pub fn keys(&self) -> Vec<String> {
        let mut k: Vec<_> = self.inner.lock().unwrap().keys().cloned().collect();
        k.sort();
        k
    }
}

#[async_trait::async_trait]
impl MediaStore for MockMediaStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.insert(key, bytes);
        Ok(())
    }
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.bytes(key).ok_or(StorageError::NotFound)
    }
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.lock().unwrap().remove(key);
        Ok(())
    }
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.inner.lock().unwrap().contains_key(key))
    }
    fn url(&self, key: &str) -> String {
        format!("https://cdn.test/{key}")
    }
}

// ---------------- Scripted enhancement strategies ----------------
pub struct ScriptedStylizer {
    pub output: Option<Vec<u8>>, // None: always fail
    pub calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl EnhancementStrategy for ScriptedStylizer {
    type Output = Vec<u8>;
    fn name(&self) -> &'static str { "scripted" }
    async fn apply(&self, _image: &[u8], _prompt: &str) -> Result<Vec<u8>, EnhanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.output.clone().ok_or(EnhanceError::Status { status: 500, body: "boom".into() })
    }
}

pub struct ScriptedCaptioner {
    pub output: Option<String>,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl EnhancementStrategy for ScriptedCaptioner {
    type Output = String;
    fn name(&self) -> &'static str { "scripted" }
    async fn apply(&self, _image: &[u8], _prompt: &str) -> Result<String, EnhanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.output.clone().ok_or(EnhanceError::Malformed("no text".into()))
    }
}

pub struct Counters {
    pub stylize: Arc<AtomicUsize>,
    pub caption: Arc<AtomicUsize>,
}

impl Counters {
    pub fn stylized(&self) -> usize { self.stylize.load(Ordering::SeqCst) }
    pub fn captioned(&self) -> usize { self.caption.load(Ordering::SeqCst) }
}

/// Pipeline whose providers answer with the given bytes / caption (None = failure).
pub fn pipeline(store: Arc<dyn MediaStore>, styled: Option<&[u8]>, caption: Option<&str>) -> (IngestPipeline, Counters) {
    let counters = Counters { stylize: Arc::new(AtomicUsize::new(0)), caption: Arc::new(AtomicUsize::new(0)) };
    let stylizers = Stylizers::new("stylize")
        .with(ScriptedStylizer { output: styled.map(<[u8]>::to_vec), calls: counters.stylize.clone() });
    let captioners = Captioners::new("caption")
        .with(ScriptedCaptioner { output: caption.map(str::to_string), calls: counters.caption.clone() });
    (IngestPipeline::new(store, stylizers, captioners), counters)
}

// ---------------- Config / tokens ----------------
pub fn test_config(extra: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("SECRET_KEY".into(), SECRET.into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(move |k| vars.get(k).cloned()).unwrap()
}

pub fn user_with(id: i64, staff: bool) -> User {
    User {
        id,
        email: format!("user{id}@school.kr"),
        username: format!("user{id}@school.kr"),
        name: format!("User {id}"),
        password_hash: None,
        is_active: true,
        is_staff: staff,
        is_superuser: staff,
        date_joined: chrono::Utc::now(),
    }
}

pub struct Accounts {
    pub admin: String,
    pub user: String,
    pub user_id: i64,
}

/// Store an admin and a regular account and sign a token for each.
pub async fn seed_accounts(repo: &InMemRepo) -> Accounts {
    let admin = repo.create_user(NewUser::superuser("admin@school.kr", "Admin")).await.unwrap();
    let user = repo.create_user(NewUser::passwordless("student@school.kr", "Student")).await.unwrap();
    Accounts {
        admin: create_jwt(SECRET, &admin).unwrap(),
        user: create_jwt(SECRET, &user).unwrap(),
        user_id: user.id,
    }
}

// ---------------- Payloads ----------------

// Minimal 1x1 PNG (transparent)
pub fn sample_png() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, b'I',
        b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A,
        0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]), // field name, filename, bytes
}

/// Build a multipart body; returns (content-type header, body).
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let boundary = "----schoolarchiveboundary";
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
