use async_trait::async_trait;
use log::{error, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Environment, ObjectStorageConfig, StorageTarget};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not_found")]
    NotFound,
    #[error("invalid key '{0}'")]
    InvalidKey(String),
    #[error("backend: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound
        } else {
            StorageError::Backend(e.to_string())
        }
    }
}

/// Key addressed blob store holding every uploaded and derived media file.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
    /// Public URL a browser can fetch the object from.
    fn url(&self, key: &str) -> String;
}

/// Best guess at a MIME type: extension first, then content sniffing.
pub fn content_type_for(key: &str, bytes: &[u8]) -> String {
    let by_ext = match extension_of(key).as_deref() {
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        Some("heic") => Some("image/heic"),
        Some("mp4") => Some("video/mp4"),
        Some("webm") => Some("video/webm"),
        Some("mov") => Some("video/quicktime"),
        Some("csv") => Some("text/csv"),
        _ => None,
    };
    by_ext
        .map(str::to_string)
        .or_else(|| infer::get(bytes).map(|t| t.mime_type().to_string()))
        .unwrap_or_else(|| "application/octet-stream".into())
}

/// Lowercased extension of the last path segment.
pub fn extension_of(name: &str) -> Option<String> {
    let base = basename(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() { return None; }
    Some(ext.to_ascii_lowercase())
}

pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Reduce an uploaded file name to characters safe in a storage key.
pub fn sanitize_filename(name: &str) -> String {
    let base = basename(name.trim()).rsplit('\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() { "upload".into() } else { cleaned }
}

fn random_suffix() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(7).map(char::from).collect()
}

/// Free key for `filename` below `dir`; a random suffix is added on collision.
pub async fn available_key(store: &dyn MediaStore, dir: &str, filename: &str) -> Result<String, StorageError> {
    let name = sanitize_filename(filename);
    let dir = dir.trim_end_matches('/');
    let join = |n: &str| if dir.is_empty() { n.to_string() } else { format!("{dir}/{n}") };
    let mut key = join(&name);
    let (stem, ext) = match name.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s.to_string(), format!(".{e}")),
        _ => (name.clone(), String::new()),
    };
    while store.exists(&key).await? {
        key = join(&format!("{stem}_{}{ext}", random_suffix()));
    }
    Ok(key)
}

// ---------------- Local filesystem ----------------
pub struct LocalMediaStore {
    root: PathBuf,
    public_base: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, public_base: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&root)?;
        info!("LocalMediaStore initialized at {}", root.display());
        Ok(Self { root, public_base: public_base.trim_end_matches('/').to_string() })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(key);
        let safe = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::read(&path).await?)
    }
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}

// ---------------- OCI Object Storage (S3 compatibility API) ----------------
pub struct S3MediaStore {
    bucket: String,
    namespace: String,
    region: String,
    client: aws_sdk_s3::Client,
}

impl S3MediaStore {
    pub async fn new(cfg: &ObjectStorageConfig) -> Result<Self, StorageError> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let (Some(namespace), Some(access), Some(secret), Some(endpoint)) =
            (cfg.namespace.clone(), cfg.access_key.clone(), cfg.secret_key.clone(), cfg.s3_endpoint())
        else {
            return Err(StorageError::Backend("object storage configuration is incomplete".into()));
        };

        let creds = Credentials::new(access, secret, None, None, "static");
        let conf = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(cfg.region.clone()))
            .endpoint_url(endpoint.clone())
            .credentials_provider(SharedCredentialsProvider::new(creds))
            .load()
            .await;
        // OCI's compatibility endpoint only understands path-style addressing
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf).force_path_style(true).build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("Initialized object storage client endpoint={endpoint} bucket={}", cfg.bucket);

        Ok(Self { bucket: cfg.bucket.clone(), namespace, region: cfg.region.clone(), client })
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        use aws_sdk_s3::primitives::ByteStream;
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type_for(key, bytes));
        if let Err(e) = put.send().await {
            error!("put_object failed key={key} bucket={} err={:?}", self.bucket, e);
            let hint = if e.to_string().contains("AccessDenied") {
                " (check OCI_ACCESS_KEY/OCI_SECRET_KEY permissions)"
            } else {
                ""
            };
            return Err(StorageError::Backend(format!("{e}{hint}")));
        }
        // the compatibility API has been seen to acknowledge writes it then drops
        if !self.exists(key).await? {
            error!("put_object acknowledged but head_object cannot see key={key}");
            return Err(StorageError::Backend(format!("object '{key}' missing after upload")));
        }
        info!("stored object key={key} size={}", bytes.len());
        Ok(())
    }
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let obj = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                warn!("get_object failed key={key}: {e}");
                StorageError::NotFound
            })?;
        let data = obj.body.collect().await.map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let not_found = e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false);
                if not_found { Ok(false) } else { Err(StorageError::Backend(e.to_string())) }
            }
        }
    }
    fn url(&self, key: &str) -> String {
        oci_object_url(&self.region, &self.namespace, &self.bucket, key)
    }
}

/// Public object URL. Each key segment is percent-encoded, separators stay as `/`.
fn oci_object_url(region: &str, namespace: &str, bucket: &str, key: &str) -> String {
    let name: Vec<_> = key.split('/').map(urlencoding::encode).collect();
    format!(
        "https://objectstorage.{region}.oraclecloud.com/n/{namespace}/b/{bucket}/o/{}",
        name.join("/")
    )
}

// ---------------- Dummy (development without credentials) ----------------
#[derive(Default)]
pub struct DummyMediaStore;

#[async_trait]
impl MediaStore for DummyMediaStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        info!("[dummy storage] pretending to store key={key} size={}", bytes.len());
        Ok(())
    }
    async fn get(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
        Ok(b"dummy content".to_vec())
    }
    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
    async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
        Ok(false)
    }
    fn url(&self, key: &str) -> String {
        format!("/media/{key}")
    }
}

/// Origin the stored files are served from, for the CSP `img-src` list.
pub fn public_origin(target: &StorageTarget) -> Option<String> {
    match target {
        StorageTarget::Local { .. } => None,
        StorageTarget::ObjectStorage(os) => Some(format!("https://objectstorage.{}.oraclecloud.com", os.region)),
    }
}

/// Pick the backend for the configured target. Incomplete object storage
/// settings are fatal in production and degrade to the dummy store otherwise.
pub async fn build_media_store(target: &StorageTarget, env: Environment) -> Result<Arc<dyn MediaStore>, StorageError> {
    match target {
        StorageTarget::Local { root, public_base } => Ok(Arc::new(LocalMediaStore::new(root.clone(), public_base)?)),
        StorageTarget::ObjectStorage(os) if os.is_complete() => Ok(Arc::new(S3MediaStore::new(os).await?)),
        StorageTarget::ObjectStorage(_) if env.is_production() => Err(StorageError::Backend(
            "OCI_NAMESPACE, OCI_ACCESS_KEY and OCI_SECRET_KEY are required in production".into(),
        )),
        StorageTarget::ObjectStorage(_) => {
            warn!("object storage credentials missing; using dummy storage (uploads are discarded)");
            Ok(Arc::new(DummyMediaStore))
        }
    }
}
