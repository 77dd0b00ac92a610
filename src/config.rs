use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("{}", join_all(.0))]
    Many(Vec<ConfigError>),
}

fn join_all(errors: &[ConfigError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

#[derive(Debug, Clone)]
pub struct ObjectStorageConfig {
    pub namespace: Option<String>,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl ObjectStorageConfig {
    /// Everything needed to talk to the bucket is present.
    pub fn is_complete(&self) -> bool {
        self.namespace.is_some() && self.access_key.is_some() && self.secret_key.is_some()
    }

    /// S3-compatible API endpoint for the namespace/region pair.
    pub fn s3_endpoint(&self) -> Option<String> {
        if let Some(ep) = &self.endpoint {
            return Some(ep.clone());
        }
        self.namespace
            .as_ref()
            .map(|ns| format!("https://{ns}.compat.objectstorage.{}.oraclecloud.com", self.region))
    }
}

#[derive(Debug, Clone)]
pub enum StorageTarget {
    Local { root: PathBuf, public_base: String },
    ObjectStorage(ObjectStorageConfig),
}

#[derive(Debug, Clone)]
pub struct AiProviderKeys {
    pub gemini_api_key: Option<String>,
    pub fal_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_base_url: String,
    pub fal_base_url: String,
    pub openai_base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountPolicyKind {
    Open,
    ApprovalRequired,
}

/// Process-wide settings, built once at startup and handed to every layer.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub bind_addr: String,
    pub secret_key: String,
    pub public_base_url: String,
    pub frontend_url: String,
    pub oauth: Option<OAuthCredentials>,
    pub storage: StorageTarget,
    pub ai: AiProviderKeys,
    pub account_policy: AccountPolicyKind,
    pub bootstrap_admin_emails: Vec<String>,
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    pub enable_hsts: bool,
    pub rate_limits: RateLimitConfig,
}

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut problems = Vec::new();

        let environment = match get("APP_ENV").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                problems.push(ConfigError::Invalid { name: "APP_ENV", reason: format!("unknown environment '{other}'") });
                Environment::Development
            }
        };

        let secret_key = match get("SECRET_KEY") {
            Some(s) if s.len() >= 32 => s,
            Some(_) => {
                problems.push(ConfigError::Invalid { name: "SECRET_KEY", reason: "must be at least 32 characters".into() });
                String::new()
            }
            None => {
                problems.push(ConfigError::Missing("SECRET_KEY"));
                String::new()
            }
        };

        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();
        let frontend_url = get("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .trim_end_matches('/')
            .to_string();

        let oauth = match (get("GOOGLE_CLIENT_ID"), get("GOOGLE_SECRET_KEY")) {
            (Some(client_id), Some(client_secret)) => Some(OAuthCredentials {
                client_id,
                client_secret,
                redirect_uri: format!("{public_base_url}/api/v1/auth/google/callback"),
                auth_url: get("GOOGLE_AUTH_URL").unwrap_or_else(|| GOOGLE_AUTH_URL.into()),
                token_url: get("GOOGLE_TOKEN_URL").unwrap_or_else(|| GOOGLE_TOKEN_URL.into()),
                userinfo_url: get("GOOGLE_USERINFO_URL").unwrap_or_else(|| GOOGLE_USERINFO_URL.into()),
            }),
            _ => None,
        };

        let default_backend = if environment.is_production() { "object" } else { "local" };
        let storage = match get("STORAGE_BACKEND").unwrap_or_else(|| default_backend.into()).to_ascii_lowercase().as_str() {
            "local" => StorageTarget::Local {
                root: PathBuf::from(get("MEDIA_ROOT").unwrap_or_else(|| "media".into())),
                public_base: format!("{public_base_url}/media"),
            },
            "object" | "oci" | "s3" => StorageTarget::ObjectStorage(ObjectStorageConfig {
                namespace: get("OCI_NAMESPACE"),
                bucket: get("OCI_BUCKET").unwrap_or_else(|| "school-media".into()),
                region: get("OCI_REGION").unwrap_or_else(|| "ap-chuncheon-1".into()),
                endpoint: get("OCI_S3_ENDPOINT"),
                access_key: get("OCI_ACCESS_KEY"),
                secret_key: get("OCI_SECRET_KEY"),
            }),
            other => {
                problems.push(ConfigError::Invalid { name: "STORAGE_BACKEND", reason: format!("expected 'local' or 'object', got '{other}'") });
                StorageTarget::Local { root: PathBuf::from("media"), public_base: format!("{public_base_url}/media") }
            }
        };

        let timeout_secs = match get("AI_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().unwrap_or_else(|_| {
                problems.push(ConfigError::Invalid { name: "AI_TIMEOUT_SECS", reason: format!("'{v}' is not a number of seconds") });
                120
            }),
            None => 120,
        };
        let ai = AiProviderKeys {
            gemini_api_key: get("GEMINI_API_KEY"),
            fal_api_key: get("FAL_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            gemini_base_url: get("GEMINI_API_BASE").unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            fal_base_url: get("FAL_API_BASE").unwrap_or_else(|| "https://fal.run".into()),
            openai_base_url: get("OPENAI_API_BASE").unwrap_or_else(|| "https://api.openai.com".into()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let account_policy = match get("ACCOUNT_POLICY").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("approval") => AccountPolicyKind::ApprovalRequired,
            Some("open") => AccountPolicyKind::Open,
            Some(other) => {
                problems.push(ConfigError::Invalid { name: "ACCOUNT_POLICY", reason: format!("expected 'approval' or 'open', got '{other}'") });
                AccountPolicyKind::ApprovalRequired
            }
        };

        let bootstrap_admin_emails = get("BOOTSTRAP_ADMIN_EMAILS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let enable_hsts = get("ENABLE_HSTS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if !problems.is_empty() {
            return Err(if problems.len() == 1 { problems.remove(0) } else { ConfigError::Many(problems) });
        }

        Ok(Self {
            environment,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            secret_key,
            public_base_url,
            frontend_url,
            oauth,
            storage,
            ai,
            account_policy,
            bootstrap_admin_emails,
            database_url: get("DATABASE_URL"),
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".into())),
            enable_hsts,
            rate_limits: RateLimitConfig::from_lookup(&get),
        })
    }

    pub fn is_bootstrap_admin(&self, email: &str) -> bool {
        self.bootstrap_admin_emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}
