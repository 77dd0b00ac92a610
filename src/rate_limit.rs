use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= window { entry.pop_front(); } else { break; }
        }
        if entry.len() < limit {
            entry.push_back(now);
            true
        } else {
            false
        }
    }
}

/// What a submission is creating; each kind has its own budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostKind {
    Media,
    Text,
    Code,
}

impl PostKind {
    fn key_prefix(self) -> &'static str {
        match self {
            PostKind::Media => "media",
            PostKind::Text => "text",
            PostKind::Code => "code",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub media_limit: usize,
    pub media_window: Duration,
    pub text_limit: usize,
    pub text_window: Duration,
    pub code_limit: usize,
    pub code_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            media_limit: 10,
            media_window: Duration::from_secs(3600),
            text_limit: 20,
            text_window: Duration::from_secs(3600),
            code_limit: 20,
            code_window: Duration::from_secs(3600),
        }
    }
}

impl RateLimitConfig {
    /// Unparseable values fall back to the defaults.
    pub fn from_lookup(get: &dyn Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let usize_var = |name: &str, default: usize| get(name).and_then(|v| v.parse().ok()).unwrap_or(default);
        let dur_var = |name: &str, default: Duration| get(name).and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(default);
        Self {
            media_limit: usize_var("RL_MEDIA_LIMIT", d.media_limit),
            media_window: dur_var("RL_MEDIA_WINDOW", d.media_window),
            text_limit: usize_var("RL_TEXT_LIMIT", d.text_limit),
            text_window: dur_var("RL_TEXT_WINDOW", d.text_window),
            code_limit: usize_var("RL_CODE_LIMIT", d.code_limit),
            code_window: dur_var("RL_CODE_WINDOW", d.code_window),
        }
    }

    fn budget(&self, kind: PostKind) -> (usize, Duration) {
        match kind {
            PostKind::Media => (self.media_limit, self.media_window),
            PostKind::Text => (self.text_limit, self.text_window),
            PostKind::Code => (self.code_limit, self.code_window),
        }
    }
}

/// High level guard used by handlers.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }

    pub fn allow(&self, kind: PostKind, client: &str) -> bool {
        let (limit, window) = self.cfg.budget(kind);
        self.limiter.check(&format!("{}:{client}", kind.key_prefix()), limit, window)
    }
}
