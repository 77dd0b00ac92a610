//! Hosted generative-AI calls used by the ingestion pipeline.
//!
//! Each provider is an [`EnhancementStrategy`]; a [`StrategyChain`] tries its
//! strategies in order and keeps the first success.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use metrics::increment_counter;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AiProviderKeys;

pub const WEBTOON_PROMPT: &str = "Modern webtoon art style, high-quality digital 2D illustration, \
sharp and clean line art, professional cel shading, \
flat colors with vibrant and saturated tones. \
Minimalist background, crisp edges, cinematic lighting. \
No sketch lines, no screentones, no halftone patterns.";

pub const CAPTION_PROMPT: &str = "이 학교 활동 사진을 자세히 보고 설명해줘. \
초등학생이나 학부모에게 말하듯이 '따뜻하고 친절한 해요체'를 써줘. \
핵심 내용만 3문장 이내로 요약해줘.";

const GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const GEMINI_TEXT_MODEL: &str = "gemini-2.0-flash";
const FAL_EDIT_MODEL: &str = "fal-ai/bytedance/seedream/v4/edit";
const OPENAI_VISION_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("missing credentials for {0}")]
    MissingCredentials(&'static str),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no enhancement strategy configured")]
    NoStrategies,
}

/// One hosted model that takes an image plus a prompt.
#[async_trait]
pub trait EnhancementStrategy: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn apply(&self, image: &[u8], prompt: &str) -> Result<Self::Output, EnhanceError>;
}

pub struct StrategyChain<O> {
    kind: &'static str,
    strategies: Vec<Box<dyn EnhancementStrategy<Output = O>>>,
}

pub type Stylizers = StrategyChain<Vec<u8>>;
pub type Captioners = StrategyChain<String>;

impl<O: Send> StrategyChain<O> {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, strategies: Vec::new() }
    }

    pub fn with(mut self, strategy: impl EnhancementStrategy<Output = O> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Single attempt per strategy, in order; the last error is returned when all fail.
    pub async fn run(&self, image: &[u8], prompt: &str) -> Result<O, EnhanceError> {
        let mut last = EnhanceError::NoStrategies;
        for strategy in &self.strategies {
            let name = strategy.name();
            increment_counter!("enhance_attempts_total", "kind" => self.kind, "strategy" => name);
            match strategy.apply(image, prompt).await {
                Ok(out) => {
                    info!(kind = self.kind, strategy = name, "enhancement succeeded");
                    return Ok(out);
                }
                Err(e) => {
                    increment_counter!("enhance_failures_total", "kind" => self.kind, "strategy" => name);
                    warn!(kind = self.kind, strategy = name, error = %e, "enhancement failed; trying next");
                    last = e;
                }
            }
        }
        Err(last)
    }
}

fn http_client(timeout: Duration) -> HttpClient {
    HttpClient::builder().timeout(timeout).build().unwrap_or_else(|e| {
        warn!("failed to build http client with timeout ({e}); using defaults");
        HttpClient::new()
    })
}

fn image_mime(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .map(|t| t.mime_type())
        .filter(|m| m.starts_with("image/"))
        .unwrap_or("image/jpeg")
}

fn data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", image_mime(bytes), B64.encode(bytes))
}

fn require_key(key: &str, provider: &'static str) -> Result<(), EnhanceError> {
    if key.is_empty() {
        return Err(EnhanceError::MissingCredentials(provider));
    }
    Ok(())
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, EnhanceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(EnhanceError::Status { status: status.as_u16(), body: body.chars().take(200).collect() })
}

// ---------------- Gemini generateContent ----------------

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: GeminiInline },
}

#[derive(Serialize)]
struct GeminiInline {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
    #[serde(alias = "inline_data", rename = "inlineData")]
    inline_data: Option<GeminiResponseInline>,
}

#[derive(Deserialize)]
struct GeminiResponseInline {
    data: String,
}

#[derive(Clone)]
struct GeminiClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    async fn generate(&self, model: &str, image: &[u8], prompt: &str) -> Result<Vec<GeminiResponsePart>, EnhanceError> {
        require_key(&self.api_key, "gemini")?;
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url.trim_end_matches('/'));
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text { text: prompt },
                    GeminiPart::Inline {
                        inline_data: GeminiInline { mime_type: image_mime(image).to_string(), data: B64.encode(image) },
                    },
                ],
            }],
        };
        let resp = self.http.post(&url).header("x-goog-api-key", &self.api_key).json(&body).send().await?;
        let parsed: GeminiResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| EnhanceError::Malformed(e.to_string()))?;
        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default())
    }
}

/// Image-to-image restyling through Gemini's image model.
pub struct GeminiStylizer {
    client: GeminiClient,
}

impl GeminiStylizer {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Self {
        Self { client: GeminiClient { http: http_client(timeout), base_url: base_url.into(), api_key: api_key.into() } }
    }
}

#[async_trait]
impl EnhancementStrategy for GeminiStylizer {
    type Output = Vec<u8>;

    fn name(&self) -> &'static str { "gemini" }

    async fn apply(&self, image: &[u8], prompt: &str) -> Result<Vec<u8>, EnhanceError> {
        let parts = self.client.generate(GEMINI_IMAGE_MODEL, image, prompt).await?;
        let encoded = parts
            .into_iter()
            .find_map(|p| p.inline_data)
            .ok_or_else(|| EnhanceError::Malformed("no inline image in response".into()))?;
        B64.decode(encoded.data.as_bytes()).map_err(|e| EnhanceError::Malformed(e.to_string()))
    }
}

pub struct GeminiCaptioner {
    client: GeminiClient,
}

impl GeminiCaptioner {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Self {
        Self { client: GeminiClient { http: http_client(timeout), base_url: base_url.into(), api_key: api_key.into() } }
    }
}

#[async_trait]
impl EnhancementStrategy for GeminiCaptioner {
    type Output = String;

    fn name(&self) -> &'static str { "gemini" }

    async fn apply(&self, image: &[u8], prompt: &str) -> Result<String, EnhanceError> {
        let parts = self.client.generate(GEMINI_TEXT_MODEL, image, prompt).await?;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join("");
        non_empty(text)
    }
}

fn non_empty(text: String) -> Result<String, EnhanceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EnhanceError::Malformed("empty text".into()));
    }
    Ok(trimmed.to_string())
}

// ---------------- fal.ai Seedream edit ----------------

#[derive(Serialize)]
struct FalEditRequest<'a> {
    prompt: &'a str,
    image_urls: Vec<String>,
}

#[derive(Deserialize)]
struct FalEditResponse {
    #[serde(default)]
    images: Vec<FalImage>,
}

#[derive(Deserialize)]
struct FalImage {
    url: Option<String>,
}

pub struct FalStylizer {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl FalStylizer {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Self {
        Self { http: http_client(timeout), base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl EnhancementStrategy for FalStylizer {
    type Output = Vec<u8>;

    fn name(&self) -> &'static str { "fal" }

    async fn apply(&self, image: &[u8], prompt: &str) -> Result<Vec<u8>, EnhanceError> {
        require_key(&self.api_key, "fal")?;
        let url = format!("{}/{FAL_EDIT_MODEL}", self.base_url.trim_end_matches('/'));
        let body = FalEditRequest { prompt, image_urls: vec![data_uri(image)] };
        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Key {}", self.api_key))
            .json(&body)
            .send()
            .await?;
        let parsed: FalEditResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| EnhanceError::Malformed(e.to_string()))?;
        let image_url = parsed
            .images
            .into_iter()
            .find_map(|i| i.url)
            .ok_or_else(|| EnhanceError::Malformed("no image url in response".into()))?;
        debug!("downloading stylized image from {image_url}");
        let download = check_status(self.http.get(&image_url).send().await?).await?;
        Ok(download.bytes().await?.to_vec())
    }
}

// ---------------- OpenAI chat completions ----------------

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

pub struct OpenAiCaptioner {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl OpenAiCaptioner {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Self {
        Self { http: http_client(timeout), base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl EnhancementStrategy for OpenAiCaptioner {
    type Output = String;

    fn name(&self) -> &'static str { "openai" }

    async fn apply(&self, image: &[u8], prompt: &str) -> Result<String, EnhanceError> {
        require_key(&self.api_key, "openai")?;
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": OPENAI_VISION_MODEL,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_uri(image) } }
                ]
            }]
        });
        let resp = self.http.post(&url).bearer_auth(&self.api_key).json(&body).send().await?;
        let parsed: OpenAiResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| EnhanceError::Malformed(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EnhanceError::Malformed("no choices".into()))?;
        non_empty(text)
    }
}

/// Gemini first, fal.ai second; providers without a key are left out.
pub fn build_stylizers(keys: &AiProviderKeys) -> Stylizers {
    let mut chain = Stylizers::new("stylize");
    match &keys.gemini_api_key {
        Some(k) => chain = chain.with(GeminiStylizer::new(k, &keys.gemini_base_url, keys.timeout)),
        None => info!("GEMINI_API_KEY not set; gemini stylizer disabled"),
    }
    match &keys.fal_api_key {
        Some(k) => chain = chain.with(FalStylizer::new(k, &keys.fal_base_url, keys.timeout)),
        None => info!("FAL_API_KEY not set; fal stylizer disabled"),
    }
    chain
}

pub fn build_captioners(keys: &AiProviderKeys) -> Captioners {
    let mut chain = Captioners::new("caption");
    match &keys.gemini_api_key {
        Some(k) => chain = chain.with(GeminiCaptioner::new(k, &keys.gemini_base_url, keys.timeout)),
        None => info!("GEMINI_API_KEY not set; gemini captioner disabled"),
    }
    match &keys.openai_api_key {
        Some(k) => chain = chain.with(OpenAiCaptioner::new(k, &keys.openai_base_url, keys.timeout)),
        None => info!("OPENAI_API_KEY not set; openai captioner disabled"),
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        result: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EnhancementStrategy for Fixed {
        type Output = String;
        fn name(&self) -> &'static str { self.name }
        async fn apply(&self, _image: &[u8], _prompt: &str) -> Result<String, EnhanceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.map(str::to_string).ok_or(EnhanceError::Malformed("nope".into()))
        }
    }

    #[tokio::test]
    async fn first_success_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = Captioners::new("caption")
            .with(Fixed { name: "a", result: None, calls: calls.clone() })
            .with(Fixed { name: "b", result: Some("hello"), calls: calls.clone() })
            .with(Fixed { name: "c", result: Some("never"), calls: calls.clone() });
        assert_eq!(chain.run(b"img", "p").await.unwrap(), "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_chain_reports_no_strategies() {
        let chain = Stylizers::new("stylize");
        assert!(matches!(chain.run(b"img", "p").await, Err(EnhanceError::NoStrategies)));
    }

    #[test]
    fn only_keyed_providers_join_the_chain() {
        let keys = AiProviderKeys {
            gemini_api_key: None,
            fal_api_key: Some("fal".into()),
            openai_api_key: None,
            gemini_base_url: "http://g".into(),
            fal_base_url: "http://f".into(),
            openai_base_url: "http://o".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(build_stylizers(&keys).names(), vec!["fal"]);
        assert!(build_captioners(&keys).is_empty());
    }

    #[test]
    fn data_uri_sniffs_png() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert!(data_uri(png).starts_with("data:image/png;base64,"));
        assert!(data_uri(b"??").starts_with("data:image/jpeg;base64,"));
    }
}
