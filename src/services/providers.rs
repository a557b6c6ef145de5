// AI Provider Service
// OpenAI-compatible chat-completions client used for remote rewriting and scoring

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::config_store::{AppConfig, ConfigStore};
use super::error::{HumanizeError, HumanizeResult};
use super::remote::{RewriteRequest, RewriteService, ScoreService};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com";
const GLM_DEFAULT_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

const CLIENT_TIMEOUT: Duration = Duration::from_secs(80);

pub const DETECTION_SYSTEM_PROMPT: &str = "You are an expert at telling AI-generated text from human writing. \
Analyze the text you are given and respond with JSON only, no prose, in exactly this shape: \
{\"score\": <integer 0-100, likelihood the text is AI-generated>, \
\"confidence\": \"high\" | \"medium\" | \"low\", \
\"analysis\": \"<two or three sentences>\", \
\"patterns\": [{\"pattern\": \"<name>\", \"description\": \"<what you saw>\", \"examples\": [\"<quote>\"]}], \
\"suggestions\": [\"<how to make it read more human>\"]}";

const REWRITE_SYSTEM_PROMPT: &str = "You are a skilled editor who rewrites text so it reads naturally human. \
Follow the user's instructions exactly and reply with the rewritten text only.";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("Response blocked by the provider's content filter")]
    ContentFiltered,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

impl From<ProviderError> for HumanizeError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::HttpError(e) => HumanizeError::RemoteNetworkError(e.to_string()),
            ProviderError::ApiError { status, message } => {
                let lower = message.to_lowercase();
                let detail = format!("{} - {}", status, message);
                if status == 429 || lower.contains("quota") || lower.contains("rate limit") {
                    HumanizeError::RemoteQuotaExceeded(detail)
                } else if lower.contains("safety") || lower.contains("content_filter") || lower.contains("blocked") {
                    HumanizeError::RemoteSafetyBlocked(detail)
                } else if status == 401 || status == 403 {
                    HumanizeError::MissingCredential(detail)
                } else {
                    HumanizeError::RemoteNetworkError(detail)
                }
            }
            ProviderError::MissingContent => HumanizeError::RemoteEmptyResponse,
            ProviderError::ContentFiltered => {
                HumanizeError::RemoteSafetyBlocked("finish_reason=content_filter".to_string())
            }
            ProviderError::JsonError(e) => HumanizeError::RemoteMalformedResponse(e),
            ProviderError::MissingApiKey => HumanizeError::MissingCredential("API key not configured".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    if parts.len() == 2 {
        ProviderSpec {
            name: parts[0].trim().to_lowercase(),
            model: parts[1].trim().to_string(),
        }
    } else {
        ProviderSpec {
            name: spec.trim().to_lowercase(),
            model: String::new(),
        }
    }
}

pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some(OPENAI_DEFAULT_URL),
        "deepseek" => Some(DEEPSEEK_DEFAULT_URL),
        "glm" => Some(GLM_DEFAULT_URL),
        _ => None,
    }
}

pub fn default_model(provider: &str) -> &'static str {
    match provider {
        "deepseek" => "deepseek-chat",
        "glm" => "glm-4-flash",
        _ => "gpt-4o-mini",
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

fn json_object_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap())
}

pub struct ProviderClient {
    client: Client,
    name: String,
    base_url: String,
    model: String,
    api_key: String,
}

impl ProviderClient {
    pub fn new(name: &str, base_url: &str, model: &str, api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn with_proxy(mut self, proxy_url: &str) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        self.client = Client::builder().timeout(CLIENT_TIMEOUT).proxy(proxy).build()?;
        Ok(self)
    }

    /// Build a client from config: provider spec, key lookup, base URL override and proxy.
    pub fn from_config(config: &AppConfig) -> HumanizeResult<Self> {
        let spec = parse_provider(&config.remote.provider);
        let model = if !spec.model.is_empty() {
            spec.model.clone()
        } else {
            config
                .remote
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model(&spec.name).to_string())
        };

        let base_url = env::var("HUMANIZER_API_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| config.remote.base_url.clone())
            .or_else(|| default_base_url(&spec.name).map(str::to_string))
            .ok_or_else(|| HumanizeError::Config(format!("no base URL known for provider '{}'", spec.name)))?;

        let api_key = lookup_api_key(&spec.name, &config.api_keys)
            .or_else(|| get_api_key(&spec.name))
            .ok_or_else(|| HumanizeError::MissingCredential(format!("no API key for provider '{}'", spec.name)))?;

        let client = Self::new(&spec.name, &base_url, &model, &api_key);
        match config.proxy.as_ref().and_then(|p| p.url()) {
            Some(proxy_url) => client
                .with_proxy(proxy_url)
                .map_err(|e| HumanizeError::Config(format!("invalid proxy '{}': {}", proxy_url, e))),
            None => Ok(client),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub async fn chat(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f64,
        use_json_format: bool,
    ) -> Result<ChatResult, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature,
            response_format: if use_json_format {
                Some(ResponseFormat {
                    r#type: "json_object".to_string(),
                })
            } else {
                None
            },
        };

        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("[PROVIDER] {} returned {} after {}ms", self.name, status.as_u16(), latency_ms);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let choice = data.choices.as_ref().and_then(|c| c.first());
        let mut content = choice
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .filter(|c| !c.trim().is_empty());

        let reasoning = choice
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.reasoning_content.clone())
            .or(data.reasoning_content);

        // Reasoning models sometimes leave the JSON answer in the reasoning trace only.
        if content.is_none() && use_json_format {
            if let Some(ref r) = reasoning {
                if let Some(m) = json_object_regex().find(r) {
                    content = Some(m.as_str().to_string());
                }
            }
        }

        let content = match content {
            Some(c) => c,
            None if choice.and_then(|c| c.finish_reason.as_deref()) == Some("content_filter") => {
                return Err(ProviderError::ContentFiltered)
            }
            None => return Err(ProviderError::MissingContent),
        };

        debug!("[PROVIDER] {} model={} latency_ms={}", self.name, self.model, latency_ms);
        Ok(ChatResult { content, latency_ms })
    }
}

#[async_trait]
impl RewriteService for ProviderClient {
    async fn rewrite(&self, request: &RewriteRequest) -> HumanizeResult<String> {
        let result = self
            .chat(
                REWRITE_SYSTEM_PROMPT,
                &request.prompt,
                request.max_tokens,
                request.temperature,
                false,
            )
            .await?;
        Ok(result.content)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ScoreService for ProviderClient {
    async fn score(&self, text: &str) -> HumanizeResult<String> {
        let user = format!("Analyze this text and return json:\n\n{}", text);
        let result = self.chat(DETECTION_SYSTEM_PROMPT, &user, 1024, 0.0, true).await?;
        Ok(result.content)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn env_key_names(provider: &str) -> Vec<String> {
    let mut names = vec![format!("HUMANIZER_{}_API_KEY", provider.to_uppercase())];
    let conventional = match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        "glm" => Some("GLM_API_KEY"),
        _ => None,
    };
    if let Some(name) = conventional {
        names.push(name.to_string());
    }
    names
}

/// Environment first, then the given key map.
fn lookup_api_key(
    provider: &str,
    configured: &std::collections::HashMap<String, String>,
) -> Option<String> {
    for key in env_key_names(provider) {
        if let Ok(val) = env::var(&key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    configured
        .get(provider)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str) -> Option<String> {
    if let Some(key) = lookup_api_key(provider, &Default::default()) {
        return Some(key);
    }

    // Try config file
    if let Some(config_dir) = ConfigStore::default_config_dir() {
        let store = ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key(provider) {
            return Some(key);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        let spec = parse_provider("deepseek:deepseek-chat");
        assert_eq!(spec.name, "deepseek");
        assert_eq!(spec.model, "deepseek-chat");

        let spec2 = parse_provider(" OpenAI ");
        assert_eq!(spec2.name, "openai");
        assert_eq!(spec2.model, "");
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let client = ProviderClient::new("openai", "http://localhost:1234/v1/", "m", "k");
        assert_eq!(client.endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_env_key_names_order() {
        assert_eq!(env_key_names("openai"), vec!["HUMANIZER_OPENAI_API_KEY", "OPENAI_API_KEY"]);
        assert_eq!(env_key_names("custom"), vec!["HUMANIZER_CUSTOM_API_KEY"]);
    }

    #[test]
    fn test_error_mapping() {
        let quota: HumanizeError = ProviderError::ApiError {
            status: 429,
            message: "Too many requests".into(),
        }
        .into();
        assert!(matches!(quota, HumanizeError::RemoteQuotaExceeded(_)));

        let quota_body: HumanizeError = ProviderError::ApiError {
            status: 400,
            message: "You exceeded your current quota".into(),
        }
        .into();
        assert!(matches!(quota_body, HumanizeError::RemoteQuotaExceeded(_)));

        let auth: HumanizeError = ProviderError::ApiError {
            status: 401,
            message: "invalid key".into(),
        }
        .into();
        assert!(matches!(auth, HumanizeError::MissingCredential(_)));

        let safety: HumanizeError = ProviderError::ApiError {
            status: 400,
            message: "{\"code\":\"content_filter\"}".into(),
        }
        .into();
        assert!(matches!(safety, HumanizeError::RemoteSafetyBlocked(_)));

        let server: HumanizeError = ProviderError::ApiError {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert!(matches!(server, HumanizeError::RemoteNetworkError(_)));

        assert_eq!(HumanizeError::from(ProviderError::MissingContent), HumanizeError::RemoteEmptyResponse);
        assert!(matches!(
            HumanizeError::from(ProviderError::JsonError("eof".into())),
            HumanizeError::RemoteMalformedResponse(_)
        ));
    }

    #[test]
    fn test_from_config_uses_configured_key_and_url() {
        let mut config = AppConfig::default();
        config.remote.provider = "localtest:tiny-model".to_string();
        config.remote.base_url = Some("http://127.0.0.1:9/v1".to_string());
        config.api_keys.insert("localtest".to_string(), "sk-local".to_string());

        let client = ProviderClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "tiny-model");
        assert_eq!(RewriteService::name(&client), "localtest");
    }

    #[test]
    fn test_from_config_unknown_provider_without_url() {
        let mut config = AppConfig::default();
        config.remote.provider = "nowhere".to_string();
        config.api_keys.insert("nowhere".to_string(), "k".to_string());
        if env::var("HUMANIZER_API_URL").is_err() {
            assert!(matches!(ProviderClient::from_config(&config), Err(HumanizeError::Config(_))));
        }
    }
}
