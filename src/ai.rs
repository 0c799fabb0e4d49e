use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::models::JobPosting;

/// Prefix of every failed generation. Check with [`is_error_output`] before using the text.
pub const ERROR_PREFIX: &str = "Error:";

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
}

impl ProviderKind {
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let spec = |provider: ProviderKind, model_id: &str, short_name: &str| ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    };

    match name {
        "gpt-3.5-turbo" | "gpt35" => Ok(spec(ProviderKind::OpenAI, "gpt-3.5-turbo", "gpt-3.5-turbo")),
        "gpt-4o" => Ok(spec(ProviderKind::OpenAI, "gpt-4o", "gpt-4o")),
        "gpt-4o-mini" | "mini" => Ok(spec(ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini")),
        "sonnet" | "api-sonnet" => Ok(spec(
            ProviderKind::Anthropic,
            "claude-sonnet-4-5-20250929",
            "sonnet",
        )),
        "haiku" | "api-haiku" => Ok(spec(
            ProviderKind::Anthropic,
            "claude-haiku-4-5-20251001",
            "haiku",
        )),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: gpt-3.5-turbo (default), gpt-4o, gpt-4o-mini, sonnet, haiku",
            name
        )),
    }
}

/// The session key wins; otherwise the provider's environment variable.
pub fn resolve_api_key(spec: &ModelSpec, session_key: Option<&str>) -> Result<String> {
    if let Some(key) = session_key.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    let var = spec.provider.api_key_var();
    env::var(var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .with_context(|| format!("No API key for {}. Pass --api-key or set {}", spec.short_name, var))
}

pub fn create_provider(spec: &ModelSpec, api_key: String, temperature: f32) -> Box<dyn AIProvider> {
    match spec.provider {
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(
            api_key,
            spec.model_id.clone(),
            temperature,
        )),
        ProviderKind::OpenAI => Box::new(OpenAIProvider::new(
            api_key,
            spec.model_id.clone(),
            temperature,
        )),
    }
}

fn http_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_else(|_| reqwest::blocking::Client::new())
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model_id: String, temperature: f32) -> Self {
        Self {
            api_key,
            model_id,
            temperature,
            client: http_client(),
        }
    }
}

impl AIProvider for AnthropicProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: AnthropicResponse = response
            .json()
            .context("Failed to parse Anthropic API response")?;

        api_response
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(api_key: String, model_id: String, temperature: f32) -> Self {
        Self {
            api_key,
            model_id,
            temperature,
            client: http_client(),
        }
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_tokens,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAIResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Generation ---

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn is_error_output(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_PREFIX)
}

fn finish(kind: &str, result: Result<String>) -> String {
    match result {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("{} generation returned no text", kind);
            format!("{} empty response from provider", ERROR_PREFIX)
        }
        Err(e) => {
            warn!("{} generation failed: {:#}", kind, e);
            format!("{} {:#}", ERROR_PREFIX, e)
        }
    }
}

pub fn cover_letter_prompt(title: &str, company: &str, resume: &str, budget: usize) -> String {
    format!(
        "Write a concise and professional cover letter for a '{}' role at '{}'. Base it on this resume:\n\n{}",
        title,
        company,
        truncate_chars(resume, budget)
    )
}

pub fn rewrite_prompt(posting: &JobPosting, resume: &str, budget: usize) -> String {
    let description = posting.description.as_deref().unwrap_or("(no description provided)");
    format!(
        "Rewrite the resume below so it targets the '{}' role at '{}'.\n\
        Keep every fact truthful, reuse the job posting's terminology where the resume supports it, \
        and return plain text with one item per line and no commentary.\n\n\
        Job Posting:\n{}\n\n\
        Resume:\n{}",
        posting.title,
        posting.company,
        truncate_chars(description, budget),
        truncate_chars(resume, budget)
    )
}

/// Returns the letter, or a string starting with [`ERROR_PREFIX`].
pub fn generate_cover_letter(
    provider: &dyn AIProvider,
    title: &str,
    company: &str,
    resume: &str,
    budget: usize,
) -> String {
    let prompt = cover_letter_prompt(title, company, resume, budget);
    debug!("cover letter prompt: {} chars via {}", prompt.len(), provider.model_name());
    finish("cover letter", provider.complete(&prompt, 1024))
}

/// Returns the rewritten resume, or a string starting with [`ERROR_PREFIX`].
pub fn rewrite_resume(
    provider: &dyn AIProvider,
    posting: &JobPosting,
    resume: &str,
    budget: usize,
) -> String {
    let prompt = rewrite_prompt(posting, resume, budget);
    debug!("rewrite prompt: {} chars via {}", prompt.len(), provider.model_name());
    finish("resume rewrite", provider.complete(&prompt, 2048))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct MockProvider {
        reply: Result<String, String>,
        prompts: RefCell<Vec<String>>,
    }

    impl MockProvider {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl AIProvider for MockProvider {
        fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone().map_err(|e| anyhow!(e))
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    #[test]
    fn test_resolve_model_openai() {
        let spec = resolve_model("gpt-3.5-turbo").unwrap();
        assert_eq!(spec.model_id, "gpt-3.5-turbo");
        assert_eq!(spec.provider, ProviderKind::OpenAI);

        let spec = resolve_model("mini").unwrap();
        assert_eq!(spec.short_name, "gpt-4o-mini");
    }

    #[test]
    fn test_resolve_model_anthropic() {
        let spec = resolve_model("sonnet").unwrap();
        assert_eq!(spec.model_id, "claude-sonnet-4-5-20250929");
        assert_eq!(spec.provider, ProviderKind::Anthropic);
        assert_eq!(spec.provider.api_key_var(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_resolve_model_unknown() {
        assert!(resolve_model("gpt-2").is_err());
    }

    #[test]
    fn test_session_key_wins() {
        let spec = resolve_model("gpt-4o").unwrap();
        assert_eq!(resolve_api_key(&spec, Some(" sk-session ")).unwrap(), "sk-session");
    }

    #[test]
    fn test_missing_api_key() {
        let spec = resolve_model("haiku").unwrap();
        let original = env::var("ANTHROPIC_API_KEY").ok();
        unsafe { env::remove_var("ANTHROPIC_API_KEY"); }

        let result = resolve_api_key(&spec, None);

        if let Some(val) = original {
            unsafe { env::set_var("ANTHROPIC_API_KEY", val); }
        }

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_cover_letter_prompt_truncates_resume() {
        let resume = "x".repeat(4000);
        let prompt = cover_letter_prompt("Project Manager", "Sample Corp", &resume, 1500);
        assert!(prompt.contains("'Project Manager' role at 'Sample Corp'"));
        assert_eq!(prompt.matches('x').count(), 1500);
    }

    #[test]
    fn test_generate_cover_letter_success() {
        let provider = MockProvider::ok("  Dear hiring manager,\n...\n");
        let letter = generate_cover_letter(&provider, "PM", "Acme", "resume text", 1500);
        assert_eq!(letter, "Dear hiring manager,\n...");
        assert!(!is_error_output(&letter));
        assert!(provider.prompts.borrow()[0].contains("resume text"));
    }

    #[test]
    fn test_generation_failure_is_sentinel() {
        let provider = MockProvider::failing("status 401 Unauthorized");
        let letter = generate_cover_letter(&provider, "PM", "Acme", "resume", 1500);
        assert!(is_error_output(&letter));
        assert!(letter.contains("401"));

        let posting = JobPosting {
            title: "PM".to_string(),
            ..Default::default()
        };
        let rewritten = rewrite_resume(&provider, &posting, "resume", 2500);
        assert!(rewritten.starts_with("Error:"));
    }

    #[test]
    fn test_empty_reply_is_sentinel() {
        let provider = MockProvider::ok("   ");
        assert!(is_error_output(&generate_cover_letter(&provider, "PM", "Acme", "r", 10)));
    }

    #[test]
    fn test_rewrite_prompt_includes_posting() {
        let posting = JobPosting {
            title: "Scrum Master".to_string(),
            company: "Acme".to_string(),
            description: Some("Coach agile teams".to_string()),
            ..Default::default()
        };
        let provider = MockProvider::ok("Jane Doe\nScrum Master");
        let rewritten = rewrite_resume(&provider, &posting, &"Z".repeat(3000), 2500);

        assert_eq!(rewritten, "Jane Doe\nScrum Master");
        let prompt = &provider.prompts.borrow()[0];
        assert!(prompt.contains("Coach agile teams"));
        assert_eq!(prompt.matches('Z').count(), 2500);
    }
}
