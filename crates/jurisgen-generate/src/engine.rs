use std::time::Duration;

use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use jurisgen_core::{ai_configured, AiSettings};

use crate::prompt::system_prompt;
use crate::GenerationFailure;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const TEMPERATURE: f32 = 0.3;
const MAX_OUTPUT_TOKENS: u32 = 4000;

/// Anything that can turn a prompt into raw contract text.
#[async_trait]
pub trait ContractGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationFailure>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, String> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(format!("unknown provider: {other}")),
    }
}

/// Generator backed by a hosted LLM provider.
pub struct LlmGenerator {
    settings: AiSettings,
    timeout: Duration,
}

impl LlmGenerator {
    pub fn new(settings: AiSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }
}

#[async_trait]
impl ContractGenerator for LlmGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationFailure> {
        if !ai_configured(&self.settings) {
            return Err(GenerationFailure::NotConfigured(format!(
                "provider '{}' needs a model and an API key",
                self.settings.provider
            )));
        }
        let backend = map_backend(&self.settings.provider).map_err(GenerationFailure::NotConfigured)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .system(system_prompt())
            .temperature(TEMPERATURE)
            .max_tokens(MAX_OUTPUT_TOKENS);

        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| GenerationFailure::Provider(format!("build LLM: {e}")))?;

        let messages = vec![ChatMessage::user().content(prompt).build()];

        tracing::debug!(
            provider = %self.settings.provider,
            model = %self.settings.model,
            timeout_secs = self.timeout.as_secs(),
            "sending prompt"
        );

        let response = tokio::time::timeout(self.timeout, llm.chat(&messages))
            .await
            .map_err(|_| GenerationFailure::Timeout(self.timeout.as_secs()))?
            .map_err(|e| GenerationFailure::Provider(format!("chat: {e}")))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(GenerationFailure::Malformed("LLM returned empty text".into())),
            None => Err(GenerationFailure::Malformed("LLM returned no text".into())),
        }
    }
}
