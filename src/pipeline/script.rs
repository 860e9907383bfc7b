//! Narration script generation through an LLM.
//!
//! All prompt text lives in [`crate::prompts`]; this module owns the
//! provider call, retries and cleanup.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient under load.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) with the 500 ms
//! default and 3 retries waits 500 ms → 1 s → 2 s before giving up.
//!
//! ## Provider resolution
//!
//! [`resolve_provider`] walks four levels, most specific first:
//!
//! 1. **Pre-built provider** (`config.provider`), used as-is.
//! 2. **Named provider + model** (`config.provider_name`), built with
//!    [`ProviderFactory::create_llm_provider`].
//! 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
//! 4. **Auto-detection**: OpenAI when `OPENAI_API_KEY` is set, otherwise
//!    [`ProviderFactory::from_env`].

use crate::config::{PipelineConfig, Tone};
use crate::error::Pdf2VideoError;
use crate::output::{PageScript, Script, INTRO_INDEX};
use crate::pipeline::postprocess::clean_narration;
use crate::prompts::{
    intro_user_message, page_user_message, summary_system_prompt, summary_user_message,
    PAGE_SYSTEM_PROMPT, WORDS_PER_MINUTE,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Default model when a provider is named without one.
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Concurrent page-script requests.
const PAGE_CONCURRENCY: usize = 4;

/// Produces narration text.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// One script summarising `source`.
    async fn generate(
        &self,
        source: &str,
        tone: Tone,
        target_duration_secs: u32,
    ) -> Result<Script, Pdf2VideoError>;

    /// An intro (index 0) plus one script per entry of `text_by_page`
    /// (indices 1..=N), in ascending index order.
    async fn generate_for_pages(
        &self,
        text_by_page: &[String],
        full_text: &str,
    ) -> Result<Vec<PageScript>, Pdf2VideoError>;
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Seconds needed to speak `words` at the standard rate.
pub fn estimate_duration_secs(words: usize) -> u64 {
    ((words as f64 / WORDS_PER_MINUTE as f64) * 60.0).round() as u64
}

/// [`ScriptGenerator`] backed by an `edgequake-llm` provider.
pub struct LlmScriptGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl LlmScriptGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Pdf2VideoError> {
        let provider = resolve_provider(config)?;
        info!(
            provider = config.provider_name.as_deref().unwrap_or("auto"),
            "Script provider resolved"
        );
        Ok(Self::new(provider, config))
    }

    /// One chat round with retries; returns cleaned narration.
    async fn complete(&self, label: &str, system: &str, user: String) -> Result<String, Pdf2VideoError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::system(system), ChatMessage::user(&user)];
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    label, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        label,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let script = clean_narration(&response.content);
                    if script.is_empty() {
                        last_err = Some("model returned an empty script".to_string());
                        continue;
                    }
                    return Ok(script);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("{}: attempt {} failed: {}", label, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(Pdf2VideoError::ScriptGenerationFailed {
            message: format!(
                "{label}: {}",
                last_err.unwrap_or_else(|| "Unknown error".to_string())
            ),
        })
    }
}

#[async_trait]
impl ScriptGenerator for LlmScriptGenerator {
    async fn generate(
        &self,
        source: &str,
        tone: Tone,
        target_duration_secs: u32,
    ) -> Result<Script, Pdf2VideoError> {
        if source.trim().is_empty() {
            return Err(Pdf2VideoError::ScriptGenerationFailed {
                message: "no source text".into(),
            });
        }
        let system = summary_system_prompt(tone, target_duration_secs);
        let user = summary_user_message(source, tone, target_duration_secs);
        let text = self.complete("Summary", &system, user).await?;
        let words = word_count(&text);
        Ok(Script {
            estimated_duration_secs: estimate_duration_secs(words),
            word_count: words,
            text,
        })
    }

    async fn generate_for_pages(
        &self,
        text_by_page: &[String],
        full_text: &str,
    ) -> Result<Vec<PageScript>, Pdf2VideoError> {
        if text_by_page.is_empty() || full_text.trim().is_empty() {
            return Err(Pdf2VideoError::ScriptGenerationFailed {
                message: "no page text to narrate".into(),
            });
        }
        let page_count = text_by_page.len();

        let intro = PageScript {
            page_index: INTRO_INDEX,
            script: self
                .complete("Intro", PAGE_SYSTEM_PROMPT, intro_user_message(full_text, page_count))
                .await?,
        };

        let requests: Vec<_> = text_by_page
            .iter()
            .enumerate()
            .map(|(i, text)| (i + 1, page_user_message(i + 1, page_count, text)))
            .collect();
        let pages: Vec<PageScript> = stream::iter(requests)
            .map(|(page_num, user)| async move {
                let script = self
                    .complete(&format!("Page {page_num}"), PAGE_SYSTEM_PROMPT, user)
                    .await?;
                Ok::<_, Pdf2VideoError>(PageScript {
                    page_index: page_num,
                    script,
                })
            })
            .buffered(PAGE_CONCURRENCY)
            .try_collect()
            .await?;

        let mut all = Vec::with_capacity(page_count + 1);
        all.push(intro);
        all.extend(pages);
        Ok(all)
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2VideoError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2VideoError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, Pdf2VideoError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2VideoError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::MockProvider;

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.7));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn word_and_duration_estimates() {
        assert_eq!(word_count("  one two\nthree\tfour "), 4);
        assert_eq!(estimate_duration_secs(150), 60);
        assert_eq!(estimate_duration_secs(300), 120);
        assert_eq!(estimate_duration_secs(0), 0);
    }

    fn mock_generator(provider: MockProvider) -> LlmScriptGenerator {
        let config = PipelineConfig {
            max_retries: 0,
            ..PipelineConfig::default()
        };
        LlmScriptGenerator::new(Arc::new(provider), &config)
    }

    #[tokio::test]
    async fn page_scripts_come_back_intro_first_in_page_order() {
        let provider = MockProvider::new();
        provider.add_response("Welcome to the deck.").await;
        let gen = mock_generator(provider);

        let pages = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let scripts = gen
            .generate_for_pages(&pages, "alpha\n\nbeta\n\ngamma")
            .await
            .unwrap();

        let indices: Vec<usize> = scripts.iter().map(|s| s.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(scripts[0].script, "Welcome to the deck.");
        assert!(scripts[1..].iter().all(|s| !s.script.is_empty()));
    }

    #[tokio::test]
    async fn page_scripts_need_source_text() {
        let gen = mock_generator(MockProvider::new());
        let err = gen.generate_for_pages(&[], "").await.unwrap_err();
        assert!(matches!(err, Pdf2VideoError::ScriptGenerationFailed { .. }));
    }
}
