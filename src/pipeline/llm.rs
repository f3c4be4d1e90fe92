//! LLM interaction: text extraction, figure discovery, figure code.
//!
//! The figure-code call sits behind the [`FigureCodeGenerator`] trait so the
//! retry loop can be exercised with stubs. It is not retried here: a failed
//! generation is one failed attempt of
//! [`crate::pipeline::retry::FigureWorker`].
//!
//! The two single-shot stages ([`LlmGenerator::latex_from_pages`],
//! [`LlmGenerator::describe_figures`]) keep exponential backoff for
//! transient API errors (`retry_backoff_ms * 2^attempt`).

use crate::config::{ConversionConfig, TextMode};
use crate::error::{FigureError, Pdf2TexError};
use crate::pipeline::postprocess::{clean_latex, parse_figure_descriptions};
use crate::pipeline::task::FigureTask;
use crate::prompts::{figure_code_prompt, text_prompt, DESCRIBE_FIGURES_PROMPT, SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Produces figure source code for one attempt of a task.
///
/// Implementations read `task.context` to see earlier failures. An empty
/// string is a normal return value; errors are reserved for transport or
/// provider failures. Either way the attempt is counted.
#[async_trait]
pub trait FigureCodeGenerator: Send + Sync {
    async fn generate_code(&self, task: &FigureTask) -> Result<String, FigureError>;
}

/// Generation service backed by an `edgequake-llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    /// `(input, output)` tokens consumed so far across all stages.
    pub fn token_usage(&self) -> (u64, u64) {
        (
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }

    /// Convert page images into a LaTeX document with figure placeholders.
    pub async fn latex_from_pages(
        &self,
        pages: &[ImageData],
        mode: TextMode,
    ) -> Result<String, Pdf2TexError> {
        info!("Converting {} page(s) to LaTeX in '{}' mode", pages.len(), mode);
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_images(text_prompt(mode).as_str(), pages.to_vec()),
        ];
        let raw = self.chat_with_retry("text extraction", &messages).await?;
        Ok(clean_latex(&raw))
    }

    /// Ask the vision model for one description per figure on the pages.
    pub async fn describe_figures(&self, pages: &[ImageData]) -> Result<Vec<String>, Pdf2TexError> {
        info!("Looking for figures on {} page(s)", pages.len());
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_images(DESCRIBE_FIGURES_PROMPT, pages.to_vec()),
        ];
        let raw = self.chat_with_retry("figure discovery", &messages).await?;
        let descriptions = parse_figure_descriptions(&raw);
        debug!("Figure discovery returned {} description(s)", descriptions.len());
        Ok(descriptions)
    }

    async fn chat_with_retry(
        &self,
        stage: &str,
        messages: &[ChatMessage],
    ) -> Result<String, Pdf2TexError> {
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    stage, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.chat_once(messages).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!("{}: attempt {} failed — {}", stage, attempt + 1, e);
                    last_err = Some(e);
                }
            }
        }

        Err(Pdf2TexError::LlmApiError {
            stage: stage.to_string(),
            message: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    async fn chat_once(&self, messages: &[ChatMessage]) -> Result<String, String> {
        let options = build_options(self.temperature, self.max_tokens);
        match tokio::time::timeout(self.api_timeout, self.provider.chat(messages, Some(&options)))
            .await
        {
            Ok(Ok(response)) => {
                self.input_tokens
                    .fetch_add(response.prompt_tokens as u64, Ordering::Relaxed);
                self.output_tokens
                    .fetch_add(response.completion_tokens as u64, Ordering::Relaxed);
                Ok(response.content)
            }
            Ok(Err(e)) => Err(format!("{}", e)),
            Err(_) => Err(format!(
                "no response within {}s",
                self.api_timeout.as_secs()
            )),
        }
    }
}

#[async_trait]
impl FigureCodeGenerator for LlmGenerator {
    async fn generate_code(&self, task: &FigureTask) -> Result<String, FigureError> {
        debug!(
            "Figure {}: requesting code ({} prior failure(s))",
            task.number(),
            task.context.len()
        );
        let prompt = figure_code_prompt(&task.description, &task.context);
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt.as_str()),
        ];
        self.chat_once(&messages)
            .await
            .map_err(|detail| FigureError::GenerationFailed {
                figure: task.number(),
                detail,
            })
    }
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`,
/// saturating at `u64::MAX`.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base.saturating_mul(factor))
}
