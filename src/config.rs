//! Configuration types for document-to-LaTeX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across the per-figure tasks and to log the
//! effective settings of a run.

use crate::error::Pdf2TexError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default upper bound on generate+render cycles per figure.
pub const MAX_ATTEMPTS: u32 = 3;

/// Upper bound for [`ConversionConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for a conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2tex::{ConversionConfig, TextMode};
///
/// let config = ConversionConfig::builder()
///     .output_dir("out")
///     .text_mode(TextMode::Summarizing)
///     .max_attempts(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// LLM model identifier. If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for every LLM completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per LLM completion. Default: 8192.
    ///
    /// The text stage returns a whole LaTeX document in one response, so the
    /// default is higher than a per-page budget would be.
    pub max_tokens: usize,

    /// Transient-error retries for the single-shot stages (text extraction,
    /// figure discovery). Default: 3, capped at [`MAX_RETRIES`].
    ///
    /// Figure code generation is never retried here; its retries are the
    /// feedback-driven attempts governed by `max_attempts`.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Generate+render cycles per figure before giving up. Default: [`MAX_ATTEMPTS`].
    pub max_attempts: u32,

    /// Upper bound on figures processed at once. `None` (default) spawns one
    /// task per figure.
    pub max_parallel_figures: Option<usize>,

    /// How the body text is treated. Default: [`TextMode::Verbatim`].
    pub text_mode: TextMode,

    /// Directory receiving the `.tex` file and the `figures/` subdirectory.
    /// Default: `output`.
    pub output_dir: PathBuf,

    /// Figure compiler executable. Default: `asy`.
    pub renderer_program: String,

    /// Output format passed to the figure compiler (`-f`). Default: `pdf`.
    pub render_format: String,

    /// Per-invocation timeout for the figure compiler in seconds. Default: 120.
    pub render_timeout_secs: u64,

    /// Run at most one compiler process at a time. Default: false.
    ///
    /// Only the compiler call is serialised; generation for other figures
    /// keeps running concurrently.
    pub serialize_renders: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-LLM-call timeout in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Optional per-figure progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_attempts: MAX_ATTEMPTS,
            max_parallel_figures: None,
            text_mode: TextMode::default(),
            output_dir: PathBuf::from("output"),
            renderer_program: "asy".to_string(),
            render_format: "pdf".to_string(),
            render_timeout_secs: 120,
            serialize_renders: false,
            password: None,
            download_timeout_secs: 120,
            api_timeout_secs: 180,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_attempts", &self.max_attempts)
            .field("max_parallel_figures", &self.max_parallel_figures)
            .field("text_mode", &self.text_mode)
            .field("output_dir", &self.output_dir)
            .field("renderer_program", &self.renderer_program)
            .field("render_format", &self.render_format)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("serialize_renders", &self.serialize_renders)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory the figure sources and artifacts are written to.
    pub fn figures_dir(&self) -> PathBuf {
        self.output_dir.join(crate::pipeline::artifact::FIGURES_DIR)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    /// Clamped to [`MAX_RETRIES`].
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    /// Bound figure concurrency; `0` means unbounded.
    pub fn max_parallel_figures(mut self, n: usize) -> Self {
        self.config.max_parallel_figures = if n == 0 { None } else { Some(n) };
        self
    }

    pub fn text_mode(mut self, mode: TextMode) -> Self {
        self.config.text_mode = mode;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn renderer_program(mut self, program: impl Into<String>) -> Self {
        self.config.renderer_program = program.into();
        self
    }

    pub fn render_format(mut self, format: impl Into<String>) -> Self {
        self.config.render_format = format.into();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn serialize_renders(mut self, v: bool) -> Self {
        self.config.serialize_renders = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2TexError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Pdf2TexError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_attempts == 0 {
            return Err(Pdf2TexError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.renderer_program.trim().is_empty() {
            return Err(Pdf2TexError::InvalidConfig(
                "renderer program must not be empty".into(),
            ));
        }
        if c.render_format.trim().is_empty() {
            return Err(Pdf2TexError::InvalidConfig(
                "render format must not be empty".into(),
            ));
        }
        if c.render_timeout_secs == 0 {
            return Err(Pdf2TexError::InvalidConfig(
                "render timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the source text is carried into the LaTeX body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    /// Keep the original wording; only format it. (default)
    #[default]
    Verbatim,
    /// Rewrite for clarity and flow.
    Rewriting,
    /// Condense into a summary.
    Summarizing,
}

impl TextMode {
    /// The instruction line placed at the top of the text prompt.
    pub fn instruction(self) -> &'static str {
        match self {
            TextMode::Verbatim => "Format the text of these pages as-is.",
            TextMode::Rewriting => "Rewrite the text of these pages to improve clarity and flow.",
            TextMode::Summarizing => "Summarize the text of these pages concisely.",
        }
    }
}

impl fmt::Display for TextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TextMode::Verbatim => "verbatim",
            TextMode::Rewriting => "rewriting",
            TextMode::Summarizing => "summarizing",
        })
    }
}
