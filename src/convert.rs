//! Conversion entry points.
//!
//! [`convert`] runs the whole pipeline: resolve the input, rasterise and
//! encode its pages, ask the VLM for the LaTeX template and the figure list
//! (concurrently), generate every figure, splice the figures in and write
//! `{output_dir}/{stem}.tex`.
//!
//! The figure half is exposed on its own as [`generate_figures`] and
//! [`assemble_document`] so callers with their own template and
//! descriptions (or their own generator and renderer) can reuse it.

use crate::config::ConversionConfig;
use crate::error::Pdf2TexError;
use crate::output::{artifact_refs, ConversionOutput, ConversionStats, TaskResult};
use crate::pipeline::artifact::{ArtifactRenderer, AsymptoteRenderer};
use crate::pipeline::assemble::assemble;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::llm::{FigureCodeGenerator, LlmGenerator};
use crate::pipeline::postprocess::clean_latex;
use crate::pipeline::retry::FigureWorker;
use crate::pipeline::{encode, input, pages};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF or image (file path or HTTP/HTTPS URL) to LaTeX.
///
/// The document is written to `{output_dir}/{stem}.tex` and figures to
/// `{output_dir}/figures/`. Figures that could not be generated are left as
/// placeholders and listed by [`ConversionOutput::omitted_figures`].
///
/// # Errors
/// Returns `Err(Pdf2TexError)` only for fatal errors: unreadable input,
/// pdfium or provider problems, a failed text-extraction call, or an output
/// directory that cannot be created.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2TexError> {
    convert_inner(input_str.as_ref(), config, None).await
}

/// Convert and write the document to `output_path` instead of
/// `{output_dir}/{stem}.tex`.
///
/// Figures land in a `figures/` directory next to `output_path` so the
/// relative paths inside the document resolve.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2TexError> {
    let output_path = output_path.as_ref();
    let mut config = config.clone();
    config.output_dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    convert_inner(input_str.as_ref(), &config, Some(output_path)).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2TexError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TexError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Generate one figure per description, concurrently.
///
/// The result has the same length and order as `descriptions`. Fires
/// `on_conversion_start` / `on_conversion_complete` on the configured
/// progress callback.
pub async fn generate_figures(
    descriptions: &[String],
    generator: Arc<dyn FigureCodeGenerator>,
    renderer: Arc<dyn ArtifactRenderer>,
    config: &ConversionConfig,
) -> Vec<TaskResult> {
    let total = descriptions.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total);
    }

    let worker = FigureWorker::new(generator, renderer, config.figures_dir(), config.max_attempts)
        .with_progress(config.progress_callback.clone())
        .with_total(total);
    let results = Dispatcher::new(worker)
        .with_max_parallel(config.max_parallel_figures)
        .dispatch(descriptions)
        .await;

    let generated = results.iter().filter(|r| r.succeeded()).count();
    info!("Figures complete: {}/{} generated", generated, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total, generated);
    }
    results
}

/// Generate the figures for `descriptions` and merge them into `template`.
///
/// Creates the output and figures directories but does not write the
/// `.tex` file; `output_path` of the result is `None`. Token counts and
/// `source_pages` are left at zero for the caller to fill in.
pub async fn assemble_document(
    template: &str,
    descriptions: &[String],
    generator: Arc<dyn FigureCodeGenerator>,
    renderer: Arc<dyn ArtifactRenderer>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2TexError> {
    prepare_output_dirs(config).await?;

    let figures_start = Instant::now();
    let figures = generate_figures(descriptions, generator, renderer, config).await;
    let figures_duration_ms = figures_start.elapsed().as_millis() as u64;

    let merged = assemble(template, &artifact_refs(&figures));
    if merged.preamble_injected {
        debug!("Added graphicx to the preamble");
    }
    let latex = clean_latex(&merged.latex);

    let generated = figures.iter().filter(|f| f.succeeded()).count();
    let stats = ConversionStats {
        total_figures: figures.len(),
        generated_figures: generated,
        failed_figures: figures.len() - generated,
        total_attempts: figures.iter().map(|f| f.attempts as u64).sum(),
        unfilled_placeholders: merged.unfilled.len(),
        figures_duration_ms,
        ..Default::default()
    };

    let output = ConversionOutput {
        latex,
        figures,
        unfilled_placeholders: merged.unfilled,
        output_path: None,
        stats,
    };

    let omitted = output.omitted_figures();
    if !omitted.is_empty() {
        warn!("Omitted figure(s): {:?}", omitted);
    }
    Ok(output)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn convert_inner(
    input_str: &str,
    config: &ConversionConfig,
    output_path: Option<&Path>,
) -> Result<ConversionOutput, Pdf2TexError> {
    let total_start = Instant::now();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Step 2: Output directories, before any expensive work ────────────
    prepare_output_dirs(config).await?;
    let output_path = match output_path {
        Some(p) => p.to_path_buf(),
        None => config.output_dir.join(format!("{}.tex", resolved.stem())),
    };

    // ── Step 3: Get/create provider ──────────────────────────────────────
    let provider = resolve_provider(config).await?;

    // ── Step 4: Load and encode pages ────────────────────────────────────
    let page_images = pages::load_pages(&resolved, config).await?;
    let source_pages = page_images.len();
    let encoded = encode::encode_pages(&page_images)?;
    drop(page_images);
    info!("Prepared {} page image(s)", source_pages);

    // ── Step 5: Text and figure discovery, concurrently ──────────────────
    let llm = Arc::new(LlmGenerator::new(provider, config));
    let analysis_start = Instant::now();
    let (template, descriptions) = tokio::join!(
        llm.latex_from_pages(&encoded, config.text_mode),
        llm.describe_figures(&encoded)
    );
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;
    let template = template?;
    let descriptions = descriptions.unwrap_or_else(|e| {
        warn!("Figure discovery failed, continuing without figures: {}", e);
        Vec::new()
    });
    info!("Found {} figure description(s)", descriptions.len());

    // ── Step 6: Figures and assembly ─────────────────────────────────────
    let renderer: Arc<dyn ArtifactRenderer> = Arc::new(AsymptoteRenderer::from_config(config));
    let generator: Arc<dyn FigureCodeGenerator> = llm.clone();
    let mut output =
        assemble_document(&template, &descriptions, generator, renderer, config).await?;

    // ── Step 7: Write the document ───────────────────────────────────────
    write_atomic(&output_path, &output.latex).await?;
    info!("Wrote {}", output_path.display());
    output.output_path = Some(output_path);

    let (input_tokens, output_tokens) = llm.token_usage();
    output.stats.source_pages = source_pages;
    output.stats.total_input_tokens = input_tokens;
    output.stats.total_output_tokens = output_tokens;
    output.stats.analysis_duration_ms = analysis_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Conversion complete: {}/{} figures, {}ms total",
        output.stats.generated_figures, output.stats.total_figures, output.stats.total_duration_ms
    );
    Ok(output)
}

async fn prepare_output_dirs(config: &ConversionConfig) -> Result<(), Pdf2TexError> {
    let figures_dir = config.figures_dir();
    tokio::fs::create_dir_all(&figures_dir)
        .await
        .map_err(|e| Pdf2TexError::OutputDirFailed {
            path: figures_dir,
            source: e,
        })
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Pdf2TexError> {
    let write_failed = |source: std::io::Error| Pdf2TexError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("tex.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2TexError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2TexError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` with `config.model`.
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. OpenAI, when `OPENAI_API_KEY` is set.
/// 5. [`ProviderFactory::from_env`] auto-detection.
async fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Pdf2TexError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2TexError::ProviderNotConfigured {
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

/// Vision model used when only a provider (or only an OpenAI key) is given.
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.tex");

        write_atomic(&path, "first\n").await.unwrap();
        write_atomic(&path, "second\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
        assert!(!path.with_extension("tex.tmp").exists());
    }

    #[tokio::test]
    async fn prepare_output_dirs_creates_figures_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .output_dir(dir.path().join("out"))
            .build()
            .unwrap();

        prepare_output_dirs(&config).await.unwrap();
        assert!(dir.path().join("out").join("figures").is_dir());
    }

    #[tokio::test]
    async fn output_dir_that_is_a_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, b"").unwrap();
        let config = ConversionConfig::builder()
            .output_dir(&blocker)
            .build()
            .unwrap();

        let err = prepare_output_dirs(&config).await.unwrap_err();
        assert!(matches!(err, Pdf2TexError::OutputDirFailed { .. }));
    }

    #[tokio::test]
    async fn missing_input_fails_before_any_llm_call() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let config = ConversionConfig::builder()
            .output_dir(&out)
            .build()
            .unwrap();

        let err = convert("/no/such/file.pdf", &config).await.unwrap_err();
        assert!(matches!(err, Pdf2TexError::FileNotFound { .. }));
        assert!(!out.exists(), "output dir created for a missing input");
    }
}
