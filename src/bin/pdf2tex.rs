//! CLI binary for edgequake-pdf2tex.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2tex::{
    convert, convert_to_file, ConversionConfig, ConversionOutput, ConversionProgressCallback,
    ProgressCallback, TextMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shorten a diagnostic to its first line, at most `max` characters.
fn one_line(s: &str, max: usize) -> String {
    let first = s.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if first.chars().count() > max {
        let cut: String = first.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    } else {
        first.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per figure.
/// Figures finish out of order, so timings are keyed by figure number.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the figure count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Analysing");
        bar.set_message("Reading pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} figures  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Drawing");
    }

    fn elapsed(&self, figure: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&figure))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_figures: usize) {
        self.activate_bar(total_figures);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating {total_figures} figure(s)…"))
        ));
    }

    fn on_figure_start(&self, figure: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(figure, Instant::now());
        }
        self.bar.set_message(format!("figure {figure}"));
    }

    fn on_attempt_failed(&self, figure: usize, attempt: u32, diagnostic: &str) {
        self.bar.println(format!(
            "  {} Figure {:>3}  attempt {}  {}",
            yellow("↻"),
            figure,
            attempt,
            dim(&one_line(diagnostic, 70)),
        ));
    }

    fn on_figure_complete(&self, figure: usize, total: usize, artifact: &str) {
        let elapsed = self.elapsed(figure);
        self.bar.println(format!(
            "  {} Figure {:>3}/{:<3}  {}  {}",
            green("✓"),
            figure,
            total,
            dim(artifact),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_figure_error(&self, figure: usize, total: usize, error: &str) {
        let elapsed = self.elapsed(figure);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Figure {:>3}/{:<3}  {}  {}",
            red("✗"),
            figure,
            total,
            red(&one_line(error, 80)),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_figures: usize, success_count: usize) {
        let failed = total_figures.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} figure(s) generated",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} figures generated  ({} omitted)",
                if failed == total_figures {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_figures,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert into ./output/paper.tex with figures in ./output/figures/
  pdf2tex paper.pdf

  # Choose the output directory and summarise the text
  pdf2tex paper.pdf --output-dir build --mode summarizing

  # Write the document to an explicit file
  pdf2tex scan.png -o notes/scan.tex

  # Give each figure five attempts, at most four figures at a time
  pdf2tex --attempts 5 --max-parallel 4 report.pdf

  # Convert from URL, JSON summary on stdout
  pdf2tex https://arxiv.org/pdf/1706.03762 --json > result.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         libpdfium file, or the directory containing it

REQUIREMENTS:
  Figures are compiled with Asymptote (`asy`). Install it from your package
  manager or https://asymptote.sourceforge.io/. Without it every figure is
  omitted and its placeholder stays in the document.
"#;

/// Convert PDFs and images to LaTeX with generated vector figures.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2tex",
    version,
    about = "Convert PDFs and images to LaTeX with generated Asymptote figures",
    long_about = "Convert a PDF or image (local file or URL) to a LaTeX document. The body text \
is extracted by a vision LLM; every figure is redrawn as Asymptote code, compiled, and retried \
with the compiler's error output until it builds.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/PNG/JPEG path or HTTP/HTTPS URL.
    input: String,

    /// Directory for the `.tex` file and the `figures/` directory.
    #[arg(long, env = "PDF2TEX_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Write the document to this file; figures go next to it.
    #[arg(short, long, env = "PDF2TEX_OUTPUT")]
    output: Option<PathBuf>,

    /// How the body text is treated.
    #[arg(long, env = "PDF2TEX_MODE", value_enum, default_value = "verbatim")]
    mode: ModeArg,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2TEX_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Generate+compile attempts per figure.
    #[arg(long, env = "PDF2TEX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    attempts: u32,

    /// Figures processed at once (0 = all at once).
    #[arg(long, env = "PDF2TEX_MAX_PARALLEL", default_value_t = 0)]
    max_parallel: usize,

    /// Asymptote executable.
    #[arg(long, env = "PDF2TEX_RENDERER", default_value = "asy")]
    renderer: String,

    /// Asymptote output format passed as `-f`.
    #[arg(long, env = "PDF2TEX_RENDER_FORMAT", default_value = "pdf")]
    render_format: String,

    /// Seconds before a compiler run is killed.
    #[arg(long, env = "PDF2TEX_RENDER_TIMEOUT", default_value_t = 120)]
    render_timeout: u64,

    /// Run one compiler process at a time.
    #[arg(long, env = "PDF2TEX_SERIALIZE_RENDERS")]
    serialize_renders: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TEX_PASSWORD")]
    password: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PDF2TEX_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2TEX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Transient-error retries for text extraction and figure discovery.
    #[arg(long, env = "PDF2TEX_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Print the result (ConversionOutput) as JSON on stdout.
    #[arg(long, env = "PDF2TEX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TEX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TEX_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2TEX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF2TEX_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ModeArg {
    Verbatim,
    Rewriting,
    Summarizing,
}

impl From<ModeArg> for TextMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Verbatim => TextMode::Verbatim,
            ModeArg::Rewriting => TextMode::Rewriting,
            ModeArg::Summarizing => TextMode::Summarizing,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = match cli.output {
        Some(ref path) => convert_to_file(&cli.input, path, &config).await,
        None => convert(&cli.input, &config).await,
    }
    .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

fn print_summary(output: &ConversionOutput, show_progress: bool) {
    let stats = &output.stats;
    if !show_progress {
        eprintln!(
            "Generated {}/{} figures ({} attempts) in {}ms",
            stats.generated_figures,
            stats.total_figures,
            stats.total_attempts,
            stats.total_duration_ms
        );
    }

    let omitted = output.omitted_figures();
    if !omitted.is_empty() {
        let list: Vec<String> = omitted.iter().map(|n| n.to_string()).collect();
        eprintln!(
            "   {} omitted figure(s): {}",
            yellow("⚠"),
            list.join(", ")
        );
    }

    if let Some(ref path) = output.output_path {
        eprintln!(
            "{}  {}",
            if output.unfilled_placeholders.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&path.display().to_string())
        );
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out  —  {}ms total",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        stats.total_duration_ms,
    );
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .text_mode(cli.mode.clone().into())
        .output_dir(&cli.output_dir)
        .max_attempts(cli.attempts)
        .max_parallel_figures(cli.max_parallel)
        .renderer_program(&cli.renderer)
        .render_format(&cli.render_format)
        .render_timeout_secs(cli.render_timeout)
        .serialize_renders(cli.serialize_renders)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_takes_first_non_empty_line() {
        assert_eq!(one_line("\n  error: bad\nmore", 80), "error: bad");
        assert_eq!(one_line("abcdef", 4), "abc\u{2026}");
    }

    #[test]
    fn cli_maps_onto_config() {
        let cli = Cli::parse_from([
            "pdf2tex",
            "doc.pdf",
            "--mode",
            "summarizing",
            "--attempts",
            "5",
            "--max-parallel",
            "2",
            "--serialize-renders",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.text_mode, TextMode::Summarizing);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.max_parallel_figures, Some(2));
        assert!(config.serialize_renders);
    }
}
