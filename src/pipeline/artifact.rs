//! Figure compilation: run an external compiler on generated source.
//!
//! The renderer never fails with an error value. A missing executable, a
//! non-zero exit status, an I/O problem or a timeout all come back as a
//! [`RenderReport`] with `success == false` and a readable diagnostic,
//! because the caller feeds that diagnostic straight into the next
//! generation prompt.
//!
//! ## Working directory
//!
//! Asymptote resolves its output name relative to the current directory.
//! Each invocation sets `current_dir` on the child process only; the
//! process-wide working directory is never touched, so concurrent figures
//! cannot race on it.

use crate::config::ConversionConfig;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Subdirectory of the output directory that holds figure files.
pub const FIGURES_DIR: &str = "figures";

/// Longest diagnostic kept from compiler output, in characters.
///
/// Asymptote can print pages of warnings; only the tail is useful feedback.
pub const MAX_DIAGNOSTIC_CHARS: usize = 4000;

/// Outcome of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub success: bool,
    pub diagnostic: String,
}

impl RenderReport {
    pub fn ok(diagnostic: impl Into<String>) -> Self {
        Self {
            success: true,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Compiles generated figure source into an artifact file.
///
/// Implementations must tolerate concurrent calls as long as each call uses
/// its own `name_base`.
#[async_trait]
pub trait ArtifactRenderer: Send + Sync {
    /// Compile `source` into `{output_dir}/{name_base}.{artifact_extension}`.
    async fn render(&self, source: &str, output_dir: &Path, name_base: &str) -> RenderReport;

    /// Extension of the source file written next to the artifact.
    fn source_extension(&self) -> &str;

    /// Extension of the compiled artifact.
    fn artifact_extension(&self) -> &str;
}

/// Document-relative reference to an artifact, always `/`-separated.
pub fn artifact_ref(name_base: &str, extension: &str) -> String {
    format!("{FIGURES_DIR}/{name_base}.{extension}")
}

/// Runs `asy -f <format> <name>.asy` in the figures directory.
#[derive(Debug, Clone)]
pub struct AsymptoteRenderer {
    program: String,
    format: String,
    timeout: Duration,
    lock: Option<Arc<Mutex<()>>>,
}

impl AsymptoteRenderer {
    pub fn new(program: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
            timeout: Duration::from_secs(120),
            lock: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Allow only one compiler process at a time across all clones.
    pub fn serialized(mut self) -> Self {
        self.lock = Some(Arc::new(Mutex::new(())));
        self
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        let renderer = Self::new(&config.renderer_program, &config.render_format)
            .with_timeout(Duration::from_secs(config.render_timeout_secs));
        if config.serialize_renders {
            renderer.serialized()
        } else {
            renderer
        }
    }

    async fn run_compiler(&self, output_dir: &Path, source_file: &str) -> RenderReport {
        let _guard = match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let child = Command::new(&self.program)
            .arg("-f")
            .arg(&self.format)
            .arg(source_file)
            .current_dir(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return RenderReport::failed(format!(
                    "The '{}' command was not found. Install Asymptote and ensure it is on PATH.",
                    self.program
                ));
            }
            Err(e) => {
                return RenderReport::failed(format!("Failed to start '{}': {}", self.program, e));
            }
        };

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return RenderReport::failed(format!("Failed to wait for '{}': {}", self.program, e));
            }
            Err(_) => {
                return RenderReport::failed(format!(
                    "'{}' timed out after {:?} compiling {}",
                    self.program,
                    self.timeout,
                    source_file
                ));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };

        if output.status.success() {
            RenderReport::ok(tail_chars(text, MAX_DIAGNOSTIC_CHARS))
        } else if text.is_empty() {
            RenderReport::failed(format!("'{}' exited with {}", self.program, output.status))
        } else {
            RenderReport::failed(tail_chars(text, MAX_DIAGNOSTIC_CHARS))
        }
    }
}

#[async_trait]
impl ArtifactRenderer for AsymptoteRenderer {
    async fn render(&self, source: &str, output_dir: &Path, name_base: &str) -> RenderReport {
        let source_file = format!("{}.{}", name_base, self.source_extension());
        let source_path = output_dir.join(&source_file);

        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            return RenderReport::failed(format!(
                "Failed to create {}: {}",
                output_dir.display(),
                e
            ));
        }
        if let Err(e) = tokio::fs::write(&source_path, source).await {
            return RenderReport::failed(format!(
                "Failed to write {}: {}",
                source_path.display(),
                e
            ));
        }

        debug!("Compiling {} with {}", source_path.display(), self.program);
        let report = self.run_compiler(output_dir, &source_file).await;
        if report.success {
            debug!("Compiled {}.{}", name_base, self.format);
        } else {
            warn!("Failed to compile {}: {}", source_file, report.diagnostic);
        }
        report
    }

    fn source_extension(&self) -> &str {
        "asy"
    }

    fn artifact_extension(&self) -> &str {
        &self.format
    }
}

/// Keep at most the last `max` characters of `s`.
fn tail_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        s.chars().skip(count - max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_ref_uses_forward_slashes() {
        assert_eq!(artifact_ref("figure3", "pdf"), "figures/figure3.pdf");
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("ééé", 2), "éé");
    }

    #[test]
    fn from_config_copies_settings() {
        let config = ConversionConfig::builder()
            .renderer_program("/opt/asy/bin/asy")
            .render_format("svg")
            .render_timeout_secs(7)
            .serialize_renders(true)
            .build()
            .unwrap();
        let r = AsymptoteRenderer::from_config(&config);
        assert_eq!(r.program, "/opt/asy/bin/asy");
        assert_eq!(r.artifact_extension(), "svg");
        assert_eq!(r.timeout, Duration::from_secs(7));
        assert!(r.lock.is_some());
    }

    #[tokio::test]
    async fn missing_program_is_a_failed_report() {
        let dir = tempfile::tempdir().unwrap();
        let r = AsymptoteRenderer::new("pdf2tex-no-such-compiler", "pdf");
        let report = r.render("size(100);", dir.path(), "figure1").await;

        assert!(!report.success);
        assert!(report.diagnostic.contains("not found"), "got: {}", report.diagnostic);
        // The source is still written so it can be inspected.
        assert!(dir.path().join("figure1.asy").exists());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn zero_exit_is_success_and_runs_in_output_dir() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            // $1=-f $2=<format> $3=<name>.asy
            let fake = script(bin.path(), "fake-asy", r#"touch "${3%.asy}.$2""#);

            let r = AsymptoteRenderer::new(fake.to_string_lossy(), "pdf");
            let report = r.render("size(100);", out.path(), "figure2").await;

            assert!(report.success, "diagnostic: {}", report.diagnostic);
            assert!(out.path().join("figure2.pdf").exists());
            assert_eq!(
                std::fs::read_to_string(out.path().join("figure2.asy")).unwrap(),
                "size(100);"
            );
        }

        #[tokio::test]
        async fn stderr_becomes_the_diagnostic() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let fake = script(
                bin.path(),
                "broken-asy",
                "echo 'figure1.asy: 3.7: syntax error' >&2\nexit 1",
            );

            let r = AsymptoteRenderer::new(fake.to_string_lossy(), "pdf");
            let report = r.render("draw(", out.path(), "figure1").await;

            assert!(!report.success);
            assert_eq!(report.diagnostic, "figure1.asy: 3.7: syntax error");
        }

        #[tokio::test]
        async fn silent_failure_reports_exit_status() {
            let out = tempfile::tempdir().unwrap();
            let r = AsymptoteRenderer::new("false", "pdf");
            let report = r.render("size(1);", out.path(), "figure1").await;

            assert!(!report.success);
            assert!(report.diagnostic.contains("exited with"), "got: {}", report.diagnostic);
        }

        #[tokio::test]
        async fn hung_compiler_times_out() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let fake = script(bin.path(), "slow-asy", "sleep 10");

            let r = AsymptoteRenderer::new(fake.to_string_lossy(), "pdf")
                .with_timeout(Duration::from_millis(200));
            let report = r.render("size(1);", out.path(), "figure1").await;

            assert!(!report.success);
            assert!(report.diagnostic.contains("timed out"), "got: {}", report.diagnostic);
        }
    }
}
