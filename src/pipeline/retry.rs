//! Per-figure attempt loop.
//!
//! Each attempt asks the generator for code, compiles it, and on failure
//! appends the rejected code and the compiler diagnostic to the task's
//! [`AttemptLog`] so the next generation call can correct it. The loop stops
//! at the first successful compile or after `max_attempts`.
//!
//! Every file a task touches is named after its index (`figure{n}.asy`,
//! `figure{n}.pdf`), so concurrent workers never write the same path.

use crate::error::FigureError;
use crate::output::TaskResult;
use crate::pipeline::artifact::{artifact_ref, ArtifactRenderer};
use crate::pipeline::llm::FigureCodeGenerator;
use crate::pipeline::postprocess::extract_figure_code;
use crate::pipeline::task::{AttemptOutcome, FigureTask};
use crate::progress::ProgressCallback;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives one figure from description to artifact.
///
/// Cheap to share: the dispatcher wraps it in an `Arc` and every spawned
/// task calls [`FigureWorker::run`] on its own [`FigureTask`].
pub struct FigureWorker {
    generator: Arc<dyn FigureCodeGenerator>,
    renderer: Arc<dyn ArtifactRenderer>,
    figures_dir: PathBuf,
    max_attempts: u32,
    progress: Option<ProgressCallback>,
    total: usize,
}

impl FigureWorker {
    pub fn new(
        generator: Arc<dyn FigureCodeGenerator>,
        renderer: Arc<dyn ArtifactRenderer>,
        figures_dir: impl Into<PathBuf>,
        max_attempts: u32,
    ) -> Self {
        Self {
            generator,
            renderer,
            figures_dir: figures_dir.into(),
            max_attempts: max_attempts.max(1),
            progress: None,
            total: 0,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Total figure count reported in progress events.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Result for a task whose future never returned (panic or cancellation).
    pub(crate) fn aborted(&self, index: usize, description: String, detail: String) -> TaskResult {
        let error = FigureError::Panicked {
            figure: index + 1,
            detail,
        };
        warn!("{}", error);
        if let Some(ref cb) = self.progress {
            cb.on_figure_error(index + 1, self.total, &error.to_string());
        }
        TaskResult {
            index,
            description,
            artifact_ref: None,
            attempts: 0,
            error: Some(error),
        }
    }

    /// Run the attempt loop for `task` and report its final state.
    pub async fn run(&self, mut task: FigureTask) -> TaskResult {
        let figure = task.number();
        if let Some(ref cb) = self.progress {
            cb.on_figure_start(figure, self.total);
        }

        let mut last_diagnostic: Option<String> = None;
        let mut attempts = 0;

        for attempt in 1..=self.max_attempts {
            attempts = attempt;
            info!("Figure {}: attempt {}/{}", figure, attempt, self.max_attempts);

            let outcome = self.attempt(&mut task, attempt).await;
            if let Some(artifact) = outcome.artifact_ref {
                info!("Figure {}: compiled → {}", figure, artifact);
                if let Some(ref cb) = self.progress {
                    cb.on_figure_complete(figure, self.total, &artifact);
                }
                return TaskResult {
                    index: task.index,
                    description: task.description,
                    artifact_ref: Some(artifact),
                    attempts,
                    error: None,
                };
            }

            let diagnostic = outcome.diagnostic.unwrap_or_default();
            warn!(
                "Figure {}: attempt {}/{} failed — {}",
                figure, attempt, self.max_attempts, diagnostic
            );
            if let Some(ref cb) = self.progress {
                cb.on_attempt_failed(figure, attempt, &diagnostic);
            }
            last_diagnostic = Some(diagnostic);
        }

        let error = FigureError::Exhausted {
            figure,
            attempts,
            last_error: last_diagnostic.unwrap_or_else(|| "Unknown error".to_string()),
        };
        warn!("{}", error);
        if let Some(ref cb) = self.progress {
            cb.on_figure_error(figure, self.total, &error.to_string());
        }

        TaskResult {
            index: task.index,
            description: task.description,
            artifact_ref: None,
            attempts,
            error: Some(error),
        }
    }

    /// One generate → compile → persist cycle.
    async fn attempt(&self, task: &mut FigureTask, attempt: u32) -> AttemptOutcome {
        let raw = match self.generator.generate_code(task).await {
            Ok(raw) => raw,
            Err(e) => return AttemptOutcome::failure(e.to_string()),
        };

        let Some(code) = extract_figure_code(&raw) else {
            return AttemptOutcome::failure(
                FigureError::GenerationFailed {
                    figure: task.number(),
                    detail: "generator returned no code".to_string(),
                }
                .to_string(),
            );
        };

        let name_base = task.name_base();
        let report = self
            .renderer
            .render(&code, &self.figures_dir, &name_base)
            .await;

        if !report.success {
            let failure = FigureError::RenderFailed {
                figure: task.number(),
                diagnostic: report.diagnostic.clone(),
            };
            task.context.push(attempt, code, report.diagnostic);
            return AttemptOutcome::failure(failure.to_string());
        }

        // Overwrite whatever an earlier attempt left behind with the code
        // that actually compiled.
        let source_path = self
            .figures_dir
            .join(format!("{}.{}", name_base, self.renderer.source_extension()));
        if let Err(e) = tokio::fs::write(&source_path, &code).await {
            let diagnostic = format!("Failed to save {}: {}", source_path.display(), e);
            task.context.push(attempt, code, diagnostic.clone());
            return AttemptOutcome::failure(diagnostic);
        }
        debug!("Figure {}: saved {}", task.number(), source_path.display());

        AttemptOutcome::success(artifact_ref(
            &name_base,
            self.renderer.artifact_extension(),
        ))
    }
}
