//! Per-figure work items and the append-only feedback log.

use serde::{Deserialize, Serialize};

/// One failed render, kept so the next generation call can correct it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFeedback {
    /// 1-indexed attempt number that produced `code`.
    pub attempt: u32,
    /// The source the renderer rejected.
    pub code: String,
    /// What the renderer reported.
    pub diagnostic: String,
}

/// Append-only record of failed renders for one figure.
///
/// Entries can only be pushed, never edited or removed, so the context sent
/// with attempt `n` is always a prefix of the context sent with attempt `n+1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptLog {
    entries: Vec<AttemptFeedback>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attempt: u32, code: impl Into<String>, diagnostic: impl Into<String>) {
        self.entries.push(AttemptFeedback {
            attempt,
            code: code.into(),
            diagnostic: diagnostic.into(),
        });
    }

    pub fn entries(&self) -> &[AttemptFeedback] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn last(&self) -> Option<&AttemptFeedback> {
        self.entries.last()
    }
}

/// A single figure to generate.
///
/// `index` is fixed at creation and decides both the output slot and the
/// `figure{index+1}` file names.
#[derive(Debug, Clone)]
pub struct FigureTask {
    pub index: usize,
    pub description: String,
    pub context: AttemptLog,
}

impl FigureTask {
    pub fn new(index: usize, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            context: AttemptLog::new(),
        }
    }

    /// 1-indexed figure number (placeholder number, file-name suffix).
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// File stem shared by the source and the compiled artifact.
    pub fn name_base(&self) -> String {
        format!("figure{}", self.number())
    }
}

/// Result of one generate+render cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub succeeded: bool,
    pub artifact_ref: Option<String>,
    pub diagnostic: Option<String>,
}

impl AttemptOutcome {
    pub fn success(artifact_ref: String) -> Self {
        Self {
            succeeded: true,
            artifact_ref: Some(artifact_ref),
            diagnostic: None,
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            artifact_ref: None,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_base_is_one_indexed() {
        let task = FigureTask::new(0, "a bar chart");
        assert_eq!(task.number(), 1);
        assert_eq!(task.name_base(), "figure1");
        assert!(task.context.is_empty());
    }

    #[test]
    fn log_only_grows() {
        let mut log = AttemptLog::new();
        log.push(1, "draw((0,0)--(1,1))", "syntax error");
        let before = log.clone();
        log.push(2, "draw((0,0)--(1,1));", "undefined label");

        assert_eq!(log.len(), 2);
        assert_eq!(&log.entries()[..1], before.entries());
        assert_eq!(log.last().map(|e| e.attempt), Some(2));
    }

    #[test]
    fn outcome_constructors() {
        let ok = AttemptOutcome::success("figures/figure1.pdf".into());
        assert!(ok.succeeded);
        assert!(ok.diagnostic.is_none());

        let bad = AttemptOutcome::failure("exit status 1");
        assert!(!bad.succeeded);
        assert_eq!(bad.diagnostic.as_deref(), Some("exit status 1"));
    }
}
