//! Analysis progress reporting.
//!
//! Reports observable progress during `analyze()` so operators see which
//! phase a long-running document is in and which chunks failed. Progress
//! is emitted on **stderr** so stdout remains parseable for scripts.
//! Partial chunk failures always go through here — they are excluded from
//! the merge, never silently dropped.

use std::io::Write;

use crate::models::AnalysisOutcome;

/// Phase of the analysis pipeline, in execution order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnalysisPhase {
    Planning,
    Ocr,
    RegionScan,
    Merging,
    Extracting,
    QualityGate,
    IdentityGate,
    DuplicateGate,
}

impl AnalysisPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPhase::Planning => "planning",
            AnalysisPhase::Ocr => "ocr",
            AnalysisPhase::RegionScan => "region-scan",
            AnalysisPhase::Merging => "merging",
            AnalysisPhase::Extracting => "extracting",
            AnalysisPhase::QualityGate => "quality-gate",
            AnalysisPhase::IdentityGate => "identity-gate",
            AnalysisPhase::DuplicateGate => "duplicate-gate",
        }
    }
}

/// A single progress event for one analysis.
#[derive(Clone, Debug)]
pub enum AnalysisEvent {
    PhaseStarted {
        phase: AnalysisPhase,
    },
    /// One chunk finished OCR successfully.
    ChunkCompleted {
        index: usize,
        total: usize,
    },
    /// One chunk failed OCR (error or timeout); the pipeline continues
    /// without it.
    ChunkFailed {
        index: usize,
        total: usize,
        error: String,
    },
    /// Best-effort warning (e.g. the region scan degraded to nothing).
    Warning {
        message: String,
    },
    Finished {
        outcome: AnalysisOutcome,
    },
}

/// Reports analysis progress. Implementations write to stderr (human or
/// JSON) or swallow events.
pub trait AnalysisProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the pipeline.
    fn report(&self, event: AnalysisEvent);
}

/// Human-friendly progress on stderr: "analyze  ocr  chunk 2/3 failed: ...".
pub struct StderrProgress;

impl AnalysisProgressReporter for StderrProgress {
    fn report(&self, event: AnalysisEvent) {
        let line = match &event {
            AnalysisEvent::PhaseStarted { phase } => format!("analyze  {}\n", phase.as_str()),
            AnalysisEvent::ChunkCompleted { index, total } => {
                format!("analyze  ocr  chunk {}/{} done\n", index + 1, total)
            }
            AnalysisEvent::ChunkFailed { index, total, error } => {
                format!(
                    "analyze  ocr  chunk {}/{} failed: {}\n",
                    index + 1,
                    total,
                    error
                )
            }
            AnalysisEvent::Warning { message } => format!("analyze  warning: {}\n", message),
            AnalysisEvent::Finished { outcome } => {
                format!("analyze  finished: {:?}\n", outcome)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl AnalysisProgressReporter for JsonProgress {
    fn report(&self, event: AnalysisEvent) {
        let obj = match &event {
            AnalysisEvent::PhaseStarted { phase } => serde_json::json!({
                "event": "phase",
                "phase": phase.as_str(),
            }),
            AnalysisEvent::ChunkCompleted { index, total } => serde_json::json!({
                "event": "chunk",
                "index": index,
                "total": total,
                "success": true,
            }),
            AnalysisEvent::ChunkFailed { index, total, error } => serde_json::json!({
                "event": "chunk",
                "index": index,
                "total": total,
                "success": false,
                "error": error,
            }),
            AnalysisEvent::Warning { message } => serde_json::json!({
                "event": "warning",
                "message": message,
            }),
            AnalysisEvent::Finished { outcome } => serde_json::json!({
                "event": "finished",
                "outcome": outcome,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl AnalysisProgressReporter for NoProgress {
    fn report(&self, _event: AnalysisEvent) {}
}

/// Progress mode: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn AnalysisProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
