use serde::Serialize;
use std::fmt;

/// Per-camera result of an orchestration call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureOutcome {
    pub success: bool,
    pub camera_name: String,
    /// Present whenever an image file was kept, including when only embedding failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub capture_time_ms: u64,
}

impl CaptureOutcome {
    pub(super) fn succeeded(camera_name: &str, filename: String, capture_time_ms: u64) -> Self {
        Self {
            success: true,
            camera_name: camera_name.to_string(),
            filename: Some(filename),
            error: None,
            capture_time_ms,
        }
    }

    pub(super) fn failed(
        camera_name: &str,
        filename: Option<String>,
        error: String,
        capture_time_ms: u64,
    ) -> Self {
        Self {
            success: false,
            camera_name: camera_name.to_string(),
            filename,
            error: Some(error),
            capture_time_ms,
        }
    }
}

/// Stages a single camera passes through during a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Interrupting,
    Capturing,
    FileValidated,
    Embedding,
    Done,
    Failed,
}

impl CaptureState {
    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(self, next: CaptureState) -> bool {
        use CaptureState::*;

        matches!(
            (self, next),
            (Idle, Interrupting)
                | (Idle, Capturing)
                | (Interrupting, Capturing)
                | (Capturing, FileValidated)
                | (Capturing, Failed)
                | (FileValidated, Embedding)
                | (Embedding, Done)
                | (Embedding, Failed)
        )
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::Interrupting => "interrupting",
            CaptureState::Capturing => "capturing",
            CaptureState::FileValidated => "file-validated",
            CaptureState::Embedding => "embedding",
            CaptureState::Done => "done",
            CaptureState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which orchestration produced a file; selects the filename prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Single,
    All,
    Stereo,
}

impl CaptureKind {
    pub fn prefix(self) -> &'static str {
        match self {
            CaptureKind::Single => "snapshot",
            CaptureKind::All => "all_cams",
            CaptureKind::Stereo => "stereo",
        }
    }
}
