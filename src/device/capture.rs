use crate::camera::CameraConfig;
use crate::process::{CommandSpec, ProcessOutcome, ProcessRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One-frame capture parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub device_path: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub output_path: PathBuf,
}

impl CaptureRequest {
    pub fn for_camera(camera: &CameraConfig, output_path: &Path) -> Self {
        Self {
            device_path: camera.device_path.clone(),
            width: camera.width,
            height: camera.height,
            pixel_format: camera.pixel_format.clone(),
            output_path: output_path.to_path_buf(),
        }
    }

    fn command(&self, tool: &str) -> CommandSpec {
        CommandSpec::new(tool).args([
            "-d".to_string(),
            self.device_path.clone(),
            format!(
                "--set-fmt-video=width={},height={},pixelformat={}",
                self.width, self.height, self.pixel_format
            ),
            "--stream-mmap".to_string(),
            "--stream-count=1".to_string(),
            format!("--stream-to={}", self.output_path.display()),
        ])
    }
}

/// Streams exactly one frame from a device into a file.
///
/// A successful outcome only means the tool exited cleanly; callers still
/// have to check the file, since truncated frames happen under contention.
pub struct CaptureInvoker {
    runner: Arc<dyn ProcessRunner>,
    tool: String,
}

impl CaptureInvoker {
    pub fn new(runner: Arc<dyn ProcessRunner>, tool: impl Into<String>) -> Self {
        Self {
            runner,
            tool: tool.into(),
        }
    }

    pub async fn capture(&self, request: &CaptureRequest, timeout: Duration) -> ProcessOutcome {
        self.runner.run(&request.command(&self.tool), timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    fn request() -> CaptureRequest {
        CaptureRequest {
            device_path: "/dev/video0".to_string(),
            width: 1920,
            height: 1080,
            pixel_format: "MJPG".to_string(),
            output_path: PathBuf::from("snapshots/cam1.jpg"),
        }
    }

    #[tokio::test]
    async fn test_capture_command_line() {
        let runner = Arc::new(ScriptedRunner::new());
        let invoker = CaptureInvoker::new(runner.clone(), "v4l2-ctl");

        let outcome = invoker.capture(&request(), Duration::from_secs(30)).await;

        assert!(outcome.success());
        assert_eq!(
            runner.calls()[0].to_string(),
            "v4l2-ctl -d /dev/video0 --set-fmt-video=width=1920,height=1080,pixelformat=MJPG \
             --stream-mmap --stream-count=1 --stream-to=snapshots/cam1.jpg"
        );
    }

    #[tokio::test]
    async fn test_capture_failure_message_carries_stderr_and_code() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on_program(
            "v4l2-ctl",
            ProcessOutcome::Completed {
                code: Some(1),
                stdout: String::new(),
                stderr: "VIDIOC_S_FMT: failed: Device or resource busy".to_string(),
            },
        );
        let invoker = CaptureInvoker::new(runner, "v4l2-ctl");

        let outcome = invoker.capture(&request(), Duration::from_secs(30)).await;

        assert!(!outcome.success());
        assert_eq!(
            outcome.message(),
            "Error: VIDIOC_S_FMT: failed: Device or resource busy (Code: 1)"
        );
    }
}
