use super::{CaptureOrchestrator, CaptureOutcome, CaptureState};
use crate::camera::CameraConfig;
use crate::device::CaptureRequest;
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// State of one camera while it moves through a capture
struct CameraRun<'a> {
    camera: &'a str,
    state: CaptureState,
    started: Instant,
}

impl<'a> CameraRun<'a> {
    fn new(camera: &'a str) -> Self {
        Self {
            camera,
            state: CaptureState::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: CaptureState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "Camera {}: unexpected transition {} -> {}",
                self.camera, self.state, next
            );
        }
        debug!("Camera {}: {} -> {}", self.camera, self.state, next);
        self.state = next;
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn succeed(mut self, filename: String) -> CaptureOutcome {
        self.advance(CaptureState::Done);
        CaptureOutcome::succeeded(self.camera, filename, self.elapsed_ms())
    }

    fn fail(mut self, filename: Option<String>, error: String) -> CaptureOutcome {
        self.advance(CaptureState::Failed);
        CaptureOutcome::failed(self.camera, filename, error, self.elapsed_ms())
    }
}

impl CaptureOrchestrator {
    /// Capture one camera into `output_path` and annotate it.
    ///
    /// Service interruption is the caller's job; `interrupted` only records
    /// that the camera's service bracket is open.
    pub(super) async fn run_camera(
        &self,
        camera: &CameraConfig,
        output_path: &Path,
        interrupted: bool,
    ) -> CaptureOutcome {
        let mut run = CameraRun::new(&camera.name);
        let filename = output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| output_path.display().to_string());

        if interrupted {
            run.advance(CaptureState::Interrupting);
        }
        run.advance(CaptureState::Capturing);

        if self.probe_before_capture && self.probe.is_busy(&camera.device_path).await {
            warn!(
                "Device {} for camera {} appears busy, attempting capture anyway",
                camera.device_path, camera.name
            );
        }

        info!(
            "Capturing {} from {} ({}x{} {})",
            filename, camera.device_path, camera.width, camera.height, camera.pixel_format
        );
        let request = CaptureRequest::for_camera(camera, output_path);
        let outcome = self.invoker.capture(&request, self.capture_timeout).await;
        if !outcome.success() {
            let message = outcome.message();
            error!("Capture failed for camera {}: {}", camera.name, message);
            remove_partial(output_path).await;
            return run.fail(None, message);
        }

        if !self.output_is_complete(output_path).await {
            error!(
                "Capture of camera {} produced no usable file at {}",
                camera.name,
                output_path.display()
            );
            remove_partial(output_path).await;
            return run.fail(None, "File not created or too small".to_string());
        }
        run.advance(CaptureState::FileValidated);

        // Sample taken after the frame exists to keep it close to the exposure
        let sample = self.telemetry.read();
        run.advance(CaptureState::Embedding);

        match self
            .embedder
            .embed(output_path, &sample, &camera.calibration)
            .await
        {
            Ok(_) => {
                info!("Camera {} captured to {}", camera.name, filename);
                run.succeed(filename)
            }
            Err(e) => {
                error!("Metadata embedding failed for {}: {}", filename, e);
                let message = format!(
                    "Image captured ({}), but failed to embed IMU metadata: {}",
                    filename, e
                );
                run.fail(Some(filename), message)
            }
        }
    }

    async fn output_is_complete(&self, path: &Path) -> bool {
        match fs::metadata(path).await {
            Ok(meta) => meta.len() >= self.min_file_size,
            Err(_) => false,
        }
    }
}

async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial capture {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial capture {}: {}", path.display(), e),
    }
}
