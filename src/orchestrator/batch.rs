use super::{CaptureKind, CaptureOrchestrator, CaptureOutcome};
use crate::camera::{validate_camera_set, CameraConfig};
use crate::error::CameraConfigError;
use chrono::Local;
use std::path::PathBuf;
use tracing::{error, info};

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S%6f").to_string()
}

impl CaptureOrchestrator {
    fn output_path(&self, kind: CaptureKind, camera: &CameraConfig, stamp: &str) -> PathBuf {
        self.snapshot_dir
            .join(format!("{}_{}_{}.jpg", kind.prefix(), camera.name, stamp))
    }

    /// Make sure the snapshot directory exists; on failure every camera fails with the reason
    async fn prepare_output(&self, cameras: &[CameraConfig]) -> Result<(), Vec<CaptureOutcome>> {
        match tokio::fs::create_dir_all(&self.snapshot_dir).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let message = format!(
                    "Cannot create snapshot directory {}: {}",
                    self.snapshot_dir.display(),
                    e
                );
                error!("{}", message);
                Err(cameras
                    .iter()
                    .map(|camera| CaptureOutcome::failed(&camera.name, None, message.clone(), 0))
                    .collect())
            }
        }
    }

    async fn single_in_bracket(
        &self,
        kind: CaptureKind,
        camera: &CameraConfig,
    ) -> CaptureOutcome {
        let path = self.output_path(kind, camera, &timestamp());

        match camera.service_name() {
            Some(service) => {
                let services = [service.to_string()];
                self.services
                    .bracket(&services, self.single_settle, self.run_camera(camera, &path, true))
                    .await
            }
            None => self.run_camera(camera, &path, false).await,
        }
    }

    /// Capture a single camera, interrupting its service if it has one
    pub async fn capture_single(&self, camera: &CameraConfig) -> CaptureOutcome {
        let _device = self.device_lock.lock().await;
        info!("Snapshot requested for camera {}", camera.name);

        if let Err(mut failures) = self.prepare_output(std::slice::from_ref(camera)).await {
            return failures.remove(0);
        }

        self.single_in_bracket(CaptureKind::Single, camera).await
    }

    /// Capture every camera in order, each inside its own service bracket.
    ///
    /// Results follow the input order; a failed camera never stops the rest.
    pub async fn capture_all(
        &self,
        cameras: &[CameraConfig],
    ) -> Result<Vec<CaptureOutcome>, CameraConfigError> {
        validate_camera_set(cameras)?;
        let _device = self.device_lock.lock().await;
        info!("Capturing all {} cameras", cameras.len());

        if let Err(failures) = self.prepare_output(cameras).await {
            return Ok(failures);
        }

        let mut results = Vec::with_capacity(cameras.len());
        for (index, camera) in cameras.iter().enumerate() {
            if index > 0 && !self.inter_camera_delay.is_zero() {
                tokio::time::sleep(self.inter_camera_delay).await;
            }
            results.push(self.single_in_bracket(CaptureKind::All, camera).await);
        }

        log_summary("All-camera", &results);
        Ok(results)
    }

    /// Capture a stereo set as close together as the devices allow.
    ///
    /// Every service in the set is stopped once before the first capture and
    /// restarted once after the last, and all files share one timestamp.
    pub async fn capture_stereo(
        &self,
        cameras: &[CameraConfig],
    ) -> Result<Vec<CaptureOutcome>, CameraConfigError> {
        validate_camera_set(cameras)?;
        let _device = self.device_lock.lock().await;
        info!("Capturing stereo set of {} cameras", cameras.len());

        if let Err(failures) = self.prepare_output(cameras).await {
            return Ok(failures);
        }

        let mut services: Vec<String> = Vec::new();
        for service in cameras.iter().filter_map(CameraConfig::service_name) {
            if !services.iter().any(|s| s == service) {
                services.push(service.to_string());
            }
        }

        let stamp = timestamp();
        let results = self
            .services
            .bracket(&services, self.batch_settle, async {
                let mut results = Vec::with_capacity(cameras.len());
                for (index, camera) in cameras.iter().enumerate() {
                    if index > 0 && !self.inter_camera_delay.is_zero() {
                        tokio::time::sleep(self.inter_camera_delay).await;
                    }
                    let path = self.output_path(CaptureKind::Stereo, camera, &stamp);
                    results.push(
                        self.run_camera(camera, &path, camera.requires_interrupt())
                            .await,
                    );
                }
                results
            })
            .await;

        log_summary("Stereo", &results);
        Ok(results)
    }
}

fn log_summary(label: &str, results: &[CaptureOutcome]) {
    let succeeded = results.iter().filter(|r| r.success).count();
    info!(
        "{} capture finished: {}/{} cameras succeeded",
        label,
        succeeded,
        results.len()
    );
}
